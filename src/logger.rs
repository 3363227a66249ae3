//! Logging handle passed to the detector and the patchers.
//!
//! Every component writes through a [`Logger`] it receives at construction instead of calling
//! the `log` macros directly. The default handle forwards to whatever logger the binary
//! installed ([`Logger::global`]); library users that want quiet operation pass
//! [`Logger::silent`], and tests collect lines with a [`MemorySink`].
//!
//! # Example
//!
//! ```rust
//! use pinpatch::logger::{Logger, MemorySink};
//! use std::sync::Arc;
//!
//! let sink = Arc::new(MemorySink::default());
//! let logger = Logger::with_sink(sink.clone(), log::LevelFilter::Info);
//!
//! logger.info(format_args!("The patch was applied successfully. (patch: {})", "CF"));
//! logger.debug(format_args!("not recorded"));
//!
//! assert_eq!(sink.messages(), vec!["The patch was applied successfully. (patch: CF)"]);
//! ```

use std::{
    fmt,
    sync::{Arc, Mutex},
};

use log::{Level, LevelFilter, Log, Metadata, Record};

const TARGET: &str = "pinpatch";

/// A cloneable logging handle: a sink plus a verbosity filter.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn Log>,
    level: LevelFilter,
}

impl Logger {
    /// Forward to the logger installed through the `log` facade, keeping records up to `level`
    #[must_use]
    pub fn global(level: LevelFilter) -> Self {
        Logger {
            sink: Arc::new(GlobalSink),
            level,
        }
    }

    /// Drop every record
    #[must_use]
    pub fn silent() -> Self {
        Logger {
            sink: Arc::new(GlobalSink),
            level: LevelFilter::Off,
        }
    }

    /// Write to `sink`, keeping records up to `level`
    #[must_use]
    pub fn with_sink(sink: Arc<dyn Log>, level: LevelFilter) -> Self {
        Logger { sink, level }
    }

    /// The verbosity filter
    #[must_use]
    pub fn level(&self) -> LevelFilter {
        self.level
    }

    /// Returns true if records at `level` pass the filter
    #[must_use]
    pub fn enabled(&self, level: Level) -> bool {
        level <= self.level
    }

    /// Emit one record at `level`
    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        if !self.enabled(level) {
            return;
        }

        self.sink.log(
            &Record::builder()
                .args(args)
                .level(level)
                .target(TARGET)
                .build(),
        );
    }

    /// Emit an error record
    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }

    /// Emit a warning record
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    /// Emit an info record
    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    /// Emit a debug record
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Logger::global(LevelFilter::Trace)
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("level", &self.level).finish()
    }
}

struct GlobalSink;

impl Log for GlobalSink {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        log::logger().enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        log::logger().log(record);
    }

    fn flush(&self) {
        log::logger().flush();
    }
}

/// A sink that keeps every record in memory.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<(Level, String)>>,
}

impl MemorySink {
    /// All records so far, oldest first
    #[must_use]
    pub fn records(&self) -> Vec<(Level, String)> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// The messages of all records so far, oldest first
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .map(|(_, message)| message)
            .collect()
    }

    /// Returns true if any record's message equals `message`
    #[must_use]
    pub fn contains(&self, message: &str) -> bool {
        self.messages().iter().any(|line| line == message)
    }
}

impl Log for MemorySink {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        if let Ok(mut records) = self.records.lock() {
            records.push((record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}
