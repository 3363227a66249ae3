//! Patcher for IL2CPP players.
//!
//! `GMC.IsMSC` compiles to a function that tests the field value and jumps to the exit path:
//!
//! ```text
//! 84 C0    test al, al
//! 74 XX    je   exit
//! ```
//!
//! Turning `test` into `xor` zeroes the register and sets ZF, so the branch is always taken.
//! Only the opcode byte changes; the instruction length stays the same.

use std::path::{Path, PathBuf};

use iced_x86::Mnemonic;

use crate::{
    disassembler::FlowType,
    il2cpp::Il2CppImage,
    logger::Logger,
    patch::{absolute_path, write_module, Patcher, ScanLimits},
    x86::{X86Decoder, X86Instruction},
    Result,
};

/// Patch name used in log lines
pub const FV_IL2CPP_NAME: &str = "FV (IL2CPP)";

const TARGET_CLASS: &str = "GMC";
const TARGET_METHOD: &str = "IsMSC";

/// `test r/m8, r8` and `test r/m, r` with the `xor` opcode that replaces each
const TEST_TO_XOR: [(u8, u8); 2] = [(0x84, 0x30), (0x85, 0x31)];

/// Find the `test` that guards the exit branch of the function at `entry`.
///
/// `data` is the complete code module and `file_offset` the position of `entry` in it. The first
/// instruction must be a `mov` with an `[rsp+...]` operand. Decoding stops at `int3` or the end
/// of the decode window. The first conditional branch whose target reaches `ret` within
/// `limits.probe_depth` instructions must be preceded by `test r, r` (or `xor r, r` when
/// `accept_patched` is set); any other predecessor aborts the scan.
///
/// Returns the file offset of the opcode byte of that instruction.
pub fn find_exit_test(
    data: &[u8],
    entry: u64,
    file_offset: usize,
    limits: &ScanLimits,
    accept_patched: bool,
    logger: &Logger,
) -> Option<usize> {
    let window = code_window(data, file_offset, limits.decode_window)?;

    let mut previous: Option<X86Instruction> = None;
    for (index, decoded) in X86Decoder::new(window, entry).enumerate() {
        let Ok(instruction) = decoded else {
            break;
        };
        logger.debug(format_args!("{instruction:?}"));

        if index == 0 && !instruction.is_stack_mov() {
            logger.debug(format_args!("unexpected function prologue"));
            return None;
        }

        if instruction.is_int3() {
            break;
        }

        if instruction.flow_type == FlowType::ConditionalBranch {
            if let Some(target) = instruction.branch_target() {
                if is_exit_branch(data, entry, file_offset, target, limits, logger) {
                    let Some(test) = previous.filter(|previous| {
                        is_self_test(previous) || (accept_patched && is_self_xor(previous))
                    }) else {
                        logger.debug(format_args!(
                            "exit branch at {:#x} is not guarded by a register test",
                            instruction.ip()
                        ));
                        return None;
                    };

                    logger.debug(format_args!("found {test:?}"));
                    let position = test.opcode_position(&window[test.offset..]);
                    return Some(file_offset + test.offset + position);
                }
            }
        }

        previous = Some(instruction);
    }

    None
}

fn code_window(data: &[u8], offset: usize, len: usize) -> Option<&[u8]> {
    let end = offset.saturating_add(len).min(data.len());
    data.get(offset..end).filter(|window| !window.is_empty())
}

/// Returns true if decoding from `target` reaches `ret` before `int3` and within the probe depth.
fn is_exit_branch(
    data: &[u8],
    entry: u64,
    file_offset: usize,
    target: u64,
    limits: &ScanLimits,
    logger: &Logger,
) -> bool {
    let Some(delta) = target.checked_sub(entry) else {
        return false;
    };
    let Some(offset) = usize::try_from(delta)
        .ok()
        .and_then(|delta| file_offset.checked_add(delta))
    else {
        return false;
    };
    let Some(window) = code_window(data, offset, limits.decode_window) else {
        return false;
    };

    logger.debug(format_args!("check destination {target:#x}"));
    for decoded in X86Decoder::new(window, target).take(limits.probe_depth) {
        let Ok(instruction) = decoded else {
            break;
        };
        logger.debug(format_args!("    {instruction:?}"));

        if instruction.is_int3() {
            break;
        }
        if instruction.is_ret() {
            return true;
        }
    }

    false
}

fn is_self_test(instruction: &X86Instruction) -> bool {
    instruction.mnemonic() == Mnemonic::Test && instruction.self_register_operand().is_some()
}

fn is_self_xor(instruction: &X86Instruction) -> bool {
    instruction.mnemonic() == Mnemonic::Xor && instruction.self_register_operand().is_some()
}

/// An IL2CPP player bound to the `GMC.IsMSC` patch.
pub struct Il2CppPatcher {
    image: Il2CppImage,
    path: PathBuf,
    limits: ScanLimits,
    logger: Logger,
}

impl Il2CppPatcher {
    /// Load the player in `dir`.
    ///
    /// # Errors
    /// Returns the load errors of [`Il2CppImage::open`].
    pub fn open(dir: &Path, limits: ScanLimits, logger: Logger) -> Result<Self> {
        Ok(Self::from_image(Il2CppImage::open(dir)?, limits, logger))
    }

    /// Bind an already loaded player
    #[must_use]
    pub fn from_image(image: Il2CppImage, limits: ScanLimits, logger: Logger) -> Self {
        Il2CppPatcher {
            path: absolute_path(image.module_path()),
            image,
            limits,
            logger,
        }
    }

    /// The loaded player
    #[must_use]
    pub fn image(&self) -> &Il2CppImage {
        &self.image
    }

    /// Consume the patcher and return the code module bytes
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.image.into_data()
    }

    /// File offset of the byte the patch rewrites, in either state.
    #[must_use]
    pub fn patch_offset(&self) -> Option<usize> {
        let method = match self.image.find_method(TARGET_CLASS, TARGET_METHOD) {
            Ok(Some(method)) => method,
            Ok(None) => {
                self.logger.error(format_args!(
                    "Failed to get the target method. (patch: {FV_IL2CPP_NAME})"
                ));
                return None;
            }
            Err(error) => {
                self.logger.error(format_args!(
                    "Failed to get the target method. (patch: {FV_IL2CPP_NAME}) - {error}"
                ));
                return None;
            }
        };

        let offset = find_exit_test(
            self.image.data(),
            method.entry,
            method.file_offset,
            &self.limits,
            true,
            &self.logger,
        );
        if offset.is_none() {
            self.logger.error(format_args!(
                "No instructions found to patch. (patch: {FV_IL2CPP_NAME})"
            ));
        }

        offset
    }

    fn apply_patch(&mut self) -> bool {
        let Some(offset) = self.patch_offset() else {
            return false;
        };

        let current = self.image.data()[offset];
        if let Some(&(_, xor)) = TEST_TO_XOR.iter().find(|(test, _)| *test == current) {
            if let Err(error) = self.image.write_byte(offset, xor) {
                self.logger.error(format_args!(
                    "Failed to patch. (patch: {FV_IL2CPP_NAME}) - {error}"
                ));
                return false;
            }
            self.logger
                .debug(format_args!("{offset:#x}: {current:02X} -> {xor:02X}"));
        } else if !TEST_TO_XOR.iter().any(|(_, xor)| *xor == current) {
            self.logger.error(format_args!(
                "No instructions found to patch. (patch: {FV_IL2CPP_NAME})"
            ));
            return false;
        }

        self.logger.info(format_args!(
            "The patch was applied successfully. (patch: {FV_IL2CPP_NAME})"
        ));
        true
    }
}

impl Patcher for Il2CppPatcher {
    fn name(&self) -> &'static str {
        FV_IL2CPP_NAME
    }

    fn module_path(&self) -> &Path {
        &self.path
    }

    fn check_target(&self) -> bool {
        matches!(
            self.image.find_method(TARGET_CLASS, TARGET_METHOD),
            Ok(Some(_))
        )
    }

    fn is_patched(&self) -> bool {
        self.patch_offset().is_some_and(|offset| {
            let current = self.image.data()[offset];
            TEST_TO_XOR.iter().any(|(_, xor)| *xor == current)
        })
    }

    fn apply_all(&mut self) -> bool {
        let result = self.apply_patch();

        if result {
            self.logger
                .info(format_args!("All patches were applied successfully."));
        } else {
            self.logger.error(format_args!("Failed to patch."));
        }

        result
    }

    fn save(&self, path: &Path) -> Result<()> {
        write_module(&self.path, path, self.image.data())
    }
}
