//! Patchers for managed modules.
//!
//! A [`CilPatch`] names a method and the field it reads. The scanner looks for the first
//! `ldfld` of that field that has at least [`CilPatch::window`] instructions before it; those
//! instructions plus the `ldfld` are replaced with [`CilPatch::replacement`], which pushes the
//! same number of values. The body is then re-encoded (branch forms, switch tables and
//! exception clauses follow the new layout) and written back into its original slot.

use std::path::{Path, PathBuf};

use crate::{
    disassembler::{
        build_instruction, decode_stream, encode_instructions, opcodes, FlowType, Immediate,
        Instruction, Operand,
    },
    logger::Logger,
    metadata::{
        cilimage::CilImage,
        method::{ExceptionHandler, MethodBody},
        tables::MethodDefRaw,
        token::Token,
    },
    patch::{absolute_path, write_module, Patcher},
    Result,
};

/// Namespace of the marker type left behind by MonoMod based patchers
const MARKER_NAMESPACE: &str = "MonoMod";
/// Name of the marker type left behind by MonoMod based patchers
const MARKER_NAME: &str = "WasHere";

/// A hardcoded managed patch.
#[derive(Debug)]
pub struct CilPatch {
    /// Patch name used in log lines
    pub name: &'static str,
    /// Namespace of the declaring type, may be empty
    pub namespace: &'static str,
    /// Declaring type
    pub class: &'static str,
    /// Method to patch
    pub method: &'static str,
    /// Field whose `ldfld` anchors the rewrite
    pub field: &'static str,
    /// Number of instructions before the anchor that belong to the rewrite
    pub window: usize,
    /// Replacement for the window and the anchor, one entry per replaced instruction
    pub replacement: &'static [(u8, Operand)],
}

impl CilPatch {
    /// Build the replacement instructions, unplaced.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an opcode without a definition.
    pub fn replacement_instructions(&self) -> Result<Vec<Instruction>> {
        self.replacement
            .iter()
            .map(|(opcode, operand)| build_instruction(0, *opcode, operand.clone()))
            .collect()
    }
}

/// `TM.SetMSC`: the value read from `m_MSC` becomes `0.0f`
pub static CF_PATCH: CilPatch = CilPatch {
    name: "CF",
    namespace: "",
    class: "TM",
    method: "SetMSC",
    field: "m_MSC",
    window: 2,
    replacement: &[
        (opcodes::LDC_R4, Operand::Immediate(Immediate::Float32(0.0))),
        (opcodes::NOP, Operand::None),
        (opcodes::NOP, Operand::None),
    ],
};

/// `GMC.IsMSC`: the value read from `m_MSC` becomes `1`
pub static FV_CIL_PATCH: CilPatch = CilPatch {
    name: "FV (CIL)",
    namespace: "",
    class: "GMC",
    method: "IsMSC",
    field: "m_MSC",
    window: 1,
    replacement: &[
        (opcodes::LDC_I4_1, Operand::None),
        (opcodes::NOP, Operand::None),
    ],
};

/// Find the index of the anchor `ldfld` in `instructions`.
///
/// `is_field` decides whether a field token names the patch field. A candidate is accepted when
/// it has at least `patch.window` predecessors, the window has the same net stack effect as the
/// replacement, contains only sequential instructions, and no branch or exception clause lands
/// inside it.
///
/// # Errors
/// Returns the errors of `is_field` and of building the replacement.
pub fn find_anchor<F>(
    instructions: &[Instruction],
    handlers: &[ExceptionHandler],
    patch: &CilPatch,
    mut is_field: F,
) -> Result<Option<usize>>
where
    F: FnMut(Token) -> Result<bool>,
{
    let replacement = patch.replacement_instructions()?;
    if replacement.len() != patch.window + 1 {
        return Err(malformed_error!(
            "Patch {} replaces {} instructions with {}",
            patch.name,
            patch.window + 1,
            replacement.len()
        ));
    }
    let expected = net_effect(&replacement);

    let mut landing: Vec<u32> = instructions
        .iter()
        .flat_map(Instruction::branch_targets)
        .chain(handlers.iter().flat_map(ExceptionHandler::boundaries))
        .collect();
    landing.sort_unstable();
    landing.dedup();

    for (index, instruction) in instructions.iter().enumerate().skip(patch.window) {
        if instruction.prefix != 0 || instruction.opcode != opcodes::LDFLD {
            continue;
        }

        let Some(token) = instruction.get_token_operand() else {
            continue;
        };
        if !is_field(token)? {
            continue;
        }

        let window = &instructions[index - patch.window..=index];
        if net_effect(window) != expected {
            continue;
        }

        if window.iter().any(|instruction| {
            instruction.flow_type != FlowType::Sequential || instruction.is_prefix()
        }) {
            continue;
        }

        if window[1..]
            .iter()
            .any(|instruction| landing.binary_search(&instruction.offset).is_ok())
        {
            continue;
        }

        return Ok(Some(index));
    }

    Ok(None)
}

fn net_effect(instructions: &[Instruction]) -> Option<i32> {
    instructions
        .iter()
        .map(|instruction| {
            instruction
                .stack_behavior
                .map(|stack| i32::from(stack.net_effect))
        })
        .sum()
}

/// Replace the window ending at `anchor` and re-encode the complete body.
fn rewrite_body(
    body: &MethodBody,
    mut instructions: Vec<Instruction>,
    anchor: usize,
    patch: &CilPatch,
) -> Result<Vec<u8>> {
    let start = anchor - patch.window;
    for (slot, mut replacement) in instructions[start..=anchor]
        .iter_mut()
        .zip(patch.replacement_instructions()?)
    {
        replacement.offset = slot.offset;
        *slot = replacement;
    }

    let encoded = encode_instructions(&instructions)?;
    let handlers = encoded.remap_handlers(&body.exception_handlers)?;
    body.encode(&encoded.code, &handlers)
}

/// A managed module bound to one [`CilPatch`].
pub struct CilPatcher {
    patch: &'static CilPatch,
    image: CilImage,
    path: PathBuf,
    logger: Logger,
}

impl CilPatcher {
    /// Load the module at `path` for `patch`.
    ///
    /// # Errors
    /// Returns the load errors of [`CilImage::from_file`].
    pub fn open(path: &Path, patch: &'static CilPatch, logger: Logger) -> Result<Self> {
        let image = CilImage::from_file(path)?;
        Ok(Self::from_image(image, path, patch, logger))
    }

    /// Bind an already loaded module to `patch`; `path` is where it was read from.
    #[must_use]
    pub fn from_image(
        image: CilImage,
        path: &Path,
        patch: &'static CilPatch,
        logger: Logger,
    ) -> Self {
        CilPatcher {
            patch,
            image,
            path: absolute_path(path),
            logger,
        }
    }

    /// The loaded module
    #[must_use]
    pub fn image(&self) -> &CilImage {
        &self.image
    }

    /// The patch this patcher applies
    #[must_use]
    pub fn patch(&self) -> &'static CilPatch {
        self.patch
    }

    /// Consume the patcher and return the module bytes
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.image.into_data()
    }

    fn target_method(&self) -> Option<MethodDefRaw> {
        self.image
            .find_method(self.patch.namespace, self.patch.class, self.patch.method)
            .ok()
            .flatten()
    }

    /// Locate the anchor of the patch in `method`, returning the decoded body with it.
    fn scan(&self, method: &MethodDefRaw) -> Result<Option<(MethodBody, Vec<Instruction>, usize)>> {
        let Some((body, code)) = self.image.method_body(method)? else {
            return Ok(None);
        };

        let instructions = decode_stream(code)?;
        let anchor = find_anchor(&instructions, &body.exception_handlers, self.patch, |token| {
            Ok(self.image.field_name(token)? == Some(self.patch.field))
        })?;

        Ok(anchor.map(|anchor| (body, instructions, anchor)))
    }

    fn apply_patch(&mut self) -> bool {
        let name = self.patch.name;

        let Some(method) = self.target_method() else {
            self.logger.error(format_args!(
                "Failed to get the target method. (patch: {name})"
            ));
            return false;
        };

        let site = match self.scan(&method) {
            Ok(Some(site)) => site,
            Ok(None) => {
                self.logger.error(format_args!(
                    "No instructions found to patch. (patch: {name})"
                ));
                return false;
            }
            Err(error) => {
                self.logger
                    .error(format_args!("Failed to patch. (patch: {name}) - {error}"));
                return false;
            }
        };

        let (body, instructions, anchor) = site;
        for instruction in &instructions[anchor - self.patch.window..=anchor] {
            self.logger.debug(format_args!("replace {instruction}"));
        }

        let result = rewrite_body(&body, instructions, anchor, self.patch)
            .and_then(|encoded| self.image.replace_method_body(&method, &encoded));
        if let Err(error) = result {
            self.logger
                .error(format_args!("Failed to patch. (patch: {name}) - {error}"));
            return false;
        }

        self.logger.info(format_args!(
            "The patch was applied successfully. (patch: {name})"
        ));
        true
    }
}

impl Patcher for CilPatcher {
    fn name(&self) -> &'static str {
        self.patch.name
    }

    fn module_path(&self) -> &Path {
        &self.path
    }

    fn check_target(&self) -> bool {
        self.target_method().is_some()
    }

    fn is_patched(&self) -> bool {
        self.image
            .has_type(MARKER_NAMESPACE, MARKER_NAME)
            .unwrap_or(false)
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
