use std::fmt::{self, UpperHex};

use crate::metadata::token::Token;

/// Encoding of the operand that follows an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// No operand
    None,
    /// Signed byte, or a short branch displacement
    Int8,
    /// Unsigned byte, short argument and local indexes
    UInt8,
    /// Unsigned 16-bit argument and local indexes
    UInt16,
    /// Signed 32-bit immediate, or a long branch displacement
    Int32,
    /// Signed 64-bit immediate
    Int64,
    /// 32-bit float
    Float32,
    /// 64-bit float
    Float64,
    /// A metadata token
    Token,
    /// A count followed by that many 32-bit displacements
    Switch,
}

impl OperandType {
    /// Size in bytes of the operand, `None` for the variable-sized switch table
    #[must_use]
    pub const fn size(&self) -> Option<usize> {
        match self {
            OperandType::None => Some(0),
            OperandType::Int8 | OperandType::UInt8 => Some(1),
            OperandType::UInt16 => Some(2),
            OperandType::Int32 | OperandType::Float32 | OperandType::Token => Some(4),
            OperandType::Int64 | OperandType::Float64 => Some(8),
            OperandType::Switch => None,
        }
    }
}

/// An immediate operand value.
#[derive(Debug, Clone, Copy, PartialEq)]
#[allow(missing_docs)]
pub enum Immediate {
    Int8(i8),
    UInt8(u8),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
}

impl UpperHex for Immediate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Immediate::Int8(value) => write!(f, "{value:02X}"),
            Immediate::UInt8(value) => write!(f, "{value:02X}"),
            Immediate::Int32(value) => write!(f, "{value:08X}"),
            Immediate::Int64(value) => write!(f, "{value:016X}"),
            Immediate::Float32(value) => write!(f, "{:08X}", value.to_bits()),
            Immediate::Float64(value) => write!(f, "{:016X}", value.to_bits()),
        }
    }
}

/// A decoded operand.
///
/// Branch targets are absolute offsets inside the method's code, not displacements, so an
/// instruction list can be re-laid out without recomputing them by hand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand
    None,
    /// An immediate value
    Immediate(Immediate),
    /// Absolute code offset of a branch target
    Target(u32),
    /// A metadata token
    Token(Token),
    /// A local variable index
    Local(u16),
    /// An argument index
    Argument(u16),
    /// Absolute code offsets of every switch case
    Switch(Vec<u32>),
}

/// How control leaves an instruction.
///
/// Both instruction models classify into this one enumeration: CIL uses every variant, native
/// code maps its decoder's classification onto `Sequential`, the two branch kinds, `Call`,
/// `Return` and `Trap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Falls through to the next instruction
    Sequential,
    /// Either falls through or jumps to a target
    ConditionalBranch,
    /// Always jumps to a target
    UnconditionalBranch,
    /// Calls another method and continues
    Call,
    /// Leaves the method
    Return,
    /// Jumps through a table of targets
    Switch,
    /// Raises an exception
    Throw,
    /// Ends a finally, fault or filter block
    EndFinally,
    /// Leaves a protected region
    Leave,
    /// Stops at a breakpoint or trap
    Trap,
}

/// Fixed stack effect of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackBehavior {
    /// Values popped
    pub pops: u8,
    /// Values pushed
    pub pushes: u8,
    /// `pushes - pops`
    pub net_effect: i8,
}

/// A single decoded CIL instruction.
#[derive(Clone, PartialEq)]
pub struct Instruction {
    /// Offset of the first byte inside the method's code
    pub offset: u32,
    /// Encoded size including prefix and operand
    pub size: u32,
    /// The opcode byte, second byte for `0xFE`-prefixed opcodes
    pub opcode: u8,
    /// `0xFE` for two-byte opcodes, otherwise 0
    pub prefix: u8,
    /// The instruction's mnemonic, for example `ldfld`
    pub mnemonic: &'static str,
    /// Control flow classification
    pub flow_type: FlowType,
    /// The decoded operand
    pub operand: Operand,
    /// Stack effect, `None` when it depends on a signature (calls, `ret`, `leave`)
    pub stack_behavior: Option<StackBehavior>,
}

impl Instruction {
    /// Returns true for instructions that transfer control to explicit targets
    #[must_use]
    pub fn is_branch(&self) -> bool {
        matches!(
            self.flow_type,
            FlowType::ConditionalBranch
                | FlowType::UnconditionalBranch
                | FlowType::Switch
                | FlowType::Leave
        )
    }

    /// All explicit targets of this instruction, as absolute code offsets
    #[must_use]
    pub fn branch_targets(&self) -> Vec<u32> {
        match &self.operand {
            Operand::Target(target) => vec![*target],
            Operand::Switch(targets) => targets.clone(),
            _ => Vec::new(),
        }
    }

    /// The token operand, if any
    #[must_use]
    pub fn get_token_operand(&self) -> Option<Token> {
        match &self.operand {
            Operand::Token(token) => Some(*token),
            _ => None,
        }
    }

    /// The 32-bit float operand, if any
    #[must_use]
    pub fn get_f32_operand(&self) -> Option<f32> {
        match &self.operand {
            Operand::Immediate(Immediate::Float32(value)) => Some(*value),
            _ => None,
        }
    }

    /// Returns true for opcode prefixes such as `volatile.` and `constrained.`
    #[must_use]
    pub fn is_prefix(&self) -> bool {
        matches!(
            self.mnemonic,
            "tail." | "volatile." | "unaligned." | "constrained." | "readonly." | "no."
        )
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IL_{:04X} - ", self.offset)?;

        if self.prefix != 0 {
            write!(f, "{:02X}:", self.prefix)?;
        }

        write!(f, "{:02X} - {:<12}", self.opcode, self.mnemonic)?;

        match &self.operand {
            Operand::None => {}
            Operand::Immediate(imm) => write!(f, " 0x{imm:X}")?,
            Operand::Target(target) => write!(f, " -> IL_{target:04X}")?,
            Operand::Token(token) => write!(f, " token:{token}")?,
            Operand::Local(local) => write!(f, " local:{local}")?,
            Operand::Argument(arg) => write!(f, " arg:{arg}")?,
            Operand::Switch(items) => {
                write!(f, " switch[{}]:(", items.len())?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "IL_{item:04X}")?;
                }
                write!(f, ")")?;
            }
        }

        if self.flow_type != FlowType::Sequential {
            write!(f, " | {:?}", self.flow_type)?;
        }

        Ok(())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IL_{:04X}: {}", self.offset, self.mnemonic)?;

        match &self.operand {
            Operand::None => Ok(()),
            Operand::Immediate(Immediate::Float32(value)) => write!(f, " {value:?}"),
            Operand::Immediate(Immediate::Float64(value)) => write!(f, " {value:?}"),
            Operand::Immediate(Immediate::Int8(value)) => write!(f, " {value}"),
            Operand::Immediate(Immediate::UInt8(value)) => write!(f, " {value}"),
            Operand::Immediate(Immediate::Int32(value)) => write!(f, " {value}"),
            Operand::Immediate(Immediate::Int64(value)) => write!(f, " {value}"),
            Operand::Target(target) => write!(f, " IL_{target:04X}"),
            Operand::Token(token) => write!(f, " {token}"),
            Operand::Local(local) => write!(f, " V_{local}"),
            Operand::Argument(arg) => write!(f, " A_{arg}"),
            Operand::Switch(items) => write!(f, " ({} targets)", items.len()),
        }
    }
}
