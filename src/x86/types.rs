//! Decoded x86-64 instructions.
//!
//! [`X86Instruction`] wraps an `iced_x86::Instruction` together with its position in the
//! decoded window and its [`FlowType`], the classification shared with the CIL model.

use std::fmt;

use iced_x86::{FlowControl, Mnemonic, OpKind, Register};

use crate::disassembler::FlowType;

/// One decoded x86-64 instruction.
#[derive(Clone)]
pub struct X86Instruction {
    /// Byte offset from the start of the decoded window
    pub offset: usize,
    /// How the instruction affects control flow
    pub flow_type: FlowType,
    /// The full iced-x86 decoding
    pub instruction: iced_x86::Instruction,
}

impl X86Instruction {
    pub(crate) fn new(offset: usize, instruction: iced_x86::Instruction) -> Self {
        X86Instruction {
            offset,
            flow_type: flow_type(instruction.flow_control()),
            instruction,
        }
    }

    /// Virtual address of the instruction
    #[must_use]
    pub fn ip(&self) -> u64 {
        self.instruction.ip()
    }

    /// Encoded length in bytes (1-15)
    #[must_use]
    pub fn len(&self) -> usize {
        self.instruction.len()
    }

    /// Always false; decoded instructions occupy at least one byte
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Offset of the next sequential instruction in the decoded window
    #[must_use]
    pub fn end_offset(&self) -> usize {
        self.offset + self.len()
    }

    /// The instruction mnemonic
    #[must_use]
    pub fn mnemonic(&self) -> Mnemonic {
        self.instruction.mnemonic()
    }

    /// Returns true for `int3`, the padding between compiled functions
    #[must_use]
    pub fn is_int3(&self) -> bool {
        self.mnemonic() == Mnemonic::Int3
    }

    /// Returns true for a near return
    #[must_use]
    pub fn is_ret(&self) -> bool {
        self.mnemonic() == Mnemonic::Ret
    }

    /// Returns true for a `mov` that stores to or loads from a `[rsp+...]` operand
    #[must_use]
    pub fn is_stack_mov(&self) -> bool {
        self.mnemonic() == Mnemonic::Mov && self.instruction.memory_base() == Register::RSP
    }

    /// Target address of a direct branch
    #[must_use]
    pub fn branch_target(&self) -> Option<u64> {
        match self.instruction.op0_kind() {
            OpKind::NearBranch16 | OpKind::NearBranch32 | OpKind::NearBranch64 => {
                Some(self.instruction.near_branch_target())
            }
            _ => None,
        }
    }

    /// The register used by both operands of a two-operand register form such as
    /// `test al, al`; `None` for any other operand shape.
    #[must_use]
    pub fn self_register_operand(&self) -> Option<Register> {
        if self.instruction.op_count() != 2
            || self.instruction.op0_kind() != OpKind::Register
            || self.instruction.op1_kind() != OpKind::Register
        {
            return None;
        }

        let register = self.instruction.op0_register();
        (register == self.instruction.op1_register()).then_some(register)
    }

    /// Offset of the opcode byte within `code` (which starts at the instruction), skipping legacy
    /// and REX prefixes.
    #[must_use]
    pub fn opcode_position(&self, code: &[u8]) -> usize {
        let limit = self.len().saturating_sub(1);
        code.iter()
            .take(limit)
            .take_while(|&&byte| is_prefix(byte))
            .count()
    }
}

impl fmt::Debug for X86Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X} {}", self.ip(), self.instruction)
    }
}

impl fmt::Display for X86Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.instruction)
    }
}

fn is_prefix(byte: u8) -> bool {
    matches!(
        byte,
        0x26 | 0x2E | 0x36 | 0x3E | 0x64 | 0x65 | 0x66 | 0x67 | 0xF0 | 0xF2 | 0xF3 | 0x40..=0x4F
    )
}

fn flow_type(flow: FlowControl) -> FlowType {
    match flow {
        FlowControl::Next => FlowType::Sequential,
        FlowControl::ConditionalBranch => FlowType::ConditionalBranch,
        FlowControl::UnconditionalBranch | FlowControl::IndirectBranch => {
            FlowType::UnconditionalBranch
        }
        FlowControl::Return => FlowType::Return,
        FlowControl::Call | FlowControl::IndirectCall => FlowType::Call,
        // Interrupt, Exception, XbeginXabortXend
        _ => FlowType::Trap,
    }
}
