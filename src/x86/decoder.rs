//! Linear x86-64 decoding on top of iced-x86.

use iced_x86::{Decoder, DecoderError, DecoderOptions};

use crate::{x86::X86Instruction, Error::X86Error, Result};

/// Lazy 64-bit decoder over a code window.
///
/// Yields one `Result<X86Instruction>` per instruction and stops after the first invalid
/// encoding or at the end of the window.
pub struct X86Decoder<'a> {
    decoder: Decoder<'a>,
    start: u64,
    failed: bool,
}

impl<'a> X86Decoder<'a> {
    /// Decode `code`, whose first byte lives at virtual address `ip`
    #[must_use]
    pub fn new(code: &'a [u8], ip: u64) -> Self {
        X86Decoder {
            decoder: Decoder::with_ip(64, code, ip, DecoderOptions::NONE),
            start: ip,
            failed: false,
        }
    }
}

impl Iterator for X86Decoder<'_> {
    type Item = Result<X86Instruction>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || !self.decoder.can_decode() {
            return None;
        }

        let instruction = self.decoder.decode();
        if instruction.is_invalid() {
            self.failed = true;

            let reason = match self.decoder.last_error() {
                DecoderError::NoMoreBytes => "truncated instruction",
                _ => "invalid instruction",
            };
            return Some(Err(X86Error(format!(
                "{} at {:#x}",
                reason,
                instruction.ip()
            ))));
        }

        // The instruction pointer wraps past u64::MAX
        let offset = instruction.ip().wrapping_sub(self.start) as usize;
        Some(Ok(X86Instruction::new(offset, instruction)))
    }
}

/// Decode every instruction in `code`.
///
/// # Errors
/// Returns [`crate::Error::X86Error`] for an invalid or truncated encoding.
pub fn decode_x86(code: &[u8], ip: u64) -> Result<Vec<X86Instruction>> {
    X86Decoder::new(code, ip).collect()
}

#[cfg(test)]
mod tests {
    use iced_x86::{Mnemonic, Register};

    use super::*;
    use crate::disassembler::FlowType;

    #[test]
    fn decode_prologue() {
        #[rustfmt::skip]
        let code = [
            0x48, 0x89, 0x5C, 0x24, 0x08, // mov [rsp+8], rbx
            0x84, 0xC0,                   // test al, al
            0x74, 0x01,                   // je +1
            0xC3,                         // ret
            0x30, 0xC0,                   // xor al, al
            0xC3,                         // ret
            0xCC,                         // int3
        ];

        let instructions = decode_x86(&code, 0x1_8000_1000).unwrap();
        assert_eq!(instructions.len(), 7);

        assert!(instructions[0].is_stack_mov());
        assert_eq!(instructions[0].len(), 5);
        assert_eq!(instructions[0].opcode_position(&code), 1);

        assert_eq!(instructions[1].mnemonic(), Mnemonic::Test);
        assert_eq!(instructions[1].offset, 5);
        assert_eq!(instructions[1].self_register_operand(), Some(Register::AL));
        assert_eq!(instructions[1].opcode_position(&code[5..]), 0);

        assert_eq!(instructions[2].flow_type, FlowType::ConditionalBranch);
        assert_eq!(instructions[2].branch_target(), Some(0x1_8000_100A));

        assert!(instructions[3].is_ret());
        assert_eq!(instructions[3].flow_type, FlowType::Return);
        assert_eq!(instructions[4].mnemonic(), Mnemonic::Xor);
        assert!(instructions[6].is_int3());
        assert_eq!(instructions[6].flow_type, FlowType::Trap);
    }

    #[test]
    fn operand_shapes() {
        // test rax, rcx; test r8, r8; call rel32
        #[rustfmt::skip]
        let code = [
            0x48, 0x85, 0xC8,
            0x4D, 0x85, 0xC0,
            0xE8, 0x00, 0x00, 0x00, 0x00,
        ];

        let instructions = decode_x86(&code, 0x1000).unwrap();
        assert_eq!(instructions[0].self_register_operand(), None);
        assert_eq!(instructions[1].self_register_operand(), Some(Register::R8));
        assert_eq!(instructions[1].opcode_position(&code[3..]), 1);
        assert_eq!(instructions[2].flow_type, FlowType::Call);
        assert!(!instructions[2].is_stack_mov());
    }

    #[test]
    fn truncated() {
        let mut decoder = X86Decoder::new(&[0x90, 0x48, 0x89], 0);
        assert!(decoder.next().unwrap().is_ok());
        assert!(matches!(decoder.next(), Some(Err(X86Error(_)))));
        assert!(decoder.next().is_none());
    }

    #[test]
    fn window_wraps_address_space() {
        let instructions = decode_x86(&[0x90, 0x90, 0xC3], u64::MAX).unwrap();
        assert_eq!(instructions.len(), 3);
        assert_eq!(instructions[0].offset, 0);
        assert_eq!(instructions[1].offset, 1);
        assert_eq!(instructions[2].offset, 2);
        assert!(instructions[2].is_ret());
    }
}
