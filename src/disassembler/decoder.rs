//! Linear CIL decoding.
//!
//! ```rust
//! use pinpatch::{disassembler::decode_instruction, file::parser::Parser};
//!
//! let code = [0x02, 0x7B, 0x01, 0x00, 0x00, 0x04]; // ldarg.0; ldfld 0x04000001
//! let mut parser = Parser::new(&code);
//! assert_eq!(decode_instruction(&mut parser)?.mnemonic, "ldarg.0");
//! assert_eq!(decode_instruction(&mut parser)?.mnemonic, "ldfld");
//! # Ok::<(), pinpatch::Error>(())
//! ```

use crate::{
    disassembler::{
        instructions::{CilInstruction, INSTRUCTIONS, INSTRUCTIONS_FE},
        opcodes::FE_PREFIX,
        FlowType, Immediate, Instruction, Operand, OperandType,
    },
    file::parser::Parser,
    metadata::token::Token,
    Result,
};

/// Lazy decoder over one method's code.
///
/// Yields one `Result<Instruction>` per instruction and stops after the first error or at the
/// end of the code. Decoding is restartable: a new iterator over the same code yields the same
/// sequence.
#[derive(Clone)]
pub struct InstructionIter<'a> {
    parser: Parser<'a>,
    failed: bool,
}

impl<'a> InstructionIter<'a> {
    /// Decode `code`, which starts at offset 0 of a method body's code
    #[must_use]
    pub fn new(code: &'a [u8]) -> Self {
        InstructionIter {
            parser: Parser::new(code),
            failed: false,
        }
    }
}

impl Iterator for InstructionIter<'_> {
    type Item = Result<Instruction>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || !self.parser.has_more_data() {
            return None;
        }

        let result = decode_instruction(&mut self.parser);
        if result.is_err() {
            self.failed = true;
        }

        Some(result)
    }
}

/// Decode every instruction in `code`.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for an undefined opcode or a branch outside the code,
/// and [`crate::Error::OutOfBounds`] for a truncated operand.
pub fn decode_stream(code: &[u8]) -> Result<Vec<Instruction>> {
    InstructionIter::new(code).collect()
}

/// Decode one instruction at the parser's position.
///
/// The instruction's offset is the parser position. Branch and switch displacements are
/// resolved to absolute offsets relative to the start of the parser's data.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for an undefined opcode or a branch that resolves to a
/// negative offset, and [`crate::Error::OutOfBounds`] for a truncated operand.
pub fn decode_instruction(parser: &mut Parser) -> Result<Instruction> {
    let offset = parser.pos();
    let first_byte = parser.read_le::<u8>()?;

    let (cil_instruction, prefix, opcode): (&CilInstruction, u8, u8) = if first_byte == FE_PREFIX {
        let second_byte = parser.read_le::<u8>()?;
        match INSTRUCTIONS_FE.get(second_byte as usize) {
            Some(instr) => (instr, FE_PREFIX, second_byte),
            None => return Err(malformed_error!("Invalid opcode: FE {:02X}", second_byte)),
        }
    } else {
        match INSTRUCTIONS.get(first_byte as usize) {
            Some(instr) => (instr, 0, first_byte),
            None => return Err(malformed_error!("Invalid opcode: {:02X}", first_byte)),
        }
    };

    if !cil_instruction.is_defined() {
        return Err(malformed_error!(
            "Reserved opcode: {:02X}{:02X}",
            prefix,
            opcode
        ));
    }

    let is_branch = matches!(
        cil_instruction.flow,
        FlowType::ConditionalBranch | FlowType::UnconditionalBranch | FlowType::Leave
    );

    let raw = match cil_instruction.op_type {
        OperandType::None => RawOperand::None,
        OperandType::Int8 => RawOperand::Displacement(i64::from(parser.read_le::<i8>()?)),
        OperandType::UInt8 => RawOperand::Index(u16::from(parser.read_le::<u8>()?)),
        OperandType::UInt16 => RawOperand::Index(parser.read_le::<u16>()?),
        OperandType::Int32 => RawOperand::Displacement(i64::from(parser.read_le::<i32>()?)),
        OperandType::Int64 => {
            RawOperand::Value(Operand::Immediate(Immediate::Int64(parser.read_le::<i64>()?)))
        }
        OperandType::Float32 => {
            RawOperand::Value(Operand::Immediate(Immediate::Float32(parser.read_le::<f32>()?)))
        }
        OperandType::Float64 => {
            RawOperand::Value(Operand::Immediate(Immediate::Float64(parser.read_le::<f64>()?)))
        }
        OperandType::Token => {
            RawOperand::Value(Operand::Token(Token::new(parser.read_le::<u32>()?)))
        }
        OperandType::Switch => {
            let case_count = parser.read_le::<u32>()? as usize;
            if case_count > parser.remaining() / 4 {
                return Err(out_of_bounds_error!());
            }

            let mut displacements = Vec::with_capacity(case_count);
            for _ in 0..case_count {
                displacements.push(i64::from(parser.read_le::<i32>()?));
            }

            RawOperand::Switch(displacements)
        }
    };

    let next = parser.pos() as i64;
    let size = parser.pos() - offset;
    let mnemonic = cil_instruction.instr;

    let operand = match raw {
        RawOperand::None => Operand::None,
        RawOperand::Value(operand) => operand,
        RawOperand::Displacement(disp) if is_branch => Operand::Target(resolve_target(next, disp)?),
        RawOperand::Displacement(disp) => match cil_instruction.op_type {
            // ldc.i4.s and ldc.i4
            OperandType::Int8 => Operand::Immediate(Immediate::Int8(disp as i8)),
            _ => Operand::Immediate(Immediate::Int32(disp as i32)),
        },
        RawOperand::Index(index) => {
            if mnemonic.starts_with("ldarg") || mnemonic.starts_with("starg") {
                Operand::Argument(index)
            } else if mnemonic.starts_with("ldloc") || mnemonic.starts_with("stloc") {
                Operand::Local(index)
            } else {
                // unaligned. and no.
                Operand::Immediate(Immediate::UInt8(index as u8))
            }
        }
        RawOperand::Switch(displacements) => Operand::Switch(
            displacements
                .into_iter()
                .map(|disp| resolve_target(next, disp))
                .collect::<Result<Vec<u32>>>()?,
        ),
    };

    Ok(Instruction {
        offset: offset as u32,
        size: size as u32,
        opcode,
        prefix,
        mnemonic,
        flow_type: cil_instruction.flow,
        operand,
        stack_behavior: cil_instruction.stack,
    })
}

enum RawOperand {
    None,
    Value(Operand),
    Displacement(i64),
    Index(u16),
    Switch(Vec<i64>),
}

fn resolve_target(next: i64, displacement: i64) -> Result<u32> {
    let target = next + displacement;
    u32::try_from(target)
        .map_err(|_| malformed_error!("Branch target {} is outside the code", target))
}
