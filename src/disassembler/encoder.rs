//! Re-encoding of decoded CIL instruction lists.
//!
//! Instructions decoded by [`crate::disassembler::decode_stream`] carry absolute branch targets
//! that name the *original* offset of the target instruction. After a list has been edited (an
//! instruction replaced by one of a different size keeps the `offset` of the one it replaced),
//! [`encode_instructions`] lays the list out again:
//!
//! - every branch target is resolved to the index of the instruction it names,
//! - branches with a short and a long form start long and are shrunk to the short form while
//!   the displacement fits a signed byte, repeated until nothing changes,
//! - switch tables are recomputed against the new layout.
//!
//! The result maps every original instruction offset (and the original end of the code) to its
//! new offset, which is what exception clauses need to be remapped.

use std::collections::HashMap;

use crate::{
    disassembler::{
        instructions::{CilInstruction, INSTRUCTIONS, INSTRUCTIONS_FE},
        opcodes::{self, FE_PREFIX},
        Immediate, Instruction, Operand, OperandType,
    },
    metadata::method::{ExceptionHandler, ExceptionHandlerFlags},
    Result,
};

/// Distance between the short and the long form of the conditional and unconditional branches
const LONG_BRANCH_DELTA: u8 = opcodes::BR - opcodes::BR_S;

/// Re-encoded code plus the mapping from original to new offsets.
#[derive(Debug, Clone)]
pub struct EncodedCode {
    /// The encoded instruction bytes
    pub code: Vec<u8>,
    /// New offset of every instruction, by index
    pub offsets: Vec<u32>,
    remap: HashMap<u32, u32>,
}

impl EncodedCode {
    /// New offset of the instruction that originally started at `offset`, or of the original
    /// end of the code
    #[must_use]
    pub fn map_offset(&self, offset: u32) -> Option<u32> {
        self.remap.get(&offset).copied()
    }

    /// Rewrite the offsets and lengths of `handlers` to the new layout.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if a clause boundary does not fall on an instruction
    /// boundary of the original code.
    pub fn remap_handlers(&self, handlers: &[ExceptionHandler]) -> Result<Vec<ExceptionHandler>> {
        handlers
            .iter()
            .map(|handler| {
                let (try_offset, try_length) =
                    self.map_range(handler.try_offset, handler.try_length)?;
                let (handler_offset, handler_length) =
                    self.map_range(handler.handler_offset, handler.handler_length)?;

                let filter_offset = if handler.flags.contains(ExceptionHandlerFlags::FILTER) {
                    self.map_offset(handler.filter_offset).ok_or_else(|| {
                        malformed_error!(
                            "Filter offset {:#x} is not an instruction",
                            handler.filter_offset
                        )
                    })?
                } else {
                    handler.filter_offset
                };

                Ok(ExceptionHandler {
                    flags: handler.flags,
                    try_offset,
                    try_length,
                    handler_offset,
                    handler_length,
                    filter_offset,
                })
            })
            .collect()
    }

    fn map_range(&self, start: u32, length: u32) -> Result<(u32, u32)> {
        let end = start
            .checked_add(length)
            .ok_or_else(|| malformed_error!("Exception clause range overflows"))?;

        match (self.map_offset(start), self.map_offset(end)) {
            (Some(new_start), Some(new_end)) if new_end >= new_start => {
                Ok((new_start, new_end - new_start))
            }
            _ => Err(malformed_error!(
                "Exception clause {:#x}+{:#x} does not match instruction boundaries",
                start,
                length
            )),
        }
    }
}

/// Build a standalone instruction for `opcode` (second byte when `prefix` is `0xFE`).
///
/// The returned instruction has offset 0; callers placing it into an existing list assign the
/// offset of the slot it takes over.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for an undefined opcode.
pub fn build_instruction(prefix: u8, opcode: u8, operand: Operand) -> Result<Instruction> {
    let cil_instruction = lookup(prefix, opcode)?;
    let mut instruction = Instruction {
        offset: 0,
        size: 0,
        opcode,
        prefix,
        mnemonic: cil_instruction.instr,
        flow_type: cil_instruction.flow,
        operand,
        stack_behavior: cil_instruction.stack,
    };

    instruction.size = encoded_size(&instruction, cil_instruction, false)?;
    Ok(instruction)
}

/// Lay out and encode `instructions`.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if a branch names an offset that is not the start of an
/// instruction in the list, if two instructions claim the same offset, or if an operand does not
/// fit the opcode's encoding.
pub fn encode_instructions(instructions: &[Instruction]) -> Result<EncodedCode> {
    let mut index_of = HashMap::with_capacity(instructions.len() + 1);
    for (index, instruction) in instructions.iter().enumerate() {
        if index_of.insert(instruction.offset, index).is_some() {
            return Err(malformed_error!(
                "Duplicate instruction offset {:#x}",
                instruction.offset
            ));
        }
    }

    let original_end = instructions
        .last()
        .map_or(0, |last| last.offset + last.size);
    index_of.entry(original_end).or_insert(instructions.len());

    let resolve = |target: u32| -> Result<usize> {
        index_of
            .get(&target)
            .copied()
            .ok_or_else(|| malformed_error!("Branch target {:#x} is not an instruction", target))
    };

    let mut targets: Vec<Vec<usize>> = Vec::with_capacity(instructions.len());
    let mut tables: Vec<&CilInstruction> = Vec::with_capacity(instructions.len());
    for instruction in instructions {
        tables.push(lookup(instruction.prefix, instruction.opcode)?);
        targets.push(
            instruction
                .branch_targets()
                .into_iter()
                .map(resolve)
                .collect::<Result<Vec<usize>>>()?,
        );
    }

    // Start every relaxable branch long and shrink until stable
    let mut short: Vec<bool> = vec![false; instructions.len()];
    let mut offsets = layout(instructions, &tables, &short)?;

    loop {
        let mut changed = false;

        for (index, instruction) in instructions.iter().enumerate() {
            if short[index] || branch_forms(instruction).is_none() {
                continue;
            }

            let Some(&target) = targets[index].first() else {
                continue;
            };

            let displacement = i64::from(offsets[target]) - (i64::from(offsets[index]) + 2);
            if i8::try_from(displacement).is_ok() {
                short[index] = true;
                changed = true;
            }
        }

        if !changed {
            break;
        }

        offsets = layout(instructions, &tables, &short)?;
    }

    let mut code = Vec::with_capacity(offsets[instructions.len()] as usize);
    for (index, instruction) in instructions.iter().enumerate() {
        let next = i64::from(offsets[index + 1]);

        if let Some((short_opcode, long_opcode)) = branch_forms(instruction) {
            let target = targets[index].first().ok_or_else(|| {
                malformed_error!(
                    "{} without a target at {:#x}",
                    instruction.mnemonic,
                    instruction.offset
                )
            })?;
            let target = i64::from(offsets[*target]);
            if short[index] {
                code.push(short_opcode);
                let displacement = i8::try_from(target - next).map_err(|_| {
                    malformed_error!("Short branch out of range at {:#x}", instruction.offset)
                })?;
                code.push(displacement as u8);
            } else {
                code.push(long_opcode);
                let displacement = i32::try_from(target - next).map_err(|_| {
                    malformed_error!("Branch out of range at {:#x}", instruction.offset)
                })?;
                code.extend_from_slice(&displacement.to_le_bytes());
            }
            continue;
        }

        if instruction.prefix == FE_PREFIX {
            code.push(FE_PREFIX);
        }
        code.push(instruction.opcode);

        if let Operand::Switch(_) = instruction.operand {
            let count = u32::try_from(targets[index].len())
                .map_err(|_| malformed_error!("Switch table too large"))?;
            code.extend_from_slice(&count.to_le_bytes());
            for target in &targets[index] {
                let displacement = i32::try_from(i64::from(offsets[*target]) - next)
                    .map_err(|_| malformed_error!("Switch target out of range"))?;
                code.extend_from_slice(&displacement.to_le_bytes());
            }
            continue;
        }

        encode_operand(&mut code, instruction, tables[index])?;
    }

    let mut remap = HashMap::with_capacity(instructions.len() + 1);
    for (index, instruction) in instructions.iter().enumerate() {
        remap.insert(instruction.offset, offsets[index]);
    }
    remap
        .entry(original_end)
        .or_insert(offsets[instructions.len()]);

    Ok(EncodedCode {
        code,
        offsets,
        remap,
    })
}

fn lookup(prefix: u8, opcode: u8) -> Result<&'static CilInstruction> {
    let table: &'static [CilInstruction] = if prefix == FE_PREFIX {
        &INSTRUCTIONS_FE
    } else {
        &INSTRUCTIONS
    };

    match table.get(opcode as usize) {
        Some(instruction) if instruction.is_defined() => Ok(instruction),
        _ => Err(malformed_error!("Invalid opcode: {:02X}{:02X}", prefix, opcode)),
    }
}

/// Short and long opcode of a relaxable branch
fn branch_forms(instruction: &Instruction) -> Option<(u8, u8)> {
    if instruction.prefix != 0 {
        return None;
    }

    match instruction.opcode {
        op @ opcodes::BR_S..=opcodes::BLT_UN_S => Some((op, op + LONG_BRANCH_DELTA)),
        op @ opcodes::BR..=opcodes::BLT_UN => Some((op - LONG_BRANCH_DELTA, op)),
        opcodes::LEAVE | opcodes::LEAVE_S => Some((opcodes::LEAVE_S, opcodes::LEAVE)),
        _ => None,
    }
}

/// Offsets of every instruction plus the end offset for the given branch forms
fn layout(
    instructions: &[Instruction],
    tables: &[&CilInstruction],
    short: &[bool],
) -> Result<Vec<u32>> {
    let mut offsets = Vec::with_capacity(instructions.len() + 1);
    let mut position = 0u32;

    for (index, instruction) in instructions.iter().enumerate() {
        offsets.push(position);
        let size = encoded_size(instruction, tables[index], short[index])?;
        position = position
            .checked_add(size)
            .ok_or_else(|| malformed_error!("Method code exceeds u32 range"))?;
    }

    offsets.push(position);
    Ok(offsets)
}

fn encoded_size(instruction: &Instruction, table: &CilInstruction, short: bool) -> Result<u32> {
    if branch_forms(instruction).is_some() {
        return Ok(if short { 2 } else { 5 });
    }

    let opcode_size = if instruction.prefix == FE_PREFIX { 2 } else { 1 };
    let operand_size = match table.op_type.size() {
        Some(size) => size as u32,
        None => match &instruction.operand {
            Operand::Switch(targets) => u32::try_from(targets.len())
                .ok()
                .and_then(|count| count.checked_mul(4))
                .and_then(|size| size.checked_add(4))
                .ok_or_else(|| malformed_error!("Switch table too large"))?,
            _ => return Err(malformed_error!("Switch without targets")),
        },
    };

    Ok(opcode_size + operand_size)
}

fn encode_operand(
    code: &mut Vec<u8>,
    instruction: &Instruction,
    table: &CilInstruction,
) -> Result<()> {
    match (table.op_type, &instruction.operand) {
        (OperandType::None, Operand::None) => {}
        (OperandType::Int8, Operand::Immediate(Immediate::Int8(value))) => code.push(*value as u8),
        (OperandType::UInt8, Operand::Immediate(Immediate::UInt8(value))) => code.push(*value),
        (OperandType::UInt8, Operand::Argument(index) | Operand::Local(index)) => {
            let index = u8::try_from(*index).map_err(|_| {
                malformed_error!("Index {} does not fit {}", index, instruction.mnemonic)
            })?;
            code.push(index);
        }
        (OperandType::UInt16, Operand::Argument(index) | Operand::Local(index)) => {
            code.extend_from_slice(&index.to_le_bytes());
        }
        (OperandType::Int32, Operand::Immediate(Immediate::Int32(value))) => {
            code.extend_from_slice(&value.to_le_bytes());
        }
        (OperandType::Int64, Operand::Immediate(Immediate::Int64(value))) => {
            code.extend_from_slice(&value.to_le_bytes());
        }
        (OperandType::Float32, Operand::Immediate(Immediate::Float32(value))) => {
            code.extend_from_slice(&value.to_le_bytes());
        }
        (OperandType::Float64, Operand::Immediate(Immediate::Float64(value))) => {
            code.extend_from_slice(&value.to_le_bytes());
        }
        (OperandType::Token, Operand::Token(token)) => {
            code.extend_from_slice(&token.value().to_le_bytes());
        }
        (_, operand) => {
            return Err(malformed_error!(
                "Operand {:?} does not match {}",
                operand,
                instruction.mnemonic
            ))
        }
    }

    Ok(())
}
