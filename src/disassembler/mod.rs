//! CIL instruction decoding and re-encoding.
//!
//! # Key Types
//! - [`Instruction`] - A decoded CIL instruction
//! - [`Operand`] - Instruction operands (immediates, tokens, absolute branch targets)
//! - [`FlowType`] - How an instruction affects control flow, shared with the native decoder
//!
//! # Main Functions
//! - [`decode_instruction`] - Decode a single instruction
//! - [`decode_stream`] / [`InstructionIter`] - Decode a method's code
//! - [`encode_instructions`] - Lay out an edited instruction list again
//!
//! # Example
//! ```rust
//! use pinpatch::disassembler::{decode_stream, encode_instructions};
//!
//! let code = [0x00, 0x2A]; // nop, ret
//! let instructions = decode_stream(&code)?;
//! assert_eq!(instructions[1].mnemonic, "ret");
//! assert_eq!(encode_instructions(&instructions)?.code, code);
//! # Ok::<(), pinpatch::Error>(())
//! ```

mod decoder;
mod encoder;
mod instruction;
mod instructions;
pub mod opcodes;

pub use decoder::{decode_instruction, decode_stream, InstructionIter};
pub use encoder::{build_instruction, encode_instructions, EncodedCode};
pub use instruction::{FlowType, Immediate, Instruction, Operand, OperandType, StackBehavior};
pub use instructions::{CilInstruction, INSTRUCTIONS, INSTRUCTIONS_FE};
