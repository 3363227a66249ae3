//! CIL opcode byte constants (ECMA-335) used by the decoder, encoder and patch descriptors.
//!
//! Single-byte opcodes are named after their mnemonic (e.g. [`LDFLD`] = `0x7B`). The
//! [`FE_PREFIX`] constant holds the first byte of every two-byte opcode.
#![allow(missing_docs)]

// Misc
pub const NOP: u8 = 0x00;
pub const BREAK: u8 = 0x01;

// Load argument shorthand
pub const LDARG_0: u8 = 0x02;
pub const LDARG_1: u8 = 0x03;

// Locals
pub const LDLOC_0: u8 = 0x06;
pub const STLOC_0: u8 = 0x0A;

// Constant loaders
pub const LDNULL: u8 = 0x14;
pub const LDC_I4_0: u8 = 0x16;
pub const LDC_I4_1: u8 = 0x17;
pub const LDC_I4_S: u8 = 0x1F;
pub const LDC_I4: u8 = 0x20;
pub const LDC_R4: u8 = 0x22;

// Stack manipulation
pub const DUP: u8 = 0x25;
pub const POP: u8 = 0x26;

// Calls and return
pub const CALL: u8 = 0x28;
pub const RET: u8 = 0x2A;

// Short branches (0x2B – 0x37)
pub const BR_S: u8 = 0x2B;
pub const BRFALSE_S: u8 = 0x2C;
pub const BRTRUE_S: u8 = 0x2D;
pub const BGT_S: u8 = 0x30;
pub const BLT_UN_S: u8 = 0x37;

// Long branches (0x38 – 0x44), each `short + 0x0D`
pub const BR: u8 = 0x38;
pub const BRFALSE: u8 = 0x39;
pub const BRTRUE: u8 = 0x3A;
pub const BGT: u8 = 0x3D;
pub const BLT_UN: u8 = 0x44;

pub const SWITCH: u8 = 0x45;

// Arithmetic / conversion
pub const ADD: u8 = 0x58;
pub const CONV_R4: u8 = 0x6B;

// Objects and fields
pub const CALLVIRT: u8 = 0x6F;
pub const THROW: u8 = 0x7A;
pub const LDFLD: u8 = 0x7B;
pub const STFLD: u8 = 0x7D;

// Exception handling
pub const ENDFINALLY: u8 = 0xDC;
pub const LEAVE: u8 = 0xDD;
pub const LEAVE_S: u8 = 0xDE;

// Two-byte opcodes; the first byte is always FE_PREFIX
pub const FE_PREFIX: u8 = 0xFE;
pub const FE_CEQ: u8 = 0x01;
pub const FE_LDARG: u8 = 0x09;
pub const FE_ENDFILTER: u8 = 0x11;
pub const FE_RETHROW: u8 = 0x1A;
