//! Static CIL opcode table.
//!
//! [`INSTRUCTIONS`] is indexed by the opcode byte, [`INSTRUCTIONS_FE`] by the second byte of
//! `0xFE`-prefixed opcodes. Unassigned slots carry an empty mnemonic.

use crate::disassembler::{FlowType, OperandType, StackBehavior};

use FlowType as F;
use OperandType as O;

/// Static description of one opcode.
#[derive(Debug, Clone, Copy)]
pub struct CilInstruction {
    /// The mnemonic, empty for unassigned opcodes
    pub instr: &'static str,
    /// Encoding of the operand that follows
    pub op_type: OperandType,
    /// Control flow classification
    pub flow: FlowType,
    /// Fixed stack effect, `None` when it depends on a signature
    pub stack: Option<StackBehavior>,
}

impl CilInstruction {
    /// Returns true if this slot holds a defined opcode
    #[must_use]
    pub fn is_defined(&self) -> bool {
        !self.instr.is_empty()
    }
}

const fn op(
    instr: &'static str,
    op_type: OperandType,
    flow: FlowType,
    pops: u8,
    pushes: u8,
) -> CilInstruction {
    CilInstruction {
        instr,
        op_type,
        flow,
        stack: Some(StackBehavior {
            pops,
            pushes,
            net_effect: pushes as i8 - pops as i8,
        }),
    }
}

const fn var(instr: &'static str, op_type: OperandType, flow: FlowType) -> CilInstruction {
    CilInstruction {
        instr,
        op_type,
        flow,
        stack: None,
    }
}

const EMPTY: CilInstruction = CilInstruction {
    instr: "",
    op_type: O::None,
    flow: F::Sequential,
    stack: None,
};

#[rustfmt::skip]
/// Single-byte opcodes `0x00` to `0xE0`
pub const INSTRUCTIONS: [CilInstruction; 0xE1] = [
    /* 0x00 */ op("nop", O::None, F::Sequential, 0, 0),
    /* 0x01 */ op("break", O::None, F::Trap, 0, 0),
    /* 0x02 */ op("ldarg.0", O::None, F::Sequential, 0, 1),
    /* 0x03 */ op("ldarg.1", O::None, F::Sequential, 0, 1),
    /* 0x04 */ op("ldarg.2", O::None, F::Sequential, 0, 1),
    /* 0x05 */ op("ldarg.3", O::None, F::Sequential, 0, 1),
    /* 0x06 */ op("ldloc.0", O::None, F::Sequential, 0, 1),
    /* 0x07 */ op("ldloc.1", O::None, F::Sequential, 0, 1),
    /* 0x08 */ op("ldloc.2", O::None, F::Sequential, 0, 1),
    /* 0x09 */ op("ldloc.3", O::None, F::Sequential, 0, 1),
    /* 0x0A */ op("stloc.0", O::None, F::Sequential, 1, 0),
    /* 0x0B */ op("stloc.1", O::None, F::Sequential, 1, 0),
    /* 0x0C */ op("stloc.2", O::None, F::Sequential, 1, 0),
    /* 0x0D */ op("stloc.3", O::None, F::Sequential, 1, 0),
    /* 0x0E */ op("ldarg.s", O::UInt8, F::Sequential, 0, 1),
    /* 0x0F */ op("ldarga.s", O::UInt8, F::Sequential, 0, 1),
    /* 0x10 */ op("starg.s", O::UInt8, F::Sequential, 1, 0),
    /* 0x11 */ op("ldloc.s", O::UInt8, F::Sequential, 0, 1),
    /* 0x12 */ op("ldloca.s", O::UInt8, F::Sequential, 0, 1),
    /* 0x13 */ op("stloc.s", O::UInt8, F::Sequential, 1, 0),
    /* 0x14 */ op("ldnull", O::None, F::Sequential, 0, 1),
    /* 0x15 */ op("ldc.i4.m1", O::None, F::Sequential, 0, 1),
    /* 0x16 */ op("ldc.i4.0", O::None, F::Sequential, 0, 1),
    /* 0x17 */ op("ldc.i4.1", O::None, F::Sequential, 0, 1),
    /* 0x18 */ op("ldc.i4.2", O::None, F::Sequential, 0, 1),
    /* 0x19 */ op("ldc.i4.3", O::None, F::Sequential, 0, 1),
    /* 0x1A */ op("ldc.i4.4", O::None, F::Sequential, 0, 1),
    /* 0x1B */ op("ldc.i4.5", O::None, F::Sequential, 0, 1),
    /* 0x1C */ op("ldc.i4.6", O::None, F::Sequential, 0, 1),
    /* 0x1D */ op("ldc.i4.7", O::None, F::Sequential, 0, 1),
    /* 0x1E */ op("ldc.i4.8", O::None, F::Sequential, 0, 1),
    /* 0x1F */ op("ldc.i4.s", O::Int8, F::Sequential, 0, 1),
    /* 0x20 */ op("ldc.i4", O::Int32, F::Sequential, 0, 1),
    /* 0x21 */ op("ldc.i8", O::Int64, F::Sequential, 0, 1),
    /* 0x22 */ op("ldc.r4", O::Float32, F::Sequential, 0, 1),
    /* 0x23 */ op("ldc.r8", O::Float64, F::Sequential, 0, 1),
    /* 0x24 */ EMPTY,
    /* 0x25 */ op("dup", O::None, F::Sequential, 1, 2),
    /* 0x26 */ op("pop", O::None, F::Sequential, 1, 0),
    /* 0x27 */ op("jmp", O::Token, F::Call, 0, 0),
    /* 0x28 */ var("call", O::Token, F::Call),
    /* 0x29 */ var("calli", O::Token, F::Call),
    /* 0x2A */ var("ret", O::None, F::Return),
    /* 0x2B */ op("br.s", O::Int8, F::UnconditionalBranch, 0, 0),
    /* 0x2C */ op("brfalse.s", O::Int8, F::ConditionalBranch, 1, 0),
    /* 0x2D */ op("brtrue.s", O::Int8, F::ConditionalBranch, 1, 0),
    /* 0x2E */ op("beq.s", O::Int8, F::ConditionalBranch, 2, 0),
    /* 0x2F */ op("bge.s", O::Int8, F::ConditionalBranch, 2, 0),
    /* 0x30 */ op("bgt.s", O::Int8, F::ConditionalBranch, 2, 0),
    /* 0x31 */ op("ble.s", O::Int8, F::ConditionalBranch, 2, 0),
    /* 0x32 */ op("blt.s", O::Int8, F::ConditionalBranch, 2, 0),
    /* 0x33 */ op("bne.un.s", O::Int8, F::ConditionalBranch, 2, 0),
    /* 0x34 */ op("bge.un.s", O::Int8, F::ConditionalBranch, 2, 0),
    /* 0x35 */ op("bgt.un.s", O::Int8, F::ConditionalBranch, 2, 0),
    /* 0x36 */ op("ble.un.s", O::Int8, F::ConditionalBranch, 2, 0),
    /* 0x37 */ op("blt.un.s", O::Int8, F::ConditionalBranch, 2, 0),
    /* 0x38 */ op("br", O::Int32, F::UnconditionalBranch, 0, 0),
    /* 0x39 */ op("brfalse", O::Int32, F::ConditionalBranch, 1, 0),
    /* 0x3A */ op("brtrue", O::Int32, F::ConditionalBranch, 1, 0),
    /* 0x3B */ op("beq", O::Int32, F::ConditionalBranch, 2, 0),
    /* 0x3C */ op("bge", O::Int32, F::ConditionalBranch, 2, 0),
    /* 0x3D */ op("bgt", O::Int32, F::ConditionalBranch, 2, 0),
    /* 0x3E */ op("ble", O::Int32, F::ConditionalBranch, 2, 0),
    /* 0x3F */ op("blt", O::Int32, F::ConditionalBranch, 2, 0),
    /* 0x40 */ op("bne.un", O::Int32, F::ConditionalBranch, 2, 0),
    /* 0x41 */ op("bge.un", O::Int32, F::ConditionalBranch, 2, 0),
    /* 0x42 */ op("bgt.un", O::Int32, F::ConditionalBranch, 2, 0),
    /* 0x43 */ op("ble.un", O::Int32, F::ConditionalBranch, 2, 0),
    /* 0x44 */ op("blt.un", O::Int32, F::ConditionalBranch, 2, 0),
    /* 0x45 */ op("switch", O::Switch, F::Switch, 1, 0),
    /* 0x46 */ op("ldind.i1", O::None, F::Sequential, 1, 1),
    /* 0x47 */ op("ldind.u1", O::None, F::Sequential, 1, 1),
    /* 0x48 */ op("ldind.i2", O::None, F::Sequential, 1, 1),
    /* 0x49 */ op("ldind.u2", O::None, F::Sequential, 1, 1),
    /* 0x4A */ op("ldind.i4", O::None, F::Sequential, 1, 1),
    /* 0x4B */ op("ldind.u4", O::None, F::Sequential, 1, 1),
    /* 0x4C */ op("ldind.i8", O::None, F::Sequential, 1, 1),
    /* 0x4D */ op("ldind.i", O::None, F::Sequential, 1, 1),
    /* 0x4E */ op("ldind.r4", O::None, F::Sequential, 1, 1),
    /* 0x4F */ op("ldind.r8", O::None, F::Sequential, 1, 1),
    /* 0x50 */ op("ldind.ref", O::None, F::Sequential, 1, 1),
    /* 0x51 */ op("stind.ref", O::None, F::Sequential, 2, 0),
    /* 0x52 */ op("stind.i1", O::None, F::Sequential, 2, 0),
    /* 0x53 */ op("stind.i2", O::None, F::Sequential, 2, 0),
    /* 0x54 */ op("stind.i4", O::None, F::Sequential, 2, 0),
    /* 0x55 */ op("stind.i8", O::None, F::Sequential, 2, 0),
    /* 0x56 */ op("stind.r4", O::None, F::Sequential, 2, 0),
    /* 0x57 */ op("stind.r8", O::None, F::Sequential, 2, 0),
    /* 0x58 */ op("add", O::None, F::Sequential, 2, 1),
    /* 0x59 */ op("sub", O::None, F::Sequential, 2, 1),
    /* 0x5A */ op("mul", O::None, F::Sequential, 2, 1),
    /* 0x5B */ op("div", O::None, F::Sequential, 2, 1),
    /* 0x5C */ op("div.un", O::None, F::Sequential, 2, 1),
    /* 0x5D */ op("rem", O::None, F::Sequential, 2, 1),
    /* 0x5E */ op("rem.un", O::None, F::Sequential, 2, 1),
    /* 0x5F */ op("and", O::None, F::Sequential, 2, 1),
    /* 0x60 */ op("or", O::None, F::Sequential, 2, 1),
    /* 0x61 */ op("xor", O::None, F::Sequential, 2, 1),
    /* 0x62 */ op("shl", O::None, F::Sequential, 2, 1),
    /* 0x63 */ op("shr", O::None, F::Sequential, 2, 1),
    /* 0x64 */ op("shr.un", O::None, F::Sequential, 2, 1),
    /* 0x65 */ op("neg", O::None, F::Sequential, 1, 1),
    /* 0x66 */ op("not", O::None, F::Sequential, 1, 1),
    /* 0x67 */ op("conv.i1", O::None, F::Sequential, 1, 1),
    /* 0x68 */ op("conv.i2", O::None, F::Sequential, 1, 1),
    /* 0x69 */ op("conv.i4", O::None, F::Sequential, 1, 1),
    /* 0x6A */ op("conv.i8", O::None, F::Sequential, 1, 1),
    /* 0x6B */ op("conv.r4", O::None, F::Sequential, 1, 1),
    /* 0x6C */ op("conv.r8", O::None, F::Sequential, 1, 1),
    /* 0x6D */ op("conv.u4", O::None, F::Sequential, 1, 1),
    /* 0x6E */ op("conv.u8", O::None, F::Sequential, 1, 1),
    /* 0x6F */ var("callvirt", O::Token, F::Call),
    /* 0x70 */ op("cpobj", O::Token, F::Sequential, 2, 0),
    /* 0x71 */ op("ldobj", O::Token, F::Sequential, 1, 1),
    /* 0x72 */ op("ldstr", O::Token, F::Sequential, 0, 1),
    /* 0x73 */ var("newobj", O::Token, F::Call),
    /* 0x74 */ op("castclass", O::Token, F::Sequential, 1, 1),
    /* 0x75 */ op("isinst", O::Token, F::Sequential, 1, 1),
    /* 0x76 */ op("conv.r.un", O::None, F::Sequential, 1, 1),
    /* 0x77 */ EMPTY,
    /* 0x78 */ EMPTY,
    /* 0x79 */ op("unbox", O::Token, F::Sequential, 1, 1),
    /* 0x7A */ op("throw", O::None, F::Throw, 1, 0),
    /* 0x7B */ op("ldfld", O::Token, F::Sequential, 1, 1),
    /* 0x7C */ op("ldflda", O::Token, F::Sequential, 1, 1),
    /* 0x7D */ op("stfld", O::Token, F::Sequential, 2, 0),
    /* 0x7E */ op("ldsfld", O::Token, F::Sequential, 0, 1),
    /* 0x7F */ op("ldsflda", O::Token, F::Sequential, 0, 1),
    /* 0x80 */ op("stsfld", O::Token, F::Sequential, 1, 0),
    /* 0x81 */ op("stobj", O::Token, F::Sequential, 2, 0),
    /* 0x82 */ op("conv.ovf.i1.un", O::None, F::Sequential, 1, 1),
    /* 0x83 */ op("conv.ovf.i2.un", O::None, F::Sequential, 1, 1),
    /* 0x84 */ op("conv.ovf.i4.un", O::None, F::Sequential, 1, 1),
    /* 0x85 */ op("conv.ovf.i8.un", O::None, F::Sequential, 1, 1),
    /* 0x86 */ op("conv.ovf.u1.un", O::None, F::Sequential, 1, 1),
    /* 0x87 */ op("conv.ovf.u2.un", O::None, F::Sequential, 1, 1),
    /* 0x88 */ op("conv.ovf.u4.un", O::None, F::Sequential, 1, 1),
    /* 0x89 */ op("conv.ovf.u8.un", O::None, F::Sequential, 1, 1),
    /* 0x8A */ op("conv.ovf.i.un", O::None, F::Sequential, 1, 1),
    /* 0x8B */ op("conv.ovf.u.un", O::None, F::Sequential, 1, 1),
    /* 0x8C */ op("box", O::Token, F::Sequential, 1, 1),
    /* 0x8D */ op("newarr", O::Token, F::Sequential, 1, 1),
    /* 0x8E */ op("ldlen", O::None, F::Sequential, 1, 1),
    /* 0x8F */ op("ldelema", O::Token, F::Sequential, 2, 1),
    /* 0x90 */ op("ldelem.i1", O::None, F::Sequential, 2, 1),
    /* 0x91 */ op("ldelem.u1", O::None, F::Sequential, 2, 1),
    /* 0x92 */ op("ldelem.i2", O::None, F::Sequential, 2, 1),
    /* 0x93 */ op("ldelem.u2", O::None, F::Sequential, 2, 1),
    /* 0x94 */ op("ldelem.i4", O::None, F::Sequential, 2, 1),
    /* 0x95 */ op("ldelem.u4", O::None, F::Sequential, 2, 1),
    /* 0x96 */ op("ldelem.i8", O::None, F::Sequential, 2, 1),
    /* 0x97 */ op("ldelem.i", O::None, F::Sequential, 2, 1),
    /* 0x98 */ op("ldelem.r4", O::None, F::Sequential, 2, 1),
    /* 0x99 */ op("ldelem.r8", O::None, F::Sequential, 2, 1),
    /* 0x9A */ op("ldelem.ref", O::None, F::Sequential, 2, 1),
    /* 0x9B */ op("stelem.i", O::None, F::Sequential, 3, 0),
    /* 0x9C */ op("stelem.i1", O::None, F::Sequential, 3, 0),
    /* 0x9D */ op("stelem.i2", O::None, F::Sequential, 3, 0),
    /* 0x9E */ op("stelem.i4", O::None, F::Sequential, 3, 0),
    /* 0x9F */ op("stelem.i8", O::None, F::Sequential, 3, 0),
    /* 0xA0 */ op("stelem.r4", O::None, F::Sequential, 3, 0),
    /* 0xA1 */ op("stelem.r8", O::None, F::Sequential, 3, 0),
    /* 0xA2 */ op("stelem.ref", O::None, F::Sequential, 3, 0),
    /* 0xA3 */ op("ldelem", O::Token, F::Sequential, 2, 1),
    /* 0xA4 */ op("stelem", O::Token, F::Sequential, 3, 0),
    /* 0xA5 */ op("unbox.any", O::Token, F::Sequential, 1, 1),
    /* 0xA6 */ EMPTY,
    /* 0xA7 */ EMPTY,
    /* 0xA8 */ EMPTY,
    /* 0xA9 */ EMPTY,
    /* 0xAA */ EMPTY,
    /* 0xAB */ EMPTY,
    /* 0xAC */ EMPTY,
    /* 0xAD */ EMPTY,
    /* 0xAE */ EMPTY,
    /* 0xAF */ EMPTY,
    /* 0xB0 */ EMPTY,
    /* 0xB1 */ EMPTY,
    /* 0xB2 */ EMPTY,
    /* 0xB3 */ op("conv.ovf.i1", O::None, F::Sequential, 1, 1),
    /* 0xB4 */ op("conv.ovf.u1", O::None, F::Sequential, 1, 1),
    /* 0xB5 */ op("conv.ovf.i2", O::None, F::Sequential, 1, 1),
    /* 0xB6 */ op("conv.ovf.u2", O::None, F::Sequential, 1, 1),
    /* 0xB7 */ op("conv.ovf.i4", O::None, F::Sequential, 1, 1),
    /* 0xB8 */ op("conv.ovf.u4", O::None, F::Sequential, 1, 1),
    /* 0xB9 */ op("conv.ovf.i8", O::None, F::Sequential, 1, 1),
    /* 0xBA */ op("conv.ovf.u8", O::None, F::Sequential, 1, 1),
    /* 0xBB */ EMPTY,
    /* 0xBC */ EMPTY,
    /* 0xBD */ EMPTY,
    /* 0xBE */ EMPTY,
    /* 0xBF */ EMPTY,
    /* 0xC0 */ EMPTY,
    /* 0xC1 */ EMPTY,
    /* 0xC2 */ op("refanyval", O::Token, F::Sequential, 1, 1),
    /* 0xC3 */ op("ckfinite", O::None, F::Sequential, 1, 1),
    /* 0xC4 */ EMPTY,
    /* 0xC5 */ EMPTY,
    /* 0xC6 */ op("mkrefany", O::Token, F::Sequential, 1, 1),
    /* 0xC7 */ EMPTY,
    /* 0xC8 */ EMPTY,
    /* 0xC9 */ EMPTY,
    /* 0xCA */ EMPTY,
    /* 0xCB */ EMPTY,
    /* 0xCC */ EMPTY,
    /* 0xCD */ EMPTY,
    /* 0xCE */ EMPTY,
    /* 0xCF */ EMPTY,
    /* 0xD0 */ op("ldtoken", O::Token, F::Sequential, 0, 1),
    /* 0xD1 */ op("conv.u2", O::None, F::Sequential, 1, 1),
    /* 0xD2 */ op("conv.u1", O::None, F::Sequential, 1, 1),
    /* 0xD3 */ op("conv.i", O::None, F::Sequential, 1, 1),
    /* 0xD4 */ op("conv.ovf.i", O::None, F::Sequential, 1, 1),
    /* 0xD5 */ op("conv.ovf.u", O::None, F::Sequential, 1, 1),
    /* 0xD6 */ op("add.ovf", O::None, F::Sequential, 2, 1),
    /* 0xD7 */ op("add.ovf.un", O::None, F::Sequential, 2, 1),
    /* 0xD8 */ op("mul.ovf", O::None, F::Sequential, 2, 1),
    /* 0xD9 */ op("mul.ovf.un", O::None, F::Sequential, 2, 1),
    /* 0xDA */ op("sub.ovf", O::None, F::Sequential, 2, 1),
    /* 0xDB */ op("sub.ovf.un", O::None, F::Sequential, 2, 1),
    /* 0xDC */ op("endfinally", O::None, F::EndFinally, 0, 0),
    /* 0xDD */ var("leave", O::Int32, F::Leave),
    /* 0xDE */ var("leave.s", O::Int8, F::Leave),
    /* 0xDF */ op("stind.i", O::None, F::Sequential, 2, 0),
    /* 0xE0 */ op("conv.u", O::None, F::Sequential, 1, 1),
];

#[rustfmt::skip]
/// Two-byte opcodes `0xFE 0x00` to `0xFE 0x1E`
pub const INSTRUCTIONS_FE: [CilInstruction; 0x1F] = [
    /* 0x00 */ op("arglist", O::None, F::Sequential, 0, 1),
    /* 0x01 */ op("ceq", O::None, F::Sequential, 2, 1),
    /* 0x02 */ op("cgt", O::None, F::Sequential, 2, 1),
    /* 0x03 */ op("cgt.un", O::None, F::Sequential, 2, 1),
    /* 0x04 */ op("clt", O::None, F::Sequential, 2, 1),
    /* 0x05 */ op("clt.un", O::None, F::Sequential, 2, 1),
    /* 0x06 */ op("ldftn", O::Token, F::Sequential, 0, 1),
    /* 0x07 */ op("ldvirtftn", O::Token, F::Sequential, 1, 1),
    /* 0x08 */ EMPTY,
    /* 0x09 */ op("ldarg", O::UInt16, F::Sequential, 0, 1),
    /* 0x0A */ op("ldarga", O::UInt16, F::Sequential, 0, 1),
    /* 0x0B */ op("starg", O::UInt16, F::Sequential, 1, 0),
    /* 0x0C */ op("ldloc", O::UInt16, F::Sequential, 0, 1),
    /* 0x0D */ op("ldloca", O::UInt16, F::Sequential, 0, 1),
    /* 0x0E */ op("stloc", O::UInt16, F::Sequential, 1, 0),
    /* 0x0F */ op("localloc", O::None, F::Sequential, 1, 1),
    /* 0x10 */ EMPTY,
    /* 0x11 */ op("endfilter", O::None, F::EndFinally, 1, 0),
    /* 0x12 */ op("unaligned.", O::UInt8, F::Sequential, 0, 0),
    /* 0x13 */ op("volatile.", O::None, F::Sequential, 0, 0),
    /* 0x14 */ op("tail.", O::None, F::Sequential, 0, 0),
    /* 0x15 */ op("initobj", O::Token, F::Sequential, 1, 0),
    /* 0x16 */ op("constrained.", O::Token, F::Sequential, 0, 0),
    /* 0x17 */ op("cpblk", O::None, F::Sequential, 3, 0),
    /* 0x18 */ op("initblk", O::None, F::Sequential, 3, 0),
    /* 0x19 */ op("no.", O::UInt8, F::Sequential, 0, 0),
    /* 0x1A */ op("rethrow", O::None, F::Throw, 0, 0),
    /* 0x1B */ EMPTY,
    /* 0x1C */ op("sizeof", O::Token, F::Sequential, 0, 1),
    /* 0x1D */ op("refanytype", O::None, F::Sequential, 1, 1),
    /* 0x1E */ op("readonly.", O::None, F::Sequential, 0, 0),
];
