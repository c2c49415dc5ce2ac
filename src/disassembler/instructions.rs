//! Opcode tables of the CIL instruction set (ECMA-335 Partition III).
//!
//! [`INSTRUCTIONS`] is indexed by the opcode byte, [`INSTRUCTIONS_FE`] by the byte following
//! the `0xFE` prefix. Reserved opcodes have an empty mnemonic.

use crate::disassembler::{CilInstruction, FlowType, OperandType};

const fn op(instr: &'static str, op_type: OperandType, flow: FlowType) -> CilInstruction {
    CilInstruction {
        instr,
        op_type,
        flow,
    }
}

const RESERVED: CilInstruction = op("", OperandType::None, FlowType::Sequential);

/// Single byte opcodes `0x00..=0xE0`
pub const INSTRUCTIONS: [CilInstruction; 225] = [
    /* 00 */ op("nop", OperandType::None, FlowType::Sequential),
    /* 01 */ op("break", OperandType::None, FlowType::Sequential),
    /* 02 */ op("ldarg.0", OperandType::None, FlowType::Sequential),
    /* 03 */ op("ldarg.1", OperandType::None, FlowType::Sequential),
    /* 04 */ op("ldarg.2", OperandType::None, FlowType::Sequential),
    /* 05 */ op("ldarg.3", OperandType::None, FlowType::Sequential),
    /* 06 */ op("ldloc.0", OperandType::None, FlowType::Sequential),
    /* 07 */ op("ldloc.1", OperandType::None, FlowType::Sequential),
    /* 08 */ op("ldloc.2", OperandType::None, FlowType::Sequential),
    /* 09 */ op("ldloc.3", OperandType::None, FlowType::Sequential),
    /* 0A */ op("stloc.0", OperandType::None, FlowType::Sequential),
    /* 0B */ op("stloc.1", OperandType::None, FlowType::Sequential),
    /* 0C */ op("stloc.2", OperandType::None, FlowType::Sequential),
    /* 0D */ op("stloc.3", OperandType::None, FlowType::Sequential),
    /* 0E */ op("ldarg.s", OperandType::UInt8, FlowType::Sequential),
    /* 0F */ op("ldarga.s", OperandType::UInt8, FlowType::Sequential),
    /* 10 */ op("starg.s", OperandType::UInt8, FlowType::Sequential),
    /* 11 */ op("ldloc.s", OperandType::UInt8, FlowType::Sequential),
    /* 12 */ op("ldloca.s", OperandType::UInt8, FlowType::Sequential),
    /* 13 */ op("stloc.s", OperandType::UInt8, FlowType::Sequential),
    /* 14 */ op("ldnull", OperandType::None, FlowType::Sequential),
    /* 15 */ op("ldc.i4.m1", OperandType::None, FlowType::Sequential),
    /* 16 */ op("ldc.i4.0", OperandType::None, FlowType::Sequential),
    /* 17 */ op("ldc.i4.1", OperandType::None, FlowType::Sequential),
    /* 18 */ op("ldc.i4.2", OperandType::None, FlowType::Sequential),
    /* 19 */ op("ldc.i4.3", OperandType::None, FlowType::Sequential),
    /* 1A */ op("ldc.i4.4", OperandType::None, FlowType::Sequential),
    /* 1B */ op("ldc.i4.5", OperandType::None, FlowType::Sequential),
    /* 1C */ op("ldc.i4.6", OperandType::None, FlowType::Sequential),
    /* 1D */ op("ldc.i4.7", OperandType::None, FlowType::Sequential),
    /* 1E */ op("ldc.i4.8", OperandType::None, FlowType::Sequential),
    /* 1F */ op("ldc.i4.s", OperandType::Int8, FlowType::Sequential),
    /* 20 */ op("ldc.i4", OperandType::Int32, FlowType::Sequential),
    /* 21 */ op("ldc.i8", OperandType::Int64, FlowType::Sequential),
    /* 22 */ op("ldc.r4", OperandType::Float32, FlowType::Sequential),
    /* 23 */ op("ldc.r8", OperandType::Float64, FlowType::Sequential),
    /* 24 */ RESERVED,
    /* 25 */ op("dup", OperandType::None, FlowType::Sequential),
    /* 26 */ op("pop", OperandType::None, FlowType::Sequential),
    /* 27 */ op("jmp", OperandType::Token, FlowType::Call),
    /* 28 */ op("call", OperandType::Token, FlowType::Call),
    /* 29 */ op("calli", OperandType::Token, FlowType::Call),
    /* 2A */ op("ret", OperandType::None, FlowType::Return),
    /* 2B */ op("br.s", OperandType::Int8, FlowType::UnconditionalBranch),
    /* 2C */ op("brfalse.s", OperandType::Int8, FlowType::ConditionalBranch),
    /* 2D */ op("brtrue.s", OperandType::Int8, FlowType::ConditionalBranch),
    /* 2E */ op("beq.s", OperandType::Int8, FlowType::ConditionalBranch),
    /* 2F */ op("bge.s", OperandType::Int8, FlowType::ConditionalBranch),
    /* 30 */ op("bgt.s", OperandType::Int8, FlowType::ConditionalBranch),
    /* 31 */ op("ble.s", OperandType::Int8, FlowType::ConditionalBranch),
    /* 32 */ op("blt.s", OperandType::Int8, FlowType::ConditionalBranch),
    /* 33 */ op("bne.un.s", OperandType::Int8, FlowType::ConditionalBranch),
    /* 34 */ op("bge.un.s", OperandType::Int8, FlowType::ConditionalBranch),
    /* 35 */ op("bgt.un.s", OperandType::Int8, FlowType::ConditionalBranch),
    /* 36 */ op("ble.un.s", OperandType::Int8, FlowType::ConditionalBranch),
    /* 37 */ op("blt.un.s", OperandType::Int8, FlowType::ConditionalBranch),
    /* 38 */ op("br", OperandType::Int32, FlowType::UnconditionalBranch),
    /* 39 */ op("brfalse", OperandType::Int32, FlowType::ConditionalBranch),
    /* 3A */ op("brtrue", OperandType::Int32, FlowType::ConditionalBranch),
    /* 3B */ op("beq", OperandType::Int32, FlowType::ConditionalBranch),
    /* 3C */ op("bge", OperandType::Int32, FlowType::ConditionalBranch),
    /* 3D */ op("bgt", OperandType::Int32, FlowType::ConditionalBranch),
    /* 3E */ op("ble", OperandType::Int32, FlowType::ConditionalBranch),
    /* 3F */ op("blt", OperandType::Int32, FlowType::ConditionalBranch),
    /* 40 */ op("bne.un", OperandType::Int32, FlowType::ConditionalBranch),
    /* 41 */ op("bge.un", OperandType::Int32, FlowType::ConditionalBranch),
    /* 42 */ op("bgt.un", OperandType::Int32, FlowType::ConditionalBranch),
    /* 43 */ op("ble.un", OperandType::Int32, FlowType::ConditionalBranch),
    /* 44 */ op("blt.un", OperandType::Int32, FlowType::ConditionalBranch),
    /* 45 */ op("switch", OperandType::Switch, FlowType::Switch),
    /* 46 */ op("ldind.i1", OperandType::None, FlowType::Sequential),
    /* 47 */ op("ldind.u1", OperandType::None, FlowType::Sequential),
    /* 48 */ op("ldind.i2", OperandType::None, FlowType::Sequential),
    /* 49 */ op("ldind.u2", OperandType::None, FlowType::Sequential),
    /* 4A */ op("ldind.i4", OperandType::None, FlowType::Sequential),
    /* 4B */ op("ldind.u4", OperandType::None, FlowType::Sequential),
    /* 4C */ op("ldind.i8", OperandType::None, FlowType::Sequential),
    /* 4D */ op("ldind.i", OperandType::None, FlowType::Sequential),
    /* 4E */ op("ldind.r4", OperandType::None, FlowType::Sequential),
    /* 4F */ op("ldind.r8", OperandType::None, FlowType::Sequential),
    /* 50 */ op("ldind.ref", OperandType::None, FlowType::Sequential),
    /* 51 */ op("stind.ref", OperandType::None, FlowType::Sequential),
    /* 52 */ op("stind.i1", OperandType::None, FlowType::Sequential),
    /* 53 */ op("stind.i2", OperandType::None, FlowType::Sequential),
    /* 54 */ op("stind.i4", OperandType::None, FlowType::Sequential),
    /* 55 */ op("stind.i8", OperandType::None, FlowType::Sequential),
    /* 56 */ op("stind.r4", OperandType::None, FlowType::Sequential),
    /* 57 */ op("stind.r8", OperandType::None, FlowType::Sequential),
    /* 58 */ op("add", OperandType::None, FlowType::Sequential),
    /* 59 */ op("sub", OperandType::None, FlowType::Sequential),
    /* 5A */ op("mul", OperandType::None, FlowType::Sequential),
    /* 5B */ op("div", OperandType::None, FlowType::Sequential),
    /* 5C */ op("div.un", OperandType::None, FlowType::Sequential),
    /* 5D */ op("rem", OperandType::None, FlowType::Sequential),
    /* 5E */ op("rem.un", OperandType::None, FlowType::Sequential),
    /* 5F */ op("and", OperandType::None, FlowType::Sequential),
    /* 60 */ op("or", OperandType::None, FlowType::Sequential),
    /* 61 */ op("xor", OperandType::None, FlowType::Sequential),
    /* 62 */ op("shl", OperandType::None, FlowType::Sequential),
    /* 63 */ op("shr", OperandType::None, FlowType::Sequential),
    /* 64 */ op("shr.un", OperandType::None, FlowType::Sequential),
    /* 65 */ op("neg", OperandType::None, FlowType::Sequential),
    /* 66 */ op("not", OperandType::None, FlowType::Sequential),
    /* 67 */ op("conv.i1", OperandType::None, FlowType::Sequential),
    /* 68 */ op("conv.i2", OperandType::None, FlowType::Sequential),
    /* 69 */ op("conv.i4", OperandType::None, FlowType::Sequential),
    /* 6A */ op("conv.i8", OperandType::None, FlowType::Sequential),
    /* 6B */ op("conv.r4", OperandType::None, FlowType::Sequential),
    /* 6C */ op("conv.r8", OperandType::None, FlowType::Sequential),
    /* 6D */ op("conv.u4", OperandType::None, FlowType::Sequential),
    /* 6E */ op("conv.u8", OperandType::None, FlowType::Sequential),
    /* 6F */ op("callvirt", OperandType::Token, FlowType::Call),
    /* 70 */ op("cpobj", OperandType::Token, FlowType::Sequential),
    /* 71 */ op("ldobj", OperandType::Token, FlowType::Sequential),
    /* 72 */ op("ldstr", OperandType::Token, FlowType::Sequential),
    /* 73 */ op("newobj", OperandType::Token, FlowType::Call),
    /* 74 */ op("castclass", OperandType::Token, FlowType::Sequential),
    /* 75 */ op("isinst", OperandType::Token, FlowType::Sequential),
    /* 76 */ op("conv.r.un", OperandType::None, FlowType::Sequential),
    /* 77 */ RESERVED,
    /* 78 */ RESERVED,
    /* 79 */ op("unbox", OperandType::Token, FlowType::Sequential),
    /* 7A */ op("throw", OperandType::None, FlowType::Throw),
    /* 7B */ op("ldfld", OperandType::Token, FlowType::Sequential),
    /* 7C */ op("ldflda", OperandType::Token, FlowType::Sequential),
    /* 7D */ op("stfld", OperandType::Token, FlowType::Sequential),
    /* 7E */ op("ldsfld", OperandType::Token, FlowType::Sequential),
    /* 7F */ op("ldsflda", OperandType::Token, FlowType::Sequential),
    /* 80 */ op("stsfld", OperandType::Token, FlowType::Sequential),
    /* 81 */ op("stobj", OperandType::Token, FlowType::Sequential),
    /* 82 */ op("conv.ovf.i1.un", OperandType::None, FlowType::Sequential),
    /* 83 */ op("conv.ovf.i2.un", OperandType::None, FlowType::Sequential),
    /* 84 */ op("conv.ovf.i4.un", OperandType::None, FlowType::Sequential),
    /* 85 */ op("conv.ovf.i8.un", OperandType::None, FlowType::Sequential),
    /* 86 */ op("conv.ovf.u1.un", OperandType::None, FlowType::Sequential),
    /* 87 */ op("conv.ovf.u2.un", OperandType::None, FlowType::Sequential),
    /* 88 */ op("conv.ovf.u4.un", OperandType::None, FlowType::Sequential),
    /* 89 */ op("conv.ovf.u8.un", OperandType::None, FlowType::Sequential),
    /* 8A */ op("conv.ovf.i.un", OperandType::None, FlowType::Sequential),
    /* 8B */ op("conv.ovf.u.un", OperandType::None, FlowType::Sequential),
    /* 8C */ op("box", OperandType::Token, FlowType::Sequential),
    /* 8D */ op("newarr", OperandType::Token, FlowType::Sequential),
    /* 8E */ op("ldlen", OperandType::None, FlowType::Sequential),
    /* 8F */ op("ldelema", OperandType::Token, FlowType::Sequential),
    /* 90 */ op("ldelem.i1", OperandType::None, FlowType::Sequential),
    /* 91 */ op("ldelem.u1", OperandType::None, FlowType::Sequential),
    /* 92 */ op("ldelem.i2", OperandType::None, FlowType::Sequential),
    /* 93 */ op("ldelem.u2", OperandType::None, FlowType::Sequential),
    /* 94 */ op("ldelem.i4", OperandType::None, FlowType::Sequential),
    /* 95 */ op("ldelem.u4", OperandType::None, FlowType::Sequential),
    /* 96 */ op("ldelem.i8", OperandType::None, FlowType::Sequential),
    /* 97 */ op("ldelem.i", OperandType::None, FlowType::Sequential),
    /* 98 */ op("ldelem.r4", OperandType::None, FlowType::Sequential),
    /* 99 */ op("ldelem.r8", OperandType::None, FlowType::Sequential),
    /* 9A */ op("ldelem.ref", OperandType::None, FlowType::Sequential),
    /* 9B */ op("stelem.i", OperandType::None, FlowType::Sequential),
    /* 9C */ op("stelem.i1", OperandType::None, FlowType::Sequential),
    /* 9D */ op("stelem.i2", OperandType::None, FlowType::Sequential),
    /* 9E */ op("stelem.i4", OperandType::None, FlowType::Sequential),
    /* 9F */ op("stelem.i8", OperandType::None, FlowType::Sequential),
    /* A0 */ op("stelem.r4", OperandType::None, FlowType::Sequential),
    /* A1 */ op("stelem.r8", OperandType::None, FlowType::Sequential),
    /* A2 */ op("stelem.ref", OperandType::None, FlowType::Sequential),
    /* A3 */ op("ldelem", OperandType::Token, FlowType::Sequential),
    /* A4 */ op("stelem", OperandType::Token, FlowType::Sequential),
    /* A5 */ op("unbox.any", OperandType::Token, FlowType::Sequential),
    /* A6 */ RESERVED,
    /* A7 */ RESERVED,
    /* A8 */ RESERVED,
    /* A9 */ RESERVED,
    /* AA */ RESERVED,
    /* AB */ RESERVED,
    /* AC */ RESERVED,
    /* AD */ RESERVED,
    /* AE */ RESERVED,
    /* AF */ RESERVED,
    /* B0 */ RESERVED,
    /* B1 */ RESERVED,
    /* B2 */ RESERVED,
    /* B3 */ op("conv.ovf.i1", OperandType::None, FlowType::Sequential),
    /* B4 */ op("conv.ovf.u1", OperandType::None, FlowType::Sequential),
    /* B5 */ op("conv.ovf.i2", OperandType::None, FlowType::Sequential),
    /* B6 */ op("conv.ovf.u2", OperandType::None, FlowType::Sequential),
    /* B7 */ op("conv.ovf.i4", OperandType::None, FlowType::Sequential),
    /* B8 */ op("conv.ovf.u4", OperandType::None, FlowType::Sequential),
    /* B9 */ op("conv.ovf.i8", OperandType::None, FlowType::Sequential),
    /* BA */ op("conv.ovf.u8", OperandType::None, FlowType::Sequential),
    /* BB */ RESERVED,
    /* BC */ RESERVED,
    /* BD */ RESERVED,
    /* BE */ RESERVED,
    /* BF */ RESERVED,
    /* C0 */ RESERVED,
    /* C1 */ RESERVED,
    /* C2 */ op("refanyval", OperandType::Token, FlowType::Sequential),
    /* C3 */ op("ckfinite", OperandType::None, FlowType::Sequential),
    /* C4 */ RESERVED,
    /* C5 */ RESERVED,
    /* C6 */ op("mkrefany", OperandType::Token, FlowType::Sequential),
    /* C7 */ RESERVED,
    /* C8 */ RESERVED,
    /* C9 */ RESERVED,
    /* CA */ RESERVED,
    /* CB */ RESERVED,
    /* CC */ RESERVED,
    /* CD */ RESERVED,
    /* CE */ RESERVED,
    /* CF */ RESERVED,
    /* D0 */ op("ldtoken", OperandType::Token, FlowType::Sequential),
    /* D1 */ op("conv.u2", OperandType::None, FlowType::Sequential),
    /* D2 */ op("conv.u1", OperandType::None, FlowType::Sequential),
    /* D3 */ op("conv.i", OperandType::None, FlowType::Sequential),
    /* D4 */ op("conv.ovf.i", OperandType::None, FlowType::Sequential),
    /* D5 */ op("conv.ovf.u", OperandType::None, FlowType::Sequential),
    /* D6 */ op("add.ovf", OperandType::None, FlowType::Sequential),
    /* D7 */ op("add.ovf.un", OperandType::None, FlowType::Sequential),
    /* D8 */ op("mul.ovf", OperandType::None, FlowType::Sequential),
    /* D9 */ op("mul.ovf.un", OperandType::None, FlowType::Sequential),
    /* DA */ op("sub.ovf", OperandType::None, FlowType::Sequential),
    /* DB */ op("sub.ovf.un", OperandType::None, FlowType::Sequential),
    /* DC */ op("endfinally", OperandType::None, FlowType::EndFinally),
    /* DD */ op("leave", OperandType::Int32, FlowType::UnconditionalBranch),
    /* DE */ op("leave.s", OperandType::Int8, FlowType::UnconditionalBranch),
    /* DF */ op("stind.i", OperandType::None, FlowType::Sequential),
    /* E0 */ op("conv.u", OperandType::None, FlowType::Sequential),
];

/// Two byte opcodes `0xFE 0x00..=0x1E`
pub const INSTRUCTIONS_FE: [CilInstruction; 31] = [
    /* FE 00 */ op("arglist", OperandType::None, FlowType::Sequential),
    /* FE 01 */ op("ceq", OperandType::None, FlowType::Sequential),
    /* FE 02 */ op("cgt", OperandType::None, FlowType::Sequential),
    /* FE 03 */ op("cgt.un", OperandType::None, FlowType::Sequential),
    /* FE 04 */ op("clt", OperandType::None, FlowType::Sequential),
    /* FE 05 */ op("clt.un", OperandType::None, FlowType::Sequential),
    /* FE 06 */ op("ldftn", OperandType::Token, FlowType::Sequential),
    /* FE 07 */ op("ldvirtftn", OperandType::Token, FlowType::Sequential),
    /* FE 08 */ RESERVED,
    /* FE 09 */ op("ldarg", OperandType::UInt16, FlowType::Sequential),
    /* FE 0A */ op("ldarga", OperandType::UInt16, FlowType::Sequential),
    /* FE 0B */ op("starg", OperandType::UInt16, FlowType::Sequential),
    /* FE 0C */ op("ldloc", OperandType::UInt16, FlowType::Sequential),
    /* FE 0D */ op("ldloca", OperandType::UInt16, FlowType::Sequential),
    /* FE 0E */ op("stloc", OperandType::UInt16, FlowType::Sequential),
    /* FE 0F */ op("localloc", OperandType::None, FlowType::Sequential),
    /* FE 10 */ RESERVED,
    /* FE 11 */ op("endfilter", OperandType::None, FlowType::EndFinally),
    /* FE 12 */ op("unaligned.", OperandType::UInt8, FlowType::Sequential),
    /* FE 13 */ op("volatile.", OperandType::None, FlowType::Sequential),
    /* FE 14 */ op("tail.", OperandType::None, FlowType::Sequential),
    /* FE 15 */ op("initobj", OperandType::Token, FlowType::Sequential),
    /* FE 16 */ op("constrained.", OperandType::Token, FlowType::Sequential),
    /* FE 17 */ op("cpblk", OperandType::None, FlowType::Sequential),
    /* FE 18 */ op("initblk", OperandType::None, FlowType::Sequential),
    /* FE 19 */ op("no.", OperandType::UInt8, FlowType::Sequential),
    /* FE 1A */ op("rethrow", OperandType::None, FlowType::Throw),
    /* FE 1B */ RESERVED,
    /* FE 1C */ op("sizeof", OperandType::Token, FlowType::Sequential),
    /* FE 1D */ op("refanytype", OperandType::None, FlowType::Sequential),
    /* FE 1E */ op("readonly.", OperandType::None, FlowType::Sequential),
];
