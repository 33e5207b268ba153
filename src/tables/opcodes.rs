//! Per-opcode records, in `Opcode` discriminant order.
//!
//! Field layouts mirror the ISA encodings; see the Hexagon programmer's
//! reference for the source definitions. Sub-instruction opcodes carry
//! 13-bit mask/match pairs, 32-bit opcodes full-word pairs. Synthetic
//! endloop opcodes never appear in the decision tree and carry a
//! never-matching pair.

use super::{EncPair, OpcodeInfo, RegMapId, Step, ENC_NONE};
use super::{
    ATTR_CALL, ATTR_COND_J, ATTR_DOTNEWVALUE, ATTR_EXTENDABLE, ATTR_EXTENDER, ATTR_HWLOOP0_END,
    ATTR_HWLOOP1_END, ATTR_IMPLICIT_WRITES_P0, ATTR_INDIRECT, ATTR_JUMP, ATTR_LOAD, ATTR_MEMLIKE,
    ATTR_NEWCMPJUMP, ATTR_RETURN, ATTR_STORE, ATTR_SUBINSN, ATTR_SYSTEM,
};

/// Opcode tags for the imported table subset.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u16)]
pub enum Opcode {
    A2_add = 0,
    A2_addi,
    #[default]
    A2_nop,
    A2_tfr,
    A2_tfrsi,
    A4_ext,
    C2_cmpeqi,
    C2_tfrrp,
    J2_call,
    J2_callr,
    J2_endloop0,
    J2_endloop01,
    J2_endloop1,
    J2_jump,
    J2_jumpr,
    J2_jumprt,
    J2_jumpt,
    J2_jumptnew,
    J2_jumptnewpt,
    J2_jumptpt,
    J2_loop0i,
    J2_rte,
    J2_trap0,
    J4_cmpeqi_tp0_jump_t,
    L2_loadri_io,
    L4_return,
    S2_allocframe,
    S2_storerbnewgp,
    S2_storeri_io,
    SA1_seti,
    SL2_return,
    SS2_allocframe,
    SS2_stored_sp,
}

/// Number of opcodes in the table.
pub const NUM_OPCODES: usize = 33;

const fn enc(mask: u32, match_: u32) -> EncPair {
    EncPair { mask, match_ }
}

pub(super) static OPCODE_TABLE: [OpcodeInfo; NUM_OPCODES] = [
    // A2_add: Rd32=add(Rs32,Rt32)
    OpcodeInfo {
        name: "A2_add",
        attribs: 0,
        reginfo: "dst",
        rregs: "Rs32,Rt32",
        wregs: "Rd32",
        semantics: "{ RdV=RsV+RtV;}",
        enc: enc(0xff80_0000, 0xf300_0000),
        legacy_enc: ENC_NONE,
        recipe: &[
            Step::Reg { no: 0, width: 5, start: 0 },
            Step::Reg { no: 1, width: 5, start: 16 },
            Step::Reg { no: 2, width: 5, start: 8 },
        ],
    },
    // A2_addi: Rd32=add(Rs32,#s16)
    OpcodeInfo {
        name: "A2_addi",
        attribs: ATTR_EXTENDABLE,
        reginfo: "ds",
        rregs: "Rs32",
        wregs: "Rd32",
        semantics: "{ fIMMEXT(siV); RdV=RsV+siV;}",
        enc: enc(0xf000_0000, 0xb000_0000),
        legacy_enc: ENC_NONE,
        recipe: &[
            Step::Reg { no: 0, width: 5, start: 0 },
            Step::Reg { no: 1, width: 5, start: 16 },
            Step::Imm { no: 0, width: 7, start: 21, valstart: 9 },
            Step::Imm { no: 0, width: 9, start: 5, valstart: 0 },
            Step::ImmSxt { no: 0, width: 16 },
        ],
    },
    // A2_nop
    OpcodeInfo {
        name: "A2_nop",
        attribs: 0,
        reginfo: "",
        rregs: "",
        wregs: "",
        semantics: "{ }",
        enc: enc(0xffff_0000, 0x7f00_0000),
        legacy_enc: ENC_NONE,
        recipe: &[],
    },
    // A2_tfr: Rd32=Rs32
    OpcodeInfo {
        name: "A2_tfr",
        attribs: 0,
        reginfo: "ds",
        rregs: "Rs32",
        wregs: "Rd32",
        semantics: "{ RdV=RsV;}",
        enc: enc(0xffe0_0000, 0x7060_0000),
        legacy_enc: ENC_NONE,
        recipe: &[
            Step::Reg { no: 0, width: 5, start: 0 },
            Step::Reg { no: 1, width: 5, start: 16 },
        ],
    },
    // A2_tfrsi: Rd32=#s16
    OpcodeInfo {
        name: "A2_tfrsi",
        attribs: ATTR_EXTENDABLE,
        reginfo: "d",
        rregs: "",
        wregs: "Rd32",
        semantics: "{ fIMMEXT(siV); RdV=siV;}",
        enc: enc(0xff80_0000, 0x7800_0000),
        legacy_enc: ENC_NONE,
        recipe: &[
            Step::Reg { no: 0, width: 5, start: 0 },
            Step::Imm { no: 0, width: 7, start: 16, valstart: 9 },
            Step::Imm { no: 0, width: 9, start: 5, valstart: 0 },
            Step::ImmSxt { no: 0, width: 16 },
        ],
    },
    // A4_ext: immext(#u26:6)
    OpcodeInfo {
        name: "A4_ext",
        attribs: ATTR_EXTENDER,
        reginfo: "",
        rregs: "",
        wregs: "",
        semantics: "{ fHIDE(); }",
        enc: enc(0xf000_0000, 0x0000_0000),
        legacy_enc: ENC_NONE,
        recipe: &[
            Step::Imm { no: 0, width: 12, start: 16, valstart: 14 },
            Step::Imm { no: 0, width: 14, start: 0, valstart: 0 },
            Step::ImmShift { no: 0, shamt: 6 },
        ],
    },
    // C2_cmpeqi: Pd4=cmp.eq(Rs32,#s10)
    OpcodeInfo {
        name: "C2_cmpeqi",
        attribs: ATTR_EXTENDABLE,
        reginfo: "ds",
        rregs: "Rs32",
        wregs: "Pd4",
        semantics: "{ fIMMEXT(siV); PdV=f8BITSOF(RsV==siV);}",
        enc: enc(0xffc0_0000, 0x7500_0000),
        legacy_enc: ENC_NONE,
        recipe: &[
            Step::Reg { no: 0, width: 2, start: 0 },
            Step::Reg { no: 1, width: 5, start: 16 },
            Step::Imm { no: 0, width: 1, start: 21, valstart: 9 },
            Step::Imm { no: 0, width: 9, start: 5, valstart: 0 },
            Step::ImmSxt { no: 0, width: 10 },
        ],
    },
    // C2_tfrrp: Pd4=Rs32
    OpcodeInfo {
        name: "C2_tfrrp",
        attribs: 0,
        reginfo: "ds",
        rregs: "Rs32",
        wregs: "Pd4",
        semantics: "{ PdV=fGETBYTE(0,RsV);}",
        enc: enc(0xffe0_0000, 0x8540_0000),
        legacy_enc: ENC_NONE,
        recipe: &[
            Step::Reg { no: 0, width: 2, start: 0 },
            Step::Reg { no: 1, width: 5, start: 16 },
        ],
    },
    // J2_call: call #r22:2
    OpcodeInfo {
        name: "J2_call",
        attribs: ATTR_CALL | ATTR_EXTENDABLE,
        reginfo: "",
        rregs: "",
        wregs: "LR",
        semantics: "{ fIMMEXT(riV); fPCALIGN(riV); fCALL(riV);}",
        enc: enc(0xfe00_0000, 0x5a00_0000),
        legacy_enc: ENC_NONE,
        recipe: &[
            Step::Imm { no: 0, width: 9, start: 16, valstart: 13 },
            Step::Imm { no: 0, width: 13, start: 1, valstart: 0 },
            Step::ImmSxt { no: 0, width: 22 },
            Step::ImmShift { no: 0, shamt: 2 },
        ],
    },
    // J2_callr: callr Rs32
    OpcodeInfo {
        name: "J2_callr",
        attribs: ATTR_CALL | ATTR_INDIRECT,
        reginfo: "s",
        rregs: "Rs32",
        wregs: "LR",
        semantics: "{ fCALLR(RsV);}",
        enc: enc(0xffe0_0000, 0x50a0_0000),
        legacy_enc: ENC_NONE,
        recipe: &[Step::Reg { no: 0, width: 5, start: 16 }],
    },
    // J2_endloop0 (synthetic)
    OpcodeInfo {
        name: "J2_endloop0",
        attribs: ATTR_JUMP | ATTR_INDIRECT | ATTR_COND_J | ATTR_HWLOOP0_END,
        reginfo: "",
        rregs: "",
        wregs: "",
        semantics: "{ if (fREAD_LC0()>1) { fBRANCH(fREAD_SA0()); fWRITE_LC0(fREAD_LC0()-1); } }",
        enc: ENC_NONE,
        legacy_enc: ENC_NONE,
        recipe: &[],
    },
    // J2_endloop01 (synthetic)
    OpcodeInfo {
        name: "J2_endloop01",
        attribs: ATTR_JUMP | ATTR_INDIRECT | ATTR_COND_J | ATTR_HWLOOP0_END | ATTR_HWLOOP1_END,
        reginfo: "",
        rregs: "",
        wregs: "",
        semantics: "{ if (fREAD_LC0()>1) { fBRANCH(fREAD_SA0()); fWRITE_LC0(fREAD_LC0()-1); } else if (fREAD_LC1()>1) { fBRANCH(fREAD_SA1()); fWRITE_LC1(fREAD_LC1()-1); } }",
        enc: ENC_NONE,
        legacy_enc: ENC_NONE,
        recipe: &[],
    },
    // J2_endloop1 (synthetic)
    OpcodeInfo {
        name: "J2_endloop1",
        attribs: ATTR_JUMP | ATTR_INDIRECT | ATTR_COND_J | ATTR_HWLOOP1_END,
        reginfo: "",
        rregs: "",
        wregs: "",
        semantics: "{ if (fREAD_LC1()>1) { fBRANCH(fREAD_SA1()); fWRITE_LC1(fREAD_LC1()-1); } }",
        enc: ENC_NONE,
        legacy_enc: ENC_NONE,
        recipe: &[],
    },
    // J2_jump: jump #r22:2
    OpcodeInfo {
        name: "J2_jump",
        attribs: ATTR_JUMP | ATTR_EXTENDABLE,
        reginfo: "",
        rregs: "",
        wregs: "",
        semantics: "{ fIMMEXT(riV); fPCALIGN(riV); fJUMP(riV);}",
        enc: enc(0xfe00_0000, 0x5800_0000),
        legacy_enc: ENC_NONE,
        recipe: &[
            Step::Imm { no: 0, width: 9, start: 16, valstart: 13 },
            Step::Imm { no: 0, width: 13, start: 1, valstart: 0 },
            Step::ImmSxt { no: 0, width: 22 },
            Step::ImmShift { no: 0, shamt: 2 },
        ],
    },
    // J2_jumpr: jumpr Rs32
    OpcodeInfo {
        name: "J2_jumpr",
        attribs: ATTR_JUMP | ATTR_INDIRECT,
        reginfo: "s",
        rregs: "Rs32",
        wregs: "",
        semantics: "{ fJUMPR(RsN,RsV);}",
        enc: enc(0xffe0_0000, 0x5280_0000),
        legacy_enc: ENC_NONE,
        recipe: &[Step::Reg { no: 0, width: 5, start: 16 }],
    },
    // J2_jumprt: if (Pu4) jumpr:nt Rs32
    OpcodeInfo {
        name: "J2_jumprt",
        attribs: ATTR_JUMP | ATTR_INDIRECT | ATTR_COND_J,
        reginfo: "us",
        rregs: "Pu4,Rs32",
        wregs: "",
        semantics: "{ if (fLSBOLD(PuV)) { fJUMPR(RsN,RsV); } }",
        enc: enc(0xffe0_0000, 0x5340_0000),
        legacy_enc: ENC_NONE,
        recipe: &[
            Step::Reg { no: 0, width: 2, start: 8 },
            Step::Reg { no: 1, width: 5, start: 16 },
        ],
    },
    // J2_jumpt: if (Pu4) jump #r15:2
    OpcodeInfo {
        name: "J2_jumpt",
        attribs: ATTR_JUMP | ATTR_COND_J | ATTR_EXTENDABLE,
        reginfo: "u",
        rregs: "Pu4",
        wregs: "",
        semantics: "{ fIMMEXT(riV); fPCALIGN(riV); if (fLSBOLD(PuV)) { fJUMP(riV); } }",
        enc: enc(0xff00_1800, 0x5c00_0000),
        legacy_enc: ENC_NONE,
        recipe: &[
            Step::Reg { no: 0, width: 2, start: 8 },
            Step::Imm { no: 0, width: 2, start: 20, valstart: 7 },
            Step::Imm { no: 0, width: 7, start: 1, valstart: 0 },
            Step::ImmSxt { no: 0, width: 9 },
            Step::ImmShift { no: 0, shamt: 2 },
        ],
    },
    // J2_jumptnew: if (Pu4.new) jump:nt #r15:2
    OpcodeInfo {
        name: "J2_jumptnew",
        attribs: ATTR_JUMP | ATTR_COND_J | ATTR_EXTENDABLE,
        reginfo: "u",
        rregs: "Pu4",
        wregs: "",
        semantics: "{ fIMMEXT(riV); fPCALIGN(riV); if (fLSBNEW(PuN)) { fJUMP(riV); } }",
        enc: enc(0xff00_1800, 0x5c00_0800),
        legacy_enc: ENC_NONE,
        recipe: &[
            Step::Reg { no: 0, width: 2, start: 8 },
            Step::Imm { no: 0, width: 2, start: 20, valstart: 7 },
            Step::Imm { no: 0, width: 7, start: 1, valstart: 0 },
            Step::ImmSxt { no: 0, width: 9 },
            Step::ImmShift { no: 0, shamt: 2 },
        ],
    },
    // J2_jumptnewpt: if (Pu4.new) jump:t #r15:2
    OpcodeInfo {
        name: "J2_jumptnewpt",
        attribs: ATTR_JUMP | ATTR_COND_J | ATTR_EXTENDABLE,
        reginfo: "u",
        rregs: "Pu4",
        wregs: "",
        semantics: "{ fIMMEXT(riV); fPCALIGN(riV); if (fLSBNEW(PuN)) { fJUMP(riV); } }",
        enc: enc(0xff00_1800, 0x5c00_1800),
        legacy_enc: ENC_NONE,
        recipe: &[
            Step::Reg { no: 0, width: 2, start: 8 },
            Step::Imm { no: 0, width: 2, start: 20, valstart: 7 },
            Step::Imm { no: 0, width: 7, start: 1, valstart: 0 },
            Step::ImmSxt { no: 0, width: 9 },
            Step::ImmShift { no: 0, shamt: 2 },
        ],
    },
    // J2_jumptpt: if (Pu4) jump:t #r15:2
    OpcodeInfo {
        name: "J2_jumptpt",
        attribs: ATTR_JUMP | ATTR_COND_J | ATTR_EXTENDABLE,
        reginfo: "u",
        rregs: "Pu4",
        wregs: "",
        semantics: "{ fIMMEXT(riV); fPCALIGN(riV); if (fLSBOLD(PuV)) { fJUMP(riV); } }",
        enc: enc(0xff00_1800, 0x5c00_1000),
        legacy_enc: ENC_NONE,
        recipe: &[
            Step::Reg { no: 0, width: 2, start: 8 },
            Step::Imm { no: 0, width: 2, start: 20, valstart: 7 },
            Step::Imm { no: 0, width: 7, start: 1, valstart: 0 },
            Step::ImmSxt { no: 0, width: 9 },
            Step::ImmShift { no: 0, shamt: 2 },
        ],
    },
    // J2_loop0i: loop0(#r7:2,#U10)
    OpcodeInfo {
        name: "J2_loop0i",
        attribs: ATTR_EXTENDABLE,
        reginfo: "",
        rregs: "",
        wregs: "SA0,LC0",
        semantics: "{ fIMMEXT(riV); fWRITE_LOOP_REGS0(fREAD_PC()+riV,UiV); fSET_LPCFG(0);}",
        enc: enc(0xffe0_0000, 0x6900_0000),
        legacy_enc: ENC_NONE,
        recipe: &[
            Step::Imm { no: 0, width: 5, start: 16, valstart: 2 },
            Step::Imm { no: 0, width: 2, start: 5, valstart: 0 },
            Step::ImmSxt { no: 0, width: 7 },
            Step::ImmShift { no: 0, shamt: 2 },
            Step::Imm { no: 1, width: 5, start: 8, valstart: 5 },
            Step::Imm { no: 1, width: 2, start: 3, valstart: 2 },
            Step::Imm { no: 1, width: 2, start: 0, valstart: 0 },
        ],
    },
    // J2_rte: rte
    OpcodeInfo {
        name: "J2_rte",
        attribs: 0,
        reginfo: "",
        rregs: "",
        wregs: "",
        semantics: "{ fRTE(); }",
        enc: enc(0xffe0_0000, 0x57e0_0000),
        legacy_enc: ENC_NONE,
        recipe: &[],
    },
    // J2_trap0: trap0(#u8)
    OpcodeInfo {
        name: "J2_trap0",
        attribs: ATTR_SYSTEM,
        reginfo: "",
        rregs: "",
        wregs: "",
        semantics: "{ fTRAP(0,uiV);}",
        enc: enc(0xffe0_0000, 0x5400_0000),
        legacy_enc: ENC_NONE,
        recipe: &[Step::Imm { no: 0, width: 8, start: 5, valstart: 0 }],
    },
    // J4_cmpeqi_tp0_jump_t: p0=cmp.eq(Rs16,#U5); if (p0.new) jump:t #r9:2
    OpcodeInfo {
        name: "J4_cmpeqi_tp0_jump_t",
        attribs: ATTR_JUMP | ATTR_COND_J | ATTR_NEWCMPJUMP | ATTR_IMPLICIT_WRITES_P0
            | ATTR_EXTENDABLE,
        reginfo: "s",
        rregs: "Rs16",
        wregs: "",
        semantics: "{ fPART1(fWRITE_P0(f8BITSOF(RsV==UiV))) fIMMEXT(riV); fPCALIGN(riV); if (fLSBNEW0) { fJUMP(riV); } }",
        enc: enc(0xffc0_2000, 0x1000_2000),
        legacy_enc: ENC_NONE,
        recipe: &[
            Step::Reg { no: 0, width: 4, start: 16 },
            Step::RegMap { no: 0, map: RegMapId::R16 },
            Step::Imm { no: 1, width: 5, start: 8, valstart: 0 },
            Step::Imm { no: 0, width: 2, start: 20, valstart: 7 },
            Step::Imm { no: 0, width: 7, start: 1, valstart: 0 },
            Step::ImmSxt { no: 0, width: 9 },
            Step::ImmShift { no: 0, shamt: 2 },
        ],
    },
    // L2_loadri_io: Rd32=memw(Rs32+#s11:2)
    OpcodeInfo {
        name: "L2_loadri_io",
        attribs: ATTR_LOAD | ATTR_MEMLIKE | ATTR_EXTENDABLE,
        reginfo: "ds",
        rregs: "Rs32",
        wregs: "Rd32",
        semantics: "{ fIMMEXT(siV); EA=RsV+siV; fLOAD(1,4,u,EA,RdV);}",
        enc: enc(0xf1e0_0000, 0x9180_0000),
        legacy_enc: ENC_NONE,
        recipe: &[
            Step::Reg { no: 0, width: 5, start: 0 },
            Step::Reg { no: 1, width: 5, start: 16 },
            Step::Imm { no: 0, width: 2, start: 25, valstart: 9 },
            Step::Imm { no: 0, width: 9, start: 5, valstart: 0 },
            Step::ImmSxt { no: 0, width: 11 },
            Step::ImmShift { no: 0, shamt: 2 },
        ],
    },
    // L4_return: Rdd32=dealloc_return(Rs32):raw
    OpcodeInfo {
        name: "L4_return",
        attribs: ATTR_JUMP | ATTR_INDIRECT | ATTR_RETURN | ATTR_LOAD | ATTR_MEMLIKE,
        reginfo: "ds",
        rregs: "Rs32",
        wregs: "Rdd32",
        semantics: "{ EA=RsV; fLOAD(1,8,u,EA,RddV); fWRITE_SP(EA+8); fJUMPR(REG_LR,fGETWORD(1,RddV));}",
        enc: enc(0xff80_3c00, 0x9600_0000),
        legacy_enc: ENC_NONE,
        recipe: &[
            Step::Reg { no: 0, width: 5, start: 0 },
            Step::Reg { no: 1, width: 5, start: 16 },
        ],
    },
    // S2_allocframe: allocframe(Rx32,#u11:3):raw
    OpcodeInfo {
        name: "S2_allocframe",
        attribs: ATTR_STORE | ATTR_MEMLIKE,
        reginfo: "x",
        rregs: "Rx32,LR,FP",
        wregs: "Rx32,FP",
        semantics: "{ EA=RxV-8; fSTORE(1,8,EA,fFRAME_SCRAMBLE()); fWRITE_FP(EA); RxV=EA-uiV; }",
        enc: enc(0xffe0_0000, 0xa080_0000),
        legacy_enc: ENC_NONE,
        recipe: &[
            Step::Reg { no: 0, width: 5, start: 16 },
            Step::Imm { no: 0, width: 11, start: 0, valstart: 0 },
            Step::ImmShift { no: 0, shamt: 3 },
        ],
    },
    // S2_storerbnewgp: memb(gp+#u16:0)=Nt8.new
    OpcodeInfo {
        name: "S2_storerbnewgp",
        attribs: ATTR_STORE | ATTR_MEMLIKE | ATTR_DOTNEWVALUE | ATTR_EXTENDABLE,
        reginfo: "t",
        rregs: "Nt8",
        wregs: "",
        semantics: "{ fIMMEXT(uiV); EA=fREAD_GP()+uiV; fSTORE(1,1,EA,fNEWREG_ST(NtN));}",
        enc: enc(0xffe0_0000, 0x48a0_0000),
        legacy_enc: ENC_NONE,
        recipe: &[
            Step::Reg { no: 0, width: 3, start: 8 },
            Step::Imm { no: 0, width: 2, start: 25, valstart: 7 },
            Step::Imm { no: 0, width: 7, start: 0, valstart: 0 },
        ],
    },
    // S2_storeri_io: memw(Rs32+#s11:2)=Rt32
    OpcodeInfo {
        name: "S2_storeri_io",
        attribs: ATTR_STORE | ATTR_MEMLIKE | ATTR_EXTENDABLE,
        reginfo: "st",
        rregs: "Rs32,Rt32",
        wregs: "",
        semantics: "{ fIMMEXT(siV); EA=RsV+siV; fSTORE(1,4,EA,RtV);}",
        enc: enc(0xf1e0_0000, 0xa180_0000),
        legacy_enc: ENC_NONE,
        recipe: &[
            Step::Reg { no: 0, width: 5, start: 16 },
            Step::Reg { no: 1, width: 5, start: 8 },
            Step::Imm { no: 0, width: 1, start: 13, valstart: 8 },
            Step::Imm { no: 0, width: 8, start: 0, valstart: 0 },
            Step::ImmSxt { no: 0, width: 9 },
            Step::ImmShift { no: 0, shamt: 2 },
        ],
    },
    // SA1_seti: Rd16=#u6 (duplex class A)
    OpcodeInfo {
        name: "SA1_seti",
        attribs: ATTR_SUBINSN | ATTR_EXTENDABLE,
        reginfo: "d",
        rregs: "",
        wregs: "Rd16",
        semantics: "{ fIMMEXT(uiV); RdV=uiV;}",
        enc: enc(0x1c00, 0x0800),
        legacy_enc: ENC_NONE,
        recipe: &[
            Step::Reg { no: 0, width: 4, start: 0 },
            Step::Imm { no: 0, width: 6, start: 4, valstart: 0 },
        ],
    },
    // SL2_return: dealloc_return (duplex class L2)
    OpcodeInfo {
        name: "SL2_return",
        attribs: ATTR_SUBINSN | ATTR_JUMP | ATTR_INDIRECT | ATTR_RETURN | ATTR_LOAD
            | ATTR_MEMLIKE,
        reginfo: "s",
        rregs: "FP",
        wregs: "",
        semantics: "{ EA=fREAD_FP(); fLOAD(1,8,u,EA,tmp); fWRITE_LR(fGETWORD(1,tmp)); fWRITE_FP(fGETWORD(0,tmp)); fWRITE_SP(EA+8); fJUMPR(REG_LR,fGETWORD(1,tmp));}",
        enc: enc(0x1fc7, 0x1f40),
        legacy_enc: ENC_NONE,
        recipe: &[Step::ImplReg { no: 0, value: 30 }],
    },
    // SS2_allocframe: allocframe(#u5:3) (duplex class S2)
    OpcodeInfo {
        name: "SS2_allocframe",
        attribs: ATTR_SUBINSN | ATTR_STORE | ATTR_MEMLIKE,
        reginfo: "",
        rregs: "SP,LR,FP",
        wregs: "SP,FP",
        semantics: "{ EA=fREAD_SP()-8; fSTORE(1,8,EA,fFRAME_SCRAMBLE()); fWRITE_FP(EA); fWRITE_SP(EA-uiV);}",
        enc: enc(0x1e00, 0x1c00),
        legacy_enc: ENC_NONE,
        recipe: &[
            Step::Imm { no: 0, width: 5, start: 4, valstart: 0 },
            Step::ImmShift { no: 0, shamt: 3 },
        ],
    },
    // SS2_stored_sp: memd(r29+#s6:3)=Rtt8 (duplex class S2)
    OpcodeInfo {
        name: "SS2_stored_sp",
        attribs: ATTR_SUBINSN | ATTR_STORE | ATTR_MEMLIKE,
        reginfo: "t",
        rregs: "SP,Rtt8",
        wregs: "",
        semantics: "{ EA=fREAD_SP()+siV; fSTORE(1,8,EA,RttV);}",
        enc: enc(0x1e00, 0x0a00),
        legacy_enc: ENC_NONE,
        recipe: &[
            Step::Reg { no: 0, width: 3, start: 0 },
            Step::RegMap { no: 0, map: RegMapId::R8Even },
            Step::Imm { no: 0, width: 6, start: 3, valstart: 0 },
            Step::ImmSxt { no: 0, width: 6 },
            Step::ImmShift { no: 0, shamt: 3 },
        ],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_in_discriminant_order() {
        assert_eq!(OPCODE_TABLE.len(), NUM_OPCODES);
        assert_eq!(OPCODE_TABLE[Opcode::A2_add as usize].name, "A2_add");
        assert_eq!(OPCODE_TABLE[Opcode::A4_ext as usize].name, "A4_ext");
        assert_eq!(OPCODE_TABLE[Opcode::J2_trap0 as usize].name, "J2_trap0");
        assert_eq!(
            OPCODE_TABLE[Opcode::SS2_stored_sp as usize].name,
            "SS2_stored_sp"
        );
    }

    #[test]
    fn test_masks_cover_match_bits() {
        for info in OPCODE_TABLE.iter() {
            assert_eq!(
                info.enc.match_ & !info.enc.mask,
                if info.enc.mask == 0 { info.enc.match_ } else { 0 },
                "match bits outside mask for {}",
                info.name
            );
        }
    }
}
