//! Imported opcode metadata.
//!
//! Everything in this module is data: per-opcode attribute bitmaps, register
//! signatures, short-semantics strings, encoding mask/match pairs, operand
//! extraction recipes, the iclass slot table and the decision tree. The
//! decoder and lifter interpret these tables; they never special-case an
//! opcode outside of them.
//!
//! The table contents cover the opcode subset exercised by the engine's test
//! programs; enlarging the subset is a data-only change.

pub mod dectree;
mod opcodes;

pub use opcodes::Opcode;

use crate::status::Status;

// Attribute bits. One `u32` bitmap per opcode.
pub const ATTR_SUBINSN: u32 = 1 << 0;
pub const ATTR_EXTENDER: u32 = 1 << 1;
pub const ATTR_EXTENDABLE: u32 = 1 << 2;
/// Architecture-extension (HVX) opcode.
pub const ATTR_EXTENSION: u32 = 1 << 3;
pub const ATTR_JUMP: u32 = 1 << 4;
pub const ATTR_CALL: u32 = 1 << 5;
pub const ATTR_INDIRECT: u32 = 1 << 6;
pub const ATTR_COND_J: u32 = 1 << 7;
pub const ATTR_RETURN: u32 = 1 << 8;
pub const ATTR_SYSTEM: u32 = 1 << 9;
pub const ATTR_STORE: u32 = 1 << 10;
pub const ATTR_LOAD: u32 = 1 << 11;
pub const ATTR_MEMLIKE: u32 = 1 << 12;
pub const ATTR_MEMLIKE_PACKET_RULES: u32 = 1 << 13;
pub const ATTR_DOTNEWVALUE: u32 = 1 << 14;
pub const ATTR_NEWCMPJUMP: u32 = 1 << 15;
pub const ATTR_IMPLICIT_WRITES_P0: u32 = 1 << 16;
pub const ATTR_IMPLICIT_WRITES_P3: u32 = 1 << 17;
pub const ATTR_HWLOOP0_END: u32 = 1 << 18;
pub const ATTR_HWLOOP1_END: u32 = 1 << 19;
pub const ATTR_DCZEROA: u32 = 1 << 20;

// Instruction classes (bits [31:28] of a 32-bit encoding).
pub const ICLASS_EXTENDER: u8 = 0;
pub const ICLASS_CJ: u8 = 1;
pub const ICLASS_NCJ: u8 = 2;
pub const ICLASS_V4LDST: u8 = 3;
pub const ICLASS_V2LDST: u8 = 4;
pub const ICLASS_J: u8 = 5;
pub const ICLASS_CR: u8 = 6;
pub const ICLASS_ALU32_2OP: u8 = 7;
pub const ICLASS_S_2OP: u8 = 8;
pub const ICLASS_LD: u8 = 9;
pub const ICLASS_ST: u8 = 10;
pub const ICLASS_ALU32_ADDI: u8 = 11;
pub const ICLASS_M: u8 = 12;
pub const ICLASS_ALU64: u8 = 13;
pub const ICLASS_S_3OP: u8 = 14;
pub const ICLASS_ALU32_3OP: u8 = 15;
/// Duplex iclasses are numbered past the 32-bit classes.
pub const ICLASS_DUPLEX_BASE: u8 = 16;

/// Valid execution slots per 32-bit iclass, bit `n` = slot `n`.
const ICLASS_SLOTS: [u8; 16] = [
    0b1111, // EXTENDER
    0b1100, // CJ
    0b1100, // NCJ
    0b0011, // V4LDST
    0b0011, // V2LDST
    0b1111, // J
    0b1000, // CR
    0b1111, // ALU32_2op
    0b1100, // S_2op
    0b0011, // LD
    0b0011, // ST
    0b1111, // ALU32_ADDI
    0b1100, // M
    0b1100, // ALU64
    0b1100, // S_3op
    0b1111, // ALU32_3op
];

/// Valid slots for an opcode given its decoded iclass.
/// Sub-instructions are pinned to slots 0/1 regardless of class.
pub fn iclass_slots(opcode: Opcode, iclass: u8) -> u8 {
    if has_attr(opcode, ATTR_SUBINSN) {
        return 0b0011;
    }
    ICLASS_SLOTS[(iclass & 0xf) as usize]
}

/// Small register translation tables for compact operand encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegMapId {
    /// 16-entry general map: R0-R7, R16-R23.
    R16,
    /// 8-entry even-pair map: R1:0, R3:2, R5:4, R7:6, R17:16, ...
    R8Even,
    /// 8-entry general map: R0-R7.
    R8,
}

const REGMAP_R16: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 16, 17, 18, 19, 20, 21, 22, 23];
const REGMAP_R8_EVEN: [u8; 8] = [0, 2, 4, 6, 16, 18, 20, 22];
const REGMAP_R8: [u8; 8] = [0, 1, 2, 3, 4, 5, 6, 7];

pub fn apply_regmap(map: RegMapId, encoded: u8) -> u8 {
    match map {
        RegMapId::R16 => REGMAP_R16[(encoded & 0xf) as usize],
        RegMapId::R8Even => REGMAP_R8_EVEN[(encoded & 0x7) as usize],
        RegMapId::R8 => REGMAP_R8[(encoded & 0x7) as usize],
    }
}

/// One step of an operand extraction recipe. The decoder interprets the
/// steps in table order against the instruction encoding.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    /// `regno[no] = encoding[start .. start+width]`.
    Reg { no: u8, width: u8, start: u8 },
    /// `regno[no] = value` (operand implied by the opcode).
    ImplReg { no: u8, value: u8 },
    /// `immed[no] |= encoding[start .. start+width] << valstart`.
    Imm {
        no: u8,
        width: u8,
        start: u8,
        valstart: u8,
    },
    /// Sign-extend `immed[no]` from `width` bits.
    ImmSxt { no: u8, width: u8 },
    /// Negate `immed[no]`.
    ImmNeg { no: u8 },
    /// `immed[no] <<= shamt`, skipped when that immediate was widened by a
    /// preceding constant extender.
    ImmShift { no: u8, shamt: u8 },
    /// Translate `regno[no]` through a register map.
    RegMap { no: u8, map: RegMapId },
}

/// Encoding verification pair: `(encoding & mask) == match_`.
#[derive(Debug, Clone, Copy)]
pub struct EncPair {
    pub mask: u32,
    pub match_: u32,
}

/// A legacy pair that never matches; used where no alias encoding exists.
pub const ENC_NONE: EncPair = EncPair {
    mask: 0,
    match_: !0,
};

/// Per-opcode metadata record.
pub struct OpcodeInfo {
    pub name: &'static str,
    pub attribs: u32,
    /// Register-letter signature, one letter per `regno` index.
    pub reginfo: &'static str,
    /// Read registers, in the ISA's operand spelling.
    pub rregs: &'static str,
    /// Written registers, in the ISA's operand spelling.
    pub wregs: &'static str,
    /// Short behavioural description from the ISA definition.
    pub semantics: &'static str,
    pub enc: EncPair,
    /// Alias encoding, consulted only when the primary pair fails.
    pub legacy_enc: EncPair,
    pub recipe: &'static [Step],
}

/// Metadata for an opcode.
pub fn opcode_info(opcode: Opcode) -> &'static OpcodeInfo {
    &opcodes::OPCODE_TABLE[opcode as usize]
}

/// Attribute test.
pub fn has_attr(opcode: Opcode, attr: u32) -> bool {
    opcodes::OPCODE_TABLE[opcode as usize].attribs & attr != 0
}

/// Which of the two immediates a preceding constant extender widens.
///
/// Derived from the `IMMEXT(..)` reference in the short semantics: a
/// lower-case argument names immediate 0, upper-case immediate 1.
pub fn which_immediate_is_extended(opcode: Opcode) -> Result<u8, Status> {
    if !has_attr(opcode, ATTR_EXTENDABLE) {
        return Err(Status::internal(0, "extender applied to non-extendable opcode"));
    }
    let sem = opcode_info(opcode).semantics;
    let rest = sem
        .split_once("IMMEXT(")
        .ok_or(Status::internal(0, "extendable opcode without IMMEXT marker"))?
        .1;
    match rest.trim_start().chars().next() {
        Some(c) if c.is_ascii_lowercase() => Ok(0),
        Some(c) if c.is_ascii_uppercase() => Ok(1),
        _ => Err(Status::internal(0, "malformed IMMEXT marker")),
    }
}
