//! Single-word instruction decode: decision-tree walk, terminal
//! verification and operand extraction.

use smallvec::SmallVec;

use super::parse_bits;
use crate::packet::Insn;
use crate::status::Status;
use crate::tables::dectree::{dectree, Entry, Table};
use crate::tables::{
    apply_regmap, opcode_info, which_immediate_is_extended, Opcode, Step, ICLASS_DUPLEX_BASE,
};

/// Instructions produced by one word: one native, or two duplex halves.
pub type DecodedWord = SmallVec<[Insn; 2]>;

/// Decodes the word at `word_index`. `ext_pending` marks the first decoded
/// instruction as widened by a preceding constant extender.
pub fn decode_word(word: u32, word_index: usize, ext_pending: bool) -> Result<DecodedWord, Status> {
    let tree = dectree();
    let root = if parse_bits(word) != 0 {
        tree.root32()
    } else {
        tree.root_duplex()
    };
    walk(root, word, word_index, ext_pending)
}

fn walk(
    table: &'static Table,
    word: u32,
    word_index: usize,
    ext_pending: bool,
) -> Result<DecodedWord, Status> {
    let tree = dectree();
    match table.entries[table.index(word)] {
        Entry::TableLink(next) => walk(tree.table(next), word, word_index, ext_pending),
        Entry::Terminal(opcode) => {
            let iclass = (word >> 28) as u8;
            let insn = decode_terminal(opcode, word, iclass, word_index, ext_pending)?;
            let mut out = DecodedWord::new();
            out.push(insn);
            Ok(out)
        }
        Entry::Subinsns { high, low } => {
            let iclass = ICLASS_DUPLEX_BASE + table.index(word) as u8;
            let high_frag = (word >> 16) & 0x1fff;
            let low_frag = word & 0x1fff;
            // High half first in packet order; a pending extender widens it.
            let first = walk_subinsn(tree.table(high), high_frag, iclass, word_index, ext_pending)?;
            let second = walk_subinsn(tree.table(low), low_frag, iclass, word_index, false)?;
            let mut out = DecodedWord::new();
            out.push(first);
            out.push(second);
            Ok(out)
        }
        Entry::ExtSpace => Err(Status::internal(
            word_index,
            "extension decode space not present in imported tables",
        )),
        Entry::Invalid => Err(Status::internal(word_index, "invalid encoding")),
    }
}

fn walk_subinsn(
    table: &'static Table,
    fragment: u32,
    iclass: u8,
    word_index: usize,
    ext_pending: bool,
) -> Result<Insn, Status> {
    let tree = dectree();
    match table.entries[table.index(fragment)] {
        Entry::TableLink(next) => {
            walk_subinsn(tree.table(next), fragment, iclass, word_index, ext_pending)
        }
        Entry::Terminal(opcode) => decode_terminal(opcode, fragment, iclass, word_index, ext_pending),
        _ => Err(Status::internal(word_index, "invalid sub-instruction encoding")),
    }
}

/// Verifies the terminal's mask/match pair (legacy alias pair as fallback)
/// and runs the operand recipe.
fn decode_terminal(
    opcode: Opcode,
    encoding: u32,
    iclass: u8,
    word_index: usize,
    ext_pending: bool,
) -> Result<Insn, Status> {
    let info = opcode_info(opcode);
    if encoding & info.enc.mask != info.enc.match_
        && encoding & info.legacy_enc.mask != info.legacy_enc.match_
    {
        return Err(Status::internal(word_index, "encoding fails terminal match"));
    }

    let mut insn = Insn {
        opcode,
        iclass,
        extension_valid: ext_pending,
        ..Default::default()
    };
    if insn.extension_valid {
        insn.which_extended =
            which_immediate_is_extended(opcode).map_err(|_| {
                Status::internal(word_index, "extender precedes non-extendable opcode")
            })?;
    }

    for step in info.recipe {
        apply_step(&mut insn, *step, encoding);
    }
    Ok(insn)
}

fn field(encoding: u32, start: u8, width: u8) -> u32 {
    (encoding >> start) & ((1u32 << width) - 1)
}

fn apply_step(insn: &mut Insn, step: Step, encoding: u32) {
    match step {
        Step::Reg { no, width, start } => {
            insn.regno[no as usize] = field(encoding, start, width) as u8;
        }
        Step::ImplReg { no, value } => {
            insn.regno[no as usize] = value;
        }
        Step::Imm {
            no,
            width,
            start,
            valstart,
        } => {
            let piece = field(encoding, start, width) << valstart;
            insn.immed[no as usize] = (insn.immed[no as usize] as u32 | piece) as i32;
        }
        Step::ImmSxt { no, width } => {
            let v = insn.immed[no as usize];
            insn.immed[no as usize] = (v << (32 - width)) >> (32 - width);
        }
        Step::ImmNeg { no } => {
            insn.immed[no as usize] = insn.immed[no as usize].wrapping_neg();
        }
        Step::ImmShift { no, shamt } => {
            // The extender already supplies the low bits of the widened
            // immediate; the shift must not be applied twice.
            if !(insn.extension_valid && insn.which_extended == no) {
                insn.immed[no as usize] <<= shamt;
            }
        }
        Step::RegMap { no, map } => {
            insn.regno[no as usize] = apply_regmap(map, insn.regno[no as usize]);
        }
    }
}
