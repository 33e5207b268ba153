//! Per-opcode disassembly text.
//!
//! One arm per imported opcode; the match is compiler-checked against the
//! opcode enum. Formatting follows the reference assembler output:
//! immediates in hex with a `#` marker (`##` once widened by an extender),
//! branch targets as packet-relative resolved addresses.

use crate::host::TextToken;
use crate::packet::{Insn, Packet};
use crate::regs::{self, HEX_REG_P0};
use crate::status::Status;
use crate::tables::Opcode;

fn imm_token(insn: &Insn, which: usize) -> TextToken {
    let value = insn.immed[which] as u32;
    let marker = if insn.extension_valid && insn.which_extended == which as u8 {
        "##"
    } else {
        "#"
    };
    TextToken::integer(format!("{}0x{:x}", marker, value), value as u64)
}

fn addr_token(pc: u64, insn: &Insn, which: usize) -> TextToken {
    let target = pc.wrapping_add(insn.immed[which] as i64 as u64);
    TextToken::address(format!("0x{:x}", target), target)
}

fn gpr(insn: &Insn, no: usize) -> TextToken {
    TextToken::register(regs::general_reg_name(insn.regno[no] as u32))
}

fn gpr_pair(insn: &Insn, no: usize) -> TextToken {
    let lo = insn.regno[no] as u32;
    TextToken::register(format!(
        "{}:{}",
        regs::general_reg_name(lo + 1),
        regs::general_reg_name(lo)
    ))
}

fn pred(insn: &Insn, no: usize) -> TextToken {
    TextToken::register(regs::predicate_reg_name(HEX_REG_P0 + insn.regno[no] as u32))
}

fn cond_jump_text(
    pc: u64,
    insn: &Insn,
    dot_new: bool,
    hint: &str,
    out: &mut Vec<TextToken>,
) {
    out.push(TextToken::text("if ("));
    out.push(pred(insn, 0));
    if dot_new {
        out.push(TextToken::text(".new"));
    }
    out.push(TextToken::text(") "));
    out.push(TextToken::mnemonic(format!("jump{}", hint)));
    out.push(TextToken::text(" "));
    out.push(addr_token(pc, insn, 0));
}

/// Appends the text of one instruction. Packet framing (braces, endloop
/// suffixes) is the caller's job.
pub fn insn_text(
    pc: u64,
    _pkt: &Packet,
    insn: &Insn,
    out: &mut Vec<TextToken>,
) -> Result<(), Status> {
    match insn.opcode {
        Opcode::A2_add => {
            out.push(gpr(insn, 0));
            out.push(TextToken::text(" = "));
            out.push(TextToken::mnemonic("add"));
            out.push(TextToken::text("("));
            out.push(gpr(insn, 1));
            out.push(TextToken::text(","));
            out.push(gpr(insn, 2));
            out.push(TextToken::text(")"));
        }
        Opcode::A2_addi => {
            out.push(gpr(insn, 0));
            out.push(TextToken::text(" = "));
            out.push(TextToken::mnemonic("add"));
            out.push(TextToken::text("("));
            out.push(gpr(insn, 1));
            out.push(TextToken::text(","));
            out.push(imm_token(insn, 0));
            out.push(TextToken::text(")"));
        }
        Opcode::A2_nop => {
            out.push(TextToken::mnemonic("nop"));
        }
        Opcode::A2_tfr => {
            out.push(gpr(insn, 0));
            out.push(TextToken::text(" = "));
            out.push(gpr(insn, 1));
        }
        Opcode::A2_tfrsi | Opcode::SA1_seti => {
            out.push(gpr(insn, 0));
            out.push(TextToken::text(" = "));
            out.push(imm_token(insn, 0));
        }
        Opcode::A4_ext => {
            out.push(TextToken::mnemonic("immext"));
            out.push(TextToken::text("("));
            out.push(imm_token(insn, 0));
            out.push(TextToken::text(")"));
        }
        Opcode::C2_cmpeqi => {
            out.push(pred(insn, 0));
            out.push(TextToken::text(" = "));
            out.push(TextToken::mnemonic("cmp.eq"));
            out.push(TextToken::text("("));
            out.push(gpr(insn, 1));
            out.push(TextToken::text(","));
            out.push(imm_token(insn, 0));
            out.push(TextToken::text(")"));
        }
        Opcode::C2_tfrrp => {
            out.push(pred(insn, 0));
            out.push(TextToken::text(" = "));
            out.push(gpr(insn, 1));
        }
        Opcode::J2_call => {
            out.push(TextToken::mnemonic("call"));
            out.push(TextToken::text(" "));
            out.push(addr_token(pc, insn, 0));
        }
        Opcode::J2_callr => {
            out.push(TextToken::mnemonic("callr"));
            out.push(TextToken::text(" "));
            out.push(gpr(insn, 0));
        }
        Opcode::J2_jump => {
            out.push(TextToken::mnemonic("jump"));
            out.push(TextToken::text(" "));
            out.push(addr_token(pc, insn, 0));
        }
        Opcode::J2_jumpr => {
            out.push(TextToken::mnemonic("jumpr"));
            out.push(TextToken::text(" "));
            out.push(gpr(insn, 0));
        }
        Opcode::J2_jumprt => {
            out.push(TextToken::text("if ("));
            out.push(pred(insn, 0));
            out.push(TextToken::text(") "));
            out.push(TextToken::mnemonic("jumpr:nt"));
            out.push(TextToken::text(" "));
            out.push(gpr(insn, 1));
        }
        Opcode::J2_jumpt => cond_jump_text(pc, insn, false, "", out),
        Opcode::J2_jumptpt => cond_jump_text(pc, insn, false, ":t", out),
        Opcode::J2_jumptnew => cond_jump_text(pc, insn, true, ":nt", out),
        Opcode::J2_jumptnewpt => cond_jump_text(pc, insn, true, ":t", out),
        Opcode::J2_loop0i => {
            out.push(TextToken::mnemonic("loop0"));
            out.push(TextToken::text("("));
            out.push(addr_token(pc, insn, 0));
            out.push(TextToken::text(","));
            out.push(imm_token(insn, 1));
            out.push(TextToken::text(")"));
        }
        Opcode::J2_rte => {
            out.push(TextToken::mnemonic("rte"));
        }
        Opcode::J2_trap0 => {
            out.push(TextToken::mnemonic("trap0"));
            out.push(TextToken::text("("));
            out.push(imm_token(insn, 0));
            out.push(TextToken::text(")"));
        }
        Opcode::J4_cmpeqi_tp0_jump_t => {
            out.push(TextToken::register("P0"));
            out.push(TextToken::text(" = "));
            out.push(TextToken::mnemonic("cmp.eq"));
            out.push(TextToken::text("("));
            out.push(gpr(insn, 0));
            out.push(TextToken::text(","));
            out.push(imm_token(insn, 1));
            out.push(TextToken::text("); if (P0.new) "));
            out.push(TextToken::mnemonic("jump:t"));
            out.push(TextToken::text(" "));
            out.push(addr_token(pc, insn, 0));
        }
        Opcode::L2_loadri_io => {
            out.push(gpr(insn, 0));
            out.push(TextToken::text(" = "));
            out.push(TextToken::mnemonic("memw"));
            out.push(TextToken::text("("));
            out.push(gpr(insn, 1));
            out.push(TextToken::text("+"));
            out.push(imm_token(insn, 0));
            out.push(TextToken::text(")"));
        }
        Opcode::L4_return | Opcode::SL2_return => {
            out.push(TextToken::mnemonic("dealloc_return"));
        }
        Opcode::S2_allocframe | Opcode::SS2_allocframe => {
            out.push(TextToken::mnemonic("allocframe"));
            out.push(TextToken::text("("));
            out.push(imm_token(insn, 0));
            out.push(TextToken::text(")"));
        }
        Opcode::S2_storerbnewgp => {
            out.push(TextToken::mnemonic("memb"));
            out.push(TextToken::text("(gp+"));
            out.push(imm_token(insn, 0));
            out.push(TextToken::text(") = "));
            out.push(gpr(insn, 0));
            out.push(TextToken::text(".new"));
        }
        Opcode::S2_storeri_io => {
            out.push(TextToken::mnemonic("memw"));
            out.push(TextToken::text("("));
            out.push(gpr(insn, 0));
            out.push(TextToken::text("+"));
            out.push(imm_token(insn, 0));
            out.push(TextToken::text(") = "));
            out.push(gpr(insn, 1));
        }
        Opcode::SS2_stored_sp => {
            out.push(TextToken::mnemonic("memd"));
            out.push(TextToken::text("("));
            out.push(TextToken::register("SP"));
            out.push(TextToken::text("+"));
            out.push(imm_token(insn, 0));
            out.push(TextToken::text(") = "));
            out.push(gpr_pair(insn, 0));
        }
        Opcode::J2_endloop0 | Opcode::J2_endloop1 | Opcode::J2_endloop01 => {
            // Endloop markers render as packet suffixes, never inline.
            return Err(Status::InvalidArgument {
                addr: pc,
                reason: "no text form for endloop pseudo-instruction",
            });
        }
    }
    Ok(())
}
