//! Disassembly: packet framing and per-instruction text.
//!
//! Hexagon disassembly is packet-oriented: the first instruction opens the
//! brace, the last closes it, and a duplex pair shares one host line. The
//! host queries instruction by instruction; the framing is reconstructed
//! from the instruction's position inside its packet.

mod insn_text;

pub use insn_text::insn_text;

use crate::db::InsnInfo;
use crate::host::TextToken;
use crate::status::Status;
use crate::tables::Opcode;

/// Produces the disassembly tokens for the instruction at `info`.
///
/// Returns the advertised instruction length (always 4: duplex halves are
/// rendered on their first half's line) and the token sequence.
pub fn instruction_text(info: &InsnInfo) -> Result<(usize, Vec<TextToken>), Status> {
    if info.insn_addr & 3 != 0 {
        return Err(Status::InvalidArgument {
            addr: info.insn_addr,
            reason: "unaligned instruction address",
        });
    }
    let pkt = &info.pkt;
    let mut insn_num = info.insn_num;
    let insn = &pkt.insns[insn_num];
    let mut out = Vec::new();

    out.push(TextToken::text(if insn_num == 0 { "{ " } else { "  " }));
    insn_text(info.pc, pkt, insn, &mut out)?;
    if insn.is_sub_insn() {
        // The duplex companion shares this line and is not independently
        // addressable for disassembly.
        insn_num += 1;
        debug_assert!(insn_num < pkt.num_insns());
        out.push(TextToken::text("; "));
        insn_text(info.pc, pkt, &pkt.insns[insn_num], &mut out)?;
    }

    let last = pkt.last_real_insn_index();
    if insn_num == last {
        out.push(TextToken::text(" }"));
        if pkt.pkt_has_endloop {
            let suffix = match pkt.insns[last + 1].opcode {
                Opcode::J2_endloop0 => "  :endloop0",
                Opcode::J2_endloop1 => "  :endloop1",
                Opcode::J2_endloop01 => "  :endloop01",
                _ => "",
            };
            if !suffix.is_empty() {
                out.push(TextToken::text(suffix));
            }
        }
    } else {
        out.push(TextToken::text("  "));
    }

    Ok((4, out))
}
