//! Branch annotation for the host's control-flow recovery.
//!
//! A packet commits at most one branch, so branch edges are reported only
//! at the packet's last instruction (or the first half of a final duplex).
//! Conditional returns, conditional indirect jumps and indirect calls are
//! left unannotated; the host resolves those itself.

use crate::db::InsnInfo;
use crate::host::{BranchKind, InstructionInfo};
use crate::status::Status;

/// Fills the host's instruction info for the instruction at `info`.
pub fn instruction_info(info: &InsnInfo) -> Result<InstructionInfo, Status> {
    if info.insn_addr & 3 != 0 {
        return Err(Status::InvalidArgument {
            addr: info.insn_addr,
            reason: "unaligned instruction address",
        });
    }
    let mut result = InstructionInfo {
        length: 4,
        ..Default::default()
    };
    let pkt = &info.pkt;
    let last = pkt.last_real_insn_index();
    let at_last = info.insn_num == last
        || (pkt.insns[info.insn_num].is_sub_insn() && info.insn_num + 1 == last);
    if !at_last {
        // Branch information belongs to the end of the packet.
        return Ok(result);
    }

    let mut has_cj = false;
    let mut has_ucj = false;
    for insn in &pkt.insns {
        has_cj |= insn.is_jump() && !insn.is_indirect() && insn.is_cond_jump();
        has_ucj |= insn.is_jump() && !insn.is_indirect() && !insn.is_cond_jump();
    }

    for insn in &pkt.insns {
        let dest = info.pc.wrapping_add(insn.immed[0] as i64 as u64);
        if insn.is_return() {
            if !insn.is_cond_jump() {
                result.add_branch(BranchKind::FunctionReturn, None);
            }
        } else if insn.is_system() {
            if !insn.is_cond_jump() {
                result.add_branch(BranchKind::SystemCall, None);
            }
        } else if insn.is_jump() {
            if insn.is_indirect() {
                if !insn.is_cond_jump() {
                    result.add_branch(BranchKind::IndirectBranch, None);
                }
            } else if insn.is_cond_jump() {
                result.add_branch(BranchKind::TrueBranch, Some(dest));
                if !has_ucj {
                    // Implicit 'else': fall through to the next packet.
                    result.add_branch(
                        BranchKind::FalseBranch,
                        Some(info.pc + pkt.encod_pkt_size_in_bytes as u64),
                    );
                }
            } else {
                let kind = if has_cj {
                    // Explicit 'else' of a preceding conditional jump.
                    BranchKind::FalseBranch
                } else {
                    BranchKind::UnconditionalBranch
                };
                result.add_branch(kind, Some(dest));
            }
        } else if insn.is_call() && !insn.is_indirect() {
            result.add_branch(BranchKind::CallDestination, Some(dest));
        }
    }
    Ok(result)
}
