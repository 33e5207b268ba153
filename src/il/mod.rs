//! Packet lifting into the host's low-level IL.
//!
//! Hexagon packet semantics impose three rules the emitted IL must keep:
//! source registers sample pre-packet values, destination writes commit
//! only when the packet completes, and at most one branch is taken per
//! packet, the earliest satisfied one in encoding order winning.
//!
//! The lifter works on a private copy of the stored packet, prepared by
//! extender removal, execution shuffle and compare-jump split. Branches go
//! through a two-pass protocol: during instruction emission a conditional
//! branch only records its outcome in a per-instruction branch-taken
//! temporary (indirect ones also record the destination expression); after
//! the destination write-back, the fan-out pass tests the flags in
//! encoding order and performs the single surviving branch. Calls are
//! followed by a goto past the remaining branches: a taken call returns to
//! the next packet, so any later in-packet branch is unreachable. A taken
//! conditional jump, in contrast, falls through to the next test, which is
//! what lets the host model a following unconditional jump as its 'else'.

pub mod context;
pub mod lift;
#[cfg(test)]
pub mod mock;

pub use context::PacketContext;

use log::debug;

use crate::db::InsnInfo;
use crate::decode::assemble::{remove_extenders, shuffle_for_execution, split_cmpjump};
use crate::host::{temp, LowLevelIl};
use crate::packet::{opcode_name, Packet};
use crate::regs::HEX_REG_LR;
use crate::status::Status;
use crate::tables::Opcode;

/// Base of the indirect-branch destination temporaries, one per
/// instruction index.
pub const BRANCHR_DEST_BASE: u32 = 200;
/// Base of the conditional-branch-taken flags, one per instruction index.
pub const BRANCH_TAKEN_BASE: u32 = 210;

/// Builds the lifter's working copy of a stored packet.
///
/// The copy's packet flags are not recomputed: `part1` compare halves are
/// visible to downstream loops, which must skip them explicitly rather
/// than re-derive flags from the copy.
pub fn prepare_packet_for_lifting(src: &Packet) -> Packet {
    let mut copy = src.clone();
    remove_extenders(&mut copy);
    shuffle_for_execution(&mut copy);
    split_cmpjump(&mut copy);
    copy
}

/// Lifts the packet starting at `info` into `il`.
///
/// Lifting happens only at packet starts: a mid-packet address is a no-op
/// success returning 0. On success at a packet start, returns the packet's
/// encoded size as the host's advertised instruction length.
pub fn lift_packet<IL: LowLevelIl>(info: &InsnInfo, il: &mut IL) -> Result<usize, Status> {
    if info.insn_addr & 3 != 0 {
        return Err(Status::InvalidArgument {
            addr: info.insn_addr,
            reason: "unaligned instruction address",
        });
    }
    if info.insn_num != 0 {
        return Ok(0);
    }

    let pkt = prepare_packet_for_lifting(&info.pkt);
    let len = pkt.encod_pkt_size_in_bytes as usize;

    // Every conditional branch starts this packet not-taken.
    if pkt.pkt_has_cof {
        for (i, insn) in pkt.insns.iter().enumerate() {
            if !insn.part1 && insn.is_cond_jump() {
                let zero = il.const_int(1, 0);
                let e = il.set_register(1, temp(BRANCH_TAKEN_BASE + i as u32), zero);
                il.add_instruction(e);
            }
        }
    }

    let mut ctx = PacketContext::new(il);
    for i in 0..pkt.num_insns() {
        let insn = pkt.insns[i];
        if !lift::lift_insn(info.pc, &pkt, &insn, i, &mut ctx) {
            debug!(
                "unsupported lifter for '{}' at 0x{:x}",
                opcode_name(insn.opcode),
                info.pc
            );
            let e = ctx.il().undefined();
            ctx.il().add_instruction(e);
        }
    }

    // Commit: all destination writes become visible here.
    ctx.write_clobbered_regs();
    drop(ctx);

    // Branch fan-out, in encoding order, skipping compare halves.
    if pkt.pkt_has_cof {
        let done = il.create_label();
        for (i, insn) in pkt.insns.iter().enumerate() {
            if insn.part1 {
                continue;
            }
            if !(insn.is_jump() || insn.is_call()) {
                continue;
            }
            let next_case = il.create_label();
            if insn.is_cond_jump() {
                let branch_case = il.create_label();
                let taken = il.register(1, temp(BRANCH_TAKEN_BASE + i as u32));
                let one = il.const_int(1, 1);
                let cond = il.compare_equal(1, taken, one);
                let e = il.if_then(cond, branch_case, next_case);
                il.add_instruction(e);
                il.mark_label(branch_case);
            }
            if insn.is_indirect() && insn.is_jump() {
                if insn.is_return()
                    || (insn.opcode == Opcode::J2_jumpr && insn.regno[0] as u32 == HEX_REG_LR)
                {
                    let lr = il.register(4, HEX_REG_LR);
                    let e = il.ret(lr);
                    il.add_instruction(e);
                } else {
                    let dest = il.register(4, temp(BRANCHR_DEST_BASE + i as u32));
                    let e = il.jump(dest);
                    il.add_instruction(e);
                }
            } else if insn.is_indirect() && insn.is_call() {
                let dest = il.register(4, temp(BRANCHR_DEST_BASE + i as u32));
                let e = il.call(dest);
                il.add_instruction(e);
                // A taken call resumes at the next packet; later branches
                // in this packet cannot fire.
                let g = il.goto_label(done);
                il.add_instruction(g);
            } else if insn.is_jump() {
                let dest = il.const_ptr(4, info.pc.wrapping_add(insn.immed[0] as i64 as u64));
                let e = il.jump(dest);
                il.add_instruction(e);
            } else {
                debug_assert!(insn.is_call());
                let dest = il.const_ptr(4, info.pc.wrapping_add(insn.immed[0] as i64 as u64));
                let e = il.call(dest);
                il.add_instruction(e);
                let g = il.goto_label(done);
                il.add_instruction(g);
            }
            il.mark_label(next_case);
        }
        il.mark_label(done);
    }

    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::mock::{MockExpr, MockIl};
    use super::*;
    use crate::db::PacketDb;
    use crate::decode::decode_packet_display;
    use crate::regs::HEX_REG_FP;

    fn prepare(words: &[u32]) -> Packet {
        let pkt = decode_packet_display(words).expect("decode failed");
        prepare_packet_for_lifting(&pkt)
    }

    fn lift(words: &[u32], pc: u64) -> (usize, MockIl) {
        let db = PacketDb::new();
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        db.add_bytes(&bytes, pc).unwrap();
        let info = db.lookup(pc).unwrap();
        let mut il = MockIl::new();
        let len = lift_packet(&info, &mut il).expect("lift failed");
        (len, il)
    }

    #[test]
    fn test_prepare_removes_extender() {
        let pkt = prepare(&[0x0dea_76c0, 0x28b3_2811]);
        assert_eq!(pkt.num_insns(), 2);
        assert!(pkt.insns.iter().all(|i| i.opcode != Opcode::A4_ext));
        // The widened immediate survives removal.
        assert_eq!(pkt.insns[0].immed[0] as u32, 3_735_924_747);
    }

    #[test]
    fn test_prepare_moves_compare_to_front() {
        let pkt = prepare(&[0x0000_4004, 0x5c00_5870, 0x5800_40a4, 0x7523_fba0]);
        assert_eq!(pkt.num_insns(), 3);
        assert_eq!(pkt.insns[0].opcode, Opcode::C2_cmpeqi);
        assert_eq!(pkt.insns[1].opcode, Opcode::J2_jumptnewpt);
        assert_eq!(pkt.insns[2].opcode, Opcode::J2_jump);
    }

    #[test]
    fn test_prepare_splits_cmpjump() {
        let pkt = prepare(&[0x0fff_7fff, 0x1002_6a18, 0x59ff_ffee]);
        assert_eq!(pkt.num_insns(), 3);
        assert_eq!(pkt.insns[0].opcode, Opcode::J4_cmpeqi_tp0_jump_t);
        assert!(pkt.insns[0].part1);
        assert_eq!(pkt.insns[1].opcode, Opcode::J4_cmpeqi_tp0_jump_t);
        assert!(!pkt.insns[1].part1);
        assert_eq!(pkt.insns[2].opcode, Opcode::J2_jump);
    }

    #[test]
    fn test_prepare_keeps_dual_jump_order() {
        let pkt = prepare(&[0x5c00_5006, 0x5800_4008, 0xf301_c101]);
        assert_eq!(pkt.insns[0].opcode, Opcode::J2_jumptpt);
        assert_eq!(pkt.insns[1].opcode, Opcode::J2_jump);
        assert_eq!(pkt.insns[2].opcode, Opcode::A2_add);
    }

    #[test]
    fn test_lift_simple_transfer_commits_at_end() {
        // { r0 = #256 }
        let (len, il) = lift(&[0x7800_e000], 0x1000);
        assert_eq!(len, 4);
        assert_eq!(il.insns.len(), 2);
        // Write lands in the destination temporary first...
        assert!(matches!(
            &il.insns[0],
            MockExpr::SetReg { size: 4, reg, value } if *reg == temp(0)
                && matches!(value.as_ref(), MockExpr::Const { size: 4, value: 256 })
        ));
        // ...and only the write-back touches the real register.
        assert!(matches!(
            &il.insns[1],
            MockExpr::SetReg { size: 4, reg: 0, value }
                if matches!(value.as_ref(), MockExpr::Reg { size: 4, reg } if *reg == temp(0))
        ));
    }

    #[test]
    fn test_lift_mid_packet_is_noop() {
        let db = PacketDb::new();
        // { immext(#0); r1 = ##24 }
        db.add_bytes(&[0x00, 0x40, 0x00, 0x00, 0x01, 0xc3, 0x00, 0x78], 0x1000)
            .unwrap();
        let info = db.lookup(0x1004).unwrap();
        let mut il = MockIl::new();
        assert_eq!(lift_packet(&info, &mut il).unwrap(), 0);
        assert!(il.insns.is_empty());
    }

    #[test]
    fn test_lift_unaligned_address_rejected() {
        let db = PacketDb::new();
        db.add_bytes(&[0x02, 0x28, 0x01, 0x28], 0x1000).unwrap();
        let mut info = db.lookup(0x1000).unwrap();
        info.insn_addr += 2;
        let mut il = MockIl::new();
        assert!(matches!(
            lift_packet(&info, &mut il),
            Err(Status::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_lift_call_suppresses_later_branches() {
        // { call 0x28 } at 0x0.
        let (len, il) = lift(&[0x5a00_c014], 0x0);
        assert_eq!(len, 4);
        let branches = il.branch_nodes();
        assert_eq!(branches.len(), 1);
        assert!(matches!(
            branches[0],
            MockExpr::Call(t) if matches!(t.as_ref(), MockExpr::ConstPtr { value: 0x28, .. })
        ));
        // The call is chased by a goto to the done label.
        let call_pos = il
            .insns
            .iter()
            .position(|i| matches!(i, MockExpr::Call(_)))
            .unwrap();
        assert!(matches!(il.insns[call_pos + 1], MockExpr::Goto(_)));
    }

    #[test]
    fn test_lift_dual_jump_fan_out() {
        // { if (p0) jump:t pc+0xc; jump pc+0x10; r1 = add(r1,r1) } at 0x100.
        let (len, il) = lift(&[0x5c00_5006, 0x5800_4008, 0xf301_c101], 0x100);
        assert_eq!(len, 12);

        // Branch-taken flag for instruction 0 is cleared up front.
        assert!(matches!(
            &il.insns[0],
            MockExpr::SetReg { size: 1, reg, value } if *reg == temp(BRANCH_TAKEN_BASE)
                && matches!(value.as_ref(), MockExpr::Const { value: 0, .. })
        ));

        // Exactly two branch nodes, in encoding order.
        let branches = il.branch_nodes();
        assert_eq!(branches.len(), 2);
        assert!(matches!(
            branches[0],
            MockExpr::Jump(t) if matches!(t.as_ref(), MockExpr::ConstPtr { value: 0x10c, .. })
        ));
        assert!(matches!(
            branches[1],
            MockExpr::Jump(t) if matches!(t.as_ref(), MockExpr::ConstPtr { value: 0x110, .. })
        ));

        // The conditional jump is guarded by its taken flag; the
        // unconditional one is reached on fall-through.
        let if_pos = il
            .insns
            .iter()
            .rposition(|i| matches!(i, MockExpr::If { .. }))
            .unwrap();
        assert!(matches!(
            &il.insns[if_pos],
            MockExpr::If { cond, .. } if matches!(
                cond.as_ref(),
                MockExpr::CmpEq { a, b, .. }
                    if matches!(a.as_ref(), MockExpr::Reg { reg, .. } if *reg == temp(BRANCH_TAKEN_BASE))
                    && matches!(b.as_ref(), MockExpr::Const { value: 1, .. })
            )
        ));

        // Write-back of r1 happens before any branch fires.
        let wb_pos = il
            .insns
            .iter()
            .position(|i| matches!(i, MockExpr::SetReg { reg: 1, .. }))
            .unwrap();
        let first_branch_pos = il
            .insns
            .iter()
            .position(|i| matches!(i, MockExpr::Jump(_)))
            .unwrap();
        assert!(wb_pos < first_branch_pos);
    }

    #[test]
    fn test_lift_indirect_cond_jump_uses_dest_temp() {
        // { r1 = add(r1,r1); if (p0) jumpr:nt r0 } at 0x134.
        let (len, il) = lift(&[0xf301_4101, 0x5340_c000], 0x134);
        assert_eq!(len, 8);
        let branches = il.branch_nodes();
        assert_eq!(branches.len(), 1);
        // Indirect: the fan-out jumps through the recorded destination.
        assert!(matches!(
            branches[0],
            MockExpr::Jump(t) if matches!(
                t.as_ref(),
                MockExpr::Reg { reg, .. } if *reg == temp(BRANCHR_DEST_BASE + 1)
            )
        ));
        // The taken arm recorded r0 as the destination.
        assert!(il.insns.iter().any(|i| matches!(
            i,
            MockExpr::SetReg { reg, value, .. } if *reg == temp(BRANCHR_DEST_BASE + 1)
                && matches!(value.as_ref(), MockExpr::Reg { size: 4, reg: 0 })
        )));
    }

    #[test]
    fn test_lift_dealloc_return() {
        // { dealloc_return } at 0x34.
        let (len, il) = lift(&[0x961e_c01e], 0x34);
        assert_eq!(len, 4);
        // Frame reload into the pair temporary.
        assert!(matches!(
            &il.insns[0],
            MockExpr::SetReg { size: 8, reg, value } if *reg == temp(HEX_REG_FP)
                && matches!(value.as_ref(), MockExpr::Load { size: 8, .. })
        ));
        // Write-back restores SP, then the LR:FP pair.
        assert!(il.insns.iter().any(|i| matches!(
            i,
            MockExpr::SetRegSplit { size: 4, hi: 31, lo: 30, .. }
        )));
        // The return goes through the restored link register.
        let branches = il.branch_nodes();
        assert_eq!(branches.len(), 1);
        assert!(matches!(
            branches[0],
            MockExpr::Ret(t) if matches!(t.as_ref(), MockExpr::Reg { size: 4, reg: 31 })
        ));
        // And it fires only after the write-back.
        let ret_pos = il
            .insns
            .iter()
            .position(|i| matches!(i, MockExpr::Ret(_)))
            .unwrap();
        let wb_pos = il
            .insns
            .iter()
            .position(|i| matches!(i, MockExpr::SetRegSplit { .. }))
            .unwrap();
        assert!(wb_pos < ret_pos);
    }

    #[test]
    fn test_lift_split_cmpjump_packet() {
        // { immext; p0 = cmp.eq(r2,#10) jump:t ..; jump .. } at 0x15c.
        let (len, il) = lift(&[0x0fff_7fff, 0x1002_6a18, 0x59ff_ffee], 0x15c);
        assert_eq!(len, 12);
        // The compare half writes the predicate temporary before the jump
        // half tests it.
        let cmp_pos = il
            .insns
            .iter()
            .position(|i| matches!(
                i,
                MockExpr::SetReg { size: 1, reg, value } if *reg == temp(crate::regs::HEX_REG_P0)
                    && matches!(value.as_ref(), MockExpr::CmpEq { .. })
            ))
            .unwrap();
        let test_pos = il
            .insns
            .iter()
            .position(|i| matches!(
                i,
                MockExpr::If { cond, .. } if matches!(
                    cond.as_ref(),
                    MockExpr::CmpNe { a, .. } if matches!(
                        a.as_ref(),
                        MockExpr::Reg { reg, .. } if *reg == temp(crate::regs::HEX_REG_P0)
                    )
                )
            ))
            .unwrap();
        assert!(cmp_pos < test_pos);
        // Two branch nodes: the conditional jump and the unconditional one.
        assert_eq!(il.branch_nodes().len(), 2);
    }

    #[test]
    fn test_lift_unsupported_opcode_degrades_to_undefined() {
        // { trap0(#0) }
        let (len, il) = lift(&[0x5400_c000], 0x10);
        assert_eq!(len, 4);
        assert!(il.insns.iter().any(|i| matches!(i, MockExpr::Undefined)));
    }

    #[test]
    fn test_lift_endloop_packet() {
        // { r2 = add(r2,#1); nop } :endloop0 at 0x1c8.
        let (len, il) = lift(&[0xb002_8022, 0x7f00_c000], 0x1c8);
        assert_eq!(len, 8);
        // The endloop is instruction 2; its taken flag is cleared up front.
        assert!(matches!(
            &il.insns[0],
            MockExpr::SetReg { size: 1, reg, .. } if *reg == temp(BRANCH_TAKEN_BASE + 2)
        ));
        // The loop-back branch goes through the destination temporary
        // holding SA0.
        let branches = il.branch_nodes();
        assert_eq!(branches.len(), 1);
        assert!(matches!(
            branches[0],
            MockExpr::Jump(t) if matches!(
                t.as_ref(),
                MockExpr::Reg { reg, .. } if *reg == temp(BRANCHR_DEST_BASE + 2)
            )
        ));
        // LC0 is decremented into its destination temporary in the taken
        // arm.
        assert!(il.insns.iter().any(|i| matches!(
            i,
            MockExpr::SetReg { size: 4, reg, value } if *reg == temp(crate::regs::HEX_REG_LC0)
                && matches!(value.as_ref(), MockExpr::Sub { .. })
        )));
    }

    #[test]
    fn test_lift_stored_sp_snapshots_pair() {
        // { r16 = r0; memd(sp+#-16) = r17:16; allocframe(#16) } at 0x7160.
        let (len, il) = lift(&[0x7060_4010, 0xebf4_1c20], 0x7160);
        assert_eq!(len, 8);
        // The stored pair is snapshotted into subspace 1, away from the
        // r16 destination temporary in subspace 0.
        assert!(il.insns.iter().any(|i| matches!(
            i,
            MockExpr::SetReg { size: 8, reg, value }
                if *reg == temp(crate::regs::NUM_HEX_REGS + 16)
                && matches!(value.as_ref(), MockExpr::RegSplit { size: 4, hi: 17, lo: 16 })
        )));
        // One 8-byte store of that snapshot.
        assert!(il.insns.iter().any(|i| matches!(
            i,
            MockExpr::Store { size: 8, value, .. }
                if matches!(value.as_ref(), MockExpr::Reg { reg, .. }
                    if *reg == temp(crate::regs::NUM_HEX_REGS + 16))
        )));
    }

    #[test]
    fn test_branch_exclusivity_structure() {
        // Every lifted packet funnels its branches through per-instruction
        // guards; count the unguarded (unconditional) branch nodes.
        let (_, il) = lift(&[0x5c00_5006, 0x5800_4008, 0xf301_c101], 0x100);
        // Two branch nodes, but the first sits inside an if-guarded case
        // and the second behind the first's fall-through label, so at most
        // one executes.
        assert_eq!(il.branch_nodes().len(), 2);
        let if_count = il
            .insns
            .iter()
            .filter(|i| matches!(i, MockExpr::If { .. }))
            .count();
        assert!(if_count >= 1);
    }
}
