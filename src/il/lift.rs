//! Per-opcode IL emitters.
//!
//! Emitters run against the execution-shuffled lifting copy. Source reads
//! of real registers observe pre-packet values because all writes land in
//! destination temporaries until the context commits. Conditional branches
//! never branch inline; they record their outcome in the branch-taken
//! temporaries, and indirect ones their destination, for the fan-out pass.

use super::context::PacketContext;
use super::{BRANCHR_DEST_BASE, BRANCH_TAKEN_BASE};
use crate::host::{temp, Expr, LowLevelIl};
use crate::packet::{Insn, Packet};
use crate::regs::{
    HEX_REG_FP, HEX_REG_GP, HEX_REG_LC0, HEX_REG_LC1, HEX_REG_LR, HEX_REG_P0, HEX_REG_SA0,
    HEX_REG_SA1, HEX_REG_SP, HEX_REG_USR_LPCFG,
};
use crate::tables::Opcode;

/// Emits the semantics of one instruction. Returns false when the opcode
/// has no emitter; the caller degrades to an `Undefined` node.
pub fn lift_insn<IL: LowLevelIl>(
    pc: u64,
    _pkt: &Packet,
    insn: &Insn,
    insn_num: usize,
    ctx: &mut PacketContext<IL>,
) -> bool {
    match insn.opcode {
        Opcode::A2_tfrsi | Opcode::SA1_seti => {
            let dest = ctx.add_dest_write_only_reg(insn.regno[0] as u32);
            let il = ctx.il();
            let v = il.const_int(4, insn.immed[0] as u32 as u64);
            let e = il.set_register(4, dest, v);
            il.add_instruction(e);
        }
        Opcode::A2_tfr => {
            let dest = ctx.add_dest_write_only_reg(insn.regno[0] as u32);
            let il = ctx.il();
            let v = il.register(4, insn.regno[1] as u32);
            let e = il.set_register(4, dest, v);
            il.add_instruction(e);
        }
        Opcode::A2_add => {
            let dest = ctx.add_dest_write_only_reg(insn.regno[0] as u32);
            let il = ctx.il();
            let a = il.register(4, insn.regno[1] as u32);
            let b = il.register(4, insn.regno[2] as u32);
            let sum = il.add(4, a, b);
            let e = il.set_register(4, dest, sum);
            il.add_instruction(e);
        }
        Opcode::A2_addi => {
            let dest = ctx.add_dest_write_only_reg(insn.regno[0] as u32);
            let il = ctx.il();
            let a = il.register(4, insn.regno[1] as u32);
            let b = il.const_int(4, insn.immed[0] as u32 as u64);
            let sum = il.add(4, a, b);
            let e = il.set_register(4, dest, sum);
            il.add_instruction(e);
        }
        Opcode::A2_nop => {
            let il = ctx.il();
            let e = il.nop();
            il.add_instruction(e);
        }
        Opcode::C2_cmpeqi => {
            let dest = ctx.add_dest_write_only_pred_reg(HEX_REG_P0 + insn.regno[0] as u32);
            let il = ctx.il();
            let a = il.register(4, insn.regno[1] as u32);
            let b = il.const_int(4, insn.immed[0] as u32 as u64);
            let cmp = il.compare_equal(4, a, b);
            let e = il.set_register(1, dest, cmp);
            il.add_instruction(e);
        }
        Opcode::C2_tfrrp => {
            let dest = ctx.add_dest_write_only_pred_reg(HEX_REG_P0 + insn.regno[0] as u32);
            let il = ctx.il();
            let v = il.register(1, insn.regno[1] as u32);
            let e = il.set_register(1, dest, v);
            il.add_instruction(e);
        }
        Opcode::J2_call | Opcode::J2_jump => {
            // Direct and unconditional: the fan-out pass resolves the
            // destination from the decoded immediate.
        }
        Opcode::J2_jumpr | Opcode::J2_callr => {
            let il = ctx.il();
            let v = il.register(4, insn.regno[0] as u32);
            let e = il.set_register(4, temp(BRANCHR_DEST_BASE + insn_num as u32), v);
            il.add_instruction(e);
        }
        Opcode::J2_jumpt | Opcode::J2_jumptpt => {
            let il = ctx.il();
            let p = il.register(1, HEX_REG_P0 + insn.regno[0] as u32);
            let zero = il.const_int(1, 0);
            let cond = il.compare_not_equal(1, p, zero);
            emit_cond_taken(il, cond, insn_num, None);
        }
        Opcode::J2_jumptnew | Opcode::J2_jumptnewpt => {
            // The .new predicate value lives in the producer's destination
            // temporary.
            let il = ctx.il();
            let p = il.register(1, temp(HEX_REG_P0 + insn.regno[0] as u32));
            let zero = il.const_int(1, 0);
            let cond = il.compare_not_equal(1, p, zero);
            emit_cond_taken(il, cond, insn_num, None);
        }
        Opcode::J2_jumprt => {
            let il = ctx.il();
            let p = il.register(1, HEX_REG_P0 + insn.regno[0] as u32);
            let zero = il.const_int(1, 0);
            let cond = il.compare_not_equal(1, p, zero);
            let dest = il.register(4, insn.regno[1] as u32);
            emit_cond_taken(il, cond, insn_num, Some(dest));
        }
        Opcode::J4_cmpeqi_tp0_jump_t => {
            if insn.part1 {
                // Compare half.
                let dest = ctx.add_dest_write_only_pred_reg(HEX_REG_P0);
                let il = ctx.il();
                let a = il.register(4, insn.regno[0] as u32);
                let b = il.const_int(4, insn.immed[1] as u32 as u64);
                let cmp = il.compare_equal(4, a, b);
                let e = il.set_register(1, dest, cmp);
                il.add_instruction(e);
            } else {
                // Jump half, on p0.new.
                let il = ctx.il();
                let p = il.register(1, temp(HEX_REG_P0));
                let zero = il.const_int(1, 0);
                let cond = il.compare_not_equal(1, p, zero);
                emit_cond_taken(il, cond, insn_num, None);
            }
        }
        Opcode::J2_loop0i => {
            let sa = ctx.add_dest_write_only_reg(HEX_REG_SA0);
            let lc = ctx.add_dest_write_only_reg(HEX_REG_LC0);
            let lpcfg = ctx.add_dest_write_only_byte_reg(HEX_REG_USR_LPCFG);
            let il = ctx.il();
            let target = il.const_ptr(4, pc.wrapping_add(insn.immed[0] as i64 as u64));
            let e = il.set_register(4, sa, target);
            il.add_instruction(e);
            let count = il.const_int(4, insn.immed[1] as u32 as u64);
            let e = il.set_register(4, lc, count);
            il.add_instruction(e);
            let zero = il.const_int(1, 0);
            let e = il.set_register(1, lpcfg, zero);
            il.add_instruction(e);
        }
        Opcode::J2_endloop0 => {
            emit_endloop(ctx, insn_num, HEX_REG_LC0, HEX_REG_SA0);
        }
        Opcode::J2_endloop1 => {
            emit_endloop(ctx, insn_num, HEX_REG_LC1, HEX_REG_SA1);
        }
        Opcode::J2_endloop01 => {
            // Loop 0 takes priority; loop 1 is only considered when loop 0
            // does not branch.
            let lc0 = ctx.add_dest_read_write_reg(HEX_REG_LC0);
            let lc1 = ctx.add_dest_read_write_reg(HEX_REG_LC1);
            let il = ctx.il();
            let end = il.create_label();
            let taken0 = il.create_label();
            let else0 = il.create_label();
            let cond0 = cmp_lc_expr(il, lc0);
            let e = il.if_then(cond0, taken0, else0);
            il.add_instruction(e);
            il.mark_label(taken0);
            emit_loop_arm(il, insn_num, lc0, HEX_REG_SA0);
            let g = il.goto_label(end);
            il.add_instruction(g);
            il.mark_label(else0);
            let taken1 = il.create_label();
            let cond1 = cmp_lc_expr(il, lc1);
            let e = il.if_then(cond1, taken1, end);
            il.add_instruction(e);
            il.mark_label(taken1);
            emit_loop_arm(il, insn_num, lc1, HEX_REG_SA1);
            let g = il.goto_label(end);
            il.add_instruction(g);
            il.mark_label(end);
        }
        Opcode::L2_loadri_io => {
            let dest = ctx.add_dest_write_only_reg(insn.regno[0] as u32);
            let il = ctx.il();
            let base = il.register(4, insn.regno[1] as u32);
            let off = il.const_int(4, insn.immed[0] as u32 as u64);
            let ea = il.add(4, base, off);
            let v = il.load(4, ea);
            let e = il.set_register(4, dest, v);
            il.add_instruction(e);
        }
        Opcode::S2_storeri_io => {
            let il = ctx.il();
            let base = il.register(4, insn.regno[0] as u32);
            let off = il.const_int(4, insn.immed[0] as u32 as u64);
            let ea = il.add(4, base, off);
            let v = il.register(4, insn.regno[1] as u32);
            let e = il.store(4, ea, v);
            il.add_instruction(e);
        }
        Opcode::S2_storerbnewgp => {
            // The decoder rewrote the N-field to the producer's destination
            // register; its packet value is that register's temporary.
            let il = ctx.il();
            let base = il.register(4, HEX_REG_GP);
            let off = il.const_int(4, insn.immed[0] as u32 as u64);
            let ea = il.add(4, base, off);
            let v = il.register(1, temp(insn.regno[0] as u32));
            let e = il.store(1, ea, v);
            il.add_instruction(e);
        }
        Opcode::S2_allocframe => {
            emit_allocframe(ctx, insn.regno[0] as u32, insn.immed[0]);
        }
        Opcode::SS2_allocframe => {
            emit_allocframe(ctx, HEX_REG_SP, insn.immed[0]);
        }
        Opcode::SS2_stored_sp => {
            let pair = ctx.source_pair_reg(insn.regno[0] as u32);
            let il = ctx.il();
            let sp = il.register(4, HEX_REG_SP);
            let off = il.const_int(4, insn.immed[0] as u32 as u64);
            let ea = il.add(4, sp, off);
            let v = il.register(8, pair);
            let e = il.store(8, ea, v);
            il.add_instruction(e);
        }
        Opcode::L4_return => {
            emit_dealloc_return(ctx, insn.regno[1] as u32, insn.regno[0] as u32);
        }
        Opcode::SL2_return => {
            emit_dealloc_return(ctx, insn.regno[0] as u32, HEX_REG_FP);
        }
        Opcode::A4_ext | Opcode::J2_trap0 | Opcode::J2_rte => {
            return false;
        }
    }
    true
}

/// Conditional-branch protocol: on a satisfied condition, set the
/// branch-taken flag (and, for indirect branches, the destination
/// temporary); the branch itself is emitted by the fan-out pass.
fn emit_cond_taken<IL: LowLevelIl>(il: &mut IL, cond: Expr, insn_num: usize, dest: Option<Expr>) {
    let taken_case = il.create_label();
    let not_taken = il.create_label();
    let e = il.if_then(cond, taken_case, not_taken);
    il.add_instruction(e);
    il.mark_label(taken_case);
    let one = il.const_int(1, 1);
    let e = il.set_register(1, temp(BRANCH_TAKEN_BASE + insn_num as u32), one);
    il.add_instruction(e);
    if let Some(dest) = dest {
        let e = il.set_register(4, temp(BRANCHR_DEST_BASE + insn_num as u32), dest);
        il.add_instruction(e);
    }
    let g = il.goto_label(not_taken);
    il.add_instruction(g);
    il.mark_label(not_taken);
}

fn cmp_lc_expr<IL: LowLevelIl>(il: &mut IL, lc_temp: u32) -> Expr {
    let lc = il.register(4, lc_temp);
    let one = il.const_int(4, 1);
    il.compare_unsigned_greater_than(4, lc, one)
}

fn emit_loop_arm<IL: LowLevelIl>(il: &mut IL, insn_num: usize, lc_temp: u32, sa: u32) {
    let one = il.const_int(1, 1);
    let e = il.set_register(1, temp(BRANCH_TAKEN_BASE + insn_num as u32), one);
    il.add_instruction(e);
    let dest = il.register(4, sa);
    let e = il.set_register(4, temp(BRANCHR_DEST_BASE + insn_num as u32), dest);
    il.add_instruction(e);
    let lc = il.register(4, lc_temp);
    let one = il.const_int(4, 1);
    let dec = il.sub(4, lc, one);
    let e = il.set_register(4, lc_temp, dec);
    il.add_instruction(e);
}

fn emit_endloop<IL: LowLevelIl>(ctx: &mut PacketContext<IL>, insn_num: usize, lc: u32, sa: u32) {
    let lc_temp = ctx.add_dest_read_write_reg(lc);
    let il = ctx.il();
    let taken_case = il.create_label();
    let not_taken = il.create_label();
    let cond = cmp_lc_expr(il, lc_temp);
    let e = il.if_then(cond, taken_case, not_taken);
    il.add_instruction(e);
    il.mark_label(taken_case);
    emit_loop_arm(il, insn_num, lc_temp, sa);
    let g = il.goto_label(not_taken);
    il.add_instruction(g);
    il.mark_label(not_taken);
}

/// allocframe: push LR:FP below `rx`, repoint FP, drop `rx` by the frame
/// size plus the saved pair.
fn emit_allocframe<IL: LowLevelIl>(ctx: &mut PacketContext<IL>, rx: u32, framesize: i32) {
    let fp_dest = ctx.add_dest_write_only_reg(HEX_REG_FP);
    let rx_dest = ctx.add_dest_write_only_reg(rx);
    let il = ctx.il();

    let base = il.register(4, rx);
    let eight = il.const_int(4, 8);
    let ea = il.sub(4, base, eight);
    let lr_fp = il.register_split(4, HEX_REG_LR, HEX_REG_FP);
    let st = il.store(8, ea, lr_fp);
    il.add_instruction(st);

    let base = il.register(4, rx);
    let eight = il.const_int(4, 8);
    let ea = il.sub(4, base, eight);
    let e = il.set_register(4, fp_dest, ea);
    il.add_instruction(e);

    let base = il.register(4, rx);
    let eight = il.const_int(4, 8);
    let ea = il.sub(4, base, eight);
    let size = il.const_int(4, framesize as u32 as u64);
    let v = il.sub(4, ea, size);
    let e = il.set_register(4, rx_dest, v);
    il.add_instruction(e);
}

/// dealloc_return: reload LR:FP from the frame at `rs`, pop the frame. The
/// fan-out pass emits the return through the restored link register.
fn emit_dealloc_return<IL: LowLevelIl>(ctx: &mut PacketContext<IL>, rs: u32, rdd_base: u32) {
    let pair = ctx.add_dest_write_only_reg_pair(rdd_base);
    let sp_dest = ctx.add_dest_write_only_reg(HEX_REG_SP);
    let il = ctx.il();

    let addr = il.register(4, rs);
    let v = il.load(8, addr);
    let e = il.set_register(8, pair, v);
    il.add_instruction(e);

    let base = il.register(4, rs);
    let eight = il.const_int(4, 8);
    let nsp = il.add(4, base, eight);
    let e = il.set_register(4, sp_dest, nsp);
    il.add_instruction(e);
}
