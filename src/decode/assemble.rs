//! Packet assembly: word scan, endloop synthesis, extender handling, slot
//! assignment, dot-new resolution and the execution-order transforms.

use log::debug;

use super::tree::decode_word;
use super::{is_loop_end, is_packet_end};
use crate::packet::{Insn, Packet};
use crate::status::Status;
use crate::tables::{
    has_attr, iclass_slots, opcode_info, which_immediate_is_extended, Opcode, ATTR_DOTNEWVALUE,
    ATTR_EXTENDER, ATTR_EXTENSION, ATTR_IMPLICIT_WRITES_P0, ATTR_IMPLICIT_WRITES_P3, ATTR_LOAD,
    ATTR_MEMLIKE, ATTR_MEMLIKE_PACKET_RULES, ATTR_NEWCMPJUMP, ATTR_STORE, ATTR_SUBINSN,
};

/// Result of a packet decode attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    /// A full packet; `encod_pkt_size_in_bytes` tells how many input words
    /// were consumed.
    Complete(Packet),
    /// The slice ended before an end-of-packet word. Not an error.
    Incomplete,
}

/// Decodes one packet from the front of `words`.
///
/// With `disas_only` set, constant extenders stay in the instruction list
/// (for display) and the execution-order transforms are skipped; this is
/// the form the packet database stores. The lifter later applies
/// [`remove_extenders`], [`shuffle_for_execution`] and [`split_cmpjump`] to
/// its private copy.
pub fn decode_packet(words: &[u32], disas_only: bool) -> Result<DecodeOutcome, Status> {
    let mut pkt = Packet::default();
    let mut words_read = 0usize;
    let mut end_of_packet = false;
    let mut ext_pending = false;

    while !end_of_packet && words_read < words.len() {
        let word = words[words_read];
        end_of_packet = is_packet_end(word);
        let new_insns = decode_word(word, words_read, ext_pending)?;
        ext_pending = new_insns.len() == 1 && new_insns[0].opcode == Opcode::A4_ext;
        pkt.insns.extend(new_insns);
        words_read += 1;
    }

    if !end_of_packet {
        return Ok(DecodeOutcome::Incomplete);
    }
    pkt.encod_pkt_size_in_bytes = (words_read * 4) as u32;

    pkt.pkt_has_extension = pkt
        .insns
        .iter()
        .any(|i| has_attr(i.opcode, ATTR_EXTENSION));

    // Hardware-loop ends ride on the parse bits of the first one or two
    // words: loop 0 fits a 2-word packet, loop 1 needs at least 3 words.
    if words_read == 2 && is_loop_end(words[0]) {
        append_endloop(&mut pkt, Opcode::J2_endloop0);
    }
    if words_read >= 3 {
        let has_loop0 = is_loop_end(words[0]);
        let has_loop1 = is_loop_end(words[1]);
        if has_loop0 && has_loop1 {
            append_endloop(&mut pkt, Opcode::J2_endloop01);
        } else if has_loop1 {
            append_endloop(&mut pkt, Opcode::J2_endloop1);
        } else if has_loop0 {
            append_endloop(&mut pkt, Opcode::J2_endloop0);
        }
    }

    apply_extenders(&mut pkt)?;
    if !disas_only {
        remove_extenders(&mut pkt);
    }
    set_slot_numbers(&mut pkt);
    fill_newvalue_regno(&mut pkt)?;

    if !disas_only {
        shuffle_for_execution(&mut pkt);
        split_cmpjump(&mut pkt);
    }

    pkt.set_attr_fields();

    debug!(
        "decoded packet: {} insns, {} bytes",
        pkt.num_insns(),
        pkt.encod_pkt_size_in_bytes
    );
    Ok(DecodeOutcome::Complete(pkt))
}

fn append_endloop(pkt: &mut Packet, opcode: Opcode) {
    let mut insn = Insn::default();
    insn.opcode = opcode;
    insn.is_endloop = true;
    pkt.insns.push(insn);
}

/// Widens each extender's successor: the extender supplies bits [31:6], the
/// consumer encoding the low 6 bits.
fn apply_extenders(pkt: &mut Packet) -> Result<(), Status> {
    for i in 0..pkt.insns.len() {
        if !has_attr(pkt.insns[i].opcode, ATTR_EXTENDER) {
            continue;
        }
        if i + 1 >= pkt.insns.len() {
            return Err(Status::internal(i, "extender at end of packet"));
        }
        let extender = pkt.insns[i].immed[0];
        let consumer = &mut pkt.insns[i + 1];
        consumer.extension_valid = true;
        let k = which_immediate_is_extended(consumer.opcode)? as usize;
        consumer.immed[k] = extender | (consumer.immed[k] & 0x3f);
    }
    Ok(())
}

/// Deletes every constant extender, compacting the list. Display packets
/// keep them; lifting copies do not.
pub fn remove_extenders(pkt: &mut Packet) {
    pkt.insns.retain(|i| !has_attr(i.opcode, ATTR_EXTENDER));
}

/// Slot assignment: walk the encoding order with a descending slot counter,
/// then apply the fixed exceptions (memory to slots 0/1, duplex halves to
/// slots 0/1, lone slot-1 instruction down to slot 0).
fn set_slot_numbers(pkt: &mut Packet) {
    let mut slot: u8 = 3;
    for i in 0..pkt.insns.len() {
        let valid = iclass_slots(pkt.insns[i].opcode, pkt.insns[i].iclass);
        while valid & (1 << slot) == 0 && slot > 0 {
            slot -= 1;
        }
        pkt.insns[i].slot = slot;
        if slot > 0 {
            slot -= 1;
        }
    }

    // Last memory instruction in encoding order takes slot 0, the one
    // before it slot 1.
    let mut hit_mem = false;
    for i in (0..pkt.insns.len()).rev() {
        let op = pkt.insns[i].opcode;
        if has_attr(op, ATTR_MEMLIKE) || has_attr(op, ATTR_MEMLIKE_PACKET_RULES) {
            if !hit_mem {
                hit_mem = true;
                pkt.insns[i].slot = 0;
            } else {
                pkt.insns[i].slot = 1;
            }
        }
    }

    // Duplex halves always occupy slots 0 and 1.
    let mut hit_duplex = false;
    for i in (0..pkt.insns.len()).rev() {
        if has_attr(pkt.insns[i].opcode, ATTR_SUBINSN) {
            if !hit_duplex {
                hit_duplex = true;
                pkt.insns[i].slot = 0;
            } else {
                pkt.insns[i].slot = 1;
            }
        }
    }

    // Slot 1 never stands alone; endloop pseudos do not count as slot-0
    // occupants.
    let mut slot0_found = false;
    let mut slot1_found = false;
    let mut slot1_idx = 0;
    for i in (0..pkt.insns.len()).rev() {
        if pkt.insns[i].slot == 0 && !is_endloop_opcode(pkt.insns[i].opcode) {
            slot0_found = true;
        }
        if pkt.insns[i].slot == 1 {
            slot1_found = true;
            slot1_idx = i;
        }
    }
    if !slot0_found && slot1_found {
        pkt.insns[slot1_idx].slot = 0;
    }
}

fn is_endloop_opcode(opcode: Opcode) -> bool {
    matches!(
        opcode,
        Opcode::J2_endloop0 | Opcode::J2_endloop1 | Opcode::J2_endloop01
    )
}

/// Rewrites each dot-new consumer's N-field into the producer's destination
/// register and records the producer's slot.
fn fill_newvalue_regno(pkt: &mut Packet) -> Result<(), Status> {
    for i in 1..pkt.insns.len() {
        let use_opcode = pkt.insns[i].opcode;
        if !has_attr(use_opcode, ATTR_DOTNEWVALUE) || has_attr(use_opcode, ATTR_EXTENSION) {
            continue;
        }

        // Stores carry the new value in Nt, jumps in Ns.
        let letter = if has_attr(use_opcode, ATTR_STORE) { 't' } else { 's' };
        let use_regidx = opcode_info(use_opcode)
            .reginfo
            .find(letter)
            .ok_or(Status::internal(i, "dot-new consumer lacks N-field operand"))?;

        // N-field bits [2:1] give the distance to the producer in whole,
        // non-extender instructions, counting towards lower addresses.
        let mut ahead = pkt.insns[i].regno[use_regidx] >> 1;
        if ahead == 0 {
            return Err(Status::internal(i, "dot-new distance of zero"));
        }
        let mut def_idx = i;
        while ahead > 0 {
            if def_idx == 0 {
                return Err(Status::internal(i, "dot-new producer out of range"));
            }
            def_idx -= 1;
            if has_attr(pkt.insns[def_idx].opcode, ATTR_EXTENDER) {
                continue;
            }
            if has_attr(pkt.insns[def_idx].opcode, ATTR_SUBINSN) {
                // A duplex pair counts as one whole instruction.
                if def_idx == 0 {
                    return Err(Status::internal(i, "dot-new producer out of range"));
                }
                def_idx -= 1;
            }
            ahead -= 1;
        }

        let def_opcode = pkt.insns[def_idx].opcode;
        let def_info = opcode_info(def_opcode);
        let dst_letter = [("Rd", 'd'), ("Rx", 'x'), ("Re", 'e'), ("Ry", 'y')]
            .into_iter()
            .find(|(pat, _)| def_info.wregs.contains(pat))
            .map(|(_, letter)| letter)
            .ok_or(Status::internal(def_idx, "dot-new producer writes no register"))?;
        let dst_idx = def_info
            .reginfo
            .find(dst_letter)
            .ok_or(Status::internal(def_idx, "producer signature lacks destination"))?;

        pkt.insns[i].regno[use_regidx] = pkt.insns[def_idx].regno[dst_idx];
        pkt.insns[i].new_value_producer_slot = pkt.insns[def_idx].slot as i8;
    }
    Ok(())
}

/// Reorders the packet to execution order: stores drift to the tail (never
/// crossing loads or each other), predicate-writing compares and implicit
/// predicate writers drift to the head, then a dot-new consumer and any
/// `rte` move to the very end.
pub fn shuffle_for_execution(pkt: &mut Packet) {
    let mut last_insn = pkt.insns.len() - 1;
    // Endloops stay put.
    if pkt.insns[last_insn].ends_loop() {
        last_insn -= 1;
    }

    loop {
        let mut changed = false;

        // Stores go last; iterate backwards moving a store past any
        // non-memory instruction seen below it.
        let mut flag = false;
        let mut n_mems = 0usize;
        for i in (0..=last_insn).rev() {
            let op = pkt.insns[i].opcode;
            if flag && has_attr(op, ATTR_STORE) {
                pkt.send_insn_to(i, last_insn - n_mems);
                n_mems += 1;
                changed = true;
            } else if has_attr(op, ATTR_STORE) {
                n_mems += 1;
            } else if has_attr(op, ATTR_LOAD) {
                // Stores may not cross loads.
                n_mems += 1;
            } else if has_attr(op, ATTR_DOTNEWVALUE) {
                // Stores may not cross a .new consumer either.
            } else {
                flag = true;
            }
        }
        if changed {
            continue;
        }

        // Compares go first, reorderable with respect to each other.
        let mut flag = false;
        for i in 0..=last_insn {
            let op = pkt.insns[i].opcode;
            let info = opcode_info(op);
            let writes_pred = info.wregs.contains("Pd4") || info.wregs.contains("Pe4");
            if writes_pred && !has_attr(op, ATTR_STORE) {
                // A compare, not a store-conditional.
                if flag {
                    pkt.send_insn_to(i, 0);
                    changed = true;
                    break;
                }
            } else if has_attr(op, ATTR_IMPLICIT_WRITES_P3) && !pkt.insns[i].ends_loop() {
                if flag {
                    pkt.send_insn_to(i, 0);
                    changed = true;
                    break;
                }
            } else if has_attr(op, ATTR_IMPLICIT_WRITES_P0) && !has_attr(op, ATTR_NEWCMPJUMP) {
                if flag {
                    pkt.send_insn_to(i, 0);
                    changed = true;
                    break;
                }
            } else {
                flag = true;
            }
        }
        if !changed {
            break;
        }
    }

    // A dot-new consumer runs after everything else, past the stores.
    for i in 0..last_insn {
        if has_attr(pkt.insns[i].opcode, ATTR_DOTNEWVALUE) {
            pkt.send_insn_to(i, last_insn);
            break;
        }
    }

    // rte updates the execution mode; it goes at the absolute end.
    for i in 0..last_insn {
        if pkt.insns[i].opcode == Opcode::J2_rte {
            pkt.send_insn_to(i, last_insn);
            break;
        }
    }
}

/// Splits each compound compare-jump into a compare half (`part1`) at the
/// head and the jump half in place.
pub fn split_cmpjump(pkt: &mut Packet) {
    let num = pkt.insns.len();
    for i in 0..num {
        if has_attr(pkt.insns[i].opcode, ATTR_NEWCMPJUMP) {
            // The copy at the tail does the compare; the original the jump.
            let mut cmp = pkt.insns[i];
            cmp.part1 = true;
            pkt.insns[i].part1 = false;
            pkt.insns.push(cmp);
        }
    }
    for i in 0..pkt.insns.len() {
        if pkt.insns[i].part1 {
            pkt.send_insn_to(i, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::{ICLASS_ALU32_2OP, ICLASS_CJ, ICLASS_J};

    fn decode_display(words: &[u32]) -> Packet {
        match decode_packet(words, true).expect("decode failed") {
            DecodeOutcome::Complete(pkt) => pkt,
            DecodeOutcome::Incomplete => panic!("incomplete"),
        }
    }

    fn decode_exec(words: &[u32]) -> Packet {
        match decode_packet(words, false).expect("decode failed") {
            DecodeOutcome::Complete(pkt) => pkt,
            DecodeOutcome::Incomplete => panic!("incomplete"),
        }
    }

    #[test]
    fn test_single_alu_instruction() {
        // { r0 = #256 }
        let pkt = decode_display(&[0x7800_e000]);
        assert_eq!(pkt.num_insns(), 1);
        assert_eq!(pkt.encod_pkt_size_in_bytes, 4);
        assert_eq!(pkt.insns[0].opcode, Opcode::A2_tfrsi);
        assert_eq!(pkt.insns[0].iclass, ICLASS_ALU32_2OP);
        assert_eq!(pkt.insns[0].slot, 3);
        assert_eq!(pkt.insns[0].regno[0], 0);
        assert_eq!(pkt.insns[0].immed[0], 256);
    }

    #[test]
    fn test_two_sub_instructions() {
        // { r1 = #0; r2 = #0 }
        let pkt = decode_display(&[0x2801_2802]);
        assert_eq!(pkt.num_insns(), 2);
        assert_eq!(pkt.encod_pkt_size_in_bytes, 4);
        assert_eq!(pkt.insns[0].opcode, Opcode::SA1_seti);
        assert_eq!(pkt.insns[0].slot, 1);
        assert_eq!(pkt.insns[0].regno[0], 1);
        assert_eq!(pkt.insns[1].opcode, Opcode::SA1_seti);
        assert_eq!(pkt.insns[1].slot, 0);
        assert_eq!(pkt.insns[1].regno[0], 2);
    }

    #[test]
    fn test_extender_widens_duplex_half() {
        // { immext(#3735924736); r3 = ##3735924747; r1 = #1 }
        let pkt = decode_display(&[0x0dea_76c0, 0x28b3_2811]);
        assert_eq!(pkt.num_insns(), 3);
        assert_eq!(pkt.encod_pkt_size_in_bytes, 8);
        assert_eq!(pkt.insns[0].opcode, Opcode::A4_ext);
        assert!(pkt.insns[1].extension_valid);
        assert_eq!(pkt.insns[1].which_extended, 0);
        assert_eq!(pkt.insns[1].immed[0] as u32, 3_735_924_747);
        assert_eq!(pkt.insns[1].regno[0], 3);
        assert_eq!(pkt.insns[2].immed[0], 1);
        assert_eq!(pkt.insns[2].regno[0], 1);
    }

    #[test]
    fn test_call_offset_is_pc_relative() {
        // 0x148: { call 0x0 }
        let pkt = decode_display(&[0x5bff_ff5c]);
        assert_eq!(pkt.num_insns(), 1);
        assert_eq!(pkt.insns[0].opcode, Opcode::J2_call);
        assert_eq!(pkt.insns[0].iclass, ICLASS_J);
        assert_eq!(pkt.insns[0].immed[0], -(0x148 as i32));
        assert!(pkt.pkt_has_cof);
    }

    #[test]
    fn test_extended_dual_jump_packet() {
        // 0x154: { immext(#4294967232)
        //          p0 = cmp.eq(r3,#0); if (p0.new) jump:t 0x128
        //          jump 0x138 }
        let pkt = decode_display(&[0x0fff_7fff, 0x1003_6028, 0x59ff_fff2]);
        assert_eq!(pkt.num_insns(), 3);
        assert_eq!(pkt.insns[0].opcode, Opcode::A4_ext);
        assert_eq!(pkt.insns[1].opcode, Opcode::J4_cmpeqi_tp0_jump_t);
        assert_eq!(pkt.insns[1].iclass, ICLASS_CJ);
        assert!(pkt.insns[1].extension_valid);
        assert_eq!(pkt.insns[1].which_extended, 0);
        assert_eq!(pkt.insns[1].immed[0], 0x128 - 0x154);
        assert_eq!(pkt.insns[2].iclass, ICLASS_J);
        assert_eq!(pkt.insns[2].immed[0], 0x138 - 0x154);
    }

    #[test]
    fn test_endloop_synthesis() {
        // { r2 = add(r2,#1); nop } :endloop0
        let pkt = decode_display(&[0xb002_8022, 0x7f00_c000]);
        assert_eq!(pkt.num_insns(), 3);
        assert_eq!(pkt.insns[0].opcode, Opcode::A2_addi);
        assert_eq!(pkt.insns[1].opcode, Opcode::A2_nop);
        assert_eq!(pkt.insns[2].opcode, Opcode::J2_endloop0);
        assert!(pkt.insns[2].is_endloop);
        assert!(pkt.pkt_has_endloop);
        assert!(pkt.pkt_has_cof);
    }

    #[test]
    fn test_incomplete_packet() {
        // Extender word alone: mid-packet parse bits, no terminator.
        let out = decode_packet(&[0x0dea_76c0], true).unwrap();
        assert_eq!(out, DecodeOutcome::Incomplete);
        let out = decode_packet(&[0x0fff_7fff, 0x1003_6028], true).unwrap();
        assert_eq!(out, DecodeOutcome::Incomplete);
    }

    #[test]
    fn test_decode_aborts_on_junk() {
        // ASCII string "_CLK failed!".
        assert!(decode_packet(&[0x4b4c_435f, 0x6961_6620, 0x2164_656c, 0], true).is_err());
        // ASCII string "ub-ID:%d" (duplex marker, undecodable halves).
        assert!(decode_packet(&[0x492d_6275, 0x6425_3a44], true).is_err());
    }

    #[test]
    fn test_dealloc_return_decodes() {
        // { dealloc_return }
        let pkt = decode_display(&[0x961e_c01e]);
        assert_eq!(pkt.insns[0].opcode, Opcode::L4_return);
        assert_eq!(pkt.insns[0].regno[0], 30);
        assert_eq!(pkt.insns[0].regno[1], 30);
        // Memory-like: takes slot 0.
        assert_eq!(pkt.insns[0].slot, 0);
    }

    #[test]
    fn test_dotnew_store_resolves_producer() {
        // { r2 = #0; immext(#59840); memb(##59888) = r2.new }
        let pkt = decode_display(&[0x7800_4002, 0x0000_43a7, 0x48a0_c230]);
        assert_eq!(pkt.num_insns(), 3);
        assert_eq!(pkt.insns[0].opcode, Opcode::A2_tfrsi);
        assert_eq!(pkt.insns[1].opcode, Opcode::A4_ext);
        assert_eq!(pkt.insns[2].opcode, Opcode::S2_storerbnewgp);
        assert_eq!(pkt.insns[2].immed[0], 59_888);
        // N-field rewritten to the producer's destination register.
        assert_eq!(pkt.insns[2].regno[0], 2);
        assert_eq!(
            pkt.insns[2].new_value_producer_slot,
            pkt.insns[0].slot as i8
        );
    }

    #[test]
    fn test_loop_packet_slots() {
        // { loop0(0x1c8,#10); r2 = #0 }
        let pkt = decode_display(&[0x6900_4052, 0x7800_c002]);
        assert_eq!(pkt.num_insns(), 2);
        assert_eq!(pkt.insns[0].opcode, Opcode::J2_loop0i);
        assert_eq!(pkt.insns[0].immed[0], 8);
        assert_eq!(pkt.insns[0].immed[1], 10);
        assert_eq!(pkt.insns[0].slot, 3);
        assert_eq!(pkt.insns[1].slot, 2);
    }

    #[test]
    fn test_exec_shuffle_moves_store_past_alu() {
        // { memw(r2+#8)=r3; r1 = add(r1,r1) }
        let pkt = decode_exec(&[0xa182_4302, 0xf301_c101]);
        assert_eq!(pkt.num_insns(), 2);
        assert_eq!(pkt.insns[0].opcode, Opcode::A2_add);
        assert_eq!(pkt.insns[1].opcode, Opcode::S2_storeri_io);
        assert!(pkt.pkt_has_store_s0);
    }

    #[test]
    fn test_exec_shuffle_moves_compare_first() {
        // 0x5c: { immext(#256); if (p0.new) jump:t ..; jump ..; p0 = cmp.eq(r3,#-35) }
        let pkt = decode_exec(&[0x0000_4004, 0x5c00_5870, 0x5800_40a4, 0x7523_fba0]);
        assert_eq!(pkt.num_insns(), 3);
        assert_eq!(pkt.insns[0].opcode, Opcode::C2_cmpeqi);
        assert_eq!(pkt.insns[0].immed[0], -35);
        assert_eq!(pkt.insns[1].opcode, Opcode::J2_jumptnewpt);
        assert_eq!(pkt.insns[2].opcode, Opcode::J2_jump);
    }

    #[test]
    fn test_exec_split_cmpjump() {
        // { immext(..); p0 = cmp.eq(r2,#10); if (p0.new) jump:t ..; jump .. }
        let pkt = decode_exec(&[0x0fff_7fff, 0x1002_6a18, 0x59ff_ffee]);
        assert_eq!(pkt.num_insns(), 3);
        assert_eq!(pkt.insns[0].opcode, Opcode::J4_cmpeqi_tp0_jump_t);
        assert!(pkt.insns[0].part1);
        assert_eq!(pkt.insns[1].opcode, Opcode::J4_cmpeqi_tp0_jump_t);
        assert!(!pkt.insns[1].part1);
        assert_eq!(pkt.insns[2].opcode, Opcode::J2_jump);
    }

    #[test]
    fn test_exec_keeps_dual_jump_order() {
        // { if (p0) jump:t ..; jump ..; r1 = add(r1,r1) }
        let pkt = decode_exec(&[0x5c00_5006, 0x5800_4008, 0xf301_c101]);
        assert_eq!(pkt.num_insns(), 3);
        assert_eq!(pkt.insns[0].opcode, Opcode::J2_jumptpt);
        assert_eq!(pkt.insns[1].opcode, Opcode::J2_jump);
        assert_eq!(pkt.insns[2].opcode, Opcode::A2_add);
    }

    #[test]
    fn test_packet_size_invariants() {
        for words in [
            vec![0x7800_e000],
            vec![0x2801_2802],
            vec![0x0dea_76c0, 0x28b3_2811],
            vec![0xb002_8022, 0x7f00_c000],
            vec![0x0fff_7fff, 0x1003_6028, 0x59ff_fff2],
        ] {
            let pkt = decode_display(&words);
            assert!(pkt.encod_pkt_size_in_bytes % 4 == 0);
            assert!(pkt.encod_pkt_size_in_bytes <= 16);
            assert!(pkt.num_insns() <= 6);
            for insn in &pkt.insns {
                assert!(insn.slot <= 3);
            }
        }
    }
}
