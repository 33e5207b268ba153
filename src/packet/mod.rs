//! Decoded instruction and packet representation.
//!
//! A `Packet` is the unit of decode, storage and lifting: an ordered group
//! of up to four native instructions (a duplex word contributes two
//! sub-instructions) plus synthetic endloop markers. Instructions inside a
//! packet execute in parallel with commit-at-end semantics; everything that
//! depends on that (slot numbers, dot-new links, shuffle order) lives on
//! the `Insn` records themselves.

use smallvec::SmallVec;

use crate::tables::{
    self, has_attr, Opcode, ATTR_CALL, ATTR_COND_J, ATTR_DCZEROA, ATTR_EXTENDER, ATTR_HWLOOP0_END,
    ATTR_HWLOOP1_END, ATTR_INDIRECT, ATTR_JUMP, ATTR_RETURN, ATTR_STORE, ATTR_SUBINSN,
    ATTR_SYSTEM,
};

/// Producer slot value meaning "not a dot-new consumer".
pub const NO_PRODUCER: i8 = -1;

/// A single decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Insn {
    pub opcode: Opcode,
    /// Top-level instruction class; duplex halves get the duplex class
    /// offset past the 32-bit classes.
    pub iclass: u8,
    /// Execution resource, 0..=3.
    pub slot: u8,
    /// Register numbers, one per lettered operand of the opcode signature.
    pub regno: [u8; 6],
    /// Sign-extended immediates.
    pub immed: [i32; 2],
    /// Compare half of a split compare-jump.
    pub part1: bool,
    /// A preceding constant extender widens one of this instruction's
    /// immediates.
    pub extension_valid: bool,
    /// Which immediate the extender widens.
    pub which_extended: u8,
    /// Synthetic end-of-hardware-loop marker.
    pub is_endloop: bool,
    /// For dot-new consumers, the slot of the producing instruction.
    pub new_value_producer_slot: i8,
    /// Vector-extension resource hint.
    pub hvx_resource: u8,
}

impl Default for Insn {
    fn default() -> Self {
        Insn {
            opcode: Opcode::default(),
            iclass: 0,
            slot: 0,
            regno: [0; 6],
            immed: [0; 2],
            part1: false,
            extension_valid: false,
            which_extended: 0,
            is_endloop: false,
            new_value_producer_slot: NO_PRODUCER,
            hvx_resource: 0,
        }
    }
}

impl Insn {
    pub fn is_sub_insn(&self) -> bool {
        has_attr(self.opcode, ATTR_SUBINSN)
    }

    pub fn is_extender(&self) -> bool {
        has_attr(self.opcode, ATTR_EXTENDER)
    }

    pub fn is_jump(&self) -> bool {
        has_attr(self.opcode, ATTR_JUMP)
    }

    pub fn is_call(&self) -> bool {
        has_attr(self.opcode, ATTR_CALL)
    }

    pub fn is_indirect(&self) -> bool {
        has_attr(self.opcode, ATTR_INDIRECT)
    }

    pub fn is_cond_jump(&self) -> bool {
        has_attr(self.opcode, ATTR_COND_J)
    }

    pub fn is_return(&self) -> bool {
        has_attr(self.opcode, ATTR_RETURN)
    }

    pub fn is_system(&self) -> bool {
        has_attr(self.opcode, ATTR_SYSTEM)
    }

    /// Marks the end of a hardware loop.
    pub fn ends_loop(&self) -> bool {
        has_attr(self.opcode, ATTR_HWLOOP0_END) || has_attr(self.opcode, ATTR_HWLOOP1_END)
    }

    /// Any change-of-flow: jumps, calls, traps, rte.
    pub fn can_jump(&self) -> bool {
        self.is_jump()
            || self.is_call()
            || matches!(self.opcode, Opcode::J2_trap0 | Opcode::J2_rte)
    }

    /// Byte footprint inside the encoded packet.
    pub fn encoded_size(&self) -> u64 {
        if self.is_sub_insn() {
            2
        } else {
            4
        }
    }
}

/// A decoded VLIW packet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Packet {
    pub insns: SmallVec<[Insn; 8]>,
    /// Encoded size: 4 bytes per word, duplex included.
    pub encod_pkt_size_in_bytes: u32,
    pub pkt_has_cof: bool,
    pub pkt_has_endloop: bool,
    pub pkt_has_dczeroa: bool,
    pub pkt_has_store_s0: bool,
    pub pkt_has_store_s1: bool,
    pub pkt_has_hvx: bool,
    pub pkt_has_extension: bool,
}

impl Packet {
    pub fn num_insns(&self) -> usize {
        self.insns.len()
    }

    /// Index of the last instruction that is not an endloop pseudo.
    pub fn last_real_insn_index(&self) -> usize {
        let mut last = self.insns.len() - 1;
        if self.insns[last].is_endloop {
            last -= 1;
        }
        last
    }

    /// Rotate the instruction at `start` to `newloc`, shifting the entries
    /// in between by one. Order of all other instructions is preserved.
    pub fn send_insn_to(&mut self, start: usize, newloc: usize) {
        if start == newloc {
            return;
        }
        if start < newloc {
            self.insns[start..=newloc].rotate_left(1);
        } else {
            self.insns[newloc..=start].rotate_right(1);
        }
    }

    /// Recompute the per-instruction `is_endloop` markers and the packet
    /// flags from the current instruction list. Compare halves of split
    /// compare-jumps are ignored for change-of-flow.
    pub fn set_attr_fields(&mut self) {
        self.pkt_has_cof = false;
        self.pkt_has_endloop = false;
        self.pkt_has_dczeroa = false;

        for i in 0..self.insns.len() {
            if self.insns[i].part1 {
                continue;
            }
            let opcode = self.insns[i].opcode;

            if has_attr(opcode, ATTR_DCZEROA) {
                self.pkt_has_dczeroa = true;
            }

            if has_attr(opcode, ATTR_STORE) {
                if self.insns[i].slot == 0 {
                    self.pkt_has_store_s0 = true;
                } else {
                    self.pkt_has_store_s1 = true;
                }
            }

            self.pkt_has_cof |= self.insns[i].can_jump();

            self.insns[i].is_endloop = self.insns[i].ends_loop();
            self.pkt_has_endloop |= self.insns[i].is_endloop;
            self.pkt_has_cof |= self.pkt_has_endloop;
        }
    }
}

/// Convenience accessor used by diagnostics.
pub fn opcode_name(opcode: Opcode) -> &'static str {
    tables::opcode_info(opcode).name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insn(opcode: Opcode) -> Insn {
        Insn {
            opcode,
            ..Default::default()
        }
    }

    #[test]
    fn test_send_insn_to_forward() {
        let mut pkt = Packet::default();
        pkt.insns.push(insn(Opcode::A2_add));
        pkt.insns.push(insn(Opcode::A2_nop));
        pkt.insns.push(insn(Opcode::J2_jump));
        pkt.send_insn_to(0, 2);
        assert_eq!(pkt.insns[0].opcode, Opcode::A2_nop);
        assert_eq!(pkt.insns[1].opcode, Opcode::J2_jump);
        assert_eq!(pkt.insns[2].opcode, Opcode::A2_add);
    }

    #[test]
    fn test_send_insn_to_backward() {
        let mut pkt = Packet::default();
        pkt.insns.push(insn(Opcode::A2_add));
        pkt.insns.push(insn(Opcode::A2_nop));
        pkt.insns.push(insn(Opcode::J2_jump));
        pkt.send_insn_to(2, 0);
        assert_eq!(pkt.insns[0].opcode, Opcode::J2_jump);
        assert_eq!(pkt.insns[1].opcode, Opcode::A2_add);
        assert_eq!(pkt.insns[2].opcode, Opcode::A2_nop);
    }

    #[test]
    fn test_predicates() {
        assert!(insn(Opcode::SA1_seti).is_sub_insn());
        assert!(insn(Opcode::J2_trap0).can_jump());
        assert!(!insn(Opcode::J2_trap0).is_jump());
        assert!(insn(Opcode::J2_endloop0).ends_loop());
        assert_eq!(insn(Opcode::SA1_seti).encoded_size(), 2);
        assert_eq!(insn(Opcode::A2_add).encoded_size(), 4);
    }

    #[test]
    fn test_last_real_insn_skips_endloop() {
        let mut pkt = Packet::default();
        pkt.insns.push(insn(Opcode::A2_addi));
        pkt.insns.push(insn(Opcode::A2_nop));
        let mut el = insn(Opcode::J2_endloop0);
        el.is_endloop = true;
        pkt.insns.push(el);
        assert_eq!(pkt.last_real_insn_index(), 1);
    }
}
