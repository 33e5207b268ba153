//! Per-packet lifting context.
//!
//! Destination writes inside a packet land in temporary registers and
//! become architecturally visible only when `write_clobbered_regs` runs
//! after the last instruction. Keeping destinations in the temporary space
//! is also what makes `.new` operand reads work: a consumer reads the
//! producer's destination temporary directly.
//!
//! Temporary key layout: `subspace * NUM_HEX_REGS + reg`. Subspace 0 holds
//! single registers and destination pairs; subspace 1 holds source pair
//! snapshots, which must not collide with their constituent singles.

use std::collections::BTreeMap;

use log::warn;

use crate::host::{temp, LowLevelIl};
use crate::regs::{HEX_REG_P0, HEX_REG_P3, NUM_HEX_REGS};

struct TempReg {
    size: usize,
    reg: u32,
    subspace: u32,
}

impl TempReg {
    fn temp_reg(&self) -> u32 {
        temp(self.subspace * NUM_HEX_REGS + self.reg)
    }

    fn copy_to_temp<IL: LowLevelIl>(&self, il: &mut IL) {
        let expr = match self.size {
            8 => {
                let pair = il.register_split(4, self.reg + 1, self.reg);
                il.set_register(8, self.temp_reg(), pair)
            }
            size => {
                let value = il.register(size, self.reg);
                il.set_register(size, self.temp_reg(), value)
            }
        };
        il.add_instruction(expr);
    }

    fn copy_from_temp<IL: LowLevelIl>(&self, il: &mut IL) {
        let expr = match self.size {
            8 => {
                let value = il.register(8, self.temp_reg());
                il.set_register_split(4, self.reg + 1, self.reg, value)
            }
            size => {
                let value = il.register(size, self.temp_reg());
                il.set_register(size, self.reg, value)
            }
        };
        il.add_instruction(expr);
    }
}

/// Owns the destination temporaries of one packet lift.
pub struct PacketContext<'a, IL: LowLevelIl> {
    il: &'a mut IL,
    regs: BTreeMap<u32, TempReg>,
}

impl<'a, IL: LowLevelIl> PacketContext<'a, IL> {
    pub fn new(il: &'a mut IL) -> Self {
        PacketContext {
            il,
            regs: BTreeMap::new(),
        }
    }

    pub fn il(&mut self) -> &mut IL {
        self.il
    }

    /// Snapshot of a source register pair, in subspace 1.
    /// Returns the temporary holding the pre-packet pair value.
    pub fn source_pair_reg(&mut self, reg: u32) -> u32 {
        let tr = TempReg {
            size: 8,
            reg,
            subspace: 1,
        };
        tr.copy_to_temp(self.il);
        tr.temp_reg()
    }

    pub fn add_dest_write_only_reg(&mut self, reg: u32) -> u32 {
        self.add_dest_reg(false, 4, reg)
    }

    pub fn add_dest_read_write_reg(&mut self, reg: u32) -> u32 {
        self.add_dest_reg(true, 4, reg)
    }

    pub fn add_dest_write_only_reg_pair(&mut self, reg: u32) -> u32 {
        self.add_dest_reg(false, 8, reg)
    }

    pub fn add_dest_read_write_reg_pair(&mut self, reg: u32) -> u32 {
        self.add_dest_reg(true, 8, reg)
    }

    pub fn add_dest_write_only_pred_reg(&mut self, reg: u32) -> u32 {
        debug_assert!((HEX_REG_P0..=HEX_REG_P3).contains(&reg));
        self.add_dest_reg(false, 1, reg)
    }

    pub fn add_dest_read_write_pred_reg(&mut self, reg: u32) -> u32 {
        debug_assert!((HEX_REG_P0..=HEX_REG_P3).contains(&reg));
        self.add_dest_reg(true, 1, reg)
    }

    /// One-byte destination sub-register (USR.LPCFG).
    pub fn add_dest_write_only_byte_reg(&mut self, reg: u32) -> u32 {
        self.add_dest_reg(false, 1, reg)
    }

    fn add_dest_reg(&mut self, rw: bool, size: usize, reg: u32) -> u32 {
        if let Some(existing) = self.regs.get(&reg) {
            if existing.size != size {
                // A destination seen as both a single and a pair half.
                // First registration wins; see the engine design notes.
                warn!(
                    "dest reg {} requested with size {} but registered with size {}",
                    reg, size, existing.size
                );
            }
            return existing.temp_reg();
        }
        let tr = TempReg {
            size,
            reg,
            subspace: 0,
        };
        if rw {
            // Read-modify-write and predicated destinations start from the
            // original register value.
            tr.copy_to_temp(self.il);
        }
        let out = tr.temp_reg();
        self.regs.insert(reg, tr);
        out
    }

    /// Copies every destination temporary back to its real register. This
    /// is the packet's commit point.
    pub fn write_clobbered_regs(&mut self) {
        for tr in self.regs.values() {
            tr.copy_from_temp(self.il);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::il::mock::{MockExpr, MockIl};

    #[test]
    fn test_write_only_dest_defers_write() {
        let mut il = MockIl::new();
        let mut ctx = PacketContext::new(&mut il);
        let t = ctx.add_dest_write_only_reg(1);
        assert_eq!(t, temp(1));
        // No init copy for write-only destinations.
        assert!(il.insns.is_empty());
    }

    #[test]
    fn test_read_write_dest_initialises_from_register() {
        let mut il = MockIl::new();
        let mut ctx = PacketContext::new(&mut il);
        let t = ctx.add_dest_read_write_reg(2);
        assert_eq!(t, temp(2));
        assert_eq!(il.insns.len(), 1);
        assert!(matches!(
            &il.insns[0],
            MockExpr::SetReg { size: 4, reg, value } if *reg == temp(2)
                && matches!(value.as_ref(), MockExpr::Reg { size: 4, reg: 2 })
        ));
    }

    #[test]
    fn test_dest_registered_once() {
        let mut il = MockIl::new();
        let mut ctx = PacketContext::new(&mut il);
        let a = ctx.add_dest_read_write_reg(3);
        let b = ctx.add_dest_read_write_reg(3);
        assert_eq!(a, b);
        // Init copy emitted only once.
        assert_eq!(il.insns.len(), 1);
    }

    #[test]
    fn test_first_seen_size_wins() {
        let mut il = MockIl::new();
        let mut ctx = PacketContext::new(&mut il);
        let pair = ctx.add_dest_write_only_reg_pair(30);
        let single = ctx.add_dest_write_only_reg(30);
        assert_eq!(pair, single);
        ctx.write_clobbered_regs();
        // Written back once, as the pair it was first registered as.
        assert_eq!(il.insns.len(), 1);
        assert!(matches!(
            &il.insns[0],
            MockExpr::SetRegSplit { size: 4, hi: 31, lo: 30, .. }
        ));
    }

    #[test]
    fn test_pair_snapshot_uses_subspace_one() {
        let mut il = MockIl::new();
        let mut ctx = PacketContext::new(&mut il);
        let t = ctx.source_pair_reg(16);
        assert_eq!(t, temp(NUM_HEX_REGS + 16));
        assert_eq!(il.insns.len(), 1);
        assert!(matches!(
            &il.insns[0],
            MockExpr::SetReg { size: 8, reg, value } if *reg == temp(NUM_HEX_REGS + 16)
                && matches!(value.as_ref(), MockExpr::RegSplit { size: 4, hi: 17, lo: 16 })
        ));
    }

    #[test]
    fn test_write_back_order_is_deterministic() {
        let mut il = MockIl::new();
        let mut ctx = PacketContext::new(&mut il);
        ctx.add_dest_write_only_reg(29);
        ctx.add_dest_write_only_reg(1);
        ctx.write_clobbered_regs();
        assert_eq!(il.insns.len(), 2);
        // Ascending register order.
        assert!(matches!(&il.insns[0], MockExpr::SetReg { reg: 1, .. }));
        assert!(matches!(&il.insns[1], MockExpr::SetReg { reg: 29, .. }));
    }
}
