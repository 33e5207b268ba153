//! Hierarchical encoding decision tree.
//!
//! The tree is a flat arena of tables; entries refer to other tables by
//! index, never by pointer. Two roots exist: the 32-bit root (selected for
//! any word whose parse bits are non-zero) and the duplex root (parse bits
//! `00`). The duplex root indexes by the duplex iclass, a non-contiguous
//! field, through a custom lookup function.
//!
//! Reaching a `Terminal` is not sufficient: the candidate encoding must
//! still satisfy the opcode's mask/match pair (or its legacy alias pair).

use std::sync::OnceLock;

use super::Opcode;

/// One dispatch entry.
#[derive(Debug, Clone, Copy)]
pub enum Entry {
    Invalid,
    /// Continue the walk at another table.
    TableLink(usize),
    /// Candidate opcode; verify against the mask/match tables.
    Terminal(Opcode),
    /// Duplex word: decode two sub-instructions through the class tables.
    /// `high` decodes bits [16,29), `low` bits [0,13).
    Subinsns { high: usize, low: usize },
    /// Delegate to the architecture-extension (HVX) tree.
    ExtSpace,
}

/// One dispatch table: extract `[startbit, startbit+width)` from the
/// encoding (or run the custom lookup) and index `entries`.
pub struct Table {
    pub startbit: u8,
    pub width: u8,
    pub lookup: Option<fn(u32) -> u32>,
    pub entries: Vec<Entry>,
}

impl Table {
    /// Index selected by this table for `encoding`.
    pub fn index(&self, encoding: u32) -> usize {
        let i = match self.lookup {
            Some(f) => f(encoding),
            None => (encoding >> self.startbit) & ((1u32 << self.width) - 1),
        };
        i as usize
    }
}

/// The full tree arena.
pub struct Dectree {
    tables: Vec<Table>,
    root32: usize,
    root_duplex: usize,
}

impl Dectree {
    pub fn table(&self, idx: usize) -> &Table {
        &self.tables[idx]
    }

    pub fn root32(&self) -> &Table {
        &self.tables[self.root32]
    }

    pub fn root_duplex(&self) -> &Table {
        &self.tables[self.root_duplex]
    }
}

/// Duplex iclass: bits [31:29] and bit 13 of the word.
fn duplex_iclass(word: u32) -> u32 {
    ((word >> 29) & 0x7) << 1 | ((word >> 13) & 0x1)
}

fn table(startbit: u8, width: u8, entries: Vec<Entry>) -> Table {
    debug_assert_eq!(entries.len(), 1 << width);
    Table {
        startbit,
        width,
        lookup: None,
        entries,
    }
}

fn invalid_entries(width: u8) -> Vec<Entry> {
    vec![Entry::Invalid; 1 << width]
}

/// Process-wide tree, built once on first use.
pub fn dectree() -> &'static Dectree {
    static TREE: OnceLock<Dectree> = OnceLock::new();
    TREE.get_or_init(build)
}

fn build() -> Dectree {
    let mut tables = Vec::new();
    let mut add = |t: Table| -> usize {
        tables.push(t);
        tables.len() - 1
    };

    // Conditional direct jumps: dispatch on the predicate-form bits [12:11].
    let jcond = add(table(
        11,
        2,
        vec![
            Entry::Terminal(Opcode::J2_jumpt),
            Entry::Terminal(Opcode::J2_jumptnew),
            Entry::Terminal(Opcode::J2_jumptpt),
            Entry::Terminal(Opcode::J2_jumptnewpt),
        ],
    ));

    // J class: dispatch on bits [27:21].
    let j = {
        let mut e = invalid_entries(7);
        e[0x05] = Entry::Terminal(Opcode::J2_callr);
        e[0x14] = Entry::Terminal(Opcode::J2_jumpr);
        e[0x1a] = Entry::Terminal(Opcode::J2_jumprt);
        e[0x20] = Entry::Terminal(Opcode::J2_trap0);
        e[0x3f] = Entry::Terminal(Opcode::J2_rte);
        for i in 0x40..=0x4f {
            e[i] = Entry::Terminal(Opcode::J2_jump);
        }
        for i in 0x50..=0x5f {
            e[i] = Entry::Terminal(Opcode::J2_call);
        }
        e[0x60] = Entry::TableLink(jcond);
        add(table(21, 7, e))
    };

    // ALU32 2-op class: dispatch on bits [27:24].
    let alu2 = {
        let mut e = invalid_entries(4);
        e[0x0] = Entry::Terminal(Opcode::A2_tfr);
        e[0x5] = Entry::Terminal(Opcode::C2_cmpeqi);
        e[0x8] = Entry::Terminal(Opcode::A2_tfrsi);
        e[0xf] = Entry::Terminal(Opcode::A2_nop);
        add(table(24, 4, e))
    };

    // Load class: dispatch on bits [27:21].
    let ld = {
        let mut e = invalid_entries(7);
        e[0x0c] = Entry::Terminal(Opcode::L2_loadri_io);
        e[0x30] = Entry::Terminal(Opcode::L4_return);
        add(table(21, 7, e))
    };

    // Store class: dispatch on bits [27:21].
    let st = {
        let mut e = invalid_entries(7);
        e[0x04] = Entry::Terminal(Opcode::S2_allocframe);
        e[0x0c] = Entry::Terminal(Opcode::S2_storeri_io);
        add(table(21, 7, e))
    };

    // Duplex sub-instruction class tables over the 13-bit fragments.
    // Class A: dispatch on fragment bits [12:10].
    let class_a = {
        let mut e = invalid_entries(3);
        e[0b010] = Entry::Terminal(Opcode::SA1_seti);
        add(table(10, 3, e))
    };
    // Class L2: dispatch on fragment bits [12:6].
    let class_l2 = {
        let mut e = invalid_entries(7);
        e[0x7d] = Entry::Terminal(Opcode::SL2_return);
        add(table(6, 7, e))
    };
    // Class S2: dispatch on fragment bits [12:9].
    let class_s2 = {
        let mut e = invalid_entries(4);
        e[0x5] = Entry::Terminal(Opcode::SS2_stored_sp);
        e[0xe] = Entry::Terminal(Opcode::SS2_allocframe);
        add(table(9, 4, e))
    };

    // 32-bit root: dispatch on the iclass bits [31:28].
    let root32 = add(table(
        28,
        4,
        vec![
            Entry::Terminal(Opcode::A4_ext),               // 0 EXTENDER
            Entry::Terminal(Opcode::J4_cmpeqi_tp0_jump_t), // 1 CJ
            Entry::Invalid,                                // 2 NCJ
            Entry::Invalid,                                // 3 V4LDST
            Entry::Terminal(Opcode::S2_storerbnewgp),      // 4 V2LDST
            Entry::TableLink(j),                           // 5 J
            Entry::Terminal(Opcode::J2_loop0i),            // 6 CR
            Entry::TableLink(alu2),                        // 7 ALU32_2op
            Entry::Terminal(Opcode::C2_tfrrp),             // 8 S_2op
            Entry::TableLink(ld),                          // 9 LD
            Entry::TableLink(st),                          // 10 ST
            Entry::Terminal(Opcode::A2_addi),              // 11 ALU32_ADDI
            Entry::Invalid,                                // 12 M
            Entry::Invalid,                                // 13 ALU64
            Entry::Invalid,                                // 14 S_3op
            Entry::Terminal(Opcode::A2_add),               // 15 ALU32_3op
        ],
    ));

    // Duplex root: index by duplex iclass through the custom lookup.
    // Entries are (high-class, low-class) pairs from the duplex iclass map;
    // classes absent from the imported subset stay invalid.
    let root_duplex = {
        let mut e = invalid_entries(4);
        e[0x3] = Entry::Subinsns {
            high: class_a,
            low: class_a,
        };
        e[0x5] = Entry::Subinsns {
            high: class_a,
            low: class_l2,
        };
        e[0xe] = Entry::Subinsns {
            high: class_s2,
            low: class_s2,
        };
        let mut t = table(0, 4, e);
        t.lookup = Some(duplex_iclass);
        add(t)
    };

    Dectree {
        tables,
        root32,
        root_duplex,
    }
}
