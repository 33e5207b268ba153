//! Address → packet database.
//!
//! Thread safe: every operation takes the database lock for its full
//! duration, decode included. Stored packets are never mutated; re-decoding
//! a range replaces the stored intervals wholesale.

use std::collections::BTreeMap;
use std::sync::Mutex;

use byteorder::{ByteOrder, LittleEndian};

use crate::decode::{decode_packet, DecodeOutcome};
use crate::packet::Packet;
use crate::status::Status;

/// Value stored per interval.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressInfo {
    pub start_addr: u64,
    pub pkt: Packet,
}

impl AddressInfo {
    fn end_addr(&self) -> u64 {
        self.start_addr + self.pkt.encod_pkt_size_in_bytes as u64
    }
}

/// Result of a database lookup: the packet covering an address and the
/// instruction inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct InsnInfo {
    /// Packet start address.
    pub pc: u64,
    pub pkt: Packet,
    /// Index into `pkt.insns`.
    pub insn_num: usize,
    /// Byte address of that instruction. Duplex halves occupy 2 bytes.
    pub insn_addr: u64,
}

/// Interval map keyed by interval start. Intervals never overlap.
#[derive(Debug, Default)]
struct IntervalMap {
    map: BTreeMap<u64, AddressInfo>,
}

impl IntervalMap {
    /// Sets `[start, end)`, removing every interval it overlaps.
    fn set_interval(&mut self, start: u64, end: u64, info: AddressInfo) {
        let doomed: Vec<u64> = self
            .map
            .range(..end)
            .rev()
            .take_while(|(_, v)| v.end_addr() > start)
            .map(|(k, _)| *k)
            .collect();
        for k in doomed {
            self.map.remove(&k);
        }
        self.map.insert(start, info);
    }

    fn find(&self, addr: u64) -> Option<&AddressInfo> {
        self.map
            .range(..=addr)
            .next_back()
            .map(|(_, v)| v)
            .filter(|v| addr < v.end_addr())
    }
}

/// The shared packet database.
#[derive(Debug, Default)]
pub struct PacketDb {
    map: Mutex<IntervalMap>,
}

impl PacketDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes packets from `data` at `addr` and stores them.
    ///
    /// Succeeds if at least one packet was added; decoding stops at the
    /// first incomplete or undecodable packet.
    pub fn add_bytes(&self, data: &[u8], addr: u64) -> Result<(), Status> {
        if data.len() < 4 || data.len() % 4 != 0 {
            return Err(Status::FailedPrecondition {
                reason: "need a positive multiple of four bytes",
            });
        }
        let mut words = vec![0u32; data.len() / 4];
        LittleEndian::read_u32_into(data, &mut words);

        let mut map = self.map.lock().expect("packet db lock poisoned");
        let mut addr = addr;
        let mut remaining = &words[..];
        let mut packets_added = 0usize;
        let mut last_err = None;
        while !remaining.is_empty() {
            let pkt = match decode_packet(remaining, true) {
                Ok(DecodeOutcome::Complete(pkt)) => pkt,
                Ok(DecodeOutcome::Incomplete) => break,
                Err(e) => {
                    last_err = Some(e);
                    break;
                }
            };
            let size = pkt.encod_pkt_size_in_bytes as u64;
            map.set_interval(addr, addr + size, AddressInfo { start_addr: addr, pkt });
            addr += size;
            remaining = &remaining[(size / 4) as usize..];
            packets_added += 1;
        }
        if packets_added == 0 {
            return Err(last_err.unwrap_or(Status::FailedPrecondition {
                reason: "no complete packet in data",
            }));
        }
        Ok(())
    }

    /// Looks up the previously decoded instruction covering `addr`.
    pub fn lookup(&self, addr: u64) -> Result<InsnInfo, Status> {
        let map = self.map.lock().expect("packet db lock poisoned");
        let addr_info = map.find(addr).ok_or(Status::NotFound { addr })?;
        Ok(find_instruction_in_packet(addr_info, addr))
    }
}

fn find_instruction_in_packet(addr_info: &AddressInfo, addr: u64) -> InsnInfo {
    let mut result = InsnInfo {
        pc: addr_info.start_addr,
        pkt: addr_info.pkt.clone(),
        insn_num: 0,
        insn_addr: addr_info.start_addr,
    };
    while result.insn_num < result.pkt.num_insns() {
        let size = result.pkt.insns[result.insn_num].encoded_size();
        if result.insn_addr <= addr && addr < result.insn_addr + size {
            break;
        }
        result.insn_addr += size;
        result.insn_num += 1;
    }
    result
}
