//! In-memory [`MtdChannel`] simulator used by the unit tests in
//! [`crate::block`], [`crate::reader`] and [`crate::writer`].
//!
//! Mirrors the role `rflasher-dummy` plays for the teacher's `SpiMaster`
//! trait: a fault-injectable in-memory stand-in for real hardware so
//! the block algorithms can be exercised without a kernel MTD device.

use crate::channel::{EccStats, MtdChannel};
use std::collections::{HashMap, HashSet};
use std::io;

/// Simulated MTD partition backed by a `Vec<u8>`.
pub struct SimChannel {
    data: Vec<u8>,
    erase_size: u64,
    write_size: u64,
    cursor: u64,
    ecc_corrected: u32,
    ecc_failed: u32,
    pre_bad_blocks: HashSet<u64>,
    ecc_fail_offsets: HashSet<u64>,
    verify_fail_remaining: HashMap<u64, u32>,
}

impl SimChannel {
    /// Create a defect-free, erased (all `0xFF`) simulated partition.
    pub fn new(total_size: u64, erase_size: u64) -> Self {
        Self {
            data: vec![0xFFu8; total_size as usize],
            erase_size,
            write_size: 1,
            cursor: 0,
            ecc_corrected: 0,
            ecc_failed: 0,
            pre_bad_blocks: HashSet::new(),
            ecc_fail_offsets: HashSet::new(),
            verify_fail_remaining: HashMap::new(),
        }
    }

    /// Override the simulated write granularity (defaults to 1, i.e.
    /// byte-addressable); useful for tests that care about `write_size`
    /// specifically, e.g. a NAND page-size simulation.
    pub fn with_write_size(mut self, write_size: u64) -> Self {
        self.write_size = write_size;
        self
    }

    fn block_offset(&self, offset: u64) -> u64 {
        (offset / self.erase_size) * self.erase_size
    }

    /// Mark the erase block containing `offset` as factory-bad.
    pub fn mark_pre_bad(&mut self, offset: u64) {
        let b = self.block_offset(offset);
        self.pre_bad_blocks.insert(b);
    }

    /// Make every read of the erase block containing `offset` advance
    /// the cumulative ECC-failed counter (simulating an uncorrectable
    /// ECC event on that block).
    pub fn inject_ecc_failure(&mut self, offset: u64) {
        let b = self.block_offset(offset);
        self.ecc_fail_offsets.insert(b);
    }

    /// Corrupt the next `times` writes to the erase block containing
    /// `offset` so their post-write verify readback mismatches.
    pub fn inject_verify_failure(&mut self, offset: u64, times: u32) {
        let b = self.block_offset(offset);
        self.verify_fail_remaining.insert(b, times);
    }

    /// Snapshot of the simulated medium, for assertions.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl MtdChannel for SimChannel {
    fn erase_size(&self) -> u64 {
        self.erase_size
    }

    fn total_size(&self) -> u64 {
        self.data.len() as u64
    }

    fn write_size(&self) -> u64 {
        self.write_size
    }

    fn seek(&mut self, offset: u64) -> io::Result<()> {
        self.cursor = offset;
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let start = self.cursor as usize;
        let end = start + buf.len();
        if end > self.data.len() {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "sim: short read"));
        }
        buf.copy_from_slice(&self.data[start..end]);
        if self.ecc_fail_offsets.contains(&self.block_offset(self.cursor)) {
            self.ecc_failed += 1;
        }
        self.cursor = end as u64;
        Ok(())
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let start = self.cursor as usize;
        let end = start + buf.len();
        if end > self.data.len() {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "sim: short write"));
        }
        self.data[start..end].copy_from_slice(buf);

        let block = self.block_offset(self.cursor);
        if let Some(remaining) = self.verify_fail_remaining.get_mut(&block) {
            if *remaining > 0 {
                *remaining -= 1;
                self.data[start] ^= 0x01;
            }
        }
        self.cursor = end as u64;
        Ok(())
    }

    fn ecc_stats(&mut self) -> io::Result<EccStats> {
        Ok(EccStats {
            corrected: self.ecc_corrected,
            failed: self.ecc_failed,
        })
    }

    fn is_bad_block(&mut self, offset: u64) -> io::Result<bool> {
        Ok(self.pre_bad_blocks.contains(&self.block_offset(offset)))
    }

    fn erase(&mut self, offset: u64) -> io::Result<()> {
        let start = self.block_offset(offset) as usize;
        let end = start + self.erase_size as usize;
        if end > self.data.len() {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "sim: erase out of range"));
        }
        for b in &mut self.data[start..end] {
            *b = 0xFF;
        }
        Ok(())
    }
}
