//! The [`MtdChannel`] trait decouples the block I/O algorithms in
//! [`crate::block`] from the kernel ioctl ABI, so the erase/write/verify
//! and ECC-skip logic can run against a real `/dev/mtd/mtd<N>` handle
//! (see the `mtdflash-linux-mtd` crate) or against an in-memory
//! simulator (see [`crate::sim`]) with the exact same code path.

use std::io;

/// Cumulative ECC counters reported by the kernel (`ECCGETSTATS`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EccStats {
    pub corrected: u32,
    pub failed: u32,
}

/// A partition's geometry as reported by the kernel (`MEMGETINFO`):
/// total size, erase-block size, and write granularity. This is the
/// `{total, erase, write}` triple returned by the `partition_info`
/// library-surface operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionGeometry {
    pub total: u64,
    pub erase: u64,
    pub write: u64,
}

/// A single open handle to an MTD partition's underlying medium.
///
/// Implementations are expected to track a file-offset cursor the way
/// a real character device does: `seek` repositions it, `read_exact`/
/// `write_all` consume `erase_size()`-sized chunks of it and advance it.
pub trait MtdChannel {
    /// Erase block size in bytes. Constant for the lifetime of the channel.
    fn erase_size(&self) -> u64;

    /// Total partition size in bytes. Constant for the lifetime of the channel.
    fn total_size(&self) -> u64;

    /// Write granularity in bytes (`MEMGETINFO`'s `writesize`), e.g. the
    /// NAND page size. Constant for the lifetime of the channel.
    fn write_size(&self) -> u64;

    /// Reposition the cursor to an absolute, erase-block-aligned offset.
    fn seek(&mut self, offset: u64) -> io::Result<()>;

    /// Read exactly `buf.len()` bytes starting at the cursor, advancing it.
    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()>;

    /// Write exactly `buf.len()` bytes starting at the cursor, advancing it.
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Sample the cumulative ECC corrected/failed counters.
    fn ecc_stats(&mut self) -> io::Result<EccStats>;

    /// Ask the kernel whether the erase block containing `offset` is
    /// factory-marked bad. A device reporting "operation not supported"
    /// must be surfaced as `Ok(false)` by the implementation (see
    /// spec.md §4.B.2).
    fn is_bad_block(&mut self, offset: u64) -> io::Result<bool>;

    /// Erase exactly the erase block containing `offset`.
    fn erase(&mut self, offset: u64) -> io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimChannel;

    #[test]
    fn sim_channel_reports_configured_write_size() {
        let chan = SimChannel::new(0x10000, 0x1000);
        assert_eq!(chan.write_size(), 1);

        let chan = SimChannel::new(0x10000, 0x1000).with_write_size(2048);
        assert_eq!(chan.write_size(), 2048);
    }

    #[test]
    fn geometry_reads_back_from_a_channel() {
        let chan = SimChannel::new(0x40000, 0x10000).with_write_size(512);
        let geometry = PartitionGeometry {
            total: chan.total_size(),
            erase: chan.erase_size(),
            write: chan.write_size(),
        };
        assert_eq!(geometry, PartitionGeometry { total: 0x40000, erase: 0x10000, write: 512 });
    }
}
