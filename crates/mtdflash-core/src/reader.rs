//! Buffered, block-aligned reader over an MTD partition.

use crate::block::read_block;
use crate::channel::MtdChannel;
use crate::error::Result;
use crate::registry::PartitionInfo;
use std::io;

/// A streaming read context over a single MTD partition.
///
/// Internally issues `erase_size`-aligned block reads (via
/// [`read_block`]) into an owned scratch buffer, copying out partial
/// head/tail bytes to satisfy arbitrary-length requests. `consumed ==
/// erase_size` means the scratch buffer is stale and must be refilled
/// before it can serve another byte.
pub struct Reader<C: MtdChannel> {
    partition: PartitionInfo,
    chan: C,
    scratch: Vec<u8>,
    /// Bytes already handed out of `scratch`; `erase_size` means empty.
    consumed: u64,
    /// Next erase-aligned offset `read_block` should try.
    next_offset: u64,
}

impl<C: MtdChannel> Reader<C> {
    /// Wrap an already-open channel as a buffered reader. The channel's
    /// `erase_size`/`total_size` are taken as authoritative; `partition`
    /// is kept only for diagnostics and for callers that want it back.
    pub fn new(partition: PartitionInfo, chan: C) -> Self {
        let erase_size = chan.erase_size();
        Self {
            partition,
            chan,
            scratch: vec![0u8; erase_size as usize],
            consumed: erase_size,
            next_offset: 0,
        }
    }

    pub fn partition(&self) -> &PartitionInfo {
        &self.partition
    }

    /// Fill `buf` completely, interleaving scratch drains, direct block
    /// reads, and scratch refills as described in the module docs.
    /// Returns `buf.len()` on success; a read failure from the
    /// underlying medium is the only way to get a short result, and it
    /// comes back as `Err`, never a partial `Ok`.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let erase_size = self.chan.erase_size();
        let len = buf.len();
        let mut done = 0usize;

        while done < len {
            if self.consumed < erase_size {
                let avail = (erase_size - self.consumed) as usize;
                let copy = std::cmp::min(len - done, avail);
                let start = self.consumed as usize;
                buf[done..done + copy].copy_from_slice(&self.scratch[start..start + copy]);
                self.consumed += copy as u64;
                done += copy;
            }

            while self.consumed == erase_size && (len - done) as u64 >= erase_size {
                let chunk = &mut buf[done..done + erase_size as usize];
                self.next_offset = read_block(&mut self.chan, self.next_offset, chunk)?;
                done += erase_size as usize;
            }

            if done >= len {
                return Ok(done);
            }

            if self.consumed == erase_size {
                self.next_offset = read_block(&mut self.chan, self.next_offset, &mut self.scratch)?;
                self.consumed = 0;
            }
        }

        Ok(done)
    }

    /// Positional raw read: seeks the channel absolutely to `offset`
    /// and issues a single unbuffered read, bypassing bad-block and ECC
    /// inspection entirely.
    pub fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.chan.seek(offset)?;
        self.chan.read_exact(buf)?;
        Ok(buf.len())
    }

    /// Consume the reader, releasing the channel and scratch buffer.
    /// Always succeeds for a reader (nothing to flush), but returns a
    /// `Result` for symmetry with [`crate::writer::Writer::close`].
    pub fn close(self) -> Result<()> {
        Ok(())
    }
}

impl<C: MtdChannel> io::Read for Reader<C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Reader::read(self, buf).map_err(io::Error::other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::BadBlockLedger;
    use crate::sim::SimChannel;

    fn descriptor(total: u64, erase: u64) -> PartitionInfo {
        let mut reg = crate::registry::PartitionRegistry::new();
        reg.scan_str(&format!("mtd0: {total:08x} {erase:08x} \"test\"\n"))
            .unwrap();
        reg.find_by_name("test").unwrap().clone()
    }

    fn write_seed(chan: &mut SimChannel, erase_size: u64, pattern: impl Fn(usize) -> u8) {
        let total = chan.total_size();
        let mut ledger = BadBlockLedger::new();
        let blocks = total / erase_size;
        for b in 0..blocks {
            let block_start = (b * erase_size) as usize;
            let data: Vec<u8> = (0..erase_size as usize)
                .map(|i| pattern(block_start + i))
                .collect();
            crate::block::write_block(chan, b * erase_size, &data, &mut ledger).unwrap();
        }
    }

    #[test]
    fn read_across_scratch_refill_boundary_matches_direct_read() {
        let erase_size = 0x100u64;
        let total = 4 * erase_size;
        let mut chan = SimChannel::new(total, erase_size);
        write_seed(&mut chan, erase_size, |i| (i % 251) as u8);

        let part = descriptor(total, erase_size);
        let mut reader = Reader::new(part, chan);

        // A request straddling the first scratch refill boundary.
        let mut out = vec![0u8; (erase_size + 37) as usize];
        let n = reader.read(&mut out).unwrap();
        assert_eq!(n, out.len());

        let expected: Vec<u8> = (0..out.len()).map(|i| (i % 251) as u8).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn read_at_bypasses_buffering() {
        let erase_size = 0x100u64;
        let total = 2 * erase_size;
        let mut chan = SimChannel::new(total, erase_size);
        write_seed(&mut chan, erase_size, |i| (i % 251) as u8);

        let part = descriptor(total, erase_size);
        let mut reader = Reader::new(part, chan);

        let mut out = vec![0u8; 16];
        reader.read_at(&mut out, erase_size + 5).unwrap();
        let expected: Vec<u8> = (0..16).map(|i| ((erase_size as usize + 5 + i) % 251) as u8).collect();
        assert_eq!(out, expected);
    }
}
