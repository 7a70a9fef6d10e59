//! Buffered, block-aligned writer over an MTD partition.

use crate::block::{erase_block, write_block};
use crate::channel::MtdChannel;
use crate::error::{MtdError, Result};
use crate::ledger::BadBlockLedger;
use crate::registry::PartitionInfo;
use std::io;

/// A streaming write context over a single MTD partition.
///
/// Coalesces partial writes into an `erase_size`-sized scratch buffer,
/// flushing complete blocks through [`write_block`]. `stored` is always
/// `< erase_size` between calls; `stored == erase_size` is a transient
/// state resolved before `write`/`erase_blocks` returns.
pub struct Writer<C: MtdChannel> {
    partition: PartitionInfo,
    chan: C,
    scratch: Vec<u8>,
    stored: u64,
    next_offset: u64,
    ledger: BadBlockLedger,
    closed: bool,
}

impl<C: MtdChannel> Writer<C> {
    /// Wrap an already-open, read-write channel as a buffered writer.
    pub fn new(partition: PartitionInfo, chan: C) -> Self {
        let erase_size = chan.erase_size();
        Self {
            partition,
            chan,
            scratch: vec![0u8; erase_size as usize],
            stored: 0,
            next_offset: 0,
            ledger: BadBlockLedger::new(),
            closed: false,
        }
    }

    pub fn partition(&self) -> &PartitionInfo {
        &self.partition
    }

    /// Skipped positions accumulated so far this session.
    pub fn ledger(&self) -> &BadBlockLedger {
        &self.ledger
    }

    /// Borrow the underlying channel, e.g. for tests or diagnostics that
    /// need to inspect the medium directly without consuming the writer
    /// via [`Writer::close`].
    pub fn channel(&self) -> &C {
        &self.chan
    }

    /// Accept `buf`, coalescing partial writes into the scratch buffer
    /// and flushing complete blocks directly from the caller's buffer
    /// when possible. Returns `buf.len()` on success.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let erase_size = self.chan.erase_size();
        let len = buf.len();
        let mut wrote = 0usize;

        while wrote < len {
            if self.stored > 0 || ((len - wrote) as u64) < erase_size {
                let avail = (erase_size - self.stored) as usize;
                let copy = std::cmp::min(len - wrote, avail);
                let start = self.stored as usize;
                self.scratch[start..start + copy].copy_from_slice(&buf[wrote..wrote + copy]);
                self.stored += copy as u64;
                wrote += copy;
            }

            if self.stored == erase_size {
                self.next_offset =
                    write_block(&mut self.chan, self.next_offset, &self.scratch, &mut self.ledger)?;
                self.stored = 0;
            }

            while self.stored == 0 && (len - wrote) as u64 >= erase_size {
                let chunk = &buf[wrote..wrote + erase_size as usize];
                self.next_offset = write_block(&mut self.chan, self.next_offset, chunk, &mut self.ledger)?;
                wrote += erase_size as usize;
            }
        }

        Ok(wrote)
    }

    /// Positional streaming write: repositions the internal cursor to
    /// `offset`, then writes through the same coalescing path as
    /// [`Writer::write`]. Because it still coalesces with the scratch
    /// buffer, callers that need a precise, unbuffered placement should
    /// use [`Writer::write_block_at`] instead.
    pub fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<usize> {
        self.next_offset = offset;
        self.write(buf)
    }

    /// Unbuffered erase+write+verify of exactly one erase block at a
    /// specific erase-aligned offset, bypassing the scratch buffer.
    /// Used by callers that need precise placement, e.g. writing a
    /// preloader image while skipping a header page.
    pub fn write_block_at(&mut self, buf: &[u8], offset: u64) -> Result<()> {
        write_block(&mut self.chan, offset, buf, &mut self.ledger)?;
        Ok(())
    }

    /// Flush any partial scratch (zero-padded to a full block), then
    /// erase `count` further erase blocks from the current offset
    /// (`count < 0` erases through the end of the partition). Returns
    /// the file offset after the erases.
    pub fn erase_blocks(&mut self, count: i64) -> Result<u64> {
        if self.stored > 0 {
            for b in &mut self.scratch[self.stored as usize..] {
                *b = 0;
            }
            self.next_offset =
                write_block(&mut self.chan, self.next_offset, &self.scratch, &mut self.ledger)?;
            self.stored = 0;
        }

        let erase_size = self.chan.erase_size();
        let total_size = self.chan.total_size();
        let remaining = (total_size - self.next_offset) / erase_size;
        let blocks = if count < 0 { remaining } else { count as u64 };
        if blocks > remaining {
            return Err(MtdError::OutOfSpace);
        }

        let mut pos = self.next_offset;
        for _ in 0..blocks {
            let bad = match self.chan.is_bad_block(pos) {
                Ok(bad) => bad,
                Err(e) => {
                    log::warn!("mtd: MEMGETBADBLOCK query failed at {pos:#x}: {e}");
                    true
                }
            };
            if bad {
                log::warn!("mtd: not erasing bad block at {pos:#x}");
            } else if let Err(e) = self.chan.erase(pos) {
                log::warn!("mtd: erase failure at {pos:#x}: {e}");
            }
            pos += erase_size;
        }

        self.next_offset = pos;
        Ok(self.next_offset)
    }

    /// Unbuffered erase of exactly the erase block containing `offset`,
    /// with no bad-block consultation and no verify.
    pub fn erase_at(&mut self, offset: u64) -> Result<u64> {
        erase_block(&mut self.chan, offset)
    }

    /// Flush any partial tail (zero-padded) and release the channel.
    /// Consuming `self` makes a double-close impossible at compile
    /// time; the same flush also runs from `Drop` if a `Writer` is
    /// dropped without an explicit `close`.
    pub fn close(mut self) -> Result<()> {
        let result = self.erase_blocks(0);
        self.closed = true;
        result.map(|_| ())
    }
}

impl<C: MtdChannel> Drop for Writer<C> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.erase_blocks(0) {
                log::warn!("mtd: writer dropped without close, flush failed: {e}");
            }
            self.closed = true;
        }
    }
}

impl<C: MtdChannel> io::Write for Writer<C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Writer::write(self, buf).map_err(io::Error::other)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimChannel;

    fn descriptor(total: u64, erase: u64) -> PartitionInfo {
        let mut reg = crate::registry::PartitionRegistry::new();
        reg.scan_str(&format!("mtd0: {total:08x} {erase:08x} \"test\"\n"))
            .unwrap();
        reg.find_by_name("test").unwrap().clone()
    }

    #[test]
    fn round_trip_matches_direct_read() {
        let erase_size = 0x10000u64;
        let total = 4 * erase_size;
        let part = descriptor(total, erase_size);
        let chan = SimChannel::new(total, erase_size);
        let mut writer = Writer::new(part, chan);

        let payload: Vec<u8> = (0..200_000usize).map(|i| (i % 251) as u8).collect();
        let written = writer.write(&payload).unwrap();
        assert_eq!(written, payload.len());

        // Flush the partial tail (what `close` does) while still holding
        // the writer, so the backing medium can be inspected directly.
        writer.erase_blocks(0).unwrap();
        let committed = writer.channel().data();
        assert_eq!(&committed[..payload.len()], payload.as_slice());
        assert!(committed[payload.len()..].iter().all(|&b| b == 0));

        writer.close().unwrap();
    }

    #[test]
    fn partial_writes_compose_like_one_write() {
        let erase_size = 0x4000u64;
        let total = 2 * erase_size;
        let part = descriptor(total, erase_size);

        let payload: Vec<u8> = (0..total as usize).map(|i| (i % 199) as u8).collect();

        let chan_a = SimChannel::new(total, erase_size);
        let mut writer_a = Writer::new(part.clone(), chan_a);
        writer_a.write(&payload).unwrap();
        writer_a.erase_blocks(0).unwrap();
        let content_a = writer_a.channel().data().to_vec();
        writer_a.close().unwrap();

        let chan_b = SimChannel::new(total, erase_size);
        let mut writer_b = Writer::new(part, chan_b);
        for chunk in payload.chunks(37) {
            writer_b.write(chunk).unwrap();
        }
        writer_b.erase_blocks(0).unwrap();
        let content_b = writer_b.channel().data().to_vec();
        writer_b.close().unwrap();

        assert_eq!(content_a, payload);
        assert_eq!(content_a, content_b);
    }

    #[test]
    fn close_zero_pads_partial_tail() {
        let erase_size = 0x10000u64;
        let part = descriptor(erase_size, erase_size);
        let chan = SimChannel::new(erase_size, erase_size);
        let mut writer = Writer::new(part, chan);

        writer.write(&[0x5Au8; 100]).unwrap();
        writer.erase_blocks(0).unwrap();

        let committed = writer.channel().data();
        assert!(committed[..100].iter().all(|&b| b == 0x5A));
        assert!(committed[100..erase_size as usize].iter().all(|&b| b == 0x00));

        writer.close().unwrap();
    }

    #[test]
    fn erase_blocks_negative_one_erases_to_end() {
        let erase_size = 0x1000u64;
        let total = 4 * erase_size;
        let part = descriptor(total, erase_size);
        let chan = SimChannel::new(total, erase_size);
        let mut writer = Writer::new(part, chan);

        let pos = writer.erase_blocks(-1).unwrap();
        assert_eq!(pos, total);
    }

    #[test]
    fn erase_blocks_more_than_remaining_fails_without_erasing() {
        let erase_size = 0x1000u64;
        let total = 2 * erase_size;
        let part = descriptor(total, erase_size);
        let chan = SimChannel::new(total, erase_size);
        let mut writer = Writer::new(part, chan);

        let err = writer.erase_blocks(3).unwrap_err();
        assert!(matches!(err, MtdError::OutOfSpace));
    }

    #[test]
    fn bad_block_payload_lands_on_next_good_block() {
        // 4 blocks, block 1 pre-bad; write one block of 0xAA then one of 0xBB.
        let erase_size = 0x1000u64;
        let total = 4 * erase_size;
        let part = descriptor(total, erase_size);
        let mut chan = SimChannel::new(total, erase_size);
        chan.mark_pre_bad(erase_size);

        let mut writer = Writer::new(part, chan);
        writer.write(&vec![0xAAu8; erase_size as usize]).unwrap();
        writer.write(&vec![0xBBu8; erase_size as usize]).unwrap();
        assert_eq!(writer.ledger().offsets(), &[erase_size]);

        let committed = writer.channel().data();
        let block = |n: u64| (n * erase_size) as usize..((n + 1) * erase_size) as usize;
        assert!(committed[block(0)].iter().all(|&b| b == 0xAA));
        assert!(committed[block(1)].iter().all(|&b| b == 0xFF)); // untouched, still factory-bad
        assert!(committed[block(2)].iter().all(|&b| b == 0xBB));

        writer.close().unwrap();
    }

    #[test]
    fn verify_fail_once_then_succeed_leaves_ledger_empty() {
        let erase_size = 0x1000u64;
        let total = 3 * erase_size;
        let part = descriptor(total, erase_size);
        let mut chan = SimChannel::new(total, erase_size);
        chan.inject_verify_failure(2 * erase_size, 1);

        let mut writer = Writer::new(part, chan);
        writer.write(&vec![0x11u8; erase_size as usize]).unwrap();
        writer.write(&vec![0x22u8; erase_size as usize]).unwrap();
        writer.write(&vec![0x33u8; erase_size as usize]).unwrap();
        assert!(writer.ledger().is_empty());

        let committed = writer.channel().data();
        let block = |n: u64| (n * erase_size) as usize..((n + 1) * erase_size) as usize;
        assert!(committed[block(0)].iter().all(|&b| b == 0x11));
        assert!(committed[block(1)].iter().all(|&b| b == 0x22));
        assert!(committed[block(2)].iter().all(|&b| b == 0x33));

        writer.close().unwrap();
    }

    #[test]
    fn exhaustion_reports_out_of_space_and_lists_both_blocks() {
        let erase_size = 0x1000u64;
        let total = 2 * erase_size;
        let part = descriptor(total, erase_size);
        let mut chan = SimChannel::new(total, erase_size);
        chan.mark_pre_bad(0);
        chan.mark_pre_bad(erase_size);

        let mut writer = Writer::new(part, chan);
        let err = writer.write(&vec![0xAAu8; erase_size as usize]).unwrap_err();
        assert!(matches!(err, MtdError::OutOfSpace));
        assert_eq!(writer.ledger().offsets(), &[0, erase_size]);
    }
}
