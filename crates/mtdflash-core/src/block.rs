//! Block I/O primitives: one erase-block read (with ECC-stat delta
//! detection and bad-block query), or one erase-block erase+write+verify
//! cycle, against a single [`MtdChannel`].

use crate::channel::MtdChannel;
use crate::error::{MtdError, Result};
use crate::ledger::BadBlockLedger;
use std::io;

/// Read the next good erase block at or after `start_offset`.
///
/// `buf` must be exactly `chan.erase_size()` bytes. On success, returns
/// the offset one erase block past the block that was read — the
/// caller's next `read_block` call should start there.
pub fn read_block<C: MtdChannel>(chan: &mut C, start_offset: u64, buf: &mut [u8]) -> Result<u64> {
    let erase_size = chan.erase_size();
    let total_size = chan.total_size();
    debug_assert_eq!(buf.len() as u64, erase_size);

    let mut before = chan.ecc_stats()?;
    let mut pos = start_offset;

    while pos + erase_size <= total_size {
        let read_ok = (|| -> io::Result<()> {
            chan.seek(pos)?;
            chan.read_exact(buf)
        })()
        .is_ok();

        if !read_ok {
            log::warn!("mtd: read error at {pos:#x}");
            pos += erase_size;
            continue;
        }

        let after = chan.ecc_stats()?;
        if after.failed != before.failed {
            log::warn!(
                "mtd: ECC errors ({} soft, {} hard) at {pos:#x}",
                after.corrected.wrapping_sub(before.corrected),
                after.failed.wrapping_sub(before.failed),
            );
            before = after;
            pos += erase_size;
            continue;
        }

        match chan.is_bad_block(pos) {
            Ok(false) => return Ok(pos + erase_size),
            Ok(true) => {
                log::warn!("mtd: MEMGETBADBLOCK reports bad block at {pos:#x}");
                pos += erase_size;
                continue;
            }
            Err(e) => {
                // A failing bad-block query is treated the same as a bad
                // block: the kernel's MEMGETBADBLOCK return is non-zero
                // either way, and this primitive only needs to decide
                // whether this block is safe to hand back to the caller.
                log::warn!("mtd: MEMGETBADBLOCK query failed at {pos:#x}: {e}");
                pos += erase_size;
                continue;
            }
        }
    }

    Err(MtdError::OutOfSpace)
}

/// Erase, write, and verify-by-readback the next good erase block at or
/// after `start_offset`. Any block skipped — pre-marked bad,
/// un-erasable, un-writable, or failing verify twice — is appended to
/// `ledger`.
///
/// `data` must be exactly `chan.erase_size()` bytes. On success, returns
/// the offset one erase block past the block that was written.
pub fn write_block<C: MtdChannel>(
    chan: &mut C,
    start_offset: u64,
    data: &[u8],
    ledger: &mut BadBlockLedger,
) -> Result<u64> {
    let erase_size = chan.erase_size();
    let total_size = chan.total_size();
    debug_assert_eq!(data.len() as u64, erase_size);

    let mut verify = vec![0u8; data.len()];
    let mut pos = start_offset;

    while pos + erase_size <= total_size {
        let bad = match chan.is_bad_block(pos) {
            Ok(bad) => bad,
            Err(e) => {
                // "operation not supported" is normalized to `Ok(false)`
                // by the channel implementation; any other ioctl failure
                // here is treated the same as a positive bad-block
                // response, matching the original write_block behavior.
                log::warn!("mtd: MEMGETBADBLOCK query failed at {pos:#x}: {e}");
                true
            }
        };
        if bad {
            log::warn!("mtd: not writing bad block at {pos:#x}");
            ledger.push(pos);
            pos += erase_size;
            continue;
        }

        let mut wrote = false;
        for retry in 0..2 {
            if let Err(e) = chan.erase(pos) {
                log::warn!("mtd: erase failure at {pos:#x}: {e}");
                continue;
            }
            let write_ok = (|| -> io::Result<()> {
                chan.seek(pos)?;
                chan.write_all(data)
            })()
            .is_ok();
            if !write_ok {
                log::warn!("mtd: write error at {pos:#x}");
                continue;
            }

            let read_back_ok = (|| -> io::Result<()> {
                chan.seek(pos)?;
                chan.read_exact(&mut verify)
            })()
            .is_ok();
            if !read_back_ok {
                log::warn!("mtd: re-read error at {pos:#x}");
                continue;
            }
            if verify.as_slice() != data {
                log::warn!("mtd: verification error at {pos:#x}");
                continue;
            }

            if retry > 0 {
                log::info!("mtd: wrote block after {retry} retries");
            }
            log::debug!("mtd: successfully wrote block at {pos:#x}");
            wrote = true;
            break;
        }

        if wrote {
            return Ok(pos + erase_size);
        }

        // Give up on this block: best-effort erase so it isn't left
        // half-programmed, then record it and move on.
        let _ = chan.erase(pos);
        ledger.push(pos);
        log::warn!("mtd: skipping write block at {pos:#x}");
        pos += erase_size;
    }

    Err(MtdError::OutOfSpace)
}

/// Erase exactly the erase block containing `offset`. No bad-block
/// consultation, no verify.
pub fn erase_block<C: MtdChannel>(chan: &mut C, offset: u64) -> Result<u64> {
    chan.erase(offset)?;
    Ok(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimChannel;

    #[test]
    fn read_block_returns_good_data_and_advances() {
        let mut chan = SimChannel::new(4 * 0x10000, 0x10000);
        chan.write_all(&vec![0xABu8; 0x10000]).unwrap();
        chan.seek(0).unwrap();

        let mut buf = vec![0u8; 0x10000];
        let next = read_block(&mut chan, 0, &mut buf).unwrap();
        assert_eq!(next, 0x10000);
        assert!(buf.iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn read_block_skips_pre_bad_block() {
        let erase_size = 0x10000u64;
        let mut chan = SimChannel::new(3 * erase_size, erase_size);
        chan.mark_pre_bad(erase_size); // block 1 is bad

        let mut buf = vec![0u8; erase_size as usize];
        let next = read_block(&mut chan, erase_size, &mut buf).unwrap();
        assert_eq!(next, 2 * erase_size);
    }

    #[test]
    fn read_block_skips_on_ecc_failure() {
        let erase_size = 0x10000u64;
        let mut chan = SimChannel::new(3 * erase_size, erase_size);
        chan.inject_ecc_failure(erase_size); // block 1 ECC-fails

        let mut buf = vec![0u8; erase_size as usize];
        let next = read_block(&mut chan, erase_size, &mut buf).unwrap();
        assert_eq!(next, 2 * erase_size);
    }

    #[test]
    fn read_block_out_of_space_when_exhausted() {
        let erase_size = 0x10000u64;
        let mut chan = SimChannel::new(1 * erase_size, erase_size);
        chan.mark_pre_bad(0);

        let mut buf = vec![0u8; erase_size as usize];
        let err = read_block(&mut chan, 0, &mut buf).unwrap_err();
        assert!(matches!(err, MtdError::OutOfSpace));
    }

    #[test]
    fn write_block_skips_pre_bad_and_records_ledger() {
        let erase_size = 0x10000u64;
        let mut chan = SimChannel::new(4 * erase_size, erase_size);
        chan.mark_pre_bad(erase_size);
        let mut ledger = BadBlockLedger::new();

        let data = vec![0xAAu8; erase_size as usize];
        let next = write_block(&mut chan, 0, &data, &mut ledger).unwrap();
        assert_eq!(next, erase_size);

        let data2 = vec![0xBBu8; erase_size as usize];
        let next2 = write_block(&mut chan, next, &data2, &mut ledger).unwrap();
        assert_eq!(next2, 3 * erase_size);

        assert_eq!(ledger.offsets(), &[erase_size]);
        assert!(chan.data()[0..erase_size as usize].iter().all(|&b| b == 0xAA));
        assert!(chan.data()[erase_size as usize..(2 * erase_size) as usize]
            .iter()
            .all(|&b| b == 0xFF));
        assert!(chan.data()[(2 * erase_size) as usize..(3 * erase_size) as usize]
            .iter()
            .all(|&b| b == 0xBB));
    }

    #[test]
    fn write_block_retries_once_on_verify_failure() {
        let erase_size = 0x10000u64;
        let mut chan = SimChannel::new(erase_size, erase_size);
        chan.inject_verify_failure(0, 1);
        let mut ledger = BadBlockLedger::new();

        let data = vec![0x5Au8; erase_size as usize];
        let next = write_block(&mut chan, 0, &data, &mut ledger).unwrap();
        assert_eq!(next, erase_size);
        assert!(ledger.is_empty());
        assert!(chan.data().iter().all(|&b| b == 0x5A));
    }

    #[test]
    fn write_block_exhaustion_lists_every_bad_block() {
        let erase_size = 0x10000u64;
        let mut chan = SimChannel::new(2 * erase_size, erase_size);
        chan.mark_pre_bad(0);
        chan.mark_pre_bad(erase_size);
        let mut ledger = BadBlockLedger::new();

        let data = vec![0x11u8; erase_size as usize];
        let err = write_block(&mut chan, 0, &data, &mut ledger).unwrap_err();
        assert!(matches!(err, MtdError::OutOfSpace));
        assert_eq!(ledger.offsets(), &[0, erase_size]);
    }
}
