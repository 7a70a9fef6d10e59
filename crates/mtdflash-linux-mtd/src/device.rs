//! Real `/dev/mtd/mtd<N>` channel implementation.

use crate::error::{LinuxMtdError, Result};
use log::warn;
use mtdflash_core::channel::{EccStats, MtdChannel, PartitionGeometry};
use mtdflash_core::registry::PartitionInfo;
use nix::errno::Errno;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::io::AsRawFd;
use std::path::Path;

/// Directory holding MTD character devices.
const MTD_DEV_ROOT: &str = "/dev/mtd";

/// `struct mtd_info_user` from `mtd/mtd-abi.h`.
#[repr(C)]
struct MtdInfoUser {
    type_: u8,
    flags: u32,
    size: u32,
    erasesize: u32,
    writesize: u32,
    oobsize: u32,
    padding: u64,
}

/// `struct erase_info_user` from `mtd/mtd-abi.h`.
#[repr(C)]
struct EraseInfoUser {
    start: u32,
    length: u32,
}

/// `struct mtd_ecc_stats` from `mtd/mtd-abi.h`.
#[repr(C)]
#[derive(Default)]
struct MtdEccStats {
    corrected: u32,
    failed: u32,
    badblocks: u32,
    bbtblocks: u32,
}

const MTD_IOC_MAGIC: u8 = b'M';

nix::ioctl_read!(memgetinfo, MTD_IOC_MAGIC, 1, MtdInfoUser);
nix::ioctl_write_ptr!(memerase, MTD_IOC_MAGIC, 2, EraseInfoUser);
nix::ioctl_write_ptr!(memgetbadblock, MTD_IOC_MAGIC, 11, u64);
nix::ioctl_read!(eccgetstats, MTD_IOC_MAGIC, 18, MtdEccStats);

/// Retry an ioctl call once per `EINTR`, the way `std::fs::File`'s own
/// read/write already do internally; only the raw `nix` ioctl wrappers
/// need this since they don't go through libstd's syscall retry loop.
fn retry_eintr<T>(mut f: impl FnMut() -> std::result::Result<T, Errno>) -> std::result::Result<T, Errno> {
    loop {
        match f() {
            Err(Errno::EINTR) => continue,
            other => return other,
        }
    }
}

/// An open handle to a real `/dev/mtd/mtd<N>` character device.
pub struct LinuxMtdChannel {
    file: File,
    erase_size: u64,
    total_size: u64,
    write_size: u64,
}

impl LinuxMtdChannel {
    /// Open MTD device `dev_index` for buffered reading only.
    pub fn open_read(dev_index: i32) -> Result<Self> {
        Self::open(dev_index, false)
    }

    /// Open MTD device `dev_index` for reading and writing.
    pub fn open_read_write(dev_index: i32) -> Result<Self> {
        Self::open(dev_index, true)
    }

    fn open(dev_index: i32, writable: bool) -> Result<Self> {
        let path = format!("{MTD_DEV_ROOT}/mtd{dev_index}");
        if !Path::new(&path).exists() {
            return Err(LinuxMtdError::DeviceNotFound(path));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(writable)
            .open(&path)?;

        let mut raw = MtdInfoUser {
            type_: 0,
            flags: 0,
            size: 0,
            erasesize: 0,
            writesize: 0,
            oobsize: 0,
            padding: 0,
        };
        // SAFETY: `raw` is a valid, fully-initialized `MtdInfoUser` and
        // the fd is open for the lifetime of this call.
        unsafe {
            retry_eintr(|| memgetinfo(file.as_raw_fd(), &mut raw).map(|_| ()))
                .map_err(|source| LinuxMtdError::GetInfoFailed { device: path.clone(), source })?;
        }

        if raw.erasesize == 0 {
            return Err(LinuxMtdError::InvalidEraseSize);
        }

        Ok(Self {
            file,
            erase_size: raw.erasesize as u64,
            total_size: raw.size as u64,
            write_size: raw.writesize as u64,
        })
    }
}

/// One-shot geometry query: opens `/dev/mtd/mtd<N>` for `descriptor`
/// read-only, issues `MEMGETINFO`, and returns `{total, erase, write}`.
/// The handle is closed again as soon as the query returns — unlike
/// [`LinuxMtdChannel::open_read`]/[`open_read_write`], this isn't meant
/// to back a streaming `Reader`/`Writer` session, matching the
/// original's `mtd_partition_info` (open, ioctl, close).
pub fn partition_info(descriptor: &PartitionInfo) -> Result<PartitionGeometry> {
    let chan = LinuxMtdChannel::open_read(descriptor.device_index())?;
    Ok(PartitionGeometry {
        total: chan.total_size(),
        erase: chan.erase_size(),
        write: chan.write_size(),
    })
}

impl MtdChannel for LinuxMtdChannel {
    fn erase_size(&self) -> u64 {
        self.erase_size
    }

    fn total_size(&self) -> u64 {
        self.total_size
    }

    fn write_size(&self) -> u64 {
        self.write_size
    }

    fn seek(&mut self, offset: u64) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        Read::read_exact(&mut self.file, buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        Write::write_all(&mut self.file, buf)?;
        self.file.flush()
    }

    fn ecc_stats(&mut self) -> io::Result<EccStats> {
        let mut raw = MtdEccStats::default();
        // SAFETY: `raw` is a valid `MtdEccStats` for the duration of the call.
        let result = unsafe { retry_eintr(|| eccgetstats(self.file.as_raw_fd(), &mut raw).map(|_| ())) };
        result.map_err(|source| io::Error::other(LinuxMtdError::EccStatsFailed { source }))?;
        Ok(EccStats {
            corrected: raw.corrected,
            failed: raw.failed,
        })
    }

    fn is_bad_block(&mut self, offset: u64) -> io::Result<bool> {
        let off = offset;
        // SAFETY: `off` is passed by reference to a `u64`-typed ioctl argument.
        let result = unsafe { retry_eintr(|| memgetbadblock(self.file.as_raw_fd(), &off)) };
        match result {
            Ok(ret) => Ok(ret != 0),
            Err(Errno::EOPNOTSUPP) => Ok(false),
            Err(source) => {
                warn!("mtd: MEMGETBADBLOCK ioctl failed at {offset:#x}: {source}");
                Err(io::Error::other(LinuxMtdError::BadBlockQueryFailed {
                    offset: offset as u32,
                    source,
                }))
            }
        }
    }

    fn erase(&mut self, offset: u64) -> io::Result<()> {
        let info = EraseInfoUser {
            start: offset as u32,
            length: self.erase_size as u32,
        };
        // SAFETY: `info` is a valid, fully-initialized `EraseInfoUser`.
        unsafe {
            retry_eintr(|| memerase(self.file.as_raw_fd(), &info).map(|_| ()))
                .map_err(|source| io::Error::other(LinuxMtdError::EraseFailed { offset: offset as u32, source }))?;
        }
        Ok(())
    }
}
