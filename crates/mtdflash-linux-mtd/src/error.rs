//! Error types for the real Linux MTD channel.

use std::io;
use thiserror::Error;

/// Linux MTD-specific errors.
#[derive(Debug, Error)]
pub enum LinuxMtdError {
    /// I/O error opening or operating on the device node.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// MTD device node not found.
    #[error("MTD device not found: {0}")]
    DeviceNotFound(String),

    /// `MEMGETINFO` failed.
    #[error("MEMGETINFO failed on {device}: {source}")]
    GetInfoFailed {
        device: String,
        #[source]
        source: nix::errno::Errno,
    },

    /// The device reported an erase size mtdflash cannot work with.
    #[error("MTD device has zero erase size")]
    InvalidEraseSize,

    /// `MEMERASE` failed.
    #[error("MEMERASE failed at offset {offset:#x}: {source}")]
    EraseFailed {
        offset: u32,
        #[source]
        source: nix::errno::Errno,
    },

    /// `MEMGETBADBLOCK` failed for a reason other than "not supported".
    #[error("MEMGETBADBLOCK failed at offset {offset:#x}: {source}")]
    BadBlockQueryFailed {
        offset: u32,
        #[source]
        source: nix::errno::Errno,
    },

    /// `ECCGETSTATS` failed.
    #[error("ECCGETSTATS failed: {source}")]
    EccStatsFailed {
        #[source]
        source: nix::errno::Errno,
    },
}

/// Result type for Linux MTD operations.
pub type Result<T> = std::result::Result<T, LinuxMtdError>;
