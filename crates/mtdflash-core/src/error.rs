//! Error types for the MTD block I/O engine

use std::io;
use thiserror::Error;

/// Errors surfaced by the partition registry, buffered reader and buffered writer
#[derive(Debug, Error)]
pub enum MtdError {
    /// `find_by_name` found no partition with the given name
    #[error("no partition named '{0}'")]
    NotFound(String),

    /// The `/proc/mtd` summary could not be read or parsed
    #[error("failed to read or parse MTD partition table: {0}")]
    ParseFailure(#[source] io::Error),

    /// A block operation exhausted the partition before finding a usable block
    #[error("partition exhausted before a usable erase block was found")]
    OutOfSpace,

    /// A seek/read/write/ioctl failed in a way that is not a retriable interrupt
    #[error("device I/O error: {0}")]
    DeviceIo(#[from] io::Error),

    /// Scratch or ledger growth could not be satisfied
    #[error("allocation failure: {0}")]
    AllocationFailure(&'static str),
}

/// Result type used throughout the block I/O engine
pub type Result<T> = std::result::Result<T, MtdError>;
