//! Real `/dev/mtd/mtd<N>` channel for `mtdflash-core`.
//!
//! This crate supplies the only [`mtdflash_core::MtdChannel`]
//! implementation backed by an actual kernel MTD character device; the
//! block algorithms and buffered reader/writer themselves live in
//! `mtdflash-core` and run identically against this channel or the
//! in-memory simulator used by its unit tests.

pub mod device;
pub mod error;

pub use device::{partition_info, LinuxMtdChannel};
pub use error::{LinuxMtdError, Result};
