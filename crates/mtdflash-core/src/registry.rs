//! Partition registry: parses the kernel's `/proc/mtd` summary and exposes
//! partition descriptors by name.

use crate::error::{MtdError, Result};
use std::fs;
use std::sync::{Arc, Mutex, OnceLock};

/// Path to the kernel-exposed MTD partition summary
const MTD_PROC_FILENAME: &str = "/proc/mtd";

/// Slot capacity the registry starts with; grown transparently if a
/// scan discovers a higher-numbered `mtd<N>` partition.
const INITIAL_CAPACITY: usize = 32;

/// Longest partition name the `/proc/mtd` grammar captures (`%63[^\"]`
/// in the original `sscanf` parser); longer names are truncated, not
/// rejected.
const MAX_NAME_LEN: usize = 63;

/// An immutable descriptor for one MTD partition.
///
/// `name` is an `Arc<str>` rather than `String` so that cloning a
/// descriptor out of the registry (the natural way to hand a context a
/// non-owning reference without tying its lifetime to a `MutexGuard`)
/// never reallocates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionInfo {
    device_index: i32,
    total_size: u64,
    erase_size: u64,
    name: Arc<str>,
}

impl PartitionInfo {
    /// The kernel MTD slot number (`N` in `/dev/mtd/mtd<N>`)
    pub fn device_index(&self) -> i32 {
        self.device_index
    }

    /// Total partition size in bytes
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Erase block size in bytes
    pub fn erase_size(&self) -> u64 {
        self.erase_size
    }

    /// Partition name as declared in `/proc/mtd`
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A fixed-growth table of partition descriptors keyed by device index.
///
/// There is at most one of these live per process in practice (see
/// [`scan_partitions`]/[`find_by_name`] for the process-wide singleton),
/// but the type itself carries no global state so it can be exercised
/// in tests without touching `/proc/mtd`.
#[derive(Debug, Default)]
pub struct PartitionRegistry {
    slots: Vec<Option<PartitionInfo>>,
}

impl PartitionRegistry {
    pub fn new() -> Self {
        Self {
            slots: Vec::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Parse `/proc/mtd` and repopulate the registry in place.
    ///
    /// Returns the number of partitions found. Names from a previous
    /// scan are dropped only once the new content has been read
    /// successfully, so a failed re-scan leaves the prior state intact.
    pub fn scan(&mut self) -> Result<usize> {
        let content = fs::read_to_string(MTD_PROC_FILENAME).map_err(MtdError::ParseFailure)?;
        self.scan_str(&content)
    }

    /// Parse an already-read `/proc/mtd` body. Split out from [`scan`]
    /// so the grammar can be exercised without a real `/proc/mtd`.
    pub fn scan_str(&mut self, content: &str) -> Result<usize> {
        for slot in &mut self.slots {
            *slot = None;
        }

        let mut count = 0usize;
        for line in content.lines() {
            match parse_mtd_line(line) {
                Some((device_index, total_size, erase_size, name)) => {
                    let idx = device_index as usize;
                    if idx >= self.slots.len() {
                        self.slots.resize(idx + 1, None);
                    }
                    self.slots[idx] = Some(PartitionInfo {
                        device_index,
                        total_size,
                        erase_size,
                        name: Arc::from(name),
                    });
                    count += 1;
                }
                None => {
                    log::trace!("mtd: skipping unparsable /proc/mtd line: {line:?}");
                }
            }
        }

        Ok(count)
    }

    /// Linear, case-sensitive lookup by name.
    pub fn find_by_name(&self, name: &str) -> Option<&PartitionInfo> {
        self.slots
            .iter()
            .flatten()
            .find(|p| p.name.as_ref() == name)
    }

    /// Iterate over occupied slots.
    pub fn partitions(&self) -> impl Iterator<Item = &PartitionInfo> {
        self.slots.iter().flatten()
    }
}

/// Parse one `/proc/mtd` line of the form
/// `mtd<N>: <size-hex> <erasesize-hex> "<name>"`.
///
/// The header line and any other non-matching line return `None` and
/// are skipped by the caller, mirroring the original `sscanf`-based
/// parser which simply fails to match 4 fields on the header.
fn parse_mtd_line(line: &str) -> Option<(i32, u64, u64, String)> {
    let bytes = line.as_bytes();
    let rest = line.strip_prefix("mtd")?;
    let digit_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digit_len == 0 {
        return None;
    }
    let device_index: i32 = rest[..digit_len].parse().ok()?;

    let mut idx = 3 + digit_len;
    if bytes.get(idx) != Some(&b':') {
        return None;
    }
    idx += 1;

    idx = skip_spaces(bytes, idx);
    let (total_size, next) = take_hex(line, bytes, idx)?;
    idx = skip_spaces(bytes, next);
    let (erase_size, next) = take_hex(line, bytes, idx)?;
    idx = skip_spaces(bytes, next);

    if bytes.get(idx) != Some(&b'"') {
        return None;
    }
    idx += 1;
    let name_start = idx;
    while bytes.get(idx).is_some_and(|&b| b != b'"') {
        idx += 1;
    }
    if bytes.get(idx) != Some(&b'"') {
        return None;
    }

    let mut name = line[name_start..idx].to_string();
    if name.len() > MAX_NAME_LEN {
        let mut end = MAX_NAME_LEN;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        name.truncate(end);
    }

    Some((device_index, total_size, erase_size, name))
}

fn skip_spaces(bytes: &[u8], mut idx: usize) -> usize {
    while bytes.get(idx) == Some(&b' ') {
        idx += 1;
    }
    idx
}

fn take_hex(line: &str, bytes: &[u8], start: usize) -> Option<(u64, usize)> {
    let mut idx = start;
    while bytes.get(idx).is_some_and(u8::is_ascii_hexdigit) {
        idx += 1;
    }
    if idx == start {
        return None;
    }
    let value = u64::from_str_radix(&line[start..idx], 16).ok()?;
    Some((value, idx))
}

fn global_registry() -> &'static Mutex<PartitionRegistry> {
    static REGISTRY: OnceLock<Mutex<PartitionRegistry>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(PartitionRegistry::new()))
}

/// Scan `/proc/mtd` into the process-wide registry.
///
/// Callers must not run this concurrently with any open [`crate::Reader`]
/// or [`crate::Writer`]: a rescan drops the descriptors an open context
/// may still be holding a clone of.
pub fn scan_partitions() -> Result<usize> {
    global_registry().lock().unwrap().scan()
}

/// Look up a partition by name in the process-wide registry.
pub fn find_by_name(name: &str) -> Option<PartitionInfo> {
    global_registry().lock().unwrap().find_by_name(name).cloned()
}

/// Snapshot every partition currently held in the process-wide registry.
pub fn partitions() -> Vec<PartitionInfo> {
    global_registry().lock().unwrap().partitions().cloned().collect()
}
