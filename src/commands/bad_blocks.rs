//! Bad-blocks command implementation

use mtdflash_core::registry::find_by_name;
use mtdflash_core::{MtdChannel, MtdError};
use mtdflash_linux_mtd::LinuxMtdChannel;

/// Query `MEMGETBADBLOCK` for every erase block in a partition and
/// print the offsets of any that are factory-marked bad. A read-only
/// open is enough: the bad-block query doesn't require write access.
pub fn run_bad_blocks(name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let partition = find_by_name(name).ok_or_else(|| MtdError::NotFound(name.to_string()))?;
    let erase_size = partition.erase_size();
    let total_size = partition.total_size();

    let mut chan = LinuxMtdChannel::open_read(partition.device_index())?;

    let mut bad = Vec::new();
    let mut pos = 0u64;
    while pos < total_size {
        if chan.is_bad_block(pos)? {
            bad.push(pos);
        }
        pos += erase_size;
    }

    if bad.is_empty() {
        println!("no bad blocks found in {name}");
    } else {
        println!("{} bad block(s) in {name}:", bad.len());
        for offset in &bad {
            println!("  {offset:#x}");
        }
    }

    Ok(())
}
