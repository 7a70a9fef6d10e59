//! Erase command implementation

use indicatif::{ProgressBar, ProgressStyle};
use mtdflash_core::registry::find_by_name;
use mtdflash_core::{MtdError, Writer};
use mtdflash_linux_mtd::LinuxMtdChannel;
use std::time::Duration;

/// Erase `blocks` erase blocks from the start of a partition, or the
/// whole partition if `blocks` is omitted.
pub fn run_erase(name: &str, blocks: Option<i64>) -> Result<(), Box<dyn std::error::Error>> {
    let partition = find_by_name(name).ok_or_else(|| MtdError::NotFound(name.to_string()))?;

    let chan = LinuxMtdChannel::open_read_write(partition.device_index())?;
    let mut writer = Writer::new(partition, chan);

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message("Erasing...");
    pb.enable_steady_tick(Duration::from_millis(100));

    let end_offset = writer.erase_blocks(blocks.unwrap_or(-1))?;
    pb.finish_with_message(format!("Erased through offset {end_offset:#x}"));

    let ledger_len = writer.ledger().len();
    writer.close()?;

    if ledger_len > 0 {
        println!("{ledger_len} bad block(s) were not erased (see log for offsets)");
    }
    println!("Erase complete ({} bytes erased)", end_offset);
    Ok(())
}
