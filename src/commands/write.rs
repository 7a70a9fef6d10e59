//! Write command implementation

use indicatif::{ProgressBar, ProgressStyle};
use mtdflash_core::registry::find_by_name;
use mtdflash_core::{MtdError, Writer};
use mtdflash_linux_mtd::LinuxMtdChannel;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Write a file to a partition. Erases, writes, and verifies by
/// readback one erase block at a time; any block that can't be made
/// to verify after two attempts is skipped and recorded.
pub fn run_write(name: &str, input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let partition = find_by_name(name).ok_or_else(|| MtdError::NotFound(name.to_string()))?;

    let mut file = File::open(input)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    println!("Read {} bytes from {}", data.len(), input.display());

    if data.len() as u64 > partition.total_size() {
        return Err(format!(
            "input file ({} bytes) exceeds partition size ({} bytes)",
            data.len(),
            partition.total_size()
        )
        .into());
    }

    let chan = LinuxMtdChannel::open_read_write(partition.device_index())?;
    let mut writer = Writer::new(partition, chan);

    let pb = ProgressBar::new(data.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")?
            .progress_chars("#>-"),
    );

    let chunk_size = 64 * 1024;
    let mut offset = 0usize;
    while offset < data.len() {
        let end = std::cmp::min(offset + chunk_size, data.len());
        writer.write(&data[offset..end])?;
        offset = end;
        pb.set_position(offset as u64);
    }
    pb.finish_with_message("Write complete");

    let ledger_len = writer.ledger().len();
    writer.close()?;

    if ledger_len > 0 {
        println!("{ledger_len} block(s) skipped during write (see log for offsets)");
    }
    println!("Write complete!");
    Ok(())
}
