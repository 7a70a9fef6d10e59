//! Read command implementation

use indicatif::{ProgressBar, ProgressStyle};
use mtdflash_core::registry::find_by_name;
use mtdflash_core::{MtdError, Reader};
use mtdflash_linux_mtd::LinuxMtdChannel;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Read an entire partition to a file, erase-block at a time, with a
/// progress bar.
pub fn run_read(name: &str, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let partition = find_by_name(name).ok_or_else(|| MtdError::NotFound(name.to_string()))?;
    println!(
        "mtd{}: {} ({} bytes, erase size {})",
        partition.device_index(),
        partition.name(),
        partition.total_size(),
        partition.erase_size()
    );

    let chan = LinuxMtdChannel::open_read(partition.device_index())?;
    let total_size = partition.total_size();
    let mut reader = Reader::new(partition, chan);

    let pb = ProgressBar::new(total_size);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")?
            .progress_chars("#>-"),
    );

    let mut file = File::create(output)?;
    let mut buf = vec![0u8; 64 * 1024];
    let mut done = 0u64;
    while done < total_size {
        let chunk = std::cmp::min(buf.len() as u64, total_size - done) as usize;
        reader.read(&mut buf[..chunk])?;
        file.write_all(&buf[..chunk])?;
        done += chunk as u64;
        pb.set_position(done);
    }
    pb.finish_with_message("Read complete");
    reader.close()?;

    println!("Wrote {done} bytes to {}", output.display());
    Ok(())
}
