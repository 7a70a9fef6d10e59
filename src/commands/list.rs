//! List command implementation

use mtdflash_core::registry::partitions;

/// Print every partition currently held in the process-wide registry
/// (populated by the startup scan in `main`).
pub fn run_list() -> Result<(), Box<dyn std::error::Error>> {
    let partitions = partitions();

    println!("{} MTD partition(s):", partitions.len());
    println!();
    println!("{:<6} {:<24} {:>12} {:>12}", "dev", "name", "size", "erasesize");
    println!("{}", "-".repeat(58));

    for p in &partitions {
        println!(
            "mtd{:<3} {:<24} {:>12} {:>12}",
            p.device_index(),
            p.name(),
            p.total_size(),
            p.erase_size()
        );
    }

    Ok(())
}
