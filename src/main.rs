//! mtdflash - block-oriented read/write/erase for Linux MTD partitions

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.verbose {
        0 => {}
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let result = mtdflash_core::scan_partitions()
        .map_err(|e| Box::<dyn std::error::Error>::from(e))
        .and_then(|count| {
            log::debug!("scanned {count} MTD partition(s) from /proc/mtd");
            match cli.command {
                Commands::List => commands::run_list(),
                Commands::Read { name, output } => commands::run_read(&name, &output),
                Commands::Write { name, input } => commands::run_write(&name, &input),
                Commands::Erase { name, blocks } => commands::run_erase(&name, blocks),
                Commands::BadBlocks { name } => commands::run_bad_blocks(&name),
            }
        });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
