//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mtdflash")]
#[command(author, version, about = "Block-oriented reader/writer for Linux MTD partitions", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List MTD partitions found in /proc/mtd
    List,

    /// Read a partition's contents to a file
    Read {
        /// Partition name, as it appears in /proc/mtd
        name: String,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write a file to a partition (erase-before-write, verify-by-readback)
    Write {
        /// Partition name, as it appears in /proc/mtd
        name: String,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Erase a partition, or a specific number of erase blocks within it
    Erase {
        /// Partition name, as it appears in /proc/mtd
        name: String,

        /// Number of erase blocks to erase; omit to erase to the end of the partition
        #[arg(short, long)]
        blocks: Option<i64>,
    },

    /// Report factory-marked bad blocks in a partition
    #[command(name = "badblocks")]
    BadBlocks {
        /// Partition name, as it appears in /proc/mtd
        name: String,
    },
}
