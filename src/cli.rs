//! CLI argument parsing

use crate::programmers;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Generate dynamic help text for the programmer argument
fn programmer_help() -> String {
    format!(
        "Programmer to use, optionally with name:key=value,... parameters [available: {}]",
        programmers::programmer_names_short()
    )
}

#[derive(Parser)]
#[command(name = "bioswrite")]
#[command(author, version, about = "SPI NOR flash programmer", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Engine configuration file (TOML format)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Byte range shared by read and erase
#[derive(clap::Args, Debug, Clone, Copy, Default)]
pub struct RangeArgs {
    /// Start offset (hex, e.g., 0x10000, or decimal)
    #[arg(long, default_value = "0", value_parser = parse_hex_u32)]
    pub offset: u32,

    /// Number of bytes (0 or omitted means up to the end of the chip)
    #[arg(long, default_value = "0", value_parser = parse_hex_u32)]
    pub length: u32,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read flash contents to a file
    Read {
        #[arg(short, long, help = programmer_help())]
        programmer: String,

        /// Output file path ("-" for stdout)
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        range: RangeArgs,
    },

    /// Write a file to flash, touching only pages that differ
    Write {
        #[arg(short, long, help = programmer_help())]
        programmer: String,

        /// Input file path ("-" for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Start offset (hex or decimal)
        #[arg(long, default_value = "0", value_parser = parse_hex_u32)]
        offset: u32,

        /// Expected input length; the input must be exactly this long (0 means any)
        #[arg(long, value_parser = parse_hex_u32)]
        length: Option<u32>,

        /// Program every page even if it already holds the wanted bytes
        #[arg(long)]
        force: bool,

        /// Skip the read-back check after programming
        #[arg(long)]
        no_verify: bool,
    },

    /// Verify flash contents against a file
    Verify {
        #[arg(short, long, help = programmer_help())]
        programmer: String,

        /// Input file path to verify against ("-" for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Start offset (hex or decimal)
        #[arg(long, default_value = "0", value_parser = parse_hex_u32)]
        offset: u32,
    },

    /// Erase a range of the flash chip
    Erase {
        #[arg(short, long, help = programmer_help())]
        programmer: String,

        #[command(flatten)]
        range: RangeArgs,
    },

    /// Show chip ID and geometry
    Info {
        #[arg(short, long, help = programmer_help())]
        programmer: String,
    },

    /// List supported programmers
    ListProgrammers,
}
