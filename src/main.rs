//! bioswrite - SPI NOR flash programmer
//!
//! Reads, writes, verifies and erases SPI NOR flash chips through any
//! registered programmer. Writes only touch pages whose contents differ and
//! preserve every byte outside the requested range.

mod cli;
mod commands;
mod programmers;

use bioswrite_core::EngineConfig;
use clap::Parser;
use cli::{Cli, Commands};
use commands::WriteArgs;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let config = match &cli.config {
        Some(path) => EngineConfig::from_toml_file(path)
            .map_err(|e| format!("Failed to load {}: {}", path.display(), e))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Read {
            programmer,
            output,
            range,
        } => programmers::with_device(&programmer, &config, |device| {
            commands::run_read(device, &output, range)
        }),
        Commands::Write {
            programmer,
            input,
            offset,
            length,
            force,
            no_verify,
        } => {
            let args = WriteArgs {
                input,
                offset,
                length,
                force,
                no_verify,
            };
            programmers::with_device(&programmer, &config, |device| {
                commands::run_write(device, &args)
            })
        }
        Commands::Verify {
            programmer,
            input,
            offset,
        } => programmers::with_device(&programmer, &config, |device| {
            commands::run_verify(device, &input, offset)
        }),
        Commands::Erase { programmer, range } => {
            programmers::with_device(&programmer, &config, |device| {
                commands::run_erase(device, range)
            })
        }
        Commands::Info { programmer } => {
            programmers::with_device(&programmer, &config, |device| commands::run_info(device))
        }
        Commands::ListProgrammers => {
            commands::list_programmers();
            Ok(())
        }
    }
}
