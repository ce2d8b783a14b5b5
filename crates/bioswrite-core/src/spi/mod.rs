//! SPI types and command structures
//!
//! This module provides the raw SPI transaction type, the status register
//! bits the engine cares about, and the JEDEC opcodes the SPI25 transport
//! issues.

mod address;
mod command;
pub mod opcodes;
mod status;

pub use address::AddressWidth;
pub use command::SpiCommand;
pub use status::StatusFlags;
