//! bioswrite-dummy - In-memory flash emulator for testing
//!
//! This crate provides a dummy flash programmer that emulates a SPI NOR chip
//! in memory. It's useful for testing and development without real hardware:
//! the emulator counts every command it receives and can inject faults
//! (stuck busy flag, corrupted program, dead bus, ignored write enable).

mod device;
mod error;

pub use device::{parse_options, CommandCounts, DummyConfig, DummyFlash, Faults};
pub use error::{DummyError, Result};
