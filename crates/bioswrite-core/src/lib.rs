//! bioswrite-core - Engine for bounded SPI NOR flash read-out and rewrite
//!
//! This crate holds the logic that sits between a minimal command transport
//! and a caller that wants a linear byte-range view of a flash chip:
//!
//! - geometry discovery from the chip's identification
//! - bounds-checked linear reads
//! - page-respecting writes that honour the NOR erase/program asymmetry,
//!   skip pages that already hold the wanted bytes and preserve bytes that
//!   share an erase block with the target range
//! - post-program verification
//!
//! The engine assumes the chip is already unlocked. It is `no_std`
//! compatible but needs an allocator.
//!
//! # Features
//!
//! - `std` - `std::error::Error` impls and TOML configuration loading
//!
//! # Example
//!
//! ```ignore
//! use bioswrite_core::{open_device, Spi25Transport, WriteOptions};
//!
//! fn patch<M: bioswrite_core::SpiMaster>(master: M) -> bioswrite_core::Result<()> {
//!     let mut device = open_device(Spi25Transport::new(master))?;
//!     println!("Capacity: {} bytes", device.capacity());
//!     let report = device.write(0x1000, &[0u8; 256], &WriteOptions::default())?;
//!     println!("{} page(s) programmed", report.pages_programmed);
//!     Ok(())
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod config;
pub mod device;
pub mod error;
pub mod geometry;
pub mod latch;
pub mod options;
pub mod protocol;
pub mod reader;
pub mod scheduler;
pub mod spi;
pub mod transport;
pub mod verify;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{EngineConfig, GeometryOverride, Timing};
pub use device::{open_device, open_device_with, FlashDevice};
pub use error::{Error, Outcome, Result, TransportFault};
pub use geometry::{Geometry, JedecId};
pub use options::{CancelToken, ChunkOutcome, NoProgress, WriteOptions, WriteProgress, WriteReport};
pub use protocol::Spi25Transport;
pub use transport::{SpiMaster, Transport};
