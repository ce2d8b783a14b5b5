//! Protocol implementations
//!
//! This module contains the JEDEC SPI25 command sequences and the adapter
//! that exposes them as a [`Transport`](crate::Transport).

pub mod spi25;

pub use spi25::Spi25Transport;
