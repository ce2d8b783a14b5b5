//! Transport trait definitions
//!
//! The engine never touches bus registers. It drives the chip through a
//! small capability interface, [`Transport`], with one method per primitive
//! the chip offers. Anything able to issue those six primitives can host the
//! engine: a raw SPI master through [`Spi25Transport`](crate::Spi25Transport),
//! or a hardware-sequenced controller that implements [`Transport`] directly.

use alloc::boxed::Box;

use crate::error::TransportFault;
use crate::geometry::{Geometry, JedecId};
use crate::spi::{SpiCommand, StatusFlags};

/// Result of a single transport command
pub type TransportResult<T> = core::result::Result<T, TransportFault>;

/// SPI Master trait
///
/// This trait represents a programmer that can execute raw SPI commands.
/// Implementations are blocking: `execute` returns once the bus transaction
/// has completed.
pub trait SpiMaster {
    /// Get the maximum number of bytes that can be read in a single transaction
    fn max_read_len(&self) -> usize;

    /// Get the maximum number of bytes that can be written in a single transaction
    fn max_write_len(&self) -> usize;

    /// Execute a single SPI command
    ///
    /// The command contains all the information needed for the transaction:
    /// - `opcode`: The SPI command opcode
    /// - `address`: Optional address (with width)
    /// - `write_data`: Data to write after the header
    /// - `read_buf`: Buffer to read data into
    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> TransportResult<()>;

    /// Delay for the specified number of microseconds
    fn delay_us(&mut self, us: u32);
}

/// Command channel to a flash chip
///
/// Each method is one bus transaction and must complete (or fail) before it
/// returns. None of them retry.
pub trait Transport {
    /// Query the chip's identification
    fn identify(&mut self) -> TransportResult<JedecId>;

    /// Tell the transport the geometry the engine resolved
    ///
    /// Called once by [`open_device`](crate::open_device) before any data
    /// command. Transports that need to pick an addressing mode or erase
    /// command do it here, and fail if `erase_block` could not erase exactly
    /// `geometry.erase_size` bytes.
    fn configure(&mut self, _geometry: &Geometry) -> TransportResult<()> {
        Ok(())
    }

    /// Largest number of bytes a single `read_bytes` call may request
    fn max_read_len(&self) -> usize;

    /// Largest number of bytes a single `program_page` call may carry
    fn max_write_len(&self) -> usize;

    /// Read `buf.len()` bytes starting at `addr`
    fn read_bytes(&mut self, addr: u32, buf: &mut [u8]) -> TransportResult<()>;

    /// Set the write enable latch
    fn assert_write_enable(&mut self) -> TransportResult<()>;

    /// Start erasing the erase block containing `addr`
    fn erase_block(&mut self, addr: u32) -> TransportResult<()>;

    /// Start programming `data` at `addr`
    ///
    /// `data` never crosses a page boundary.
    fn program_page(&mut self, addr: u32, data: &[u8]) -> TransportResult<()>;

    /// Read the status register
    fn read_status(&mut self) -> TransportResult<StatusFlags>;

    /// Delay for the specified number of microseconds
    fn delay_us(&mut self, us: u32);
}

// Blanket impls for boxed transports to allow trait objects
impl<T: SpiMaster + ?Sized> SpiMaster for Box<T> {
    fn max_read_len(&self) -> usize {
        (**self).max_read_len()
    }

    fn max_write_len(&self) -> usize {
        (**self).max_write_len()
    }

    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> TransportResult<()> {
        (**self).execute(cmd)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}

impl<T: SpiMaster + ?Sized> SpiMaster for &mut T {
    fn max_read_len(&self) -> usize {
        (**self).max_read_len()
    }

    fn max_write_len(&self) -> usize {
        (**self).max_write_len()
    }

    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> TransportResult<()> {
        (**self).execute(cmd)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn identify(&mut self) -> TransportResult<JedecId> {
        (**self).identify()
    }

    fn configure(&mut self, geometry: &Geometry) -> TransportResult<()> {
        (**self).configure(geometry)
    }

    fn max_read_len(&self) -> usize {
        (**self).max_read_len()
    }

    fn max_write_len(&self) -> usize {
        (**self).max_write_len()
    }

    fn read_bytes(&mut self, addr: u32, buf: &mut [u8]) -> TransportResult<()> {
        (**self).read_bytes(addr, buf)
    }

    fn assert_write_enable(&mut self) -> TransportResult<()> {
        (**self).assert_write_enable()
    }

    fn erase_block(&mut self, addr: u32) -> TransportResult<()> {
        (**self).erase_block(addr)
    }

    fn program_page(&mut self, addr: u32, data: &[u8]) -> TransportResult<()> {
        (**self).program_page(addr, data)
    }

    fn read_status(&mut self) -> TransportResult<StatusFlags> {
        (**self).read_status()
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}
