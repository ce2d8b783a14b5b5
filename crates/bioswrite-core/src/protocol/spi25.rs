//! SPI25 protocol implementation
//!
//! This module implements the common SPI flash command sequences
//! as defined by JEDEC, and [`Spi25Transport`], which maps the engine's
//! transport capabilities onto them for any [`SpiMaster`].
//!
//! Unlike a full programmer these functions never poll: program and erase
//! return as soon as the command has been shifted out, and the caller owns
//! the write-enable and completion handling.

use crate::error::TransportFault;
use crate::geometry::{Geometry, JedecId};
use crate::spi::{opcodes, AddressWidth, SpiCommand, StatusFlags};
use crate::transport::{SpiMaster, Transport, TransportResult};

/// Read the JEDEC ID from a flash chip
pub fn read_jedec_id<M: SpiMaster + ?Sized>(master: &mut M) -> TransportResult<JedecId> {
    let mut buf = [0u8; 3];
    let mut cmd = SpiCommand::read_reg(opcodes::RDID, &mut buf);
    master.execute(&mut cmd)?;

    Ok(JedecId {
        manufacturer: buf[0],
        device: ((buf[1] as u16) << 8) | (buf[2] as u16),
    })
}

/// Read the status register 1
pub fn read_status1<M: SpiMaster + ?Sized>(master: &mut M) -> TransportResult<StatusFlags> {
    let mut buf = [0u8; 1];
    let mut cmd = SpiCommand::read_reg(opcodes::RDSR, &mut buf);
    master.execute(&mut cmd)?;
    Ok(StatusFlags::from_bits_retain(buf[0]))
}

/// Send the Write Enable command
pub fn write_enable<M: SpiMaster + ?Sized>(master: &mut M) -> TransportResult<()> {
    let mut cmd = SpiCommand::simple(opcodes::WREN);
    master.execute(&mut cmd)
}

/// Read data from flash, splitting into transactions of at most
/// `max_read_len` bytes
pub fn read<M: SpiMaster + ?Sized>(
    master: &mut M,
    width: AddressWidth,
    addr: u32,
    buf: &mut [u8],
) -> TransportResult<()> {
    let opcode = match width {
        AddressWidth::FourByte => opcodes::READ_4B,
        _ => opcodes::READ,
    };
    let max_len = master.max_read_len().max(1);
    let mut offset = 0;

    while offset < buf.len() {
        let chunk_len = core::cmp::min(max_len, buf.len() - offset);
        let chunk = &mut buf[offset..offset + chunk_len];
        let mut cmd = SpiCommand::read(opcode, width, addr + offset as u32, chunk);
        master.execute(&mut cmd)?;
        offset += chunk_len;
    }

    Ok(())
}

/// Issue a Page Program command
///
/// The data must not cross a page boundary and the write enable latch must
/// already be set.
pub fn program_page<M: SpiMaster + ?Sized>(
    master: &mut M,
    width: AddressWidth,
    addr: u32,
    data: &[u8],
) -> TransportResult<()> {
    if data.len() > master.max_write_len() {
        log::error!(
            "page program of {} bytes exceeds programmer limit of {} bytes",
            data.len(),
            master.max_write_len()
        );
        return Err(TransportFault::TransferFailed);
    }

    let opcode = match width {
        AddressWidth::FourByte => opcodes::PP_4B,
        _ => opcodes::PP,
    };
    let mut cmd = SpiCommand::write(opcode, width, addr, data);
    master.execute(&mut cmd)
}

/// Issue a sector/block erase command at the given address
///
/// The write enable latch must already be set.
pub fn erase_block<M: SpiMaster + ?Sized>(
    master: &mut M,
    opcode: u8,
    width: AddressWidth,
    addr: u32,
) -> TransportResult<()> {
    let mut cmd = SpiCommand::erase(opcode, width, addr);
    master.execute(&mut cmd)
}

/// Pick the erase opcode for a block size and address width
fn erase_opcode_for(block_size: u32, width: AddressWidth) -> Option<u8> {
    let four_byte = width == AddressWidth::FourByte;
    match (block_size, four_byte) {
        (4096, false) => Some(opcodes::SE_20),
        (4096, true) => Some(opcodes::SE_21),
        (32768, false) => Some(opcodes::BE_52),
        (32768, true) => Some(opcodes::BE_5C),
        (65536, false) => Some(opcodes::BE_D8),
        (65536, true) => Some(opcodes::BE_DC),
        _ => None,
    }
}

/// Transport adapter for raw SPI masters
///
/// Wraps a [`SpiMaster`] and issues JEDEC SPI25 commands for each transport
/// capability. Until [`Transport::configure`] is called the adapter uses
/// 3-byte addresses and 4 KiB sector erase.
pub struct Spi25Transport<M: SpiMaster> {
    master: M,
    width: AddressWidth,
    erase_opcode: u8,
}

impl<M: SpiMaster> Spi25Transport<M> {
    /// Create a new adapter around `master`
    pub fn new(master: M) -> Self {
        Self {
            master,
            width: AddressWidth::ThreeByte,
            erase_opcode: opcodes::SE_20,
        }
    }

    /// Get a reference to the underlying SPI master
    pub fn master(&self) -> &M {
        &self.master
    }

    /// Get a mutable reference to the underlying SPI master
    pub fn master_mut(&mut self) -> &mut M {
        &mut self.master
    }

    /// Consume the adapter and return the SPI master
    pub fn into_inner(self) -> M {
        self.master
    }

    /// Address width currently in use
    pub fn address_width(&self) -> AddressWidth {
        self.width
    }
}

impl<M: SpiMaster> Transport for Spi25Transport<M> {
    fn identify(&mut self) -> TransportResult<JedecId> {
        read_jedec_id(&mut self.master)
    }

    fn configure(&mut self, geometry: &Geometry) -> TransportResult<()> {
        let width = AddressWidth::for_capacity(geometry.capacity);
        let Some(opcode) = erase_opcode_for(geometry.erase_size, width) else {
            log::error!(
                "SPI25: no erase command for {} byte blocks",
                geometry.erase_size
            );
            return Err(TransportFault::OpcodeNotSupported);
        };
        self.width = width;
        self.erase_opcode = opcode;
        log::debug!(
            "SPI25: {}-byte addressing, erase opcode 0x{:02X}",
            self.width.bytes(),
            self.erase_opcode
        );
        Ok(())
    }

    fn max_read_len(&self) -> usize {
        self.master.max_read_len()
    }

    fn max_write_len(&self) -> usize {
        self.master.max_write_len()
    }

    fn read_bytes(&mut self, addr: u32, buf: &mut [u8]) -> TransportResult<()> {
        read(&mut self.master, self.width, addr, buf)
    }

    fn assert_write_enable(&mut self) -> TransportResult<()> {
        write_enable(&mut self.master)
    }

    fn erase_block(&mut self, addr: u32) -> TransportResult<()> {
        erase_block(&mut self.master, self.erase_opcode, self.width, addr)
    }

    fn program_page(&mut self, addr: u32, data: &[u8]) -> TransportResult<()> {
        program_page(&mut self.master, self.width, addr, data)
    }

    fn read_status(&mut self) -> TransportResult<StatusFlags> {
        read_status1(&mut self.master)
    }

    fn delay_us(&mut self, us: u32) {
        self.master.delay_us(us)
    }
}
