//! Geometry resolution
//!
//! Flash geometry is derived from the JEDEC identification once per session.
//! Most SPI NOR vendors encode the capacity as a power of two in the low byte
//! of the device ID; everything the engine cannot derive confidently is
//! rejected rather than guessed.

use crate::error::{Error, Result};
use crate::transport::Transport;

/// Page size of every JEDEC SPI25 part the resolver accepts
pub const DEFAULT_PAGE_SIZE: u32 = 256;
/// Smallest uniform erase block of JEDEC SPI25 parts
pub const DEFAULT_ERASE_SIZE: u32 = 4096;

/// Smallest capacity considered plausible (64 KiB)
const MIN_CAPACITY: u32 = 64 * 1024;
/// Largest capacity addressable with 32-bit offsets that we accept (2 GiB)
const MAX_CAPACITY: u32 = 1 << 31;

/// JEDEC manufacturer and device identification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JedecId {
    /// Manufacturer ID (first RDID byte)
    pub manufacturer: u8,
    /// Device ID (memory type in the high byte, density in the low byte)
    pub device: u16,
}

impl JedecId {
    /// Returns true if the ID looks like a floating or shorted bus
    pub fn is_blank(&self) -> bool {
        matches!(
            (self.manufacturer, self.device),
            (0x00, 0x0000) | (0xFF, 0xFFFF)
        )
    }

    /// Capacity in bytes encoded by the density byte, if recognised
    ///
    /// Codes 0x10..=0x1F are `2^code`. Codes 0x20..=0x22 continue the
    /// sequence at 64 MiB (several vendors skipped 0x1A..=0x1F).
    pub fn density_capacity(&self) -> Option<u32> {
        let code = (self.device & 0xFF) as u32;
        match code {
            0x10..=0x1F => Some(1 << code),
            0x20..=0x22 => Some(1 << (code - 6)),
            _ => None,
        }
    }
}

/// Flash geometry cached by the device handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Total capacity in bytes
    pub capacity: u32,
    /// Program page size in bytes
    pub page_size: u32,
    /// Erase block size in bytes
    pub erase_size: u32,
}

impl Geometry {
    /// Check that the geometry is usable by the scheduler
    ///
    /// All sizes must be powers of two, pages must tile erase blocks and
    /// erase blocks must tile the device.
    pub fn validate(&self) -> Result<()> {
        let ok = self.capacity >= MIN_CAPACITY
            && self.capacity <= MAX_CAPACITY
            && self.capacity.is_power_of_two()
            && self.page_size.is_power_of_two()
            && self.erase_size.is_power_of_two()
            && self.page_size <= self.erase_size
            && self.erase_size <= self.capacity;

        if ok {
            Ok(())
        } else {
            log::error!("implausible flash geometry: {:?}", self);
            Err(Error::InvalidGeometry)
        }
    }

    /// Start address of the page containing `addr`
    pub fn page_start(&self, addr: u32) -> u32 {
        addr & !(self.page_size - 1)
    }

    /// Start address of the erase block containing `addr`
    pub fn block_start(&self, addr: u32) -> u32 {
        addr & !(self.erase_size - 1)
    }

    /// Check whether `[offset, offset + len)` lies within the device
    pub fn contains(&self, offset: u32, len: usize) -> bool {
        // u64 with saturation so huge lengths cannot wrap
        (offset as u64).saturating_add(len as u64) <= self.capacity as u64
    }

    /// Fail with `OutOfRange` unless `[offset, offset + len)` is inside the device
    pub fn check_range(&self, offset: u32, len: usize) -> Result<()> {
        if self.contains(offset, len) {
            Ok(())
        } else {
            Err(Error::OutOfRange {
                offset,
                len,
                capacity: self.capacity,
            })
        }
    }
}

/// Geometry derived from a JEDEC ID
pub fn from_jedec(id: JedecId) -> Result<Geometry> {
    if id.is_blank() {
        return Err(Error::DeviceUnresponsive);
    }

    let unsupported = Error::UnsupportedDevice {
        manufacturer: id.manufacturer,
        device: id.device,
    };
    let capacity = id.density_capacity().ok_or(unsupported)?;
    let geometry = Geometry {
        capacity,
        page_size: DEFAULT_PAGE_SIZE,
        erase_size: DEFAULT_ERASE_SIZE,
    };
    geometry.validate().map_err(|_| unsupported)?;
    Ok(geometry)
}

/// Identify the chip and resolve its geometry
///
/// Fails with `DeviceUnresponsive` if the identification query fails or
/// returns a blank ID, and with `UnsupportedDevice` if the ID does not
/// encode a plausible geometry.
pub fn resolve<T: Transport + ?Sized>(transport: &mut T) -> Result<(JedecId, Geometry)> {
    let id = transport.identify().map_err(|fault| {
        log::error!("identification query failed: {}", fault);
        Error::DeviceUnresponsive
    })?;
    log::debug!("JEDEC ID {:02X}:{:04X}", id.manufacturer, id.device);

    let geometry = from_jedec(id)?;
    Ok((id, geometry))
}
