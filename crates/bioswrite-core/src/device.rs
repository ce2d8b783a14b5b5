//! Device handle
//!
//! [`FlashDevice`] owns the transport for the whole session and caches the
//! geometry resolved when it was opened. Every operation takes `&mut self`,
//! so two operations can never be in flight on the same chip.
//!
//! # Example
//!
//! ```ignore
//! use bioswrite_core::{open_device, Spi25Transport, WriteOptions};
//!
//! let mut device = open_device(Spi25Transport::new(master))?;
//! let old = device.read(0x1000, 256)?;
//! device.write(0x1000, &[0u8; 256], &WriteOptions::default())?;
//! ```

use alloc::vec;
use alloc::vec::Vec;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::geometry::{self, Geometry, JedecId};
use crate::options::{NoProgress, WriteOptions, WriteProgress, WriteReport};
use crate::reader;
use crate::scheduler::{self, ERASED_VALUE};
use crate::transport::Transport;
use crate::verify;

/// An open flash chip
pub struct FlashDevice<T: Transport> {
    transport: T,
    id: JedecId,
    geometry: Geometry,
    config: EngineConfig,
}

/// Identify the chip behind `transport` and open it with default settings
pub fn open_device<T: Transport>(transport: T) -> Result<FlashDevice<T>> {
    open_device_with(transport, &EngineConfig::default())
}

/// Identify the chip behind `transport` and open it
///
/// The chip is always identified. If the configuration carries a geometry
/// override it replaces the geometry derived from the ID, which lets chips
/// whose ID does not encode the density be used.
pub fn open_device_with<T: Transport>(
    mut transport: T,
    config: &EngineConfig,
) -> Result<FlashDevice<T>> {
    let (id, geometry) = match config.geometry {
        Some(ref over) => {
            let geometry = over.to_geometry()?;
            let id = transport.identify().map_err(|fault| {
                log::error!("identification query failed: {}", fault);
                Error::DeviceUnresponsive
            })?;
            if id.is_blank() {
                return Err(Error::DeviceUnresponsive);
            }
            log::debug!("using configured geometry {:?}", geometry);
            (id, geometry)
        }
        None => geometry::resolve(&mut transport)?,
    };

    check_transport_limits(&mut transport, &geometry)?;
    log::info!(
        "Found flash {:02X}:{:04X}, {} bytes, {} byte pages, {} byte erase blocks",
        id.manufacturer,
        id.device,
        geometry.capacity,
        geometry.page_size,
        geometry.erase_size
    );

    Ok(FlashDevice {
        transport,
        id,
        geometry,
        config: config.clone(),
    })
}

/// Check that the transport can program whole pages and erase exactly one
/// erase block per command
fn check_transport_limits<T: Transport>(transport: &mut T, geometry: &Geometry) -> Result<()> {
    let max_write = transport.max_write_len();
    if geometry.page_size as usize > max_write {
        log::error!(
            "page size {} exceeds the transport's {} byte program limit",
            geometry.page_size,
            max_write
        );
        return Err(Error::InvalidGeometry);
    }

    transport.configure(geometry).map_err(|fault| {
        log::error!(
            "transport cannot handle {} byte erase blocks: {}",
            geometry.erase_size,
            fault
        );
        Error::InvalidGeometry
    })
}

impl<T: Transport> FlashDevice<T> {
    /// Total capacity in bytes
    pub fn capacity(&self) -> u32 {
        self.geometry.capacity
    }

    /// Resolved geometry
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// JEDEC ID reported when the device was opened
    pub fn jedec_id(&self) -> JedecId {
        self.id
    }

    /// Configuration the device was opened with
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Erase granularity at `offset`
    ///
    /// Erase blocks are uniform, so this only depends on the geometry.
    pub fn erase_size(&self, _offset: u32) -> u32 {
        self.geometry.erase_size
    }

    /// Write options with verification set from the configuration
    pub fn default_options(&self) -> WriteOptions {
        WriteOptions {
            verify: self.config.verify,
            ..WriteOptions::default()
        }
    }

    /// Read `len` bytes starting at `offset`
    pub fn read(&mut self, offset: u32, len: usize) -> Result<Vec<u8>> {
        self.geometry.check_range(offset, len)?;
        let mut buf = vec![0u8; len];
        self.read_into(offset, &mut buf)?;
        Ok(buf)
    }

    /// Fill `buf` with the contents starting at `offset`
    pub fn read_into(&mut self, offset: u32, buf: &mut [u8]) -> Result<()> {
        reader::read_into(&mut self.transport, &self.geometry, offset, buf)
    }

    /// Write `content` at `offset`
    pub fn write(
        &mut self,
        offset: u32,
        content: &[u8],
        options: &WriteOptions,
    ) -> Result<WriteReport> {
        self.write_with_progress(offset, content, options, &mut NoProgress)
    }

    /// Write `content` at `offset`, reporting each chunk to `progress`
    pub fn write_with_progress<P: WriteProgress + ?Sized>(
        &mut self,
        offset: u32,
        content: &[u8],
        options: &WriteOptions,
        progress: &mut P,
    ) -> Result<WriteReport> {
        scheduler::write(
            &mut self.transport,
            &self.geometry,
            &self.config.timing,
            offset,
            content,
            options,
            progress,
        )
    }

    /// Compare the contents at `offset` with `expected`
    pub fn verify(&mut self, offset: u32, expected: &[u8]) -> Result<()> {
        verify::verify(&mut self.transport, &self.geometry, offset, expected)
    }

    /// Set `[offset, offset + len)` to the erased state
    ///
    /// Bytes outside the range that share an erase block with it are
    /// preserved. Already erased pages cost no erase.
    pub fn erase(&mut self, offset: u32, len: usize) -> Result<WriteReport> {
        self.erase_with_progress(offset, len, &mut NoProgress)
    }

    /// [`erase`](Self::erase) with progress reporting
    pub fn erase_with_progress<P: WriteProgress + ?Sized>(
        &mut self,
        offset: u32,
        len: usize,
        progress: &mut P,
    ) -> Result<WriteReport> {
        self.geometry.check_range(offset, len)?;
        let blank = vec![ERASED_VALUE; len];
        let options = self.default_options();
        self.write_with_progress(offset, &blank, &options, progress)
    }

    /// Get a reference to the transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Release the device and return the transport
    pub fn into_transport(self) -> T {
        self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeometryOverride;
    use crate::testutil::FakeTransport;

    const MIB: usize = 0x10_0000;

    #[test]
    fn test_open_resolves_geometry() {
        let device = open_device(FakeTransport::new(MIB)).unwrap();
        assert_eq!(device.capacity(), MIB as u32);
        assert_eq!(device.erase_size(0x1234), 4096);
        assert_eq!(device.jedec_id().manufacturer, 0xEF);
    }

    #[test]
    fn test_open_with_override() {
        let unknown = || {
            let mut t = FakeTransport::new(MIB);
            t.id = JedecId {
                manufacturer: 0xBF,
                device: 0x2541,
            };
            t
        };
        assert!(matches!(
            open_device(unknown()),
            Err(Error::UnsupportedDevice { .. })
        ));

        let config = EngineConfig {
            geometry: Some(GeometryOverride {
                capacity: 0x8_0000,
                page_size: 256,
                erase_size: 4096,
            }),
            ..EngineConfig::default()
        };
        let device = open_device_with(unknown(), &config).unwrap();
        assert_eq!(device.capacity(), 0x8_0000);
        assert_eq!(device.jedec_id().device, 0x2541);
    }

    #[test]
    fn test_open_rejects_oversized_pages() {
        let config = EngineConfig {
            geometry: Some(GeometryOverride {
                capacity: MIB as u32,
                page_size: 512,
                erase_size: 4096,
            }),
            ..EngineConfig::default()
        };
        assert_eq!(
            open_device_with(FakeTransport::new(MIB), &config).err(),
            Some(Error::InvalidGeometry)
        );
    }

    #[test]
    fn test_open_dead_bus() {
        let mut t = FakeTransport::new(MIB);
        t.dead_bus = true;
        assert_eq!(open_device(t).err(), Some(Error::DeviceUnresponsive));
    }

    #[test]
    fn test_round_trip() {
        let mut device = open_device(FakeTransport::new(MIB)).unwrap();
        let original = device.read(0x2_0000, 0x3000).unwrap();

        let pattern: Vec<u8> = (0..0x3000).map(|i| (i * 7) as u8).collect();
        device
            .write(0x2_0000, &pattern, &WriteOptions::default())
            .unwrap();
        assert_eq!(device.read(0x2_0000, 0x3000).unwrap(), pattern);

        device
            .write(0x2_0000, &original, &WriteOptions::default())
            .unwrap();
        assert_eq!(device.read(0x2_0000, 0x3000).unwrap(), original);
    }

    #[test]
    fn test_read_out_of_range_issues_no_commands() {
        let mut device = open_device(FakeTransport::new(MIB)).unwrap();
        device.transport_mut().reset_counters();
        assert!(matches!(
            device.read(0xF_F000, 0x2000),
            Err(Error::OutOfRange { .. })
        ));
        assert!(matches!(
            device.write(MIB as u32 + 1, &[], &WriteOptions::default()),
            Err(Error::OutOfRange { .. })
        ));
        assert!(matches!(
            device.erase(0xF_FFFF, 2),
            Err(Error::OutOfRange { .. })
        ));
        assert_eq!(device.transport().bus_commands(), 0);
    }

    #[test]
    fn test_erase_preserves_surroundings() {
        let mut device = open_device(FakeTransport::new(MIB)).unwrap();
        device
            .write(0x4000, &[0x00; 0x2000], &WriteOptions::default())
            .unwrap();

        let report = device.erase(0x4800, 0x1000).unwrap();
        assert_eq!(report.blocks_erased, 2);

        let data = device.read(0x4000, 0x2000).unwrap();
        assert!(data[..0x800].iter().all(|&b| b == 0x00));
        assert!(data[0x800..0x1800].iter().all(|&b| b == 0xFF));
        assert!(data[0x1800..].iter().all(|&b| b == 0x00));
    }

    #[test]
    fn test_verify() {
        let mut device = open_device(FakeTransport::new(MIB)).unwrap();
        assert!(device.verify(0, &[0xFF; 16]).is_ok());
        assert_eq!(
            device.verify(0, &[0xFF, 0xFF, 0x00]),
            Err(Error::VerificationMismatch {
                offset: 2,
                expected: 0x00,
                found: 0xFF
            })
        );
    }

    #[test]
    fn test_default_options_follow_config() {
        let config = EngineConfig {
            verify: false,
            ..EngineConfig::default()
        };
        let device = open_device_with(FakeTransport::new(MIB), &config).unwrap();
        assert!(!device.default_options().verify);
    }
}
