//! Emulated SPI NOR chip

use std::fs;
use std::path::PathBuf;

use bioswrite_core::error::TransportFault;
use bioswrite_core::spi::{opcodes, AddressWidth, SpiCommand};
use bioswrite_core::transport::TransportResult;
use bioswrite_core::SpiMaster;

use crate::error::{DummyError, Result};

/// Configuration for the dummy flash
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// JEDEC manufacturer ID
    pub manufacturer_id: u8,
    /// JEDEC device ID
    pub device_id: u16,
    /// Flash size in bytes
    pub size: usize,
    /// Page size for programming
    pub page_size: usize,
    /// Sector size for smallest erase
    pub sector_size: usize,
    /// Status reads that report busy after each program or erase
    pub busy_polls: u32,
    /// File the contents are loaded from and saved to
    pub image: Option<PathBuf>,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            manufacturer_id: 0xEF, // Winbond
            device_id: 0x4018,     // W25Q128FV
            size: 16 * 1024 * 1024,
            page_size: 256,
            sector_size: 4096,
            busy_polls: 1,
            image: None,
        }
    }
}

impl DummyConfig {
    /// Winbond-style configuration for a chip of `size` bytes
    ///
    /// The device ID encodes the size as a density code, so the engine can
    /// resolve the geometry from it.
    pub fn with_size(size: usize) -> Self {
        Self {
            device_id: 0x4000 | size.trailing_zeros() as u16,
            size,
            ..Self::default()
        }
    }
}

/// Parse a number or size with an optional `K`/`M` suffix
fn parse_size(value: &str) -> Option<usize> {
    let v = value.trim();
    let (num, mult) = if let Some(n) = v.strip_suffix(['M', 'm']) {
        (n, 1024 * 1024)
    } else if let Some(n) = v.strip_suffix(['K', 'k']) {
        (n, 1024)
    } else {
        (v, 1)
    };
    let n = if let Some(hex) = num.strip_prefix("0x").or_else(|| num.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16).ok()?
    } else {
        num.parse().ok()?
    };
    n.checked_mul(mult)
}

fn parse_hex<T: TryFrom<u32>>(key: &str, value: &str) -> Result<T> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u32::from_str_radix(digits, 16)
        .ok()
        .and_then(|v| T::try_from(v).ok())
        .ok_or_else(|| DummyError::InvalidParameter(format!("{}: {}", key, value)))
}

/// Parse options from key=value pairs
///
/// Recognised keys: `size` (bytes, `K`/`M` suffix allowed), `image` (backing
/// file), `mfr` and `dev` (JEDEC IDs in hex). Without `dev` the device ID is
/// derived from the size.
pub fn parse_options(options: &[(&str, &str)]) -> Result<DummyConfig> {
    let mut config = DummyConfig::with_size(DummyConfig::default().size);
    let mut device_id = None;

    for (key, value) in options {
        match *key {
            "size" => {
                let size = parse_size(value)
                    .filter(|s| s.is_power_of_two() && *s >= config.sector_size)
                    .ok_or_else(|| DummyError::InvalidParameter(format!("size: {}", value)))?;
                config = DummyConfig {
                    image: config.image,
                    manufacturer_id: config.manufacturer_id,
                    ..DummyConfig::with_size(size)
                };
            }
            "image" => config.image = Some(PathBuf::from(value)),
            "mfr" => config.manufacturer_id = parse_hex(key, value)?,
            "dev" => device_id = Some(parse_hex(key, value)?),
            _ => {
                return Err(DummyError::InvalidParameter(format!(
                    "unknown option: {}",
                    key
                )));
            }
        }
    }

    if let Some(dev) = device_id {
        config.device_id = dev;
    }
    Ok(config)
}

/// Faults the emulator can inject
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// The busy flag never clears
    pub stuck_busy: bool,
    /// Programming this address flips its lowest bit
    pub corrupt_at: Option<u32>,
    /// Every command fails
    pub dead_bus: bool,
    /// WREN is accepted but WEL never sets
    pub ignore_wren: bool,
}

/// Number of commands received, per kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandCounts {
    /// RDID
    pub identify: usize,
    /// RDSR
    pub status: usize,
    /// WREN
    pub write_enable: usize,
    /// READ / READ_4B
    pub read: usize,
    /// PP / PP_4B
    pub program: usize,
    /// Sector and block erases
    pub erase: usize,
    /// Commands other than RDSR received while busy
    pub while_busy: usize,
}

impl CommandCounts {
    /// Program and erase commands received
    pub fn destructive(&self) -> usize {
        self.program + self.erase
    }
}

/// Dummy flash programmer
///
/// Emulates a SPI NOR chip in memory: programming only clears bits, erase
/// sets a whole sector to `0xFF`, and both need the write enable latch and
/// leave the chip busy for a few status reads.
pub struct DummyFlash {
    config: DummyConfig,
    data: Vec<u8>,
    write_enabled: bool,
    busy_left: u32,
    faults: Faults,
    counts: CommandCounts,
}

impl DummyFlash {
    /// Create a new dummy flash with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let data = vec![0xFF; config.size];
        Self {
            config,
            data,
            write_enabled: false,
            busy_left: 0,
            faults: Faults::default(),
            counts: CommandCounts::default(),
        }
    }

    /// Create a new dummy flash with default configuration (W25Q128FV)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a dummy flash with pre-filled data
    pub fn with_data(config: DummyConfig, initial_data: &[u8]) -> Self {
        let mut flash = Self::new(config);
        let len = core::cmp::min(initial_data.len(), flash.data.len());
        flash.data[..len].copy_from_slice(&initial_data[..len]);
        flash
    }

    /// Create a dummy flash, loading its contents from the configured image
    ///
    /// A missing image file starts as an erased chip and is created by
    /// [`save_image`](Self::save_image).
    pub fn open(config: DummyConfig) -> Result<Self> {
        let Some(path) = config.image.clone() else {
            return Ok(Self::new(config));
        };
        if !path.exists() {
            log::info!("Image {} does not exist, starting erased", path.display());
            return Ok(Self::new(config));
        }

        let contents = fs::read(&path).map_err(|source| DummyError::ImageRead {
            path: path.clone(),
            source,
        })?;
        if contents.len() != config.size {
            return Err(DummyError::ImageSize {
                path,
                actual: contents.len(),
                expected: config.size,
            });
        }
        log::info!("Loaded {} bytes from {}", contents.len(), path.display());
        Ok(Self::with_data(config, &contents))
    }

    /// Write the contents back to the configured image, if any
    pub fn save_image(&self) -> Result<()> {
        if let Some(path) = &self.config.image {
            fs::write(path, &self.data).map_err(|source| DummyError::ImageWrite {
                path: path.clone(),
                source,
            })?;
            log::info!("Saved {} bytes to {}", self.data.len(), path.display());
        }
        Ok(())
    }

    /// Get a reference to the flash data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the flash data
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Injected faults
    pub fn faults_mut(&mut self) -> &mut Faults {
        &mut self.faults
    }

    /// Commands received so far
    pub fn counts(&self) -> &CommandCounts {
        &self.counts
    }

    /// Forget all counted commands
    pub fn reset_counts(&mut self) {
        self.counts = CommandCounts::default();
    }

    /// Decode the address the way the chip sees it on the wire
    fn wire_address(cmd: &SpiCommand<'_>) -> usize {
        let mut header = [0u8; 5];
        cmd.encode_header(&mut header);
        header[1..cmd.header_len()]
            .iter()
            .fold(0usize, |addr, &b| (addr << 8) | b as usize)
    }

    fn status(&mut self) -> u8 {
        let mut sr = 0;
        if self.write_enabled {
            sr |= opcodes::SR1_WEL;
        }
        if self.faults.stuck_busy || self.busy_left > 0 {
            sr |= opcodes::SR1_WIP;
            self.busy_left = self.busy_left.saturating_sub(1);
        }
        sr
    }

    fn handle_read(&mut self, cmd: &mut SpiCommand<'_>) -> TransportResult<()> {
        self.counts.read += 1;
        let addr = Self::wire_address(cmd);
        let len = cmd.read_buf.len();

        if addr + len > self.data.len() {
            return Err(TransportFault::AddressOutOfBounds);
        }

        cmd.read_buf.copy_from_slice(&self.data[addr..addr + len]);
        Ok(())
    }

    fn handle_page_program(&mut self, cmd: &SpiCommand<'_>) -> TransportResult<()> {
        self.counts.program += 1;
        if !self.write_enabled {
            log::warn!("dummy: page program without WEL ignored");
            return Ok(());
        }

        let addr = Self::wire_address(cmd);
        let data = cmd.write_data;
        let page_size = self.config.page_size;

        if addr + data.len() > self.data.len() {
            return Err(TransportFault::AddressOutOfBounds);
        }
        if (addr % page_size) + data.len() > page_size {
            // Real chips wrap inside the page; never expected from the engine
            log::error!("dummy: page program at 0x{:X} crosses a page boundary", addr);
            return Err(TransportFault::TransferFailed);
        }

        // Flash programming: can only change 1 -> 0
        for (i, &byte) in data.iter().enumerate() {
            self.data[addr + i] &= byte;
        }
        if let Some(bad) = self.faults.corrupt_at {
            let bad = bad as usize;
            if (addr..addr + data.len()).contains(&bad) {
                self.data[bad] ^= 0x01;
            }
        }

        self.write_enabled = false;
        self.busy_left = self.config.busy_polls;
        Ok(())
    }

    fn handle_sector_erase(
        &mut self,
        cmd: &SpiCommand<'_>,
        erase_size: usize,
    ) -> TransportResult<()> {
        self.counts.erase += 1;
        if !self.write_enabled {
            log::warn!("dummy: erase without WEL ignored");
            return Ok(());
        }

        let addr = Self::wire_address(cmd);

        // Align address to erase boundary
        let aligned_addr = addr & !(erase_size - 1);

        if aligned_addr + erase_size > self.data.len() {
            return Err(TransportFault::AddressOutOfBounds);
        }

        // Erase sets all bytes to 0xFF
        for byte in &mut self.data[aligned_addr..aligned_addr + erase_size] {
            *byte = 0xFF;
        }

        self.write_enabled = false;
        self.busy_left = self.config.busy_polls;
        Ok(())
    }
}

impl SpiMaster for DummyFlash {
    fn max_read_len(&self) -> usize {
        4096
    }

    fn max_write_len(&self) -> usize {
        self.config.page_size
    }

    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> TransportResult<()> {
        if self.faults.dead_bus {
            return Err(TransportFault::TransferFailed);
        }
        if cmd.opcode != opcodes::RDSR && (self.faults.stuck_busy || self.busy_left > 0) {
            log::warn!("dummy: opcode 0x{:02X} while busy", cmd.opcode);
            self.counts.while_busy += 1;
        }

        let four_byte = cmd.address_width == AddressWidth::FourByte;
        match cmd.opcode {
            // JEDEC ID
            opcodes::RDID => {
                self.counts.identify += 1;
                if cmd.read_buf.len() >= 3 {
                    cmd.read_buf[0] = self.config.manufacturer_id;
                    cmd.read_buf[1] = (self.config.device_id >> 8) as u8;
                    cmd.read_buf[2] = self.config.device_id as u8;
                }
                Ok(())
            }

            // Status register read
            opcodes::RDSR => {
                self.counts.status += 1;
                let sr = self.status();
                if !cmd.read_buf.is_empty() {
                    cmd.read_buf[0] = sr;
                }
                Ok(())
            }

            // Write enable/disable
            opcodes::WREN => {
                self.counts.write_enable += 1;
                if !self.faults.ignore_wren {
                    self.write_enabled = true;
                }
                Ok(())
            }
            opcodes::WRDI => {
                self.write_enabled = false;
                Ok(())
            }

            // Commands whose opcode implies the address width
            opcodes::READ | opcodes::PP | opcodes::SE_20 | opcodes::BE_52 | opcodes::BE_D8
                if four_byte =>
            {
                Err(TransportFault::OpcodeNotSupported)
            }
            opcodes::READ_4B | opcodes::PP_4B | opcodes::SE_21 | opcodes::BE_5C | opcodes::BE_DC
                if !four_byte =>
            {
                Err(TransportFault::OpcodeNotSupported)
            }

            opcodes::READ | opcodes::READ_4B => self.handle_read(cmd),
            opcodes::PP | opcodes::PP_4B => self.handle_page_program(cmd),
            opcodes::SE_20 | opcodes::SE_21 => {
                self.handle_sector_erase(cmd, self.config.sector_size)
            }
            opcodes::BE_52 | opcodes::BE_5C => self.handle_sector_erase(cmd, 32 * 1024),
            opcodes::BE_D8 | opcodes::BE_DC => self.handle_sector_erase(cmd, 64 * 1024),

            // Unknown opcode
            _ => Err(TransportFault::OpcodeNotSupported),
        }
    }

    fn delay_us(&mut self, _us: u32) {
        // No delay needed for in-memory operations
    }
}
