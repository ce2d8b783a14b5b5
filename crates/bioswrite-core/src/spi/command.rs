//! SPI command structure

use super::AddressWidth;

/// A single SPI transaction
///
/// Designed to avoid allocation - uses slices for data.
/// The lifetime parameter `'a` ties the command to the buffers it references.
pub struct SpiCommand<'a> {
    /// The opcode byte
    pub opcode: u8,

    /// Address (if any)
    pub address: Option<u32>,

    /// Address width
    pub address_width: AddressWidth,

    /// Data to write after opcode/address
    pub write_data: &'a [u8],

    /// Buffer to read into (mutable)
    pub read_buf: &'a mut [u8],
}

impl<'a> SpiCommand<'a> {
    /// Create a simple command with no address or data (e.g., WREN, WRDI)
    pub fn simple(opcode: u8) -> Self {
        Self {
            opcode,
            address: None,
            address_width: AddressWidth::None,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Create a read register command with no address (e.g., RDSR, RDID)
    pub fn read_reg(opcode: u8, buf: &'a mut [u8]) -> Self {
        Self {
            opcode,
            address: None,
            address_width: AddressWidth::None,
            write_data: &[],
            read_buf: buf,
        }
    }

    /// Create an addressed read command (e.g., READ)
    pub fn read(opcode: u8, width: AddressWidth, addr: u32, buf: &'a mut [u8]) -> Self {
        Self {
            opcode,
            address: Some(addr),
            address_width: width,
            write_data: &[],
            read_buf: buf,
        }
    }

    /// Create an addressed write command (e.g., PP)
    pub fn write(opcode: u8, width: AddressWidth, addr: u32, data: &'a [u8]) -> Self {
        Self {
            opcode,
            address: Some(addr),
            address_width: width,
            write_data: data,
            read_buf: &mut [],
        }
    }

    /// Create an addressed command without a data phase (e.g., SE)
    pub fn erase(opcode: u8, width: AddressWidth, addr: u32) -> Self {
        Self {
            opcode,
            address: Some(addr),
            address_width: width,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Returns true if this command has an address phase
    pub fn has_address(&self) -> bool {
        self.address.is_some()
    }

    /// Length of the opcode and address phases in bytes
    pub fn header_len(&self) -> usize {
        1 + self.address_width.bytes() as usize
    }

    /// Encode opcode and address into the start of `buf`
    ///
    /// `buf` must hold at least [`header_len`](Self::header_len) bytes.
    pub fn encode_header(&self, buf: &mut [u8]) {
        buf[0] = self.opcode;
        if let Some(addr) = self.address {
            self.address_width.encode(addr, &mut buf[1..]);
        }
    }
}
