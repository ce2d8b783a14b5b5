//! Address width types

/// Address width for SPI commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AddressWidth {
    /// No address phase
    #[default]
    None,
    /// 3-byte (24-bit) address - supports up to 16 MiB
    ThreeByte,
    /// 4-byte (32-bit) address - supports up to 4 GiB
    FourByte,
}

impl AddressWidth {
    /// Returns the number of address bytes
    pub const fn bytes(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::ThreeByte => 3,
            Self::FourByte => 4,
        }
    }

    /// Returns the maximum addressable size in bytes
    pub const fn max_size(&self) -> u64 {
        match self {
            Self::None => 0,
            Self::ThreeByte => 16 * 1024 * 1024,
            Self::FourByte => 1 << 32,
        }
    }

    /// Smallest width able to address a device of `capacity` bytes
    pub const fn for_capacity(capacity: u32) -> Self {
        if capacity as u64 > Self::ThreeByte.max_size() {
            Self::FourByte
        } else {
            Self::ThreeByte
        }
    }

    /// Encode an address into bytes (big endian, as sent on the wire)
    pub fn encode(&self, address: u32, buf: &mut [u8]) {
        match self {
            Self::None => {}
            Self::ThreeByte => {
                buf[0] = (address >> 16) as u8;
                buf[1] = (address >> 8) as u8;
                buf[2] = address as u8;
            }
            Self::FourByte => {
                buf[..4].copy_from_slice(&address.to_be_bytes());
            }
        }
    }
}
