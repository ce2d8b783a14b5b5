//! Error types for bioswrite-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate. Every variant carries enough context (kind plus
//! address where known) for a caller to decide whether to retry; the engine
//! itself never retries.

use core::fmt;

/// Failure reported by a transport for a single bus command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFault {
    /// Bus transfer failed
    TransferFailed,
    /// Opcode is not supported by the transport
    OpcodeNotSupported,
    /// The transport rejected the address
    AddressOutOfBounds,
    /// Underlying I/O failure
    Io,
}

/// Classification of an operation result
///
/// Every high-level `read`/`write` call ends in exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The operation completed
    Success,
    /// Post-program readback differed from the intended bytes
    VerificationMismatch,
    /// A program or erase cycle never reported completion
    Timeout,
    /// The requested range does not fit the device
    BoundsViolation,
    /// The bus or the device failed
    TransportError,
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Requested range exceeds device capacity
    OutOfRange {
        /// Start of the requested range
        offset: u32,
        /// Length of the requested range
        len: usize,
        /// Device capacity in bytes
        capacity: u32,
    },

    // Geometry resolution
    /// The chip did not answer the identification query
    DeviceUnresponsive,
    /// The chip answered but its geometry is zero or implausible
    UnsupportedDevice {
        /// JEDEC manufacturer ID
        manufacturer: u8,
        /// JEDEC device ID
        device: u16,
    },
    /// A configured geometry failed validation
    InvalidGeometry,

    /// A bus command failed
    Transport {
        /// What the transport reported
        fault: TransportFault,
        /// Address being accessed when the fault occurred
        addr: u32,
    },

    // Write cycle errors
    /// The busy flag did not clear after a page program
    ProgramTimeout {
        /// Start address of the page being programmed
        addr: u32,
    },
    /// The busy flag did not clear after a block erase
    EraseTimeout {
        /// Start address of the block being erased
        addr: u32,
    },
    /// The write-enable latch did not set after being asserted
    WriteEnableFailed {
        /// Address of the destructive command that was about to be issued
        addr: u32,
    },
    /// Readback after programming differs from the intended bytes
    VerificationMismatch {
        /// First differing address
        offset: u32,
        /// Intended byte at that address
        expected: u8,
        /// Byte read back from the device
        found: u8,
    },
    /// The write was cancelled at a chunk boundary
    Cancelled {
        /// First address that was not processed
        offset: u32,
    },

    /// Configuration could not be parsed or is inconsistent
    Config,
}

impl Error {
    /// Classify this error into an operation outcome
    pub fn outcome(&self) -> Outcome {
        match self {
            Self::OutOfRange { .. } => Outcome::BoundsViolation,
            Self::VerificationMismatch { .. } => Outcome::VerificationMismatch,
            Self::ProgramTimeout { .. } | Self::EraseTimeout { .. } => Outcome::Timeout,
            Self::DeviceUnresponsive
            | Self::UnsupportedDevice { .. }
            | Self::InvalidGeometry
            | Self::Transport { .. }
            | Self::WriteEnableFailed { .. }
            | Self::Cancelled { .. }
            | Self::Config => Outcome::TransportError,
        }
    }

    /// The address associated with this error, if any
    pub fn offset(&self) -> Option<u32> {
        match *self {
            Self::OutOfRange { offset, .. } => Some(offset),
            Self::Transport { addr, .. } => Some(addr),
            Self::ProgramTimeout { addr } => Some(addr),
            Self::EraseTimeout { addr } => Some(addr),
            Self::WriteEnableFailed { addr } => Some(addr),
            Self::VerificationMismatch { offset, .. } => Some(offset),
            Self::Cancelled { offset } => Some(offset),
            Self::DeviceUnresponsive
            | Self::UnsupportedDevice { .. }
            | Self::InvalidGeometry
            | Self::Config => None,
        }
    }
}

impl fmt::Display for TransportFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransferFailed => write!(f, "bus transfer failed"),
            Self::OpcodeNotSupported => write!(f, "opcode not supported by transport"),
            Self::AddressOutOfBounds => write!(f, "address rejected by transport"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange {
                offset,
                len,
                capacity,
            } => write!(
                f,
                "offset 0x{:08X} + length 0x{:X} exceeds flash size 0x{:08X}",
                offset, len, capacity
            ),
            Self::DeviceUnresponsive => write!(f, "flash chip did not answer identification"),
            Self::UnsupportedDevice {
                manufacturer,
                device,
            } => write!(
                f,
                "unsupported flash chip (JEDEC {:02X}:{:04X})",
                manufacturer, device
            ),
            Self::InvalidGeometry => write!(f, "invalid flash geometry"),
            Self::Transport { fault, addr } => write!(f, "{} at 0x{:08X}", fault, addr),
            Self::ProgramTimeout { addr } => {
                write!(f, "page program at 0x{:08X} timed out", addr)
            }
            Self::EraseTimeout { addr } => write!(f, "block erase at 0x{:08X} timed out", addr),
            Self::WriteEnableFailed { addr } => {
                write!(f, "write enable latch not set before 0x{:08X}", addr)
            }
            Self::VerificationMismatch {
                offset,
                expected,
                found,
            } => write!(
                f,
                "verification failed at 0x{:08X}: expected 0x{:02X}, found 0x{:02X}",
                offset, expected, found
            ),
            Self::Cancelled { offset } => write!(f, "write cancelled before 0x{:08X}", offset),
            Self::Config => write!(f, "invalid configuration"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TransportFault {}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_classification() {
        let err = Error::OutOfRange {
            offset: 0x10,
            len: 4,
            capacity: 0x10,
        };
        assert_eq!(err.outcome(), Outcome::BoundsViolation);
        assert_eq!(err.offset(), Some(0x10));

        assert_eq!(
            Error::ProgramTimeout { addr: 0x100 }.outcome(),
            Outcome::Timeout
        );
        assert_eq!(Error::DeviceUnresponsive.offset(), None);
        assert_eq!(
            Error::VerificationMismatch {
                offset: 0x1234,
                expected: 0,
                found: 0xFF
            }
            .offset(),
            Some(0x1234)
        );
    }
}
