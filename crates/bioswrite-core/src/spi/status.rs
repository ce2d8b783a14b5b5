//! Status register 1 bits

use bitflags::bitflags;

use super::opcodes;

bitflags! {
    /// Status register 1 as reported by the device
    ///
    /// Only the busy and latch bits drive the engine; the block protection
    /// bits are kept so they show up in logs.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StatusFlags: u8 {
        /// A program or erase cycle is still running
        const WIP = opcodes::SR1_WIP;
        /// Write enable latch is set
        const WEL = opcodes::SR1_WEL;
        /// Block protect bit 0
        const BP0 = 1 << 2;
        /// Block protect bit 1
        const BP1 = 1 << 3;
        /// Block protect bit 2
        const BP2 = 1 << 4;
        /// Status register protect
        const SRP = 1 << 7;
    }
}

impl StatusFlags {
    /// Returns true while a program or erase cycle is running
    pub fn is_busy(self) -> bool {
        self.contains(Self::WIP)
    }

    /// Returns true when the write enable latch is set
    pub fn write_enabled(self) -> bool {
        self.contains(Self::WEL)
    }
}
