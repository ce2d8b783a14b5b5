//! Write-enable latch tracking
//!
//! The chip accepts a program or erase command only while its write enable
//! latch (WEL) is set, and clears the latch itself once the command has been
//! accepted. [`WriteLatch`] mirrors that per-cycle state so that every
//! destructive command goes through a fresh enable:
//!
//! ```text
//! Idle --arm--> Enabled --issue--> Consumed --complete--> Idle
//! ```

use crate::error::{Error, Result};
use crate::transport::{Transport, TransportResult};

/// State of the write enable latch for the current cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchState {
    /// No destructive command pending
    Idle,
    /// WREN sent and WEL confirmed
    Enabled,
    /// A program or erase was issued and has not finished yet
    Consumed,
}

/// Per-write-call latch state machine
#[derive(Debug)]
pub struct WriteLatch {
    state: LatchState,
}

impl Default for WriteLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteLatch {
    /// Start in the idle state
    pub fn new() -> Self {
        Self {
            state: LatchState::Idle,
        }
    }

    /// Current state
    pub fn state(&self) -> LatchState {
        self.state
    }

    /// Send WREN and confirm the chip set WEL
    ///
    /// `addr` is the target of the destructive command that follows and is
    /// only used for error reporting.
    pub fn arm<T: Transport + ?Sized>(&mut self, transport: &mut T, addr: u32) -> Result<()> {
        debug_assert_ne!(self.state, LatchState::Consumed, "previous cycle not completed");

        transport
            .assert_write_enable()
            .map_err(|fault| Error::Transport { fault, addr })?;
        let status = transport
            .read_status()
            .map_err(|fault| Error::Transport { fault, addr })?;
        log::trace!("WREN before 0x{:08X}, status {:?}", addr, status);

        if !status.write_enabled() {
            self.state = LatchState::Idle;
            log::warn!("write enable latch did not set before 0x{:08X}", addr);
            return Err(Error::WriteEnableFailed { addr });
        }

        self.state = LatchState::Enabled;
        Ok(())
    }

    /// Arm the latch and issue one destructive command under it
    pub fn issue<T, F>(&mut self, transport: &mut T, addr: u32, command: F) -> Result<()>
    where
        T: Transport + ?Sized,
        F: FnOnce(&mut T) -> TransportResult<()>,
    {
        self.arm(transport, addr)?;
        self.consume(transport, addr, command)
    }

    fn consume<T, F>(&mut self, transport: &mut T, addr: u32, command: F) -> Result<()>
    where
        T: Transport + ?Sized,
        F: FnOnce(&mut T) -> TransportResult<()>,
    {
        if self.state != LatchState::Enabled {
            return Err(Error::WriteEnableFailed { addr });
        }
        // The chip drops WEL as soon as it accepts the command, so the latch
        // is spent even if the transfer reports an error
        self.state = LatchState::Consumed;
        command(transport).map_err(|fault| Error::Transport { fault, addr })
    }

    /// The destructive command finished; a new cycle may begin
    pub fn complete(&mut self) {
        self.state = LatchState::Idle;
    }
}
