//! In-crate fake transport for unit tests

use alloc::vec;
use alloc::vec::Vec;

use crate::error::TransportFault;
use crate::geometry::JedecId;
use crate::spi::StatusFlags;
use crate::transport::{Transport, TransportResult};

/// Memory-backed transport with NOR semantics and command counters
pub struct FakeTransport {
    pub data: Vec<u8>,
    pub id: JedecId,
    pub erase_size: usize,
    /// Busy polls reported after each program/erase
    pub busy_polls: u32,
    pub stuck_busy: bool,
    pub ignore_wren: bool,
    pub dead_bus: bool,
    /// Bytes at this address read back XOR 0x01 after being programmed
    pub corrupt_at: Option<u32>,

    latch: bool,
    busy_left: u32,

    pub reads: usize,
    pub wrens: usize,
    pub erases: Vec<u32>,
    pub programs: Vec<(u32, usize)>,
    pub status_reads: usize,
}

impl FakeTransport {
    /// Erased chip of `size` bytes with a Winbond-style ID
    pub fn new(size: usize) -> Self {
        let density = size.trailing_zeros() as u16;
        Self {
            data: vec![0xFF; size],
            id: JedecId {
                manufacturer: 0xEF,
                device: 0x4000 | density,
            },
            erase_size: 4096,
            busy_polls: 2,
            stuck_busy: false,
            ignore_wren: false,
            dead_bus: false,
            corrupt_at: None,
            latch: false,
            busy_left: 0,
            reads: 0,
            wrens: 0,
            erases: Vec::new(),
            programs: Vec::new(),
            status_reads: 0,
        }
    }

    /// Forget all recorded commands
    pub fn reset_counters(&mut self) {
        self.reads = 0;
        self.wrens = 0;
        self.erases.clear();
        self.programs.clear();
        self.status_reads = 0;
    }

    /// Total number of commands that touch the bus
    pub fn bus_commands(&self) -> usize {
        self.reads + self.wrens + self.erases.len() + self.programs.len() + self.status_reads
    }

    fn check_bus(&self) -> TransportResult<()> {
        if self.dead_bus {
            Err(TransportFault::TransferFailed)
        } else {
            Ok(())
        }
    }
}

impl Transport for FakeTransport {
    fn identify(&mut self) -> TransportResult<JedecId> {
        self.check_bus()?;
        Ok(self.id)
    }

    fn max_read_len(&self) -> usize {
        1024
    }

    fn max_write_len(&self) -> usize {
        256
    }

    fn read_bytes(&mut self, addr: u32, buf: &mut [u8]) -> TransportResult<()> {
        self.check_bus()?;
        self.reads += 1;
        let start = addr as usize;
        let end = start + buf.len();
        if end > self.data.len() {
            return Err(TransportFault::AddressOutOfBounds);
        }
        buf.copy_from_slice(&self.data[start..end]);
        Ok(())
    }

    fn assert_write_enable(&mut self) -> TransportResult<()> {
        self.check_bus()?;
        self.wrens += 1;
        if !self.ignore_wren {
            self.latch = true;
        }
        Ok(())
    }

    fn erase_block(&mut self, addr: u32) -> TransportResult<()> {
        self.check_bus()?;
        self.erases.push(addr);
        if !self.latch {
            return Ok(());
        }
        let start = addr as usize & !(self.erase_size - 1);
        for byte in &mut self.data[start..start + self.erase_size] {
            *byte = 0xFF;
        }
        self.latch = false;
        self.busy_left = self.busy_polls;
        Ok(())
    }

    fn program_page(&mut self, addr: u32, data: &[u8]) -> TransportResult<()> {
        self.check_bus()?;
        self.programs.push((addr, data.len()));
        if !self.latch {
            return Ok(());
        }
        let start = addr as usize;
        for (i, &byte) in data.iter().enumerate() {
            self.data[start + i] &= byte;
        }
        if let Some(bad) = self.corrupt_at {
            let bad = bad as usize;
            if (start..start + data.len()).contains(&bad) {
                self.data[bad] ^= 0x01;
            }
        }
        self.latch = false;
        self.busy_left = self.busy_polls;
        Ok(())
    }

    fn read_status(&mut self) -> TransportResult<StatusFlags> {
        self.check_bus()?;
        self.status_reads += 1;
        let mut status = StatusFlags::empty();
        if self.latch {
            status |= StatusFlags::WEL;
        }
        if self.stuck_busy || self.busy_left > 0 {
            status |= StatusFlags::WIP;
            self.busy_left = self.busy_left.saturating_sub(1);
        }
        Ok(status)
    }

    fn delay_us(&mut self, _us: u32) {}
}
