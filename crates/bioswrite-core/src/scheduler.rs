//! Page write scheduler
//!
//! Turns an arbitrary byte range into a sequence of page program cycles that
//! respect the NOR asymmetry: programming can only clear bits, so any page
//! that changes an already programmed byte forces an erase of its whole
//! erase block.
//!
//! The range is processed one erase block at a time in ascending address
//! order:
//!
//! 1. Read the block's current bytes inside the range.
//! 2. Split them into page chunks. A chunk is dirty if it differs from the
//!    wanted bytes (or always, when forced).
//! 3. If every byte a dirty chunk changes is still erased, program each
//!    dirty chunk in place.
//! 4. Otherwise back up the bytes of the block that lie outside the range,
//!    erase the block, and program every page of the merged image that is
//!    not already all `0xFF`.
//!
//! Each program or erase runs under a fresh write enable and is polled to
//! completion before the next command goes out. Nothing is rolled back on
//! failure: everything below the failing address has been committed.

use alloc::vec;
use alloc::vec::Vec;

use crate::config::Timing;
use crate::error::{Error, Result};
use crate::geometry::Geometry;
use crate::latch::WriteLatch;
use crate::options::{ChunkOutcome, WriteOptions, WriteProgress, WriteReport};
use crate::reader;
use crate::transport::Transport;
use crate::verify;

/// The erased value for flash memory (all bits set)
pub const ERASED_VALUE: u8 = 0xFF;

/// Determine if an erase is required to transition from `have` to `want`
///
/// Any byte that changes must currently be in the erased state. This is
/// stricter than the bit rule (`(have & want) != want`) and never relies on
/// programming over already programmed bytes.
pub fn need_erase(have: &[u8], want: &[u8]) -> bool {
    debug_assert_eq!(have.len(), want.len());
    have.iter()
        .zip(want.iter())
        .any(|(h, w)| h != w && *h != ERASED_VALUE)
}

/// Returns true if every byte is in the erased state
pub fn is_erased(data: &[u8]) -> bool {
    data.iter().all(|&b| b == ERASED_VALUE)
}

/// A page-aligned slice of a byte range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageChunk {
    /// Device address of the first byte
    pub addr: u32,
    /// Length in bytes, never crossing a page boundary
    pub len: usize,
}

/// Split `[start, end)` into chunks that never cross a page boundary
pub fn page_chunks(geometry: &Geometry, start: u32, end: u32) -> impl Iterator<Item = PageChunk> {
    let page_size = geometry.page_size;
    let mut addr = start;
    core::iter::from_fn(move || {
        if addr >= end {
            return None;
        }
        let page_end = (addr & !(page_size - 1)).saturating_add(page_size);
        let chunk_end = page_end.min(end);
        let chunk = PageChunk {
            addr,
            len: (chunk_end - addr) as usize,
        };
        addr = chunk_end;
        Some(chunk)
    })
}

/// The part of `buf` (which starts at device address `base`) covered by `chunk`
fn chunk_of<'b>(buf: &'b [u8], base: u32, chunk: &PageChunk) -> &'b [u8] {
    let from = (chunk.addr - base) as usize;
    &buf[from..from + chunk.len]
}

/// Write `content` at `offset`
///
/// Fails with `OutOfRange` before any bus command if the range does not fit
/// the device.
pub fn write<T, P>(
    transport: &mut T,
    geometry: &Geometry,
    timing: &Timing,
    offset: u32,
    content: &[u8],
    options: &WriteOptions,
    progress: &mut P,
) -> Result<WriteReport>
where
    T: Transport + ?Sized,
    P: WriteProgress + ?Sized,
{
    geometry.check_range(offset, content.len())?;

    let mut scheduler = Scheduler {
        transport,
        geometry,
        timing,
        options,
        progress,
        latch: WriteLatch::new(),
        report: WriteReport::default(),
    };
    scheduler.run(offset, content)
}

struct Scheduler<'a, T: Transport + ?Sized, P: WriteProgress + ?Sized> {
    transport: &'a mut T,
    geometry: &'a Geometry,
    timing: &'a Timing,
    options: &'a WriteOptions,
    progress: &'a mut P,
    latch: WriteLatch,
    report: WriteReport,
}

impl<T: Transport + ?Sized, P: WriteProgress + ?Sized> Scheduler<'_, T, P> {
    fn run(&mut self, offset: u32, content: &[u8]) -> Result<WriteReport> {
        // check_range guarantees end <= capacity <= 2 GiB
        let end = offset + content.len() as u32;
        self.report.pages_total = page_chunks(self.geometry, offset, end).count();
        self.progress.begin(offset, content.len());

        let erase_size = self.geometry.erase_size;
        let mut block = self.geometry.block_start(offset);
        while block < end {
            let seg_start = block.max(offset);
            let seg_end = (block + erase_size).min(end);
            if self.options.is_cancelled() {
                log::info!("write cancelled before 0x{:08X}", seg_start);
                return Err(Error::Cancelled { offset: seg_start });
            }

            let want = &content[(seg_start - offset) as usize..(seg_end - offset) as usize];
            self.write_block(block, seg_start, want)?;
            block += erase_size;
        }

        log::info!(
            "write 0x{:08X}+0x{:X}: {} programmed, {} skipped, {} restored, {} block(s) erased",
            offset,
            content.len(),
            self.report.pages_programmed,
            self.report.pages_skipped,
            self.report.pages_restored,
            self.report.blocks_erased
        );
        self.progress.complete(&self.report);
        Ok(core::mem::take(&mut self.report))
    }

    /// Bring the part of one erase block at `[seg_start, seg_start + want.len())`
    /// to the wanted content
    fn write_block(&mut self, block: u32, seg_start: u32, want: &[u8]) -> Result<()> {
        let seg_end = seg_start + want.len() as u32;
        let mut have = vec![0u8; want.len()];
        reader::read_into(self.transport, self.geometry, seg_start, &mut have)?;

        let chunks: Vec<PageChunk> = page_chunks(self.geometry, seg_start, seg_end).collect();

        let force = self.options.force;
        let dirty: Vec<bool> = chunks
            .iter()
            .map(|c| force || chunk_of(&have, seg_start, c) != chunk_of(want, seg_start, c))
            .collect();

        if !dirty.iter().any(|&d| d) {
            log::debug!("block 0x{:08X}: up to date", block);
            for chunk in &chunks {
                self.skip(chunk);
            }
            return Ok(());
        }

        let erase = chunks.iter().zip(&dirty).any(|(c, &d)| {
            d && need_erase(chunk_of(&have, seg_start, c), chunk_of(want, seg_start, c))
        });

        if !erase {
            for (chunk, &d) in chunks.iter().zip(&dirty) {
                if !d {
                    self.skip(chunk);
                    continue;
                }
                if self.options.is_cancelled() {
                    log::info!("write cancelled before 0x{:08X}", chunk.addr);
                    return Err(Error::Cancelled { offset: chunk.addr });
                }
                log::debug!("page 0x{:08X}: program {} byte(s)", chunk.addr, chunk.len);
                self.program(chunk.addr, chunk_of(want, seg_start, chunk))?;
                self.report.pages_programmed += 1;
                self.progress.chunk(chunk.addr, chunk.len, ChunkOutcome::Programmed);
            }
            return Ok(());
        }

        self.rewrite_block(block, seg_start, want)
    }

    /// Erase the block and program the merged image back
    fn rewrite_block(&mut self, block: u32, seg_start: u32, want: &[u8]) -> Result<()> {
        let erase_size = self.geometry.erase_size;
        let seg_end = seg_start + want.len() as u32;
        let block_end = block + erase_size;

        // Back up whatever the range does not cover
        let mut image = vec![ERASED_VALUE; erase_size as usize];
        let head = (seg_start - block) as usize;
        let tail = (seg_end - block) as usize;
        if head > 0 {
            reader::read_into(self.transport, self.geometry, block, &mut image[..head])?;
        }
        if seg_end < block_end {
            reader::read_into(self.transport, self.geometry, seg_end, &mut image[tail..])?;
        }
        image[head..tail].copy_from_slice(want);

        log::debug!(
            "block 0x{:08X}: erase, preserving {} byte(s)",
            block,
            erase_size as usize - want.len()
        );
        self.erase(block)?;

        let page_size = self.geometry.page_size;
        let mut page = block;
        while page < block_end {
            let from = (page - block) as usize;
            let data = &image[from..from + page_size as usize];
            let page_end = page + page_size;
            let in_range = page < seg_end && page_end > seg_start;

            let program = !is_erased(data) || (in_range && self.options.force);
            if program {
                log::debug!("page 0x{:08X}: program after erase", page);
                self.program(page, data)?;
            }

            if in_range {
                let start = page.max(seg_start);
                let len = (page_end.min(seg_end) - start) as usize;
                let outcome = if program {
                    self.report.pages_programmed += 1;
                    ChunkOutcome::Programmed
                } else {
                    self.report.pages_erased += 1;
                    ChunkOutcome::Erased
                };
                self.progress.chunk(start, len, outcome);
            } else if program {
                self.report.pages_restored += 1;
                self.progress.chunk(page, page_size as usize, ChunkOutcome::Restored);
            }

            page = page_end;
        }

        Ok(())
    }

    fn skip(&mut self, chunk: &PageChunk) {
        log::trace!("page 0x{:08X}: unchanged", chunk.addr);
        self.report.pages_skipped += 1;
        self.progress.chunk(chunk.addr, chunk.len, ChunkOutcome::Skipped);
    }

    /// One page program cycle: enable, program, poll, verify
    fn program(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        self.latch
            .issue(self.transport, addr, |t| t.program_page(addr, data))?;
        wait_ready(
            self.transport,
            self.timing.program_poll_us,
            self.timing.program_polls(),
            Error::ProgramTimeout { addr },
        )?;
        self.latch.complete();
        self.report.bytes_written += data.len();

        if self.options.verify {
            verify::verify(self.transport, self.geometry, addr, data)?;
            self.report.pages_verified += 1;
        }
        Ok(())
    }

    /// One erase cycle: enable, erase, poll
    fn erase(&mut self, block: u32) -> Result<()> {
        self.latch
            .issue(self.transport, block, |t| t.erase_block(block))?;
        wait_ready(
            self.transport,
            self.timing.erase_poll_us,
            self.timing.erase_polls(),
            Error::EraseTimeout { addr: block },
        )?;
        self.latch.complete();
        self.report.blocks_erased += 1;
        self.progress.erased(block, self.geometry.erase_size);
        Ok(())
    }
}

/// Poll the status register until WIP clears
///
/// Gives up with `timeout` after `max_polls` reads, sleeping `poll_delay_us`
/// between them.
pub fn wait_ready<T: Transport + ?Sized>(
    transport: &mut T,
    poll_delay_us: u32,
    max_polls: u32,
    timeout: Error,
) -> Result<()> {
    let addr = timeout.offset().unwrap_or(0);
    for poll in 0..max_polls {
        let status = transport
            .read_status()
            .map_err(|fault| Error::Transport { fault, addr })?;
        if !status.is_busy() {
            log::trace!("ready at 0x{:08X} after {} poll(s)", addr, poll + 1);
            return Ok(());
        }
        if poll_delay_us > 0 {
            transport.delay_us(poll_delay_us);
        }
    }

    log::warn!("{} after {} polls", timeout, max_polls);
    Err(timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::NoProgress;
    use crate::testutil::FakeTransport;

    const MIB: usize = 0x10_0000;

    fn geometry() -> Geometry {
        Geometry {
            capacity: MIB as u32,
            page_size: 256,
            erase_size: 4096,
        }
    }

    fn run(
        t: &mut FakeTransport,
        offset: u32,
        content: &[u8],
        opts: &WriteOptions,
    ) -> Result<WriteReport> {
        write(t, &geometry(), &Timing::default(), offset, content, opts, &mut NoProgress)
    }

    #[derive(Default)]
    struct Recorder {
        chunks: Vec<(u32, usize, ChunkOutcome)>,
        erased: Vec<u32>,
        completed: bool,
    }

    impl WriteProgress for Recorder {
        fn begin(&mut self, _offset: u32, _len: usize) {}
        fn chunk(&mut self, addr: u32, len: usize, outcome: ChunkOutcome) {
            self.chunks.push((addr, len, outcome));
        }
        fn erased(&mut self, addr: u32, _size: u32) {
            self.erased.push(addr);
        }
        fn complete(&mut self, _report: &WriteReport) {
            self.completed = true;
        }
    }

    #[test]
    fn test_need_erase() {
        assert!(!need_erase(&[0xFF, 0xFF], &[0x00, 0x12]));
        assert!(!need_erase(&[0x5A, 0xFF], &[0x5A, 0x00]));
        assert!(need_erase(&[0xF0], &[0x00]));
        assert!(need_erase(&[0x00], &[0x01]));
    }

    #[test]
    fn test_page_chunks_split_at_boundaries() {
        let chunks: Vec<_> = page_chunks(&geometry(), 0x10F0, 0x1210).collect();
        assert_eq!(
            chunks,
            vec![
                PageChunk { addr: 0x10F0, len: 0x10 },
                PageChunk { addr: 0x1100, len: 0x100 },
                PageChunk { addr: 0x1200, len: 0x10 },
            ]
        );
        assert_eq!(page_chunks(&geometry(), 0x100, 0x100).count(), 0);
    }

    #[test]
    fn test_program_into_erased_flash() {
        let mut t = FakeTransport::new(MIB);
        let data: Vec<u8> = (0..600).map(|i| i as u8).collect();
        let report = run(&mut t, 0x2000, &data, &WriteOptions::default()).unwrap();

        assert!(t.erases.is_empty());
        assert_eq!(t.programs, vec![(0x2000, 256), (0x2100, 256), (0x2200, 88)]);
        assert_eq!(&t.data[0x2000..0x2000 + 600], &data[..]);
        assert_eq!(report.pages_programmed, 3);
        assert_eq!(report.pages_verified, 3);
        assert_eq!(report.bytes_written, 600);
    }

    #[test]
    fn test_idempotent_second_write() {
        let mut t = FakeTransport::new(MIB);
        let data = [0x3Cu8; 5000];
        run(&mut t, 0x3F00, &data, &WriteOptions::default()).unwrap();

        t.reset_counters();
        let report = run(&mut t, 0x3F00, &data, &WriteOptions::default()).unwrap();
        assert!(t.erases.is_empty());
        assert!(t.programs.is_empty());
        assert_eq!(t.wrens, 0);
        assert_eq!(report.pages_skipped, report.pages_total);
        assert!(!report.flash_modified());
    }

    #[test]
    fn test_force_programs_each_page_once() {
        let mut t = FakeTransport::new(MIB);
        let data = [0xA5u8; 1024];
        run(&mut t, 0x8000, &data, &WriteOptions::default()).unwrap();

        t.reset_counters();
        let report = run(&mut t, 0x8000, &data, &WriteOptions::forced()).unwrap();
        assert!(t.erases.is_empty());
        assert_eq!(t.programs.len(), 4);
        assert_eq!(report.pages_programmed, 4);
        assert_eq!(report.pages_skipped, 0);
    }

    #[test]
    fn test_force_on_erased_range_with_erase() {
        // 0xFF into a programmed block: forced pages are programmed even though
        // the erase alone already produced their content
        let mut t = FakeTransport::new(MIB);
        t.data[0x5000..0x5200].fill(0x00);
        let report = run(&mut t, 0x5000, &[0xFF; 0x200], &WriteOptions::forced()).unwrap();
        assert_eq!(t.erases, vec![0x5000]);
        assert_eq!(t.programs.len(), 2);
        assert_eq!(report.pages_programmed, 2);
    }

    #[test]
    fn test_out_of_range_issues_no_commands() {
        let mut t = FakeTransport::new(MIB);
        let err = run(&mut t, 0xF_FF00, &[0u8; 0x200], &WriteOptions::default()).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { .. }));
        assert_eq!(t.bus_commands(), 0);
    }

    #[test]
    fn test_zero_fill_on_zero_device_programs_nothing() {
        let mut t = FakeTransport::new(MIB);
        t.data.fill(0x00);
        let report = run(&mut t, 0x1000, &[0u8; 256], &WriteOptions::default()).unwrap();
        assert!(t.programs.is_empty());
        assert!(t.erases.is_empty());
        assert_eq!(report.pages_skipped, 1);
    }

    #[test]
    fn test_zero_fill_over_data_erases_once() {
        let mut t = FakeTransport::new(MIB);
        t.data[0x1000..0x1100].fill(0x5A);

        let report = run(&mut t, 0x1000, &[0u8; 256], &WriteOptions::default()).unwrap();
        assert_eq!(t.erases, vec![0x1000]);
        assert_eq!(t.programs, vec![(0x1000, 256)]);
        assert_eq!(report.pages_verified, 1);
        assert_eq!(report.pages_restored, 0);
        assert_eq!(&t.data[0x1000..0x1100], &[0u8; 256][..]);
    }

    #[test]
    fn test_partial_page_into_erased_bytes() {
        let mut t = FakeTransport::new(MIB);
        t.data[0x1000..0x1080].fill(0x5A);
        run(&mut t, 0x1080, &[0x11; 0x80], &WriteOptions::default()).unwrap();
        assert!(t.erases.is_empty());
        assert_eq!(t.programs, vec![(0x1080, 0x80)]);
        assert_eq!(&t.data[0x1000..0x1080], &[0x5A; 0x80][..]);
        assert_eq!(&t.data[0x1080..0x1100], &[0x11; 0x80][..]);
    }

    #[test]
    fn test_neighbours_preserved_across_erase() {
        let mut t = FakeTransport::new(MIB);
        for (i, byte) in t.data[0x6000..0x7000].iter_mut().enumerate() {
            *byte = (i % 251) as u8;
        }
        let before = t.data.clone();

        let mut progress = Recorder::default();
        let report = write(
            &mut t,
            &geometry(),
            &Timing::default(),
            0x6480,
            &[0xFF; 0x100],
            &WriteOptions::default(),
            &mut progress,
        )
        .unwrap();

        assert_eq!(t.erases, vec![0x6000]);
        assert_eq!(&t.data[..0x6480], &before[..0x6480]);
        assert_eq!(&t.data[0x6480..0x6580], &[0xFF; 0x100][..]);
        assert_eq!(&t.data[0x6580..], &before[0x6580..]);

        // pages 0x6400 and 0x6500 hold both preserved and wanted bytes
        assert_eq!(report.pages_programmed, 2);
        assert_eq!(report.pages_restored, 14);
        assert_eq!(progress.erased, vec![0x6000]);
        assert!(progress.completed);
        assert_eq!(progress.chunks[0], (0x6000, 256, ChunkOutcome::Restored));
    }

    #[test]
    fn test_erased_pages_are_not_restored() {
        let mut t = FakeTransport::new(MIB);
        t.data[0x7000] = 0x00;
        let report = run(&mut t, 0x7000, &[0xFF], &WriteOptions::default()).unwrap();
        assert_eq!(t.erases, vec![0x7000]);
        assert!(t.programs.is_empty());
        assert_eq!(report.pages_erased, 1);
        assert_eq!(t.data[0x7000], 0xFF);
    }

    #[test]
    fn test_stuck_busy_times_out() {
        let mut t = FakeTransport::new(MIB);
        t.stuck_busy = true;
        let err = run(&mut t, 0x100, &[0u8; 16], &WriteOptions::default()).unwrap_err();
        assert_eq!(err, Error::ProgramTimeout { addr: 0x100 });
        // one WEL check plus the bounded poll budget
        assert_eq!(t.status_reads, 1 + Timing::default().program_polls() as usize);
    }

    #[test]
    fn test_stuck_busy_erase_times_out() {
        let mut t = FakeTransport::new(MIB);
        t.data[0x3000] = 0x00;
        t.stuck_busy = true;
        let err = run(&mut t, 0x3000, &[0x11], &WriteOptions::default()).unwrap_err();
        assert_eq!(err, Error::EraseTimeout { addr: 0x3000 });
        assert!(t.programs.is_empty());
    }

    #[test]
    fn test_timeout_aborts_remaining_pages() {
        let mut t = FakeTransport::new(MIB);
        t.busy_polls = 5000;
        let err = run(&mut t, 0, &[0u8; 1024], &WriteOptions::default()).unwrap_err();
        assert_eq!(err, Error::ProgramTimeout { addr: 0 });
        assert_eq!(t.programs.len(), 1);
    }

    #[test]
    fn test_verification_mismatch_reports_first_offset() {
        let mut t = FakeTransport::new(MIB);
        t.corrupt_at = Some(0x1234);
        let err = run(&mut t, 0x1200, &[0x00; 0x100], &WriteOptions::default()).unwrap_err();
        assert_eq!(
            err,
            Error::VerificationMismatch {
                offset: 0x1234,
                expected: 0x00,
                found: 0x01
            }
        );
    }

    #[test]
    fn test_verify_can_be_disabled() {
        let mut t = FakeTransport::new(MIB);
        t.corrupt_at = Some(0x1234);
        let opts = WriteOptions {
            verify: false,
            ..WriteOptions::default()
        };
        let report = run(&mut t, 0x1200, &[0x00; 0x100], &opts).unwrap();
        assert_eq!(report.pages_verified, 0);
    }

    #[test]
    fn test_wel_failure_aborts_before_program() {
        let mut t = FakeTransport::new(MIB);
        t.ignore_wren = true;
        let err = run(&mut t, 0x400, &[0u8; 4], &WriteOptions::default()).unwrap_err();
        assert_eq!(err, Error::WriteEnableFailed { addr: 0x400 });
        assert!(t.programs.is_empty());
    }

    #[test]
    fn test_cancelled_before_start() {
        let mut t = FakeTransport::new(MIB);
        let opts = WriteOptions {
            cancel: Some(crate::CancelToken::new()),
            ..WriteOptions::default()
        };
        if let Some(token) = &opts.cancel {
            token.cancel();
        }
        let err = run(&mut t, 0x2100, &[0u8; 0x100], &opts).unwrap_err();
        assert_eq!(err, Error::Cancelled { offset: 0x2100 });
        assert_eq!(t.bus_commands(), 0);
    }

    #[test]
    fn test_cancel_between_blocks() {
        struct CancelAfterFirstBlock(crate::CancelToken);
        impl WriteProgress for CancelAfterFirstBlock {
            fn begin(&mut self, _offset: u32, _len: usize) {}
            fn chunk(&mut self, addr: u32, _len: usize, _outcome: ChunkOutcome) {
                if addr >= 0x0F00 {
                    self.0.cancel();
                }
            }
            fn erased(&mut self, _addr: u32, _size: u32) {}
            fn complete(&mut self, _report: &WriteReport) {}
        }

        let mut t = FakeTransport::new(MIB);
        let token = crate::CancelToken::new();
        let opts = WriteOptions {
            cancel: Some(token.clone()),
            ..WriteOptions::default()
        };
        let mut progress = CancelAfterFirstBlock(token);
        let err = write(
            &mut t,
            &geometry(),
            &Timing::default(),
            0,
            &[0u8; 0x2000],
            &opts,
            &mut progress,
        )
        .unwrap_err();

        assert_eq!(err, Error::Cancelled { offset: 0x1000 });
        assert_eq!(t.programs.len(), 16);
        assert_eq!(&t.data[..0x1000], &[0u8; 0x1000][..]);
        assert_eq!(t.data[0x1000], 0xFF);
    }

    #[test]
    fn test_empty_write() {
        let mut t = FakeTransport::new(MIB);
        let report = run(&mut t, MIB as u32, &[], &WriteOptions::default()).unwrap();
        assert_eq!(report, WriteReport::default());
        assert_eq!(t.bus_commands(), 0);
    }

    #[test]
    fn test_wait_ready_counts_polls() {
        let mut t = FakeTransport::new(MIB);
        t.stuck_busy = true;
        let err = wait_ready(&mut t, 10, 7, Error::EraseTimeout { addr: 0x9000 }).unwrap_err();
        assert_eq!(err, Error::EraseTimeout { addr: 0x9000 });
        assert_eq!(t.status_reads, 7);
    }
}
