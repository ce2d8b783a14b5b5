//! Progress reporting with indicatif

use bioswrite_core::{ChunkOutcome, WriteProgress, WriteReport};
use indicatif::{ProgressBar, ProgressStyle};

/// Create a progress bar with custom phase message
pub(crate) fn create_progress_bar_with_phase(total: u64, phase: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {} {{msg}}",
                phase
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Progress reporter using an indicatif progress bar
pub(crate) struct IndicatifProgress {
    phase: &'static str,
    bar: Option<ProgressBar>,
}

impl IndicatifProgress {
    pub(crate) fn new(phase: &'static str) -> Self {
        Self { phase, bar: None }
    }
}

impl WriteProgress for IndicatifProgress {
    fn begin(&mut self, _offset: u32, len: usize) {
        self.bar = Some(create_progress_bar_with_phase(len as u64, self.phase));
    }

    fn chunk(&mut self, addr: u32, len: usize, outcome: ChunkOutcome) {
        let Some(pb) = &self.bar else { return };
        match outcome {
            // Restored pages lie outside the requested range
            ChunkOutcome::Restored => {}
            ChunkOutcome::Skipped => pb.inc(len as u64),
            ChunkOutcome::Programmed | ChunkOutcome::Erased => {
                pb.set_message(format!("0x{:08X}", addr));
                pb.inc(len as u64);
            }
        }
    }

    fn erased(&mut self, addr: u32, size: u32) {
        if let Some(pb) = &self.bar {
            pb.set_message(format!("erased 0x{:08X}+0x{:X}", addr, size));
        }
    }

    fn complete(&mut self, report: &WriteReport) {
        if let Some(pb) = self.bar.take() {
            pb.finish_with_message("done");
        }

        if !report.flash_modified() {
            println!("Flash already contains the desired data - no changes needed");
        } else {
            println!(
                "{} of {} pages changed: {} programmed, {} left erased, {} restored, {} blocks erased, {} bytes written",
                report.pages_total - report.pages_skipped,
                report.pages_total,
                report.pages_programmed,
                report.pages_erased,
                report.pages_restored,
                report.blocks_erased,
                report.bytes_written
            );
        }
    }
}

impl Drop for IndicatifProgress {
    fn drop(&mut self) {
        // An aborted operation never reaches complete()
        if let Some(pb) = self.bar.take() {
            pb.abandon_with_message("failed");
        }
    }
}
