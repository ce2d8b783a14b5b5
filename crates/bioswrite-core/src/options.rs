//! Write options, cancellation and progress reporting

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};

/// Options for a single `write` call
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Rewrite every touched page even if it already holds the wanted bytes
    pub force: bool,
    /// Read back and compare each page after programming it
    pub verify: bool,
    /// Checked at every chunk boundary
    pub cancel: Option<CancelToken>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            force: false,
            verify: true,
            cancel: None,
        }
    }
}

impl WriteOptions {
    /// Default options with `force` set
    pub fn forced() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}

/// Cross-thread cancellation flag
///
/// Cancellation only takes effect between chunks; a program or erase that
/// has already been issued always runs to completion or timeout.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What the scheduler did with one page chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Already held the wanted bytes, no command issued
    Skipped,
    /// Programmed with new content
    Programmed,
    /// Wanted bytes are all 0xFF, the block erase alone produced them
    Erased,
    /// Outside the requested range, reprogrammed after its block was erased
    Restored,
}

/// Statistics from a write operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Page chunks inside the requested range
    pub pages_total: usize,
    /// Chunks left untouched because they already matched
    pub pages_skipped: usize,
    /// Chunks programmed with new content
    pub pages_programmed: usize,
    /// Chunks whose wanted content was produced by an erase alone
    pub pages_erased: usize,
    /// Preserved pages written back after an erase
    pub pages_restored: usize,
    /// Erase blocks erased
    pub blocks_erased: usize,
    /// Bytes sent with page program commands
    pub bytes_written: usize,
    /// Program cycles whose readback was checked
    pub pages_verified: usize,
}

impl WriteReport {
    /// Whether any destructive command was issued
    pub fn flash_modified(&self) -> bool {
        self.blocks_erased > 0 || self.pages_programmed > 0 || self.pages_restored > 0
    }
}

/// Callback for progress reporting during write operations
pub trait WriteProgress {
    /// Called once before the first chunk with the range being written
    fn begin(&mut self, offset: u32, len: usize);

    /// Called after each page chunk has been handled
    fn chunk(&mut self, addr: u32, len: usize, outcome: ChunkOutcome);

    /// Called after an erase block has been erased
    fn erased(&mut self, addr: u32, size: u32);

    /// Called when the operation is complete
    fn complete(&mut self, report: &WriteReport);
}

/// A no-op progress reporter
pub struct NoProgress;

impl WriteProgress for NoProgress {
    fn begin(&mut self, _offset: u32, _len: usize) {}
    fn chunk(&mut self, _addr: u32, _len: usize, _outcome: ChunkOutcome) {}
    fn erased(&mut self, _addr: u32, _size: u32) {}
    fn complete(&mut self, _report: &WriteReport) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = WriteOptions::default();
        assert!(!opts.force);
        assert!(opts.verify);
        assert!(!opts.is_cancelled());
        assert!(WriteOptions::forced().force);
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let opts = WriteOptions {
            cancel: Some(token.clone()),
            ..WriteOptions::default()
        };
        assert!(!opts.is_cancelled());
        token.cancel();
        assert!(opts.is_cancelled());
    }
}
