//! CLI command implementations
//!
//! Every command runs against an already opened
//! [`FlashDevice`](bioswrite_core::FlashDevice), so the same code drives any
//! programmer. A path of `-` stands for stdin or stdout.

mod erase;
mod info;
mod list;
mod progress;
mod read;
mod verify;
mod write;

pub use erase::run_erase;
pub use info::run_info;
pub use list::list_programmers;
pub use read::run_read;
pub use verify::run_verify;
pub use write::{run_write, WriteArgs};

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

/// Result type shared by all commands
pub type CmdResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Whether `path` names stdin/stdout rather than a file
pub(crate) fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Read a whole input file, or stdin for `-`
pub(crate) fn read_input(path: &Path) -> CmdResult<Vec<u8>> {
    let mut data = Vec::new();
    if is_stdio(path) {
        io::stdin().lock().read_to_end(&mut data)?;
    } else {
        data = fs::read(path).map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
    }
    log::debug!("Read {} bytes from {}", data.len(), path.display());
    Ok(data)
}

/// Write `data` to a file, or stdout for `-`
pub(crate) fn write_output(path: &Path, data: &[u8]) -> CmdResult {
    if is_stdio(path) {
        let mut out = io::stdout().lock();
        out.write_all(data)?;
        out.flush()?;
    } else {
        fs::write(path, data).map_err(|e| format!("Cannot write {}: {}", path.display(), e))?;
    }
    Ok(())
}

/// Reject offsets past the end of the chip before touching the bus
pub(crate) fn check_offset(capacity: u32, offset: u32) -> CmdResult {
    if offset > capacity {
        return Err(format!(
            "Offset 0x{:08X} is beyond the end of the flash (0x{:08X} bytes)",
            offset, capacity
        )
        .into());
    }
    Ok(())
}

/// Length of a range where 0 means "up to the end of the chip"
pub(crate) fn resolve_length(capacity: u32, offset: u32, length: u32) -> CmdResult<usize> {
    check_offset(capacity, offset)?;
    Ok(match length {
        0 => (capacity - offset) as usize,
        n => n as usize,
    })
}

/// Print flash size information
pub(crate) fn format_size(bytes: u32) -> String {
    if bytes >= 1024 * 1024 && bytes % (1024 * 1024) == 0 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 && bytes % 1024 == 0 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}
