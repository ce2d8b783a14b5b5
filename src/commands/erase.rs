//! Erase command implementation

use bioswrite_core::{FlashDevice, Transport, WriteReport};

use super::progress::IndicatifProgress;
use super::{resolve_length, CmdResult};
use crate::cli::RangeArgs;

/// Run the erase command
pub fn run_erase<T: Transport>(device: &mut FlashDevice<T>, range: RangeArgs) -> CmdResult {
    erase_range(device, range)?;
    println!("Erase complete");
    Ok(())
}

fn erase_range<T: Transport>(device: &mut FlashDevice<T>, range: RangeArgs) -> CmdResult<WriteReport> {
    let len = resolve_length(device.capacity(), range.offset, range.length)?;
    log::info!("Erasing 0x{:X} bytes at 0x{:08X}", len, range.offset);

    let mut progress = IndicatifProgress::new("Erasing");
    Ok(device.erase_with_progress(range.offset, len, &mut progress)?)
}
