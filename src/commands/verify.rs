//! Verify command implementation

use bioswrite_core::{FlashDevice, Transport};
use std::path::Path;

use super::progress::create_progress_bar_with_phase;
use super::{check_offset, read_input, CmdResult};

/// Chunk size for verification
const VERIFY_CHUNK_SIZE: usize = 4096;

/// Run the verify command
pub fn run_verify<T: Transport>(
    device: &mut FlashDevice<T>,
    input: &Path,
    offset: u32,
) -> CmdResult {
    let expected = read_input(input)?;
    verify_flash(device, offset, &expected)?;
    println!("Verification passed!");
    Ok(())
}

/// Compare the flash at `offset` with `expected`
pub fn verify_flash<T: Transport>(
    device: &mut FlashDevice<T>,
    offset: u32,
    expected: &[u8],
) -> CmdResult {
    check_offset(device.capacity(), offset)?;
    device.geometry().check_range(offset, expected.len())?;

    let pb = create_progress_bar_with_phase(expected.len() as u64, "Verifying");
    for (i, chunk) in expected.chunks(VERIFY_CHUNK_SIZE).enumerate() {
        let addr = offset + (i * VERIFY_CHUNK_SIZE) as u32;
        if let Err(e) = device.verify(addr, chunk) {
            pb.abandon_with_message("Verification failed!");
            return Err(e.into());
        }
        pb.inc(chunk.len() as u64);
    }
    pb.finish_with_message("Verification passed");

    Ok(())
}
