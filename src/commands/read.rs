//! Read command implementation

use bioswrite_core::{FlashDevice, Transport};
use std::path::Path;

use super::progress::create_progress_bar_with_phase;
use super::{is_stdio, resolve_length, write_output, CmdResult};
use crate::cli::RangeArgs;

/// Chunk size for reading (4 KiB)
const READ_CHUNK_SIZE: usize = 4096;

/// Run the read command
pub fn run_read<T: Transport>(
    device: &mut FlashDevice<T>,
    output: &Path,
    range: RangeArgs,
) -> CmdResult {
    let len = resolve_length(device.capacity(), range.offset, range.length)?;
    let data = read_flash_with_progress(device, range.offset, len)?;
    write_output(output, &data)?;

    if is_stdio(output) {
        log::info!("Read {} bytes from 0x{:08X}", data.len(), range.offset);
    } else {
        println!(
            "Read {} bytes from 0x{:08X} to {}",
            data.len(),
            range.offset,
            output.display()
        );
    }
    Ok(())
}

/// Read `len` bytes starting at `offset` with a progress bar
pub fn read_flash_with_progress<T: Transport>(
    device: &mut FlashDevice<T>,
    offset: u32,
    len: usize,
) -> CmdResult<Vec<u8>> {
    // Range errors surface before the bar is drawn
    device.geometry().check_range(offset, len)?;
    let mut data = vec![0u8; len];

    let pb = create_progress_bar_with_phase(len as u64, "Reading");
    for (i, chunk) in data.chunks_mut(READ_CHUNK_SIZE).enumerate() {
        let addr = offset + (i * READ_CHUNK_SIZE) as u32;
        if let Err(e) = device.read_into(addr, chunk) {
            pb.abandon_with_message("failed");
            return Err(e.into());
        }
        pb.inc(chunk.len() as u64);
    }
    pb.finish_with_message("done");

    Ok(data)
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use bioswrite_core::{open_device, Error, Spi25Transport};
    use bioswrite_dummy::{DummyConfig, DummyFlash};

    fn device() -> FlashDevice<Spi25Transport<DummyFlash>> {
        let mut flash = DummyFlash::new(DummyConfig::with_size(0x1_0000));
        for (i, b) in flash.data_mut().iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        open_device(Spi25Transport::new(flash)).unwrap()
    }

    #[test]
    fn test_read_crosses_chunks() {
        let mut device = device();
        let data = read_flash_with_progress(&mut device, 0xF00, 0x2345).unwrap();
        let expected: Vec<u8> = (0xF00..0xF00 + 0x2345).map(|i| (i % 251) as u8).collect();
        assert_eq!(data, expected);
    }

    #[test]
    fn test_read_to_end_of_chip() {
        let mut device = device();
        let len = resolve_length(device.capacity(), 0xFF00, 0).unwrap();
        let data = read_flash_with_progress(&mut device, 0xFF00, len).unwrap();
        assert_eq!(data.len(), 0x100);
    }

    #[test]
    fn test_read_out_of_range() {
        let mut device = device();
        let err = read_flash_with_progress(&mut device, 0xFF00, 0x200).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::OutOfRange { .. })
        ));
        assert_eq!(device.transport().master().counts().read, 0);
    }
}
