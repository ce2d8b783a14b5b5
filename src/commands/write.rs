//! Write command implementation

use bioswrite_core::{FlashDevice, Transport, WriteReport};
use std::path::PathBuf;

use super::progress::IndicatifProgress;
use super::{check_offset, read_input, CmdResult};

/// Arguments of the write command
#[derive(Debug, Clone)]
pub struct WriteArgs {
    pub input: PathBuf,
    pub offset: u32,
    /// Exact input length required, if given and non-zero
    pub length: Option<u32>,
    pub force: bool,
    pub no_verify: bool,
}

/// Run the write command
pub fn run_write<T: Transport>(device: &mut FlashDevice<T>, args: &WriteArgs) -> CmdResult {
    let data = read_input(&args.input)?;
    write_data(device, &data, args)?;
    Ok(())
}

/// Program `data` as described by `args`
pub fn write_data<T: Transport>(
    device: &mut FlashDevice<T>,
    data: &[u8],
    args: &WriteArgs,
) -> CmdResult<WriteReport> {
    if let Some(expected) = args.length.filter(|&n| n != 0) {
        if data.len() != expected as usize {
            return Err(format!("Read {} bytes, expected {}", data.len(), expected).into());
        }
    }
    check_offset(device.capacity(), args.offset)?;

    let mut options = device.default_options();
    options.force = args.force;
    if args.no_verify {
        options.verify = false;
    }
    log::info!(
        "Writing {} bytes at 0x{:08X}{}{}",
        data.len(),
        args.offset,
        if options.force { " (forced)" } else { "" },
        if options.verify { "" } else { " without verification" }
    );

    let mut progress = IndicatifProgress::new("Writing");
    let report = device.write_with_progress(args.offset, data, &options, &mut progress)?;
    Ok(report)
}
