//! Info command implementation

use bioswrite_core::{FlashDevice, Transport};

use super::{format_size, CmdResult};

/// Print the chip ID and geometry
pub fn run_info<T: Transport>(device: &mut FlashDevice<T>) -> CmdResult {
    let id = device.jedec_id();
    let geometry = *device.geometry();

    println!("JEDEC ID:    {:02X} {:04X}", id.manufacturer, id.device);
    println!(
        "Flash size:  {} bytes ({})",
        geometry.capacity,
        format_size(geometry.capacity)
    );
    println!("Page size:   {}", format_size(geometry.page_size));
    println!("Erase block: {}", format_size(device.erase_size(0)));
    println!(
        "Verify:      {}",
        if device.config().verify { "on" } else { "off" }
    );

    Ok(())
}
