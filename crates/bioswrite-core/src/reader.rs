//! Bounded linear reads

use crate::error::{Error, Result};
use crate::geometry::Geometry;
use crate::transport::Transport;

/// Fill `buf` with the device contents starting at `offset`
///
/// The range is checked against the geometry before any bus command is
/// issued. Reads may cross page boundaries freely; they are split only to
/// respect the transport's transfer limit. On error the contents of `buf`
/// are unspecified.
pub fn read_into<T: Transport + ?Sized>(
    transport: &mut T,
    geometry: &Geometry,
    offset: u32,
    buf: &mut [u8],
) -> Result<()> {
    geometry.check_range(offset, buf.len())?;

    let max_len = transport.max_read_len().max(1);
    log::trace!("read 0x{:08X}+0x{:X} in chunks of {}", offset, buf.len(), max_len);

    for (i, chunk) in buf.chunks_mut(max_len).enumerate() {
        let addr = offset + (i * max_len) as u32;
        transport
            .read_bytes(addr, chunk)
            .map_err(|fault| Error::Transport { fault, addr })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeTransport;

    fn geometry() -> Geometry {
        Geometry {
            capacity: 0x10_0000,
            page_size: 256,
            erase_size: 4096,
        }
    }

    #[test]
    fn test_read_crosses_pages() {
        let mut t = FakeTransport::new(0x10_0000);
        for (i, byte) in t.data[0xF0..0x210].iter_mut().enumerate() {
            *byte = i as u8;
        }
        let mut buf = [0u8; 0x120];
        read_into(&mut t, &geometry(), 0xF0, &mut buf).unwrap();
        assert_eq!(buf[0], 0);
        assert_eq!(buf[0x11F], 0x1F);
    }

    #[test]
    fn test_read_is_chunked() {
        let mut t = FakeTransport::new(0x10_0000);
        let mut buf = [0u8; 2500];
        read_into(&mut t, &geometry(), 0, &mut buf).unwrap();
        // FakeTransport allows 1024 bytes per read
        assert_eq!(t.reads, 3);
    }

    #[test]
    fn test_out_of_range_issues_no_commands() {
        let mut t = FakeTransport::new(0x10_0000);
        let mut buf = [0u8; 16];
        let err = read_into(&mut t, &geometry(), 0xF_FFF8, &mut buf).unwrap_err();
        assert_eq!(
            err,
            Error::OutOfRange {
                offset: 0xF_FFF8,
                len: 16,
                capacity: 0x10_0000
            }
        );
        assert_eq!(t.bus_commands(), 0);
    }

    #[test]
    fn test_read_up_to_end() {
        let mut t = FakeTransport::new(0x10_0000);
        let mut buf = [0u8; 8];
        read_into(&mut t, &geometry(), 0xF_FFF8, &mut buf).unwrap();
        assert_eq!(buf, [0xFF; 8]);
    }

    #[test]
    fn test_transport_error_carries_address() {
        let mut t = FakeTransport::new(0x10_0000);
        t.dead_bus = true;
        let mut buf = [0u8; 4];
        let err = read_into(&mut t, &geometry(), 0x4000, &mut buf).unwrap_err();
        assert_eq!(
            err,
            Error::Transport {
                fault: crate::TransportFault::TransferFailed,
                addr: 0x4000
            }
        );
    }
}
