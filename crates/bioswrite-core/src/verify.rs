//! Readback verification

use alloc::vec;

use crate::error::{Error, Result};
use crate::geometry::Geometry;
use crate::reader;
use crate::transport::Transport;

/// Read `[offset, offset + expected.len())` back and compare it byte-wise
///
/// Fails with `VerificationMismatch` naming the first differing address.
pub fn verify<T: Transport + ?Sized>(
    transport: &mut T,
    geometry: &Geometry,
    offset: u32,
    expected: &[u8],
) -> Result<()> {
    let mut found = vec![0u8; expected.len()];
    reader::read_into(transport, geometry, offset, &mut found)?;

    match first_mismatch(expected, &found) {
        None => Ok(()),
        Some(i) => {
            let err = Error::VerificationMismatch {
                offset: offset + i as u32,
                expected: expected[i],
                found: found[i],
            };
            log::warn!("{}", err);
            Err(err)
        }
    }
}

/// Index of the first byte where `a` and `b` differ
pub fn first_mismatch(a: &[u8], b: &[u8]) -> Option<usize> {
    a.iter().zip(b.iter()).position(|(x, y)| x != y)
}
