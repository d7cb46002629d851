//! Draining a byte stream into memory without trusting its size.
//!
//! The size hint only pre-sizes the buffer. Growth is bounded by an
//! explicit ceiling that is checked before every reservation, so an
//! oversized or endless stream turns into `CryptFileError::Oversize`
//! instead of an allocation abort.

use std::io::{ErrorKind, Read};

use tracing::{trace, warn};

use crate::core::errors::{CryptFileError, Result};

/// Reported sizes at or above this are ignored as a hint.
pub const SIZE_HINT_CEILING: u64 = 1_000_000_000;

/// Smallest amount of spare capacity offered to each `read` call.
pub const MIN_READ: usize = 512;

/// Turn a reported file size into a usable hint.
///
/// Unknown sizes and sizes at or above [`SIZE_HINT_CEILING`] become 0.
pub fn size_hint(reported: Option<u64>) -> u64 {
    match reported {
        Some(size) if size < SIZE_HINT_CEILING => size,
        Some(size) => {
            warn!(size, "ignoring implausible size hint");
            0
        }
        None => 0,
    }
}

/// Initial capacity for a buffer expected to hold `hint` bytes.
///
/// One [`MIN_READ`] of headroom lets the final zero-length read happen
/// without a reallocation when the hint is exact.
pub fn initial_capacity(hint: u64, max: usize) -> usize {
    usize::try_from(hint)
        .unwrap_or(usize::MAX)
        .saturating_add(MIN_READ)
        .min(max)
}

/// Read `reader` to end-of-stream into a buffer pre-sized from `hint`.
///
/// Content longer than `max` bytes fails with `Oversize`; nothing read
/// so far is returned in that case. End-of-stream is success, so an
/// empty stream yields an empty buffer.
pub fn read_all_bounded<R: Read + ?Sized>(reader: &mut R, hint: u64, max: usize) -> Result<Vec<u8>> {
    let mut buf: Vec<u8> = Vec::new();
    buf.try_reserve_exact(initial_capacity(hint, max))
        .map_err(|_| CryptFileError::Oversize { limit: max })?;

    // `buf.len()` is the zeroed prefix; only `buf[..filled]` holds data.
    let mut filled = 0;

    loop {
        if filled >= max {
            // Full to the ceiling: only a clean end-of-stream is acceptable.
            let mut extra = [0u8; 1];
            match reader.read(&mut extra) {
                Ok(0) => break,
                Ok(_) => return Err(CryptFileError::Oversize { limit: max }),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(source) => return Err(CryptFileError::Read { source }),
            }
        }

        if filled == buf.len() {
            if buf.len() == buf.capacity() {
                let additional = buf.capacity().max(MIN_READ).min(max - filled);
                trace!(len = filled, additional, "growing read buffer");
                buf.try_reserve_exact(additional)
                    .map_err(|_| CryptFileError::Oversize { limit: max })?;
            }
            // Zero the fresh tail once; later reads reuse it.
            buf.resize(buf.capacity().min(max), 0);
        }

        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(source) => return Err(CryptFileError::Read { source }),
        }
    }

    buf.truncate(filled);
    Ok(buf)
}
