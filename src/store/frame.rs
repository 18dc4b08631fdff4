//! Length-prefixed frame codec
//!
//! ```text
//! [i32 LE length][MessagePack payload]
//! ```

use super::error::{Result, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{ErrorKind, Read, Write};

/// Size of the length prefix in bytes
pub const PREFIX_LEN: usize = 4;

/// Outcome of reading a length prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Prefix {
    /// A complete prefix announcing a payload of this many bytes
    Frame(usize),
    /// Fewer than four bytes remained; `partial` of them were consumed
    End { partial: usize },
}

/// Read a length prefix starting at `offset`
///
/// Running out of bytes is the normal end of a data file, not an error.
pub(crate) fn read_prefix<R: Read>(reader: &mut R, offset: u64) -> Result<Prefix> {
    let mut buf = [0u8; PREFIX_LEN];
    let mut filled = 0;

    while filled < PREFIX_LEN {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Ok(Prefix::End { partial: filled }),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    let len = i32::from_le_bytes(buf);
    if len < 0 {
        return Err(StoreError::MalformedFrame {
            offset,
            reason: format!("negative length prefix {}", len),
        });
    }

    Ok(Prefix::Frame(len as usize))
}

/// Read and decode a payload of `len` bytes
pub(crate) fn read_payload<R: Read, T: DeserializeOwned>(
    reader: &mut R,
    len: usize,
    offset: u64,
) -> Result<T> {
    // Grow with the data actually present; a corrupt prefix can claim 2 GiB
    let mut payload = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut payload)?;
    if payload.len() < len {
        return Err(StoreError::MalformedFrame {
            offset,
            reason: format!("truncated payload, expected {} bytes", len),
        });
    }

    Ok(rmp_serde::from_slice(&payload)?)
}

/// Encode `value` and append it as one frame, returning the bytes written
pub(crate) fn write_frame<W: Write, T: Serialize>(writer: &mut W, value: &T) -> Result<usize> {
    let payload = rmp_serde::to_vec_named(value)?;
    let len = i32::try_from(payload.len()).map_err(|_| StoreError::FrameTooLarge(payload.len()))?;

    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;

    Ok(PREFIX_LEN + payload.len())
}
