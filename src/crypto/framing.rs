//! # Frame Helpers
//!
//! Small helpers for concatenating and splitting the fixed-width sections
//! that make up an envelope's binary frame (salt, key id, signature, iv,
//! tag, ciphertext, ...).

use crate::error::{Error, Result};

/// Concatenate a sequence of byte slices into one buffer.
pub fn combine_buffers(parts: &[&[u8]]) -> Vec<u8> {
    let total: usize = parts.iter().map(|p| p.len()).sum();
    let mut out = Vec::with_capacity(total);
    for part in parts {
        out.extend_from_slice(part);
    }
    out
}

/// Split `buf` into consecutive chunks of the given `widths`, plus one
/// trailing slice holding whatever remains after the last fixed width.
/// The trailing slice is always present, even if empty.
pub fn split_buffer<'a>(buf: &'a [u8], widths: &[usize]) -> Result<Vec<&'a [u8]>> {
    let mut out = Vec::with_capacity(widths.len() + 1);
    let mut rest = buf;
    for (i, &width) in widths.iter().enumerate() {
        if rest.len() < width {
            return Err(Error::FrameTruncated(format!(
                "frame section {i} expected {width} bytes, only {} remained",
                rest.len()
            )));
        }
        let (head, tail) = rest.split_at(width);
        out.push(head);
        rest = tail;
    }
    out.push(rest);
    Ok(out)
}
