//! # Compression
//!
//! Optional raw-deflate compression of plaintext before encryption, used
//! when the caller opts in via envelope metadata. Backed by `miniz_oxide`
//! rather than a libz binding, matching the rest of this crate's preference
//! for pure-Rust dependencies.

use miniz_oxide::deflate::compress_to_vec;
use miniz_oxide::inflate::decompress_to_vec;

use crate::error::Error;
use crate::Result;

const COMPRESSION_LEVEL: u8 = 6;

/// Compress `data` with raw deflate.
pub fn compress(data: &[u8]) -> Vec<u8> {
    compress_to_vec(data, COMPRESSION_LEVEL)
}

/// Decompress a raw deflate stream produced by [`compress`].
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    decompress_to_vec(data).map_err(|e| Error::ImportInvalid(format!("decompression failed: {e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_decompress_round_trip() {
        let data = b"the quick brown fox jumps over the lazy dog ".repeat(20);
        let compressed = compress(&data);
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn test_compress_shrinks_repetitive_data() {
        let data = vec![b'a'; 4096];
        let compressed = compress(&data);
        assert!(compressed.len() < data.len());
    }

    #[test]
    fn test_decompress_rejects_garbage() {
        let err = decompress(&[0xFF, 0xFF, 0xFF, 0xFF]).unwrap_err();
        assert_eq!(err.kind_tag(), "ImportInvalid");
    }
}
