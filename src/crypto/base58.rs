//! # Base58
//!
//! A small internal base58 codec (Bitcoin alphabet) rather than a
//! dependency on the `bs58` crate. The wire format's `encryptedData` field
//! and `generateId` both depend on base58's specific leading-zero handling
//! (each leading zero byte becomes a leading `'1'`), so the codec is kept
//! in-crate where its exact behavior is easy to pin down and test.

use crate::error::{Error, Result};

const ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Encode `bytes` as a base58 string.
///
/// Each leading zero byte in the input becomes a leading `'1'` in the
/// output, matching the conventional Bitcoin base58 encoding.
pub fn encode(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return String::new();
    }

    let leading_zeros = bytes.iter().take_while(|&&b| b == 0).count();

    // big-endian base-256 -> base-58 conversion via repeated division
    let mut digits: Vec<u8> = vec![0];
    for &byte in bytes {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            carry += (*digit as u32) << 8;
            *digit = (carry % 58) as u8;
            carry /= 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }

    let mut out = String::with_capacity(leading_zeros + digits.len());
    out.extend(std::iter::repeat('1').take(leading_zeros));
    out.extend(digits.iter().rev().map(|&d| ALPHABET[d as usize] as char));
    out
}

/// Decode a base58 string back into bytes.
pub fn decode(s: &str) -> Result<Vec<u8>> {
    if s.is_empty() {
        return Ok(Vec::new());
    }

    let leading_ones = s.chars().take_while(|&c| c == '1').count();

    let mut bytes: Vec<u8> = vec![0];
    for c in s.chars() {
        let value = ALPHABET
            .iter()
            .position(|&a| a as char == c)
            .ok_or_else(|| Error::Base58Invalid(format!("invalid base58 character: {c:?}")))?;

        let mut carry = value as u32;
        for byte in bytes.iter_mut() {
            carry += (*byte as u32) * 58;
            *byte = (carry & 0xFF) as u8;
            carry >>= 8;
        }
        while carry > 0 {
            bytes.push((carry & 0xFF) as u8);
            carry >>= 8;
        }
    }

    let mut out = vec![0u8; leading_ones];
    out.extend(bytes.iter().rev());
    Ok(out)
}
