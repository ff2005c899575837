//! Derivation of the `x-cursor-checksum` header value from an access token.
//!
//! This reproduces the scheme observed on Cursor's own CLI traffic: a
//! half-hour-rounded, XOR-obfuscated timestamp prefix followed by two
//! SHA-256-derived hex segments taken from the token's JWT payload and the
//! full token string.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::Digest;
use sha2::Sha256;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

const ROUND_MS: u64 = 1_800_000;
const XOR_SEED: u8 = 165;

fn obfuscated_timestamp(now_ms: u64) -> [u8; 6] {
    let rounded_ms = now_ms - (now_ms % ROUND_MS);
    let timestamp = rounded_ms / 1_000_000;

    let mut bytes = [0u8; 6];
    let mut temp = timestamp;
    for b in bytes.iter_mut().rev() {
        *b = (temp & 0xff) as u8;
        temp >>= 8;
    }

    let mut key = XOR_SEED;
    for (i, b) in bytes.iter_mut().enumerate() {
        *b = (*b ^ key).wrapping_add(i as u8);
        key = *b;
    }
    bytes
}

fn sha256_hex8(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))[..8].to_string()
}

/// Compute the checksum header value for a given access token, using the
/// current wall-clock time rounded to the nearest 30-minute window.
pub fn generate_checksum(token: &str) -> String {
    generate_checksum_at(token, now_ms())
}

pub(crate) fn generate_checksum_at(token: &str, now_ms: u64) -> String {
    let parts: Vec<&str> = token.split('.').collect();
    let timestamp_bytes = obfuscated_timestamp(now_ms);

    let payload_hash = if parts.len() > 1 && !parts[1].is_empty() {
        sha256_hex8(parts[1].as_bytes())
    } else {
        "00000000".to_string()
    };
    let token_hash = sha256_hex8(token.as_bytes());

    format!(
        "{}{payload_hash}/{token_hash}",
        URL_SAFE_NO_PAD.encode(timestamp_bytes)
    )
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_stable_within_the_same_rounding_window() {
        let token = "header.payload123.sig";
        let a = generate_checksum_at(token, 1_800_000_000);
        let b = generate_checksum_at(token, 1_800_000_001);
        assert_eq!(a, b);
    }

    #[test]
    fn checksum_differs_across_rounding_windows() {
        let token = "header.payload123.sig";
        let a = generate_checksum_at(token, 0);
        let b = generate_checksum_at(token, ROUND_MS * 10);
        assert_ne!(a, b);
    }

    #[test]
    fn checksum_handles_token_without_dots() {
        let checksum = generate_checksum_at("opaque-api-key", 1_800_000_000);
        assert!(checksum.contains('/'));
    }
}
