//! Keyed hashing for chain links.
//!
//! Hash input layout (bytes, in order):
//!   1. prev_hash as UTF-8 hex, or nothing for the genesis event
//!   2. the single byte `|`
//!   3. canonical JSON of the event's hashed fields
//!
//! The MAC is HMAC-SHA256 under the key named by the event's `key_id`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use safereport_contracts::error::{EvidenceError, EvidenceResult};

type HmacSha256 = Hmac<Sha256>;

/// Scheme identifier recorded on every chain record.
pub const CHAIN_ALGO: &str = "HMAC-SHA256/canonical-json-v1";

/// Compute the link hash for one event.
///
/// Returns a lowercase 64-character hex string.
pub fn hash_event(
    prev_hash: Option<&str>,
    canonical_payload: &str,
    key: &[u8],
) -> EvidenceResult<String> {
    mac_hex(
        key,
        &[
            prev_hash.unwrap_or("").as_bytes(),
            b"|",
            canonical_payload.as_bytes(),
        ],
    )
}

/// HMAC-SHA256 over the concatenation of `parts`, hex encoded.
pub fn mac_hex(key: &[u8], parts: &[&[u8]]) -> EvidenceResult<String> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| EvidenceError::ConfigError {
        reason: format!("unusable HMAC key: {e}"),
    })?;
    for part in parts {
        mac.update(part);
    }
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a hex MAC in constant time.
pub fn verify_mac_hex(key: &[u8], parts: &[&[u8]], expected_hex: &str) -> EvidenceResult<bool> {
    let Ok(expected) = hex::decode(expected_hex) else {
        return Ok(false);
    };
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| EvidenceError::ConfigError {
        reason: format!("unusable HMAC key: {e}"),
    })?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac.verify_slice(&expected).is_ok())
}
