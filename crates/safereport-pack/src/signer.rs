//! Pack snapshot signatures.
//!
//! A signature is HMAC-SHA256 over the canonical JSON of the
//! `PackSnapshot`, under a key from the pack ring.  Pack keys never share
//! material with chain keys, so a pack signature can not be replayed as a
//! chain link or the other way round.

use safereport_contracts::{error::EvidenceResult, pack::PackSnapshot};
use safereport_core::keyring::KeyRing;
use safereport_evidence::{canonical, hasher};

/// Signs and checks snapshots with the pack key ring.
#[derive(Debug, Clone)]
pub struct PackSigner {
    keys: KeyRing,
}

impl PackSigner {
    pub fn new(keys: KeyRing) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &KeyRing {
        &self.keys
    }

    /// Sign `snapshot` under the active key.
    ///
    /// Returns `(key_id, signature_hex)`.
    pub fn sign(&self, snapshot: &PackSnapshot) -> EvidenceResult<(String, String)> {
        let (key_id, key) = self.keys.active();
        let payload = canonical::encode_serializable(snapshot)?;
        let signature = hasher::mac_hex(key.as_bytes(), &[payload.as_bytes()])?;
        Ok((key_id.to_string(), signature))
    }

    /// Check `signature` over `snapshot` under `key_id`, in constant time.
    ///
    /// Returns `UnknownKey` if the ring no longer holds `key_id`.
    pub fn verify(
        &self,
        snapshot: &PackSnapshot,
        key_id: &str,
        signature: &str,
    ) -> EvidenceResult<bool> {
        let key = self.keys.get(key_id)?;
        let payload = canonical::encode_serializable(snapshot)?;
        hasher::verify_mac_hex(key.as_bytes(), &[payload.as_bytes()], signature)
    }
}
