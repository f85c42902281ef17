//! Keyed-hash key material, indexed by key id.
//!
//! Every event and every pack records the id of the key it was hashed or
//! signed under.  Rotating keys means adding a new id and making it active;
//! old ids stay in the ring so historical records keep verifying.

use std::{collections::BTreeMap, fmt};

use base64::Engine;

use safereport_contracts::error::{EvidenceError, EvidenceResult};

/// Shortest key accepted, in bytes.
pub const MIN_KEY_LEN: usize = 16;

/// Raw key bytes.  `Debug` never prints the material.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(Vec<u8>);

impl SecretKey {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> EvidenceResult<Self> {
        let bytes = bytes.into();
        if bytes.len() < MIN_KEY_LEN {
            return Err(EvidenceError::ConfigError {
                reason: format!(
                    "key material must be at least {MIN_KEY_LEN} bytes, got {}",
                    bytes.len()
                ),
            });
        }
        Ok(Self(bytes))
    }

    /// Decode key material given as hex (tried first) or standard base64.
    pub fn from_encoded(encoded: &str) -> EvidenceResult<Self> {
        let trimmed = encoded.trim();
        if trimmed.is_empty() {
            return Err(EvidenceError::ConfigError {
                reason: "key material is empty".to_string(),
            });
        }
        if trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
            if let Ok(bytes) = hex::decode(trimmed) {
                return Self::from_bytes(bytes);
            }
        }
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(trimmed)
            .map_err(|e| EvidenceError::ConfigError {
                reason: format!("key material is neither hex nor base64: {e}"),
            })?;
        Self::from_bytes(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey(<{} bytes>)", self.0.len())
    }
}

/// A set of keys with one designated for new hashes or signatures.
#[derive(Debug, Clone)]
pub struct KeyRing {
    active: String,
    keys: BTreeMap<String, SecretKey>,
}

impl KeyRing {
    /// Build a ring; `active_key_id` must be one of `keys`.
    pub fn new(
        active_key_id: impl Into<String>,
        keys: impl IntoIterator<Item = (String, SecretKey)>,
    ) -> EvidenceResult<Self> {
        let active = active_key_id.into();
        let keys: BTreeMap<String, SecretKey> = keys.into_iter().collect();
        if !keys.contains_key(&active) {
            return Err(EvidenceError::ConfigError {
                reason: format!("active key id '{active}' is not in the key ring"),
            });
        }
        Ok(Self { active, keys })
    }

    /// A ring holding exactly one key.
    pub fn single(key_id: impl Into<String>, key: SecretKey) -> Self {
        let key_id = key_id.into();
        let mut keys = BTreeMap::new();
        keys.insert(key_id.clone(), key);
        Self {
            active: key_id,
            keys,
        }
    }

    pub fn active_id(&self) -> &str {
        &self.active
    }

    /// The active key id and its material.
    pub fn active(&self) -> (&str, &SecretKey) {
        // `new` and `single` guarantee the active id is present.
        (&self.active, &self.keys[&self.active])
    }

    pub fn get(&self, key_id: &str) -> EvidenceResult<&SecretKey> {
        self.keys.get(key_id).ok_or_else(|| EvidenceError::UnknownKey {
            key_id: key_id.to_string(),
        })
    }

    pub fn key_ids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    /// True if any key in `self` has the same material as any key in `other`.
    pub fn shares_material_with(&self, other: &KeyRing) -> bool {
        self.keys
            .values()
            .any(|a| other.keys.values().any(|b| a == b))
    }
}
