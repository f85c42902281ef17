//! Validated settings built from a `SubsystemConfig`.
//!
//! `Settings::from_toml_str` / `from_file` parse, decode key material and
//! validate in one step.  Validation rules:
//!
//! 1. Each section's `active_key_id` names one of its keys.
//! 2. Every key decodes (hex, then base64) to at least `MIN_KEY_LEN` bytes.
//! 3. The chain and pack rings never share key material.
//! 4. Windows, timeouts, retry budgets and the error cap are non-zero.
//! 5. A configured callback token is not blank.

use std::{collections::BTreeMap, fmt, path::Path};

use chrono::Duration;
use tracing::debug;

use safereport_contracts::error::{EvidenceError, EvidenceResult};
use safereport_core::keyring::{KeyRing, SecretKey};

use crate::schema::SubsystemConfig;

/// Timing and size limits for the pack pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackTiming {
    pub freshness_window: Duration,
    pub stale_timeout: Duration,
    pub error_max_len: usize,
}

impl Default for PackTiming {
    fn default() -> Self {
        Self {
            freshness_window: Duration::minutes(10),
            stale_timeout: Duration::minutes(15),
            error_max_len: 500,
        }
    }
}

/// Decoded, validated configuration.
#[derive(Clone)]
pub struct Settings {
    chain_keys: KeyRing,
    append_attempts: u32,
    pack_keys: KeyRing,
    pack_timing: PackTiming,
    callback_token: Option<String>,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("chain_keys", &self.chain_keys)
            .field("append_attempts", &self.append_attempts)
            .field("pack_keys", &self.pack_keys)
            .field("pack_timing", &self.pack_timing)
            .field("callback_token", &self.callback_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn config_error(reason: impl Into<String>) -> EvidenceError {
    EvidenceError::ConfigError {
        reason: reason.into(),
    }
}

fn keyring(
    section: &str,
    active: &str,
    keys: &BTreeMap<String, String>,
) -> EvidenceResult<KeyRing> {
    let mut decoded = Vec::with_capacity(keys.len());
    for (id, encoded) in keys {
        let key = SecretKey::from_encoded(encoded).map_err(|e| {
            config_error(format!("[{section}.keys] entry '{id}': {e}"))
        })?;
        decoded.push((id.clone(), key));
    }
    KeyRing::new(active, decoded).map_err(|e| config_error(format!("[{section}] {e}")))
}

fn seconds(field: &str, secs: u64) -> EvidenceResult<Duration> {
    if secs == 0 {
        return Err(config_error(format!("{field} must be greater than zero")));
    }
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| config_error(format!("{field} is out of range")))
}

impl Settings {
    /// Parse `s` as TOML and validate it.
    ///
    /// Returns `EvidenceError::ConfigError` if the TOML is malformed, does
    /// not match `SubsystemConfig`, or fails validation.
    pub fn from_toml_str(s: &str) -> EvidenceResult<Self> {
        let config: SubsystemConfig = toml::from_str(s)
            .map_err(|e| config_error(format!("failed to parse configuration TOML: {e}")))?;
        Self::from_config(&config)
    }

    /// Read the file at `path` and parse it as TOML configuration.
    pub fn from_file(path: &Path) -> EvidenceResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            config_error(format!(
                "failed to read configuration file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_config(config: &SubsystemConfig) -> EvidenceResult<Self> {
        let chain_keys = keyring("chain", &config.chain.active_key_id, &config.chain.keys)?;
        let pack_keys = keyring("pack", &config.pack.active_key_id, &config.pack.keys)?;

        if chain_keys.shares_material_with(&pack_keys) {
            return Err(config_error(
                "chain and pack keys must not share key material",
            ));
        }

        if config.chain.append_retries == 0 {
            return Err(config_error("append_retries must be greater than zero"));
        }
        if config.pack.error_max_len == 0 {
            return Err(config_error("error_max_len must be greater than zero"));
        }

        let pack_timing = PackTiming {
            freshness_window: seconds("freshness_window_secs", config.pack.freshness_window_secs)?,
            stale_timeout: seconds("stale_timeout_secs", config.pack.stale_timeout_secs)?,
            error_max_len: config.pack.error_max_len,
        };

        let callback_token = match &config.pack.callback_token {
            Some(token) if token.trim().is_empty() => {
                return Err(config_error("callback_token must not be blank"))
            }
            other => other.clone(),
        };

        debug!(
            chain_key = chain_keys.active_id(),
            pack_key = pack_keys.active_id(),
            callback_token = callback_token.is_some(),
            "configuration loaded"
        );

        Ok(Self {
            chain_keys,
            append_attempts: config.chain.append_retries,
            pack_keys,
            pack_timing,
            callback_token,
        })
    }

    pub fn chain_keyring(&self) -> &KeyRing {
        &self.chain_keys
    }

    pub fn append_attempts(&self) -> u32 {
        self.append_attempts
    }

    pub fn pack_keyring(&self) -> &KeyRing {
        &self.pack_keys
    }

    pub fn pack_timing(&self) -> PackTiming {
        self.pack_timing
    }

    pub fn callback_token(&self) -> Option<&str> {
        self.callback_token.as_deref()
    }
}
