//! Configuration schema.
//!
//! A `SubsystemConfig` is deserialized from TOML.  Key material is written
//! hex or base64 encoded and decoded by `safereport_core::SecretKey`.
//!
//! Example:
//! ```toml
//! [chain]
//! active_key_id = "v1"
//! append_retries = 16
//!
//! [chain.keys]
//! v1 = "9f2c…"
//!
//! [pack]
//! active_key_id = "p1"
//! callback_token = "renderer-shared-secret"
//!
//! [pack.keys]
//! p1 = "cGFjay1zaWduaW5n…"
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

fn default_append_retries() -> u32 {
    16
}

fn default_freshness_window_secs() -> u64 {
    600
}

fn default_stale_timeout_secs() -> u64 {
    900
}

fn default_error_max_len() -> usize {
    500
}

/// Keys and retry budget for the evidence chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainSection {
    /// Key id used for new events.  Older ids stay in `keys` so history
    /// keeps verifying after a rotation.
    pub active_key_id: String,

    /// Compare-and-set attempts per append before giving up.
    #[serde(default = "default_append_retries")]
    pub append_retries: u32,

    /// Key id → encoded key material.
    pub keys: BTreeMap<String, String>,
}

/// Signing keys, timing and callback secret for defense packs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackSection {
    pub active_key_id: String,

    /// A queued pack younger than this is returned instead of a new one.
    #[serde(default = "default_freshness_window_secs")]
    pub freshness_window_secs: u64,

    /// Queued packs older than this are failed by the sweep.
    #[serde(default = "default_stale_timeout_secs")]
    pub stale_timeout_secs: u64,

    /// Recorded submission errors are cut to this many characters.
    #[serde(default = "default_error_max_len")]
    pub error_max_len: usize,

    /// Shared secret the renderer presents on completion callbacks.
    /// Without one every callback is rejected.
    #[serde(default)]
    pub callback_token: Option<String>,

    pub keys: BTreeMap<String, String>,
}

/// The top-level structure deserialized from a TOML configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubsystemConfig {
    pub chain: ChainSection,
    pub pack: PackSection,
}
