//! # safereport-config
//!
//! TOML configuration for the evidence integrity subsystem.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use safereport_config::Settings;
//!
//! let settings = Settings::from_file(Path::new("safereport.toml"))?;
//! let chain = EvidenceChain::new(store, settings.chain_keyring().clone(), clock)
//!     .with_max_attempts(settings.append_attempts());
//! ```
//!
//! ## Keys
//!
//! Chain keys MAC evidence events; pack keys sign defense pack snapshots.
//! The two rings must hold different material.

pub mod schema;
pub mod settings;

pub use schema::{ChainSection, PackSection, SubsystemConfig};
pub use settings::{PackTiming, Settings};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use safereport_contracts::error::EvidenceError;

    use crate::{PackTiming, Settings};

    const CHAIN_HEX: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";
    const PACK_B64: &str = "cGFjay1zaWduaW5nLWtleS0wMDAwMDAwMQ==";

    fn config(chain_extra: &str, pack_extra: &str) -> String {
        format!(
            r#"
            [chain]
            active_key_id = "v1"
            {chain_extra}

            [chain.keys]
            v1 = "{CHAIN_HEX}"

            [pack]
            active_key_id = "p1"
            {pack_extra}

            [pack.keys]
            p1 = "{PACK_B64}"
            "#
        )
    }

    fn assert_config_error(result: Result<Settings, EvidenceError>, needle: &str) {
        match result {
            Err(EvidenceError::ConfigError { reason }) => {
                assert!(reason.contains(needle), "unexpected reason: {reason}")
            }
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    // ── 1. defaults ───────────────────────────────────────────────────────────

    /// A minimal file gets the 10 minute window, 15 minute timeout and
    /// 500 character error cap.
    #[test]
    fn test_minimal_config_uses_defaults() {
        let settings = Settings::from_toml_str(&config("", "")).unwrap();

        assert_eq!(settings.pack_timing(), PackTiming::default());
        assert_eq!(settings.pack_timing().freshness_window, Duration::minutes(10));
        assert_eq!(settings.pack_timing().stale_timeout, Duration::minutes(15));
        assert_eq!(settings.append_attempts(), 16);
        assert_eq!(settings.callback_token(), None);
        assert_eq!(settings.chain_keyring().active_id(), "v1");
        assert_eq!(settings.pack_keyring().active_id(), "p1");
    }

    // ── 2. overrides and encodings ────────────────────────────────────────────

    #[test]
    fn test_overrides_and_key_encodings() {
        let settings = Settings::from_toml_str(&config(
            "append_retries = 4",
            r#"freshness_window_secs = 60
            stale_timeout_secs = 120
            error_max_len = 80
            callback_token = "renderer-secret""#,
        ))
        .unwrap();

        assert_eq!(settings.append_attempts(), 4);
        assert_eq!(settings.pack_timing().freshness_window, Duration::seconds(60));
        assert_eq!(settings.pack_timing().stale_timeout, Duration::seconds(120));
        assert_eq!(settings.pack_timing().error_max_len, 80);
        assert_eq!(settings.callback_token(), Some("renderer-secret"));

        // Hex decodes to 32 bytes, base64 to the 25 byte phrase.
        assert_eq!(settings.chain_keyring().active().1.as_bytes().len(), 32);
        assert_eq!(
            settings.pack_keyring().active().1.as_bytes(),
            b"pack-signing-key-00000001"
        );
    }

    /// Retired key ids stay resolvable after rotation.
    #[test]
    fn test_rotated_chain_keys() {
        let toml = config("", "").replace(
            r#"active_key_id = "v1""#,
            r#"active_key_id = "v2""#,
        ).replace(
            &format!(r#"v1 = "{CHAIN_HEX}""#),
            &format!(
                r#"v1 = "{CHAIN_HEX}"
            v2 = "{}""#,
                "ff".repeat(32)
            ),
        );

        let settings = Settings::from_toml_str(&toml).unwrap();
        let ring = settings.chain_keyring();
        assert_eq!(ring.active_id(), "v2");
        assert!(ring.get("v1").is_ok());
        assert_eq!(ring.key_ids().collect::<Vec<_>>(), vec!["v1", "v2"]);
    }

    // ── 3. validation ─────────────────────────────────────────────────────────

    #[test]
    fn test_missing_active_key_is_rejected() {
        let toml = config("", "").replace(r#"active_key_id = "p1""#, r#"active_key_id = "p9""#);
        assert_config_error(Settings::from_toml_str(&toml), "p9");
    }

    #[test]
    fn test_short_key_is_rejected() {
        let toml = config("", "").replace(PACK_B64, "c2hvcnQ=");
        assert_config_error(Settings::from_toml_str(&toml), "pack.keys");
    }

    #[test]
    fn test_shared_key_material_is_rejected() {
        let toml = config("", "").replace(PACK_B64, CHAIN_HEX);
        assert_config_error(Settings::from_toml_str(&toml), "must not share");
    }

    #[test]
    fn test_zero_windows_are_rejected() {
        assert_config_error(
            Settings::from_toml_str(&config("", "stale_timeout_secs = 0")),
            "stale_timeout_secs",
        );
        assert_config_error(
            Settings::from_toml_str(&config("", "freshness_window_secs = 0")),
            "freshness_window_secs",
        );
        assert_config_error(
            Settings::from_toml_str(&config("append_retries = 0", "")),
            "append_retries",
        );
    }

    #[test]
    fn test_blank_callback_token_is_rejected() {
        assert_config_error(
            Settings::from_toml_str(&config("", r#"callback_token = "  ""#)),
            "callback_token",
        );
    }

    // ── 4. parse and read failures ────────────────────────────────────────────

    #[test]
    fn test_malformed_toml_is_config_error() {
        assert_config_error(Settings::from_toml_str("[chain"), "failed to parse");
        assert_config_error(
            Settings::from_toml_str(&config("unexpected = true", "")),
            "failed to parse",
        );
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = Settings::from_file(std::path::Path::new("/nonexistent/safereport.toml"));
        assert_config_error(result, "failed to read");
    }

    /// The callback token never appears in debug output.
    #[test]
    fn test_debug_redacts_token() {
        let settings =
            Settings::from_toml_str(&config("", r#"callback_token = "renderer-secret""#)).unwrap();
        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("renderer-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
