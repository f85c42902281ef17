//! Error types for the evidence integrity subsystem.
//!
//! Integrity findings (a broken chain, a missing chain record) are NOT
//! errors: they are reported in-band in `VerifyResult`.  `EvidenceError`
//! covers invalid input, storage and queue faults, and configuration
//! problems.  Render callbacks have their own rejection type so that the
//! boundary never leaks detail to an unauthenticated caller.

use thiserror::Error;

/// The unified error type for the SafeReport crates.
#[derive(Debug, Error)]
pub enum EvidenceError {
    /// An event draft failed validation against its payload variant.
    #[error("invalid event payload: {reason}")]
    InvalidPayload { reason: String },

    /// A caller-supplied argument (reason code, index, …) was rejected.
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The chain head kept moving underneath an append.
    #[error("chain head for report {report_id} changed on every one of {attempts} append attempts")]
    ChainConflict { report_id: String, attempts: u32 },

    /// An event or pack references a key id the key ring does not hold.
    #[error("unknown key id '{key_id}'")]
    UnknownKey { key_id: String },

    /// A lookup target does not exist.
    #[error("{what} not found")]
    NotFound { what: String },

    /// A lifecycle transition that the state machine does not allow.
    #[error("invalid transition: {reason}")]
    InvalidTransition { reason: String },

    /// A backing store could not read or persist a record.
    #[error("store failed: {reason}")]
    StoreFailed { reason: String },

    /// The render job queue refused or could not accept a job.
    #[error("render queue unavailable: {reason}")]
    QueueUnavailable { reason: String },

    /// The sealing collaborator could not seal or open a payload.
    #[error("payload sealing failed: {reason}")]
    SealFailed { reason: String },

    /// A value could not be serialized for hashing or storage.
    #[error("serialization failed: {reason}")]
    Serialization { reason: String },

    /// A Merkle tree or proof operation received unusable input.
    #[error("merkle error: {reason}")]
    Merkle { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },
}

impl From<serde_json::Error> for EvidenceError {
    fn from(e: serde_json::Error) -> Self {
        EvidenceError::Serialization {
            reason: e.to_string(),
        }
    }
}

/// Convenience alias used throughout the SafeReport crates.
pub type EvidenceResult<T> = Result<T, EvidenceError>;

/// Why an inbound render callback was refused.
///
/// The `Display` text is deliberately generic: callbacks are the primary
/// forgery target, so a rejection names only its category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CallbackRejection {
    /// The shared-secret credential was absent or wrong.
    #[error("unauthorized")]
    Unauthorized,

    /// The callback body was malformed.
    #[error("bad_request")]
    BadRequest,

    /// No pack exists with the given id.
    #[error("pack_not_found")]
    PackNotFound,

    /// Report, tenant or signature differ from the persisted pack.
    #[error("mismatch")]
    Mismatch,

    /// The pack store could not be consulted.
    #[error("unavailable")]
    Unavailable,
}

impl CallbackRejection {
    /// HTTP-style status code for the rejection.
    pub fn status_code(&self) -> u16 {
        match self {
            CallbackRejection::Unauthorized => 401,
            CallbackRejection::BadRequest => 400,
            CallbackRejection::PackNotFound => 404,
            CallbackRejection::Mismatch => 409,
            CallbackRejection::Unavailable => 503,
        }
    }
}
