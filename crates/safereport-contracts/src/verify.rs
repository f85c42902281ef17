//! Chain verification results.
//!
//! `VerifyResult` is the in-band report of a full replay of a report's
//! chain.  It never contains timestamps of its own, so verifying an
//! unmodified chain twice yields two equal results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    event::EventType,
    ids::{EventId, ReportId},
};

/// The class of integrity finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainFailure {
    /// No chain record exists for the report.
    ChainMissing,
    /// The chain record exists but no events do.
    NoEvents,
    /// An event's content no longer hashes to its stored hash.
    HashMismatch,
    /// An event's `prev_hash` does not link to its predecessor.
    SequenceMismatch,
    /// Every event replays cleanly but the last one is not the stored head.
    HeadMismatch,
}

impl ChainFailure {
    pub fn code(&self) -> &'static str {
        match self {
            ChainFailure::ChainMissing => "chain_missing",
            ChainFailure::NoEvents => "no_events",
            ChainFailure::HashMismatch => "hash_mismatch",
            ChainFailure::SequenceMismatch => "sequence_mismatch",
            ChainFailure::HeadMismatch => "head_mismatch",
        }
    }
}

/// The first divergence found while replaying a chain.
///
/// `prev_ok` and `hash_ok` are flagged independently: a reordered or
/// spliced chain breaks linkage, an edited event breaks its own hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    pub index: usize,
    pub event_id: EventId,
    pub event_type: EventType,
    pub created_at: DateTime<Utc>,
    pub expected_prev: Option<String>,
    pub stored_prev: Option<String>,
    pub expected_hash: String,
    pub stored_hash: String,
    pub prev_ok: bool,
    pub hash_ok: bool,
}

/// Per-event outcome of the replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCheck {
    pub index: usize,
    pub event_id: EventId,
    pub prev_ok: bool,
    pub hash_ok: bool,
}

/// Result of `EvidenceChain::verify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResult {
    /// True only when every event replays and the final hash is the stored head.
    pub ok: bool,
    pub report_id: ReportId,
    pub event_count: usize,
    /// The persisted chain head, `None` when the chain record is missing.
    pub stored_head: Option<String>,
    /// The head recomputed from stored event content.
    pub computed_head: Option<String>,
    pub failure: Option<ChainFailure>,
    pub mismatch: Option<Mismatch>,
    /// One entry per event, in creation order.
    pub trace: Vec<EventCheck>,
}

impl VerifyResult {
    /// The result for a report with no chain record.
    pub fn chain_missing(report_id: ReportId) -> Self {
        Self {
            ok: false,
            report_id,
            event_count: 0,
            stored_head: None,
            computed_head: None,
            failure: Some(ChainFailure::ChainMissing),
            mismatch: None,
            trace: Vec::new(),
        }
    }

    /// The result for a chain record with no events behind it.
    pub fn no_events(report_id: ReportId, stored_head: String) -> Self {
        Self {
            ok: false,
            report_id,
            event_count: 0,
            stored_head: Some(stored_head),
            computed_head: None,
            failure: Some(ChainFailure::NoEvents),
            mismatch: None,
            trace: Vec::new(),
        }
    }
}
