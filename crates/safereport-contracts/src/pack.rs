//! Defense pack records, render jobs and callbacks.
//!
//! A defense pack asserts "at time T, verifying report R produced result
//! V".  Only three states are ever stored: `queued`, `generated` and
//! `failed`.  "Generating" is a presentation-level inference from a queued
//! pack whose job was submitted.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    event::Event,
    ids::{PackId, ReportId, TenantId},
    verify::{ChainFailure, Mismatch, VerifyResult},
};

/// Stored lifecycle state of a defense pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackStatus {
    Queued,
    Generated,
    Failed,
}

impl PackStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PackStatus::Queued)
    }
}

impl fmt::Display for PackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PackStatus::Queued => "queued",
            PackStatus::Generated => "generated",
            PackStatus::Failed => "failed",
        })
    }
}

/// The verification result captured when the pack was requested.
///
/// This whole structure is what the pack signature covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackSnapshot {
    pub pack_id: PackId,
    pub report_id: ReportId,
    pub tenant_id: TenantId,
    pub captured_at: DateTime<Utc>,
    pub stored_head: Option<String>,
    pub computed_head: Option<String>,
    pub event_count: usize,
    pub ok: bool,
    pub failure: Option<ChainFailure>,
    pub mismatch: Option<Mismatch>,
}

impl PackSnapshot {
    pub fn capture(
        pack_id: PackId,
        tenant_id: TenantId,
        captured_at: DateTime<Utc>,
        verify: &VerifyResult,
    ) -> Self {
        Self {
            pack_id,
            report_id: verify.report_id,
            tenant_id,
            captured_at,
            stored_head: verify.stored_head.clone(),
            computed_head: verify.computed_head.clone(),
            event_count: verify.event_count,
            ok: verify.ok,
            failure: verify.failure,
            mismatch: verify.mismatch.clone(),
        }
    }
}

/// A state change the pack store may apply to a queued pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackTransition {
    Generated {
        artifact_ref: String,
    },
    Failed {
        error: String,
        /// Appended to the reason code, e.g. `stale_timeout`.
        reason_tag: Option<String>,
    },
}

/// One snapshot-and-render request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefensePack {
    pub id: PackId,
    pub report_id: ReportId,
    pub tenant_id: TenantId,
    pub status: PackStatus,
    /// Why the snapshot was taken.
    pub reason_code: String,
    pub snapshot: PackSnapshot,
    /// Hex HMAC over the canonical snapshot.
    pub signature: String,
    pub signing_key_id: String,
    /// Where the render input was stored.
    pub render_input_key: String,
    pub artifact_ref: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub generated_at: Option<DateTime<Utc>>,
}

impl DefensePack {
    /// Apply `transition` if the pack is still queued.
    ///
    /// Returns `false`, leaving the pack untouched, when it is already in a
    /// terminal state.  Every store implementation funnels state changes
    /// through here so that terminal records can never be overwritten.
    pub fn apply(&mut self, transition: &PackTransition, at: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        match transition {
            PackTransition::Generated { artifact_ref } => {
                self.status = PackStatus::Generated;
                self.artifact_ref = Some(artifact_ref.clone());
                self.generated_at = Some(at);
            }
            PackTransition::Failed { error, reason_tag } => {
                self.status = PackStatus::Failed;
                self.error = Some(error.clone());
                if let Some(tag) = reason_tag {
                    self.reason_code = format!("{}:{}", self.reason_code, tag);
                }
            }
        }
        self.updated_at = at;
        true
    }
}

/// What the pipeline persists for the external renderer to read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderInput {
    pub pack_id: PackId,
    pub report_id: ReportId,
    pub tenant_id: TenantId,
    pub reason_code: String,
    pub snapshot: PackSnapshot,
    pub signature: String,
    pub verify: VerifyResult,
    pub events: Vec<Event>,
}

/// The job submitted to the render queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderJob {
    pub pack_id: PackId,
    pub report_id: ReportId,
    pub tenant_id: TenantId,
    pub signature: String,
    pub render_input_key: String,
    /// Lets the queue drop duplicate submissions of the same pack.
    pub dedup_id: String,
}

/// The body the external renderer posts back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderCallback {
    pub pack_id: PackId,
    pub report_id: ReportId,
    pub tenant_id: TenantId,
    pub signature: String,
    pub ok: bool,
    #[serde(default)]
    pub artifact_ref: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Result of `PackPipeline::request`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackRequestOutcome {
    pub pack: DefensePack,
    /// True when an existing fresh queued pack was returned instead.
    pub deduped: bool,
}

/// Result of an accepted render callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The callback closed out the pack.
    Applied { status: PackStatus },
    /// The pack was already terminal; nothing changed.
    AlreadyTerminal { status: PackStatus },
}
