//! Merkle anchor records and inclusion proofs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AnchorId, ReportId};

/// Lifecycle of an anchor: `pending -> anchored -> verified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorStatus {
    /// Root computed, not yet published.
    Pending,
    /// An external publication reference has been attached.
    Anchored,
    /// A human confirmed the publication.  Final.
    Verified,
}

/// One batched attestation over several reports' chain heads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRecord {
    pub id: AnchorId,
    pub merkle_root: String,
    /// Reports included, in leaf order.
    pub report_ids: Vec<ReportId>,
    /// Leaf hashes, `leaves[i]` belonging to `report_ids[i]`.
    pub leaves: Vec<String>,
    /// Public post identifier once published.
    pub external_ref: Option<String>,
    pub external_url: Option<String>,
    pub status: AnchorStatus,
    pub created_at: DateTime<Utc>,
    pub anchored_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
}

/// Which side of the running hash a sibling sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiblingSide {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub hash: String,
    pub side: SiblingSide,
}

/// The sibling path from one leaf up to a root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf: String,
    pub root: String,
    pub siblings: Vec<ProofStep>,
}

/// Result of `AnchorService::verify_inclusion`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionResult {
    pub verified: bool,
    pub proof: Option<MerkleProof>,
}
