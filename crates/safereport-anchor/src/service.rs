//! Anchor lifecycle over an `AnchorStore`.
//!
//! `pending -> anchored -> verified`.  The service never checks the external
//! publication itself; `confirm_anchor` records that one happened and
//! `mark_verified` records that a person checked it.  Verified anchors are
//! never written again.

use std::{collections::HashSet, sync::Arc};

use tracing::{debug, info, warn};

use safereport_contracts::{
    anchor::{AnchorRecord, AnchorStatus, InclusionResult},
    error::{EvidenceError, EvidenceResult},
    ids::{AnchorId, ReportId},
};
use safereport_core::{
    clock::Clock,
    traits::{AnchorStore, ChainStore},
};

use crate::merkle::{verify_proof, MerkleTree};

pub struct AnchorService {
    store: Arc<dyn AnchorStore>,
    chains: Arc<dyn ChainStore>,
    clock: Arc<dyn Clock>,
}

impl AnchorService {
    pub fn new(
        store: Arc<dyn AnchorStore>,
        chains: Arc<dyn ChainStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            chains,
            clock,
        }
    }

    fn existing(&self, anchor_id: &AnchorId) -> EvidenceResult<AnchorRecord> {
        self.store
            .get(anchor_id)?
            .ok_or_else(|| EvidenceError::NotFound {
                what: format!("anchor {anchor_id}"),
            })
    }

    /// Build a tree over `(report_id, chain_head)` entries and store a
    /// pending anchor for its root.
    pub fn create_anchor(&self, entries: &[(ReportId, String)]) -> EvidenceResult<AnchorRecord> {
        let mut seen = HashSet::with_capacity(entries.len());
        if let Some((dup, _)) = entries.iter().find(|(id, _)| !seen.insert(*id)) {
            return Err(EvidenceError::InvalidRequest {
                reason: format!("report {dup} appears twice in one anchor"),
            });
        }

        let leaves: Vec<String> = entries.iter().map(|(_, head)| head.clone()).collect();
        let tree = MerkleTree::build(leaves.clone())?;

        let anchor = AnchorRecord {
            id: AnchorId::new(),
            merkle_root: tree.root().to_string(),
            report_ids: entries.iter().map(|(id, _)| *id).collect(),
            leaves,
            external_ref: None,
            external_url: None,
            status: AnchorStatus::Pending,
            created_at: self.clock.now(),
            anchored_at: None,
            verified_at: None,
        };
        self.store.insert(anchor.clone())?;

        info!(
            anchor_id = %anchor.id,
            root = %anchor.merkle_root,
            reports = anchor.report_ids.len(),
            "anchor created"
        );
        Ok(anchor)
    }

    /// Anchor the current chain heads of those `report_ids` not yet in any
    /// anchor.
    ///
    /// Reports without a chain are skipped.  Returns `None` when nothing is
    /// left to anchor.
    pub fn create_anchor_from_heads(
        &self,
        report_ids: &[ReportId],
    ) -> EvidenceResult<Option<AnchorRecord>> {
        let mut entries = Vec::new();
        for report_id in self.pending_report_ids(report_ids)? {
            match self.chains.chain(&report_id)? {
                Some(chain) => entries.push((report_id, chain.head_hash)),
                None => debug!(report_id = %report_id, "no chain to anchor"),
            }
        }
        if entries.is_empty() {
            return Ok(None);
        }
        self.create_anchor(&entries).map(Some)
    }

    /// Attach the external publication reference: `pending -> anchored`.
    pub fn confirm_anchor(
        &self,
        anchor_id: &AnchorId,
        external_ref: &str,
        external_url: Option<&str>,
    ) -> EvidenceResult<AnchorRecord> {
        let external_ref = external_ref.trim();
        if external_ref.is_empty() {
            return Err(EvidenceError::InvalidRequest {
                reason: "external reference must not be blank".to_string(),
            });
        }

        let mut anchor = self.existing(anchor_id)?;
        if anchor.status != AnchorStatus::Pending {
            return Err(EvidenceError::InvalidTransition {
                reason: format!("anchor {anchor_id} is not pending"),
            });
        }
        anchor.external_ref = Some(external_ref.to_string());
        anchor.external_url = external_url.map(str::to_string);
        anchor.status = AnchorStatus::Anchored;
        anchor.anchored_at = Some(self.clock.now());

        if !self
            .store
            .replace_if_status(anchor.clone(), AnchorStatus::Pending)?
        {
            return Err(EvidenceError::InvalidTransition {
                reason: format!("anchor {anchor_id} changed while confirming"),
            });
        }
        info!(anchor_id = %anchor_id, external_ref, "anchor confirmed");
        Ok(anchor)
    }

    /// Record a manual check of the publication: `anchored -> verified`.
    pub fn mark_verified(&self, anchor_id: &AnchorId) -> EvidenceResult<AnchorRecord> {
        let mut anchor = self.existing(anchor_id)?;
        if anchor.status != AnchorStatus::Anchored {
            return Err(EvidenceError::InvalidTransition {
                reason: format!("anchor {anchor_id} must be anchored before it is verified"),
            });
        }
        anchor.status = AnchorStatus::Verified;
        anchor.verified_at = Some(self.clock.now());

        if !self
            .store
            .replace_if_status(anchor.clone(), AnchorStatus::Anchored)?
        {
            return Err(EvidenceError::InvalidTransition {
                reason: format!("anchor {anchor_id} changed while verifying"),
            });
        }
        info!(anchor_id = %anchor_id, "anchor marked verified");
        Ok(anchor)
    }

    /// Prove `leaf_hash` is under the anchor's root.
    ///
    /// The tree is rebuilt from the stored leaves; a rebuilt root that does
    /// not match the stored one fails every inclusion check.
    pub fn verify_inclusion(
        &self,
        anchor_id: &AnchorId,
        leaf_hash: &str,
    ) -> EvidenceResult<InclusionResult> {
        let anchor = self.existing(anchor_id)?;
        let tree = MerkleTree::build(anchor.leaves.clone())?;
        if tree.root() != anchor.merkle_root {
            warn!(anchor_id = %anchor_id, "stored leaves do not reproduce the anchor root");
            return Ok(InclusionResult {
                verified: false,
                proof: None,
            });
        }

        let Some(index) = tree.position(leaf_hash) else {
            return Ok(InclusionResult {
                verified: false,
                proof: None,
            });
        };
        let proof = tree.generate_proof(index)?;
        Ok(InclusionResult {
            verified: verify_proof(&proof),
            proof: Some(proof),
        })
    }

    /// The first anchor that includes `report_id`.
    pub fn anchor_for_report(&self, report_id: &ReportId) -> EvidenceResult<Option<AnchorRecord>> {
        Ok(self
            .store
            .all()?
            .into_iter()
            .find(|a| a.report_ids.contains(report_id)))
    }

    /// Those `candidates` not included in any anchor, in the given order.
    pub fn pending_report_ids(&self, candidates: &[ReportId]) -> EvidenceResult<Vec<ReportId>> {
        let anchored: HashSet<ReportId> = self
            .store
            .all()?
            .into_iter()
            .flat_map(|a| a.report_ids)
            .collect();
        Ok(candidates
            .iter()
            .filter(|id| !anchored.contains(*id))
            .copied()
            .collect())
    }
}
