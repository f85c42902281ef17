//! # safereport-anchor
//!
//! Batches evidence chain heads from many reports into a Merkle tree whose
//! root can be published externally for an independent timestamp.
//!
//! ## Overview
//!
//! - [`MerkleTree`] builds the tree and produces inclusion proofs.
//! - [`verify_proof`] checks a proof with nothing but the proof itself.
//! - [`AnchorService`] stores anchors and walks them through
//!   `pending -> anchored -> verified`.
//! - [`text`] renders the public announcement and per-report certificates.

pub mod memory;
pub mod merkle;
pub mod service;
pub mod text;

pub use memory::InMemoryAnchorStore;
pub use merkle::{node_hash, verify_proof, MerkleTree};
pub use service::AnchorService;
pub use text::{announcement_text, certificate};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};

    use safereport_contracts::{
        anchor::{AnchorStatus, SiblingSide},
        error::EvidenceError,
        event::{ActorRole, EventDraft, EventPayload, ReceivedData},
        ids::{AnchorId, ReportId},
    };
    use safereport_core::{
        clock::ManualClock,
        keyring::{KeyRing, SecretKey},
        traits::AnchorStore,
    };
    use safereport_evidence::{EvidenceChain, InMemoryChainStore};

    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn leaf(i: usize) -> String {
        node_hash(&format!("chain-head-{i}"), "")
    }

    fn leaves(n: usize) -> Vec<String> {
        (0..n).map(leaf).collect()
    }

    fn flip_bit(hash: &str) -> String {
        let mut bytes = hex::decode(hash).unwrap();
        bytes[0] ^= 0x01;
        hex::encode(bytes)
    }

    struct Harness {
        clock: Arc<ManualClock>,
        store: Arc<InMemoryAnchorStore>,
        chain: EvidenceChain,
        service: AnchorService,
    }

    fn harness() -> Harness {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap(),
        ));
        let chains = Arc::new(InMemoryChainStore::new());
        let store = Arc::new(InMemoryAnchorStore::new());
        let chain = EvidenceChain::new(
            chains.clone(),
            KeyRing::single("v1", SecretKey::from_bytes(vec![5u8; 32]).unwrap()),
            clock.clone(),
        );
        let service = AnchorService::new(store.clone(), chains, clock.clone());
        Harness {
            clock,
            store,
            chain,
            service,
        }
    }

    fn received() -> EventDraft {
        EventDraft::new(
            ActorRole::User,
            EventPayload::Received(ReceivedData {
                channel: "hotline".to_string(),
                category: None,
            }),
        )
    }

    // ── 1. tree construction ──────────────────────────────────────────────────

    /// A lone trailing node is paired with itself at every level.
    #[test]
    fn test_odd_node_pairs_with_itself() {
        let l = leaves(3);
        let tree = MerkleTree::build(l.clone()).unwrap();

        let left = node_hash(&l[0], &l[1]);
        let right = node_hash(&l[2], &l[2]);
        assert_eq!(tree.root(), node_hash(&left, &right));
    }

    #[test]
    fn test_single_leaf_is_its_own_root() {
        let tree = MerkleTree::build(leaves(1)).unwrap();
        assert_eq!(tree.root(), leaf(0));

        let proof = tree.generate_proof(0).unwrap();
        assert!(proof.siblings.is_empty());
        assert!(verify_proof(&proof));
    }

    #[test]
    fn test_bad_input_is_rejected() {
        assert!(matches!(
            MerkleTree::build(Vec::new()),
            Err(EvidenceError::Merkle { .. })
        ));
        assert!(matches!(
            MerkleTree::build(vec![leaf(0), "not-hex".to_string()]),
            Err(EvidenceError::Merkle { .. })
        ));
        assert!(matches!(
            MerkleTree::build(vec![leaf(0).to_uppercase()]),
            Err(EvidenceError::Merkle { .. })
        ));

        let tree = MerkleTree::build(leaves(4)).unwrap();
        assert!(matches!(
            tree.generate_proof(4),
            Err(EvidenceError::InvalidRequest { .. })
        ));
    }

    // ── 2. proofs ─────────────────────────────────────────────────────────────

    /// Every proof verifies, and flipping one bit of any sibling breaks it.
    #[test]
    fn test_every_proof_verifies_and_resists_bit_flips() {
        for n in 1..=9 {
            let tree = MerkleTree::build(leaves(n)).unwrap();
            for i in 0..n {
                let proof = tree.generate_proof(i).unwrap();
                assert!(verify_proof(&proof), "n={n} i={i}");
                assert_eq!(proof.leaf, leaf(i));

                for s in 0..proof.siblings.len() {
                    let mut forged = proof.clone();
                    forged.siblings[s].hash = flip_bit(&forged.siblings[s].hash);
                    assert!(!verify_proof(&forged), "n={n} i={i} sibling={s}");
                }

                let mut wrong_leaf = proof.clone();
                wrong_leaf.leaf = flip_bit(&wrong_leaf.leaf);
                assert!(!verify_proof(&wrong_leaf), "n={n} i={i} leaf");
            }
        }
    }

    /// The last leaf of an odd level carries its own hash as right sibling.
    #[test]
    fn test_odd_leaf_proof_includes_self_sibling() {
        let tree = MerkleTree::build(leaves(5)).unwrap();
        let proof = tree.generate_proof(4).unwrap();

        assert_eq!(proof.siblings[0].hash, leaf(4));
        assert_eq!(proof.siblings[0].side, SiblingSide::Right);
        assert_eq!(proof.siblings.len(), 3);
    }

    #[test]
    fn test_swapped_sides_fail() {
        let tree = MerkleTree::build(leaves(2)).unwrap();
        let mut proof = tree.generate_proof(0).unwrap();
        proof.siblings[0].side = SiblingSide::Left;
        assert!(!verify_proof(&proof));
    }

    // ── 3. anchor lifecycle ───────────────────────────────────────────────────

    #[test]
    fn test_anchor_lifecycle() {
        let h = harness();
        let a = ReportId::new();
        let b = ReportId::new();

        let anchor = h
            .service
            .create_anchor(&[(a, leaf(0)), (b, leaf(1))])
            .unwrap();
        assert_eq!(anchor.status, AnchorStatus::Pending);
        assert_eq!(anchor.merkle_root, node_hash(&leaf(0), &leaf(1)));
        assert_eq!(anchor.report_ids, vec![a, b]);

        h.clock.advance(Duration::minutes(5));
        let anchored = h
            .service
            .confirm_anchor(&anchor.id, "1790000000000000000", Some("https://x.com/safereport/status/1790000000000000000"))
            .unwrap();
        assert_eq!(anchored.status, AnchorStatus::Anchored);
        assert_eq!(anchored.anchored_at, Some(anchor.created_at + Duration::minutes(5)));

        assert!(matches!(
            h.service.confirm_anchor(&anchor.id, "other", None),
            Err(EvidenceError::InvalidTransition { .. })
        ));

        let verified = h.service.mark_verified(&anchor.id).unwrap();
        assert_eq!(verified.status, AnchorStatus::Verified);
    }

    /// Nothing moves a verified anchor.
    #[test]
    fn test_verified_anchor_is_immutable() {
        let h = harness();
        let anchor = h.service.create_anchor(&[(ReportId::new(), leaf(0))]).unwrap();
        h.service.confirm_anchor(&anchor.id, "post-1", None).unwrap();
        h.service.mark_verified(&anchor.id).unwrap();
        let settled = h.store.get(&anchor.id).unwrap().unwrap();

        assert!(h.service.confirm_anchor(&anchor.id, "post-2", None).is_err());
        assert!(h.service.mark_verified(&anchor.id).is_err());
        assert_eq!(h.store.get(&anchor.id).unwrap().unwrap(), settled);
    }

    #[test]
    fn test_invalid_transitions() {
        let h = harness();
        let anchor = h.service.create_anchor(&[(ReportId::new(), leaf(0))]).unwrap();

        assert!(matches!(
            h.service.mark_verified(&anchor.id),
            Err(EvidenceError::InvalidTransition { .. })
        ));
        assert!(matches!(
            h.service.confirm_anchor(&anchor.id, "   ", None),
            Err(EvidenceError::InvalidRequest { .. })
        ));
        assert!(matches!(
            h.service.confirm_anchor(&AnchorId::new(), "post", None),
            Err(EvidenceError::NotFound { .. })
        ));

        let dup = ReportId::new();
        assert!(matches!(
            h.service.create_anchor(&[(dup, leaf(1)), (dup, leaf(2))]),
            Err(EvidenceError::InvalidRequest { .. })
        ));
        assert!(matches!(
            h.service.create_anchor(&[]),
            Err(EvidenceError::Merkle { .. })
        ));
    }

    // ── 4. inclusion and lookup ───────────────────────────────────────────────

    #[test]
    fn test_verify_inclusion() {
        let h = harness();
        let entries: Vec<(ReportId, String)> = (0..5).map(|i| (ReportId::new(), leaf(i))).collect();
        let anchor = h.service.create_anchor(&entries).unwrap();

        let included = h.service.verify_inclusion(&anchor.id, &leaf(3)).unwrap();
        assert!(included.verified);
        let proof = included.proof.unwrap();
        assert_eq!(proof.root, anchor.merkle_root);
        assert!(verify_proof(&proof));

        let absent = h.service.verify_inclusion(&anchor.id, &leaf(7)).unwrap();
        assert!(!absent.verified);
        assert!(absent.proof.is_none());

        assert!(matches!(
            h.service.verify_inclusion(&AnchorId::new(), &leaf(0)),
            Err(EvidenceError::NotFound { .. })
        ));
    }

    /// Chain heads of un-anchored reports are anchored once.
    #[test]
    fn test_anchor_from_chain_heads() {
        let h = harness();
        let a = ReportId::new();
        let b = ReportId::new();
        let no_chain = ReportId::new();
        h.chain.append(&a, received()).unwrap();
        h.chain.append(&b, received()).unwrap();
        h.chain.append(&b, received()).unwrap();

        let candidates = [a, b, no_chain];
        let anchor = h.service.create_anchor_from_heads(&candidates).unwrap().unwrap();
        assert_eq!(anchor.report_ids, vec![a, b]);

        let head_b = h.chain.head(&b).unwrap().unwrap().head_hash;
        assert!(h.service.verify_inclusion(&anchor.id, &head_b).unwrap().verified);

        assert_eq!(h.service.pending_report_ids(&candidates).unwrap(), vec![no_chain]);
        assert_eq!(
            h.service.anchor_for_report(&a).unwrap().map(|x| x.id),
            Some(anchor.id)
        );
        assert!(h.service.anchor_for_report(&no_chain).unwrap().is_none());
        assert!(h.service.create_anchor_from_heads(&candidates).unwrap().is_none());
    }

    // ── 5. text ───────────────────────────────────────────────────────────────

    #[test]
    fn test_announcement_and_certificate() {
        let h = harness();
        let report = ReportId::new();
        let anchor = h
            .service
            .create_anchor(&[(report, leaf(0)), (ReportId::new(), leaf(1))])
            .unwrap();

        let post = announcement_text(&anchor);
        assert!(post.contains("Date: 2026-06-01"));
        assert!(post.contains("Reports sealed: 2"));
        assert!(post.contains(&format!("{}...", &anchor.merkle_root[..16])));

        let cert = certificate(&anchor, &report, &leaf(0));
        assert!(cert.contains(&report.to_string()));
        assert!(cert.contains(&leaf(0)));
        assert!(cert.contains(&anchor.merkle_root));
        assert!(cert.contains("PENDING"));

        let anchored = h.service.confirm_anchor(&anchor.id, "post-42", None).unwrap();
        let cert = certificate(&anchored, &report, &leaf(0));
        assert!(cert.contains("post-42"));
        assert!(cert.contains("ANCHORED"));
    }
}
