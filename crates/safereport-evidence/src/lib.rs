//! # safereport-evidence
//!
//! Append-only, HMAC-SHA256 hash-chained evidence log for incident reports.
//!
//! ## Overview
//!
//! Every lifecycle event of a report is canonically encoded, linked to the
//! previous event's hash and MAC'd under a key from the chain key ring.
//! Tampering with any stored event (one byte of its data, its position or
//! its timestamp) breaks the chain and is pinpointed by `verify`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use safereport_evidence::{EvidenceChain, InMemoryChainStore};
//!
//! let chain = EvidenceChain::new(Arc::new(InMemoryChainStore::new()), keys, clock);
//! chain.append(&report_id, draft)?;
//!
//! let result = chain.verify(&report_id)?;
//! assert!(result.ok);
//! ```

pub mod canonical;
pub mod chain;
pub mod hasher;
pub mod memory;

pub use chain::{hash_input, verify_events, EvidenceChain};
pub use hasher::{hash_event, CHAIN_ALGO};
pub use memory::{InMemoryChainStore, InMemoryPayloadVault};

// ── Tests ─────────────────────────────────────────────────────────────────────
