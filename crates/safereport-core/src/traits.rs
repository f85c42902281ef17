//! Collaborator trait definitions.
//!
//! The subsystem owns the chain, pack and anchor algorithms; everything it
//! reads from or writes to is reached through one of these traits:
//!
//! - `ChainStore`: events and the per-report head (compare-and-set)
//! - `PackStore`: defense pack records (atomic idempotent insert)
//! - `RenderInputStore`: object storage for renderer input
//! - `RenderQueue`: the out-of-process renderer's job queue
//! - `AnchorStore`: Merkle anchor records
//! - `PayloadSealer`: encryption of sensitive event detail
//! - `ReportDirectory`: report → tenant lookup
//!
//! Every implementation must be `Send + Sync`: appends for different
//! reports and callbacks for different packs run in parallel.

use chrono::{DateTime, Utc};
use serde_json::Value;

use safereport_contracts::{
    anchor::{AnchorRecord, AnchorStatus},
    error::EvidenceResult,
    event::{ChainRecord, Event},
    ids::{AnchorId, PackId, ReportId, TenantId},
    pack::{DefensePack, PackTransition, RenderInput, RenderJob},
};

/// Outcome of `ChainStore::commit_append`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The event was persisted and the head advanced.
    Committed(ChainRecord),
    /// The head was not the expected value; nothing was written.
    HeadMoved { current: Option<String> },
}

/// Persistent home of evidence events and chain heads.
pub trait ChainStore: Send + Sync {
    /// The chain record for `report_id`, if one exists.
    fn chain(&self, report_id: &ReportId) -> EvidenceResult<Option<ChainRecord>>;

    /// All events for `report_id` in creation order.
    fn events(&self, report_id: &ReportId) -> EvidenceResult<Vec<Event>>;

    /// Persist `event` and move the head to `event.hash`, but only if the
    /// current head equals `expected_head`.
    ///
    /// `expected_head = None` means "no chain yet": the chain record is
    /// created together with this genesis event.  The check and both writes
    /// must be one atomic step per report.
    fn commit_append(
        &self,
        event: Event,
        expected_head: Option<&str>,
        algo: &str,
    ) -> EvidenceResult<CommitOutcome>;
}

/// Outcome of `PackStore::insert_unless_fresh`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A queued pack for the same report was created at or after the
    /// freshness cut-off; it is returned and nothing was inserted.
    Existing(DefensePack),
}

/// Outcome of `PackStore::transition_if_queued`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied(DefensePack),
    AlreadyTerminal(DefensePack),
}

/// Persistent home of defense pack records.
pub trait PackStore: Send + Sync {
    /// The newest queued pack for `report_id` created at or after `fresh_since`.
    fn find_fresh_queued(
        &self,
        report_id: &ReportId,
        fresh_since: DateTime<Utc>,
    ) -> EvidenceResult<Option<DefensePack>>;

    /// Insert `pack` unless a fresh queued pack exists for its report.
    /// Check and insert are one atomic step per report.
    fn insert_unless_fresh(
        &self,
        pack: DefensePack,
        fresh_since: DateTime<Utc>,
    ) -> EvidenceResult<InsertOutcome>;

    fn get(&self, pack_id: &PackId) -> EvidenceResult<Option<DefensePack>>;

    /// Apply `transition` only if the pack is still queued.
    ///
    /// Returns `NotFound` for an unknown pack.  Implementations apply the
    /// change through `DefensePack::apply` under their own lock.
    fn transition_if_queued(
        &self,
        pack_id: &PackId,
        transition: &PackTransition,
        at: DateTime<Utc>,
    ) -> EvidenceResult<TransitionOutcome>;

    /// Ids of queued packs created before `created_before`, optionally
    /// restricted to one report.
    fn queued_before(
        &self,
        created_before: DateTime<Utc>,
        report_id: Option<&ReportId>,
    ) -> EvidenceResult<Vec<PackId>>;

    /// Packs for `report_id`, newest first, at most `limit`.
    fn list_for_report(&self, report_id: &ReportId, limit: usize)
        -> EvidenceResult<Vec<DefensePack>>;
}

/// Object storage for the input the renderer reads.
pub trait RenderInputStore: Send + Sync {
    fn put(&self, key: &str, input: &RenderInput) -> EvidenceResult<()>;
    fn get(&self, key: &str) -> EvidenceResult<Option<RenderInput>>;
}

/// The out-of-process renderer's job queue.
///
/// `submit` must return quickly: it enqueues, it does not render.
pub trait RenderQueue: Send + Sync {
    fn submit(&self, job: &RenderJob) -> EvidenceResult<()>;
}

/// Persistent home of anchor records.
pub trait AnchorStore: Send + Sync {
    fn insert(&self, anchor: AnchorRecord) -> EvidenceResult<()>;
    fn get(&self, anchor_id: &AnchorId) -> EvidenceResult<Option<AnchorRecord>>;
    /// All anchors in creation order.
    fn all(&self) -> EvidenceResult<Vec<AnchorRecord>>;
    /// Replace the stored record only if its status is still `expected`.
    fn replace_if_status(
        &self,
        anchor: AnchorRecord,
        expected: AnchorStatus,
    ) -> EvidenceResult<bool>;
}

/// The encryption collaborator for sensitive event detail.
///
/// The chain only ever stores and hashes the returned reference.
pub trait PayloadSealer: Send + Sync {
    fn seal(&self, report_id: &ReportId, detail: &Value) -> EvidenceResult<String>;
    fn open(&self, reference: &str) -> EvidenceResult<Value>;
}

/// Resolves the tenant that owns a report.
pub trait ReportDirectory: Send + Sync {
    fn tenant_of(&self, report_id: &ReportId) -> EvidenceResult<Option<TenantId>>;
}
