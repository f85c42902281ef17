//! In-memory collaborators for the pack pipeline.
//!
//! `InMemoryPackStore` holds every pack behind one `Mutex`, which makes
//! `insert_unless_fresh` and `transition_if_queued` single atomic steps.
//! The render input store and queue can be switched to an unavailable mode
//! to rehearse submission failures; the pack store can refuse transitions.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, RwLock,
    },
};

use chrono::{DateTime, Utc};

use safereport_contracts::{
    error::{EvidenceError, EvidenceResult},
    ids::{PackId, ReportId, TenantId},
    pack::{DefensePack, PackStatus, PackTransition, RenderInput, RenderJob},
};
use safereport_core::traits::{
    InsertOutcome, PackStore, RenderInputStore, RenderQueue, ReportDirectory, TransitionOutcome,
};

fn poisoned(what: &str) -> EvidenceError {
    EvidenceError::StoreFailed {
        reason: format!("{what} lock poisoned"),
    }
}

fn newest_fresh<'a>(
    packs: &'a [DefensePack],
    report_id: &ReportId,
    fresh_since: DateTime<Utc>,
) -> Option<&'a DefensePack> {
    packs
        .iter()
        .filter(|p| {
            p.report_id == *report_id
                && p.status == PackStatus::Queued
                && p.created_at >= fresh_since
        })
        .max_by_key(|p| p.created_at)
}

// ── Pack store ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryPackStore {
    packs: Mutex<Vec<DefensePack>>,
    transitions_unavailable: AtomicBool,
}

impl InMemoryPackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `transition_if_queued` fail until switched back.
    pub fn set_transitions_unavailable(&self, unavailable: bool) {
        self.transitions_unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl PackStore for InMemoryPackStore {
    fn find_fresh_queued(
        &self,
        report_id: &ReportId,
        fresh_since: DateTime<Utc>,
    ) -> EvidenceResult<Option<DefensePack>> {
        let packs = self.packs.lock().map_err(|_| poisoned("pack store"))?;
        Ok(newest_fresh(&packs, report_id, fresh_since).cloned())
    }

    fn insert_unless_fresh(
        &self,
        pack: DefensePack,
        fresh_since: DateTime<Utc>,
    ) -> EvidenceResult<InsertOutcome> {
        let mut packs = self.packs.lock().map_err(|_| poisoned("pack store"))?;
        if let Some(existing) = newest_fresh(&packs, &pack.report_id, fresh_since) {
            return Ok(InsertOutcome::Existing(existing.clone()));
        }
        packs.push(pack);
        Ok(InsertOutcome::Inserted)
    }

    fn get(&self, pack_id: &PackId) -> EvidenceResult<Option<DefensePack>> {
        let packs = self.packs.lock().map_err(|_| poisoned("pack store"))?;
        Ok(packs.iter().find(|p| p.id == *pack_id).cloned())
    }

    fn transition_if_queued(
        &self,
        pack_id: &PackId,
        transition: &PackTransition,
        at: DateTime<Utc>,
    ) -> EvidenceResult<TransitionOutcome> {
        if self.transitions_unavailable.load(Ordering::SeqCst) {
            return Err(EvidenceError::StoreFailed {
                reason: "pack store rejected transition".to_string(),
            });
        }
        let mut packs = self.packs.lock().map_err(|_| poisoned("pack store"))?;
        let pack = packs
            .iter_mut()
            .find(|p| p.id == *pack_id)
            .ok_or_else(|| EvidenceError::NotFound {
                what: format!("pack {pack_id}"),
            })?;
        if pack.apply(transition, at) {
            Ok(TransitionOutcome::Applied(pack.clone()))
        } else {
            Ok(TransitionOutcome::AlreadyTerminal(pack.clone()))
        }
    }

    fn queued_before(
        &self,
        created_before: DateTime<Utc>,
        report_id: Option<&ReportId>,
    ) -> EvidenceResult<Vec<PackId>> {
        let packs = self.packs.lock().map_err(|_| poisoned("pack store"))?;
        Ok(packs
            .iter()
            .filter(|p| p.status == PackStatus::Queued && p.created_at < created_before)
            .filter(|p| report_id.map_or(true, |r| p.report_id == *r))
            .map(|p| p.id)
            .collect())
    }

    fn list_for_report(
        &self,
        report_id: &ReportId,
        limit: usize,
    ) -> EvidenceResult<Vec<DefensePack>> {
        let packs = self.packs.lock().map_err(|_| poisoned("pack store"))?;
        let mut matching: Vec<DefensePack> = packs
            .iter()
            .filter(|p| p.report_id == *report_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(limit);
        Ok(matching)
    }
}

// ── Render input store ────────────────────────────────────────────────────────

/// Object storage stand-in; inputs are kept as serialized JSON.
#[derive(Default)]
pub struct InMemoryRenderInputStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    unavailable: AtomicBool,
}

impl InMemoryRenderInputStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put` fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn keys(&self) -> EvidenceResult<Vec<String>> {
        let objects = self.objects.lock().map_err(|_| poisoned("object store"))?;
        let mut keys: Vec<String> = objects.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

impl RenderInputStore for InMemoryRenderInputStore {
    fn put(&self, key: &str, input: &RenderInput) -> EvidenceResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(EvidenceError::StoreFailed {
                reason: format!("object store rejected write of '{key}'"),
            });
        }
        let bytes = serde_json::to_vec(input)?;
        let mut objects = self.objects.lock().map_err(|_| poisoned("object store"))?;
        objects.insert(key.to_string(), bytes);
        Ok(())
    }

    fn get(&self, key: &str) -> EvidenceResult<Option<RenderInput>> {
        let objects = self.objects.lock().map_err(|_| poisoned("object store"))?;
        match objects.get(key) {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }
}

// ── Render queue ──────────────────────────────────────────────────────────────

/// A FIFO job queue that drops jobs whose `dedup_id` it has already seen.
#[derive(Default)]
pub struct InMemoryRenderQueue {
    jobs: Mutex<Vec<RenderJob>>,
    unavailable: AtomicBool,
}

impl InMemoryRenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Jobs accepted so far, in submission order.
    pub fn jobs(&self) -> EvidenceResult<Vec<RenderJob>> {
        let jobs = self.jobs.lock().map_err(|_| poisoned("render queue"))?;
        Ok(jobs.clone())
    }
}

impl RenderQueue for InMemoryRenderQueue {
    fn submit(&self, job: &RenderJob) -> EvidenceResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(EvidenceError::QueueUnavailable {
                reason: "render queue is not accepting jobs".to_string(),
            });
        }
        let mut jobs = self.jobs.lock().map_err(|_| poisoned("render queue"))?;
        if !jobs.iter().any(|j| j.dedup_id == job.dedup_id) {
            jobs.push(job.clone());
        }
        Ok(())
    }
}

// ── Report directory ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct StaticReportDirectory {
    tenants: RwLock<HashMap<ReportId, TenantId>>,
}

impl StaticReportDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, report_id: ReportId, tenant_id: TenantId) -> EvidenceResult<()> {
        let mut tenants = self.tenants.write().map_err(|_| poisoned("directory"))?;
        tenants.insert(report_id, tenant_id);
        Ok(())
    }
}

impl ReportDirectory for StaticReportDirectory {
    fn tenant_of(&self, report_id: &ReportId) -> EvidenceResult<Option<TenantId>> {
        let tenants = self.tenants.read().map_err(|_| poisoned("directory"))?;
        Ok(tenants.get(report_id).copied())
    }
}
