//! In-memory implementations of `ChainStore` and `PayloadSealer`.
//!
//! `InMemoryChainStore` is the reference chain store.  Each report's chain
//! sits behind its own `Mutex`; the outer map lock is only held long enough
//! to find or create that per-report slot, so appends to different reports
//! never wait on each other.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, RwLock},
};

use serde_json::Value;

use safereport_contracts::{
    error::{EvidenceError, EvidenceResult},
    event::{ChainRecord, Event},
    ids::ReportId,
};
use safereport_core::traits::{ChainStore, CommitOutcome, PayloadSealer};

// ── Internal per-report state ─────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct ReportChain {
    pub(crate) record: Option<ChainRecord>,
    pub(crate) events: Vec<Event>,
}

fn poisoned(what: &str) -> EvidenceError {
    EvidenceError::StoreFailed {
        reason: format!("{what} lock poisoned"),
    }
}

// ── Chain store ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryChainStore {
    chains: RwLock<HashMap<ReportId, Arc<Mutex<ReportChain>>>>,
}

impl InMemoryChainStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn existing(&self, report_id: &ReportId) -> EvidenceResult<Option<Arc<Mutex<ReportChain>>>> {
        let chains = self.chains.read().map_err(|_| poisoned("chain map"))?;
        Ok(chains.get(report_id).cloned())
    }

    fn slot(&self, report_id: &ReportId) -> EvidenceResult<Arc<Mutex<ReportChain>>> {
        if let Some(slot) = self.existing(report_id)? {
            return Ok(slot);
        }
        let mut chains = self.chains.write().map_err(|_| poisoned("chain map"))?;
        Ok(chains.entry(*report_id).or_default().clone())
    }

    /// Report ids that have a chain record.
    pub fn report_ids(&self) -> EvidenceResult<Vec<ReportId>> {
        let chains = self.chains.read().map_err(|_| poisoned("chain map"))?;
        let mut ids = Vec::new();
        for (id, slot) in chains.iter() {
            let chain = slot.lock().map_err(|_| poisoned("chain"))?;
            if chain.record.is_some() {
                ids.push(*id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Mutate stored events directly, bypassing the chain.
    ///
    /// This is raw storage access: it exists to rehearse tampering and
    /// storage corruption against `EvidenceChain::verify`.
    pub fn with_stored_events_mut<R>(
        &self,
        report_id: &ReportId,
        f: impl FnOnce(&mut Vec<Event>) -> R,
    ) -> EvidenceResult<R> {
        let slot = self.slot(report_id)?;
        let mut chain = slot.lock().map_err(|_| poisoned("chain"))?;
        Ok(f(&mut chain.events))
    }

    /// Delete the chain record while keeping its events (raw storage access).
    pub fn drop_chain_record(&self, report_id: &ReportId) -> EvidenceResult<()> {
        if let Some(slot) = self.existing(report_id)? {
            slot.lock().map_err(|_| poisoned("chain"))?.record = None;
        }
        Ok(())
    }
}

impl ChainStore for InMemoryChainStore {
    fn chain(&self, report_id: &ReportId) -> EvidenceResult<Option<ChainRecord>> {
        match self.existing(report_id)? {
            Some(slot) => Ok(slot.lock().map_err(|_| poisoned("chain"))?.record.clone()),
            None => Ok(None),
        }
    }

    fn events(&self, report_id: &ReportId) -> EvidenceResult<Vec<Event>> {
        match self.existing(report_id)? {
            Some(slot) => Ok(slot.lock().map_err(|_| poisoned("chain"))?.events.clone()),
            None => Ok(Vec::new()),
        }
    }

    fn commit_append(
        &self,
        event: Event,
        expected_head: Option<&str>,
        algo: &str,
    ) -> EvidenceResult<CommitOutcome> {
        let slot = self.slot(&event.report_id)?;
        let mut chain = slot.lock().map_err(|_| poisoned("chain"))?;

        let current = chain.record.as_ref().map(|r| r.head_hash.as_str());
        if current != expected_head {
            return Ok(CommitOutcome::HeadMoved {
                current: current.map(str::to_string),
            });
        }

        let record = match chain.record.take() {
            Some(mut record) => {
                record.head_hash = event.hash.clone();
                record.key_id = event.key_id.clone();
                record.event_count += 1;
                record.last_event_at = event.created_at;
                record.updated_at = event.created_at;
                record
            }
            None => ChainRecord {
                report_id: event.report_id,
                head_hash: event.hash.clone(),
                algo: algo.to_string(),
                key_id: event.key_id.clone(),
                event_count: 1,
                last_event_at: event.created_at,
                created_at: event.created_at,
                updated_at: event.created_at,
            },
        };

        chain.events.push(event);
        chain.record = Some(record.clone());
        Ok(CommitOutcome::Committed(record))
    }
}

// ── Payload vault ─────────────────────────────────────────────────────────────

/// A `PayloadSealer` that keeps sensitive detail in process memory.
///
/// It stands in for the encryption collaborator; references look like
/// `vault:<uuid>` and carry no information about the sealed content.
#[derive(Default)]
pub struct InMemoryPayloadVault {
    sealed: Mutex<HashMap<String, (ReportId, Value)>>,
}

impl InMemoryPayloadVault {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PayloadSealer for InMemoryPayloadVault {
    fn seal(&self, report_id: &ReportId, detail: &Value) -> EvidenceResult<String> {
        let reference = format!("vault:{}", uuid::Uuid::new_v4());
        let mut sealed = self.sealed.lock().map_err(|_| EvidenceError::SealFailed {
            reason: "vault lock poisoned".to_string(),
        })?;
        sealed.insert(reference.clone(), (*report_id, detail.clone()));
        Ok(reference)
    }

    fn open(&self, reference: &str) -> EvidenceResult<Value> {
        let sealed = self.sealed.lock().map_err(|_| EvidenceError::SealFailed {
            reason: "vault lock poisoned".to_string(),
        })?;
        sealed
            .get(reference)
            .map(|(_, detail)| detail.clone())
            .ok_or_else(|| EvidenceError::NotFound {
                what: format!("sealed payload {reference}"),
            })
    }
}
