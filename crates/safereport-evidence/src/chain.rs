//! The per-report evidence chain: append and replay verification.
//!
//! Every field that contributes to an event's hash is listed in
//! `HashedFields` so nothing is accidentally omitted:
//!
//!   reportId, type, actorRole, data, sealedRef, createdAt
//!
//! `createdAt` is rendered as RFC 3339 UTC with millisecond precision, and
//! stored timestamps are truncated to the same precision before hashing so
//! that a stored event always re-encodes to the bytes that were hashed.

use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use safereport_contracts::{
    error::{EvidenceError, EvidenceResult},
    event::{ActorRole, ChainRecord, Event, EventDraft, EventType},
    ids::{EventId, ReportId},
    verify::{ChainFailure, EventCheck, Mismatch, VerifyResult},
};
use safereport_core::{
    clock::Clock,
    keyring::KeyRing,
    traits::{ChainStore, CommitOutcome, PayloadSealer},
};

use crate::{
    canonical,
    hasher::{hash_event, CHAIN_ALGO},
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HashedFields<'a> {
    report_id: &'a ReportId,
    #[serde(rename = "type")]
    event_type: EventType,
    actor_role: ActorRole,
    data: &'a Value,
    sealed_ref: Option<&'a str>,
    created_at: String,
}

/// Canonical encoding of the hashed projection of `event` as it belongs
/// to `report_id`.
///
/// The owning report is taken from the chain being verified rather than
/// from the stored event, so an event moved in from another report fails.
pub fn hash_input(report_id: &ReportId, event: &Event) -> EvidenceResult<String> {
    canonical::encode_serializable(&HashedFields {
        report_id,
        event_type: event.event_type,
        actor_role: event.actor_role,
        data: &event.data,
        sealed_ref: event.sealed_ref.as_deref(),
        created_at: event
            .created_at
            .to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

/// Replay `events` from genesis and compare every link to recomputed values.
///
/// Replay continues past the first divergence on recomputed hashes, so the
/// trace marks every downstream link that no longer holds.  `mismatch`
/// records only the first divergence.  An event whose key id the ring does
/// not hold fails with `hash_ok = false` and an empty `expected_hash`.
pub fn verify_events(
    report_id: &ReportId,
    stored_head: &str,
    events: &[Event],
    keys: &KeyRing,
) -> EvidenceResult<VerifyResult> {
    if events.is_empty() {
        return Ok(VerifyResult::no_events(*report_id, stored_head.to_string()));
    }

    let mut expected_prev: Option<String> = None;
    let mut mismatch: Option<Mismatch> = None;
    let mut trace = Vec::with_capacity(events.len());

    for (index, event) in events.iter().enumerate() {
        // An unresolvable key id is itself a divergence; the stored hash then
        // stands in as the link the next event must point at.
        let expected_hash = match keys.get(&event.key_id) {
            Ok(key) => Some(hash_event(
                expected_prev.as_deref(),
                &hash_input(report_id, event)?,
                key.as_bytes(),
            )?),
            Err(EvidenceError::UnknownKey { key_id }) => {
                debug!(report_id = %report_id, index, key_id = %key_id, "event names an unknown key id");
                None
            }
            Err(e) => return Err(e),
        };

        let prev_ok = event.prev_hash == expected_prev;
        let hash_ok = expected_hash.as_deref() == Some(event.hash.as_str());
        trace.push(EventCheck {
            index,
            event_id: event.id,
            prev_ok,
            hash_ok,
        });

        if (!prev_ok || !hash_ok) && mismatch.is_none() {
            mismatch = Some(Mismatch {
                index,
                event_id: event.id,
                event_type: event.event_type,
                created_at: event.created_at,
                expected_prev: expected_prev.clone(),
                stored_prev: event.prev_hash.clone(),
                expected_hash: expected_hash.clone().unwrap_or_default(),
                stored_hash: event.hash.clone(),
                prev_ok,
                hash_ok,
            });
        }

        expected_prev = Some(expected_hash.unwrap_or_else(|| event.hash.clone()));
    }

    let computed_head = expected_prev;
    let failure = match &mismatch {
        Some(m) if !m.prev_ok => Some(ChainFailure::SequenceMismatch),
        Some(_) => Some(ChainFailure::HashMismatch),
        None if computed_head.as_deref() != Some(stored_head) => Some(ChainFailure::HeadMismatch),
        None => None,
    };

    Ok(VerifyResult {
        ok: failure.is_none(),
        report_id: *report_id,
        event_count: events.len(),
        stored_head: Some(stored_head.to_string()),
        computed_head,
        failure,
        mismatch,
        trace,
    })
}

/// Millisecond timestamp strictly after `last`.
fn next_timestamp(now: DateTime<Utc>, last: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let candidate = now.trunc_subsecs(3);
    match last {
        Some(last) if candidate <= last => last + Duration::milliseconds(1),
        _ => candidate,
    }
}

/// Append and verify operations over a `ChainStore`.
///
/// Appends to the same report are serialized by the store's compare-and-set
/// on the head and retried on conflict; appends to different reports never
/// contend.
pub struct EvidenceChain {
    store: Arc<dyn ChainStore>,
    keys: KeyRing,
    clock: Arc<dyn Clock>,
    sealer: Option<Arc<dyn PayloadSealer>>,
    max_attempts: u32,
}

impl EvidenceChain {
    pub const DEFAULT_APPEND_ATTEMPTS: u32 = 16;

    pub fn new(store: Arc<dyn ChainStore>, keys: KeyRing, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            keys,
            clock,
            sealer: None,
            max_attempts: Self::DEFAULT_APPEND_ATTEMPTS,
        }
    }

    /// Route sensitive draft detail through `sealer`.
    pub fn with_sealer(mut self, sealer: Arc<dyn PayloadSealer>) -> Self {
        self.sealer = Some(sealer);
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn keys(&self) -> &KeyRing {
        &self.keys
    }

    /// Append one event to the chain of `report_id`.
    ///
    /// The first append creates the chain record together with the genesis
    /// event.  Returns `ChainConflict` if the head moved on every attempt.
    pub fn append(&self, report_id: &ReportId, draft: EventDraft) -> EvidenceResult<Event> {
        draft.payload.validate()?;
        let event_type = draft.payload.event_type();
        let data = draft.payload.data_value()?;

        let sealed_ref = match (&draft.sensitive, &self.sealer) {
            (Some(detail), Some(sealer)) => Some(sealer.seal(report_id, detail)?),
            (Some(_), None) => {
                return Err(EvidenceError::SealFailed {
                    reason: "sensitive detail supplied but no sealer is configured".to_string(),
                })
            }
            (None, _) => None,
        };

        let (key_id, key) = self.keys.active();
        let event_id = EventId::new();

        for attempt in 1..=self.max_attempts {
            let chain = self.store.chain(report_id)?;
            let prev_hash = chain.as_ref().map(|c| c.head_hash.clone());
            let created_at =
                next_timestamp(self.clock.now(), chain.as_ref().map(|c| c.last_event_at));

            let mut event = Event {
                id: event_id,
                report_id: *report_id,
                event_type,
                actor_role: draft.actor_role,
                data: data.clone(),
                sealed_ref: sealed_ref.clone(),
                key_id: key_id.to_string(),
                prev_hash: prev_hash.clone(),
                hash: String::new(),
                created_at,
            };
            event.hash = hash_event(
                prev_hash.as_deref(),
                &hash_input(report_id, &event)?,
                key.as_bytes(),
            )?;

            match self
                .store
                .commit_append(event.clone(), prev_hash.as_deref(), CHAIN_ALGO)?
            {
                CommitOutcome::Committed(record) => {
                    info!(
                        report_id = %report_id,
                        event_type = %event_type,
                        event_count = record.event_count,
                        head = %record.head_hash,
                        "evidence event appended"
                    );
                    return Ok(event);
                }
                CommitOutcome::HeadMoved { current } => {
                    debug!(
                        report_id = %report_id,
                        attempt,
                        expected = ?prev_hash,
                        current = ?current,
                        "chain head moved, retrying append"
                    );
                }
            }
        }

        warn!(
            report_id = %report_id,
            attempts = self.max_attempts,
            "append abandoned after repeated head conflicts"
        );
        Err(EvidenceError::ChainConflict {
            report_id: report_id.to_string(),
            attempts: self.max_attempts,
        })
    }

    /// Replay the chain of `report_id` and report every divergence.
    ///
    /// Integrity findings, unknown key ids included, are returned in the
    /// `VerifyResult`; `Err` is reserved for store faults.
    pub fn verify(&self, report_id: &ReportId) -> EvidenceResult<VerifyResult> {
        let Some(chain) = self.store.chain(report_id)? else {
            warn!(report_id = %report_id, "verification found no chain record");
            return Ok(VerifyResult::chain_missing(*report_id));
        };
        let events = self.store.events(report_id)?;
        let result = verify_events(report_id, &chain.head_hash, &events, &self.keys)?;

        match (&result.failure, &result.mismatch) {
            (None, _) => debug!(
                report_id = %report_id,
                event_count = result.event_count,
                "evidence chain verified"
            ),
            (Some(failure), Some(m)) => warn!(
                report_id = %report_id,
                failure = failure.code(),
                index = m.index,
                prev_ok = m.prev_ok,
                hash_ok = m.hash_ok,
                "evidence chain divergence"
            ),
            (Some(failure), None) => warn!(
                report_id = %report_id,
                failure = failure.code(),
                "evidence chain failed verification"
            ),
        }

        Ok(result)
    }

    pub fn head(&self, report_id: &ReportId) -> EvidenceResult<Option<ChainRecord>> {
        self.store.chain(report_id)
    }

    pub fn events(&self, report_id: &ReportId) -> EvidenceResult<Vec<Event>> {
        self.store.events(report_id)
    }
}
