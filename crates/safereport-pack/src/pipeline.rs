//! The defense pack pipeline.
//!
//! Lifecycle of one pack:
//!
//! 1. `request` verifies the chain, signs a snapshot of the result and
//!    inserts a `queued` pack (or returns a fresh queued one).
//! 2. The render input is written to object storage and a job is queued for
//!    the out-of-process renderer.  A failure in either step fails the pack.
//! 3. The renderer posts back through `reconcile`, which authenticates the
//!    caller, checks the callback is bound to the pack, and moves it to
//!    `generated` or `failed`.
//! 4. `sweep_stale` fails packs the renderer never answered for.
//!
//! Terminal packs are never written again.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use subtle::ConstantTimeEq;
use tracing::{debug, error, info, warn};

use safereport_config::{PackTiming, Settings};
use safereport_contracts::{
    error::{CallbackRejection, EvidenceError, EvidenceResult},
    ids::{PackId, ReportId, TenantId},
    pack::{
        DefensePack, PackRequestOutcome, PackSnapshot, PackStatus, PackTransition,
        ReconcileOutcome, RenderCallback, RenderInput, RenderJob,
    },
};
use safereport_core::{
    clock::Clock,
    traits::{InsertOutcome, PackStore, RenderInputStore, RenderQueue, ReportDirectory, TransitionOutcome},
};
use safereport_evidence::EvidenceChain;

use crate::signer::PackSigner;

/// Most packs returned by `list`.
pub const LIST_LIMIT: usize = 50;

/// Tag appended to the reason code of packs failed by the sweep.
pub const STALE_TAG: &str = "stale_timeout";

const REASON_MIN: usize = 2;
const REASON_MAX: usize = 60;

/// Object key under which a pack's render input is stored.
pub fn render_input_key(tenant_id: &TenantId, report_id: &ReportId, pack_id: &PackId) -> String {
    format!("packs/{tenant_id}/{report_id}/{pack_id}.json")
}

/// Queue dedup id for a pack's render job.
pub fn dedup_id(tenant_id: &TenantId, report_id: &ReportId, pack_id: &PackId) -> String {
    format!("pack:{tenant_id}:{report_id}:{pack_id}")
}

fn validate_reason(reason_code: &str) -> EvidenceResult<&str> {
    let reason = reason_code.trim();
    let len = reason.chars().count();
    if !(REASON_MIN..=REASON_MAX).contains(&len) {
        return Err(EvidenceError::InvalidRequest {
            reason: format!(
                "reason code must be {REASON_MIN} to {REASON_MAX} characters, got {len}"
            ),
        });
    }
    Ok(reason)
}

fn truncate(message: &str, max_chars: usize) -> String {
    message.chars().take(max_chars).collect()
}

/// The shared secret the renderer presents on callbacks.
///
/// With no secret configured every presented token is refused.
#[derive(Clone, Default)]
pub struct CallbackSecret(Option<String>);

impl CallbackSecret {
    pub fn new(secret: Option<String>) -> Self {
        Self(secret)
    }

    pub fn matches(&self, presented: Option<&str>) -> bool {
        match (&self.0, presented) {
            (Some(secret), Some(presented)) => {
                bool::from(secret.as_bytes().ct_eq(presented.as_bytes()))
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for CallbackSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(_) => f.write_str("CallbackSecret(<redacted>)"),
            None => f.write_str("CallbackSecret(<unset>)"),
        }
    }
}

/// Snapshot, sign, queue and reconcile defense packs.
pub struct PackPipeline {
    chain: Arc<EvidenceChain>,
    packs: Arc<dyn PackStore>,
    inputs: Arc<dyn RenderInputStore>,
    queue: Arc<dyn RenderQueue>,
    directory: Arc<dyn ReportDirectory>,
    clock: Arc<dyn Clock>,
    signer: PackSigner,
    timing: PackTiming,
    callback_secret: CallbackSecret,
}

impl PackPipeline {
    pub fn new(
        chain: Arc<EvidenceChain>,
        packs: Arc<dyn PackStore>,
        inputs: Arc<dyn RenderInputStore>,
        queue: Arc<dyn RenderQueue>,
        directory: Arc<dyn ReportDirectory>,
        clock: Arc<dyn Clock>,
        signer: PackSigner,
    ) -> Self {
        Self {
            chain,
            packs,
            inputs,
            queue,
            directory,
            clock,
            signer,
            timing: PackTiming::default(),
            callback_secret: CallbackSecret::default(),
        }
    }

    pub fn with_timing(mut self, timing: PackTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_callback_secret(mut self, secret: CallbackSecret) -> Self {
        self.callback_secret = secret;
        self
    }

    /// Apply timing and the callback secret from `settings`.
    pub fn configured(self, settings: &Settings) -> Self {
        self.with_timing(settings.pack_timing())
            .with_callback_secret(CallbackSecret::new(
                settings.callback_token().map(str::to_string),
            ))
    }

    pub fn get(&self, pack_id: &PackId) -> EvidenceResult<Option<DefensePack>> {
        self.packs.get(pack_id)
    }

    // ── Request ───────────────────────────────────────────────────────────────

    /// Request a defense pack for `report_id`.
    ///
    /// A queued pack for the same report created inside the freshness window
    /// is returned with `deduped = true` instead of creating a new one.
    /// Packs are created for broken chains too: the snapshot records the
    /// failure.  A storage or queue failure after the pack is inserted is
    /// returned in-band as a `failed` pack.  If that failure cannot be
    /// recorded either, `StoreFailed` names the pack left `queued` for the
    /// stale sweep.
    pub fn request(
        &self,
        report_id: &ReportId,
        reason_code: &str,
    ) -> EvidenceResult<PackRequestOutcome> {
        let reason = validate_reason(reason_code)?;
        self.submit(report_id, reason.to_string())
    }

    /// Request a new pack in place of a failed one.
    ///
    /// The failed pack is left as it is; the new request's reason code is
    /// `retry:{reason}`.
    pub fn retry(&self, pack_id: &PackId, reason_code: &str) -> EvidenceResult<PackRequestOutcome> {
        let reason = validate_reason(reason_code)?;
        let pack = self.packs.get(pack_id)?.ok_or_else(|| EvidenceError::NotFound {
            what: format!("pack {pack_id}"),
        })?;
        if pack.status != PackStatus::Failed {
            return Err(EvidenceError::InvalidTransition {
                reason: format!("only failed packs can be retried; pack {pack_id} is {}", pack.status),
            });
        }
        info!(pack_id = %pack_id, report_id = %pack.report_id, "retrying failed pack");
        self.submit(&pack.report_id, format!("retry:{reason}"))
    }

    fn submit(&self, report_id: &ReportId, reason_code: String) -> EvidenceResult<PackRequestOutcome> {
        let tenant_id = self
            .directory
            .tenant_of(report_id)?
            .ok_or_else(|| EvidenceError::NotFound {
                what: format!("report {report_id}"),
            })?;

        let now = self.clock.now().trunc_subsecs(3);
        let fresh_since = now - self.timing.freshness_window;

        if let Some(existing) = self.packs.find_fresh_queued(report_id, fresh_since)? {
            debug!(report_id = %report_id, pack_id = %existing.id, "returning fresh queued pack");
            return Ok(PackRequestOutcome {
                pack: existing,
                deduped: true,
            });
        }

        let verify = self.chain.verify(report_id)?;
        let events = self.chain.events(report_id)?;

        let pack_id = PackId::new();
        let snapshot = PackSnapshot::capture(pack_id, tenant_id, now, &verify);
        let (signing_key_id, signature) = self.signer.sign(&snapshot)?;
        let input_key = render_input_key(&tenant_id, report_id, &pack_id);

        let pack = DefensePack {
            id: pack_id,
            report_id: *report_id,
            tenant_id,
            status: PackStatus::Queued,
            reason_code: reason_code.clone(),
            snapshot: snapshot.clone(),
            signature: signature.clone(),
            signing_key_id,
            render_input_key: input_key.clone(),
            artifact_ref: None,
            error: None,
            created_at: now,
            updated_at: now,
            generated_at: None,
        };

        if let InsertOutcome::Existing(existing) =
            self.packs.insert_unless_fresh(pack.clone(), fresh_since)?
        {
            debug!(report_id = %report_id, pack_id = %existing.id, "lost insert race to fresh pack");
            return Ok(PackRequestOutcome {
                pack: existing,
                deduped: true,
            });
        }

        info!(
            report_id = %report_id,
            pack_id = %pack_id,
            chain_ok = verify.ok,
            event_count = verify.event_count,
            "defense pack queued"
        );

        let input = RenderInput {
            pack_id,
            report_id: *report_id,
            tenant_id,
            reason_code,
            snapshot,
            signature: signature.clone(),
            verify,
            events,
        };
        if let Err(e) = self.inputs.put(&input_key, &input) {
            return self.fail_submission(pack_id, e);
        }

        let job = RenderJob {
            pack_id,
            report_id: *report_id,
            tenant_id,
            signature,
            render_input_key: input_key,
            dedup_id: dedup_id(&tenant_id, report_id, &pack_id),
        };
        if let Err(e) = self.queue.submit(&job) {
            return self.fail_submission(pack_id, e);
        }

        Ok(PackRequestOutcome {
            pack,
            deduped: false,
        })
    }

    fn fail_submission(
        &self,
        pack_id: PackId,
        cause: EvidenceError,
    ) -> EvidenceResult<PackRequestOutcome> {
        warn!(pack_id = %pack_id, error = %cause, "pack submission failed");
        let transition = PackTransition::Failed {
            error: truncate(&cause.to_string(), self.timing.error_max_len),
            reason_tag: None,
        };
        let pack = match self
            .packs
            .transition_if_queued(&pack_id, &transition, self.clock.now())
        {
            Ok(TransitionOutcome::Applied(pack) | TransitionOutcome::AlreadyTerminal(pack)) => pack,
            Err(e) => {
                error!(
                    pack_id = %pack_id,
                    cause = %cause,
                    error = %e,
                    "could not record submission failure; pack stays queued until the stale sweep"
                );
                return Err(EvidenceError::StoreFailed {
                    reason: format!(
                        "pack {pack_id} left queued after submission failure ({cause}); \
                         the stale sweep will fail it: {e}"
                    ),
                });
            }
        };
        Ok(PackRequestOutcome {
            pack,
            deduped: false,
        })
    }

    // ── Reconcile ─────────────────────────────────────────────────────────────

    /// Apply the renderer's completion callback.
    ///
    /// Checks run in order: credential, pack lookup, binding of report,
    /// tenant and signature to the stored pack, then payload shape.  Any
    /// rejection leaves the pack untouched.  A callback for a pack that is
    /// already terminal is accepted as a no-op.
    pub fn reconcile(
        &self,
        token: Option<&str>,
        callback: &RenderCallback,
    ) -> Result<ReconcileOutcome, CallbackRejection> {
        if !self.callback_secret.matches(token) {
            warn!(pack_id = %callback.pack_id, "render callback rejected: bad credential");
            return Err(CallbackRejection::Unauthorized);
        }

        let pack = match self.packs.get(&callback.pack_id) {
            Ok(Some(pack)) => pack,
            Ok(None) => {
                warn!(pack_id = %callback.pack_id, "render callback for unknown pack");
                return Err(CallbackRejection::PackNotFound);
            }
            Err(e) => {
                warn!(pack_id = %callback.pack_id, error = %e, "pack lookup failed");
                return Err(CallbackRejection::Unavailable);
            }
        };

        let bound = pack.report_id == callback.report_id
            && pack.tenant_id == callback.tenant_id
            && bool::from(pack.signature.as_bytes().ct_eq(callback.signature.as_bytes()));
        if !bound {
            warn!(pack_id = %pack.id, "render callback does not match pack binding");
            return Err(CallbackRejection::Mismatch);
        }

        let transition = if callback.ok {
            match callback.artifact_ref.as_deref().map(str::trim) {
                Some(artifact) if !artifact.is_empty() => PackTransition::Generated {
                    artifact_ref: artifact.to_string(),
                },
                _ => {
                    warn!(pack_id = %pack.id, "successful render callback without artifact");
                    return Err(CallbackRejection::BadRequest);
                }
            }
        } else {
            let error = callback.error.as_deref().unwrap_or("render failed");
            PackTransition::Failed {
                error: truncate(error, self.timing.error_max_len),
                reason_tag: None,
            }
        };

        match self
            .packs
            .transition_if_queued(&pack.id, &transition, self.clock.now())
        {
            Ok(TransitionOutcome::Applied(updated)) => {
                info!(pack_id = %updated.id, status = %updated.status, "render callback applied");
                Ok(ReconcileOutcome::Applied {
                    status: updated.status,
                })
            }
            Ok(TransitionOutcome::AlreadyTerminal(current)) => {
                debug!(pack_id = %current.id, status = %current.status, "render callback for terminal pack ignored");
                Ok(ReconcileOutcome::AlreadyTerminal {
                    status: current.status,
                })
            }
            Err(EvidenceError::NotFound { .. }) => Err(CallbackRejection::PackNotFound),
            Err(e) => {
                warn!(pack_id = %pack.id, error = %e, "render callback could not be applied");
                Err(CallbackRejection::Unavailable)
            }
        }
    }

    // ── Sweep and list ────────────────────────────────────────────────────────

    /// Fail every queued pack older than the stale timeout.
    ///
    /// Returns how many packs this call moved to `failed`.
    pub fn sweep_stale(&self) -> EvidenceResult<usize> {
        self.sweep(None)
    }

    fn sweep(&self, report_id: Option<&ReportId>) -> EvidenceResult<usize> {
        let now = self.clock.now();
        let cutoff: DateTime<Utc> = now - self.timing.stale_timeout;
        let transition = PackTransition::Failed {
            error: format!(
                "render did not complete within {} seconds",
                self.timing.stale_timeout.num_seconds()
            ),
            reason_tag: Some(STALE_TAG.to_string()),
        };

        let mut swept = 0;
        for pack_id in self.packs.queued_before(cutoff, report_id)? {
            if let TransitionOutcome::Applied(_) =
                self.packs.transition_if_queued(&pack_id, &transition, now)?
            {
                swept += 1;
            }
        }
        if swept > 0 {
            info!(swept, "stale defense packs failed");
        }
        Ok(swept)
    }

    /// Packs for `report_id`, newest first, after sweeping its stale packs.
    pub fn list(&self, report_id: &ReportId) -> EvidenceResult<Vec<DefensePack>> {
        self.sweep(Some(report_id))?;
        self.packs.list_for_report(report_id, LIST_LIMIT)
    }

    /// Recompute `pack`'s snapshot signature under its recorded key id.
    pub fn verify_signature(&self, pack: &DefensePack) -> EvidenceResult<bool> {
        if pack.snapshot.pack_id != pack.id || pack.snapshot.report_id != pack.report_id {
            return Ok(false);
        }
        self.signer
            .verify(&pack.snapshot, &pack.signing_key_id, &pack.signature)
    }
}
