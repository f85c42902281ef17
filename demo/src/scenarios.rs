//! Demo scenarios, each run against fresh in-memory collaborators.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;

use safereport_anchor::{announcement_text, certificate, AnchorService, InMemoryAnchorStore};
use safereport_config::Settings;
use safereport_contracts::{
    error::EvidenceResult,
    event::{
        ActionDecidedData, ActorRole, ClosedData, EventDraft, EventPayload,
        InvestigationStartedData, ProtectiveActionData, ReceivedData,
    },
    ids::{ReportId, TenantId},
    pack::RenderCallback,
    verify::VerifyResult,
};
use safereport_core::{clock::ManualClock, keyring::KeyRing};
use safereport_evidence::{EvidenceChain, InMemoryChainStore, InMemoryPayloadVault};
use safereport_pack::{
    InMemoryPackStore, InMemoryRenderInputStore, InMemoryRenderQueue, PackPipeline, PackSigner,
    StaticReportDirectory,
};

/// Embedded demo configuration.
pub const DEMO_CONFIG: &str = include_str!("../config/safereport.toml");

// ── Wiring ────────────────────────────────────────────────────────────────────

struct World {
    settings: Settings,
    clock: Arc<ManualClock>,
    chains: Arc<InMemoryChainStore>,
    chain: Arc<EvidenceChain>,
    directory: Arc<StaticReportDirectory>,
    queue: Arc<InMemoryRenderQueue>,
    pipeline: PackPipeline,
    anchors: AnchorService,
    tenant: TenantId,
}

impl World {
    fn new() -> EvidenceResult<Self> {
        let settings = Settings::from_toml_str(DEMO_CONFIG)?;
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let chains = Arc::new(InMemoryChainStore::new());
        let chain = Arc::new(
            EvidenceChain::new(chains.clone(), settings.chain_keyring().clone(), clock.clone())
                .with_sealer(Arc::new(InMemoryPayloadVault::new()))
                .with_max_attempts(settings.append_attempts()),
        );
        let directory = Arc::new(StaticReportDirectory::new());
        let queue = Arc::new(InMemoryRenderQueue::new());
        let pipeline = PackPipeline::new(
            chain.clone(),
            Arc::new(InMemoryPackStore::new()),
            Arc::new(InMemoryRenderInputStore::new()),
            queue.clone(),
            directory.clone(),
            clock.clone(),
            PackSigner::new(settings.pack_keyring().clone()),
        )
        .configured(&settings);
        let anchors = AnchorService::new(
            Arc::new(InMemoryAnchorStore::new()),
            chains.clone(),
            clock.clone(),
        );

        Ok(Self {
            settings,
            clock,
            chains,
            chain,
            directory,
            queue,
            pipeline,
            anchors,
            tenant: TenantId::new(),
        })
    }

    /// Register a report and record a short handling history for it.
    fn handled_report(&self) -> EvidenceResult<ReportId> {
        let report = ReportId::new();
        self.directory.register(report, self.tenant)?;
        for draft in handling_history() {
            self.chain.append(&report, draft)?;
            self.clock.advance(Duration::hours(4));
        }
        Ok(report)
    }
}

fn handling_history() -> Vec<EventDraft> {
    vec![
        EventDraft::new(
            ActorRole::User,
            EventPayload::Received(ReceivedData {
                channel: "public".to_string(),
                category: Some("harassment".to_string()),
            }),
        )
        .with_sensitive(json!({ "narrative": "sealed outside the chain" })),
        EventDraft::new(
            ActorRole::Admin,
            EventPayload::InvestigationStarted(InvestigationStartedData {
                owner: "HR lead".to_string(),
                ..Default::default()
            }),
        ),
        EventDraft::new(
            ActorRole::Admin,
            EventPayload::ProtectiveAction(ProtectiveActionData {
                action: "separate working shifts".to_string(),
                ..Default::default()
            }),
        ),
        EventDraft::new(
            ActorRole::Admin,
            EventPayload::ActionDecided(ActionDecidedData {
                decision: "written warning".to_string(),
                ..Default::default()
            }),
        ),
    ]
}

fn print_verify(result: &VerifyResult) {
    println!(
        "  verify: ok={} events={} failure={}",
        result.ok,
        result.event_count,
        result.failure.map(|f| f.code()).unwrap_or("-")
    );
    if let Some(m) = &result.mismatch {
        println!(
            "  first divergence: index={} type={} prev_ok={} hash_ok={}",
            m.index, m.event_type, m.prev_ok, m.hash_ok
        );
    }
    for check in &result.trace {
        println!(
            "    [{}] prev {}  hash {}",
            check.index,
            if check.prev_ok { "ok " } else { "BAD" },
            if check.hash_ok { "ok " } else { "BAD" },
        );
    }
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

/// Edit one stored event and watch verification pinpoint it.
pub fn tamper_detection() -> EvidenceResult<()> {
    println!("Scenario: tamper detection");
    let world = World::new()?;
    let report = world.handled_report()?;
    print_verify(&world.chain.verify(&report)?);

    println!("  editing stored event 1 directly in storage ...");
    world.chains.with_stored_events_mut(&report, |events| {
        events[1].data = json!({ "owner": "someone else" });
    })?;
    print_verify(&world.chain.verify(&report)?);
    println!();
    Ok(())
}

/// Old events keep verifying after the active chain key changes.
pub fn key_rotation() -> EvidenceResult<()> {
    println!("Scenario: key rotation");
    let world = World::new()?;
    let current = world.settings.chain_keyring();

    let retired_id = current
        .key_ids()
        .find(|id| *id != current.active_id())
        .unwrap_or(current.active_id())
        .to_string();
    let retired = KeyRing::new(
        retired_id.clone(),
        current
            .key_ids()
            .map(|id| Ok((id.to_string(), current.get(id)?.clone())))
            .collect::<EvidenceResult<Vec<_>>>()?,
    )?;

    let report = ReportId::new();
    let before = EvidenceChain::new(world.chains.clone(), retired, world.clock.clone());
    before.append(&report, handling_history().remove(1))?;
    world.clock.advance(Duration::days(30));
    world.chain.append(&report, handling_history().remove(3))?;

    for event in world.chain.events(&report)? {
        println!("  {} signed with {}", event.event_type, event.key_id);
    }
    print_verify(&world.chain.verify(&report)?);
    println!();
    Ok(())
}

/// Request, dedupe, render callback and stale sweep of defense packs.
pub fn pack_lifecycle() -> EvidenceResult<()> {
    println!("Scenario: defense pack lifecycle");
    run_pack_lifecycle(&World::new()?)
}

fn run_pack_lifecycle(world: &World) -> EvidenceResult<()> {
    let report = world.handled_report()?;
    let token = world.settings.callback_token();

    let first = world.pipeline.request(&report, "litigation hold")?;
    println!("  requested pack {} ({})", first.pack.id, first.pack.status);
    world.clock.advance(Duration::minutes(5));
    let again = world.pipeline.request(&report, "litigation hold")?;
    println!("  second request after 5 min: deduped={} same={}", again.deduped, again.pack.id == first.pack.id);

    let jobs = world.queue.jobs()?;
    let Some(job) = jobs.iter().find(|job| job.pack_id == first.pack.id) else {
        println!(
            "  no render job for pack {} ({}): {}",
            first.pack.id,
            first.pack.status,
            first.pack.error.as_deref().unwrap_or("-")
        );
        println!();
        return Ok(());
    };
    let mut callback = RenderCallback {
        pack_id: job.pack_id,
        report_id: job.report_id,
        tenant_id: job.tenant_id,
        signature: "f".repeat(64),
        ok: true,
        artifact_ref: Some(format!("artifacts/{}.pdf", job.pack_id)),
        error: None,
    };
    match world.pipeline.reconcile(token, &callback) {
        Ok(outcome) => println!("  forged callback accepted?! {outcome:?}"),
        Err(rejection) => println!("  forged callback rejected: {} ({})", rejection, rejection.status_code()),
    }
    callback.signature = job.signature.clone();
    match world.pipeline.reconcile(token, &callback) {
        Ok(outcome) => println!("  renderer callback: {outcome:?}"),
        Err(rejection) => println!("  renderer callback rejected: {rejection}"),
    }
    if let Some(pack) = world.pipeline.get(&first.pack.id)? {
        println!(
            "  pack now {} artifact={} signature valid={}",
            pack.status,
            pack.artifact_ref.as_deref().unwrap_or("-"),
            world.pipeline.verify_signature(&pack)?
        );
    }

    let abandoned = world.handled_report()?;
    let pending = world.pipeline.request(&abandoned, "audit")?.pack;
    println!("  pack {} queued; renderer never answers ...", pending.id);
    world.clock.advance(Duration::minutes(16));
    for pack in world.pipeline.list(&abandoned)? {
        println!("  after 16 min: {} {} reason={}", pack.id, pack.status, pack.reason_code);
    }
    println!();
    Ok(())
}

/// Anchor several chain heads and prove one report's inclusion.
pub fn anchoring() -> EvidenceResult<()> {
    println!("Scenario: Merkle anchoring");
    let world = World::new()?;
    let reports = [
        world.handled_report()?,
        world.handled_report()?,
        world.handled_report()?,
    ];

    let Some(anchor) = world.anchors.create_anchor_from_heads(&reports)? else {
        println!("  nothing to anchor");
        return Ok(());
    };
    println!("  anchor {} root {}", anchor.id, anchor.merkle_root);
    println!();
    for line in announcement_text(&anchor).lines() {
        println!("  | {line}");
    }
    println!();

    let anchor = world
        .anchors
        .confirm_anchor(&anchor.id, "demo-post-0001", Some("https://example.org/demo-post-0001"))?;
    let report = reports[1];
    if let Some(head) = world.chain.head(&report)? {
        let inclusion = world.anchors.verify_inclusion(&anchor.id, &head.head_hash)?;
        println!(
            "  report {} included: {} ({} proof steps)",
            report,
            inclusion.verified,
            inclusion.proof.map(|p| p.siblings.len()).unwrap_or(0)
        );
        println!("{}", certificate(&anchor, &report, &head.head_hash));
    }
    let verified = world.anchors.mark_verified(&anchor.id)?;
    println!("  anchor status: {:?}", verified.status);
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{run_pack_lifecycle, World};

    /// With the render queue down the pack fails and the walk-through stops early.
    #[test]
    fn test_pack_lifecycle_without_render_job() {
        let world = World::new().unwrap();
        world.queue.set_unavailable(true);
        run_pack_lifecycle(&world).unwrap();
        assert!(world.queue.jobs().unwrap().is_empty());
    }
}
