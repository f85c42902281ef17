//! Full flow: configuration, evidence chain, defense pack render handshake
//! and Merkle anchoring, wired together over the in-memory collaborators.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use serde_json::json;

use safereport_anchor::{certificate, verify_proof, AnchorService, InMemoryAnchorStore};
use safereport_config::Settings;
use safereport_contracts::{
    event::{
        ActionDecidedData, ActorRole, ClosedData, EventDraft, EventPayload, InvestigationStartedData,
        ReceivedData,
    },
    ids::{ReportId, TenantId},
    pack::{PackStatus, ReconcileOutcome, RenderCallback},
    verify::ChainFailure,
};
use safereport_core::{clock::ManualClock, traits::RenderInputStore};
use safereport_evidence::{EvidenceChain, InMemoryChainStore, InMemoryPayloadVault};
use safereport_pack::{
    InMemoryPackStore, InMemoryRenderInputStore, InMemoryRenderQueue, PackPipeline, PackSigner,
    StaticReportDirectory,
};

const CONFIG: &str = r#"
[chain]
active_key_id = "v1"
append_retries = 8

[chain.keys]
v1 = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f"

[pack]
active_key_id = "p1"
callback_token = "renderer-secret"

[pack.keys]
p1 = "cGFjay1zaWduaW5nLWtleS0wMDAwMDAwMQ=="
"#;

#[test]
fn evidence_pack_and_anchor_flow() {
    let settings = Settings::from_toml_str(CONFIG).unwrap();
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 15, 0).unwrap(),
    ));

    let chains = Arc::new(InMemoryChainStore::new());
    let chain = Arc::new(
        EvidenceChain::new(chains.clone(), settings.chain_keyring().clone(), clock.clone())
            .with_sealer(Arc::new(InMemoryPayloadVault::new()))
            .with_max_attempts(settings.append_attempts()),
    );

    let directory = Arc::new(StaticReportDirectory::new());
    let inputs = Arc::new(InMemoryRenderInputStore::new());
    let queue = Arc::new(InMemoryRenderQueue::new());
    let pipeline = PackPipeline::new(
        chain.clone(),
        Arc::new(InMemoryPackStore::new()),
        inputs.clone(),
        queue.clone(),
        directory.clone(),
        clock.clone(),
        PackSigner::new(settings.pack_keyring().clone()),
    )
    .configured(&settings);

    // ── Intake and handling ───────────────────────────────────────────────────

    let tenant = TenantId::new();
    let report = ReportId::new();
    directory.register(report, tenant).unwrap();

    let drafts = [
        EventDraft::new(
            ActorRole::User,
            EventPayload::Received(ReceivedData {
                channel: "public".to_string(),
                category: Some("harassment".to_string()),
            }),
        )
        .with_sensitive(json!({ "narrative": "details withheld from the chain" })),
        EventDraft::new(
            ActorRole::Admin,
            EventPayload::InvestigationStarted(InvestigationStartedData {
                owner: "HR lead".to_string(),
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
        EventDraft::new(
            ActorRole::Admin,
            EventPayload::Closed(ClosedData {
                outcome: "resolved".to_string(),
                ..Default::default()
            }),
        ),
    ];
    for draft in drafts {
        chain.append(&report, draft).unwrap();
        clock.advance(Duration::minutes(30));
    }
    assert!(chain.verify(&report).unwrap().ok);

    // ── Defense pack ──────────────────────────────────────────────────────────

    let pack = pipeline.request(&report, "litigation").unwrap().pack;
    assert_eq!(pack.status, PackStatus::Queued);
    assert!(pack.snapshot.ok);

    // The renderer picks up the job and reads its input.
    let jobs = queue.jobs().unwrap();
    assert_eq!(jobs.len(), 1);
    let input = inputs.get(&jobs[0].render_input_key).unwrap().unwrap();
    assert_eq!(input.events.len(), 4);
    assert!(input.events[0].sealed_ref.is_some());
    assert!(!input.events[0].data.to_string().contains("withheld"));

    clock.advance(Duration::minutes(3));
    let callback = RenderCallback {
        pack_id: jobs[0].pack_id,
        report_id: jobs[0].report_id,
        tenant_id: jobs[0].tenant_id,
        signature: jobs[0].signature.clone(),
        ok: true,
        artifact_ref: Some(format!("artifacts/{}.pdf", jobs[0].pack_id)),
        error: None,
    };
    assert_eq!(
        pipeline.reconcile(Some("renderer-secret"), &callback).unwrap(),
        ReconcileOutcome::Applied {
            status: PackStatus::Generated
        }
    );
    let generated = pipeline.get(&pack.id).unwrap().unwrap();
    assert!(pipeline.verify_signature(&generated).unwrap());

    // ── Anchoring ─────────────────────────────────────────────────────────────

    let other = ReportId::new();
    directory.register(other, tenant).unwrap();
    chain
        .append(
            &other,
            EventDraft::new(
                ActorRole::User,
                EventPayload::Received(ReceivedData {
                    channel: "partner".to_string(),
                    category: None,
                }),
            ),
        )
        .unwrap();

    let anchors = AnchorService::new(Arc::new(InMemoryAnchorStore::new()), chains.clone(), clock.clone());
    let anchor = anchors
        .create_anchor_from_heads(&[report, other])
        .unwrap()
        .unwrap();
    let anchor = anchors
        .confirm_anchor(&anchor.id, "post-1001", Some("https://example.org/post-1001"))
        .unwrap();

    let head = chain.head(&report).unwrap().unwrap().head_hash;
    let inclusion = anchors.verify_inclusion(&anchor.id, &head).unwrap();
    assert!(inclusion.verified);
    assert!(verify_proof(&inclusion.proof.unwrap()));
    assert!(certificate(&anchor, &report, &head).contains("post-1001"));

    // ── Tampering after the fact ──────────────────────────────────────────────

    chains
        .with_stored_events_mut(&report, |events| {
            events[2].data = json!({ "decision": "no action" });
        })
        .unwrap();

    let result = chain.verify(&report).unwrap();
    assert_eq!(result.failure, Some(ChainFailure::HashMismatch));
    assert_eq!(result.mismatch.as_ref().map(|m| m.index), Some(2));

    let second = pipeline.request(&report, "post-incident audit").unwrap().pack;
    assert_ne!(second.id, pack.id);
    assert!(!second.snapshot.ok);

    // The anchored head still proves what the chain looked like before.
    assert!(anchors.verify_inclusion(&anchor.id, &head).unwrap().verified);
}
