//! # safereport-contracts
//!
//! Shared types and error contracts for the SafeReport evidence integrity
//! subsystem.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate beyond payload validation and the pack transition rule; the rest is
//! data definitions and error types.

pub mod anchor;
pub mod error;
pub mod event;
pub mod ids;
pub mod pack;
pub mod verify;

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use error::{CallbackRejection, EvidenceError};
    use event::{
        ClosedData, EventPayload, EventType, FactFindingData, InvestigationStartedData,
        ReceivedData, ReportStatus,
    };
    use ids::{PackId, ReportId, TenantId};
    use pack::{DefensePack, PackSnapshot, PackStatus, PackTransition};
    use verify::VerifyResult;

    fn queued_pack() -> DefensePack {
        let at = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let report_id = ReportId::new();
        let tenant_id = TenantId::new();
        let pack_id = PackId::new();
        let verify = VerifyResult::chain_missing(report_id);
        DefensePack {
            id: pack_id,
            report_id,
            tenant_id,
            status: PackStatus::Queued,
            reason_code: "audit".to_string(),
            snapshot: PackSnapshot::capture(pack_id, tenant_id, at, &verify),
            signature: "ab".repeat(32),
            signing_key_id: "p1".to_string(),
            render_input_key: "packs/x.json".to_string(),
            artifact_ref: None,
            error: None,
            created_at: at,
            updated_at: at,
            generated_at: None,
        }
    }

    // ── Payloads ─────────────────────────────────────────────────────────────

    #[test]
    fn payload_deserializes_adjacently_tagged() {
        let payload: EventPayload = serde_json::from_value(json!({
            "type": "investigation_started",
            "data": { "owner": "HR lead" }
        }))
        .unwrap();

        assert_eq!(payload.event_type(), EventType::InvestigationStarted);
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn payload_rejects_unknown_fields() {
        let result: Result<EventPayload, _> = serde_json::from_value(json!({
            "type": "closed",
            "data": { "outcome": "resolved", "victimName": "x" }
        }));
        assert!(result.is_err());
    }

    #[test]
    fn blank_required_field_is_rejected() {
        let payload = EventPayload::InvestigationStarted(InvestigationStartedData {
            owner: "   ".to_string(),
            ..Default::default()
        });
        match payload.validate() {
            Err(EvidenceError::InvalidPayload { reason }) => {
                assert!(reason.contains("data.owner"), "unexpected reason: {reason}");
            }
            other => panic!("expected InvalidPayload, got {:?}", other),
        }
    }

    #[test]
    fn fact_finding_accepts_either_field() {
        let by_count = EventPayload::FactFinding(FactFindingData {
            interview_count: Some(3),
            ..Default::default()
        });
        let by_summary = EventPayload::FactFinding(FactFindingData {
            evidence_summary: Some("two witnesses".to_string()),
            ..Default::default()
        });
        let neither = EventPayload::FactFinding(FactFindingData::default());

        assert!(by_count.validate().is_ok());
        assert!(by_summary.validate().is_ok());
        assert!(neither.validate().is_err());
    }

    #[test]
    fn data_value_omits_absent_optionals() {
        let payload = EventPayload::Received(ReceivedData {
            channel: "public".to_string(),
            category: None,
        });
        assert_eq!(payload.data_value().unwrap(), json!({ "channel": "public" }));
    }

    #[test]
    fn implied_status_follows_lifecycle() {
        assert_eq!(EventType::Received.implied_status(), ReportStatus::Received);
        assert_eq!(
            EventType::InvestigationStarted.implied_status(),
            ReportStatus::Investigating
        );
        assert_eq!(EventType::Prevention.implied_status(), ReportStatus::InProgress);
        assert_eq!(
            EventPayload::Closed(ClosedData {
                outcome: "done".to_string(),
                ..Default::default()
            })
            .event_type()
            .implied_status(),
            ReportStatus::Closed
        );
    }

    // ── Pack transitions ─────────────────────────────────────────────────────

    #[test]
    fn queued_pack_accepts_one_transition() {
        let mut pack = queued_pack();
        let later = pack.created_at + chrono::Duration::minutes(2);

        assert!(pack.apply(
            &PackTransition::Generated {
                artifact_ref: "packs/a.pdf".to_string()
            },
            later
        ));
        assert_eq!(pack.status, PackStatus::Generated);
        assert_eq!(pack.generated_at, Some(later));

        // Terminal: a late failure must not overwrite the generated record.
        assert!(!pack.apply(
            &PackTransition::Failed {
                error: "late".to_string(),
                reason_tag: Some("stale_timeout".to_string()),
            },
            later
        ));
        assert_eq!(pack.status, PackStatus::Generated);
        assert_eq!(pack.reason_code, "audit");
        assert!(pack.error.is_none());
    }

    #[test]
    fn failed_transition_tags_reason_code() {
        let mut pack = queued_pack();
        let at = pack.created_at;
        pack.apply(
            &PackTransition::Failed {
                error: "stale_timeout".to_string(),
                reason_tag: Some("stale_timeout".to_string()),
            },
            at,
        );
        assert_eq!(pack.status, PackStatus::Failed);
        assert_eq!(pack.reason_code, "audit:stale_timeout");
    }

    // ── Errors ───────────────────────────────────────────────────────────────

    #[test]
    fn callback_rejections_are_generic() {
        assert_eq!(CallbackRejection::Mismatch.to_string(), "mismatch");
        assert_eq!(CallbackRejection::Mismatch.status_code(), 409);
        assert_eq!(CallbackRejection::Unauthorized.status_code(), 401);
    }

    #[test]
    fn error_chain_conflict_display() {
        let err = EvidenceError::ChainConflict {
            report_id: "r-1".to_string(),
            attempts: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("r-1"));
        assert!(msg.contains("4"));
    }

    #[test]
    fn ids_round_trip_through_display() {
        let id = ReportId::new();
        let parsed: ReportId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
