//! Report lifecycle events and the evidence chain record.
//!
//! An `EventDraft` is what a collaborator hands to the chain: a typed
//! payload plus optional sensitive detail.  The chain turns it into an
//! `Event`, whose `data` field holds the JSON projection of the payload that
//! was actually hashed.  Once persisted, an `Event` is never modified.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{EvidenceError, EvidenceResult},
    ids::{EventId, ReportId},
};

// ── Tags ──────────────────────────────────────────────────────────────────────

/// The closed set of report lifecycle tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Received,
    InvestigationStarted,
    ProtectiveAction,
    FactFinding,
    ActionDecided,
    ActionExecuted,
    Prevention,
    Closed,
}

impl EventType {
    /// The wire tag, identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Received => "received",
            EventType::InvestigationStarted => "investigation_started",
            EventType::ProtectiveAction => "protective_action",
            EventType::FactFinding => "fact_finding",
            EventType::ActionDecided => "action_decided",
            EventType::ActionExecuted => "action_executed",
            EventType::Prevention => "prevention",
            EventType::Closed => "closed",
        }
    }

    /// The report status this event moves the report into.
    pub fn implied_status(&self) -> ReportStatus {
        match self {
            EventType::Received => ReportStatus::Received,
            EventType::InvestigationStarted => ReportStatus::Investigating,
            EventType::ProtectiveAction
            | EventType::FactFinding
            | EventType::ActionDecided
            | EventType::ActionExecuted
            | EventType::Prevention => ReportStatus::InProgress,
            EventType::Closed => ReportStatus::Closed,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The category of caller that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    User,
    Admin,
    Partner,
    System,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::User => "user",
            ActorRole::Admin => "admin",
            ActorRole::Partner => "partner",
            ActorRole::System => "system",
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse report status derived from the most recent event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Received,
    Investigating,
    InProgress,
    Closed,
}

// ── Payload variants ──────────────────────────────────────────────────────────

const SHORT_TEXT_MAX: usize = 120;
const LONG_TEXT_MAX: usize = 2000;
const INTERVIEW_COUNT_MAX: u32 = 999;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReceivedData {
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InvestigationStartedData {
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProtectiveActionData {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responsible: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// At least one of `interview_count` or `evidence_summary` must be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FactFindingData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interview_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ActionDecidedData {
    pub decision: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ActionExecutedData {
    pub execution_summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PreventionData {
    pub measure: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ClosedData {
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// The non-sensitive payload of an event, one variant per lifecycle tag.
///
/// Serialized adjacently tagged, e.g.
/// `{"type":"closed","data":{"outcome":"resolved"}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    Received(ReceivedData),
    InvestigationStarted(InvestigationStartedData),
    ProtectiveAction(ProtectiveActionData),
    FactFinding(FactFindingData),
    ActionDecided(ActionDecidedData),
    ActionExecuted(ActionExecutedData),
    Prevention(PreventionData),
    Closed(ClosedData),
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::Received(_) => EventType::Received,
            EventPayload::InvestigationStarted(_) => EventType::InvestigationStarted,
            EventPayload::ProtectiveAction(_) => EventType::ProtectiveAction,
            EventPayload::FactFinding(_) => EventType::FactFinding,
            EventPayload::ActionDecided(_) => EventType::ActionDecided,
            EventPayload::ActionExecuted(_) => EventType::ActionExecuted,
            EventPayload::Prevention(_) => EventType::Prevention,
            EventPayload::Closed(_) => EventType::Closed,
        }
    }

    /// Check the variant's minimum fields and length bounds.
    pub fn validate(&self) -> EvidenceResult<()> {
        match self {
            EventPayload::Received(d) => {
                required_text("channel", &d.channel, 2, 60)?;
                optional_text("category", &d.category, 80)
            }
            EventPayload::InvestigationStarted(d) => {
                required_text("owner", &d.owner, 2, SHORT_TEXT_MAX)?;
                optional_text("notes", &d.notes, LONG_TEXT_MAX)
            }
            EventPayload::ProtectiveAction(d) => {
                required_text("action", &d.action, 2, 500)?;
                optional_text("responsible", &d.responsible, SHORT_TEXT_MAX)?;
                optional_text("notes", &d.notes, LONG_TEXT_MAX)
            }
            EventPayload::FactFinding(d) => {
                let has_summary = d
                    .evidence_summary
                    .as_deref()
                    .is_some_and(|s| !s.trim().is_empty());
                if d.interview_count.is_none() && !has_summary {
                    return Err(EvidenceError::InvalidPayload {
                        reason: "fact_finding requires evidenceSummary or interviewCount"
                            .to_string(),
                    });
                }
                if d.interview_count.is_some_and(|n| n > INTERVIEW_COUNT_MAX) {
                    return Err(EvidenceError::InvalidPayload {
                        reason: format!("interviewCount must be at most {INTERVIEW_COUNT_MAX}"),
                    });
                }
                optional_text("evidenceSummary", &d.evidence_summary, LONG_TEXT_MAX)?;
                optional_text("notes", &d.notes, LONG_TEXT_MAX)
            }
            EventPayload::ActionDecided(d) => {
                required_text("decision", &d.decision, 2, LONG_TEXT_MAX)?;
                optional_text("notes", &d.notes, LONG_TEXT_MAX)
            }
            EventPayload::ActionExecuted(d) => {
                required_text("executionSummary", &d.execution_summary, 2, LONG_TEXT_MAX)?;
                optional_text("notes", &d.notes, LONG_TEXT_MAX)
            }
            EventPayload::Prevention(d) => {
                required_text("measure", &d.measure, 2, LONG_TEXT_MAX)?;
                optional_text("notes", &d.notes, LONG_TEXT_MAX)
            }
            EventPayload::Closed(d) => {
                required_text("outcome", &d.outcome, 2, LONG_TEXT_MAX)?;
                optional_text("notes", &d.notes, LONG_TEXT_MAX)
            }
        }
    }

    /// The JSON projection of the variant's data, as stored and hashed.
    pub fn data_value(&self) -> EvidenceResult<Value> {
        let value = match self {
            EventPayload::Received(d) => serde_json::to_value(d)?,
            EventPayload::InvestigationStarted(d) => serde_json::to_value(d)?,
            EventPayload::ProtectiveAction(d) => serde_json::to_value(d)?,
            EventPayload::FactFinding(d) => serde_json::to_value(d)?,
            EventPayload::ActionDecided(d) => serde_json::to_value(d)?,
            EventPayload::ActionExecuted(d) => serde_json::to_value(d)?,
            EventPayload::Prevention(d) => serde_json::to_value(d)?,
            EventPayload::Closed(d) => serde_json::to_value(d)?,
        };
        Ok(value)
    }
}

fn required_text(field: &str, value: &str, min: usize, max: usize) -> EvidenceResult<()> {
    let len = value.trim().chars().count();
    if len == 0 {
        return Err(EvidenceError::InvalidPayload {
            reason: format!("missing data.{field}"),
        });
    }
    if len < min || value.chars().count() > max {
        return Err(EvidenceError::InvalidPayload {
            reason: format!("data.{field} must be {min}..={max} characters"),
        });
    }
    Ok(())
}

fn optional_text(field: &str, value: &Option<String>, max: usize) -> EvidenceResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(EvidenceError::InvalidPayload {
            reason: format!("data.{field} must be at most {max} characters"),
        }),
        _ => Ok(()),
    }
}

// ── Drafts and persisted events ───────────────────────────────────────────────

/// What a collaborator submits to `EvidenceChain::append`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    pub actor_role: ActorRole,
    pub payload: EventPayload,
    /// Sensitive detail, handed to the sealing collaborator and never hashed
    /// in plaintext; only the returned reference enters the chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitive: Option<Value>,
}

impl EventDraft {
    pub fn new(actor_role: ActorRole, payload: EventPayload) -> Self {
        Self {
            actor_role,
            payload,
            sensitive: None,
        }
    }

    pub fn with_sensitive(mut self, detail: Value) -> Self {
        self.sensitive = Some(detail);
        self
    }
}

/// One immutable, hash-linked fact about a report's lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub report_id: ReportId,
    pub event_type: EventType,
    pub actor_role: ActorRole,
    /// The non-sensitive projection that was hashed.
    pub data: Value,
    /// Reference to sealed sensitive detail, if any.
    pub sealed_ref: Option<String>,
    /// Id of the chain key this event was hashed under.
    pub key_id: String,
    /// Hash of the preceding event; `None` only for the genesis event.
    pub prev_hash: Option<String>,
    pub hash: String,
    /// Millisecond precision, strictly increasing within a report.
    pub created_at: DateTime<Utc>,
}

/// The per-report chain record: the single source of truth for the head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainRecord {
    pub report_id: ReportId,
    pub head_hash: String,
    /// Hashing scheme identifier, frozen per encoder version.
    pub algo: String,
    /// Key id the head event was hashed under.
    pub key_id: String,
    pub event_count: u64,
    pub last_event_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
