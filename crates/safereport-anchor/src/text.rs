//! Plain-text renderings of an anchor: the public announcement and the
//! per-report verification certificate.

use chrono::SecondsFormat;

use safereport_contracts::{
    anchor::{AnchorRecord, AnchorStatus},
    ids::ReportId,
};

const RULE: &str = "===========================================================";

fn status_label(status: AnchorStatus) -> &'static str {
    match status {
        AnchorStatus::Pending => "PENDING",
        AnchorStatus::Anchored => "ANCHORED",
        AnchorStatus::Verified => "VERIFIED",
    }
}

/// Short public post announcing `anchor`'s root.
pub fn announcement_text(anchor: &AnchorRecord) -> String {
    let short_root: String = anchor.merkle_root.chars().take(16).collect();
    format!(
        "SafeReport Evidence Anchor\n\
         Date: {}\n\
         Reports sealed: {}\n\
         Merkle root: {}...\n\
         \n\
         #SafeReport #EvidenceIntegrity",
        anchor.created_at.format("%Y-%m-%d"),
        anchor.report_ids.len(),
        short_root,
    )
}

/// Verification certificate tying `report_id`'s chain head to `anchor`.
pub fn certificate(anchor: &AnchorRecord, report_id: &ReportId, leaf_hash: &str) -> String {
    let lines = [
        RULE.to_string(),
        "                SAFEREPORT ANCHOR CERTIFICATE".to_string(),
        RULE.to_string(),
        String::new(),
        "REPORT".to_string(),
        String::new(),
        format!("  Report ID:      {report_id}"),
        format!("  Chain head:     {leaf_hash}"),
        String::new(),
        "MERKLE ANCHOR".to_string(),
        String::new(),
        format!("  Anchor ID:      {}", anchor.id),
        format!("  Merkle root:    {}", anchor.merkle_root),
        format!("  Reports:        {}", anchor.report_ids.len()),
        format!(
            "  Created:        {}",
            anchor.created_at.to_rfc3339_opts(SecondsFormat::Millis, true)
        ),
        String::new(),
        "PUBLICATION".to_string(),
        String::new(),
        format!(
            "  External ref:   {}",
            anchor.external_ref.as_deref().unwrap_or("PENDING")
        ),
        format!(
            "  External URL:   {}",
            anchor.external_url.as_deref().unwrap_or("not yet published")
        ),
        format!("  Status:         {}", status_label(anchor.status)),
        String::new(),
        "  The chain head above is a leaf of the Merkle tree whose root".to_string(),
        "  was published at the reference shown.  An inclusion proof".to_string(),
        "  recomputes that root from the chain head alone.".to_string(),
        String::new(),
        RULE.to_string(),
    ];
    lines.join("\n")
}
