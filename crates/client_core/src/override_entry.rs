//! Forced reassignments: intents that ask the server to skip constraint
//! checks, the audit trail they leave, and the replacement candidates that feed
//! them.

use chrono::{DateTime, NaiveDate, Utc};
use shared::{
    domain::{ContainerKey, EntityId, ScheduleId, ShiftLabel},
    protocol::{IssueType, Recommendation, RecommendationQuery},
};
use tokio::sync::Mutex;
use tracing::info;

use crate::{
    error::OverrideError,
    gateway::{GatewayError, ValidationGateway},
    grid::AssignmentGrid,
    types::{MoveIntent, MutationOutcome},
};

pub fn prepare_override(
    entity: EntityId,
    source: ContainerKey,
    destination: ContainerKey,
    justification: &str,
) -> Result<MoveIntent, OverrideError> {
    let justification = justification.trim();
    if justification.is_empty() {
        return Err(OverrideError::MissingJustification);
    }
    if source == destination {
        return Err(OverrideError::SameCell);
    }
    Ok(MoveIntent::forced(
        entity,
        source,
        destination,
        justification.to_string(),
    ))
}

/// Re-issues a rejected intent as a forced one.
pub fn retry_as_forced(
    intent: &MoveIntent,
    justification: &str,
) -> Result<MoveIntent, OverrideError> {
    prepare_override(
        intent.entity().clone(),
        intent.source().clone(),
        intent.destination().clone(),
        justification,
    )
}

/// Ranked replacement candidates for `(date, shift)`, skipping anyone already
/// working that day.
pub async fn candidates(
    gateway: &dyn ValidationGateway,
    schedule_id: ScheduleId,
    grid: &AssignmentGrid,
    date: NaiveDate,
    shift: ShiftLabel,
    issue_type: IssueType,
) -> Result<Vec<Recommendation>, GatewayError> {
    let working = grid.working_on(date);
    let query = RecommendationQuery {
        schedule_id,
        date,
        shift,
        issue_type,
        exclude_ids: working.clone(),
    };
    let mut ranked = gateway.recommend(schedule_id, query).await?;
    ranked.retain(|candidate| !working.contains(&candidate.entity_id));
    ranked.sort_by(|a, b| b.suitability_score.total_cmp(&a.suitability_score));
    Ok(ranked)
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuditOutcome {
    Committed { score_delta: Option<f64> },
    Rejected { reason: String },
    TransportFailed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverrideAuditEntry {
    pub recorded_at: DateTime<Utc>,
    pub entity: EntityId,
    pub from: ContainerKey,
    pub to: ContainerKey,
    pub justification: String,
    pub outcome: AuditOutcome,
}

/// Client-side log of every forced mutation and how it ended.
#[derive(Default)]
pub struct OverrideAudit {
    entries: Mutex<Vec<OverrideAuditEntry>>,
}

impl OverrideAudit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `outcome` if its intent was forced; other outcomes are ignored.
    pub async fn record(&self, outcome: &MutationOutcome) {
        let intent = outcome.intent();
        if !intent.is_forced() {
            return;
        }
        let audit_outcome = match outcome {
            MutationOutcome::Committed { score_delta, .. } => AuditOutcome::Committed {
                score_delta: *score_delta,
            },
            MutationOutcome::Rejected {
                violations,
                message,
                ..
            } => AuditOutcome::Rejected {
                reason: message
                    .clone()
                    .or_else(|| violations.first().map(|v| v.detail.clone()))
                    .unwrap_or_else(|| "rejected".to_string()),
            },
            MutationOutcome::TransportFailed { reason, .. } => AuditOutcome::TransportFailed {
                reason: reason.clone(),
            },
            MutationOutcome::Unchanged { .. } => return,
        };
        let entry = OverrideAuditEntry {
            recorded_at: Utc::now(),
            entity: intent.entity().clone(),
            from: intent.source().clone(),
            to: intent.destination().clone(),
            justification: intent.justification().unwrap_or_default().to_string(),
            outcome: audit_outcome,
        };
        info!(
            entity = %entry.entity,
            from = %entry.from,
            to = %entry.to,
            justification = %entry.justification,
            outcome = ?entry.outcome,
            "override: recorded"
        );
        self.entries.lock().await.push(entry);
    }

    pub async fn entries(&self) -> Vec<OverrideAuditEntry> {
        self.entries.lock().await.clone()
    }
}

#[cfg(test)]
#[path = "tests/override_entry_tests.rs"]
mod tests;
