//! Intents, server verdicts and terminal outcomes shared across the editor.

use std::collections::HashMap;

use chrono::NaiveDate;
use shared::{
    domain::{ContainerKey, EntityId, ShiftLabel},
    protocol::{AssignmentPatchRequest, AssignmentPatchResponse, ViolationPayload},
};

/// A requested reassignment of one entity between two containers.
///
/// Built once per completed gesture or override and never modified afterwards;
/// fields are only reachable through accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveIntent {
    entity: EntityId,
    source: ContainerKey,
    destination: ContainerKey,
    forced: bool,
    justification: Option<String>,
}

impl MoveIntent {
    pub fn new(entity: EntityId, source: ContainerKey, destination: ContainerKey) -> Self {
        Self {
            entity,
            source,
            destination,
            forced: false,
            justification: None,
        }
    }

    pub(crate) fn forced(
        entity: EntityId,
        source: ContainerKey,
        destination: ContainerKey,
        justification: String,
    ) -> Self {
        Self {
            entity,
            source,
            destination,
            forced: true,
            justification: Some(justification),
        }
    }

    pub(crate) fn with_entity(self, entity: EntityId) -> Self {
        Self { entity, ..self }
    }

    pub fn entity(&self) -> &EntityId {
        &self.entity
    }

    pub fn source(&self) -> &ContainerKey {
        &self.source
    }

    pub fn destination(&self) -> &ContainerKey {
        &self.destination
    }

    pub fn is_forced(&self) -> bool {
        self.forced
    }

    pub fn justification(&self) -> Option<&str> {
        self.justification.as_deref()
    }

    pub fn is_noop(&self) -> bool {
        self.source == self.destination
    }

    /// Wire form of the intent. The destination cell supplies `date`/`shift`;
    /// a move into the unassigned sentinel carries no target employee.
    pub fn to_patch_request(&self) -> AssignmentPatchRequest {
        let to_employee_id = self
            .destination
            .is_assignable()
            .then(|| self.entity.clone());
        AssignmentPatchRequest {
            date: self.destination.date,
            shift: self.destination.shift.clone(),
            from_employee_id: self.entity.clone(),
            to_employee_id,
            r#override: self.forced,
            override_reason: self.justification.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub kind: String,
    pub detail: String,
    pub date: Option<NaiveDate>,
    pub shift: Option<ShiftLabel>,
    pub required: Option<u32>,
    pub available: Option<u32>,
}

impl From<ViolationPayload> for Violation {
    fn from(value: ViolationPayload) -> Self {
        Self {
            kind: value.kind,
            detail: value.detail,
            date: value.date,
            shift: value.shift,
            required: value.required,
            available: value.actual,
        }
    }
}

/// The gateway's verdict on one mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub accepted: bool,
    pub score_delta: Option<f64>,
    pub new_score: Option<f64>,
    pub violations: Vec<Violation>,
    pub employee_scores: HashMap<String, f64>,
    pub message: Option<String>,
}

impl ValidationOutcome {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            score_delta: None,
            new_score: None,
            violations: Vec::new(),
            employee_scores: HashMap::new(),
            message: Some(message.into()),
        }
    }
}

impl From<AssignmentPatchResponse> for ValidationOutcome {
    fn from(value: AssignmentPatchResponse) -> Self {
        Self {
            accepted: value.ok,
            score_delta: value.delta,
            new_score: value.new_score,
            violations: value.violations.into_iter().map(Violation::from).collect(),
            employee_scores: value.employee_scores,
            message: value.message,
        }
    }
}

/// Where the reconciliation state machine currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconciliationPhase {
    #[default]
    Idle,
    Pending,
}

/// Terminal result of one mutation, after the grid has been committed or
/// rolled back.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    /// Source equals destination; nothing was applied or sent.
    Unchanged { intent: MoveIntent },
    Committed {
        intent: MoveIntent,
        score_delta: Option<f64>,
        new_score: Option<f64>,
        employee_scores: HashMap<String, f64>,
    },
    Rejected {
        intent: MoveIntent,
        violations: Vec<Violation>,
        message: Option<String>,
    },
    TransportFailed { intent: MoveIntent, reason: String },
}

impl MutationOutcome {
    pub fn intent(&self) -> &MoveIntent {
        match self {
            Self::Unchanged { intent }
            | Self::Committed { intent, .. }
            | Self::Rejected { intent, .. }
            | Self::TransportFailed { intent, .. } => intent,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }

    pub fn is_rolled_back(&self) -> bool {
        matches!(self, Self::Rejected { .. } | Self::TransportFailed { .. })
    }
}
