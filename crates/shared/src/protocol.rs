use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{EntityId, ScheduleId, ShiftLabel};

pub fn schedule_route(schedule_id: ScheduleId) -> String {
    format!("/schedules/{}", schedule_id.0)
}

pub fn assignments_route(schedule_id: ScheduleId) -> String {
    format!("/schedules/{}/assignments", schedule_id.0)
}

pub fn recommendations_route(schedule_id: ScheduleId) -> String {
    format!("/schedules/{}/ai-recommendations", schedule_id.0)
}

/// Body of `PATCH /schedules/{id}/assignments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentPatchRequest {
    pub date: NaiveDate,
    pub shift: ShiftLabel,
    pub from_employee_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_employee_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub r#override: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_reason: Option<String>,
}

/// Response to an assignment patch. `ok` discriminates commit from rejection;
/// every other field is optional on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentPatchResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
    #[serde(default)]
    pub violations: Vec<ViolationPayload>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub employee_scores: HashMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationPayload {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift: Option<ShiftLabel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<u32>,
}

/// `GET /schedules/{id}`: the authoritative grid as `{date: {shift: [ids]}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleResponse {
    pub id: ScheduleId,
    #[serde(default)]
    pub schedule_data: BTreeMap<NaiveDate, BTreeMap<ShiftLabel, Vec<EntityId>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_score: Option<f64>,
}

/// What the replacement search is meant to fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    #[default]
    MissingStaff,
    Overload,
    ConstraintViolation,
}

/// Body of `POST /schedules/{id}/ai-recommendations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationQuery {
    pub schedule_id: ScheduleId,
    pub date: NaiveDate,
    pub shift: ShiftLabel,
    #[serde(default)]
    pub issue_type: IssueType,
    #[serde(default)]
    pub exclude_ids: Vec<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(alias = "employee_id")]
    pub entity_id: EntityId,
    #[serde(default, alias = "employee_name", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub suitability_score: f64,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
}

/// The service answers either with a bare ranked list or with the list
/// wrapped alongside its issue analysis.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RecommendationResponse {
    Bare(Vec<Recommendation>),
    Wrapped { recommendations: Vec<Recommendation> },
}

impl RecommendationResponse {
    pub fn into_ranked(self) -> Vec<Recommendation> {
        match self {
            Self::Bare(recommendations) => recommendations,
            Self::Wrapped { recommendations } => recommendations,
        }
    }
}
