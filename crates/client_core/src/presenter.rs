//! Operator-facing feedback derived from mutation outcomes. Read-only: nothing
//! here touches the grid.

use std::fmt;

use crate::types::{MoveIntent, MutationOutcome, Violation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackTone {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackAction {
    /// Resubmit the rejected intent through the override entry point.
    RetryForced(MoveIntent),
    Reload,
    Dismiss,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feedback {
    pub tone: FeedbackTone,
    pub headline: String,
    pub details: Vec<String>,
    pub actions: Vec<FeedbackAction>,
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.headline)?;
        for detail in &self.details {
            write!(f, "\n  - {detail}")?;
        }
        Ok(())
    }
}

pub struct FeedbackPresenter;

impl FeedbackPresenter {
    pub fn in_progress(intent: &MoveIntent) -> Feedback {
        Feedback {
            tone: FeedbackTone::Info,
            headline: format!(
                "Validating move of {} to {}...",
                intent.entity(),
                intent.destination()
            ),
            details: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn render(outcome: &MutationOutcome) -> Feedback {
        match outcome {
            MutationOutcome::Unchanged { .. } => Feedback {
                tone: FeedbackTone::Info,
                headline: "No change".to_string(),
                details: Vec::new(),
                actions: Vec::new(),
            },
            MutationOutcome::Committed {
                intent,
                score_delta,
                new_score,
                ..
            } => {
                let headline = match (score_delta, new_score) {
                    (Some(delta), Some(total)) => {
                        format!("Score {} (total {})", format_delta(*delta), format_score(*total))
                    }
                    (Some(delta), None) => format!("Score {}", format_delta(*delta)),
                    (None, Some(total)) => format!("Change saved (total {})", format_score(*total)),
                    (None, None) => "Change saved".to_string(),
                };
                let mut details = Vec::new();
                if let Some(justification) = intent.justification() {
                    details.push(format!("Override applied: {justification}"));
                }
                Feedback {
                    tone: FeedbackTone::Success,
                    headline,
                    details,
                    actions: Vec::new(),
                }
            }
            MutationOutcome::Rejected {
                intent,
                violations,
                message,
            } => {
                let reason = message
                    .as_deref()
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or("the change violates scheduling constraints");
                let mut actions = Vec::new();
                if !intent.is_forced() {
                    actions.push(FeedbackAction::RetryForced(intent.clone()));
                }
                actions.push(FeedbackAction::Dismiss);
                Feedback {
                    tone: FeedbackTone::Warning,
                    headline: format!("Change rejected: {reason}"),
                    details: violations.iter().map(describe_violation).collect(),
                    actions,
                }
            }
            MutationOutcome::TransportFailed { reason, .. } => Feedback {
                tone: FeedbackTone::Error,
                headline: "Connection failed: the change was not saved".to_string(),
                details: vec![
                    transport_hint(reason),
                    "The schedule was restored to its last confirmed state; reload to re-sync."
                        .to_string(),
                ],
                actions: vec![FeedbackAction::Dismiss, FeedbackAction::Reload],
            },
        }
    }
}

/// Signed delta: `-5`, `+2`, `+2.5`.
pub fn format_delta(delta: f64) -> String {
    format!("{delta:+}")
}

fn format_score(score: f64) -> String {
    format!("{score}")
}

pub fn describe_violation(violation: &Violation) -> String {
    let mut text = if violation.detail.trim().is_empty() {
        let mut text = violation.kind.replace('_', " ");
        if let Some(date) = violation.date {
            text.push_str(&format!(" on {date}"));
        }
        if let Some(shift) = &violation.shift {
            text.push_str(&format!(" ({shift})"));
        }
        text
    } else {
        violation.detail.clone()
    };
    match (violation.required, violation.available) {
        (Some(required), Some(available)) => {
            text.push_str(&format!(" [required {required}, available {available}]"));
        }
        (Some(required), None) => text.push_str(&format!(" [required {required}]")),
        _ => {}
    }
    text
}

fn transport_hint(reason: &str) -> String {
    let lower = reason.to_ascii_lowercase();
    if lower.contains("no response within") || lower.contains("timed out") {
        format!("The server did not answer in time ({reason}).")
    } else if lower.contains("connection refused")
        || lower.contains("dns")
        || lower.contains("error sending request")
    {
        format!("Server unreachable; check URL/network ({reason}).")
    } else {
        reason.to_string()
    }
}

#[cfg(test)]
#[path = "tests/presenter_tests.rs"]
mod tests;
