//! Single-flight reconciliation of optimistic grid mutations against the
//! validation service.
//!
//! `Idle -> Pending -> {Committed, RolledBack} -> Idle`. The committed and
//! rolled-back states are never observable: they collapse into the
//! `MutationOutcome` returned to the caller, and the phase drops straight back
//! to idle.

use std::{collections::HashMap, sync::Arc, time::Duration};

use shared::{domain::ScheduleId, protocol::AssignmentPatchRequest};
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::{
    applier::{apply_optimistically, PendingMutation},
    error::EditorError,
    gateway::{GatewayError, ValidationGateway},
    grid::{AssignmentGrid, GridStore},
    types::{MoveIntent, MutationOutcome, ReconciliationPhase, ValidationOutcome},
    EditorEvent,
};

/// Last score figures confirmed by the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreBoard {
    pub total: Option<f64>,
    pub employee_scores: HashMap<String, f64>,
}

pub struct ReconciliationEngine {
    schedule_id: ScheduleId,
    store: GridStore,
    gateway: Arc<dyn ValidationGateway>,
    timeout: Duration,
    pending: Mutex<Option<PendingMutation>>,
    phase: watch::Sender<ReconciliationPhase>,
    scores: Mutex<ScoreBoard>,
    events: broadcast::Sender<EditorEvent>,
}

impl ReconciliationEngine {
    pub fn new(
        schedule_id: ScheduleId,
        grid: AssignmentGrid,
        gateway: Arc<dyn ValidationGateway>,
        timeout: Duration,
        events: broadcast::Sender<EditorEvent>,
    ) -> Arc<Self> {
        let (phase, _) = watch::channel(ReconciliationPhase::Idle);
        Arc::new(Self {
            schedule_id,
            store: GridStore::new(grid),
            gateway,
            timeout,
            pending: Mutex::new(None),
            phase,
            scores: Mutex::new(ScoreBoard::default()),
            events,
        })
    }

    pub fn schedule_id(&self) -> ScheduleId {
        self.schedule_id
    }

    pub fn store(&self) -> &GridStore {
        &self.store
    }

    pub fn gateway(&self) -> Arc<dyn ValidationGateway> {
        Arc::clone(&self.gateway)
    }

    pub fn phase(&self) -> ReconciliationPhase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<ReconciliationPhase> {
        self.phase.subscribe()
    }

    pub async fn scores(&self) -> ScoreBoard {
        self.scores.lock().await.clone()
    }

    /// Applies `intent` optimistically, validates it, and commits or rolls
    /// back. Refused with `MutationInFlight` while another mutation is
    /// outstanding.
    ///
    /// The round trip runs on its own task, so dropping the returned future
    /// does not strand the pending record: the mutation still resolves.
    pub async fn submit(
        self: &Arc<Self>,
        intent: MoveIntent,
    ) -> Result<MutationOutcome, EditorError> {
        let (intent, request) = {
            let mut guard = self.pending.lock().await;
            if let Some(active) = guard.as_ref() {
                warn!(
                    entity = %intent.entity(),
                    pending = %active.intent.entity(),
                    "reconcile: refused, mutation already in flight"
                );
                return Err(EditorError::MutationInFlight {
                    pending: active.intent.entity().clone(),
                });
            }
            if intent.is_noop() {
                debug!(
                    entity = %intent.entity(),
                    "reconcile: source equals destination, nothing to send"
                );
                return Ok(MutationOutcome::Unchanged { intent });
            }

            // Ids typed by hand carry no wire form; adopt the grid's.
            let intent = match self.store.current().resolve(intent.entity()) {
                Some(stored) => intent.with_entity(stored.clone()),
                None => intent,
            };
            let pending = apply_optimistically(&self.store, intent.clone());
            let request = pending.intent.to_patch_request();
            *guard = Some(pending);
            self.phase.send_replace(ReconciliationPhase::Pending);
            (intent, request)
        };

        info!(
            entity = %intent.entity(),
            from = %intent.source(),
            to = %intent.destination(),
            forced = intent.is_forced(),
            "reconcile: idle -> pending"
        );
        let _ = self.events.send(EditorEvent::MutationStarted(intent.clone()));

        let engine = Arc::clone(self);
        let task = tokio::spawn(async move {
            let verdict = engine.validate(request).await;
            engine.resolve(intent, verdict).await
        });
        task.await.map_err(|err| EditorError::Worker(err.to_string()))
    }

    async fn validate(
        &self,
        request: AssignmentPatchRequest,
    ) -> Result<ValidationOutcome, GatewayError> {
        match tokio::time::timeout(
            self.timeout,
            self.gateway.submit_assignment(self.schedule_id, request),
        )
        .await
        {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(err)) if err.is_rejection() => Ok(ValidationOutcome::rejected(err.detail())),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(GatewayError::Timeout(self.timeout)),
        }
    }

    async fn resolve(
        &self,
        intent: MoveIntent,
        verdict: Result<ValidationOutcome, GatewayError>,
    ) -> MutationOutcome {
        let outcome = {
            let mut guard = self.pending.lock().await;
            let pending = guard.take();
            if pending.is_none() {
                error!(
                    entity = %intent.entity(),
                    "reconcile: pending record missing at resolution"
                );
            }

            let outcome = match verdict {
                Ok(verdict) if verdict.accepted => {
                    let mut scores = self.scores.lock().await;
                    match (verdict.new_score, verdict.score_delta) {
                        (Some(total), _) => scores.total = Some(total),
                        (None, Some(delta)) => {
                            if let Some(total) = scores.total.as_mut() {
                                *total += delta;
                            }
                        }
                        (None, None) => {}
                    }
                    scores.employee_scores.extend(verdict.employee_scores.clone());
                    MutationOutcome::Committed {
                        intent,
                        score_delta: verdict.score_delta,
                        new_score: verdict.new_score,
                        employee_scores: verdict.employee_scores,
                    }
                }
                Ok(verdict) => {
                    if let Some(pending) = &pending {
                        self.store.publish(Arc::clone(&pending.snapshot));
                    }
                    MutationOutcome::Rejected {
                        intent,
                        violations: verdict.violations,
                        message: verdict.message,
                    }
                }
                Err(err) => {
                    if let Some(pending) = &pending {
                        self.store.publish(Arc::clone(&pending.snapshot));
                    }
                    MutationOutcome::TransportFailed {
                        intent,
                        reason: err.to_string(),
                    }
                }
            };
            self.phase.send_replace(ReconciliationPhase::Idle);
            outcome
        };

        match &outcome {
            MutationOutcome::Committed { intent, score_delta, .. } => info!(
                entity = %intent.entity(),
                delta = ?score_delta,
                "reconcile: pending -> committed"
            ),
            MutationOutcome::Rejected { intent, violations, .. } => info!(
                entity = %intent.entity(),
                violations = violations.len(),
                "reconcile: pending -> rolled back (rejected)"
            ),
            MutationOutcome::TransportFailed { intent, reason } => warn!(
                entity = %intent.entity(),
                %reason,
                "reconcile: pending -> rolled back (transport failure)"
            ),
            MutationOutcome::Unchanged { .. } => {}
        }
        let _ = self
            .events
            .send(EditorEvent::MutationResolved(outcome.clone()));
        outcome
    }

    /// Replaces the grid wholesale with server-sourced state.
    pub async fn replace_grid(
        &self,
        grid: AssignmentGrid,
        total_score: Option<f64>,
    ) -> Result<(), EditorError> {
        let guard = self.pending.lock().await;
        if guard.is_some() {
            return Err(EditorError::ReloadWhilePending);
        }
        self.store.publish(Arc::new(grid));
        {
            let mut scores = self.scores.lock().await;
            scores.total = total_score;
            scores.employee_scores.clear();
        }
        drop(guard);

        info!(schedule_id = self.schedule_id.0, "reconcile: grid replaced from server");
        let _ = self.events.send(EditorEvent::GridReplaced { total_score });
        Ok(())
    }

    /// Fetches the authoritative schedule and replaces the grid with it.
    pub async fn reload(&self) -> Result<(), EditorError> {
        let schedule = self.gateway.fetch_schedule(self.schedule_id).await?;
        let grid = AssignmentGrid::from_schedule(&schedule)?;
        self.replace_grid(grid, schedule.total_score).await
    }
}

#[cfg(test)]
#[path = "tests/reconcile_tests.rs"]
mod tests;
