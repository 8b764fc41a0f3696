use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use shared::{
    domain::{ContainerKey, EntityId, ScheduleId, ShiftLabel},
    protocol::{IssueType, Recommendation},
};
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, info};

pub mod applier;
pub mod config;
pub mod controller;
pub mod error;
pub mod gateway;
pub mod grid;
pub mod override_entry;
pub mod presenter;
pub mod reconcile;
pub mod types;

pub use config::{load_settings, normalize_server_url, EditorSettings};
pub use controller::{
    Direction, GestureEvent, GridLayout, InteractionController, KeyEvent, PointerEvent,
};
pub use error::{EditorError, OverrideError};
pub use gateway::{GatewayError, HttpValidationGateway, ValidationGateway};
pub use grid::{AssignmentGrid, GridError, GridStore};
pub use override_entry::{AuditOutcome, OverrideAudit, OverrideAuditEntry};
pub use presenter::{Feedback, FeedbackAction, FeedbackPresenter, FeedbackTone};
pub use reconcile::{ReconciliationEngine, ScoreBoard};
pub use types::{MoveIntent, MutationOutcome, ReconciliationPhase, ValidationOutcome, Violation};

/// Broadcast to every subscriber of an editor as mutations progress.
#[derive(Debug, Clone)]
pub enum EditorEvent {
    MutationStarted(MoveIntent),
    MutationResolved(MutationOutcome),
    GridReplaced { total_score: Option<f64> },
}

/// One schedule being edited: the grid store, the gesture controller and the
/// reconciliation engine behind a single handle.
pub struct ScheduleEditor {
    engine: Arc<ReconciliationEngine>,
    controller: Mutex<InteractionController>,
    audit: OverrideAudit,
    shift_labels: Vec<ShiftLabel>,
    events: broadcast::Sender<EditorEvent>,
}

impl ScheduleEditor {
    pub fn new(
        settings: &EditorSettings,
        gateway: Arc<dyn ValidationGateway>,
        grid: AssignmentGrid,
    ) -> Self {
        let (events, _) = broadcast::channel(settings.event_capacity.max(1));
        let layout = layout_for(&grid, &settings.shift_labels);
        let engine = ReconciliationEngine::new(
            settings.schedule_id,
            grid,
            gateway,
            settings.request_timeout(),
            events.clone(),
        );
        let controller = InteractionController::new(layout, engine.subscribe_phase());
        Self {
            engine,
            controller: Mutex::new(controller),
            audit: OverrideAudit::new(),
            shift_labels: settings.shift_labels.clone(),
            events,
        }
    }

    /// Builds an HTTP-backed editor and loads the schedule named in `settings`.
    pub async fn connect(settings: &EditorSettings) -> Result<Self> {
        let server_url = normalize_server_url(&settings.server_url)?;
        let gateway = HttpValidationGateway::new(server_url, settings.request_timeout())?;
        let editor = Self::new(settings, Arc::new(gateway), AssignmentGrid::new());
        editor
            .reload()
            .await
            .with_context(|| format!("failed to load schedule {}", settings.schedule_id.0))?;
        Ok(editor)
    }

    pub fn schedule_id(&self) -> ScheduleId {
        self.engine.schedule_id()
    }

    pub fn grid(&self) -> Arc<AssignmentGrid> {
        self.engine.store().current()
    }

    pub fn subscribe_grid(&self) -> watch::Receiver<Arc<AssignmentGrid>> {
        self.engine.store().subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EditorEvent> {
        self.events.subscribe()
    }

    pub fn phase(&self) -> ReconciliationPhase {
        self.engine.phase()
    }

    pub async fn layout(&self) -> GridLayout {
        self.controller.lock().await.layout().clone()
    }

    /// Feeds one gesture event to the controller and submits the intent it
    /// completes, if any. Returns `None` while a gesture is still in progress or
    /// was discarded.
    pub async fn handle_gesture(
        &self,
        event: GestureEvent,
    ) -> Result<Option<MutationOutcome>, EditorError> {
        let intent = self.controller.lock().await.handle(event);
        match intent {
            Some(intent) => self.submit(intent).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn submit(&self, intent: MoveIntent) -> Result<MutationOutcome, EditorError> {
        let outcome = self.engine.submit(intent).await?;
        self.audit.record(&outcome).await;
        Ok(outcome)
    }

    pub async fn submit_override(
        &self,
        entity: EntityId,
        source: ContainerKey,
        destination: ContainerKey,
        justification: &str,
    ) -> Result<MutationOutcome, EditorError> {
        let intent =
            override_entry::prepare_override(entity, source, destination, justification)?;
        self.submit(intent).await
    }

    /// Resubmits a rejected intent with the constraint checks bypassed.
    pub async fn retry_forced(
        &self,
        rejected: &MoveIntent,
        justification: &str,
    ) -> Result<MutationOutcome, EditorError> {
        let intent = override_entry::retry_as_forced(rejected, justification)?;
        self.submit(intent).await
    }

    pub async fn recommend(
        &self,
        date: NaiveDate,
        shift: ShiftLabel,
        issue_type: IssueType,
    ) -> Result<Vec<Recommendation>, EditorError> {
        let gateway = self.engine.gateway();
        let grid = self.grid();
        let ranked = override_entry::candidates(
            gateway.as_ref(),
            self.engine.schedule_id(),
            &grid,
            date,
            shift,
            issue_type,
        )
        .await?;
        debug!(%date, candidates = ranked.len(), "editor: recommendations fetched");
        Ok(ranked)
    }

    /// Replaces the grid with the server's copy and resets the gesture layout.
    pub async fn reload(&self) -> Result<(), EditorError> {
        self.engine.reload().await?;
        let layout = layout_for(&self.grid(), &self.shift_labels);
        self.controller.lock().await.set_layout(layout);
        info!(schedule_id = self.engine.schedule_id().0, "editor: schedule reloaded");
        Ok(())
    }

    pub async fn audit_log(&self) -> Vec<OverrideAuditEntry> {
        self.audit.entries().await
    }

    pub async fn scores(&self) -> ScoreBoard {
        self.engine.scores().await
    }
}

/// Configured shift labels first, then any extra labels the grid carries.
fn layout_for(grid: &AssignmentGrid, shift_labels: &[ShiftLabel]) -> GridLayout {
    let mut shifts = shift_labels.to_vec();
    shifts.extend(grid.shifts());
    GridLayout::new(grid.dates(), shifts)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
