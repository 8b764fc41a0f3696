use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex as StdMutex,
    },
};

use async_trait::async_trait;
use chrono::NaiveDate;
use shared::{
    domain::{ContainerKey, EntityId, ShiftLabel},
    protocol::{Recommendation, RecommendationQuery, ScheduleResponse},
};

use super::*;
use crate::types::Violation;

/// What the scripted gateway does for one submission.
enum Reply {
    Accept { delta: f64, total: Option<f64> },
    Reject(Vec<Violation>),
    Status(u16, &'static str),
    Unreachable,
    After(Duration, Box<Reply>),
}

struct ScriptedGateway {
    replies: StdMutex<VecDeque<Reply>>,
    calls: AtomicUsize,
    requests: StdMutex<Vec<AssignmentPatchRequest>>,
    schedule: Option<ScheduleResponse>,
}

impl ScriptedGateway {
    fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: StdMutex::new(replies.into()),
            calls: AtomicUsize::new(0),
            requests: StdMutex::new(Vec::new()),
            schedule: None,
        })
    }

    fn with_schedule(schedule: ScheduleResponse) -> Arc<Self> {
        Arc::new(Self {
            replies: StdMutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            requests: StdMutex::new(Vec::new()),
            schedule: Some(schedule),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

async fn play(reply: Reply) -> Result<ValidationOutcome, GatewayError> {
    let mut reply = reply;
    loop {
        match reply {
            Reply::After(delay, next) => {
                tokio::time::sleep(delay).await;
                reply = *next;
            }
            Reply::Accept { delta, total } => {
                return Ok(ValidationOutcome {
                    accepted: true,
                    score_delta: Some(delta),
                    new_score: total,
                    violations: Vec::new(),
                    employee_scores: HashMap::from([("e123".to_string(), 0.8)]),
                    message: None,
                })
            }
            Reply::Reject(violations) => {
                return Ok(ValidationOutcome {
                    accepted: false,
                    score_delta: None,
                    new_score: None,
                    violations,
                    employee_scores: HashMap::new(),
                    message: None,
                })
            }
            Reply::Status(status, detail) => {
                return Err(GatewayError::Status {
                    status,
                    detail: detail.to_string(),
                })
            }
            Reply::Unreachable => {
                return Err(GatewayError::Transport("connection refused".to_string()))
            }
        }
    }
}

#[async_trait]
impl ValidationGateway for ScriptedGateway {
    async fn submit_assignment(
        &self,
        _schedule_id: ScheduleId,
        request: AssignmentPatchRequest,
    ) -> Result<ValidationOutcome, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().expect("lock").push(request);
        let reply = self
            .replies
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or(Reply::Unreachable);
        play(reply).await
    }

    async fn fetch_schedule(
        &self,
        _schedule_id: ScheduleId,
    ) -> Result<ScheduleResponse, GatewayError> {
        self.schedule
            .clone()
            .ok_or_else(|| GatewayError::Status {
                status: 404,
                detail: "Schedule not found".to_string(),
            })
    }

    async fn recommend(
        &self,
        _schedule_id: ScheduleId,
        _query: RecommendationQuery,
    ) -> Result<Vec<Recommendation>, GatewayError> {
        Ok(Vec::new())
    }
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, day).expect("date")
}

fn key(day: u32, shift: &str) -> ContainerKey {
    ContainerKey::new(date(day), ShiftLabel::new(shift))
}

fn sample_grid() -> AssignmentGrid {
    AssignmentGrid::from_containers([
        (
            key(16, "night"),
            vec![EntityId::new("e123"), EntityId::new("e789")],
        ),
        (key(17, "evening"), vec![EntityId::new("e456")]),
    ])
    .expect("grid")
}

fn move_e123() -> MoveIntent {
    MoveIntent::new(EntityId::new("e123"), key(16, "night"), key(17, "evening"))
}

fn engine_with(
    gateway: Arc<ScriptedGateway>,
    timeout: Duration,
) -> (Arc<ReconciliationEngine>, broadcast::Receiver<EditorEvent>) {
    let (events, rx) = broadcast::channel(16);
    let engine = ReconciliationEngine::new(ScheduleId(1), sample_grid(), gateway, timeout, events);
    (engine, rx)
}

async fn wait_for_phase(engine: &ReconciliationEngine, want: ReconciliationPhase) {
    let mut phase = engine.subscribe_phase();
    tokio::time::timeout(Duration::from_secs(2), phase.wait_for(|p| *p == want))
        .await
        .expect("phase change in time")
        .expect("phase sender alive");
}

#[tokio::test]
async fn accepted_mutation_keeps_tentative_grid() {
    let gateway = ScriptedGateway::new(vec![Reply::Accept {
        delta: -5.0,
        total: None,
    }]);
    let (engine, _rx) = engine_with(gateway.clone(), Duration::from_secs(1));

    let outcome = engine.submit(move_e123()).await.expect("submit");

    assert!(outcome.is_committed());
    let grid = engine.store().current();
    assert_eq!(
        grid.container(&key(17, "evening")),
        &[EntityId::new("e456"), EntityId::new("e123")]
    );
    assert_eq!(grid.container(&key(16, "night")), &[EntityId::new("e789")]);
    assert_eq!(engine.phase(), ReconciliationPhase::Idle);
    assert_eq!(gateway.calls(), 1);

    let sent = gateway.requests.lock().expect("lock")[0].clone();
    assert_eq!(sent.date, date(17));
    assert_eq!(sent.shift, ShiftLabel::new("evening"));
    assert_eq!(sent.to_employee_id, Some(EntityId::new("e123")));
}

#[tokio::test]
async fn rejection_restores_the_exact_snapshot() {
    let gateway = ScriptedGateway::new(vec![Reply::Reject(vec![Violation {
        kind: "minimum_staff".to_string(),
        detail: "night <3".to_string(),
        date: Some(date(16)),
        shift: Some(ShiftLabel::new("night")),
        required: Some(3),
        available: Some(1),
    }])]);
    let (engine, _rx) = engine_with(gateway, Duration::from_secs(1));
    let before = engine.store().current();

    let outcome = engine.submit(move_e123()).await.expect("submit");

    match &outcome {
        MutationOutcome::Rejected { violations, .. } => {
            assert_eq!(violations[0].detail, "night <3");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(*engine.store().current(), *before);
    assert!(Arc::ptr_eq(&engine.store().current(), &before));
    assert_eq!(engine.phase(), ReconciliationPhase::Idle);
}

#[tokio::test]
async fn client_error_status_counts_as_rejection() {
    let gateway = ScriptedGateway::new(vec![Reply::Status(400, "Invalid shift")]);
    let (engine, _rx) = engine_with(gateway, Duration::from_secs(1));

    let outcome = engine.submit(move_e123()).await.expect("submit");

    assert_eq!(
        outcome,
        MutationOutcome::Rejected {
            intent: move_e123(),
            violations: Vec::new(),
            message: Some("Invalid shift".to_string()),
        }
    );
    assert_eq!(*engine.store().current(), sample_grid());
}

#[tokio::test]
async fn server_error_and_unreachable_are_transport_failures() {
    let gateway = ScriptedGateway::new(vec![Reply::Status(503, "unavailable"), Reply::Unreachable]);
    let (engine, _rx) = engine_with(gateway, Duration::from_secs(1));

    for _ in 0..2 {
        let outcome = engine.submit(move_e123()).await.expect("submit");
        assert!(matches!(outcome, MutationOutcome::TransportFailed { .. }));
        assert_eq!(*engine.store().current(), sample_grid());
        assert_eq!(engine.phase(), ReconciliationPhase::Idle);
    }
}

#[tokio::test]
async fn timeout_rolls_back_and_returns_to_idle() {
    let gateway = ScriptedGateway::new(vec![Reply::After(
        Duration::from_secs(5),
        Box::new(Reply::Accept {
            delta: 1.0,
            total: None,
        }),
    )]);
    let (engine, _rx) = engine_with(gateway, Duration::from_millis(100));

    let outcome = engine.submit(move_e123()).await.expect("submit");

    match outcome {
        MutationOutcome::TransportFailed { reason, .. } => {
            assert!(reason.contains("no response within"), "{reason}")
        }
        other => panic!("expected transport failure, got {other:?}"),
    }
    assert_eq!(*engine.store().current(), sample_grid());
    assert_eq!(engine.phase(), ReconciliationPhase::Idle);
}

#[tokio::test]
async fn second_submission_while_pending_is_refused_without_network() {
    let gateway = ScriptedGateway::new(vec![Reply::After(
        Duration::from_millis(200),
        Box::new(Reply::Accept {
            delta: 2.0,
            total: None,
        }),
    )]);
    let (engine, _rx) = engine_with(gateway.clone(), Duration::from_secs(2));

    let first = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.submit(move_e123()).await })
    };
    wait_for_phase(&engine, ReconciliationPhase::Pending).await;

    let tentative = engine.store().current();
    let second = MoveIntent::new(EntityId::new("e456"), key(17, "evening"), key(16, "night"));
    let err = engine.submit(second).await.expect_err("in flight");
    assert!(matches!(err, EditorError::MutationInFlight { ref pending } if pending.as_str() == "e123"));
    assert!(Arc::ptr_eq(&engine.store().current(), &tentative));

    let outcome = first.await.expect("join").expect("submit");
    assert!(outcome.is_committed());
    assert_eq!(gateway.calls(), 1);
}

#[tokio::test]
async fn noop_intent_short_circuits() {
    let gateway = ScriptedGateway::new(Vec::new());
    let (engine, mut rx) = engine_with(gateway.clone(), Duration::from_secs(1));
    let noop = MoveIntent::new(EntityId::new("e123"), key(16, "night"), key(16, "night"));

    let outcome = engine.submit(noop.clone()).await.expect("submit");

    assert_eq!(outcome, MutationOutcome::Unchanged { intent: noop });
    assert_eq!(gateway.calls(), 0);
    assert_eq!(*engine.store().current(), sample_grid());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn dropped_caller_still_resolves_the_mutation() {
    let gateway = ScriptedGateway::new(vec![Reply::After(
        Duration::from_millis(150),
        Box::new(Reply::Reject(Vec::new())),
    )]);
    let (engine, _rx) = engine_with(gateway, Duration::from_secs(2));

    let caller = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.submit(move_e123()).await })
    };
    wait_for_phase(&engine, ReconciliationPhase::Pending).await;
    caller.abort();

    wait_for_phase(&engine, ReconciliationPhase::Idle).await;
    assert_eq!(*engine.store().current(), sample_grid());

    let follow_up = MoveIntent::new(EntityId::new("e456"), key(17, "evening"), key(16, "night"));
    let outcome = engine.submit(follow_up).await.expect("engine accepts again");
    assert!(outcome.is_rolled_back());
}

#[tokio::test]
async fn scoreboard_tracks_confirmed_totals() {
    let gateway = ScriptedGateway::new(vec![
        Reply::Accept {
            delta: 20.0,
            total: Some(1070.0),
        },
        Reply::Accept {
            delta: -5.0,
            total: None,
        },
    ]);
    let (engine, _rx) = engine_with(gateway, Duration::from_secs(1));

    engine.submit(move_e123()).await.expect("first");
    assert_eq!(engine.scores().await.total, Some(1070.0));

    let back = MoveIntent::new(EntityId::new("e123"), key(17, "evening"), key(16, "night"));
    engine.submit(back).await.expect("second");
    let scores = engine.scores().await;
    assert_eq!(scores.total, Some(1065.0));
    assert_eq!(scores.employee_scores.get("e123"), Some(&0.8));
}

#[tokio::test]
async fn events_report_start_and_resolution() {
    let gateway = ScriptedGateway::new(vec![Reply::Unreachable]);
    let (engine, mut rx) = engine_with(gateway, Duration::from_secs(1));

    engine.submit(move_e123()).await.expect("submit");

    match rx.recv().await.expect("started") {
        EditorEvent::MutationStarted(intent) => assert_eq!(intent, move_e123()),
        other => panic!("unexpected event {other:?}"),
    }
    match rx.recv().await.expect("resolved") {
        EditorEvent::MutationResolved(outcome) => assert!(outcome.is_rolled_back()),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn reload_is_refused_while_pending_and_replaces_grid_when_idle() {
    let schedule: ScheduleResponse = serde_json::from_value(serde_json::json!({
        "id": 1,
        "schedule_data": {
            "2025-10-16": { "night": ["e789"], "OFF": ["e123"] },
            "2025-10-17": { "evening": ["e456"] }
        },
        "total_score": 1000.0
    }))
    .expect("schedule");
    let gateway = ScriptedGateway::with_schedule(schedule);
    gateway
        .replies
        .lock()
        .expect("lock")
        .push_back(Reply::After(
            Duration::from_millis(150),
            Box::new(Reply::Accept {
                delta: 1.0,
                total: None,
            }),
        ));
    let (engine, _rx) = engine_with(gateway, Duration::from_secs(2));

    let pending = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.submit(move_e123()).await })
    };
    wait_for_phase(&engine, ReconciliationPhase::Pending).await;
    let err = engine.reload().await.expect_err("pending");
    assert!(matches!(err, EditorError::ReloadWhilePending));
    pending.await.expect("join").expect("submit");

    engine.reload().await.expect("reload");
    let grid = engine.store().current();
    assert_eq!(
        grid.container(&ContainerKey::unassigned(date(16))),
        &[EntityId::new("e123")]
    );
    assert_eq!(engine.scores().await.total, Some(1000.0));
}

#[tokio::test]
async fn typed_id_is_sent_in_the_grid_wire_form() {
    let grid = AssignmentGrid::from_containers([
        (
            key(16, "night"),
            vec![EntityId::numeric(5), EntityId::numeric(7)],
        ),
        (key(17, "day"), vec![EntityId::numeric(3)]),
    ])
    .expect("grid");
    let gateway = ScriptedGateway::new(vec![Reply::Accept {
        delta: 1.0,
        total: None,
    }]);
    let (events, _rx) = broadcast::channel(16);
    let engine = ReconciliationEngine::new(
        ScheduleId(1),
        grid,
        gateway.clone(),
        Duration::from_secs(1),
        events,
    );

    let typed = MoveIntent::new(EntityId::new("5"), key(16, "night"), key(17, "day"));
    let outcome = engine.submit(typed).await.expect("submit");

    assert!(outcome.is_committed());
    assert!(outcome.intent().entity().is_numeric());
    let sent = serde_json::to_value(&gateway.requests.lock().expect("lock")[0]).expect("encode");
    assert_eq!(sent["from_employee_id"], serde_json::json!(5));
    assert_eq!(sent["to_employee_id"], serde_json::json!(5));

    let current = engine.store().current();
    let moved = current
        .resolve(&EntityId::new("5"))
        .expect("moved entity stays in the grid");
    assert!(moved.is_numeric());
    assert_eq!(current.locate(moved), Some(&key(17, "day")));
}
