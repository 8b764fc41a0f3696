//! Translates pointer and keyboard drag gestures into move intents.

use std::collections::HashSet;

use chrono::NaiveDate;
use shared::domain::{ContainerKey, EntityId, ShiftLabel};
use tokio::sync::watch;
use tracing::debug;

use crate::types::{MoveIntent, ReconciliationPhase};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerEvent {
    Press {
        entity: EntityId,
        origin: ContainerKey,
    },
    Move {
        over: Option<ContainerKey>,
    },
    Release {
        over: Option<ContainerKey>,
    },
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyEvent {
    PickUp {
        entity: EntityId,
        origin: ContainerKey,
    },
    Arrow(Direction),
    Drop,
    Escape,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GestureEvent {
    Pointer(PointerEvent),
    Key(KeyEvent),
}

/// Droppable cells: every date crossed with every shift, plus the unassigned
/// row. Keyboard navigation moves across dates horizontally and shifts
/// vertically.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GridLayout {
    dates: Vec<NaiveDate>,
    shifts: Vec<ShiftLabel>,
}

impl GridLayout {
    pub fn new(mut dates: Vec<NaiveDate>, shifts: Vec<ShiftLabel>) -> Self {
        dates.sort();
        dates.dedup();
        let mut seen = HashSet::new();
        let mut shifts: Vec<ShiftLabel> = shifts
            .into_iter()
            .filter(|shift| !shift.is_unassigned() && seen.insert(shift.clone()))
            .collect();
        shifts.push(ShiftLabel::unassigned());
        Self { dates, shifts }
    }

    pub fn contains(&self, key: &ContainerKey) -> bool {
        self.dates.contains(&key.date) && self.shifts.contains(&key.shift)
    }

    /// Neighbouring cell in `direction`; edges clamp to the current cell.
    pub fn step(&self, from: &ContainerKey, direction: Direction) -> Option<ContainerKey> {
        let date_idx = self.dates.iter().position(|date| *date == from.date)?;
        let shift_idx = self.shifts.iter().position(|shift| *shift == from.shift)?;
        let (date_idx, shift_idx) = match direction {
            Direction::Left => (date_idx.saturating_sub(1), shift_idx),
            Direction::Right => ((date_idx + 1).min(self.dates.len() - 1), shift_idx),
            Direction::Up => (date_idx, shift_idx.saturating_sub(1)),
            Direction::Down => (date_idx, (shift_idx + 1).min(self.shifts.len() - 1)),
        };
        Some(ContainerKey::new(
            self.dates[date_idx],
            self.shifts[shift_idx].clone(),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum GestureState {
    Idle,
    Dragging {
        entity: EntityId,
        origin: ContainerKey,
        over: Option<ContainerKey>,
    },
}

/// Emits at most one intent per completed gesture and stays disabled while a
/// mutation is pending.
pub struct InteractionController {
    layout: GridLayout,
    phase: watch::Receiver<ReconciliationPhase>,
    state: GestureState,
}

impl InteractionController {
    pub fn new(layout: GridLayout, phase: watch::Receiver<ReconciliationPhase>) -> Self {
        Self {
            layout,
            phase,
            state: GestureState::Idle,
        }
    }

    pub fn set_layout(&mut self, layout: GridLayout) {
        self.layout = layout;
        self.state = GestureState::Idle;
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn is_enabled(&self) -> bool {
        *self.phase.borrow() == ReconciliationPhase::Idle
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, GestureState::Dragging { .. })
    }

    /// Cell currently under the dragged entity, if any.
    pub fn hover(&self) -> Option<&ContainerKey> {
        match &self.state {
            GestureState::Dragging { over, .. } => over.as_ref(),
            GestureState::Idle => None,
        }
    }

    pub fn handle(&mut self, event: GestureEvent) -> Option<MoveIntent> {
        match event {
            GestureEvent::Pointer(PointerEvent::Press { entity, origin })
            | GestureEvent::Key(KeyEvent::PickUp { entity, origin }) => {
                self.begin(entity, origin);
                None
            }
            GestureEvent::Pointer(PointerEvent::Move { over }) => {
                if let GestureState::Dragging { over: current, .. } = &mut self.state {
                    *current = over;
                }
                None
            }
            GestureEvent::Key(KeyEvent::Arrow(direction)) => {
                if let GestureState::Dragging { origin, over, .. } = &mut self.state {
                    let from = over.clone().unwrap_or_else(|| origin.clone());
                    *over = self.layout.step(&from, direction).or(Some(from));
                }
                None
            }
            GestureEvent::Pointer(PointerEvent::Release { over }) => self.finish(over),
            GestureEvent::Key(KeyEvent::Drop) => {
                let over = self.hover().cloned();
                self.finish(over)
            }
            GestureEvent::Pointer(PointerEvent::Cancel) | GestureEvent::Key(KeyEvent::Escape) => {
                if self.is_dragging() {
                    debug!("gesture: cancelled");
                }
                self.state = GestureState::Idle;
                None
            }
        }
    }

    fn begin(&mut self, entity: EntityId, origin: ContainerKey) {
        if !self.is_enabled() {
            debug!(entity = %entity, "gesture: ignored while a mutation is pending");
            self.state = GestureState::Idle;
            return;
        }
        if !self.layout.contains(&origin) {
            debug!(entity = %entity, origin = %origin, "gesture: origin outside the grid");
            self.state = GestureState::Idle;
            return;
        }
        self.state = GestureState::Dragging {
            entity,
            origin,
            over: None,
        };
    }

    fn finish(&mut self, over: Option<ContainerKey>) -> Option<MoveIntent> {
        let GestureState::Dragging { entity, origin, .. } =
            std::mem::replace(&mut self.state, GestureState::Idle)
        else {
            return None;
        };

        if !self.is_enabled() {
            debug!(entity = %entity, "gesture: dropped while a mutation is pending");
            return None;
        }
        let Some(destination) = over.filter(|key| self.layout.contains(key)) else {
            debug!(entity = %entity, "gesture: ended outside any container");
            return None;
        };
        if destination == origin {
            debug!(entity = %entity, "gesture: ended on its origin");
            return None;
        }

        Some(MoveIntent::new(entity, origin, destination))
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
