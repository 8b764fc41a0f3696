//! Assignment grid snapshots and the store that publishes them.

use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    sync::Arc,
};

use chrono::NaiveDate;
use shared::{
    domain::{ContainerKey, EntityId, ShiftLabel},
    protocol::ScheduleResponse,
};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::types::MoveIntent;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("entity {entity} is assigned to both {first} and {second}")]
    DuplicateEntity {
        entity: EntityId,
        first: ContainerKey,
        second: ContainerKey,
    },
}

/// Immutable mapping from grid cell to the entities placed in it.
///
/// Every entity appears in at most one container. Order inside a container is
/// display order only.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssignmentGrid {
    containers: BTreeMap<ContainerKey, Vec<EntityId>>,
}

impl AssignmentGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_containers<I>(containers: I) -> Result<Self, GridError>
    where
        I: IntoIterator<Item = (ContainerKey, Vec<EntityId>)>,
    {
        let mut grid = Self::default();
        let mut seen: BTreeMap<EntityId, ContainerKey> = BTreeMap::new();
        for (key, entities) in containers {
            for entity in &entities {
                if let Some(first) = seen.insert(entity.clone(), key.clone()) {
                    return Err(GridError::DuplicateEntity {
                        entity: entity.clone(),
                        first,
                        second: key,
                    });
                }
            }
            grid.containers.entry(key).or_default().extend(entities);
        }
        Ok(grid)
    }

    pub fn from_schedule(schedule: &ScheduleResponse) -> Result<Self, GridError> {
        Self::from_containers(schedule.schedule_data.iter().flat_map(|(date, shifts)| {
            shifts.iter().map(move |(shift, entities)| {
                (ContainerKey::new(*date, shift.clone()), entities.clone())
            })
        }))
    }

    pub fn container(&self, key: &ContainerKey) -> &[EntityId] {
        self.containers.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn containers(&self) -> impl Iterator<Item = (&ContainerKey, &[EntityId])> {
        self.containers
            .iter()
            .map(|(key, entities)| (key, entities.as_slice()))
    }

    pub fn locate(&self, entity: &EntityId) -> Option<&ContainerKey> {
        self.containers
            .iter()
            .find(|(_, entities)| entities.contains(entity))
            .map(|(key, _)| key)
    }

    /// The id as stored in the grid, which carries its wire form.
    pub fn resolve(&self, entity: &EntityId) -> Option<&EntityId> {
        self.containers
            .values()
            .flatten()
            .find(|candidate| *candidate == entity)
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.containers
            .keys()
            .map(|key| key.date)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn shifts(&self) -> Vec<ShiftLabel> {
        self.containers
            .keys()
            .map(|key| key.shift.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Entities placed in any assignable shift on `date`.
    pub fn working_on(&self, date: NaiveDate) -> Vec<EntityId> {
        self.containers
            .iter()
            .filter(|(key, _)| key.date == date && key.is_assignable())
            .flat_map(|(_, entities)| entities.iter().cloned())
            .collect()
    }

    pub fn has_unique_membership(&self) -> bool {
        let mut seen = HashSet::new();
        self.containers
            .values()
            .flatten()
            .all(|entity| seen.insert(entity))
    }

    /// Produces the grid that results from `intent` without touching `self`.
    ///
    /// The entity is removed from whichever container holds it, then appended
    /// to the destination unless the destination is the unassigned sentinel.
    pub fn apply(&self, intent: &MoveIntent) -> AssignmentGrid {
        if intent.is_noop() {
            return self.clone();
        }

        let mut next = self.clone();
        let entity = intent.entity();
        let holder = next
            .containers
            .iter_mut()
            .find(|(_, entities)| entities.contains(entity));
        match holder {
            Some((key, entities)) => {
                if key != intent.source() {
                    debug!(
                        entity = %entity,
                        expected = %intent.source(),
                        found = %key,
                        "grid: entity held outside the declared source"
                    );
                }
                entities.retain(|candidate| candidate != entity);
            }
            None => {
                warn!(
                    entity = %entity,
                    source = %intent.source(),
                    "grid: entity not found in any container; removal skipped"
                );
            }
        }

        if intent.destination().is_assignable() {
            next.containers
                .entry(intent.destination().clone())
                .or_default()
                .push(entity.clone());
        }
        next
    }
}

/// Single published grid with any number of readers.
///
/// Writes are crate-private: only the reconciliation engine publishes.
pub struct GridStore {
    tx: watch::Sender<Arc<AssignmentGrid>>,
}

impl GridStore {
    pub fn new(grid: AssignmentGrid) -> Self {
        let (tx, _) = watch::channel(Arc::new(grid));
        Self { tx }
    }

    pub fn current(&self) -> Arc<AssignmentGrid> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<AssignmentGrid>> {
        self.tx.subscribe()
    }

    pub(crate) fn publish(&self, grid: Arc<AssignmentGrid>) {
        self.tx.send_replace(grid);
    }
}

#[cfg(test)]
#[path = "tests/grid_tests.rs"]
mod tests;
