//! Optimistic application of a move intent ahead of server validation.

use std::sync::Arc;

use tracing::debug;

use crate::{
    grid::{AssignmentGrid, GridStore},
    types::MoveIntent,
};

/// The record kept while a mutation is outstanding: the intent plus the grid
/// to restore if the server does not confirm it.
#[derive(Debug, Clone)]
pub struct PendingMutation {
    pub intent: MoveIntent,
    pub snapshot: Arc<AssignmentGrid>,
    pub tentative: Arc<AssignmentGrid>,
}

/// Snapshots the current grid, applies `intent`, and publishes the tentative
/// grid before any network round trip.
pub(crate) fn apply_optimistically(store: &GridStore, intent: MoveIntent) -> PendingMutation {
    let snapshot = store.current();
    let tentative = Arc::new(snapshot.apply(&intent));
    store.publish(Arc::clone(&tentative));
    debug!(
        entity = %intent.entity(),
        from = %intent.source(),
        to = %intent.destination(),
        forced = intent.is_forced(),
        "applier: tentative grid published"
    );
    PendingMutation {
        intent,
        snapshot,
        tentative,
    }
}
