use shared::domain::EntityId;
use thiserror::Error;

use crate::{gateway::GatewayError, grid::GridError};

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("a change for {pending} is still awaiting validation")]
    MutationInFlight { pending: EntityId },
    #[error("cannot replace the schedule while a change is awaiting validation")]
    ReloadWhilePending,
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Override(#[from] OverrideError),
    #[error("reconciliation task failed: {0}")]
    Worker(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OverrideError {
    #[error("an override requires a justification")]
    MissingJustification,
    #[error("override source and destination are the same cell")]
    SameCell,
}
