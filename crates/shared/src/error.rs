use serde::{Deserialize, Serialize};

/// Error body as returned by the scheduling service on non-2xx responses:
/// `{"detail": "..."}`, or `{"message": "..."}` from older handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(alias = "message")]
    pub detail: String,
}
