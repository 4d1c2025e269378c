//! Live per-user lists that the pages render and act on.
//!
//! Each board is built for one [`SessionContext`](crate::core::session::SessionContext)
//! and lives as long as that session. Reads come in through
//! [`apply`](todos::TodoBoard::apply) from a store subscription; every
//! operation returns a `'static` future that performs the write, whose
//! effect then echoes back through the subscription.

pub mod hobbies;
pub mod todos;
pub mod topics;

use crate::store::{StoreError, StoreResult};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("text cannot be empty")]
    EmptyText,
    #[error("title cannot be empty")]
    EmptyTitle,
    #[error("name cannot be empty")]
    EmptyName,
    #[error("no item with id {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Log a failed write and lift it into a board error.
pub(crate) fn logged<T>(action: &str, result: StoreResult<T>) -> Result<T, BoardError> {
    result.map_err(|e| {
        log::error!("Failed to {}: {}", action, e);
        BoardError::Store(e)
    })
}

pub(crate) fn encode<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, BoardError> {
    serde_json::to_value(value).map_err(|e| BoardError::Store(StoreError::Decode(e.to_string())))
}
