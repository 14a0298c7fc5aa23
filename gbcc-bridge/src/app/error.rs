use thiserror::Error;

use crate::domain::{PeripheralError, SnapshotError};
use crate::engine::EngineError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a session is already active")]
    AlreadyActive,

    #[error("no session is active")]
    NotActive,

    /// Engine refused the ROM; carries the engine's own message.
    #[error("{0}")]
    Initialization(String),

    #[error("failed to spawn emulation worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("save slot {0} is out of range (1-9)")]
    InvalidSlot(u8),

    #[error("invalid preferences: {0}")]
    Preferences(#[from] serde_json::Error),

    #[error(transparent)]
    Peripheral(#[from] PeripheralError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

impl From<EngineError> for SessionError {
    fn from(err: EngineError) -> Self {
        Self::Initialization(err.message)
    }
}
