//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::InsertDirection;

/// Main error type for PlanSync
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum PlanSyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Error received from {operation} API: {message}")]
    Persistence { operation: String, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed {event} message: {reason}")]
    MalformedMessage { event: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlanSyncError {
    /// Build a persistence failure for the named store operation.
    pub fn persistence(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Persistence { operation: operation.into(), message: message.into() }
    }

    /// Stable label suitable for structured log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Network(_) => "network",
            Self::Persistence { .. } => "persistence",
            Self::Transport(_) => "transport",
            Self::MalformedMessage { .. } => "malformed_message",
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::Internal(_) => "internal",
        }
    }

    /// Only a failed transport bootstrap ends a session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Result type alias for PlanSync operations
pub type Result<T> = std::result::Result<T, PlanSyncError>;

/// A local mutation that was refused before touching state or the network.
///
/// `Display` yields the warning shown to the user.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rejection {
    #[error("A plan needs at least one date")]
    AtLeastOneDate,

    #[error("A date needs at least one activity")]
    AtLeastOneActivity,

    #[error("{}", date_exists_message(.0))]
    DateExists(InsertDirection),

    #[error("No room left between these activities")]
    KeySpaceExhausted,

    #[error("Date is outside the supported calendar range")]
    OutOfCalendarRange,

    #[error("Date is not part of this plan")]
    UnknownDate,

    #[error("Activity is not part of this date")]
    UnknownActivity,

    #[error("Activity is being edited by another participant")]
    LockedByOther,
}

fn date_exists_message(direction: &InsertDirection) -> &'static str {
    match direction {
        InsertDirection::After => "Next date already exists",
        InsertDirection::Before => "Previous date already exists",
    }
}
