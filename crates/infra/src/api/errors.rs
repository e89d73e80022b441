//! Store API error types
//!
//! Classifies what went wrong talking to the persisted store before it is
//! flattened into a [`PlanSyncError`] at the crate boundary.

use std::time::Duration;

use plansync_domain::PlanSyncError;
use thiserror::Error;

/// Categories of API errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// The store refused the request (4xx)
    Client,
    /// The store failed or answered with something unreadable (5xx)
    Server,
    /// Connection, DNS or timeout failures
    Network,
    /// Bad base URL or client setup
    Config,
}

/// Store API operation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("{message}")]
    Client { status: u16, message: String },

    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("Invalid response body: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),
}

impl ApiError {
    /// Error for a non-success status, using the store's `{"error": ...}`
    /// text when there is one.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if (400..500).contains(&status) {
            Self::Client { status, message }
        } else {
            Self::Server { status, message }
        }
    }

    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Client { .. } => ApiErrorCategory::Client,
            Self::Server { .. } | Self::InvalidResponse(_) => ApiErrorCategory::Server,
            Self::Network(_) | Self::Timeout(_) => ApiErrorCategory::Network,
            Self::Config(_) => ApiErrorCategory::Config,
        }
    }

    /// Flatten into the domain error for the named store operation.
    ///
    /// Anything the store itself answered becomes
    /// `PlanSyncError::Persistence`, so the alert reads
    /// `Error received from <op> API: <message>`.
    pub fn into_domain(self, operation: &str) -> PlanSyncError {
        match self.category() {
            ApiErrorCategory::Client | ApiErrorCategory::Server => {
                PlanSyncError::persistence(operation, self.to_string())
            }
            ApiErrorCategory::Network => PlanSyncError::Network(self.to_string()),
            ApiErrorCategory::Config => PlanSyncError::Config(self.to_string()),
        }
    }
}

/// Errors from the shared [`crate::http::HttpClient`].
impl From<PlanSyncError> for ApiError {
    fn from(err: PlanSyncError) -> Self {
        match err {
            PlanSyncError::Config(message) | PlanSyncError::Internal(message) => {
                Self::Config(message)
            }
            PlanSyncError::Network(message) => Self::Network(message),
            other => Self::Network(other.to_string()),
        }
    }
}
