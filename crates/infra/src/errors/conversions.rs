//! Conversions from external infrastructure errors into domain errors.

use plansync_domain::PlanSyncError;
use reqwest::Error as HttpError;
use tokio_tungstenite::tungstenite::Error as WsError;
use url::ParseError as UrlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub PlanSyncError);

impl From<InfraError> for PlanSyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<PlanSyncError> for InfraError {
    fn from(value: PlanSyncError) -> Self {
        InfraError(value)
    }
}

trait IntoPlanSyncError {
    fn into_plansync(self) -> PlanSyncError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → PlanSyncError */
/* -------------------------------------------------------------------------- */

impl IntoPlanSyncError for HttpError {
    fn into_plansync(self) -> PlanSyncError {
        if self.is_timeout() {
            return PlanSyncError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return PlanSyncError::Network("HTTP connection failure".into());
        }

        if self.is_builder() {
            return PlanSyncError::Config(format!("invalid HTTP request: {self}"));
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                404 => PlanSyncError::NotFound(message),
                400..=499 => PlanSyncError::InvalidInput(message),
                _ => PlanSyncError::Network(message),
            };
        }

        if self.is_decode() {
            return PlanSyncError::Internal(format!("invalid HTTP response body: {self}"));
        }

        PlanSyncError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_plansync())
    }
}

/* -------------------------------------------------------------------------- */
/* tungstenite::Error → PlanSyncError */
/* -------------------------------------------------------------------------- */

impl IntoPlanSyncError for WsError {
    fn into_plansync(self) -> PlanSyncError {
        match self {
            WsError::ConnectionClosed | WsError::AlreadyClosed => {
                PlanSyncError::Transport("hub connection closed".into())
            }
            WsError::Io(err) => PlanSyncError::Transport(format!("hub I/O failure: {err}")),
            WsError::Url(err) => PlanSyncError::Config(format!("invalid hub URL: {err}")),
            WsError::Http(response) => PlanSyncError::Transport(format!(
                "hub rejected the WebSocket upgrade with HTTP {}",
                response.status()
            )),
            other => PlanSyncError::Transport(other.to_string()),
        }
    }
}

impl From<WsError> for InfraError {
    fn from(value: WsError) -> Self {
        InfraError(value.into_plansync())
    }
}

/* -------------------------------------------------------------------------- */
/* url::ParseError → PlanSyncError */
/* -------------------------------------------------------------------------- */

impl From<UrlError> for InfraError {
    fn from(value: UrlError) -> Self {
        InfraError(PlanSyncError::Config(format!("invalid URL: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
