use facility_import_core::ImportError;
use thiserror::Error;

/// Failures talking to the facility API.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Request rejected after refreshing the session")]
    Unauthorized,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("A facility upload is already in progress")]
    SubmissionInFlight,

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("No active session")]
    NoSession,

    #[error(transparent)]
    Import(#[from] ImportError),
}
