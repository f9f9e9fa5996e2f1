use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lib_rsvps::BatchError;
use thiserror::Error;
use tracing::{error, warn};

/// Errors a request can end in. Clients get a short fixed message; the
/// details only go to the log.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("malformed request body: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error(transparent)]
    Batch(#[from] BatchError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::MalformedPayload(e) => {
                warn!(error = %e, "rejecting query with undecodable body");
                (StatusCode::BAD_REQUEST, "Failed to decode JSON").into_response()
            }
            AppError::Batch(e) => {
                error!(error = %e, "query failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch RSVP").into_response()
            }
        }
    }
}
