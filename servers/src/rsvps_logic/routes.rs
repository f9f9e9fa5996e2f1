use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderValue, Method, header::CONTENT_TYPE},
    routing::{get, post},
};
use lib_rsvps::{BatchContext, BatchOutcome};
use serde::Deserialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

use super::error::AppError;
use super::state::AppState;

/// Body of `POST /query`.
#[derive(Debug, Default, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub meetups: Vec<String>,
}

pub fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/query", post(query_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

/// Browsers may call `POST /query` from the listed origins only. A `*`
/// entry opens it to every origin.
pub fn cors(allowed_origins: Vec<HeaderValue>) -> CorsLayer {
    let allow_origin = if allowed_origins.iter().any(|origin| origin.as_bytes() == b"*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed_origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::POST])
        .allow_headers([CONTENT_TYPE])
}

// Raw bytes so a bad body maps to our own 400 instead of axum's rejection.
async fn query_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<BatchOutcome>, AppError> {
    let request: QueryRequest = serde_json::from_slice(&body)?;

    let ctx = BatchContext::with_timeout(state.request_timeout).with_cancel(state.cancel.child_token());
    let outcome = state.aggregator.resolve_batch(&request.meetups, &ctx).await?;

    info!(
        requested = request.meetups.len(),
        resolved = outcome.meetups.len(),
        unparseable = outcome.skipped.unparseable,
        not_allowed = outcome.skipped.not_allowed,
        attendees = outcome.summary.unique_attendees(),
        "query served"
    );
    Ok(Json(outcome))
}

async fn health_handler() -> &'static str {
    "OK"
}
