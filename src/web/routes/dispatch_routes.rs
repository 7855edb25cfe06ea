use axum::{extract::State, routing::post, Json, Router};
use std::sync::Arc;
use tracing::info;

use crate::dispatch::PassSummary;
use crate::web::{AppError, AppState};

/// Triggers one dispatch pass outside the periodic schedule. The pass runs
/// to completion before responding; per-item failures are reflected in the
/// summary, not as an error status.
async fn run_dispatch_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<PassSummary>, AppError> {
    let summary = app_state.engine.run_dispatch_pass().await?;
    info!(
        scanned = summary.scanned,
        sent = summary.sent,
        failed = summary.failed,
        skipped = summary.skipped,
        "On-demand dispatch pass finished."
    );
    Ok(Json(summary))
}

pub fn create_dispatch_router() -> Router<Arc<AppState>> {
    Router::new().route("/run", post(run_dispatch_handler))
}
