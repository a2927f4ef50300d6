use axum::{extract::State, http::StatusCode, Json};
use duebell_scheduler::{RunOutcome, SchedulerError};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

use crate::app::AppState;

/// POST /reminders/run: run one cycle now and return its summary.
///
/// 200 on success/partial, 500 when the cycle failed, 409 while another
/// cycle is in flight.
pub async fn run_handler(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    info!("manual reminder run requested");

    // Spawned: a cycle runs to completion even if the client disconnects.
    let scheduler = Arc::clone(&state.scheduler);
    let result = tokio::spawn(async move { scheduler.trigger_now().await }).await;

    match result {
        Ok(Ok(summary)) => {
            let status = if summary.outcome == RunOutcome::Failed {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::OK
            };
            (status, Json(json!(summary)))
        }
        Ok(Err(SchedulerError::Busy)) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "busy" })),
        ),
        Ok(Err(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        ),
        Err(e) => {
            error!("manual reminder task panicked: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "reminder cycle aborted" })),
            )
        }
    }
}
