use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use crate::app::AppState;
use duebell_scheduler::SchedulerState;

/// GET /status: scheduler state, recent runs, window settings and a live
/// check of both external services.
///
/// `healthy` requires a running scheduler, a board login and a readable
/// topic. Never waits for a cycle in progress.
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let (board, notify) = tokio::join!(
        state.scheduler.check_board_access(),
        state.scheduler.check_notify()
    );
    if let Err(e) = &board {
        warn!("status: board check failed: {e}");
    }
    if let Err(e) = &notify {
        warn!("status: topic check failed: {e}");
    }

    let snapshot = state.scheduler.snapshot();
    let healthy =
        snapshot.state == SchedulerState::Running && board.is_ok() && notify.is_ok();
    let reminders = &state.config.reminders;
    Json(json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "board_connection": board.is_ok(),
        "notify_connection": notify.is_ok(),
        "scheduler": snapshot,
        "last_status": state.scheduler.last_status(),
        "settings": {
            "lookahead_minutes": reminders.lookahead_minutes,
            "poll_interval_minutes": reminders.poll_interval_minutes,
            "overdue_retention_hours": reminders.overdue_retention_hours,
            "timezone": reminders.timezone,
            "board_url": state.config.board.base_url,
            "topic_arn": state.config.notify.topic_arn,
        },
    }))
}
