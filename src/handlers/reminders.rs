use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use super::admin::check_auth;
use crate::errors::AppError;
use crate::services::reminders::{self, SweepReport};
use crate::state::AppState;

#[derive(Serialize)]
pub struct RemindersResponse {
    pub reminder_24h: SweepReport,
    pub reminder_1h: SweepReport,
}

/// Invoked by an external hourly schedule. Both sweeps are idempotent, so
/// overlapping or repeated triggers are harmless.
pub async fn run_reminders(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<RemindersResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let now_local = state.config.local_now();
    let reminder_24h =
        reminders::run_24h_sweep(&state.db, state.mailer.as_ref(), &state.config, now_local).await;
    let reminder_1h =
        reminders::run_1h_sweep(&state.db, state.mailer.as_ref(), &state.config, now_local).await;

    tracing::info!(
        sent_24h = reminder_24h.sent,
        errors_24h = reminder_24h.errors,
        sent_1h = reminder_1h.sent,
        errors_1h = reminder_1h.errors,
        "reminder sweeps finished"
    );

    Ok(Json(RemindersResponse {
        reminder_24h,
        reminder_1h,
    }))
}
