use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::service::format_amount;
use crate::models::{Actor, Booking};
use crate::services::notify::templates;
use crate::services::{lifecycle, refund, token};
use crate::state::AppState;

const MIN_REASON_LEN: usize = 5;

/// Resolves a bearer token to its booking. Every failure — bad tag, expiry,
/// unknown booking, email mismatch — collapses to the same opaque error.
fn authorize(state: &AppState, raw_token: &str) -> Result<Booking, AppError> {
    let claims = token::validate(&state.config.token_secret, raw_token).map_err(|_| {
        tracing::warn!("self-service token rejected");
        AppError::InvalidToken
    })?;

    let booking = {
        let db = state.db.lock().unwrap();
        queries::get_booking(&db, &claims.booking_id)?
    }
    .ok_or(AppError::InvalidToken)?;

    if !booking.customer_email.eq_ignore_ascii_case(&claims.email) {
        tracing::warn!(booking_id = %booking.id, "token email does not match booking");
        return Err(AppError::InvalidToken);
    }
    Ok(booking)
}

fn service_name(state: &AppState, service_id: &str) -> String {
    let db = state.db.lock().unwrap();
    queries::get_service(&db, service_id)
        .ok()
        .flatten()
        .map(|s| s.name)
        .unwrap_or_else(|| "your booking".to_string())
}

// GET /booking/manage/:token

#[derive(Serialize)]
pub struct ManageResponse {
    booking_id: String,
    service: String,
    date: String,
    time: String,
    status: String,
    price_display: String,
    meeting_link: Option<String>,
}

pub async fn manage(
    State(state): State<Arc<AppState>>,
    Path(raw_token): Path<String>,
) -> Result<Json<ManageResponse>, AppError> {
    let booking = authorize(&state, &raw_token)?;
    let service = service_name(&state, &booking.service_id);

    Ok(Json(ManageResponse {
        booking_id: booking.id,
        service,
        date: booking.date.format("%Y-%m-%d").to_string(),
        time: booking.time_slot,
        status: booking.status.as_str().to_string(),
        price_display: format_amount(booking.price_paid_cents, &state.config.currency_label),
        meeting_link: booking.meeting_link,
    }))
}

// POST /booking/cancel/:token

#[derive(Deserialize)]
pub struct CancelBody {
    pub reason: String,
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub refunded: bool,
}

pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(raw_token): Path<String>,
    Json(body): Json<CancelBody>,
) -> Result<Json<CancelResponse>, AppError> {
    let reason = body.reason.trim();
    if reason.len() < MIN_REASON_LEN {
        return Err(AppError::Validation(format!(
            "please give a short reason (at least {MIN_REASON_LEN} characters)"
        )));
    }

    let booking = authorize(&state, &raw_token)?;
    let outcome = refund::refund_and_cancel(
        &state.db,
        state.payments.as_ref(),
        &booking.id,
        reason,
        Actor::Customer,
    )
    .await?;

    let service = service_name(&state, &outcome.booking.service_id);
    let msg = templates::booking_cancelled(&outcome.booking, &service, &state.config, outcome.refunded);
    if let Err(e) = state.mailer.send(&msg).await {
        tracing::error!(booking_id = %outcome.booking.id, error = %e, "failed to send cancellation email");
    }
    if !state.config.operator_email.is_empty() {
        let msg = templates::operator_cancelled(&outcome.booking, &service, &state.config);
        if let Err(e) = state.mailer.send(&msg).await {
            tracing::error!(booking_id = %outcome.booking.id, error = %e, "failed to notify operator");
        }
    }

    Ok(Json(CancelResponse {
        refunded: outcome.refunded,
    }))
}

// POST /booking/reschedule/:token

#[derive(Deserialize)]
pub struct RescheduleBody {
    pub new_date: NaiveDate,
    pub new_time: Option<String>,
}

#[derive(Serialize)]
pub struct RescheduleResponse {
    pub new_date: String,
}

pub async fn reschedule(
    State(state): State<Arc<AppState>>,
    Path(raw_token): Path<String>,
    Json(body): Json<RescheduleBody>,
) -> Result<Json<RescheduleResponse>, AppError> {
    let booking = authorize(&state, &raw_token)?;
    let today = state.config.local_now().date();

    let updated = {
        let db = state.db.lock().unwrap();
        lifecycle::reschedule(&db, &booking.id, body.new_date, body.new_time.as_deref(), today)?
    };

    let service = service_name(&state, &updated.service_id);
    let msg = templates::booking_rescheduled(&updated, &service, &state.config);
    if let Err(e) = state.mailer.send(&msg).await {
        tracing::error!(booking_id = %updated.id, error = %e, "failed to send reschedule email");
    }
    if !state.config.operator_email.is_empty() {
        let msg = templates::operator_rescheduled(&updated, &service, &state.config);
        if let Err(e) = state.mailer.send(&msg).await {
            tracing::error!(booking_id = %updated.id, error = %e, "failed to notify operator");
        }
    }

    Ok(Json(RescheduleResponse {
        new_date: updated.date.format("%Y-%m-%d").to_string(),
    }))
}
