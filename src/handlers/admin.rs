use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Actor, Booking, Service};
use crate::services::lifecycle::{self, AdminPatch};
use crate::services::notify::templates;
use crate::services::refund;
use crate::state::AppState;

pub(crate) fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

// GET /api/admin/bookings

#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct BookingResponse {
    id: String,
    service_id: String,
    date: String,
    time_slot: String,
    customer_name: String,
    customer_email: String,
    customer_phone: Option<String>,
    price_paid_cents: i64,
    status: String,
    stripe_payment_id: Option<String>,
    meeting_link: Option<String>,
    customer_notes: Option<String>,
    admin_notes: Option<String>,
    reminder_24h_sent: bool,
    reminder_1h_sent: bool,
    created_at: String,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        BookingResponse {
            id: b.id,
            service_id: b.service_id,
            date: b.date.format("%Y-%m-%d").to_string(),
            time_slot: b.time_slot,
            customer_name: b.customer_name,
            customer_email: b.customer_email,
            customer_phone: b.customer_phone,
            price_paid_cents: b.price_paid_cents,
            status: b.status.as_str().to_string(),
            stripe_payment_id: b.stripe_payment_id,
            meeting_link: b.meeting_link,
            customer_notes: b.customer_notes,
            admin_notes: b.admin_notes,
            reminder_24h_sent: b.reminder_24h_sent,
            reminder_1h_sent: b.reminder_1h_sent,
            created_at: b.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

pub async fn get_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let limit = query.limit.unwrap_or(50);
    let bookings = {
        let db = state.db.lock().unwrap();
        queries::list_bookings(&db, query.status.as_deref(), limit)?
    };

    Ok(Json(bookings.into_iter().map(BookingResponse::from).collect()))
}

// PATCH /api/admin/bookings/:id

pub async fn patch_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<AdminPatch>,
) -> Result<Json<BookingResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let updated = {
        let db = state.db.lock().unwrap();
        lifecycle::apply_admin_patch(&db, &id, &patch)?
    };
    Ok(Json(updated.into()))
}

// POST /api/admin/bookings/:id/cancel

#[derive(Deserialize, Default)]
pub struct AdminCancelBody {
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct AdminCancelResponse {
    pub ok: bool,
    pub refunded: bool,
}

pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<AdminCancelBody>>,
) -> Result<Json<AdminCancelResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let reason = body
        .and_then(|Json(b)| b.reason)
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| "cancelled by admin".to_string());

    let outcome =
        refund::refund_and_cancel(&state.db, state.payments.as_ref(), &id, &reason, Actor::Admin)
            .await?;

    let service_name = {
        let db = state.db.lock().unwrap();
        queries::get_service(&db, &outcome.booking.service_id)
            .ok()
            .flatten()
            .map(|s| s.name)
            .unwrap_or_else(|| "your booking".to_string())
    };
    let msg = templates::booking_cancelled(&outcome.booking, &service_name, &state.config, outcome.refunded);
    if let Err(e) = state.mailer.send(&msg).await {
        tracing::error!(booking_id = %outcome.booking.id, error = %e, "failed to send cancellation email");
    }
    if !state.config.operator_email.is_empty() {
        let msg = templates::operator_cancelled(&outcome.booking, &service_name, &state.config);
        if let Err(e) = state.mailer.send(&msg).await {
            tracing::error!(booking_id = %outcome.booking.id, error = %e, "failed to notify operator");
        }
    }

    Ok(Json(AdminCancelResponse {
        ok: true,
        refunded: outcome.refunded,
    }))
}

// GET /api/admin/blocked

#[derive(Serialize)]
pub struct BlockedDateResponse {
    date: String,
    reason: Option<String>,
}

pub async fn get_blocked(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<BlockedDateResponse>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let blocked = {
        let db = state.db.lock().unwrap();
        queries::list_blocked_dates(&db)?
    };

    let response = blocked
        .into_iter()
        .map(|b| BlockedDateResponse {
            date: b.date.format("%Y-%m-%d").to_string(),
            reason: b.reason,
        })
        .collect();
    Ok(Json(response))
}

// POST /api/admin/block

#[derive(Deserialize)]
pub struct BlockRequest {
    pub date: NaiveDate,
    pub reason: Option<String>,
}

pub async fn block_date(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<BlockRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let conflicts = {
        let db = state.db.lock().unwrap();
        queries::block_date(&db, body.date, body.reason.as_deref())?;
        // Blocking never cancels an existing booking; just flag the overlap
        queries::count_active_on_date(&db, body.date, None)? > 0
    };
    if conflicts {
        tracing::warn!(date = %body.date, "blocked a date that has an active booking");
    }

    Ok(Json(serde_json::json!({ "ok": true, "conflicts_with_booking": conflicts })))
}

// POST /api/admin/unblock

#[derive(Deserialize)]
pub struct UnblockRequest {
    pub date: NaiveDate,
}

pub async fn unblock_date(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<UnblockRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let removed = {
        let db = state.db.lock().unwrap();
        queries::unblock_date(&db, body.date)?
    };

    if removed {
        Ok(Json(serde_json::json!({ "ok": true })))
    } else {
        Err(AppError::NotFound(format!("blocked date {}", body.date)))
    }
}

// GET /api/admin/services

pub async fn get_services(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Service>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let services = {
        let db = state.db.lock().unwrap();
        queries::list_services(&db, false)?
    };
    Ok(Json(services))
}

// POST /api/admin/services

#[derive(Deserialize)]
pub struct UpsertServiceRequest {
    pub id: Option<String>,
    pub name: String,
    pub price_cents: i64,
    pub duration_label: Option<String>,
    pub active: Option<bool>,
    pub featured: Option<bool>,
}

pub async fn upsert_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<UpsertServiceRequest>,
) -> Result<Json<Service>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    if body.name.trim().is_empty() {
        return Err(AppError::Validation("service name is required".to_string()));
    }
    if body.price_cents <= 0 {
        return Err(AppError::Validation("price must be positive".to_string()));
    }

    let service = Service {
        id: body.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        name: body.name.trim().to_string(),
        price_cents: body.price_cents,
        duration_label: body.duration_label.unwrap_or_default(),
        active: body.active.unwrap_or(true),
        featured: body.featured.unwrap_or(false),
        created_at: Utc::now().naive_utc(),
    };

    {
        let db = state.db.lock().unwrap();
        queries::upsert_service(&db, &service)?;
    }
    Ok(Json(service))
}
