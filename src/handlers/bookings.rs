use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::service::format_amount;
use crate::services::{availability, lifecycle};
use crate::state::AppState;

// GET /api/services

#[derive(Serialize)]
pub struct ServiceResponse {
    id: String,
    name: String,
    price_cents: i64,
    price_display: String,
    duration_label: String,
    featured: bool,
}

pub async fn list_services(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ServiceResponse>>, AppError> {
    let services = {
        let db = state.db.lock().unwrap();
        queries::list_services(&db, true)?
    };

    let response = services
        .into_iter()
        .map(|s| ServiceResponse {
            price_display: format_amount(s.price_cents, &state.config.currency_label),
            id: s.id,
            name: s.name,
            price_cents: s.price_cents,
            duration_label: s.duration_label,
            featured: s.featured,
        })
        .collect();
    Ok(Json(response))
}

// GET /api/availability?from=YYYY-MM-DD&to=YYYY-MM-DD

#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Serialize)]
pub struct AvailabilityResponse {
    unavailable: Vec<String>,
}

pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    if query.to < query.from {
        return Err(AppError::Validation("`to` must not be before `from`".to_string()));
    }
    if (query.to - query.from).num_days() > 370 {
        return Err(AppError::Validation("date range too large".to_string()));
    }

    let dates = {
        let db = state.db.lock().unwrap();
        availability::unavailable_dates(&db, query.from, query.to, None)?
    };

    Ok(Json(AvailabilityResponse {
        unavailable: dates.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect(),
    }))
}

// POST /api/bookings

#[derive(Deserialize)]
pub struct CreateBookingBody {
    pub service_id: String,
    pub date: NaiveDate,
    pub time: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

#[derive(Serialize)]
pub struct CreateBookingResponse {
    pub booking_id: String,
    pub checkout_url: String,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBookingBody>,
) -> Result<Json<CreateBookingResponse>, AppError> {
    // Per-client budget against scripted slot-squatting
    let client = client_key(&headers);
    {
        let db = state.db.lock().unwrap();
        let count = queries::increment_request_count(&db, &client)?;
        if count > state.config.create_rate_limit_per_minute {
            tracing::warn!(client = %client, count, "booking rate limit exceeded");
            return Err(AppError::RateLimited);
        }
        let _ = queries::cleanup_old_windows(&db);
    }

    let req = lifecycle::CreateBookingRequest {
        service_id: body.service_id,
        date: body.date,
        time: body.time,
        name: body.name,
        email: body.email,
        phone: body.phone,
        notes: body.notes,
    };
    let today = state.config.local_now().date();

    let (booking, service_name) = {
        let db = state.db.lock().unwrap();
        let booking = lifecycle::create_booking(&db, &req, today)?;
        let service_name = queries::get_service(&db, &booking.service_id)?
            .map(|s| s.name)
            .unwrap_or_else(|| "Booking".to_string());
        (booking, service_name)
    };

    let success_url = format!("{}/booking/success?b={}", state.config.base_url, booking.id);
    let cancel_url = format!("{}/booking/abandoned?b={}", state.config.base_url, booking.id);

    let session = state
        .payments
        .create_checkout(
            &booking,
            &service_name,
            &state.config.currency,
            &success_url,
            &cancel_url,
        )
        .await
        .map_err(|e| {
            // The pending booking stays behind holding its date; the admin
            // cancel path reconciles abandoned rows.
            tracing::error!(booking_id = %booking.id, error = %e, "checkout session creation failed");
            AppError::Payment(e.to_string())
        })?;

    Ok(Json(CreateBookingResponse {
        booking_id: booking.id,
        checkout_url: session.url,
    }))
}

fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "local".to_string())
}
