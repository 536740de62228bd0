use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::db::queries;
use crate::services::calendar::generate_ics;
use crate::state::AppState;

pub async fn download_ics(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Response {
    // Strip .ics suffix if present
    let booking_id = raw_id.strip_suffix(".ics").unwrap_or(&raw_id);

    let (booking, service_name) = {
        let db = state.db.lock().unwrap();
        let booking = match queries::get_booking(&db, booking_id) {
            Ok(Some(b)) => b,
            Ok(None) => {
                return (StatusCode::NOT_FOUND, "Booking not found").into_response();
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load booking for .ics");
                return (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response();
            }
        };
        let service_name = queries::get_service(&db, &booking.service_id)
            .ok()
            .flatten()
            .map(|s| s.name)
            .unwrap_or_else(|| "Appointment".to_string());
        (booking, service_name)
    };

    let ics = generate_ics(&booking, &service_name, &state.config.business_name);
    let filename = format!("booking-{booking_id}.ics");

    (
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                &format!("attachment; filename=\"{filename}\""),
            ),
        ],
        ics,
    )
        .into_response()
}
