use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::{Actor, Booking, BookingStatus};
use crate::services::availability;

#[derive(Debug, Clone)]
pub struct CreateBookingRequest {
    pub service_id: String,
    pub date: NaiveDate,
    pub time: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

/// Creates a `pending` booking with a price snapshot taken from the service.
///
/// Availability is re-checked here, at write time, but the partial unique
/// index on active dates is the real arbiter: when two requests race for the
/// same date, the loser's INSERT fails the constraint and maps to
/// `DateUnavailable`.
pub fn create_booking(
    conn: &Connection,
    req: &CreateBookingRequest,
    today: NaiveDate,
) -> Result<Booking, AppError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    let email = req.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::Validation("a valid email is required".to_string()));
    }
    validate_time_slot(&req.time)?;

    let service = queries::get_service(conn, &req.service_id)?
        .filter(|s| s.active)
        .ok_or_else(|| AppError::NotFound(format!("service {}", req.service_id)))?;

    if !availability::is_bookable(conn, req.date, today)? {
        return Err(AppError::DateUnavailable);
    }

    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        service_id: service.id.clone(),
        date: req.date,
        time_slot: req.time.clone(),
        customer_name: name.to_string(),
        customer_email: email,
        customer_phone: req.phone.as_deref().map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
        price_paid_cents: service.price_cents,
        status: BookingStatus::Pending,
        stripe_payment_id: None,
        meeting_link: None,
        customer_notes: req.notes.clone().filter(|n| !n.trim().is_empty()),
        admin_notes: None,
        reminder_24h_sent: false,
        reminder_1h_sent: false,
        created_at: Utc::now().naive_utc(),
    };

    if let Err(e) = queries::insert_booking(conn, &booking) {
        if db::is_constraint_violation(&e) {
            return Err(AppError::DateUnavailable);
        }
        return Err(e.into());
    }

    tracing::info!(booking_id = %booking.id, date = %booking.date, "booking created");
    Ok(booking)
}

#[derive(Debug)]
pub enum MarkPaidOutcome {
    /// First confirmation for this booking; confirmation side effects
    /// (token, emails) should run.
    Confirmed(Booking),
    /// Redelivered event for a payment already recorded with the same
    /// reference; nothing to do.
    AlreadyProcessed(Booking),
}

/// pending → paid, driven by the verified payment webhook. Idempotent under
/// provider redelivery: the same payment reference lands on
/// `AlreadyProcessed` instead of producing a second round of side effects.
pub fn mark_paid(
    conn: &Connection,
    booking_id: &str,
    payment_ref: &str,
) -> Result<MarkPaidOutcome, AppError> {
    let booking = queries::get_booking(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    match booking.status {
        BookingStatus::Cancelled => Err(AppError::AlreadyCancelled),
        BookingStatus::Paid => {
            if booking.stripe_payment_id.as_deref() == Some(payment_ref) {
                Ok(MarkPaidOutcome::AlreadyProcessed(booking))
            } else {
                Err(AppError::AlreadyPaid)
            }
        }
        BookingStatus::Pending => {
            if !queries::set_paid(conn, booking_id, payment_ref)? {
                // The guarded update lost to a concurrent transition.
                return Err(AppError::AlreadyPaid);
            }
            let updated = queries::get_booking(conn, booking_id)?
                .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;
            tracing::info!(booking_id = %booking_id, payment_ref = %payment_ref, "booking marked paid");
            Ok(MarkPaidOutcome::Confirmed(updated))
        }
    }
}

/// Terminal transition. Appends an audit line instead of overwriting notes.
/// Refund ordering is owned by the refund orchestrator; by the time this
/// runs, any required refund has already succeeded.
pub fn cancel(
    conn: &Connection,
    booking_id: &str,
    actor: Actor,
    reason: &str,
) -> Result<Booking, AppError> {
    let booking = queries::get_booking(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;
    if booking.status == BookingStatus::Cancelled {
        return Err(AppError::AlreadyCancelled);
    }

    let line = format!(
        "[{}] cancelled by {}: {}",
        Utc::now().naive_utc().format("%Y-%m-%d %H:%M:%S"),
        actor.as_str(),
        reason.trim(),
    );
    let notes = append_audit(booking.admin_notes.as_deref(), &line);

    if !queries::set_cancelled(conn, booking_id, &notes)? {
        return Err(AppError::AlreadyCancelled);
    }

    let updated = queries::get_booking(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;
    tracing::info!(booking_id = %booking_id, actor = actor.as_str(), "booking cancelled");
    Ok(updated)
}

/// Moves an active booking to a new date (and optionally a new slot),
/// recording the original slot in the audit trail. Same race safety as
/// `create_booking`; the booking's own date is excluded from the conflict
/// check so it can keep its current date while changing time.
pub fn reschedule(
    conn: &Connection,
    booking_id: &str,
    new_date: NaiveDate,
    new_time: Option<&str>,
    today: NaiveDate,
) -> Result<Booking, AppError> {
    let booking = queries::get_booking(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;
    if booking.status == BookingStatus::Cancelled {
        return Err(AppError::AlreadyCancelled);
    }

    let time_slot = match new_time {
        Some(t) => {
            validate_time_slot(t)?;
            t.to_string()
        }
        None => booking.time_slot.clone(),
    };

    if new_date <= today
        || queries::is_date_blocked(conn, new_date)?
        || queries::count_active_on_date(conn, new_date, Some(booking_id))? > 0
    {
        return Err(AppError::DateUnavailable);
    }

    let line = format!(
        "[{}] rescheduled from {} {} to {} {}",
        Utc::now().naive_utc().format("%Y-%m-%d %H:%M:%S"),
        booking.date,
        booking.time_slot,
        new_date,
        time_slot,
    );
    let notes = append_audit(booking.admin_notes.as_deref(), &line);

    match queries::set_date_and_slot(conn, booking_id, new_date, &time_slot, &notes) {
        Ok(true) => {}
        Ok(false) => return Err(AppError::AlreadyCancelled),
        Err(e) if db::is_constraint_violation(&e) => return Err(AppError::DateUnavailable),
        Err(e) => return Err(e.into()),
    }

    let updated = queries::get_booking(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;
    tracing::info!(booking_id = %booking_id, new_date = %new_date, "booking rescheduled");
    Ok(updated)
}

/// Admin-side patch with a strict allow-list: meeting link, admin notes,
/// status and time slot. Date and customer identity stay immutable here;
/// `reschedule` is the sanctioned path for date changes.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AdminPatch {
    pub meeting_link: Option<String>,
    pub admin_notes: Option<String>,
    pub status: Option<String>,
    pub time_slot: Option<String>,
}

pub fn apply_admin_patch(
    conn: &Connection,
    booking_id: &str,
    patch: &AdminPatch,
) -> Result<Booking, AppError> {
    let mut booking = queries::get_booking(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    if let Some(link) = &patch.meeting_link {
        booking.meeting_link = Some(link.clone()).filter(|l| !l.trim().is_empty());
    }
    if let Some(notes) = &patch.admin_notes {
        booking.admin_notes = Some(notes.clone());
    }
    if let Some(status) = &patch.status {
        let new_status = match status.as_str() {
            "pending" => BookingStatus::Pending,
            "paid" => BookingStatus::Paid,
            "cancelled" => BookingStatus::Cancelled,
            other => {
                return Err(AppError::Validation(format!("unknown status: {other}")));
            }
        };
        if booking.status == BookingStatus::Cancelled && new_status != BookingStatus::Cancelled {
            return Err(AppError::AlreadyCancelled);
        }
        booking.status = new_status;
    }
    if let Some(slot) = &patch.time_slot {
        validate_time_slot(slot)?;
        booking.time_slot = slot.clone();
    }

    if !queries::update_admin_fields(conn, &booking)? {
        return Err(AppError::NotFound(format!("booking {booking_id}")));
    }
    Ok(booking)
}

fn append_audit(existing: Option<&str>, line: &str) -> String {
    match existing {
        Some(notes) if !notes.is_empty() => format!("{notes}\n{line}"),
        _ => line.to_string(),
    }
}

fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

fn validate_time_slot(s: &str) -> Result<(), AppError> {
    let invalid = || AppError::Validation(format!("invalid time slot: {s}"));
    let (hour, minute) = s.split_once(':').ok_or_else(invalid)?;
    let hour: u32 = hour.parse().map_err(|_| invalid())?;
    let minute: u32 = minute.parse().map_err(|_| invalid())?;
    if hour > 23 || minute > 59 {
        return Err(invalid());
    }
    Ok(())
}
