use std::collections::BTreeSet;

use chrono::NaiveDate;
use rusqlite::Connection;

use crate::db::queries;

/// A date can take a new booking when it is strictly after `today` (same-day
/// bookings are not accepted), is not admin-blocked, and carries no active
/// booking. Cancelled bookings do not hold their date.
pub fn is_bookable(conn: &Connection, date: NaiveDate, today: NaiveDate) -> anyhow::Result<bool> {
    if date <= today {
        return Ok(false);
    }
    if queries::is_date_blocked(conn, date)? {
        return Ok(false);
    }
    Ok(queries::count_active_on_date(conn, date, None)? == 0)
}

/// Union of blocked dates and active-booking dates in `[from, to]`, for
/// calendar rendering. `exclude_booking` leaves out one booking's own date so
/// a reschedule does not see itself as a conflict.
pub fn unavailable_dates(
    conn: &Connection,
    from: NaiveDate,
    to: NaiveDate,
    exclude_booking: Option<&str>,
) -> anyhow::Result<BTreeSet<NaiveDate>> {
    let mut dates: BTreeSet<NaiveDate> =
        queries::blocked_dates_in_range(conn, from, to)?.into_iter().collect();
    dates.extend(queries::active_booking_dates_in_range(conn, from, to, exclude_booking)?);
    Ok(dates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{Booking, BookingStatus, Service};

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn seed_service(conn: &Connection) -> Service {
        let service = Service {
            id: "svc-1".to_string(),
            name: "Consultation".to_string(),
            price_cents: 45000,
            duration_label: "60 minutes".to_string(),
            active: true,
            featured: false,
            created_at: chrono::Utc::now().naive_utc(),
        };
        queries::upsert_service(conn, &service).unwrap();
        service
    }

    fn seed_booking(conn: &Connection, id: &str, date: &str, status: BookingStatus) {
        let booking = Booking {
            id: id.to_string(),
            service_id: "svc-1".to_string(),
            date: d(date),
            time_slot: "14:00".to_string(),
            customer_name: "Alice".to_string(),
            customer_email: "alice@example.com".to_string(),
            customer_phone: None,
            price_paid_cents: 45000,
            status,
            stripe_payment_id: None,
            meeting_link: None,
            customer_notes: None,
            admin_notes: None,
            reminder_24h_sent: false,
            reminder_1h_sent: false,
            created_at: chrono::Utc::now().naive_utc(),
        };
        queries::insert_booking(conn, &booking).unwrap();
    }

    #[test]
    fn test_open_future_date_is_bookable() {
        let conn = setup_db();
        assert!(is_bookable(&conn, d("2025-03-01"), d("2025-02-01")).unwrap());
    }

    #[test]
    fn test_today_and_past_are_not_bookable() {
        let conn = setup_db();
        assert!(!is_bookable(&conn, d("2025-02-01"), d("2025-02-01")).unwrap());
        assert!(!is_bookable(&conn, d("2025-01-31"), d("2025-02-01")).unwrap());
        // Tomorrow is the first bookable day
        assert!(is_bookable(&conn, d("2025-02-02"), d("2025-02-01")).unwrap());
    }

    #[test]
    fn test_blocked_date_is_not_bookable_without_any_booking() {
        let conn = setup_db();
        queries::block_date(&conn, d("2025-03-05"), Some("holiday")).unwrap();
        assert!(!is_bookable(&conn, d("2025-03-05"), d("2025-02-01")).unwrap());
    }

    #[test]
    fn test_active_booking_takes_the_date() {
        let conn = setup_db();
        seed_service(&conn);
        seed_booking(&conn, "b1", "2025-03-10", BookingStatus::Pending);
        assert!(!is_bookable(&conn, d("2025-03-10"), d("2025-02-01")).unwrap());
    }

    #[test]
    fn test_cancelled_booking_releases_the_date() {
        let conn = setup_db();
        seed_service(&conn);
        seed_booking(&conn, "b1", "2025-03-10", BookingStatus::Cancelled);
        assert!(is_bookable(&conn, d("2025-03-10"), d("2025-02-01")).unwrap());
    }

    #[test]
    fn test_unavailable_dates_unions_blocked_and_booked() {
        let conn = setup_db();
        seed_service(&conn);
        seed_booking(&conn, "b1", "2025-03-10", BookingStatus::Paid);
        seed_booking(&conn, "b2", "2025-03-12", BookingStatus::Cancelled);
        queries::block_date(&conn, d("2025-03-05"), None).unwrap();

        let dates = unavailable_dates(&conn, d("2025-03-01"), d("2025-03-31"), None).unwrap();
        assert!(dates.contains(&d("2025-03-05")));
        assert!(dates.contains(&d("2025-03-10")));
        assert!(!dates.contains(&d("2025-03-12")));
        assert_eq!(dates.len(), 2);
    }

    #[test]
    fn test_unavailable_dates_excludes_rescheduling_booking() {
        let conn = setup_db();
        seed_service(&conn);
        seed_booking(&conn, "b1", "2025-03-10", BookingStatus::Paid);

        let dates =
            unavailable_dates(&conn, d("2025-03-01"), d("2025-03-31"), Some("b1")).unwrap();
        assert!(!dates.contains(&d("2025-03-10")));
    }
}
