use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{BlockedDate, Booking, BookingStatus, Service};

const BOOKING_COLS: &str = "id, service_id, date, time_slot, customer_name, customer_email, customer_phone, \
     price_paid_cents, status, stripe_payment_id, meeting_link, customer_notes, admin_notes, \
     reminder_24h_sent, reminder_1h_sent, created_at";

// ── Services ──

pub fn upsert_service(conn: &Connection, service: &Service) -> anyhow::Result<()> {
    let created_at = service.created_at.format("%Y-%m-%d %H:%M:%S").to_string();
    conn.execute(
        "INSERT INTO services (id, name, price_cents, duration_label, active, featured, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           price_cents = excluded.price_cents,
           duration_label = excluded.duration_label,
           active = excluded.active,
           featured = excluded.featured",
        params![
            service.id,
            service.name,
            service.price_cents,
            service.duration_label,
            service.active as i32,
            service.featured as i32,
            created_at,
        ],
    )?;
    Ok(())
}

pub fn get_service(conn: &Connection, id: &str) -> anyhow::Result<Option<Service>> {
    let result = conn.query_row(
        "SELECT id, name, price_cents, duration_label, active, featured, created_at
         FROM services WHERE id = ?1",
        params![id],
        |row| Ok(parse_service_row(row)),
    );

    match result {
        Ok(service) => Ok(Some(service?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_services(conn: &Connection, active_only: bool) -> anyhow::Result<Vec<Service>> {
    let sql = if active_only {
        "SELECT id, name, price_cents, duration_label, active, featured, created_at
         FROM services WHERE active = 1 ORDER BY featured DESC, name ASC"
    } else {
        "SELECT id, name, price_cents, duration_label, active, featured, created_at
         FROM services ORDER BY featured DESC, name ASC"
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| Ok(parse_service_row(row)))?;

    let mut services = vec![];
    for row in rows {
        services.push(row??);
    }
    Ok(services)
}

fn parse_service_row(row: &rusqlite::Row) -> anyhow::Result<Service> {
    let created_at_str: String = row.get(6)?;
    let created_at = NaiveDateTime::parse_from_str(&created_at_str, "%Y-%m-%d %H:%M:%S")
        .unwrap_or_else(|_| Utc::now().naive_utc());

    Ok(Service {
        id: row.get(0)?,
        name: row.get(1)?,
        price_cents: row.get(2)?,
        duration_label: row.get(3)?,
        active: row.get::<_, i32>(4)? != 0,
        featured: row.get::<_, i32>(5)? != 0,
        created_at,
    })
}

// ── Bookings ──

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    let date = booking.date.format("%Y-%m-%d").to_string();
    let created_at = booking.created_at.format("%Y-%m-%d %H:%M:%S").to_string();

    conn.execute(
        "INSERT INTO bookings (id, service_id, date, time_slot, customer_name, customer_email, customer_phone,
             price_paid_cents, status, stripe_payment_id, meeting_link, customer_notes, admin_notes,
             reminder_24h_sent, reminder_1h_sent, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            booking.id,
            booking.service_id,
            date,
            booking.time_slot,
            booking.customer_name,
            booking.customer_email,
            booking.customer_phone,
            booking.price_paid_cents,
            booking.status.as_str(),
            booking.stripe_payment_id,
            booking.meeting_link,
            booking.customer_notes,
            booking.admin_notes,
            booking.reminder_24h_sent as i32,
            booking.reminder_1h_sent as i32,
            created_at,
        ],
    )?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let sql = format!("SELECT {BOOKING_COLS} FROM bookings WHERE id = ?1");
    let result = conn.query_row(&sql, params![id], |row| Ok(parse_booking_row(row)));

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_bookings(
    conn: &Connection,
    status_filter: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match status_filter {
        Some(status) => (
            format!(
                "SELECT {BOOKING_COLS} FROM bookings WHERE status = ?1 ORDER BY date DESC, time_slot DESC LIMIT ?2"
            ),
            vec![
                Box::new(status.to_string()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(limit),
            ],
        ),
        None => (
            format!("SELECT {BOOKING_COLS} FROM bookings ORDER BY date DESC, time_slot DESC LIMIT ?1"),
            vec![Box::new(limit) as Box<dyn rusqlite::types::ToSql>],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn count_active_on_date(
    conn: &Connection,
    date: NaiveDate,
    exclude_booking: Option<&str>,
) -> anyhow::Result<i64> {
    let date_str = date.format("%Y-%m-%d").to_string();
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings
         WHERE date = ?1 AND status IN ('pending', 'paid') AND id != COALESCE(?2, '')",
        params![date_str, exclude_booking],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn active_booking_dates_in_range(
    conn: &Connection,
    from: NaiveDate,
    to: NaiveDate,
    exclude_booking: Option<&str>,
) -> anyhow::Result<Vec<NaiveDate>> {
    let from_str = from.format("%Y-%m-%d").to_string();
    let to_str = to.format("%Y-%m-%d").to_string();

    let mut stmt = conn.prepare(
        "SELECT date FROM bookings
         WHERE date >= ?1 AND date <= ?2 AND status IN ('pending', 'paid')
           AND id != COALESCE(?3, '')
         ORDER BY date ASC",
    )?;
    let rows = stmt.query_map(params![from_str, to_str, exclude_booking], |row| {
        row.get::<_, String>(0)
    })?;

    let mut dates = vec![];
    for row in rows {
        let s = row?;
        dates.push(NaiveDate::parse_from_str(&s, "%Y-%m-%d")?);
    }
    Ok(dates)
}

/// pending → paid, guarded so a cancelled or already-paid row is untouched.
pub fn set_paid(conn: &Connection, id: &str, payment_ref: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = 'paid', stripe_payment_id = ?2
         WHERE id = ?1 AND status = 'pending'",
        params![id, payment_ref],
    )?;
    Ok(count > 0)
}

/// Terminal transition; the guard keeps cancelled rows cancelled with their
/// original audit trail.
pub fn set_cancelled(conn: &Connection, id: &str, admin_notes: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = 'cancelled', admin_notes = ?2
         WHERE id = ?1 AND status != 'cancelled'",
        params![id, admin_notes],
    )?;
    Ok(count > 0)
}

/// Moves an active booking to a new slot. The partial unique index on active
/// dates also applies to UPDATEs, so a losing race surfaces as a constraint
/// violation here.
pub fn set_date_and_slot(
    conn: &Connection,
    id: &str,
    date: NaiveDate,
    time_slot: &str,
    admin_notes: &str,
) -> anyhow::Result<bool> {
    let date_str = date.format("%Y-%m-%d").to_string();
    let count = conn.execute(
        "UPDATE bookings SET date = ?2, time_slot = ?3, admin_notes = ?4
         WHERE id = ?1 AND status != 'cancelled'",
        params![id, date_str, time_slot, admin_notes],
    )?;
    Ok(count > 0)
}

pub fn update_admin_fields(conn: &Connection, booking: &Booking) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET meeting_link = ?2, admin_notes = ?3, status = ?4, time_slot = ?5
         WHERE id = ?1",
        params![
            booking.id,
            booking.meeting_link,
            booking.admin_notes,
            booking.status.as_str(),
            booking.time_slot,
        ],
    )?;
    Ok(count > 0)
}

// ── Reminders ──

pub fn bookings_needing_24h_reminder(
    conn: &Connection,
    date: NaiveDate,
) -> anyhow::Result<Vec<Booking>> {
    let date_str = date.format("%Y-%m-%d").to_string();
    let sql = format!(
        "SELECT {BOOKING_COLS} FROM bookings
         WHERE date = ?1 AND status = 'paid' AND reminder_24h_sent = 0
         ORDER BY time_slot ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![date_str], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn bookings_needing_1h_reminder(
    conn: &Connection,
    date: NaiveDate,
) -> anyhow::Result<Vec<Booking>> {
    let date_str = date.format("%Y-%m-%d").to_string();
    let sql = format!(
        "SELECT {BOOKING_COLS} FROM bookings
         WHERE date = ?1 AND status = 'paid' AND reminder_1h_sent = 0
           AND meeting_link IS NOT NULL
         ORDER BY time_slot ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![date_str], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

#[derive(Debug, Clone, Copy)]
pub enum ReminderKind {
    TwentyFourHour,
    OneHour,
}

/// Flips a reminder flag false → true. Guarded on the current value, so the
/// flag can only ever flip once no matter how often a sweep re-runs.
pub fn set_reminder_sent(conn: &Connection, id: &str, kind: ReminderKind) -> anyhow::Result<bool> {
    let sql = match kind {
        ReminderKind::TwentyFourHour => {
            "UPDATE bookings SET reminder_24h_sent = 1 WHERE id = ?1 AND reminder_24h_sent = 0"
        }
        ReminderKind::OneHour => {
            "UPDATE bookings SET reminder_1h_sent = 1 WHERE id = ?1 AND reminder_1h_sent = 0"
        }
    };
    let count = conn.execute(sql, params![id])?;
    Ok(count > 0)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let id: String = row.get(0)?;
    let service_id: String = row.get(1)?;
    let date_str: String = row.get(2)?;
    let time_slot: String = row.get(3)?;
    let customer_name: String = row.get(4)?;
    let customer_email: String = row.get(5)?;
    let customer_phone: Option<String> = row.get(6)?;
    let price_paid_cents: i64 = row.get(7)?;
    let status_str: String = row.get(8)?;
    let stripe_payment_id: Option<String> = row.get(9)?;
    let meeting_link: Option<String> = row.get(10)?;
    let customer_notes: Option<String> = row.get(11)?;
    let admin_notes: Option<String> = row.get(12)?;
    let reminder_24h_sent: bool = row.get::<_, i32>(13)? != 0;
    let reminder_1h_sent: bool = row.get::<_, i32>(14)? != 0;
    let created_at_str: String = row.get(15)?;

    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")?;
    let created_at = NaiveDateTime::parse_from_str(&created_at_str, "%Y-%m-%d %H:%M:%S")
        .unwrap_or_else(|_| Utc::now().naive_utc());

    Ok(Booking {
        id,
        service_id,
        date,
        time_slot,
        customer_name,
        customer_email,
        customer_phone,
        price_paid_cents,
        status: BookingStatus::parse(&status_str),
        stripe_payment_id,
        meeting_link,
        customer_notes,
        admin_notes,
        reminder_24h_sent,
        reminder_1h_sent,
        created_at,
    })
}

// ── Blocked Dates ──

pub fn block_date(conn: &Connection, date: NaiveDate, reason: Option<&str>) -> anyhow::Result<()> {
    let date_str = date.format("%Y-%m-%d").to_string();
    conn.execute(
        "INSERT INTO blocked_dates (date, reason) VALUES (?1, ?2)
         ON CONFLICT(date) DO UPDATE SET reason = excluded.reason",
        params![date_str, reason],
    )?;
    Ok(())
}

pub fn unblock_date(conn: &Connection, date: NaiveDate) -> anyhow::Result<bool> {
    let date_str = date.format("%Y-%m-%d").to_string();
    let count = conn.execute("DELETE FROM blocked_dates WHERE date = ?1", params![date_str])?;
    Ok(count > 0)
}

pub fn is_date_blocked(conn: &Connection, date: NaiveDate) -> anyhow::Result<bool> {
    let date_str = date.format("%Y-%m-%d").to_string();
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM blocked_dates WHERE date = ?1",
        params![date_str],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn list_blocked_dates(conn: &Connection) -> anyhow::Result<Vec<BlockedDate>> {
    let mut stmt = conn.prepare("SELECT date, reason FROM blocked_dates ORDER BY date ASC")?;
    let rows = stmt.query_map([], |row| {
        let date_str: String = row.get(0)?;
        let reason: Option<String> = row.get(1)?;
        Ok((date_str, reason))
    })?;

    let mut blocked = vec![];
    for row in rows {
        let (date_str, reason) = row?;
        blocked.push(BlockedDate {
            date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")?,
            reason,
        });
    }
    Ok(blocked)
}

pub fn blocked_dates_in_range(
    conn: &Connection,
    from: NaiveDate,
    to: NaiveDate,
) -> anyhow::Result<Vec<NaiveDate>> {
    let from_str = from.format("%Y-%m-%d").to_string();
    let to_str = to.format("%Y-%m-%d").to_string();

    let mut stmt = conn.prepare(
        "SELECT date FROM blocked_dates WHERE date >= ?1 AND date <= ?2 ORDER BY date ASC",
    )?;
    let rows = stmt.query_map(params![from_str, to_str], |row| row.get::<_, String>(0))?;

    let mut dates = vec![];
    for row in rows {
        let s = row?;
        dates.push(NaiveDate::parse_from_str(&s, "%Y-%m-%d")?);
    }
    Ok(dates)
}

// ── Rate Limits ──

pub fn increment_request_count(conn: &Connection, client_key: &str) -> anyhow::Result<i64> {
    let window = current_minute_window();

    conn.execute(
        "INSERT INTO rate_limits (client_key, request_count, window_start)
         VALUES (?1, 1, ?2)
         ON CONFLICT(client_key, window_start) DO UPDATE SET request_count = request_count + 1",
        params![client_key, window],
    )?;

    let count: i64 = conn.query_row(
        "SELECT request_count FROM rate_limits WHERE client_key = ?1 AND window_start = ?2",
        params![client_key, window],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn cleanup_old_windows(conn: &Connection) -> anyhow::Result<()> {
    let cutoff = (Utc::now() - chrono::Duration::minutes(10))
        .format("%Y-%m-%d %H:%M:00")
        .to_string();
    conn.execute(
        "DELETE FROM rate_limits WHERE window_start < ?1",
        params![cutoff],
    )?;
    Ok(())
}

fn current_minute_window() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:00").to_string()
}
