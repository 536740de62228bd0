use chrono::{Duration, NaiveTime};

use crate::models::Booking;

/// Renders a single-event iCalendar file for a confirmed booking, linked
/// from the confirmation email. Sessions are blocked out as one hour.
pub fn generate_ics(booking: &Booking, service_name: &str, business_name: &str) -> String {
    let start_time = parse_slot(&booking.time_slot)
        .unwrap_or_else(|| NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default());
    let start = booking.date.and_time(start_time);
    let dtstart = start.format("%Y%m%dT%H%M%S").to_string();
    let dtend = (start + Duration::hours(1)).format("%Y%m%dT%H%M%S").to_string();
    let dtstamp = booking.created_at.format("%Y%m%dT%H%M%S").to_string();
    let uid = format!("{}@slotbook", booking.id);

    let summary = format!("{service_name} with {business_name}");
    let description = booking
        .meeting_link
        .as_deref()
        .map(|link| format!("Join: {link}"))
        .unwrap_or_else(|| "Details in your confirmation email".to_string());

    format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Slotbook//Booking//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART:{dtstart}\r\n\
         DTEND:{dtend}\r\n\
         SUMMARY:{summary}\r\n\
         DESCRIPTION:{description}\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n"
    )
}

fn parse_slot(slot: &str) -> Option<NaiveTime> {
    let (hour, minute) = slot.split_once(':')?;
    NaiveTime::from_hms_opt(hour.parse().ok()?, minute.parse().ok()?, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookingStatus;
    use chrono::{NaiveDate, NaiveDateTime};

    fn test_booking() -> Booking {
        Booking {
            id: "bk-123".to_string(),
            service_id: "svc-1".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(),
            time_slot: "14:00".to_string(),
            customer_name: "Alice".to_string(),
            customer_email: "alice@example.com".to_string(),
            customer_phone: None,
            price_paid_cents: 45000,
            status: BookingStatus::Paid,
            stripe_payment_id: Some("pi_1".to_string()),
            meeting_link: Some("https://meet.example.com/abc".to_string()),
            customer_notes: None,
            admin_notes: None,
            reminder_24h_sent: false,
            reminder_1h_sent: false,
            created_at: NaiveDateTime::parse_from_str("2025-03-10 10:00:00", "%Y-%m-%d %H:%M:%S")
                .unwrap(),
        }
    }

    #[test]
    fn test_generate_ics() {
        let ics = generate_ics(&test_booking(), "Consultation", "Studio");
        assert!(ics.contains("BEGIN:VCALENDAR"));
        assert!(ics.contains("DTSTART:20250315T140000"));
        assert!(ics.contains("DTEND:20250315T150000"));
        assert!(ics.contains("SUMMARY:Consultation with Studio"));
        assert!(ics.contains("DESCRIPTION:Join: https://meet.example.com/abc"));
        assert!(ics.contains("UID:bk-123@slotbook"));
        assert!(ics.contains("END:VCALENDAR"));
    }

    #[test]
    fn test_generate_ics_without_meeting_link() {
        let mut booking = test_booking();
        booking.meeting_link = None;
        let ics = generate_ics(&booking, "Consultation", "Studio");
        assert!(ics.contains("DESCRIPTION:Details in your confirmation email"));
    }
}
