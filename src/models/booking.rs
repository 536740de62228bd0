use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub service_id: String,
    pub date: NaiveDate,
    pub time_slot: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub price_paid_cents: i64,
    pub status: BookingStatus,
    pub stripe_payment_id: Option<String>,
    pub meeting_link: Option<String>,
    pub customer_notes: Option<String>,
    pub admin_notes: Option<String>,
    pub reminder_24h_sent: bool,
    pub reminder_1h_sent: bool,
    pub created_at: NaiveDateTime,
}

impl Booking {
    /// Hour-of-day of the slot, if the slot parses as HH:MM.
    pub fn slot_hour(&self) -> Option<u32> {
        let (hour, _) = self.time_slot.split_once(':')?;
        hour.parse().ok()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Paid,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Paid => "paid",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "paid" => BookingStatus::Paid,
            "cancelled" => BookingStatus::Cancelled,
            _ => BookingStatus::Pending,
        }
    }
}

/// Who performed a lifecycle action, for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Customer,
    Admin,
}

impl Actor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Actor::Customer => "customer",
            Actor::Admin => "admin",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for s in ["pending", "paid", "cancelled"] {
            assert_eq!(BookingStatus::parse(s).as_str(), s);
        }
    }

    #[test]
    fn test_unknown_status_defaults_to_pending() {
        assert_eq!(BookingStatus::parse("garbage"), BookingStatus::Pending);
    }

    #[test]
    fn test_slot_hour() {
        let mut booking = Booking {
            id: "b1".to_string(),
            service_id: "s1".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            time_slot: "14:30".to_string(),
            customer_name: "Alice".to_string(),
            customer_email: "alice@example.com".to_string(),
            customer_phone: None,
            price_paid_cents: 45000,
            status: BookingStatus::Pending,
            stripe_payment_id: None,
            meeting_link: None,
            customer_notes: None,
            admin_notes: None,
            reminder_24h_sent: false,
            reminder_1h_sent: false,
            created_at: chrono::Utc::now().naive_utc(),
        };
        assert_eq!(booking.slot_hour(), Some(14));
        booking.time_slot = "bogus".to_string();
        assert_eq!(booking.slot_hour(), None);
    }
}
