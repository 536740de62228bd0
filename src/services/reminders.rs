use std::sync::{Arc, Mutex};

use chrono::{Duration, NaiveDateTime, Timelike};
use rusqlite::Connection;
use serde::Serialize;

use crate::config::AppConfig;
use crate::db::queries;
use crate::db::queries::ReminderKind;
use crate::models::Booking;
use crate::services::notify::{templates, EmailMessage, Mailer};

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct SweepReport {
    pub sent: usize,
    pub errors: usize,
}

/// 24-hour reminders: paid bookings dated tomorrow whose flag is still
/// unset. `now_local` is the operator-timezone clock; both sweeps and the
/// stored slots live in that one timezone.
pub async fn run_24h_sweep(
    db: &Arc<Mutex<Connection>>,
    mailer: &dyn Mailer,
    config: &AppConfig,
    now_local: NaiveDateTime,
) -> SweepReport {
    let tomorrow = now_local.date() + Duration::days(1);
    let candidates = {
        let conn = db.lock().unwrap();
        match queries::bookings_needing_24h_reminder(&conn, tomorrow) {
            Ok(bookings) => bookings,
            Err(e) => {
                tracing::error!(error = %e, "24h reminder query failed");
                return SweepReport { sent: 0, errors: 1 };
            }
        }
    };

    dispatch(db, mailer, config, candidates, ReminderKind::TwentyFourHour).await
}

/// 1-hour reminders: paid bookings today, with a meeting link, whose slot
/// starts in the next hour.
pub async fn run_1h_sweep(
    db: &Arc<Mutex<Connection>>,
    mailer: &dyn Mailer,
    config: &AppConfig,
    now_local: NaiveDateTime,
) -> SweepReport {
    let today = now_local.date();
    let target_hour = now_local.hour() + 1;

    let candidates = {
        let conn = db.lock().unwrap();
        match queries::bookings_needing_1h_reminder(&conn, today) {
            Ok(bookings) => bookings,
            Err(e) => {
                tracing::error!(error = %e, "1h reminder query failed");
                return SweepReport { sent: 0, errors: 1 };
            }
        }
    };
    let due: Vec<Booking> = candidates
        .into_iter()
        .filter(|b| b.slot_hour() == Some(target_hour))
        .collect();

    dispatch(db, mailer, config, due, ReminderKind::OneHour).await
}

/// Sends one reminder per booking, flipping the persisted flag only after a
/// successful send. One booking's failure never blocks the rest of the
/// sweep; re-running is a no-op for rows whose flag already flipped.
async fn dispatch(
    db: &Arc<Mutex<Connection>>,
    mailer: &dyn Mailer,
    config: &AppConfig,
    bookings: Vec<Booking>,
    kind: ReminderKind,
) -> SweepReport {
    let mut report = SweepReport::default();

    for booking in bookings {
        let service_name = {
            let conn = db.lock().unwrap();
            queries::get_service(&conn, &booking.service_id)
                .ok()
                .flatten()
                .map(|s| s.name)
                .unwrap_or_else(|| "your booking".to_string())
        };

        let message: EmailMessage = match kind {
            ReminderKind::TwentyFourHour => templates::reminder_24h(&booking, &service_name, config),
            ReminderKind::OneHour => templates::reminder_1h(&booking, &service_name, config),
        };

        match mailer.send(&message).await {
            Ok(()) => {
                let conn = db.lock().unwrap();
                match queries::set_reminder_sent(&conn, &booking.id, kind) {
                    Ok(true) => report.sent += 1,
                    // Another sweep got there first; its send counts, not ours.
                    Ok(false) => {}
                    Err(e) => {
                        tracing::error!(booking_id = %booking.id, error = %e, "failed to record reminder");
                        report.errors += 1;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(booking_id = %booking.id, error = %e, "reminder send failed");
                report.errors += 1;
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{BookingStatus, Service};
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};

    struct MockMailer {
        sent: Mutex<Vec<EmailMessage>>,
        fail_to: Option<String>,
    }

    impl MockMailer {
        fn new() -> Self {
            Self {
                sent: Mutex::new(vec![]),
                fail_to: None,
            }
        }

        fn failing_for(address: &str) -> Self {
            Self {
                sent: Mutex::new(vec![]),
                fail_to: Some(address.to_string()),
            }
        }
    }

    #[async_trait]
    impl Mailer for MockMailer {
        async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
            if self.fail_to.as_deref() == Some(message.to.as_str()) {
                anyhow::bail!("mailbox unavailable");
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn test_config() -> AppConfig {
        AppConfig {
            port: 3000,
            database_url: ":memory:".to_string(),
            admin_token: "t".to_string(),
            base_url: "http://localhost:3000".to_string(),
            stripe_secret_key: String::new(),
            stripe_webhook_secret: String::new(),
            token_secret: "s".to_string(),
            token_ttl_hours: 720,
            resend_api_key: String::new(),
            email_from: "bookings@example.com".to_string(),
            operator_email: "owner@example.com".to_string(),
            business_name: "Studio".to_string(),
            currency: "myr".to_string(),
            currency_label: "RM".to_string(),
            utc_offset_hours: 8,
            create_rate_limit_per_minute: 5,
        }
    }

    fn setup_db() -> Arc<Mutex<Connection>> {
        let conn = db::init_db(":memory:").unwrap();
        let service = Service {
            id: "svc-1".to_string(),
            name: "Consultation".to_string(),
            price_cents: 45000,
            duration_label: "60 minutes".to_string(),
            active: true,
            featured: false,
            created_at: Utc::now().naive_utc(),
        };
        queries::upsert_service(&conn, &service).unwrap();
        Arc::new(Mutex::new(conn))
    }

    fn seed_booking(
        db: &Arc<Mutex<Connection>>,
        id: &str,
        email: &str,
        date: &str,
        slot: &str,
        status: BookingStatus,
        meeting_link: Option<&str>,
    ) {
        let conn = db.lock().unwrap();
        let booking = Booking {
            id: id.to_string(),
            service_id: "svc-1".to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            time_slot: slot.to_string(),
            customer_name: "Alice".to_string(),
            customer_email: email.to_string(),
            customer_phone: None,
            price_paid_cents: 45000,
            status,
            stripe_payment_id: Some("pi_1".to_string()),
            meeting_link: meeting_link.map(String::from),
            customer_notes: None,
            admin_notes: None,
            reminder_24h_sent: false,
            reminder_1h_sent: false,
            created_at: Utc::now().naive_utc(),
        };
        queries::insert_booking(&conn, &booking).unwrap();
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[tokio::test]
    async fn test_24h_sweep_sends_once() {
        let db = setup_db();
        seed_booking(&db, "b1", "alice@example.com", "2025-03-02", "14:00", BookingStatus::Paid, None);
        let mailer = MockMailer::new();
        let config = test_config();
        let now = dt("2025-03-01 09:00");

        let report = run_24h_sweep(&db, &mailer, &config, now).await;
        assert_eq!(report, SweepReport { sent: 1, errors: 0 });

        // Second run is a no-op
        let report = run_24h_sweep(&db, &mailer, &config, now).await;
        assert_eq!(report, SweepReport { sent: 0, errors: 0 });
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_24h_sweep_skips_pending_and_other_dates() {
        let db = setup_db();
        seed_booking(&db, "b1", "a@example.com", "2025-03-02", "14:00", BookingStatus::Pending, None);
        seed_booking(&db, "b2", "b@example.com", "2025-03-05", "14:00", BookingStatus::Paid, None);
        let mailer = MockMailer::new();

        let report = run_24h_sweep(&db, &mailer, &test_config(), dt("2025-03-01 09:00")).await;
        assert_eq!(report, SweepReport { sent: 0, errors: 0 });
    }

    #[tokio::test]
    async fn test_24h_sweep_counts_failure_and_leaves_flag_unset() {
        let db = setup_db();
        seed_booking(&db, "b1", "broken@example.com", "2025-03-02", "09:00", BookingStatus::Paid, None);
        let mailer = MockMailer::failing_for("broken@example.com");
        let config = test_config();

        let report = run_24h_sweep(&db, &mailer, &config, dt("2025-03-01 09:00")).await;
        assert_eq!(report, SweepReport { sent: 0, errors: 1 });

        // Flag stays unset after a failed send, so the next sweep retries
        {
            let conn = db.lock().unwrap();
            let booking = queries::get_booking(&conn, "b1").unwrap().unwrap();
            assert!(!booking.reminder_24h_sent);
        }

        // A later sweep with a working mailer picks it up
        let mailer = MockMailer::new();
        let report = run_24h_sweep(&db, &mailer, &config, dt("2025-03-01 10:00")).await;
        assert_eq!(report, SweepReport { sent: 1, errors: 0 });
    }

    #[tokio::test]
    async fn test_1h_sweep_matches_next_hour_with_meeting_link() {
        let db = setup_db();
        seed_booking(
            &db,
            "b1",
            "alice@example.com",
            "2025-03-01",
            "15:00",
            BookingStatus::Paid,
            Some("https://meet.example.com/abc"),
        );
        let mailer = MockMailer::new();
        let config = test_config();

        // 14:05 → slot at 15:00 is due
        let report = run_1h_sweep(&db, &mailer, &config, dt("2025-03-01 14:05")).await;
        assert_eq!(report, SweepReport { sent: 1, errors: 0 });
        assert!(mailer.sent.lock().unwrap()[0]
            .body
            .contains("https://meet.example.com/abc"));

        // Re-run: flag already set
        let report = run_1h_sweep(&db, &mailer, &config, dt("2025-03-01 14:30")).await;
        assert_eq!(report, SweepReport { sent: 0, errors: 0 });
    }

    #[tokio::test]
    async fn test_1h_sweep_skips_wrong_hour_and_missing_link() {
        let db = setup_db();
        seed_booking(
            &db,
            "b1",
            "a@example.com",
            "2025-03-01",
            "17:00",
            BookingStatus::Paid,
            Some("https://meet.example.com/abc"),
        );
        seed_booking(&db, "b2", "b@example.com", "2025-03-02", "15:00", BookingStatus::Paid, None);
        let mailer = MockMailer::new();

        let report = run_1h_sweep(&db, &mailer, &test_config(), dt("2025-03-01 14:05")).await;
        assert_eq!(report, SweepReport { sent: 0, errors: 0 });
    }
}
