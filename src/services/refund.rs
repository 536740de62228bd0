use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Actor, Booking, BookingStatus};
use crate::services::lifecycle;
use crate::services::payments::PaymentProvider;

#[derive(Debug)]
pub struct CancelOutcome {
    pub booking: Booking,
    pub refunded: bool,
}

/// Cancels a booking, refunding first when a payment reference exists.
///
/// The ordering is deliberate: the provider refund must return Ok before any
/// state is written. A refund failure aborts the whole operation with the
/// booking untouched — a cancelled-but-unrefunded booking is the one outcome
/// this must never produce. The inverse gap (refund succeeded, persist
/// failed) is left for the operator to reconcile from the logs.
pub async fn refund_and_cancel(
    db: &Arc<Mutex<Connection>>,
    payments: &dyn PaymentProvider,
    booking_id: &str,
    reason: &str,
    actor: Actor,
) -> Result<CancelOutcome, AppError> {
    let payment_ref = {
        let conn = db.lock().unwrap();
        let booking = queries::get_booking(&conn, booking_id)?
            .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;
        if booking.status == BookingStatus::Cancelled {
            return Err(AppError::AlreadyCancelled);
        }
        booking.stripe_payment_id
    };

    let mut refunded = false;
    if let Some(payment_ref) = &payment_ref {
        payments.refund(payment_ref).await.map_err(|e| {
            tracing::error!(
                booking_id = %booking_id,
                payment_ref = %payment_ref,
                error = %e,
                "refund failed, cancellation aborted"
            );
            AppError::Payment(e.to_string())
        })?;
        tracing::info!(booking_id = %booking_id, payment_ref = %payment_ref, "refund issued");
        refunded = true;
    }

    let booking = {
        let conn = db.lock().unwrap();
        lifecycle::cancel(&conn, booking_id, actor, reason).map_err(|e| {
            if refunded {
                tracing::error!(
                    booking_id = %booking_id,
                    "refund issued but cancellation failed to persist, manual reconciliation needed"
                );
            }
            e
        })?
    };

    Ok(CancelOutcome { booking, refunded })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::Service;
    use crate::services::lifecycle::CreateBookingRequest;
    use crate::services::payments::CheckoutSession;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    struct MockPayments {
        fail_refund: bool,
        refunds: Mutex<Vec<String>>,
    }

    impl MockPayments {
        fn new(fail_refund: bool) -> Self {
            Self {
                fail_refund,
                refunds: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl PaymentProvider for MockPayments {
        async fn create_checkout(
            &self,
            _booking: &crate::models::Booking,
            _service_name: &str,
            _currency: &str,
            _success_url: &str,
            _cancel_url: &str,
        ) -> anyhow::Result<CheckoutSession> {
            Ok(CheckoutSession {
                id: "cs_test".to_string(),
                url: "https://checkout.example.com/cs_test".to_string(),
            })
        }

        async fn refund(&self, payment_ref: &str) -> anyhow::Result<()> {
            if self.fail_refund {
                anyhow::bail!("provider unavailable");
            }
            self.refunds.lock().unwrap().push(payment_ref.to_string());
            Ok(())
        }
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
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
            created_at: chrono::Utc::now().naive_utc(),
        };
        queries::upsert_service(&conn, &service).unwrap();
        Arc::new(Mutex::new(conn))
    }

    fn create_paid_booking(db: &Arc<Mutex<Connection>>) -> Booking {
        let conn = db.lock().unwrap();
        let req = CreateBookingRequest {
            service_id: "svc-1".to_string(),
            date: d("2025-03-01"),
            time: "14:00".to_string(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            phone: None,
            notes: None,
        };
        let booking = lifecycle::create_booking(&conn, &req, d("2025-02-01")).unwrap();
        queries::set_paid(&conn, &booking.id, "pi_123").unwrap();
        queries::get_booking(&conn, &booking.id).unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_paid_booking_refunds_then_cancels() {
        let db = setup_db();
        let booking = create_paid_booking(&db);
        let payments = MockPayments::new(false);

        let outcome = refund_and_cancel(&db, &payments, &booking.id, "schedule conflict", Actor::Customer)
            .await
            .unwrap();
        assert!(outcome.refunded);
        assert_eq!(outcome.booking.status, BookingStatus::Cancelled);
        assert_eq!(payments.refunds.lock().unwrap().as_slice(), ["pi_123"]);
    }

    #[tokio::test]
    async fn test_refund_failure_leaves_booking_untouched() {
        let db = setup_db();
        let booking = create_paid_booking(&db);
        let payments = MockPayments::new(true);

        let err = refund_and_cancel(&db, &payments, &booking.id, "schedule conflict", Actor::Customer)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Payment(_)));

        let conn = db.lock().unwrap();
        let reloaded = queries::get_booking(&conn, &booking.id).unwrap().unwrap();
        assert_eq!(reloaded.status, BookingStatus::Paid);
        assert!(reloaded.admin_notes.is_none(), "no audit note on aborted cancel");
    }

    #[tokio::test]
    async fn test_unpaid_booking_cancels_without_refund() {
        let db = setup_db();
        let booking = {
            let conn = db.lock().unwrap();
            let req = CreateBookingRequest {
                service_id: "svc-1".to_string(),
                date: d("2025-03-02"),
                time: "10:00".to_string(),
                name: "Bob".to_string(),
                email: "bob@example.com".to_string(),
                phone: None,
                notes: None,
            };
            lifecycle::create_booking(&conn, &req, d("2025-02-01")).unwrap()
        };
        // A failing provider proves the refund path is never touched
        let payments = MockPayments::new(true);

        let outcome = refund_and_cancel(&db, &payments, &booking.id, "abandoned", Actor::Admin)
            .await
            .unwrap();
        assert!(!outcome.refunded);
        assert_eq!(outcome.booking.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_already_cancelled_conflicts() {
        let db = setup_db();
        let booking = create_paid_booking(&db);
        let payments = MockPayments::new(false);

        refund_and_cancel(&db, &payments, &booking.id, "first", Actor::Admin)
            .await
            .unwrap();
        let err = refund_and_cancel(&db, &payments, &booking.id, "second", Actor::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyCancelled));
        // Only one refund went out
        assert_eq!(payments.refunds.lock().unwrap().len(), 1);
    }
}
