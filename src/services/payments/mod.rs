pub mod stripe;

use async_trait::async_trait;

use crate::models::Booking;

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Opens a hosted checkout for the booking's price snapshot. The booking
    /// id rides along as the client reference so the completion webhook can
    /// find its way back.
    async fn create_checkout(
        &self,
        booking: &Booking,
        service_name: &str,
        currency: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> anyhow::Result<CheckoutSession>;

    /// Refunds a completed payment by its payment reference.
    async fn refund(&self, payment_ref: &str) -> anyhow::Result<()>;
}
