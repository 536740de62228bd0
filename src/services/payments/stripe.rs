use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use super::{CheckoutSession, PaymentProvider};
use crate::models::Booking;

pub struct StripeProvider {
    secret_key: String,
    client: reqwest::Client,
}

impl StripeProvider {
    pub fn new(secret_key: String) -> Self {
        Self {
            secret_key,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct SessionResponse {
    id: String,
    url: String,
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    async fn create_checkout(
        &self,
        booking: &Booking,
        service_name: &str,
        currency: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> anyhow::Result<CheckoutSession> {
        let amount = booking.price_paid_cents.to_string();
        let params = [
            ("mode", "payment"),
            ("client_reference_id", booking.id.as_str()),
            ("customer_email", booking.customer_email.as_str()),
            ("success_url", success_url),
            ("cancel_url", cancel_url),
            ("line_items[0][quantity]", "1"),
            ("line_items[0][price_data][currency]", currency),
            ("line_items[0][price_data][unit_amount]", amount.as_str()),
            ("line_items[0][price_data][product_data][name]", service_name),
        ];

        let session: SessionResponse = self
            .client
            .post("https://api.stripe.com/v1/checkout/sessions")
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&params)
            .send()
            .await
            .context("failed to create Stripe checkout session")?
            .error_for_status()
            .context("Stripe checkout API returned error")?
            .json()
            .await
            .context("failed to parse Stripe session response")?;

        Ok(CheckoutSession {
            id: session.id,
            url: session.url,
        })
    }

    async fn refund(&self, payment_ref: &str) -> anyhow::Result<()> {
        self.client
            .post("https://api.stripe.com/v1/refunds")
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&[("payment_intent", payment_ref)])
            .send()
            .await
            .context("failed to request Stripe refund")?
            .error_for_status()
            .context("Stripe refund API returned error")?;

        Ok(())
    }
}
