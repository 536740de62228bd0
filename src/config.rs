use std::env;

use chrono::{Duration, NaiveDateTime, Utc};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    /// Public base URL used in self-service links and checkout redirects.
    pub base_url: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub token_secret: String,
    pub token_ttl_hours: i64,
    pub resend_api_key: String,
    pub email_from: String,
    pub operator_email: String,
    pub business_name: String,
    /// Stripe currency code for checkout sessions.
    pub currency: String,
    /// Label shown in front of amounts in emails, e.g. "RM".
    pub currency_label: String,
    /// All booking dates and slots are read in one canonical operator
    /// timezone, expressed as a fixed offset from UTC. The reminder sweeps
    /// use the same clock.
    pub utc_offset_hours: i64,
    pub create_rate_limit_per_minute: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "slotbook.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            base_url: env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string()),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            token_secret: env::var("TOKEN_SECRET").unwrap_or_else(|_| "changeme-token-secret".to_string()),
            token_ttl_hours: env::var("TOKEN_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(720),
            resend_api_key: env::var("RESEND_API_KEY").unwrap_or_default(),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "bookings@localhost".to_string()),
            operator_email: env::var("OPERATOR_EMAIL").unwrap_or_default(),
            business_name: env::var("BUSINESS_NAME").unwrap_or_else(|_| "Slotbook".to_string()),
            currency: env::var("CURRENCY").unwrap_or_else(|_| "myr".to_string()),
            currency_label: env::var("CURRENCY_LABEL").unwrap_or_else(|_| "RM".to_string()),
            utc_offset_hours: env::var("UTC_OFFSET_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8),
            create_rate_limit_per_minute: env::var("CREATE_RATE_LIMIT_PER_MINUTE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
        }
    }

    /// Wall clock in the operator's timezone.
    pub fn local_now(&self) -> NaiveDateTime {
        Utc::now().naive_utc() + Duration::hours(self.utc_offset_hours)
    }
}
