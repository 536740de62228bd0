use std::sync::{Arc, Mutex};

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use slotbook::config::AppConfig;
use slotbook::db;
use slotbook::handlers;
use slotbook::services::notify::resend::ResendMailer;
use slotbook::services::payments::stripe::StripeProvider;
use slotbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    if config.stripe_secret_key.is_empty() {
        tracing::warn!("STRIPE_SECRET_KEY not set, checkout and refunds will fail");
    }
    if config.resend_api_key.is_empty() {
        tracing::warn!("RESEND_API_KEY not set, emails will fail");
    }
    let payments = StripeProvider::new(config.stripe_secret_key.clone());
    let mailer = ResendMailer::new(config.resend_api_key.clone(), config.email_from.clone());

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        payments: Box::new(payments),
        mailer: Box::new(mailer),
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/services", get(handlers::bookings::list_services))
        .route("/api/availability", get(handlers::bookings::get_availability))
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route("/booking/manage/:token", get(handlers::selfservice::manage))
        .route("/booking/cancel/:token", post(handlers::selfservice::cancel))
        .route(
            "/booking/reschedule/:token",
            post(handlers::selfservice::reschedule),
        )
        .route("/webhook/stripe", post(handlers::webhook::stripe_webhook))
        .route("/calendar/:booking_id", get(handlers::calendar::download_ics))
        .route("/api/admin/bookings", get(handlers::admin::get_bookings))
        .route("/api/admin/bookings/:id", patch(handlers::admin::patch_booking))
        .route(
            "/api/admin/bookings/:id/cancel",
            post(handlers::admin::cancel_booking),
        )
        .route("/api/admin/blocked", get(handlers::admin::get_blocked))
        .route("/api/admin/block", post(handlers::admin::block_date))
        .route("/api/admin/unblock", post(handlers::admin::unblock_date))
        .route("/api/admin/services", get(handlers::admin::get_services))
        .route("/api/admin/services", post(handlers::admin::upsert_service))
        .route("/api/reminders/run", post(handlers::reminders::run_reminders))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
