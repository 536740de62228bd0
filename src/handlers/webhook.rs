use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::db::queries;
use crate::services::lifecycle::{self, MarkPaidOutcome};
use crate::services::notify::templates;
use crate::services::token;
use crate::state::AppState;

const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Checks a `Stripe-Signature` header (`t=<unix>,v1=<hex hmac>`) against the
/// raw request body. The timestamp must be within tolerance and at least one
/// `v1` signature must match `hmac_sha256(secret, "{t}.{body}")`.
fn verify_signature(secret: &str, header: &str, payload: &[u8], now: i64) -> bool {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<&str> = vec![];
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = v.parse().ok(),
            Some(("v1", v)) => signatures.push(v),
            _ => {}
        }
    }

    let Some(t) = timestamp else {
        return false;
    };
    if (now - t).abs() > SIGNATURE_TOLERANCE_SECS {
        return false;
    }

    let mut mac = match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(format!("{t}.").as_bytes());
    mac.update(payload);

    signatures.iter().any(|sig| match hex::decode(sig) {
        Ok(bytes) => mac.clone().verify_slice(&bytes).is_ok(),
        Err(_) => false,
    })
}

pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // Verify provider signature (skip if secret is empty — dev mode)
    if !state.config.stripe_webhook_secret.is_empty() {
        let signature = headers
            .get("stripe-signature")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if signature.is_empty() {
            tracing::warn!("missing Stripe-Signature header");
            return (StatusCode::FORBIDDEN, "Missing signature").into_response();
        }

        if !verify_signature(
            &state.config.stripe_webhook_secret,
            signature,
            &body,
            Utc::now().timestamp(),
        ) {
            tracing::warn!("invalid Stripe signature");
            return (StatusCode::FORBIDDEN, "Invalid signature").into_response();
        }
    }

    let event: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable webhook payload");
            return (StatusCode::BAD_REQUEST, "Invalid payload").into_response();
        }
    };

    let event_type = event["type"].as_str().unwrap_or("");
    match event_type {
        "checkout.session.completed" => handle_checkout_completed(&state, &event).await,
        // Unknown event types are acknowledged without side effects
        other => tracing::debug!(event_type = other, "ignoring webhook event"),
    }

    // Business outcomes always ack with 200 so the provider stops redelivering
    (StatusCode::OK, Json(serde_json::json!({ "received": true }))).into_response()
}

async fn handle_checkout_completed(state: &Arc<AppState>, event: &serde_json::Value) {
    let object = &event["data"]["object"];

    let Some(booking_id) = object["client_reference_id"].as_str() else {
        tracing::warn!("checkout event without client_reference_id");
        return;
    };
    let payment_ref = object["payment_intent"]
        .as_str()
        .or_else(|| object["id"].as_str())
        .unwrap_or("");
    if payment_ref.is_empty() {
        tracing::warn!(booking_id = %booking_id, "checkout event without payment reference");
        return;
    }

    let outcome = {
        let db = state.db.lock().unwrap();
        lifecycle::mark_paid(&db, booking_id, payment_ref)
    };

    match outcome {
        Ok(MarkPaidOutcome::Confirmed(booking)) => {
            let service_name = {
                let db = state.db.lock().unwrap();
                queries::get_service(&db, &booking.service_id)
                    .ok()
                    .flatten()
                    .map(|s| s.name)
                    .unwrap_or_else(|| "your booking".to_string())
            };

            let link_token = token::issue(
                &state.config.token_secret,
                &booking.id,
                &booking.customer_email,
                Duration::hours(state.config.token_ttl_hours),
            );

            let msg = templates::booking_confirmation(&booking, &service_name, &state.config, &link_token);
            if let Err(e) = state.mailer.send(&msg).await {
                tracing::error!(booking_id = %booking.id, error = %e, "failed to send confirmation email");
            }
            if !state.config.operator_email.is_empty() {
                let msg = templates::operator_new_booking(&booking, &service_name, &state.config);
                if let Err(e) = state.mailer.send(&msg).await {
                    tracing::error!(booking_id = %booking.id, error = %e, "failed to notify operator");
                }
            }
        }
        Ok(MarkPaidOutcome::AlreadyProcessed(_)) => {
            tracing::info!(booking_id = %booking_id, "duplicate payment event, no action");
        }
        Err(e) => {
            // Terminal for this event; the provider's retries will hit the
            // same outcome and idempotency keeps them harmless.
            tracing::warn!(booking_id = %booking_id, error = %e, "payment event not applied");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    fn sign(secret: &str, payload: &[u8], t: i64) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{t}.").as_bytes());
        mac.update(payload);
        format!("t={t},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_valid_signature_accepted() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = sign(SECRET, payload, 1_700_000_000);
        assert!(verify_signature(SECRET, &header, payload, 1_700_000_000));
    }

    #[test]
    fn test_signature_with_wrong_secret_rejected() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = sign("whsec_other", payload, 1_700_000_000);
        assert!(!verify_signature(SECRET, &header, payload, 1_700_000_000));
    }

    #[test]
    fn test_signature_over_different_body_rejected() {
        let header = sign(SECRET, b"original", 1_700_000_000);
        assert!(!verify_signature(SECRET, &header, b"tampered", 1_700_000_000));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = b"{}";
        let t = 1_700_000_000;
        let header = sign(SECRET, payload, t);
        assert!(!verify_signature(SECRET, &header, payload, t + SIGNATURE_TOLERANCE_SECS + 1));
        assert!(verify_signature(SECRET, &header, payload, t + SIGNATURE_TOLERANCE_SECS));
    }

    #[test]
    fn test_malformed_headers_rejected() {
        let payload = b"{}";
        for header in ["", "t=,v1=", "v1=abcd", "t=notanumber,v1=abcd", "t=1700000000"] {
            assert!(!verify_signature(SECRET, header, payload, 1_700_000_000), "{header:?}");
        }
    }

    #[test]
    fn test_second_v1_signature_accepted() {
        // Secret rotation: header may carry signatures from both secrets
        let payload = b"{}";
        let t = 1_700_000_000;
        let good = sign(SECRET, payload, t);
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={t},v1=deadbeef,v1={good_sig}");
        assert!(verify_signature(SECRET, &header, payload, t));
    }
}
