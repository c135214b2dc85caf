//! Authentication and decoding of payment-provider callbacks.
//!
//! The provider signs `"<timestamp>.<raw body>"` with HMAC-SHA256 using the
//! shared webhook secret and sends `t=<timestamp>,v1=<hex digest>` in the
//! `Stripe-Signature` header. Nothing in the body is trusted before the
//! digest matches.

use chrono::Utc;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use uuid::Uuid;

use crate::error::AppError;

pub const SIGNATURE_HEADER: &str = "stripe-signature";
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Oldest event accepted, in seconds
const MAX_EVENT_AGE_SECS: i64 = 300;

/// Tolerated clock drift for timestamps in the future
const MAX_CLOCK_SKEW_SECS: i64 = 60;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("missing signature header")]
    MissingSignature,

    #[error("webhook secret is not configured")]
    MissingSecret,

    #[error("malformed signature header: {0}")]
    MalformedHeader(&'static str),

    #[error("signature mismatch")]
    SignatureMismatch,

    #[error("event timestamp outside the tolerance window")]
    StaleTimestamp,

    #[error("invalid event payload: {0}")]
    Payload(String),
}

impl From<WebhookError> for AppError {
    fn from(err: WebhookError) -> Self {
        AppError::InvalidSignature(err.to_string())
    }
}

/// Parsed `Stripe-Signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    /// Every `v1` digest present; the provider sends several while rotating
    /// secrets.
    pub signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .trim()
                .split_once('=')
                .ok_or(WebhookError::MalformedHeader("expected key=value pairs"))?;
            match key {
                "t" => {
                    timestamp = Some(
                        value
                            .parse::<i64>()
                            .map_err(|_| WebhookError::MalformedHeader("invalid timestamp"))?,
                    );
                }
                "v1" => signatures.push(
                    hex::decode(value).map_err(|_| WebhookError::MalformedHeader("invalid hex"))?,
                ),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(WebhookError::MalformedHeader("missing timestamp"))?;
        if signatures.is_empty() {
            return Err(WebhookError::MalformedHeader("missing v1 signature"));
        }

        Ok(SignatureHeader {
            timestamp,
            signatures,
        })
    }
}

/// Checks callback signatures against the shared webhook secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Verifies the signature over the raw body, then decodes the event.
    pub fn verify(&self, payload: &[u8], header: &str) -> Result<PaymentEvent, WebhookError> {
        self.verify_at(payload, header, Utc::now().timestamp())
    }

    pub fn verify_at(
        &self,
        payload: &[u8],
        header: &str,
        now: i64,
    ) -> Result<PaymentEvent, WebhookError> {
        if self.secret.is_empty() {
            return Err(WebhookError::MissingSecret);
        }
        let header = SignatureHeader::parse(header)?;

        let age = now
            .checked_sub(header.timestamp)
            .ok_or(WebhookError::StaleTimestamp)?;
        if age > MAX_EVENT_AGE_SECS || age < -MAX_CLOCK_SKEW_SECS {
            return Err(WebhookError::StaleTimestamp);
        }

        let expected = self.digest(header.timestamp, payload)?;
        let matched = header.signatures.iter().any(|candidate| {
            candidate.len() == expected.len()
                && bool::from(candidate.as_slice().ct_eq(expected.as_slice()))
        });
        if !matched {
            return Err(WebhookError::SignatureMismatch);
        }

        serde_json::from_slice(payload).map_err(|e| WebhookError::Payload(e.to_string()))
    }

    fn digest(&self, timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, WebhookError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| WebhookError::SignatureMismatch)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

/// Builds a valid `Stripe-Signature` value for a payload, as the provider
/// would. Used by tests and local tooling that replays events.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let verifier = WebhookVerifier::new(secret);
    let digest = verifier.digest(timestamp, payload).unwrap_or_default();
    format!("t={},v1={}", timestamp, hex::encode(digest))
}

/// Provider event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEvent {
    /// Unique per event; redeliveries repeat it
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDetails {
    pub email: Option<String>,
}

/// The checkout session carried by a `checkout.session.completed` event.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletedCheckout {
    pub id: String,
    /// Tour id set when the session was created
    pub client_reference_id: Option<String>,
    pub customer_email: Option<String>,
    pub customer_details: Option<CustomerDetails>,
    /// Charged amount in cents
    pub amount_total: Option<i64>,
}

impl CompletedCheckout {
    pub fn from_event(event: &PaymentEvent) -> Result<Self, WebhookError> {
        serde_json::from_value(event.data.object.clone())
            .map_err(|e| WebhookError::Payload(e.to_string()))
    }

    pub fn tour_id(&self) -> Result<Uuid, WebhookError> {
        self.client_reference_id
            .as_deref()
            .and_then(|id| Uuid::parse_str(id).ok())
            .ok_or_else(|| WebhookError::Payload("missing or invalid client_reference_id".into()))
    }

    pub fn buyer_email(&self) -> Result<&str, WebhookError> {
        self.customer_email
            .as_deref()
            .or_else(|| {
                self.customer_details
                    .as_ref()
                    .and_then(|details| details.email.as_deref())
            })
            .ok_or_else(|| WebhookError::Payload("missing customer email".into()))
    }

    /// Amount actually charged, converted from cents.
    pub fn price(&self) -> Result<Decimal, WebhookError> {
        self.amount_total
            .map(|cents| Decimal::new(cents, 2))
            .ok_or_else(|| WebhookError::Payload("missing amount_total".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "whsec_test_secret";
    const NOW: i64 = 1_700_000_000;

    fn payload() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_test_1",
                "client_reference_id": "5c88fa8cf4afda39709c2955",
                "customer_email": "laura@example.com",
                "amount_total": 49700
            }}
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_header() {
        let header = SignatureHeader::parse("t=1700000000,v1=abcd,v0=ffff,v1=0102").unwrap();
        assert_eq!(header.timestamp, NOW);
        assert_eq!(header.signatures, vec![vec![0xab, 0xcd], vec![0x01, 0x02]]);

        assert_eq!(
            SignatureHeader::parse("v1=abcd"),
            Err(WebhookError::MalformedHeader("missing timestamp"))
        );
        assert_eq!(
            SignatureHeader::parse("t=1"),
            Err(WebhookError::MalformedHeader("missing v1 signature"))
        );
        assert!(SignatureHeader::parse("garbage").is_err());
    }

    #[test]
    fn test_empty_secret_never_verifies() {
        let body = payload();
        let verifier = WebhookVerifier::new("");
        let header = sign_payload("", NOW, &body);
        assert_eq!(
            verifier.verify_at(&body, &header, NOW).unwrap_err(),
            WebhookError::MissingSecret
        );
    }

    #[test]
    fn test_extreme_timestamp_is_stale() {
        let verifier = WebhookVerifier::new(SECRET);
        assert_eq!(
            verifier
                .verify_at(b"{}", "t=-9223372036854775808,v1=00", NOW)
                .unwrap_err(),
            WebhookError::StaleTimestamp
        );
        assert_eq!(
            verifier
                .verify_at(b"{}", "t=-9223372036854775808,v1=00", -NOW)
                .unwrap_err(),
            WebhookError::StaleTimestamp
        );
    }

    #[test]
    fn test_valid_signature_decodes_event() {
        let body = payload();
        let header = sign_payload(SECRET, NOW, &body);
        let event = WebhookVerifier::new(SECRET)
            .verify_at(&body, &header, NOW + 10)
            .unwrap();

        assert_eq!(event.id, "evt_1");
        assert_eq!(event.event_type, CHECKOUT_COMPLETED);

        let checkout = CompletedCheckout::from_event(&event).unwrap();
        assert_eq!(checkout.buyer_email().unwrap(), "laura@example.com");
        assert_eq!(checkout.price().unwrap(), Decimal::new(497, 0));
        // not a UUID
        assert!(checkout.tour_id().is_err());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let body = payload();
        let header = sign_payload("whsec_other", NOW, &body);
        assert_eq!(
            WebhookVerifier::new(SECRET).verify_at(&body, &header, NOW).unwrap_err(),
            WebhookError::SignatureMismatch
        );
    }

    #[test]
    fn test_tampered_body_is_rejected() {
        let body = payload();
        let header = sign_payload(SECRET, NOW, &body);
        let mut tampered = body.clone();
        tampered.extend_from_slice(b" ");
        assert_eq!(
            WebhookVerifier::new(SECRET).verify_at(&tampered, &header, NOW).unwrap_err(),
            WebhookError::SignatureMismatch
        );
    }

    #[test]
    fn test_old_and_future_events_are_rejected() {
        let body = payload();
        let header = sign_payload(SECRET, NOW, &body);
        let verifier = WebhookVerifier::new(SECRET);

        assert_eq!(
            verifier.verify_at(&body, &header, NOW + 301).unwrap_err(),
            WebhookError::StaleTimestamp
        );
        assert_eq!(
            verifier.verify_at(&body, &header, NOW - 61).unwrap_err(),
            WebhookError::StaleTimestamp
        );
        assert!(verifier.verify_at(&body, &header, NOW + 300).is_ok());
    }

    #[test]
    fn test_buyer_email_falls_back_to_customer_details() {
        let checkout: CompletedCheckout = serde_json::from_value(json!({
            "id": "cs_test_2",
            "customer_details": { "email": "lisa@example.com" }
        }))
        .unwrap();
        assert_eq!(checkout.buyer_email().unwrap(), "lisa@example.com");
        assert!(checkout.price().is_err());
    }

    #[test]
    fn test_errors_map_to_invalid_signature() {
        let err: AppError = WebhookError::MissingSignature.into();
        assert!(matches!(err, AppError::InvalidSignature(_)));
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }
}
