//! Webhook signature verification and event parsing.
//!
//! The gateway signs each delivery with HMAC-SHA256 over the raw body using
//! a shared secret. Verification happens before any lookup; a payload that
//! fails it never reaches the domain.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::domain::commission::WebhookEvent;
use crate::domain::ports::{GatewayError, GatewayIntentStatus};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Deserialize)]
struct WebhookBody {
    id: String,
    status: GatewayIntentStatus,
}

/// Check the hex-encoded HMAC-SHA256 signature of a raw webhook body.
///
/// Comparison is constant time.
pub fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };
    mac.verify_slice(&signature).is_ok()
}

/// Verify and parse a webhook delivery into a domain event.
///
/// Fails with [`GatewayError::Rejected`] on a bad signature or a malformed
/// body.
pub fn verified_event(
    secret: &str,
    body: &[u8],
    signature_hex: &str,
) -> Result<WebhookEvent, GatewayError> {
    if !verify_signature(secret, body, signature_hex) {
        return Err(GatewayError::rejected("invalid webhook signature"));
    }
    let parsed: WebhookBody = serde_json::from_slice(body)
        .map_err(|err| GatewayError::rejected(format!("malformed webhook body: {err}")))?;
    Ok(WebhookEvent {
        gateway_payment_id: parsed.id,
        status: parsed.status,
    })
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("key accepted");
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn valid_signature_verifies() {
        let secret = "whsec_test";
        let body = br#"{"id": "g1", "status": "succeeded"}"#;
        let signature = sign(secret, body);
        assert!(verify_signature(secret, body, &signature));
    }

    #[test]
    fn tampered_body_fails_verification() {
        let secret = "whsec_test";
        let body = br#"{"id": "g1", "status": "succeeded"}"#;
        let signature = sign(secret, body);
        let tampered = br#"{"id": "g2", "status": "succeeded"}"#;
        assert!(!verify_signature(secret, tampered, &signature));
    }

    #[test]
    fn garbage_signature_fails_verification() {
        assert!(!verify_signature("whsec_test", b"{}", "not-hex"));
    }

    #[test]
    fn verified_event_parses_id_and_status() {
        let secret = "whsec_test";
        let body = br#"{"id": "g1", "status": "succeeded"}"#;
        let signature = sign(secret, body);

        let event = verified_event(secret, body, &signature).expect("event verified");
        assert_eq!(event.gateway_payment_id, "g1");
        assert_eq!(event.status, GatewayIntentStatus::Succeeded);
    }

    #[test]
    fn bad_signature_is_rejected_before_parsing() {
        let body = br#"{"id": "g1", "status": "succeeded"}"#;
        let error = verified_event("whsec_test", body, "00ff").expect_err("rejected");
        assert!(matches!(error, GatewayError::Rejected { .. }));
    }

    #[test]
    fn unknown_status_parses_as_unknown() {
        let secret = "whsec_test";
        let body = br#"{"id": "g9", "status": "chargeback_opened"}"#;
        let signature = sign(secret, body);
        let event = verified_event(secret, body, &signature).expect("event verified");
        assert_eq!(event.status, GatewayIntentStatus::Unknown);
    }
}
