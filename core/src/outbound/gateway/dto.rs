//! Wire types for the gateway's resource envelope.

use serde::{Deserialize, Serialize};

use crate::domain::ports::{CreateSourceRequest, GatewayIntentStatus};

/// `{"data": {...}}` wrapper every gateway resource travels in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// The wrapped resource.
    pub data: Resource<T>,
}

/// A gateway resource: id plus typed attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource<T> {
    /// Gateway-assigned identifier.
    pub id: String,
    /// Resource-specific attributes.
    pub attributes: T,
}

/// Attributes of a created source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAttributes {
    /// Redirect targets, including where to send the payer.
    pub redirect: SourceRedirect,
}

/// Redirect block of a source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRedirect {
    /// Hosted checkout page.
    pub checkout_url: String,
    /// Redirect target on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
    /// Redirect target on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<String>,
}

/// Attributes of a retrieved payment intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentAttributes {
    /// Current status.
    pub status: GatewayIntentStatus,
    /// Amount in centavos.
    pub amount: i64,
    /// ISO currency code.
    pub currency: String,
}

/// Request body for source creation.
#[derive(Debug, Clone, Serialize)]
pub struct CreateSourceBody {
    /// The wrapped request.
    pub data: CreateSourceData,
}

/// Data section of a source-creation request.
#[derive(Debug, Clone, Serialize)]
pub struct CreateSourceData {
    /// Request attributes.
    pub attributes: CreateSourceAttributes,
}

/// Attributes of a source-creation request.
#[derive(Debug, Clone, Serialize)]
pub struct CreateSourceAttributes {
    /// Amount in centavos.
    pub amount: i64,
    /// ISO currency code.
    pub currency: String,
    /// Source type (`gcash`, `card`, ...).
    #[serde(rename = "type")]
    pub source_type: String,
    /// Shown at checkout.
    pub description: String,
    /// Redirect targets.
    pub redirect: RequestRedirect,
}

/// Redirect targets of a source-creation request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestRedirect {
    /// Redirect target on success.
    pub success: String,
    /// Redirect target on failure.
    pub failed: String,
}

impl From<&CreateSourceRequest> for CreateSourceBody {
    fn from(request: &CreateSourceRequest) -> Self {
        Self {
            data: CreateSourceData {
                attributes: CreateSourceAttributes {
                    amount: request.amount_centavos,
                    currency: request.currency.clone(),
                    source_type: request.source_type.clone(),
                    description: request.description.clone(),
                    redirect: RequestRedirect {
                        success: request.redirect_success.clone(),
                        failed: request.redirect_failed.clone(),
                    },
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use super::*;

    #[test]
    fn intent_envelope_deserializes() {
        let raw = r#"{
            "data": {
                "id": "pi_123",
                "attributes": {"status": "succeeded", "amount": 10000, "currency": "PHP"}
            }
        }"#;
        let envelope: Envelope<IntentAttributes> =
            serde_json::from_str(raw).expect("deserializes");
        assert_eq!(envelope.data.id, "pi_123");
        assert_eq!(envelope.data.attributes.status, GatewayIntentStatus::Succeeded);
        assert_eq!(envelope.data.attributes.amount, 10_000);
    }

    #[test]
    fn unknown_intent_status_is_tolerated() {
        let raw = r#"{
            "data": {
                "id": "pi_456",
                "attributes": {"status": "awaiting_capture", "amount": 500, "currency": "PHP"}
            }
        }"#;
        let envelope: Envelope<IntentAttributes> =
            serde_json::from_str(raw).expect("deserializes");
        assert_eq!(envelope.data.attributes.status, GatewayIntentStatus::Unknown);
    }

    #[test]
    fn source_request_serializes_with_the_gateway_field_names() {
        let request = CreateSourceRequest {
            amount_centavos: 1_500,
            currency: "PHP".to_owned(),
            source_type: "gcash".to_owned(),
            description: "Commission for task".to_owned(),
            redirect_success: "https://example.test/ok".to_owned(),
            redirect_failed: "https://example.test/fail".to_owned(),
        };
        let body = serde_json::to_value(CreateSourceBody::from(&request)).expect("serializes");
        assert_eq!(body["data"]["attributes"]["amount"], 1_500);
        assert_eq!(body["data"]["attributes"]["type"], "gcash");
        assert_eq!(
            body["data"]["attributes"]["redirect"]["success"],
            "https://example.test/ok"
        );
    }

    #[test]
    fn source_envelope_deserializes() {
        let raw = r#"{
            "data": {
                "id": "src_789",
                "attributes": {
                    "redirect": {"checkout_url": "https://pay.example.test/src_789"}
                }
            }
        }"#;
        let envelope: Envelope<SourceAttributes> =
            serde_json::from_str(raw).expect("deserializes");
        assert_eq!(
            envelope.data.attributes.redirect.checkout_url,
            "https://pay.example.test/src_789"
        );
    }
}
