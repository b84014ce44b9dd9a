//! Port for the external payment gateway.
//!
//! The gateway speaks in the currency's smallest unit (centavos). Calls are
//! blocking network I/O and carry the configured timeout; a timeout leaves
//! the local payment row in its intermediate state for reconciliation, never
//! assuming success.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Errors raised by gateway adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The gateway could not be reached or timed out.
    #[error("gateway unavailable: {message}")]
    Unavailable {
        /// What failed.
        message: String,
    },
    /// The gateway understood and refused the request.
    #[error("gateway rejected the request: {message}")]
    Rejected {
        /// The gateway's reason.
        message: String,
    },
}

impl GatewayError {
    /// Convenience constructor for [`GatewayError::Unavailable`].
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Convenience constructor for [`GatewayError::Rejected`].
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

/// Request to create a redirect-based payment source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateSourceRequest {
    /// Amount in the currency's smallest unit.
    pub amount_centavos: i64,
    /// ISO currency code.
    pub currency: String,
    /// Source type understood by the gateway (`gcash`, `card`, ...).
    pub source_type: String,
    /// Human-readable description shown at checkout.
    pub description: String,
    /// Redirect target on success.
    pub redirect_success: String,
    /// Redirect target on failure.
    pub redirect_failed: String,
}

/// A created payment source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewaySource {
    /// Gateway-assigned source id; later echoed by webhooks.
    pub id: String,
    /// Where to send the payer.
    pub checkout_url: String,
}

/// Gateway-reported status of a payment intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayIntentStatus {
    /// Still awaiting the payer.
    Pending,
    /// Paid.
    Succeeded,
    /// Definitively failed.
    Failed,
    /// Any status this core does not act on.
    #[serde(other)]
    Unknown,
}

/// A retrieved payment intent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayIntent {
    /// Gateway-assigned id.
    pub id: String,
    /// Current status.
    pub status: GatewayIntentStatus,
    /// Amount in the currency's smallest unit.
    pub amount_centavos: i64,
    /// ISO currency code.
    pub currency: String,
}

/// Port for the payment gateway.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a redirect-based source for checkout.
    async fn create_source(
        &self,
        request: CreateSourceRequest,
    ) -> Result<GatewaySource, GatewayError>;

    /// Retrieve the current state of a payment intent.
    async fn retrieve_intent(&self, intent_id: String) -> Result<GatewayIntent, GatewayError>;
}

/// Fixture implementation for tests that do not exercise a real gateway.
///
/// Sources get sequential ids; intent statuses are whatever the test
/// programmed with [`FixturePaymentGateway::set_intent_status`] (pending
/// otherwise).
#[derive(Debug, Default)]
pub struct FixturePaymentGateway {
    counter: std::sync::atomic::AtomicU64,
    intents: std::sync::Mutex<std::collections::HashMap<String, GatewayIntentStatus>>,
}

impl FixturePaymentGateway {
    /// Program the status reported for an intent id.
    pub fn set_intent_status(&self, intent_id: impl Into<String>, status: GatewayIntentStatus) {
        if let Ok(mut intents) = self.intents.lock() {
            intents.insert(intent_id.into(), status);
        }
    }
}

#[async_trait]
impl PaymentGateway for FixturePaymentGateway {
    async fn create_source(
        &self,
        _request: CreateSourceRequest,
    ) -> Result<GatewaySource, GatewayError> {
        let n = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok(GatewaySource {
            id: format!("src_fixture_{n}"),
            checkout_url: format!("https://gateway.test/checkout/src_fixture_{n}"),
        })
    }

    async fn retrieve_intent(&self, intent_id: String) -> Result<GatewayIntent, GatewayError> {
        let status = self
            .intents
            .lock()
            .map_err(|_| GatewayError::unavailable("fixture mutex poisoned"))?
            .get(&intent_id)
            .copied()
            .unwrap_or(GatewayIntentStatus::Pending);
        Ok(GatewayIntent {
            id: intent_id,
            status,
            amount_centavos: 0,
            currency: "PHP".to_owned(),
        })
    }
}
