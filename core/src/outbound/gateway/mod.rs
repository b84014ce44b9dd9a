//! HTTP payment-gateway adapter.
//!
//! Speaks a PayMongo-style envelope: resources are wrapped in
//! `{"data": {"id", "attributes": {...}}}`, amounts travel in centavos, and
//! authentication is HTTP Basic with the secret key as username. Every call
//! carries the configured timeout; a timeout surfaces as
//! [`GatewayError::Unavailable`] and the caller's row stays in its
//! intermediate state for reconciliation.

pub mod dto;
pub mod webhook;

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tracing::debug;

use crate::domain::ports::{
    CreateSourceRequest, GatewayError, GatewayIntent, GatewaySource, PaymentGateway,
};

use self::dto::{CreateSourceBody, Envelope, IntentAttributes, SourceAttributes};

/// Connection settings for the gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// API base URL, e.g. `https://api.paymongo.com/v1`.
    pub base_url: String,
    /// Secret API key used as the Basic-auth username.
    pub secret_key: String,
    /// Shared secret for webhook signature verification.
    pub webhook_secret: String,
    /// Network timeout applied to every call.
    pub timeout: Duration,
}

/// Reqwest-backed gateway client.
pub struct HttpPaymentGateway {
    http: reqwest::Client,
    base_url: String,
}

impl HttpPaymentGateway {
    /// Build a client from the configuration.
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let credentials = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:", config.secret_key));
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Basic {credentials}"))
            .map_err(|err| GatewayError::unavailable(err.to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| GatewayError::unavailable(err.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_source(
        &self,
        request: CreateSourceRequest,
    ) -> Result<GatewaySource, GatewayError> {
        let url = format!("{}/sources", self.base_url);
        debug!(%url, amount = request.amount_centavos, "creating gateway source");

        let response = self
            .http
            .post(&url)
            .json(&CreateSourceBody::from(&request))
            .send()
            .await
            .map_err(map_transport_error)?;
        let envelope: Envelope<SourceAttributes> =
            read_envelope(response).await?;
        Ok(GatewaySource {
            id: envelope.data.id,
            checkout_url: envelope.data.attributes.redirect.checkout_url,
        })
    }

    async fn retrieve_intent(&self, intent_id: String) -> Result<GatewayIntent, GatewayError> {
        let url = format!("{}/payment_intents/{intent_id}", self.base_url);
        debug!(%url, "retrieving gateway intent");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(map_transport_error)?;
        let envelope: Envelope<IntentAttributes> = read_envelope(response).await?;
        Ok(GatewayIntent {
            id: envelope.data.id,
            status: envelope.data.attributes.status,
            amount_centavos: envelope.data.attributes.amount,
            currency: envelope.data.attributes.currency,
        })
    }
}

async fn read_envelope<T>(response: reqwest::Response) -> Result<Envelope<T>, GatewayError>
where
    T: serde::de::DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GatewayError::rejected(format!("{status}: {body}")));
    }
    response
        .json::<Envelope<T>>()
        .await
        .map_err(|err| GatewayError::rejected(format!("malformed gateway response: {err}")))
}

fn map_transport_error(error: reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        GatewayError::unavailable("gateway call timed out")
    } else {
        GatewayError::unavailable(error.to_string())
    }
}
