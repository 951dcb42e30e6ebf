//! HTTP adapters for the collaborator traits.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use staywallet_core::{BookingId, PropertyId, UserId};

use super::{
    Availability, CollaboratorResult, ConfigProvider, Notification, Notifier, PaymentGateway,
    VerifiedPayment,
};
use crate::error::CollaboratorError;

/// Options shared by the HTTP adapters.
#[derive(Debug, Clone, Copy)]
pub struct HttpOptions {
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
        }
    }
}

fn build_client(options: HttpOptions) -> CollaboratorResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(options.timeout_seconds))
        .build()
        .map_err(|e| CollaboratorError::Configuration(format!("failed to build HTTP client: {e}")))
}

fn normalize_base_url(base_url: impl Into<String>) -> String {
    base_url.into().trim_end_matches('/').to_string()
}

fn authorize(request: RequestBuilder, api_key: Option<&str>) -> RequestBuilder {
    match api_key {
        Some(key) => request.header("Authorization", format!("Bearer {key}")),
        None => request,
    }
}

/// Turn a non-success status into `CollaboratorError::Api`.
async fn check_status(response: Response) -> CollaboratorResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(CollaboratorError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Handle an HTTP response, parsing JSON or returning an error.
async fn handle_response<T: DeserializeOwned>(response: Response) -> CollaboratorResult<T> {
    let body = check_status(response).await?.text().await?;
    serde_json::from_str(&body).map_err(CollaboratorError::from)
}

// =============================================================================
// Configuration provider
// =============================================================================

#[derive(Debug, Deserialize)]
struct ConfigValueResponse {
    value: serde_json::Value,
}

/// Reads runtime configuration from `GET {base}/v1/config/{key}`.
#[derive(Debug, Clone)]
pub struct HttpConfigProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpConfigProvider {
    /// Create a provider with default options.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> CollaboratorResult<Self> {
        Self::with_options(base_url, api_key, HttpOptions::default())
    }

    /// Create a provider with custom options.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        api_key: Option<String>,
        options: HttpOptions,
    ) -> CollaboratorResult<Self> {
        Ok(Self {
            client: build_client(options)?,
            base_url: normalize_base_url(base_url),
            api_key,
        })
    }
}

#[async_trait]
impl ConfigProvider for HttpConfigProvider {
    async fn get_value(&self, key: &str) -> CollaboratorResult<Option<String>> {
        let url = format!("{}/v1/config/{}", self.base_url, key);
        let response = authorize(self.client.get(&url), self.api_key.as_deref())
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body: ConfigValueResponse = handle_response(response).await?;
        Ok(match body.value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
    }
}

// =============================================================================
// Availability
// =============================================================================

#[derive(Debug, Serialize)]
struct UnblockRequest {
    booking_id: BookingId,
}

/// Calendar service client.
#[derive(Debug, Clone)]
pub struct HttpAvailabilityClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpAvailabilityClient {
    /// Create a client with default options.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> CollaboratorResult<Self> {
        Self::with_options(base_url, api_key, HttpOptions::default())
    }

    /// Create a client with custom options.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        api_key: Option<String>,
        options: HttpOptions,
    ) -> CollaboratorResult<Self> {
        Ok(Self {
            client: build_client(options)?,
            base_url: normalize_base_url(base_url),
            api_key,
        })
    }
}

#[async_trait]
impl Availability for HttpAvailabilityClient {
    async fn unblock_dates_for_booking(
        &self,
        property_id: PropertyId,
        booking_id: BookingId,
    ) -> CollaboratorResult<()> {
        let url = format!(
            "{}/v1/properties/{}/availability/unblock",
            self.base_url, property_id
        );
        let response = authorize(self.client.post(&url), self.api_key.as_deref())
            .json(&UnblockRequest { booking_id })
            .send()
            .await?;

        check_status(response).await?;
        tracing::debug!(property_id = %property_id, booking_id = %booking_id, "Unblocked booking dates");
        Ok(())
    }
}

// =============================================================================
// Notifications
// =============================================================================

/// Posts notifications as JSON to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl WebhookNotifier {
    /// Create a notifier with default options.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> CollaboratorResult<Self> {
        Self::with_options(url, api_key, HttpOptions::default())
    }

    /// Create a notifier with custom options.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_options(
        url: impl Into<String>,
        api_key: Option<String>,
        options: HttpOptions,
    ) -> CollaboratorResult<Self> {
        Ok(Self {
            client: build_client(options)?,
            url: normalize_base_url(url),
            api_key,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> CollaboratorResult<()> {
        let response = authorize(self.client.post(&self.url), self.api_key.as_deref())
            .json(notification)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }
}

// =============================================================================
// Payment gateway
// =============================================================================

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    status: bool,
    #[serde(default)]
    message: Option<String>,
    data: Option<VerifyData>,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    reference: String,
    status: String,
    /// Minor units (kobo, cents).
    amount: i64,
    currency: String,
    #[serde(default)]
    metadata: Option<VerifyMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct VerifyMetadata {
    #[serde(default)]
    user_id: Option<String>,
}

/// Verifies payments with `GET {base}/transaction/verify/{reference}`.
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    client: Client,
    base_url: String,
    secret_key: String,
}

impl HttpPaymentGateway {
    /// Create a gateway client with default options.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> CollaboratorResult<Self> {
        Self::with_options(base_url, secret_key, HttpOptions::default())
    }

    /// Create a gateway client with custom options.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        secret_key: impl Into<String>,
        options: HttpOptions,
    ) -> CollaboratorResult<Self> {
        Ok(Self {
            client: build_client(options)?,
            base_url: normalize_base_url(base_url),
            secret_key: secret_key.into(),
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn verify(&self, reference: &str) -> CollaboratorResult<VerifiedPayment> {
        let url = format!("{}/transaction/verify/{}", self.base_url, reference);
        let response = authorize(self.client.get(&url), Some(&self.secret_key))
            .send()
            .await?;

        let body: VerifyResponse = handle_response(response).await?;
        let data = match (body.status, body.data) {
            (true, Some(data)) => data,
            _ => {
                return Err(CollaboratorError::InvalidResponse(
                    body.message
                        .unwrap_or_else(|| "payment verification failed".to_string()),
                ))
            }
        };

        let user_id = data
            .metadata
            .unwrap_or_default()
            .user_id
            .map(|raw| raw.parse::<UserId>())
            .transpose()
            .map_err(|e| CollaboratorError::InvalidResponse(e.to_string()))?;

        Ok(VerifiedPayment {
            reference: data.reference,
            successful: data.status == "success",
            amount: Decimal::new(data.amount, 2),
            currency: data.currency,
            user_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clients_trim_trailing_slash() {
        let provider = HttpConfigProvider::new("http://config.local/", None).unwrap();
        assert_eq!(provider.base_url, "http://config.local");

        let gateway = HttpPaymentGateway::new("https://api.gateway.test//", "sk_test").unwrap();
        assert_eq!(gateway.base_url, "https://api.gateway.test");
    }

    #[test]
    fn custom_options_apply() {
        let notifier = WebhookNotifier::with_options(
            "http://hooks.local/notify",
            Some("key".into()),
            HttpOptions { timeout_seconds: 5 },
        )
        .unwrap();
        assert_eq!(notifier.url, "http://hooks.local/notify");
        assert_eq!(notifier.api_key.as_deref(), Some("key"));
    }
}
