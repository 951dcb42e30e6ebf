//! External collaborators consumed by the ledger and settlement jobs.
//!
//! Every collaborator is a capability trait injected as `Arc<dyn Trait>`.
//! HTTP adapters live in [`http`]; in-process stand-ins in [`local`].

pub mod http;
pub mod local;

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use staywallet_core::{BookingId, PropertyId, UserId};

use crate::config::ServiceConfig;
use crate::error::CollaboratorError;

pub use http::{
    HttpAvailabilityClient, HttpConfigProvider, HttpOptions, HttpPaymentGateway, WebhookNotifier,
};
pub use local::{LogNotifier, NoopAvailability, StaticConfig};

/// Result type for collaborator calls.
pub type CollaboratorResult<T> = std::result::Result<T, CollaboratorError>;

/// Runtime configuration values that operators can change without a deploy.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Raw value for `key`, or `None` when unset.
    async fn get_value(&self, key: &str) -> CollaboratorResult<Option<String>>;

    /// Numeric value for `key`, or `None` when unset or not a number.
    async fn get_numeric_value(&self, key: &str) -> CollaboratorResult<Option<Decimal>> {
        Ok(self
            .get_value(key)
            .await?
            .and_then(|raw| raw.trim().parse().ok()))
    }
}

/// The calendar service that blocks dates for bookings.
#[async_trait]
pub trait Availability: Send + Sync {
    /// Free the dates a cancelled booking was holding.
    async fn unblock_dates_for_booking(
        &self,
        property_id: PropertyId,
        booking_id: BookingId,
    ) -> CollaboratorResult<()>;
}

/// Email/push/in-app notification delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one templated notification.
    async fn send(&self, notification: &Notification) -> CollaboratorResult<()>;
}

/// The payment gateway that originated a wallet top-up.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Look up a payment by the gateway's reference.
    async fn verify(&self, reference: &str) -> CollaboratorResult<VerifiedPayment>;
}

/// Who a notification is for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "user_id", rename_all = "snake_case")]
pub enum Recipient {
    /// A marketplace user.
    User(UserId),
    /// The operations team.
    Operations,
}

/// Delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Email.
    Email,
    /// Mobile push.
    Push,
    /// In-app inbox.
    InApp,
}

/// A templated notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Recipient.
    pub recipient: Recipient,
    /// Template name.
    pub template: String,
    /// Channels to deliver on.
    pub channels: Vec<Channel>,
    /// Template variables.
    pub data: serde_json::Value,
}

impl Notification {
    /// Notification to a user on every channel.
    #[must_use]
    pub fn to_user(user_id: UserId, template: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            recipient: Recipient::User(user_id),
            template: template.into(),
            channels: vec![Channel::Email, Channel::Push, Channel::InApp],
            data,
        }
    }

    /// Email to the operations team.
    #[must_use]
    pub fn to_operations(template: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            recipient: Recipient::Operations,
            template: template.into(),
            channels: vec![Channel::Email],
            data,
        }
    }
}

/// A payment as confirmed by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedPayment {
    /// The gateway's reference.
    pub reference: String,
    /// Whether the gateway reports the payment as successful.
    pub successful: bool,
    /// Amount in major units.
    pub amount: Decimal,
    /// Currency code.
    pub currency: String,
    /// The user the payment was initiated for, if the gateway recorded one.
    pub user_id: Option<UserId>,
}

/// The collaborators a running service needs.
#[derive(Clone)]
pub struct Collaborators {
    /// Runtime configuration.
    pub config: Arc<dyn ConfigProvider>,
    /// Calendar service.
    pub availability: Arc<dyn Availability>,
    /// Notification delivery.
    pub notifier: Arc<dyn Notifier>,
    /// Payment gateway (optional).
    pub payment_gateway: Option<Arc<dyn PaymentGateway>>,
}

impl Collaborators {
    /// Build HTTP adapters for every configured collaborator, falling back to
    /// in-process stand-ins for the rest.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn from_config(config: &ServiceConfig) -> CollaboratorResult<Self> {
        let options = HttpOptions {
            timeout_seconds: config.http_timeout_seconds,
        };

        let config_provider: Arc<dyn ConfigProvider> = if let Some(url) = &config.config_api_url {
            tracing::info!(config_url = %url, "Runtime configuration provider enabled");
            Arc::new(HttpConfigProvider::with_options(
                url,
                config.config_api_key.clone(),
                options,
            )?)
        } else {
            tracing::warn!("Configuration provider not configured - using environment defaults");
            Arc::new(StaticConfig::new())
        };

        let availability: Arc<dyn Availability> =
            if let Some(url) = &config.availability_api_url {
                tracing::info!(availability_url = %url, "Availability integration enabled");
                Arc::new(HttpAvailabilityClient::with_options(
                    url,
                    config.availability_api_key.clone(),
                    options,
                )?)
            } else {
                tracing::warn!("Availability not configured - calendar holds will not be released");
                Arc::new(NoopAvailability)
            };

        let notifier: Arc<dyn Notifier> = if let Some(url) = &config.notification_webhook_url {
            tracing::info!(notification_url = %url, "Notification webhook enabled");
            Arc::new(WebhookNotifier::with_options(
                url,
                config.notification_api_key.clone(),
                options,
            )?)
        } else {
            tracing::warn!("Notifications not configured - notifications will only be logged");
            Arc::new(LogNotifier)
        };

        let payment_gateway = match (&config.payment_gateway_url, &config.payment_gateway_secret) {
            (Some(url), Some(secret)) => {
                tracing::info!(gateway_url = %url, "Payment gateway enabled");
                Some(Arc::new(HttpPaymentGateway::with_options(url, secret, options)?)
                    as Arc<dyn PaymentGateway>)
            }
            _ => {
                tracing::warn!("Payment gateway not configured - wallet funding unavailable");
                None
            }
        };

        Ok(Self {
            config: config_provider,
            availability,
            notifier,
            payment_gateway,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn numeric_value_parses_or_drops() {
        let config = StaticConfig::new()
            .with("booking_auto_cancel_hours", " 48 ")
            .with("broken", "soon");

        assert_eq!(
            config
                .get_numeric_value("booking_auto_cancel_hours")
                .await
                .unwrap(),
            Some(Decimal::from(48))
        );
        assert_eq!(config.get_numeric_value("broken").await.unwrap(), None);
        assert_eq!(config.get_numeric_value("missing").await.unwrap(), None);
    }

    #[test]
    fn unconfigured_collaborators_fall_back() {
        let collaborators = Collaborators::from_config(&ServiceConfig::default()).unwrap();
        assert!(collaborators.payment_gateway.is_none());
    }

    #[test]
    fn recipient_serializes_tagged() {
        let user_id = UserId::generate();
        let json = serde_json::to_value(Recipient::User(user_id)).unwrap();
        assert_eq!(json["kind"], "user");
        assert_eq!(json["user_id"], user_id.to_string());
        let ops = serde_json::to_value(Recipient::Operations).unwrap();
        assert_eq!(ops["kind"], "operations");
    }
}
