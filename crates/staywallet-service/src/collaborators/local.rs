//! In-process collaborators for unconfigured deployments and tests.

use std::collections::HashMap;

use async_trait::async_trait;

use staywallet_core::{BookingId, PropertyId};

use super::{Availability, CollaboratorResult, ConfigProvider, Notification, Notifier};

/// Fixed configuration values.
#[derive(Debug, Clone, Default)]
pub struct StaticConfig {
    values: HashMap<String, String>,
}

impl StaticConfig {
    /// An empty configuration; every lookup falls through to the caller's default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

#[async_trait]
impl ConfigProvider for StaticConfig {
    async fn get_value(&self, key: &str) -> CollaboratorResult<Option<String>> {
        Ok(self.values.get(key).cloned())
    }
}

/// Availability that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAvailability;

#[async_trait]
impl Availability for NoopAvailability {
    async fn unblock_dates_for_booking(
        &self,
        property_id: PropertyId,
        booking_id: BookingId,
    ) -> CollaboratorResult<()> {
        tracing::debug!(property_id = %property_id, booking_id = %booking_id, "Skipping calendar unblock");
        Ok(())
    }
}

/// Notifier that writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> CollaboratorResult<()> {
        tracing::info!(
            recipient = ?notification.recipient,
            template = %notification.template,
            channels = ?notification.channels,
            "Notification"
        );
        Ok(())
    }
}
