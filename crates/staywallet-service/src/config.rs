//! Service configuration.

use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Fallback when neither the configuration provider nor the environment
/// supplies an auto-cancellation timeout.
pub const DEFAULT_AUTO_CANCEL_HOURS: u32 = 24;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Path to `RocksDB` data directory (default: "/data/staywallet").
    pub data_dir: String,

    /// Name this process uses when taking job leases.
    pub instance_id: String,

    /// Runtime configuration service URL (optional).
    pub config_api_url: Option<String>,

    /// Runtime configuration service API key (optional).
    pub config_api_key: Option<String>,

    /// Calendar/availability service URL (optional).
    pub availability_api_url: Option<String>,

    /// Calendar/availability service API key (optional).
    pub availability_api_key: Option<String>,

    /// Notification webhook URL (optional).
    pub notification_webhook_url: Option<String>,

    /// Notification webhook API key (optional).
    pub notification_api_key: Option<String>,

    /// Payment gateway base URL (optional).
    pub payment_gateway_url: Option<String>,

    /// Payment gateway secret key (optional).
    pub payment_gateway_secret: Option<String>,

    /// Timeout for collaborator HTTP calls, in seconds.
    pub http_timeout_seconds: u64,

    /// How often the release job runs, in seconds (default: daily).
    pub release_interval_seconds: u64,

    /// How often the auto-cancellation job runs, in seconds (default: hourly).
    pub auto_cancel_interval_seconds: u64,

    /// How often the outbox is drained, in seconds.
    pub outbox_interval_seconds: u64,

    /// Auto-cancellation timeout when the configuration provider has none
    /// (`BOOKING_AUTO_CANCEL_HOURS`).
    pub booking_auto_cancel_hours: u32,

    /// Delivery attempts before an outbox event is dead-lettered.
    pub outbox_max_attempts: u32,

    /// Events delivered per outbox run.
    pub outbox_batch_size: usize,

    /// How long a job lease is valid, in seconds.
    pub lease_ttl_seconds: u64,
}

/// Collaborator secrets file structure.
#[derive(Debug, Default, Deserialize)]
struct CollaboratorSecrets {
    #[serde(default)]
    config_api_key: Option<String>,
    #[serde(default)]
    availability_api_key: Option<String>,
    #[serde(default)]
    notification_api_key: Option<String>,
    #[serde(default)]
    payment_gateway_secret: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let secrets = load_collaborator_secrets();
        let defaults = Self::default();

        Self {
            data_dir: std::env::var("DATA_DIR").unwrap_or(defaults.data_dir),
            instance_id: std::env::var("INSTANCE_ID").unwrap_or(defaults.instance_id),
            config_api_url: std::env::var("CONFIG_API_URL").ok(),
            config_api_key: secrets
                .config_api_key
                .or_else(|| std::env::var("CONFIG_API_KEY").ok()),
            availability_api_url: std::env::var("AVAILABILITY_API_URL").ok(),
            availability_api_key: secrets
                .availability_api_key
                .or_else(|| std::env::var("AVAILABILITY_API_KEY").ok()),
            notification_webhook_url: std::env::var("NOTIFICATION_WEBHOOK_URL").ok(),
            notification_api_key: secrets
                .notification_api_key
                .or_else(|| std::env::var("NOTIFICATION_API_KEY").ok()),
            payment_gateway_url: std::env::var("PAYMENT_GATEWAY_URL").ok(),
            payment_gateway_secret: secrets
                .payment_gateway_secret
                .or_else(|| std::env::var("PAYMENT_GATEWAY_SECRET").ok()),
            http_timeout_seconds: env_or("HTTP_TIMEOUT_SECONDS", defaults.http_timeout_seconds),
            release_interval_seconds: env_or(
                "RELEASE_INTERVAL_SECONDS",
                defaults.release_interval_seconds,
            ),
            auto_cancel_interval_seconds: env_or(
                "AUTO_CANCEL_INTERVAL_SECONDS",
                defaults.auto_cancel_interval_seconds,
            ),
            outbox_interval_seconds: env_or(
                "OUTBOX_INTERVAL_SECONDS",
                defaults.outbox_interval_seconds,
            ),
            booking_auto_cancel_hours: env_or(
                "BOOKING_AUTO_CANCEL_HOURS",
                defaults.booking_auto_cancel_hours,
            ),
            outbox_max_attempts: env_or("OUTBOX_MAX_ATTEMPTS", defaults.outbox_max_attempts),
            outbox_batch_size: env_or("OUTBOX_BATCH_SIZE", defaults.outbox_batch_size),
            lease_ttl_seconds: env_or("JOB_LEASE_TTL_SECONDS", defaults.lease_ttl_seconds),
        }
    }

    /// Release job cadence.
    #[must_use]
    pub const fn release_interval(&self) -> Duration {
        Duration::from_secs(self.release_interval_seconds)
    }

    /// Auto-cancellation job cadence.
    #[must_use]
    pub const fn auto_cancel_interval(&self) -> Duration {
        Duration::from_secs(self.auto_cancel_interval_seconds)
    }

    /// Outbox dispatcher cadence.
    #[must_use]
    pub const fn outbox_interval(&self) -> Duration {
        Duration::from_secs(self.outbox_interval_seconds)
    }

    /// Job lease validity.
    #[must_use]
    pub fn lease_ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(Duration::from_secs(self.lease_ttl_seconds))
            .unwrap_or(chrono::Duration::MAX)
    }
}

/// Parse an environment variable, falling back to `default` when it is
/// missing or malformed.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(var = %name, value = %raw, "Ignoring malformed environment value");
            default
        }),
        Err(_) => default,
    }
}

/// Load collaborator secrets from the first secrets file found.
fn load_collaborator_secrets() -> CollaboratorSecrets {
    let secret_paths = [
        ".secrets/staywallet.json",
        "staywallet/.secrets/staywallet.json",
        "../.secrets/staywallet.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<CollaboratorSecrets>(path) {
            tracing::info!(path = %path, "Loaded collaborator secrets from file");
            return secrets;
        }
    }

    tracing::debug!("Secrets file not found, using environment variables");
    CollaboratorSecrets::default()
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: "/data/staywallet".into(),
            instance_id: format!("staywallet-{}", uuid::Uuid::new_v4()),
            config_api_url: None,
            config_api_key: None,
            availability_api_url: None,
            availability_api_key: None,
            notification_webhook_url: None,
            notification_api_key: None,
            payment_gateway_url: None,
            payment_gateway_secret: None,
            http_timeout_seconds: 30,
            release_interval_seconds: 24 * 60 * 60,
            auto_cancel_interval_seconds: 60 * 60,
            outbox_interval_seconds: 60,
            booking_auto_cancel_hours: DEFAULT_AUTO_CANCEL_HOURS,
            outbox_max_attempts: 5,
            outbox_batch_size: 100,
            lease_ttl_seconds: 15 * 60,
        }
    }
}
