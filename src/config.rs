//! Configuration types for model-poller

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Environment variable pointing Pub/Sub requests at a local emulator
pub const PUBSUB_EMULATOR_HOST: &str = "PUBSUB_EMULATOR_HOST";
/// Environment variable pointing Cloud Storage requests at a local emulator
pub const STORAGE_EMULATOR_HOST: &str = "STORAGE_EMULATOR_HOST";
/// Environment variable holding a ready OAuth2 bearer token
pub const ACCESS_TOKEN_VAR: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Pub/Sub subscription settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PubSubConfig {
    /// API base URL (default: "https://pubsub.googleapis.com")
    #[serde(default = "default_pubsub_endpoint")]
    pub endpoint: String,

    /// Maximum messages returned by a single pull (default: 10)
    #[serde(default = "default_max_messages")]
    pub max_messages: u32,

    /// Wait between pulls after a failed pull request (default: 60s)
    #[serde(default = "default_idle_wait", with = "duration_serde")]
    pub idle_wait: Duration,

    /// Wait after a pull that returned no messages (default: 1s)
    #[serde(default = "default_empty_wait", with = "duration_serde")]
    pub empty_wait: Duration,

    /// Capacity of the channel between the pull task and the handler (default: 16)
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Timeout for a single pull or acknowledge request (default: 90s)
    #[serde(default = "default_pubsub_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self {
            endpoint: default_pubsub_endpoint(),
            max_messages: default_max_messages(),
            idle_wait: default_idle_wait(),
            empty_wait: default_empty_wait(),
            channel_capacity: default_channel_capacity(),
            request_timeout: default_pubsub_timeout(),
        }
    }
}

/// Cloud Storage download settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// API base URL (default: "https://storage.googleapis.com")
    #[serde(default = "default_storage_endpoint")]
    pub endpoint: String,

    /// Timeout for a whole object download (default: 300s)
    #[serde(default = "default_storage_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: default_storage_endpoint(),
            request_timeout: default_storage_timeout(),
        }
    }
}

/// Main configuration for the poller
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Project that owns the subscription
    pub project: String,

    /// Pub/Sub subscription id
    pub subscription: String,

    /// Directory that receives extracted archive contents
    pub save_dir: PathBuf,

    /// Directory where archives are downloaded before extraction (default: ".")
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,

    /// Pub/Sub settings
    #[serde(default)]
    pub pubsub: PubSubConfig,

    /// Cloud Storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Bearer token sent with every API request (None for emulators)
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,
}

impl Config {
    /// Create a configuration with default transport settings
    pub fn new(
        project: impl Into<String>,
        subscription: impl Into<String>,
        save_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            project: project.into(),
            subscription: subscription.into(),
            save_dir: save_dir.into(),
            staging_dir: default_staging_dir(),
            pubsub: PubSubConfig::default(),
            storage: StorageConfig::default(),
            access_token: None,
        }
    }

    /// Apply emulator hosts and the access token from the environment
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(host) = non_empty_var(PUBSUB_EMULATOR_HOST) {
            self.pubsub.endpoint = emulator_url(&host);
        }
        if let Some(host) = non_empty_var(STORAGE_EMULATOR_HOST) {
            self.storage.endpoint = emulator_url(&host);
        }
        if let Some(token) = non_empty_var(ACCESS_TOKEN_VAR) {
            self.access_token = Some(token);
        }
        self
    }

    /// Check that identifiers and sizes are usable
    pub fn validate(&self) -> Result<()> {
        if self.project.trim().is_empty() {
            return Err(Error::config("project", "project id must not be empty"));
        }
        if self.subscription.trim().is_empty() {
            return Err(Error::config(
                "subscription",
                "subscription id must not be empty",
            ));
        }
        if self.save_dir.as_os_str().is_empty() {
            return Err(Error::config("save_dir", "save directory must not be empty"));
        }
        if self.pubsub.max_messages == 0 {
            return Err(Error::config(
                "pubsub.max_messages",
                "must pull at least one message",
            ));
        }
        if self.pubsub.channel_capacity == 0 {
            return Err(Error::config(
                "pubsub.channel_capacity",
                "channel capacity must be at least 1",
            ));
        }
        Ok(())
    }

    /// Fully qualified subscription name
    pub fn subscription_path(&self) -> String {
        format!(
            "projects/{}/subscriptions/{}",
            self.project, self.subscription
        )
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

// Emulator hosts are given as `host:port` without a scheme
fn emulator_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

fn default_pubsub_endpoint() -> String {
    "https://pubsub.googleapis.com".to_string()
}

fn default_storage_endpoint() -> String {
    "https://storage.googleapis.com".to_string()
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_max_messages() -> u32 {
    10
}

fn default_idle_wait() -> Duration {
    Duration::from_secs(60)
}

fn default_empty_wait() -> Duration {
    Duration::from_secs(1)
}

fn default_channel_capacity() -> usize {
    16
}

fn default_pubsub_timeout() -> Duration {
    Duration::from_secs(90)
}

fn default_storage_timeout() -> Duration {
    Duration::from_secs(300)
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
