//! Client configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Edge domain used when none is configured.
pub const DEFAULT_DOMAIN: &str = "crwdcntrl.net";

/// Connect and read timeout for every request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// URL scheme for collection and extraction calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }

    /// Parse a scheme name, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Some(Protocol::Http),
            "https" => Some(Protocol::Https),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens to queued events when resolution reveals an opt-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptOutPolicy {
    /// Keep them queued; they are never sent because every flush is a no-op.
    #[default]
    Retain,
    /// Drop them as soon as the opted-out identity is published.
    Purge,
}

/// Configuration for one client instance.
///
/// Immutable once the client is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Client id for data collection
    pub client_id: u32,

    /// Client id for audience extraction (defaults to `client_id`)
    #[serde(default)]
    pub audience_client_id: Option<u32>,

    #[serde(default)]
    pub protocol: Protocol,

    /// Edge domain, prefixed with `bcp.` or `ad.` per call
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Ask the extraction API for the panorama id
    #[serde(default)]
    pub panorama_enabled: bool,

    /// Per-request timeout
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,

    #[serde(default)]
    pub opt_out_policy: OptOutPolicy,
}

fn default_domain() -> String {
    DEFAULT_DOMAIN.to_string()
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

impl ClientConfig {
    /// Configuration with defaults for everything but the client id.
    pub fn new(client_id: u32) -> Self {
        Self {
            client_id,
            audience_client_id: None,
            protocol: Protocol::default(),
            domain: default_domain(),
            panorama_enabled: false,
            timeout: DEFAULT_TIMEOUT,
            opt_out_policy: OptOutPolicy::default(),
        }
    }

    pub fn with_audience_client_id(mut self, id: u32) -> Self {
        self.audience_client_id = Some(id);
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_panorama(mut self, enabled: bool) -> Self {
        self.panorama_enabled = enabled;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_opt_out_policy(mut self, policy: OptOutPolicy) -> Self {
        self.opt_out_policy = policy;
        self
    }

    /// Client id used for audience extraction.
    pub fn audience_client_id(&self) -> u32 {
        self.audience_client_id.unwrap_or(self.client_id)
    }

    /// Load configuration from the default location.
    ///
    /// Returns `Ok(None)` when no configuration file exists yet.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        if config_path.exists() {
            Self::load_from(&config_path).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content).map_err(ConfigError::Parse)?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let config_path = Self::config_path();
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    /// Save configuration to a specific file.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("crowd-control")
            .join("config.json")
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(serde_json::Error),

    #[error("Serialize error: {0}")]
    Serialize(serde_json::Error),
}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::new(42);
        assert_eq!(config.client_id, 42);
        assert_eq!(config.audience_client_id(), 42);
        assert_eq!(config.protocol, Protocol::Http);
        assert_eq!(config.domain, "crwdcntrl.net");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(!config.panorama_enabled);
        assert_eq!(config.opt_out_policy, OptOutPolicy::Retain);
    }

    #[test]
    fn test_protocol_parsing() {
        assert_eq!(Protocol::parse("HTTPS"), Some(Protocol::Https));
        assert_eq!(Protocol::parse("http"), Some(Protocol::Http));
        assert_eq!(Protocol::parse("ftp"), None);
    }

    #[test]
    fn test_minimal_json_fills_defaults() {
        let config: ClientConfig = serde_json::from_str(r#"{"client_id": 7}"#).unwrap();
        assert_eq!(config, ClientConfig::new(7));
    }

    #[test]
    fn test_json_overrides() {
        let json = r#"{
            "client_id": 7,
            "audience_client_id": 9,
            "protocol": "https",
            "domain": "example.net",
            "panorama_enabled": true,
            "timeout": 2,
            "opt_out_policy": "purge"
        }"#;
        let config: ClientConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.audience_client_id(), 9);
        assert_eq!(config.protocol, Protocol::Https);
        assert_eq!(config.domain, "example.net");
        assert!(config.panorama_enabled);
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.opt_out_policy, OptOutPolicy::Purge);
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir()
            .join(format!("crowd-control-config-{}", std::process::id()))
            .join("config.json");
        let config = ClientConfig::new(3)
            .with_protocol(Protocol::Https)
            .with_panorama(true);

        config.save_to(&path).unwrap();
        let loaded = ClientConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
