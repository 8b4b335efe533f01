//! Gateway configuration with validation.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Discord's response deadline for the initial interaction callback.
pub const DISCORD_RESPONSE_DEADLINE: Duration = Duration::from_secs(3);

/// Main gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP server configuration.
    pub http: HttpConfig,
    /// Discord application credentials.
    pub discord: DiscordConfig,
    /// Request validation limits.
    pub limits: LimitsConfig,
    /// Deadline coordinator tuning.
    pub deadline: DeadlineConfig,
    /// Follow-up delivery retry policy.
    pub followup: FollowUpConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            discord: DiscordConfig::default(),
            limits: LimitsConfig::default(),
            deadline: DeadlineConfig::default(),
            followup: FollowUpConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Validate configuration. Called once at startup before the verifier and
    /// service are constructed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.discord.public_key.is_empty() {
            return Err(ConfigError::InvalidPublicKey(
                "public key is not configured".into(),
            ));
        }
        if self.discord.application_id.is_empty() {
            return Err(ConfigError::InvalidApplicationId(
                "application id is not configured".into(),
            ));
        }

        if self.limits.max_body_bytes == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_body_bytes cannot be 0".into(),
            ));
        }

        if self.deadline.response_margin.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "response_margin cannot be 0".into(),
            ));
        }
        if self.deadline.response_margin >= DISCORD_RESPONSE_DEADLINE {
            return Err(ConfigError::InvalidTimeout(format!(
                "response_margin must be below Discord's {}s deadline",
                DISCORD_RESPONSE_DEADLINE.as_secs()
            )));
        }

        if self.followup.max_attempts == 0 {
            return Err(ConfigError::InvalidLimit(
                "followup max_attempts cannot be 0".into(),
            ));
        }
        if self.followup.initial_backoff.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "followup initial_backoff cannot be 0".into(),
            ));
        }
        if self.followup.max_backoff < self.followup.initial_backoff {
            return Err(ConfigError::InvalidTimeout(
                "followup max_backoff must be >= initial_backoff".into(),
            ));
        }

        Ok(())
    }

    /// Get HTTP server bind address.
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address.
    pub host: IpAddr,
    /// Port (default: 8787).
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8787,
        }
    }
}

/// Discord application credentials consumed from the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Hex-encoded Ed25519 application public key.
    pub public_key: String,
    /// Application id, used in follow-up webhook URLs.
    pub application_id: String,
    /// Discord REST base URL. Overridable so tests can point the follow-up
    /// client at a local server.
    pub api_base: String,
}

impl DiscordConfig {
    /// Default Discord REST base.
    pub const DEFAULT_API_BASE: &'static str = "https://discord.com/api/v10";

    /// Effective API base, falling back to the production endpoint.
    pub fn api_base(&self) -> &str {
        if self.api_base.is_empty() {
            Self::DEFAULT_API_BASE
        } else {
            &self.api_base
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Max request body size in bytes (default: 256 KiB). Oversized bodies
    /// are rejected before any signature work.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 256 * 1024,
        }
    }
}

/// Deadline coordinator tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadlineConfig {
    /// How long after receipt the coordinator waits for a handler before
    /// switching to the deferred path. Kept below the nominal 3 s to leave
    /// transport and serialization headroom (default: 2500 ms).
    #[serde(with = "humantime_serde")]
    pub response_margin: Duration,
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            response_margin: Duration::from_millis(2500),
        }
    }
}

/// Follow-up delivery retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowUpConfig {
    /// Maximum delivery attempts before reporting a terminal failure.
    pub max_attempts: u32,
    /// First retry delay; doubles per attempt up to `max_backoff`.
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,
    /// Backoff ceiling.
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
    /// Absolute window after interaction receipt beyond which delivery is
    /// moot (Discord expires the token at ~15 minutes).
    #[serde(with = "humantime_serde")]
    pub delivery_window: Duration,
    /// Per-request timeout on outbound delivery calls.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for FollowUpConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            delivery_window: Duration::from_secs(15 * 60),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Humantime serde module for Duration serialization.
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}ms", duration.as_millis()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(|_| "invalid minutes")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else {
            // Try parsing as plain seconds
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}
