//! Session Configuration Settings
//!
//! Configuration types for the gateway session, loaded from environment
//! variables. Every setting has a default; only malformed values are errors.

use std::time::Duration;

use reqwest::Url;

/// Default config endpoint used for gateway discovery.
pub const DEFAULT_CONFIG_URL: &str = "https://trade.thinkorswim.com/v1/api/config";

/// Trading environment whose gateway is dialed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Live trading gateway.
    #[default]
    Live,
    /// Paper trading gateway.
    Paper,
}

impl Environment {
    /// Parse environment from string.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "PAPER" => Self::Paper,
            _ => Self::Live,
        }
    }

    /// Check if this is the live environment.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }

    /// Get the environment name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Paper => "paper",
        }
    }
}

/// Protocol negotiation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolSettings {
    /// Protocol version pattern sent at handshake.
    pub version: String,
    /// Frame format requested at handshake.
    pub format: String,
    /// Heartbeat interval requested from the server.
    pub heartbeat: String,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            version: "27.*.*".to_string(),
            format: "json-patches-structured".to_string(),
            heartbeat: "5s".to_string(),
        }
    }
}

/// Per-call deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutSettings {
    /// Deadline for ordinary calls.
    pub default: Duration,
    /// Deadline for option quote calls.
    pub option_quote: Duration,
    /// Shared deadline for batched calls.
    pub batch: Duration,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            default: Duration::from_millis(1000),
            option_quote: Duration::from_millis(5000),
            batch: Duration::from_millis(2000),
        }
    }
}

/// Connection lifecycle settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Deadline for the protocol acknowledgement.
    pub handshake_timeout: Duration,
    /// Interval between scheduled reconnects.
    pub reconnect_interval: Duration,
    /// Wait between sending the close frame and dropping the transport.
    pub close_grace: Duration,
    /// Pause after a scheduled reconnect before releasing the send lock.
    pub settle_delay: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            reconnect_interval: Duration::from_secs(20 * 60),
            close_grace: Duration::from_millis(1000),
            settle_delay: Duration::from_millis(250),
        }
    }
}

/// Complete session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Gateway discovery endpoint.
    pub config_url: String,
    /// Trading environment.
    pub environment: Environment,
    /// Protocol negotiation settings.
    pub protocol: ProtocolSettings,
    /// Per-call deadlines.
    pub timeouts: TimeoutSettings,
    /// Connection lifecycle settings.
    pub connection: ConnectionSettings,
    /// Log every inbound message at trace level.
    pub debug_frames: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            config_url: DEFAULT_CONFIG_URL.to_string(),
            environment: Environment::default(),
            protocol: ProtocolSettings::default(),
            timeouts: TimeoutSettings::default(),
            connection: ConnectionSettings::default(),
            debug_frames: false,
        }
    }
}

impl SessionConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an empty or malformed value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an empty or malformed value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let env = Env { lookup: &lookup };

        let config_url = match env.string("FLUX_CONFIG_URL")? {
            Some(url) => {
                Url::parse(&url).map_err(|_| ConfigError::InvalidValue {
                    key: "FLUX_CONFIG_URL".to_string(),
                    value: url.clone(),
                })?;
                url
            }
            None => defaults.config_url,
        };

        let environment = env
            .string("FLUX_ENV")?
            .map(|s| Environment::from_str_case_insensitive(&s))
            .unwrap_or_default();

        let protocol = ProtocolSettings {
            version: env
                .string("FLUX_PROTOCOL_VERSION")?
                .unwrap_or(defaults.protocol.version),
            format: defaults.protocol.format,
            heartbeat: env
                .string("FLUX_HEARTBEAT")?
                .unwrap_or(defaults.protocol.heartbeat),
        };

        let timeouts = TimeoutSettings {
            default: env.duration_millis("FLUX_REQUEST_TIMEOUT_MS", defaults.timeouts.default)?,
            option_quote: env.duration_millis(
                "FLUX_OPTION_QUOTE_TIMEOUT_MS",
                defaults.timeouts.option_quote,
            )?,
            batch: env.duration_millis("FLUX_BATCH_TIMEOUT_MS", defaults.timeouts.batch)?,
        };

        let connection = ConnectionSettings {
            handshake_timeout: env.duration_secs(
                "FLUX_HANDSHAKE_TIMEOUT_SECS",
                defaults.connection.handshake_timeout,
            )?,
            reconnect_interval: env.duration_secs(
                "FLUX_RECONNECT_INTERVAL_SECS",
                defaults.connection.reconnect_interval,
            )?,
            close_grace: env
                .duration_millis("FLUX_CLOSE_GRACE_MS", defaults.connection.close_grace)?,
            settle_delay: defaults.connection.settle_delay,
        };

        let debug_frames = env.bool("FLUX_DEBUG_FRAMES", defaults.debug_frames)?;

        Ok(Self {
            config_url,
            environment,
            protocol,
            timeouts,
            connection,
            debug_frames,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable could not be parsed.
    #[error("environment variable {key} has invalid value {value:?}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
    },
}

struct Env<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn string(&self, key: &str) -> Result<Option<String>, ConfigError> {
        match (self.lookup)(key) {
            Some(value) if value.trim().is_empty() => Err(ConfigError::EmptyValue(key.to_string())),
            other => Ok(other),
        }
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.string(key)?
            .map(|value| {
                value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value,
                })
            })
            .transpose()
    }

    fn duration_secs(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        Ok(self.parsed::<u64>(key)?.map_or(default, Duration::from_secs))
    }

    fn duration_millis(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        Ok(self.parsed::<u64>(key)?.map_or(default, Duration::from_millis))
    }

    fn bool(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        Ok(self.parsed::<bool>(key)?.unwrap_or(default))
    }
}
