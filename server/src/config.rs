//! Server configuration module.
//!
//! This module provides configuration loading for the telemetry engine from
//! environment variables.
//!
//! # Environment Variables
//!
//! - `ENGINE_SEED`: Seed string the synthetic dataset is generated from (default: `telemetry-demo`)
//! - `ENGINE_LISTEN_PORT`: Port to listen on (default: `3000`)
//! - `ENGINE_TEST_MODE`: When `1`, chaos failures and forced disconnects never fire
//! - `CHAOS_RATE`: Probability that an opted-in request fails (default: `0.18`)
//! - `WS_CHAOS_DISCONNECT`: When `0`, live streams never schedule a forced disconnect
//! - `WS_DISCONNECT_MIN_MS` / `WS_DISCONNECT_MAX_MS`: Forced-disconnect delay window
//!   (defaults: `20000` / `45000`)
//!
//! # Invariants
//!
//! - `listen_port` is always a valid port number (1-65535)
//! - `chaos_rate` is a finite number; out-of-range values are clamped at use
//! - `disconnect_min_ms <= disconnect_max_ms` after loading

/// Server configuration.
///
/// Contains all configuration parameters needed to run the telemetry engine.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Seed string the entire synthetic dataset derives from.
    pub seed: String,
    /// Port to listen on for HTTP and WebSocket connections.
    pub listen_port: u16,
    /// Disables chaos failures and forced disconnects, for tests.
    pub test_mode: bool,
    /// Probability that a request opting into chaos mode fails.
    pub chaos_rate: f64,
    /// Whether live streams schedule a synthetic forced disconnect.
    pub chaos_disconnect: bool,
    /// Lower bound of the forced-disconnect delay, in milliseconds.
    pub disconnect_min_ms: u64,
    /// Upper bound of the forced-disconnect delay, in milliseconds.
    pub disconnect_max_ms: u64,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl ServerConfig {
    /// Default dataset seed.
    pub const DEFAULT_SEED: &'static str = "telemetry-demo";
    /// Default port for the server.
    pub const DEFAULT_PORT: u16 = 3000;
    /// Default chaos failure rate for opted-in requests.
    pub const DEFAULT_CHAOS_RATE: f64 = 0.18;
    /// Default forced-disconnect delay window.
    pub const DEFAULT_DISCONNECT_MIN_MS: u64 = 20_000;
    pub const DEFAULT_DISCONNECT_MAX_MS: u64 = 45_000;

    /// Load configuration from environment variables.
    ///
    /// Every variable has a default; loading only fails on values that are
    /// present but unparsable.
    ///
    /// # Errors
    ///
    /// Returns an error if `ENGINE_LISTEN_PORT`, `CHAOS_RATE`, or a
    /// disconnect bound is set but not a valid number.
    pub fn from_env() -> Result<Self, ConfigError> {
        let seed = std::env::var("ENGINE_SEED").unwrap_or_else(|_| Self::DEFAULT_SEED.to_string());
        let listen_port = Self::load_listen_port()?;
        let test_mode = std::env::var("ENGINE_TEST_MODE").is_ok_and(|v| v == "1");
        let chaos_rate = Self::load_chaos_rate()?;
        let chaos_disconnect =
            Self::disconnect_enabled(std::env::var("WS_CHAOS_DISCONNECT").ok().as_deref());
        let disconnect_min_ms =
            Self::load_millis("WS_DISCONNECT_MIN_MS", Self::DEFAULT_DISCONNECT_MIN_MS)?;
        let disconnect_max_ms =
            Self::load_millis("WS_DISCONNECT_MAX_MS", Self::DEFAULT_DISCONNECT_MAX_MS)?;

        Ok(Self {
            seed,
            listen_port,
            test_mode,
            chaos_rate,
            chaos_disconnect,
            disconnect_min_ms: disconnect_min_ms.min(disconnect_max_ms),
            disconnect_max_ms: disconnect_max_ms.max(disconnect_min_ms),
        })
    }

    /// Load the listen port from environment.
    ///
    /// Returns the default if not set.
    fn load_listen_port() -> Result<u16, ConfigError> {
        match std::env::var("ENGINE_LISTEN_PORT") {
            Ok(value) => value.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                name: "ENGINE_LISTEN_PORT".to_string(),
                message: format!("'{value}' is not a valid port number (must be 1-65535)"),
            }),
            Err(_) => Ok(Self::DEFAULT_PORT),
        }
    }

    /// Load the chaos rate from environment.
    ///
    /// Returns the default if not set.
    fn load_chaos_rate() -> Result<f64, ConfigError> {
        match std::env::var("CHAOS_RATE") {
            Ok(value) => match value.parse::<f64>() {
                Ok(rate) if rate.is_finite() => Ok(rate),
                _ => Err(ConfigError::InvalidValue {
                    name: "CHAOS_RATE".to_string(),
                    message: format!("'{value}' is not a valid probability"),
                }),
            },
            Err(_) => Ok(Self::DEFAULT_CHAOS_RATE),
        }
    }

    /// The forced disconnect is on unless the variable is set to exactly "0".
    fn disconnect_enabled(value: Option<&str>) -> bool {
        value != Some("0")
    }

    fn load_millis(name: &str, default: u64) -> Result<u64, ConfigError> {
        match std::env::var(name) {
            Ok(value) => value.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                name: name.to_string(),
                message: format!("'{value}' is not a valid millisecond count"),
            }),
            Err(_) => Ok(default),
        }
    }
}

impl Default for ServerConfig {
    /// Defaults with chaos disabled, as used by tests.
    fn default() -> Self {
        Self {
            seed: Self::DEFAULT_SEED.to_string(),
            listen_port: Self::DEFAULT_PORT,
            test_mode: true,
            chaos_rate: Self::DEFAULT_CHAOS_RATE,
            chaos_disconnect: false,
            disconnect_min_ms: Self::DEFAULT_DISCONNECT_MIN_MS,
            disconnect_max_ms: Self::DEFAULT_DISCONNECT_MAX_MS,
        }
    }
}
