//! # Service Configuration
//!
//! Settings for the login server and its logging, read from TOML and from
//! `GAMESPY_LOGIN_*` environment variables. Later sources override earlier
//! ones: defaults, then file, then environment, then command line.
//!
//! Durations are written as integer milliseconds:
//!
//! ```toml
//! [server]
//! address = "0.0.0.0:29900"
//! read_timeout = 1000
//!
//! [logging]
//! log_level = "debug"
//! ```

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::error::{ProtocolError, Result};
use crate::utils::timeout::{DEFAULT_TIMEOUT, SHUTDOWN_TIMEOUT};

/// Default listen address of the GameSpy login service
pub const DEFAULT_ADDRESS: &str = "0.0.0.0:29900";

/// Default size of the single login read
pub const DEFAULT_MAX_PACKET_SIZE: usize = 512;

const ENV_ADDRESS: &str = "GAMESPY_LOGIN_ADDRESS";
const ENV_READ_TIMEOUT: &str = "GAMESPY_LOGIN_READ_TIMEOUT_MS";
const ENV_WRITE_TIMEOUT: &str = "GAMESPY_LOGIN_WRITE_TIMEOUT_MS";
const ENV_MAX_PACKET_SIZE: &str = "GAMESPY_LOGIN_MAX_PACKET_SIZE";
const ENV_LOG_LEVEL: &str = "GAMESPY_LOGIN_LOG_LEVEL";

fn config_error(context: &str, detail: impl std::fmt::Display) -> ProtocolError {
    ProtocolError::ConfigError(format!("{context}: {detail}"))
}

/// Complete configuration of the login service
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoginConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

impl LoginConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| config_error("Cannot read config file", e))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| config_error("Failed to parse TOML", e))
    }

    /// Defaults overridden by the environment
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from `GAMESPY_LOGIN_*` variables that are set.
    ///
    /// # Errors
    /// `ConfigError` if a variable is set but cannot be parsed.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(address) = std::env::var(ENV_ADDRESS) {
            self.server.address = address;
        }
        if let Some(ms) = env_value::<u64>(ENV_READ_TIMEOUT)? {
            self.server.read_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_value::<u64>(ENV_WRITE_TIMEOUT)? {
            self.server.write_timeout = Duration::from_millis(ms);
        }
        if let Some(size) = env_value::<usize>(ENV_MAX_PACKET_SIZE)? {
            self.server.max_packet_size = size;
        }
        if let Some(level) = env_value::<Level>(ENV_LOG_LEVEL)? {
            self.logging.log_level = level;
        }
        Ok(())
    }

    /// Defaults with `edit` applied
    pub fn default_with_overrides(edit: impl FnOnce(&mut Self)) -> Self {
        let mut config = Self::default();
        edit(&mut config);
        config
    }

    /// Default configuration rendered as TOML
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let text =
            toml::to_string_pretty(self).map_err(|e| config_error("Cannot render config", e))?;
        std::fs::write(path.as_ref(), text).map_err(|e| config_error("Cannot write config file", e))
    }

    /// Every problem found in the configuration; empty when usable
    pub fn validate(&self) -> Vec<String> {
        let mut problems = self.server.validate();
        problems.append(&mut self.logging.validate());
        problems
    }

    /// [`validate`](Self::validate), folded into a single `ConfigError`
    pub fn validate_strict(&self) -> Result<()> {
        let problems = self.validate();
        if problems.is_empty() {
            return Ok(());
        }
        Err(ProtocolError::ConfigError(format!(
            "{} problem(s) in configuration:\n  - {}",
            problems.len(),
            problems.join("\n  - ")
        )))
    }
}

fn env_value<T: FromStr>(name: &str) -> Result<Option<T>> {
    let Ok(raw) = std::env::var(name) else {
        return Ok(None);
    };
    raw.parse()
        .map(Some)
        .map_err(|_| config_error(&format!("Invalid value for {name}"), format!("'{raw}'")))
}

/// Listener and per-connection I/O settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// `[host]:port`; an empty host listens on all interfaces
    pub address: String,

    /// Deadline for reading the login request
    #[serde(with = "millis")]
    pub read_timeout: Duration,

    /// Deadline for writing the challenge and the reply
    #[serde(with = "millis")]
    pub write_timeout: Duration,

    /// Buffer size of the single read that receives the login request
    pub max_packet_size: usize,

    /// How long shutdown waits for open connections
    #[serde(with = "millis")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            read_timeout: DEFAULT_TIMEOUT,
            write_timeout: DEFAULT_TIMEOUT,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            shutdown_timeout: SHUTDOWN_TIMEOUT,
        }
    }
}

const MIN_IO_TIMEOUT: Duration = Duration::from_millis(10);
const MAX_IO_TIMEOUT: Duration = Duration::from_secs(60);
const MIN_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);
const MAX_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(60);
const MIN_PACKET_SIZE: usize = 256;
const MAX_PACKET_SIZE: usize = 64 * 1024;

fn check_duration(
    problems: &mut Vec<String>,
    name: &str,
    value: Duration,
    min: Duration,
    max: Duration,
) {
    if value < min {
        problems.push(format!("{name} too short: {value:?} (minimum: {min:?})"));
    } else if value > max {
        problems.push(format!("{name} too long: {value:?} (maximum: {max:?})"));
    }
}

impl ServerConfig {
    /// Address handed to the listener, with an empty host mapped to `0.0.0.0`
    pub fn bind_address(&self) -> String {
        match self.address.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{port}"),
            None => self.address.clone(),
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.address.is_empty() {
            problems.push("Server address cannot be empty".to_string());
        } else if !is_host_port(&self.bind_address()) {
            problems.push(format!(
                "Invalid server address '{}' (expected [host]:port, e.g. ':29900')",
                self.address
            ));
        }

        for (name, value) in [
            ("Read timeout", self.read_timeout),
            ("Write timeout", self.write_timeout),
        ] {
            check_duration(&mut problems, name, value, MIN_IO_TIMEOUT, MAX_IO_TIMEOUT);
        }
        check_duration(
            &mut problems,
            "Shutdown timeout",
            self.shutdown_timeout,
            MIN_SHUTDOWN_TIMEOUT,
            MAX_SHUTDOWN_TIMEOUT,
        );

        // Must fit the largest legitimate login request
        if self.max_packet_size < MIN_PACKET_SIZE {
            problems.push(format!(
                "Max packet size too small: {} bytes (minimum: {MIN_PACKET_SIZE})",
                self.max_packet_size
            ));
        } else if self.max_packet_size > MAX_PACKET_SIZE {
            problems.push(format!(
                "Max packet size too large: {} bytes (maximum: {MAX_PACKET_SIZE})",
                self.max_packet_size
            ));
        }

        problems
    }
}

fn is_host_port(address: &str) -> bool {
    let Some((host, port)) = address.rsplit_once(':') else {
        return false;
    };
    !host.is_empty() && !host.contains(char::is_whitespace) && port.parse::<u16>().is_ok()
}

/// Log output settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    #[serde(with = "level_name")]
    pub log_level: Level,

    /// ANSI colours in text output
    pub colorize: bool,

    /// One JSON object per event instead of text
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            colorize: false,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        if self.json_format && self.colorize {
            vec!["Colorized output cannot be combined with JSON logs".to_string()]
        } else {
            Vec::new()
        }
    }
}

/// `Duration` as integer milliseconds
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// `tracing::Level` as a lower-case name
mod level_name {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use tracing::Level;

    pub fn serialize<S: Serializer>(level: &Level, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&level.as_str().to_ascii_lowercase())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Level, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse()
            .map_err(|_| D::Error::custom(format!("unknown log level '{name}'")))
    }
}
