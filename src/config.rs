//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::ApiConfig;
use crate::websocket::{HubConfig, PumpConfig};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub chatroom: ChatroomConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory of static web assets served for non-API paths
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
        }
    }
}

impl ServerConfig {
    /// Set host and port from an address such as `127.0.0.1:5000` or `:5000`.
    /// An empty host binds all interfaces.
    pub fn set_addr(&mut self, addr: &str) -> Result<(), ConfigError> {
        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| ConfigError::Invalid(format!("address {addr:?} has no port")))?;

        self.port = port
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("invalid port in address {addr:?}")))?;
        self.host = if host.is_empty() {
            default_host()
        } else {
            host.trim_start_matches('[').trim_end_matches(']').to_string()
        };

        Ok(())
    }

    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            host: self.host.clone(),
            port: self.port,
            static_dir: self.static_dir.clone(),
        }
    }
}

/// Chat room hub and connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ChatroomConfig {
    #[serde(default = "default_room")]
    pub room: String,

    #[serde(default = "default_send_queue_capacity")]
    pub send_queue_capacity: usize,

    #[serde(default = "default_intake_capacity")]
    pub intake_capacity: usize,

    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    #[serde(default = "default_pong_wait")]
    pub pong_wait_secs: u64,

    #[serde(default = "default_ping_period")]
    pub ping_period_secs: u64,

    #[serde(default = "default_write_wait")]
    pub write_wait_secs: u64,
}

fn default_room() -> String {
    "lobby".to_string()
}

fn default_send_queue_capacity() -> usize {
    256
}

fn default_intake_capacity() -> usize {
    64
}

fn default_max_message_size() -> usize {
    512
}

fn default_pong_wait() -> u64 {
    60
}

fn default_ping_period() -> u64 {
    54
}

fn default_write_wait() -> u64 {
    10
}

impl Default for ChatroomConfig {
    fn default() -> Self {
        Self {
            room: default_room(),
            send_queue_capacity: default_send_queue_capacity(),
            intake_capacity: default_intake_capacity(),
            max_message_size: default_max_message_size(),
            pong_wait_secs: default_pong_wait(),
            ping_period_secs: default_ping_period(),
            write_wait_secs: default_write_wait(),
        }
    }
}

impl ChatroomConfig {
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            room: self.room.clone(),
            send_queue_capacity: self.send_queue_capacity,
            intake_capacity: self.intake_capacity,
        }
    }

    pub fn pump_config(&self) -> PumpConfig {
        PumpConfig {
            write_wait: Duration::from_secs(self.write_wait_secs),
            pong_wait: Duration::from_secs(self.pong_wait_secs),
            ping_period: Duration::from_secs(self.ping_period_secs),
            max_message_size: self.max_message_size,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.send_queue_capacity == 0 || self.intake_capacity == 0 {
            return Err(ConfigError::Invalid(
                "queue capacities must be greater than zero".to_string(),
            ));
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::Invalid(
                "max_message_size must be greater than zero".to_string(),
            ));
        }
        if self.ping_period_secs == 0 || self.ping_period_secs >= self.pong_wait_secs {
            return Err(ConfigError::Invalid(format!(
                "ping_period_secs ({}) must be non-zero and shorter than pong_wait_secs ({})",
                self.ping_period_secs, self.pong_wait_secs
            )));
        }
        if self.write_wait_secs == 0 {
            return Err(ConfigError::Invalid(
                "write_wait_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Locations searched for a config file, in order
    pub fn default_paths() -> Vec<PathBuf> {
        [
            dirs::config_dir().map(|p| p.join("socki").join("config.toml")),
            Some(PathBuf::from("/etc/socki/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// First config file that exists in the default locations
    pub fn find_default() -> Option<PathBuf> {
        Self::default_paths().into_iter().find(|path| path.exists())
    }

    /// Load from default locations or environment
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load_first(&Self::default_paths())
    }

    /// Load the first existing file in `paths`, or fall back to the
    /// environment when none exists. A file that exists but fails to load is
    /// an error.
    pub fn load_first(paths: &[PathBuf]) -> Result<Self, ConfigError> {
        match paths.iter().find(|path| path.exists()) {
            Some(path) => Self::load_with_env(path),
            None => Self::from_env(),
        }
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chatroom.validate()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server overrides
        if let Some(host) = var("SOCKI_HOST") {
            self.server.host = host;
        }
        if let Some(port) = parse_var(&var, "SOCKI_PORT")? {
            self.server.port = port;
        }
        if let Some(dir) = var("SOCKI_STATIC_DIR") {
            self.server.static_dir = Some(PathBuf::from(dir));
        }

        // Chat room overrides
        if let Some(room) = var("SOCKI_ROOM") {
            self.chatroom.room = room;
        }
        if let Some(capacity) = parse_var(&var, "SOCKI_SEND_QUEUE_CAPACITY")? {
            self.chatroom.send_queue_capacity = capacity;
        }
        if let Some(capacity) = parse_var(&var, "SOCKI_INTAKE_CAPACITY")? {
            self.chatroom.intake_capacity = capacity;
        }
        if let Some(size) = parse_var(&var, "SOCKI_MAX_MESSAGE_SIZE")? {
            self.chatroom.max_message_size = size;
        }
        if let Some(secs) = parse_var(&var, "SOCKI_PONG_WAIT_SECS")? {
            self.chatroom.pong_wait_secs = secs;
        }
        if let Some(secs) = parse_var(&var, "SOCKI_PING_PERIOD_SECS")? {
            self.chatroom.ping_period_secs = secs;
        }
        if let Some(secs) = parse_var(&var, "SOCKI_WRITE_WAIT_SECS")? {
            self.chatroom.write_wait_secs = secs;
        }

        // Logging overrides
        if let Some(level) = var("SOCKI_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("SOCKI_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }
}

fn parse_var<F, T>(var: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let Some(value) = var(key) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::Invalid(format!("{} has unparsable value {:?}", key, value)))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Socki Configuration
#
# Environment variables override these settings:
# - SOCKI_HOST
# - SOCKI_PORT
# - SOCKI_STATIC_DIR
# - SOCKI_ROOM
# - SOCKI_SEND_QUEUE_CAPACITY
# - SOCKI_INTAKE_CAPACITY
# - SOCKI_MAX_MESSAGE_SIZE
# - SOCKI_PONG_WAIT_SECS
# - SOCKI_PING_PERIOD_SECS
# - SOCKI_WRITE_WAIT_SECS
# - SOCKI_LOG_LEVEL
# - SOCKI_LOG_FORMAT

[server]
# Server host
host = "0.0.0.0"

# Server port
port = 5000

# Optional directory of static web assets
# static_dir = "./www/out"

[chatroom]
# Room name (shown in logs)
room = "lobby"

# Messages buffered per client before it is dropped as a slow consumer
send_queue_capacity = 256

# Pending register/unregister/broadcast requests buffered by the hub
intake_capacity = 64

# Largest message accepted from a client (bytes)
max_message_size = 512

# Seconds without a pong before a connection is closed
pong_wait_secs = 60

# Seconds between pings (must be shorter than pong_wait_secs)
ping_period_secs = 54

# Seconds allowed for a single write
write_wait_secs = 10

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
