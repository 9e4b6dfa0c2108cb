//! Configuration for the tianguis server.
//!
//! Maps directly to `tianguis.toml`. Every section and field has a default,
//! so an empty file (or no file at all) yields a working local setup.
//! Generation credentials are deliberately absent: they only ever come from
//! the environment.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::types::{MAX_ROUNDS, MIN_ROUNDS};

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TianguisConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Text-generation backend settings.
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Conversation length policy.
    #[serde(default)]
    pub session: SessionConfig,
    /// Profile store settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Vendor roster source.
    #[serde(default)]
    pub catalog: CatalogConfig,
}

impl TianguisConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `CoreError::Config` if the TOML is invalid or fails validation.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str).map_err(|e| CoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    /// Returns `CoreError::Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        let session = &self.session;
        if session.min_rounds == 0 || session.min_rounds > session.max_rounds {
            return Err(CoreError::Config(format!(
                "session rounds must satisfy 1 <= min_rounds <= max_rounds (got {}..={})",
                session.min_rounds, session.max_rounds
            )));
        }
        if self.generation.request_timeout_ms == 0 {
            return Err(CoreError::Config(
                "generation.request_timeout_ms must be positive".into(),
            ));
        }
        if self.persistence.write_attempts == 0 {
            return Err(CoreError::Config(
                "persistence.write_attempts must be at least 1".into(),
            ));
        }
        if self.persistence.cache_capacity == 0 {
            return Err(CoreError::Config(
                "persistence.cache_capacity must be at least 1".into(),
            ));
        }
        match self.persistence.backend.as_str() {
            "sqlite" | "memory" => Ok(()),
            other => Err(CoreError::Config(format!(
                "unknown persistence backend '{other}' (expected sqlite or memory)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Text-generation backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// API root of the generation service.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum tokens per reply.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Hard timeout for a single generation attempt in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Refuse to start without at least one credential. When false, an empty
    /// pool runs the server in fallback-only mode.
    #[serde(default = "default_true")]
    pub require_credentials: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            request_timeout_ms: default_request_timeout_ms(),
            require_credentials: true,
        }
    }
}

/// Conversation length policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Fewest rounds a session may be drawn with.
    #[serde(default = "default_min_rounds")]
    pub min_rounds: u32,
    /// Most rounds a session may be drawn with.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_rounds: MIN_ROUNDS,
            max_rounds: MAX_ROUNDS,
        }
    }
}

/// Profile store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Backend: "sqlite" or "memory".
    #[serde(default = "default_sqlite")]
    pub backend: String,
    /// Database file for the sqlite backend.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// How many times a progress write is attempted before it is given up.
    #[serde(default = "default_write_attempts")]
    pub write_attempts: u32,
    /// Accounts whose progress stays cached in memory.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: default_sqlite(),
            path: default_db_path(),
            wal_mode: true,
            write_attempts: default_write_attempts(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive: trace, debug, info, warn, error. `RUST_LOG`
    /// overrides it.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Vendor roster source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// TOML roster replacing the built-in vendors.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_bind_addr() -> String { "127.0.0.1:3000".to_string() }
fn default_base_url() -> String { "https://generativelanguage.googleapis.com".to_string() }
fn default_model() -> String { "gemini-2.5-flash".to_string() }
fn default_temperature() -> f32 { 0.9 }
fn default_max_output_tokens() -> u32 { 1000 }
fn default_request_timeout_ms() -> u64 { 15_000 }
fn default_min_rounds() -> u32 { MIN_ROUNDS }
fn default_max_rounds() -> u32 { MAX_ROUNDS }
fn default_sqlite() -> String { "sqlite".to_string() }
fn default_db_path() -> PathBuf { PathBuf::from("tianguis.db") }
fn default_write_attempts() -> u32 { 3 }
fn default_cache_capacity() -> usize { crate::progress::DEFAULT_CACHE_CAPACITY }
fn default_log_level() -> String { "info".to_string() }
