//! Configuration file parser for ~/.config/advisory-feeds/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde, though we log a warning when the file
//! contains potential typos.
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::feed::{FeedFormat, FeedMetadata};
use crate::normalize::DEFAULT_MISSING_IDENTITY_THRESHOLD;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid value for '{key}': {reason}")]
    Invalid { key: String, reason: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP server listens on.
    pub bind: String,

    /// Externally visible base URL, used for feed ids and self links.
    pub public_url: String,

    /// Output format when a request does not name one.
    pub default_format: FeedFormat,

    /// `User-Agent` sent upstream.
    pub user_agent: String,

    /// Upstream response size cap in bytes.
    pub max_response_bytes: usize,

    /// Optional per-fetch timeout. Unset means no timeout.
    pub fetch_timeout_secs: Option<u64>,

    /// Cap on raw upstream text echoed into error feeds.
    pub max_error_body_bytes: usize,

    /// Name placed in the Atom `<author>` element.
    pub feed_author: String,

    /// Per-source overrides, keyed by source name.
    pub sources: HashMap<String, SourceSettings>,
}

/// `[sources.<name>]` table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Replaces the built-in upstream base URL.
    pub upstream: Option<String>,

    /// Share of records that may lack their identity field before the whole
    /// response is rejected. `1.0` disables the check.
    pub missing_identity_threshold: f64,

    /// Allow the atom-regex source to fetch loopback and private addresses.
    pub allow_private: bool,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            upstream: None,
            missing_identity_threshold: DEFAULT_MISSING_IDENTITY_THRESHOLD,
            allow_private: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            public_url: "http://localhost:8080".to_string(),
            default_format: FeedFormat::Atom,
            user_agent: concat!("advisory-feeds/", env!("CARGO_PKG_VERSION")).to_string(),
            max_response_bytes: 10 * 1024 * 1024,
            fetch_timeout_secs: None,
            max_error_body_bytes: 64 * 1024,
            feed_author: FeedMetadata::DEFAULT_AUTHOR.to_string(),
            sources: HashMap::new(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Out-of-range values → `Err(ConfigError::Invalid)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to prevent memory exhaustion
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw);
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            bind = %config.bind,
            public_url = %config.public_url,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Settings for one source, defaults when the file has no table for it.
    pub fn source(&self, name: &str) -> SourceSettings {
        self.sources.get(name).cloned().unwrap_or_default()
    }

    /// `public_url` without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.public_url.trim_end_matches('/')
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if url::Url::parse(&self.public_url).is_err() {
            return Err(ConfigError::Invalid {
                key: "public_url".to_string(),
                reason: format!("'{}' is not an absolute URL", self.public_url),
            });
        }
        if self.max_response_bytes == 0 {
            return Err(ConfigError::Invalid {
                key: "max_response_bytes".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        for (name, settings) in &self.sources {
            let threshold = settings.missing_identity_threshold;
            if !(0.0..=1.0).contains(&threshold) {
                return Err(ConfigError::Invalid {
                    key: format!("sources.{name}.missing_identity_threshold"),
                    reason: format!("{threshold} is outside 0.0..=1.0"),
                });
            }
        }
        Ok(())
    }
}

fn warn_unknown_keys(raw: &toml::Table) {
    const KNOWN_KEYS: &[&str] = &[
        "bind",
        "public_url",
        "default_format",
        "user_agent",
        "max_response_bytes",
        "fetch_timeout_secs",
        "max_error_body_bytes",
        "feed_author",
        "sources",
    ];
    const KNOWN_SOURCE_KEYS: &[&str] = &["upstream", "missing_identity_threshold", "allow_private"];

    for (key, value) in raw {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            tracing::warn!(key = %key, "Unknown key in config file, ignoring");
            continue;
        }
        if key != "sources" {
            continue;
        }
        let Some(sources) = value.as_table() else {
            continue;
        };
        for (source, table) in sources {
            let Some(table) = table.as_table() else {
                continue;
            };
            for sub_key in table.keys() {
                if !KNOWN_SOURCE_KEYS.contains(&sub_key.as_str()) {
                    tracing::warn!(
                        source = %source,
                        key = %sub_key,
                        "Unknown key in source settings, ignoring"
                    );
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
