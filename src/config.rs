//! Configuration file parser for ~/.config/feedcourier/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde but logged as warnings, since they are
//! usually typos. Command-line flags are merged on top with
//! [`Config::apply_overrides`], and [`Config::validate`] checks the result
//! before anything touches the network or the state file.
use clap::ValueEnum;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::content::SanitizePolicy;
use crate::pipeline::PipelineOptions;
use crate::sink::{SmtpAuth, SMTP_SECRET_ENV};

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

    /// A setting the chosen output needs was given neither in the file nor
    /// on the command line.
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// `explicit` if given, otherwise `file_name` inside the directory returned
/// by `config_dir`. The directory is only looked up when it is needed.
pub fn path_or_default<E>(
    explicit: Option<PathBuf>,
    file_name: &str,
    config_dir: impl FnOnce() -> Result<PathBuf, E>,
) -> Result<PathBuf, E> {
    match explicit {
        Some(path) => Ok(path),
        None => Ok(config_dir()?.join(file_name)),
    }
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Where new articles go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputKind {
    #[default]
    Console,
    File,
    Email,
}

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seen-article history file. Defaults to `seen_articles.json` in the
    /// config directory.
    pub state_file: Option<PathBuf>,

    /// Entries examined per feed per run.
    pub max_articles_per_feed: usize,

    /// Identifiers remembered per feed. Defaults to `max_articles_per_feed`.
    pub history_size: Option<usize>,

    pub max_concurrent_feeds: usize,

    pub feed_timeout_secs: u64,

    /// Deadline for fetching an article page for the reading-time estimate.
    pub page_timeout_secs: u64,

    pub user_agent: String,

    pub email: EmailConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_file: None,
            max_articles_per_feed: 1,
            history_size: None,
            max_concurrent_feeds: 4,
            feed_timeout_secs: 30,
            page_timeout_secs: 5,
            user_agent: concat!("feedcourier/", env!("CARGO_PKG_VERSION")).to_string(),
            email: EmailConfig::default(),
        }
    }
}

/// The `[email]` table.
///
/// The SMTP secret itself is never stored here; it is read from
/// `credentials_file` (or the environment) when the sink is built.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub to: Option<String>,
    pub from: Option<String>,
    pub smtp_host: Option<String>,
    /// 465 means implicit TLS, anything else STARTTLS.
    pub smtp_port: Option<u16>,
    /// Login name. Defaults to `from`.
    pub username: Option<String>,
    pub auth: SmtpAuth,
    pub credentials_file: Option<PathBuf>,
    pub sanitize: SanitizePolicy,
}

/// Values given on the command line. `None` leaves the file value alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub to_email: Option<String>,
    pub from_email: Option<String>,
    pub credentials: Option<PathBuf>,
    pub max_articles: Option<usize>,
    pub history_size: Option<usize>,
    pub state_file: Option<PathBuf>,
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: &'static [&'static str] = &[
        "state_file",
        "max_articles_per_feed",
        "history_size",
        "max_concurrent_feeds",
        "feed_timeout_secs",
        "page_timeout_secs",
        "user_agent",
        "email",
    ];

    const KNOWN_EMAIL_KEYS: &'static [&'static str] = &[
        "to",
        "from",
        "smtp_host",
        "smtp_port",
        "username",
        "auth",
        "credentials_file",
        "sanitize",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check the size before reading so a huge file is never pulled into memory
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
                // File deleted between metadata and read
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
            warn_unknown_keys(&raw, Self::KNOWN_KEYS, "");
            if let Some(toml::Value::Table(email)) = raw.get("email") {
                warn_unknown_keys(email, Self::KNOWN_EMAIL_KEYS, "email.");
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Applies command-line values on top of the file values.
    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(to) = overrides.to_email {
            self.email.to = Some(to);
        }
        if let Some(from) = overrides.from_email {
            self.email.from = Some(from);
        }
        if let Some(path) = overrides.credentials {
            self.email.credentials_file = Some(path);
        }
        if let Some(max) = overrides.max_articles {
            self.max_articles_per_feed = max;
        }
        if let Some(size) = overrides.history_size {
            self.history_size = Some(size);
        }
        if let Some(path) = overrides.state_file {
            self.state_file = Some(path);
        }
    }

    /// Checks that the settings are usable for `output`.
    ///
    /// `output_file` is the `--file` argument, required by the file output.
    pub fn validate(
        &self,
        output: OutputKind,
        output_file: Option<&Path>,
    ) -> Result<(), ConfigError> {
        let counts = [
            ("max_articles_per_feed", self.max_articles_per_feed),
            ("history_size", self.history_size()),
            ("max_concurrent_feeds", self.max_concurrent_feeds),
        ];
        for (name, value) in counts {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be at least 1", name)));
            }
        }
        if self.feed_timeout_secs == 0 || self.page_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be at least 1 second".to_string()));
        }

        match output {
            OutputKind::Console => Ok(()),
            OutputKind::File => match output_file {
                Some(_) => Ok(()),
                None => Err(ConfigError::MissingParameter(
                    "--file is required for file output".to_string(),
                )),
            },
            OutputKind::Email => self.email.validate(),
        }
    }

    pub fn history_size(&self) -> usize {
        self.history_size.unwrap_or(self.max_articles_per_feed)
    }

    /// The configured state file, or `seen_articles.json` in the directory
    /// returned by `config_dir`.
    pub fn state_file<E>(
        &self,
        config_dir: impl FnOnce() -> Result<PathBuf, E>,
    ) -> Result<PathBuf, E> {
        path_or_default(self.state_file.clone(), "seen_articles.json", config_dir)
    }

    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed_timeout_secs)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            scan_cap: self.max_articles_per_feed,
            history_size: self.history_size(),
            max_concurrent: self.max_concurrent_feeds,
        }
    }
}

impl EmailConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            (&self.to, "recipient (--to-email or email.to)"),
            (&self.from, "sender (--from-email or email.from)"),
            (&self.smtp_host, "email.smtp_host"),
        ];
        for (value, name) in required {
            if value.as_deref().is_none_or(|v| v.trim().is_empty()) {
                return Err(ConfigError::MissingParameter(name.to_string()));
            }
        }

        if std::env::var(SMTP_SECRET_ENV).is_ok_and(|v| !v.trim().is_empty()) {
            return Ok(());
        }

        match &self.credentials_file {
            None => Err(ConfigError::MissingParameter(format!(
                "credentials file (--credentials, email.credentials_file or {})",
                SMTP_SECRET_ENV
            ))),
            Some(path) if !path.is_file() => Err(ConfigError::Invalid(format!(
                "credentials file {} does not exist",
                path.display()
            ))),
            Some(_) => Ok(()),
        }
    }

    /// Login name for the SMTP server.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref().or(self.from.as_deref())
    }
}

fn warn_unknown_keys(table: &toml::Table, known: &[&str], prefix: &str) {
    for key in table.keys() {
        if !known.contains(&key.as_str()) {
            tracing::warn!(
                key = %format!("{}{}", prefix, key),
                "Unknown key in config file, ignoring"
            );
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
