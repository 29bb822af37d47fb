use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// A required environment variable is absent.
    Missing(&'static str),
    /// A variable is present but cannot be parsed.
    Invalid { name: &'static str, value: String, reason: String },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(name) => write!(f, "missing required environment variable {name}"),
            Self::Invalid { name, value, reason } => {
                write!(f, "invalid value '{value}' for {name}: {reason}")
            }
            Self::Validation(msg) => write!(f, "config validation error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Process configuration, sourced from the environment.
pub struct Config {
    pub bot_token: String,
    /// HTTP listen port for the webhook server.
    pub port: u16,
    /// Externally-reachable base URL. Used once at startup to register the
    /// webhook; never consulted on the per-request path.
    pub public_url: Url,
    /// Working directory for downloaded files.
    pub download_dir: PathBuf,
    /// Downloader executable name or path.
    pub ytdlp_bin: String,
    /// Upload ceiling in MiB. Files above this are rejected after download.
    pub max_upload_mib: u64,
    /// Wall-clock limit for one downloader invocation.
    pub fetch_timeout: Duration,
    /// Directory for log files. No file logging when unset.
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary lookup so tests don't touch the process
    /// environment.
    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bot_token = get("BOT_TOKEN").ok_or(ConfigError::Missing("BOT_TOKEN"))?;
        if bot_token.is_empty() {
            return Err(ConfigError::Validation("BOT_TOKEN is required".into()));
        }
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Validation(
                "BOT_TOKEN appears invalid (expected format: 123456789:ABCdefGHI...)".into(),
            ));
        }

        let port = match get("PORT") {
            Some(v) => v.parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: "PORT",
                value: v.clone(),
                reason: e.to_string(),
            })?,
            None => 8080,
        };

        let public_url = get("PUBLIC_URL").ok_or(ConfigError::Missing("PUBLIC_URL"))?;
        let public_url = public_url.parse::<Url>().map_err(|e| ConfigError::Invalid {
            name: "PUBLIC_URL",
            value: public_url.clone(),
            reason: e.to_string(),
        })?;

        let download_dir = get("DOWNLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("downloads"));

        let ytdlp_bin = get("YTDLP_BIN").unwrap_or_else(|| "yt-dlp".to_string());

        let max_upload_mib = match get("MAX_UPLOAD_MIB") {
            Some(v) => v.parse::<u64>().map_err(|e| ConfigError::Invalid {
                name: "MAX_UPLOAD_MIB",
                value: v.clone(),
                reason: e.to_string(),
            })?,
            None => 50,
        };

        let fetch_timeout = match get("FETCH_TIMEOUT_SECS") {
            Some(v) => {
                let secs = v.parse::<u64>().map_err(|e| ConfigError::Invalid {
                    name: "FETCH_TIMEOUT_SECS",
                    value: v.clone(),
                    reason: e.to_string(),
                })?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(120),
        };

        let log_dir = get("LOG_DIR").map(PathBuf::from);

        Ok(Self {
            bot_token,
            port,
            public_url,
            download_dir,
            ytdlp_bin,
            max_upload_mib,
            fetch_timeout,
            log_dir,
        })
    }
}
