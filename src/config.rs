//! Gateway configuration
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then environment variables. Secrets never appear in `Debug` output.

use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::{Error, Result};

/// Default HTTP listen port
pub const DEFAULT_PORT: u16 = 8439;

/// Runtime configuration for the gateway process
#[derive(Debug, Clone)]
pub struct Config {
    /// Process secret used to sign internal links
    pub secret_key: SecretString,
    /// Path to the SQLite database file
    pub db_path: PathBuf,
    /// HTTP listen port
    pub port: u16,
    /// Token of the dedicated audit-log bot
    pub logging_bot_token: SecretString,
    /// Chat that receives machine-readable event logs
    pub logging_chat_id: i64,
    /// Chat that receives @admin triage notifications
    pub staff_chat_id: i64,
    /// Optional external ban blocklist (JSON array of user ids)
    pub external_blocklist_url: Option<String>,
    /// Base URL of the admin console, used in dossier links
    pub admin_base_url: String,
    /// Verbose rendering and relaxed startup checks
    pub debug: bool,
}

/// Partial TOML overlay; every field is optional
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub secret_key: Option<String>,
    pub db_path: Option<PathBuf>,
    pub port: Option<u16>,
    pub logging_bot_token: Option<String>,
    pub logging_chat_id: Option<i64>,
    pub staff_chat_id: Option<i64>,
    pub external_blocklist_url: Option<String>,
    pub admin_base_url: Option<String>,
    pub debug: Option<bool>,
}

impl Config {
    /// Load configuration from an optional TOML file plus the environment
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be parsed or a required value is
    /// missing outside of debug mode
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let overlay = match file {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                toml::from_str(&raw)?
            }
            None => ConfigFile::default(),
        };
        Self::from_overlay(overlay)
    }

    fn from_overlay(overlay: ConfigFile) -> Result<Self> {
        let debug = env_bool("CAMPUS_DEBUG").or(overlay.debug).unwrap_or(false);

        let secret_key = env_or("CAMPUS_SECRET_KEY", overlay.secret_key);
        let secret_key = match secret_key {
            Some(key) if !key.is_empty() => key,
            _ if debug => "insecure-debug-key".to_string(),
            _ => {
                return Err(Error::Config(
                    "secret_key is not set; refusing to start".to_string(),
                ))
            }
        };

        let logging_bot_token = env_or("CAMPUS_LOGGING_BOT_TOKEN", overlay.logging_bot_token)
            .unwrap_or_default();
        if logging_bot_token.is_empty() && !debug {
            return Err(Error::Config("logging_bot_token is not set".to_string()));
        }

        Ok(Self {
            secret_key: SecretString::from(secret_key),
            db_path: std::env::var("CAMPUS_DB_PATH")
                .ok()
                .map(PathBuf::from)
                .or(overlay.db_path)
                .unwrap_or_else(|| PathBuf::from("campus.db")),
            port: env_parse("CAMPUS_PORT")
                .or(overlay.port)
                .unwrap_or(DEFAULT_PORT),
            logging_bot_token: SecretString::from(logging_bot_token),
            logging_chat_id: env_parse("CAMPUS_LOGGING_CHAT_ID")
                .or(overlay.logging_chat_id)
                .unwrap_or(0),
            staff_chat_id: env_parse("CAMPUS_STAFF_CHAT_ID")
                .or(overlay.staff_chat_id)
                .unwrap_or(0),
            external_blocklist_url: env_or(
                "CAMPUS_EXTERNAL_BLOCKLIST_URL",
                overlay.external_blocklist_url,
            ),
            admin_base_url: env_or("CAMPUS_ADMIN_BASE_URL", overlay.admin_base_url)
                .unwrap_or_else(|| "https://admin.campusnetwork.dev".to_string()),
            debug,
        })
    }

    /// A configuration suitable for tests: in-memory-ish paths, debug on
    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            secret_key: SecretString::from("test-secret"),
            db_path: PathBuf::from(":memory:"),
            port: 0,
            logging_bot_token: SecretString::from("100:LOGGING"),
            logging_chat_id: -1_000_100,
            staff_chat_id: -1_000_200,
            external_blocklist_url: None,
            admin_base_url: "https://admin.campusnetwork.dev".to_string(),
            debug: true,
        }
    }

    /// Expose the logging bot token for client construction
    #[must_use]
    pub fn logging_bot_token_raw(&self) -> &str {
        self.logging_bot_token.expose_secret()
    }
}

fn env_or(key: &str, fallback: Option<String>) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty()).or(fallback)
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
