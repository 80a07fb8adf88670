//! Configuration management
//!
//! Settings live in `settings.json` in the ProxyBank directory:
//! ```json
//! {
//!   "httpTimeoutSecs": 30,
//!   "secretFile": "secret.txt",
//!   "banks": { "credit-mutuel": { "baseUrl": "https://www.creditmutuel.fr" } }
//! }
//! ```
//! A missing or unreadable file gives the defaults. Environment variables
//! override the file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Default outbound request timeout
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Default secret file name, relative to the ProxyBank directory
pub const DEFAULT_SECRET_FILE: &str = "secret.txt";

pub const HTTP_TIMEOUT_ENV: &str = "PROXYBANK_HTTP_TIMEOUT_SECS";
pub const SECRET_ENV: &str = "PROXYBANK_SECRET";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    http_timeout_secs: Option<u64>,
    #[serde(default)]
    secret_file: Option<String>,
    #[serde(default)]
    banks: HashMap<String, BankSettings>,
}

/// Per-bank settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankSettings {
    /// Site root override (staging environment, local mock)
    #[serde(default)]
    pub base_url: Option<String>,
}

/// ProxyBank configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub http_timeout: Duration,
    /// Absolute path of the secret file
    pub secret_file: PathBuf,
    /// Secret given inline through the environment, bypassing the file
    pub inline_secret: Option<String>,
    pub banks: HashMap<String, BankSettings>,
}

impl Config {
    /// Default configuration rooted at the given directory
    pub fn defaults(proxybank_dir: &Path) -> Self {
        Self {
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            secret_file: proxybank_dir.join(DEFAULT_SECRET_FILE),
            inline_secret: None,
            banks: HashMap::new(),
        }
    }

    /// Load config from the ProxyBank directory
    pub fn load(proxybank_dir: &Path) -> Result<Self> {
        Self::load_with_env(proxybank_dir, |key| std::env::var(key).ok())
    }

    /// Load config with an explicit environment lookup
    pub fn load_with_env(
        proxybank_dir: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let settings_path = proxybank_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %settings_path.display(), error = %e, "ignoring unparsable settings file");
                SettingsFile::default()
            })
        } else {
            SettingsFile::default()
        };

        let mut config = Self::defaults(proxybank_dir);

        if let Some(secs) = raw.http_timeout_secs.filter(|s| *s > 0) {
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Some(file) = raw.secret_file.filter(|f| !f.trim().is_empty()) {
            // Relative paths are taken from the ProxyBank directory
            config.secret_file = proxybank_dir.join(file);
        }
        config.banks = raw.banks;

        match env(HTTP_TIMEOUT_ENV).map(|v| v.trim().parse::<u64>()) {
            Some(Ok(secs)) if secs > 0 => config.http_timeout = Duration::from_secs(secs),
            Some(_) => tracing::warn!("ignoring invalid {}", HTTP_TIMEOUT_ENV),
            None => {}
        }
        config.inline_secret = env(SECRET_ENV).filter(|s| !s.is_empty());

        Ok(config)
    }

    /// Base URL override for a bank, if configured
    pub fn bank_base_url(&self, bank_id: &str) -> Option<&str> {
        self.banks
            .get(bank_id)
            .and_then(|b| b.base_url.as_deref())
            .filter(|url| !url.trim().is_empty())
    }
}
