//! Sync configuration.
//!
//! Read from `$XDG_CONFIG_HOME/kiln/config.toml`. Every field has a default,
//! so a missing file is the same as an empty one. The API token can come
//! from the environment instead of the file.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variables consulted for the token, in order.
pub const TOKEN_ENV_VARS: &[&str] = &["KILN_GITHUB_TOKEN", "GITHUB_TOKEN"];

/// Which decoded blobs count as text and get loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextPolicy {
    /// 7-bit clean ASCII only.
    #[default]
    Ascii,
    /// Any valid UTF-8 without NUL bytes.
    Utf8,
}

impl TextPolicy {
    /// Convert blob bytes to text, or `None` if the policy rejects them.
    pub fn accept(self, bytes: Vec<u8>) -> Option<String> {
        let text_like = match self {
            TextPolicy::Ascii => bytes.is_ascii(),
            TextPolicy::Utf8 => !bytes.contains(&0),
        };
        if !text_like {
            return None;
        }
        String::from_utf8(bytes).ok()
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL of the REST API.
    pub api_base: String,
    pub user_agent: String,
    /// Personal access token. Prefer the environment over the file.
    pub token: Option<String>,
    /// Blob reads in flight at once during a load.
    pub fetch_concurrency: usize,
    pub request_timeout_secs: u64,
    pub text_policy: TextPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            user_agent: format!("kiln/{}", env!("CARGO_PKG_VERSION")),
            token: None,
            fetch_concurrency: 8,
            request_timeout_secs: 30,
            text_policy: TextPolicy::Ascii,
        }
    }
}

// Keeps the token out of logs.
impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("api_base", &self.api_base)
            .field("user_agent", &self.user_agent)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("fetch_concurrency", &self.fetch_concurrency)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("text_policy", &self.text_policy)
            .finish()
    }
}

impl SyncConfig {
    /// Load from the default location, then apply the environment.
    pub fn load() -> Result<Self> {
        let mut config = Self::from_file(&kiln_vfs::paths::config_file())?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Parse a config file. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text)
                .with_context(|| format!("Failed to parse {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Take the token from the first non-empty variable in [`TOKEN_ENV_VARS`].
    ///
    /// `lookup` is `std::env::var` in production; tests pass a closure.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let token = TOKEN_ENV_VARS
            .iter()
            .find_map(|name| lookup(name).filter(|v| !v.trim().is_empty()));
        if let Some(token) = token {
            self.token = Some(token.trim().to_string());
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.fetch_concurrency == 0 {
            anyhow::bail!("fetch_concurrency must be at least 1");
        }
        if !self.api_base.starts_with("http://") && !self.api_base.starts_with("https://") {
            anyhow::bail!("api_base must be an http(s) URL, got {:?}", self.api_base);
        }
        Ok(())
    }
}
