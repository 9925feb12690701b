//! Probe configuration
//!
//! All settings live in one [`ProbeConfig`] handed to the client and the
//! server at construction time. The shared secret is read from the nanobot
//! per-user config file (`~/.nanobot/config.json`) when available.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::types::BotSecret;

/// Placeholder used when no secret is configured. Test use only.
pub const PLACEHOLDER_SECRET: &str = "test-shared-secret-min-40-zeichen";

pub const DEFAULT_SERVER_PORT: u16 = 18791;
pub const DEFAULT_GATEWAY_PORT: u16 = 18790;
pub const DEFAULT_WEBHOOK_PATH: &str = "/webhook/nextcloud_talk";
pub const DEFAULT_BASE_URL: &str = "https://cloud.example.com";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Overrides the `~/.nanobot` directory when set.
pub const HOME_ENV: &str = "NANOBOT_HOME";

/// Where the shared secret came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    ConfigFile(PathBuf),
    /// Set directly through [`ProbeConfig::with_secret`].
    Explicit,
    Placeholder,
}

/// Settings shared by the signer and the verifier.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub secret: BotSecret,
    pub secret_source: SecretSource,
    /// Interface the local server binds to.
    pub host: String,
    /// Local server port.
    pub server_port: u16,
    /// Port of the external gateway targeted in client mode.
    pub gateway_port: u16,
    pub webhook_path: String,
    /// Nextcloud instance the bot is registered with; display only.
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            secret: BotSecret::new(PLACEHOLDER_SECRET),
            secret_source: SecretSource::Placeholder,
            host: "0.0.0.0".to_string(),
            server_port: DEFAULT_SERVER_PORT,
            gateway_port: DEFAULT_GATEWAY_PORT,
            webhook_path: DEFAULT_WEBHOOK_PATH.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ProbeConfig {
    /// Build a config whose secret comes from the default config file,
    /// falling back to the placeholder.
    pub fn load() -> Self {
        let path = match default_config_path() {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "Cannot locate config file, using placeholder bot secret");
                return Self::default();
            }
        };
        Self::load_from(&path)
    }

    /// Same as [`ProbeConfig::load`] but reads the given file.
    pub fn load_from(path: &Path) -> Self {
        let mut config = Self::default();

        match read_bot_secret(path) {
            Ok(Some(secret)) => {
                info!(
                    path = %path.display(),
                    length = secret.len(),
                    "Bot secret found in config file"
                );
                config.secret = secret;
                config.secret_source = SecretSource::ConfigFile(path.to_path_buf());
            }
            Ok(None) => {
                warn!(
                    path = %path.display(),
                    "No bot secret configured, using placeholder secret (test only)"
                );
            }
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable config, using placeholder secret (test only)");
            }
        }

        if config.has_weak_secret() {
            warn!(
                length = config.secret.len(),
                recommended = BotSecret::RECOMMENDED_MIN_LEN,
                "Bot secret is shorter than recommended"
            );
        }

        config
    }

    pub fn with_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.secret = BotSecret::new(secret);
        self.secret_source = SecretSource::Explicit;
        self
    }

    /// A configured secret below the recommended length. The placeholder
    /// is excluded; falling back to it is already warned about.
    pub fn has_weak_secret(&self) -> bool {
        self.secret_source != SecretSource::Placeholder && self.secret.is_weak()
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_server_port(mut self, port: u16) -> Self {
        self.server_port = port;
        self
    }

    pub fn with_gateway_port(mut self, port: u16) -> Self {
        self.gateway_port = port;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Address the local server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.server_port)
    }

    /// Webhook URL of the gateway on this machine.
    pub fn gateway_url(&self) -> String {
        format!("http://localhost:{}{}", self.gateway_port, self.webhook_path)
    }
}

/// `$NANOBOT_HOME/config.json`, or `~/.nanobot/config.json`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = std::env::var_os(HOME_ENV) {
        let dir = PathBuf::from(dir);
        if !dir.as_os_str().is_empty() {
            return Ok(dir.join("config.json"));
        }
    }
    let base_dirs = directories::BaseDirs::new().ok_or(ConfigError::HomeDirectory)?;
    Ok(base_dirs.home_dir().join(".nanobot").join("config.json"))
}

#[derive(Debug, Default, Deserialize)]
struct NanobotConfig {
    #[serde(default)]
    channels: Channels,
}

#[derive(Debug, Default, Deserialize)]
struct Channels {
    #[serde(default)]
    nextcloud_talk: Option<NextcloudTalkChannel>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NextcloudTalkChannel {
    #[serde(default)]
    bot_secret: Option<String>,
}

/// Read `channels.nextcloud_talk.botSecret` from a nanobot config file.
///
/// A missing file, key, or empty value yields `Ok(None)`.
pub fn read_bot_secret(path: &Path) -> Result<Option<BotSecret>, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                source,
            })
        }
    };

    let parsed: NanobotConfig = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    Ok(parsed
        .channels
        .nextcloud_talk
        .and_then(|channel| channel.bot_secret)
        .filter(|secret| !secret.is_empty())
        .map(BotSecret::new))
}
