//! Configuration loading and management

use anyhow::{Context, Result, bail};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub vk: VkConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub facebook: FacebookConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub dry_run: bool,

    #[serde(default = "default_ignore_tag")]
    pub ignore_tag: String,

    #[serde(default = "default_item_count")]
    pub item_count: usize,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VkConfig {
    #[serde(default)]
    pub retriever: VkRetrieverSection,

    #[serde(default)]
    pub sender: VkSenderSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VkRetrieverSection {
    #[serde(default)]
    pub enabled: bool,

    /// Community owner id, negative for groups
    #[serde(default)]
    pub group_id: i64,

    #[serde(default = "default_vk_token_env")]
    pub token_env: String,

    #[serde(default)]
    pub exclude_post_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VkSenderSection {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub group_id: i64,

    #[serde(default = "default_vk_token_env")]
    pub token_env: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub retriever: TelegramRetrieverSection,

    #[serde(default)]
    pub sender: TelegramSenderSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramRetrieverSection {
    #[serde(default)]
    pub enabled: bool,

    /// Numeric chat id or `@channelusername`
    #[serde(default)]
    pub chat_id: String,

    #[serde(default = "default_telegram_token_env")]
    pub token_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramSenderSection {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub chat_id: String,

    #[serde(default = "default_telegram_token_env")]
    pub token_env: String,

    #[serde(default)]
    pub enable_notification: bool,

    /// Author never credited under photo captions
    #[serde(default)]
    pub excluded_author: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FacebookConfig {
    #[serde(default)]
    pub retriever: FacebookSection,

    #[serde(default)]
    pub sender: FacebookSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookSection {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub page_id: String,

    #[serde(default = "default_facebook_token_env")]
    pub token_env: String,
}

// Default value functions
fn default_storage_path() -> PathBuf {
    PathBuf::from("./storage.json")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ignore_tag() -> String {
    crosspost_domain::DEFAULT_IGNORE_TAG.to_string()
}

fn default_item_count() -> usize {
    10
}

fn default_request_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    300
}

fn default_vk_token_env() -> String {
    "VK_TOKEN".to_string()
}

fn default_telegram_token_env() -> String {
    "TELEGRAM_BOT_TOKEN".to_string()
}

fn default_facebook_token_env() -> String {
    "FB_PAGE_ACCESS_TOKEN".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            log_level: default_log_level(),
            dry_run: false,
            ignore_tag: default_ignore_tag(),
            item_count: default_item_count(),
            request_timeout_secs: default_request_timeout(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl Default for VkRetrieverSection {
    fn default() -> Self {
        Self {
            enabled: false,
            group_id: 0,
            token_env: default_vk_token_env(),
            exclude_post_ids: vec![],
        }
    }
}

impl Default for VkSenderSection {
    fn default() -> Self {
        Self {
            enabled: false,
            group_id: 0,
            token_env: default_vk_token_env(),
        }
    }
}

impl Default for TelegramRetrieverSection {
    fn default() -> Self {
        Self {
            enabled: false,
            chat_id: String::new(),
            token_env: default_telegram_token_env(),
        }
    }
}

impl Default for TelegramSenderSection {
    fn default() -> Self {
        Self {
            enabled: false,
            chat_id: String::new(),
            token_env: default_telegram_token_env(),
            enable_notification: false,
            excluded_author: None,
        }
    }
}

impl Default for FacebookSection {
    fn default() -> Self {
        Self {
            enabled: false,
            page_id: String::new(),
            token_env: default_facebook_token_env(),
        }
    }
}

impl GeneralConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        let default_path = PathBuf::from("./config.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            bail!("Config file not found: {}", path.display());
        }

        // CROSSPOST__GENERAL__DRY_RUN=true and friends
        builder = builder.add_source(
            config::Environment::with_prefix("CROSSPOST")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r##"# crosspost configuration
# Tokens are read from the environment variables named by `token_env`.

[general]
storage_path = "./storage.json"
log_level = "info"
dry_run = false
# Posts containing this tag stay on their source channel
ignore_tag = "#local"
item_count = 10
request_timeout_secs = 30
poll_interval_secs = 300

[vk.retriever]
enabled = false
group_id = -123456
token_env = "VK_TOKEN"
exclude_post_ids = []

[vk.sender]
enabled = false
group_id = -123456
token_env = "VK_TOKEN"

[telegram.retriever]
enabled = false
chat_id = "@your_channel"
token_env = "TELEGRAM_BOT_TOKEN"

[telegram.sender]
enabled = false
chat_id = "@your_channel"
token_env = "TELEGRAM_BOT_TOKEN"
enable_notification = false
# excluded_author = "Channel Admin"

[facebook.retriever]
enabled = false
page_id = "1234567890"
token_env = "FB_PAGE_ACCESS_TOKEN"

[facebook.sender]
enabled = false
page_id = "1234567890"
token_env = "FB_PAGE_ACCESS_TOKEN"
"##
        .to_string()
    }
}

/// Read a credential from the environment variable named in the config
pub fn load_secret(env_var: &str, channel: &str) -> Result<SecretString> {
    if env_var.trim().is_empty() {
        bail!("No token env var configured for {}", channel);
    }

    let value = std::env::var(env_var)
        .with_context(|| format!("Missing token env var {} for {}", env_var, channel))?;

    if value.trim().is_empty() {
        bail!("Token env var {} is empty for {}", env_var, channel);
    }

    Ok(SecretString::new(value.into()))
}
