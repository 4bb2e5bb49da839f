use std::path::{Path, PathBuf};
use std::time::Duration;

use ::config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "wp-archiver.toml";
const ENV_PREFIX: &str = "WPA";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub xmlrpc_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub blog_id: u32,
    /// Prefix for site-relative image links.
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_save_dir")]
    pub save_dir: PathBuf,
    #[serde(default = "default_post_count")]
    pub post_count: u32,
    #[serde(default = "default_post_status")]
    pub post_status: String,
    #[serde(default = "default_order_by")]
    pub order_by: String,
    #[serde(default = "default_order")]
    pub order: String,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub legacy_inline_parent: bool,
}

fn default_save_dir() -> PathBuf {
    PathBuf::from("archive")
}

fn default_post_count() -> u32 {
    600
}

fn default_post_status() -> String {
    "publish".into()
}

fn default_order_by() -> String {
    "post_date".into()
}

fn default_order() -> String {
    "ASC".into()
}

fn default_timeout() -> u64 {
    30
}

impl Settings {
    /// Layer `WPA_*` environment variables over an optional TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Settings needed only by `run`; `status` and `inspect` work without
    /// credentials.
    pub fn require_remote(&self) -> Result<(), ConfigError> {
        let required = [
            ("xmlrpc_url", &self.xmlrpc_url),
            ("username", &self.username),
            ("password", &self.password),
            ("base_url", &self.base_url),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(key));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Base URL without a trailing slash, so joins produce a single `/`.
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}
