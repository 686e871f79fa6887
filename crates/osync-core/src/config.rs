//! Sync configuration.
//!
//! Values load from a YAML file (default `init/config.yaml`) and can be
//! overridden per-field through `OSYNC_*` environment variables.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

/// Default location of the configuration file, relative to the working
/// directory.
pub const DEFAULT_CONFIG_PATH: &str = "init/config.yaml";

const DEFAULT_API_URL: &str = "https://app.getoutline.com";
const DEFAULT_SYNC_DIR: &str = "docs";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    api_url: Option<String>,
    api_token: Option<String>,
    collection_id: Option<String>,
    sync_dir: Option<PathBuf>,
}

/// Resolved runtime configuration.
#[derive(Clone)]
pub struct Config {
    /// Base URL of the remote instance
    pub api_url: String,
    /// Bearer token for the remote API
    pub api_token: String,
    /// Collection to sync; selected interactively when absent
    pub collection_id: Option<String>,
    /// Local sync root
    pub sync_dir: PathBuf,
    /// Config file actually read, if any
    pub config_file: Option<PathBuf>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Config")
            .field("api_url", &self.api_url)
            .field("api_token", &"[REDACTED]")
            .field("collection_id", &self.collection_id)
            .field("sync_dir", &self.sync_dir)
            .finish()
    }
}

impl Config {
    /// Load configuration with priority: env vars over config file.
    ///
    /// A missing file is fine as long as the environment supplies a token;
    /// an unreadable or unparseable file is a configuration error.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let path = config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut file_config = ConfigFile::default();
        let mut config_file = None;
        if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|error| {
                Error::Config(format!("failed to read {}: {error}", path.display()))
            })?;
            file_config = serde_yaml::from_str(&raw).map_err(|error| {
                Error::Config(format!("failed to parse {}: {error}", path.display()))
            })?;
            config_file = Some(path);
        }

        let api_url = env_override("OSYNC_API_URL")
            .or_else(|| normalize_text_option(file_config.api_url))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        if !is_http_url(&api_url) {
            return Err(Error::Config(format!(
                "api_url must include http:// or https:// (got {api_url})"
            )));
        }

        let api_token = env_override("OSYNC_API_TOKEN")
            .or_else(|| normalize_text_option(file_config.api_token))
            .ok_or_else(|| {
                Error::Config(format!(
                    "api_token is required (set it in {DEFAULT_CONFIG_PATH} or OSYNC_API_TOKEN)"
                ))
            })?;

        let collection_id =
            env_override("OSYNC_COLLECTION_ID").or_else(|| normalize_text_option(file_config.collection_id));

        let sync_dir = env_override("OSYNC_DIR")
            .map(PathBuf::from)
            .or(file_config.sync_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SYNC_DIR));

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_token,
            collection_id,
            sync_dir,
            config_file,
        })
    }

    /// Load from an explicit file path, failing when it does not exist.
    pub fn load_required(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Config(format!(
                "configuration file {} does not exist",
                path.display()
            )));
        }
        Self::load(Some(path.to_path_buf()))
    }
}

fn env_override(name: &str) -> Option<String> {
    normalize_text_option(env::var(name).ok())
}
