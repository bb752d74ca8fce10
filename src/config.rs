//! Settings file handling.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::wallet::chain::ChainConfig;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_MODEL: &str = "meta-llama/llama-3.3-8b-instruct:free";
pub const DEFAULT_GATEWAY_URL: &str = "https://gateway.lighthouse.storage";
pub const DEFAULT_WALLET_PROVIDER_URL: &str = "http://127.0.0.1:1248";
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0xfbc8ee7d9064c534d9be34ce75d542726d1f2fd1";

pub const SERVER_URL_ENV: &str = "RESEARCHAI_SERVER_URL";

const APP_DIR_NAME: &str = "ResearchAI";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not locate the {0} directory")]
    MissingDir(&'static str),
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerParams,
    #[serde(default)]
    pub gateway: GatewayParams,
    #[serde(default)]
    pub wallet: WalletParams,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ServerParams {
    pub base_url: String,
    pub default_model: String,
    /// Requests wait indefinitely when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for ServerParams {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SERVER_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GatewayParams {
    pub base_url: String,
}

impl Default for GatewayParams {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GATEWAY_URL.to_string(),
        }
    }
}

impl GatewayParams {
    pub fn url_for(&self, handle: &str) -> String {
        gateway_url(&self.base_url, handle)
    }
}

/// `<gateway>/ipfs/<handle>`
pub fn gateway_url(base_url: &str, handle: &str) -> String {
    format!("{}/ipfs/{}", base_url.trim_end_matches('/'), handle)
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WalletParams {
    /// JSON-RPC endpoint of the wallet that signs and submits transactions.
    pub provider_url: String,
    pub contract_address: String,
    #[serde(default)]
    pub chain: ChainConfig,
}

impl Default for WalletParams {
    fn default() -> Self {
        Self {
            provider_url: DEFAULT_WALLET_PROVIDER_URL.to_string(),
            contract_address: DEFAULT_CONTRACT_ADDRESS.to_string(),
            chain: ChainConfig::default(),
        }
    }
}

impl AppConfig {
    /// Environment overrides win over the file.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(SERVER_URL_ENV) {
            if !url.trim().is_empty() {
                self.server.base_url = url.trim().to_string();
            }
        }
    }
}

fn ensure_dir(dir: PathBuf) -> Result<PathBuf, ConfigError> {
    if !dir.exists() {
        fs::create_dir_all(&dir).map_err(|source| ConfigError::Io {
            path: dir.clone(),
            source,
        })?;
    }
    Ok(dir)
}

pub fn get_app_data_dir() -> Result<PathBuf, ConfigError> {
    let data_dir = dirs_next::data_dir().ok_or(ConfigError::MissingDir("data"))?;
    ensure_dir(data_dir.join(APP_DIR_NAME).join("data"))
}

pub fn get_app_config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs_next::config_dir().ok_or(ConfigError::MissingDir("config"))?;
    let app_config_dir = ensure_dir(config_dir.join(APP_DIR_NAME).join("configuration"))?;
    Ok(app_config_dir.join("settings.json"))
}

/// Reads the settings file, writing defaults on first run. A file that does
/// not parse is left untouched and defaults are used for this run.
pub fn load_or_initialize_config(config_path: &Path) -> Result<AppConfig, ConfigError> {
    if config_path.exists() {
        let content = fs::read_to_string(config_path).map_err(|source| ConfigError::Io {
            path: config_path.to_path_buf(),
            source,
        })?;
        match serde_json::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!(path = %config_path.display(), error = %e, "Settings file is invalid, using defaults");
                Ok(AppConfig::default())
            }
        }
    } else {
        let default_config = AppConfig::default();
        if let Some(parent) = config_path.parent() {
            ensure_dir(parent.to_path_buf())?;
        }
        fs::write(config_path, serde_json::to_string_pretty(&default_config)?).map_err(
            |source| ConfigError::Io {
                path: config_path.to_path_buf(),
                source,
            },
        )?;
        info!(path = %config_path.display(), "Wrote default settings");
        Ok(default_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_run_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let config = load_or_initialize_config(&path).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());

        let reread = load_or_initialize_config(&path).unwrap();
        assert_eq!(reread, config);
    }

    #[test]
    fn invalid_file_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let config = load_or_initialize_config(&path).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn partial_file_fills_missing_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"server": {"base_url": "http://research.local", "default_model": "m"}}"#,
        )
        .unwrap();

        let config = load_or_initialize_config(&path).unwrap();
        assert_eq!(config.server.base_url, "http://research.local");
        assert_eq!(config.server.default_model, "m");
        assert_eq!(config.gateway, GatewayParams::default());
        assert_eq!(config.wallet.contract_address, DEFAULT_CONTRACT_ADDRESS);
    }

    #[test]
    fn gateway_url_joins_prefix_and_handle() {
        assert_eq!(
            gateway_url("https://gateway.lighthouse.storage/", "bafy123"),
            "https://gateway.lighthouse.storage/ipfs/bafy123"
        );
        assert_eq!(
            GatewayParams::default().url_for("bafy123"),
            "https://gateway.lighthouse.storage/ipfs/bafy123"
        );
    }
}
