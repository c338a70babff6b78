//! Process configuration, read from the environment once at startup.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_STATION_INFO_PATH: &str = "data/station_info.csv";
pub const DEFAULT_SHEET_DIR: &str = "data/sheets";
pub const DEFAULT_CROWDING_URL_TEMPLATE: &str = "https://api.tfl.gov.uk/crowding/{Naptan}/Live";
pub const WORKSHEET_NAME: &str = "Sheet1";
pub const DEFAULT_CAPACITY: usize = 100_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be set ({resource})")]
    Missing {
        var: &'static str,
        resource: &'static str,
    },
    #[error("credentials file not found at '{0}'")]
    CredentialsNotFound(PathBuf),
    #[error("credentials file '{path}' is invalid: {reason}")]
    InvalidCredentials { path: PathBuf, reason: String },
}

/// Validated configuration handed to each component at construction.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub credentials_path: PathBuf,
    pub sheet_id: String,
    pub baseline_path: PathBuf,
    pub station_info_path: PathBuf,
    pub sheet_dir: PathBuf,
    pub crowding_url_template: String,
}

impl Config {
    /// Reads and validates configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds a configuration from an arbitrary variable source.
    ///
    /// Blank values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let require = |var: &'static str, resource: &'static str| {
            get(var).ok_or(ConfigError::Missing { var, resource })
        };

        let api_key = require("TFL_API_KEY", "live crowding API key")?;
        let credentials_path =
            require("GOOGLE_SERVICE_ACCOUNT_KEY_PATH", "row store credentials file")?;
        let sheet_id = require("GOOGLE_SHEET_ID", "row store sheet identifier")?;
        let baseline_path = require(
            "STATIONS_BASELINE_FOOTFALL_PATH",
            "station footfall baseline file",
        )?;

        Ok(Self {
            api_key,
            credentials_path: PathBuf::from(credentials_path),
            sheet_id,
            baseline_path: PathBuf::from(baseline_path),
            station_info_path: get("STATION_INFO_PATH")
                .unwrap_or_else(|| DEFAULT_STATION_INFO_PATH.to_string())
                .into(),
            sheet_dir: get("SHEET_DIR")
                .unwrap_or_else(|| DEFAULT_SHEET_DIR.to_string())
                .into(),
            crowding_url_template: get("CROWDING_URL_TEMPLATE")
                .unwrap_or_else(|| DEFAULT_CROWDING_URL_TEMPLATE.to_string()),
        })
    }
}

/// The subset of a service account key file the store needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub client_email: String,
}

impl ServiceAccount {
    /// Loads the credentials file, failing if it is absent or malformed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::CredentialsNotFound(path.to_path_buf()));
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidCredentials {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::InvalidCredentials {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}
