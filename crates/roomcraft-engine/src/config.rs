use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;
use roomcraft_contracts::settings::BudgetThresholds;
use roomcraft_contracts::wire::{PayloadProfile, WizardVariant, DEFAULT_QUALITY, DEFAULT_SIZE};
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000";
pub const DEFAULT_MAX_AUXILIARY_IMAGES: usize = 20;
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

pub const CONFIG_PATH_ENV: &str = "ROOMCRAFT_CONFIG";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub endpoint: String,
    pub variant: WizardVariant,
    pub budget_thresholds: BudgetThresholds,
    pub max_auxiliary_images: Option<usize>,
    pub max_image_bytes: u64,
    /// `None` follows the variant's payload profile.
    pub inline_primary_image: Option<bool>,
    pub inline_auxiliary_images: bool,
    pub quality: String,
    pub size: String,
    pub request_timeout_secs: u64,
    pub download_dir: PathBuf,
    pub remember_designs: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            variant: WizardVariant::default(),
            budget_thresholds: BudgetThresholds::default(),
            max_auxiliary_images: Some(DEFAULT_MAX_AUXILIARY_IMAGES),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            inline_primary_image: None,
            inline_auxiliary_images: false,
            quality: DEFAULT_QUALITY.to_string(),
            size: DEFAULT_SIZE.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            download_dir: PathBuf::from("."),
            remember_designs: true,
        }
    }
}

impl WorkflowConfig {
    /// Defaults, then the JSON file named by `ROOMCRAFT_CONFIG`, then
    /// `ROOMCRAFT_*` environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = match lookup(CONFIG_PATH_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };

        if let Some(endpoint) = lookup("ROOMCRAFT_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Some(raw) = lookup("ROOMCRAFT_VARIANT") {
            config.variant = WizardVariant::from_str(&raw).map_err(|_| ConfigError::InvalidEnv {
                key: "ROOMCRAFT_VARIANT",
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = lookup("ROOMCRAFT_BUDGET_LOW_MAX") {
            config.budget_thresholds.low_max = parse_env("ROOMCRAFT_BUDGET_LOW_MAX", &raw)?;
        }
        if let Some(raw) = lookup("ROOMCRAFT_BUDGET_MEDIUM_MAX") {
            config.budget_thresholds.medium_max = parse_env("ROOMCRAFT_BUDGET_MEDIUM_MAX", &raw)?;
        }
        if let Some(raw) = lookup("ROOMCRAFT_MAX_AUXILIARY") {
            config.max_auxiliary_images = match raw.to_ascii_lowercase().as_str() {
                "none" | "unlimited" => None,
                _ => Some(parse_env("ROOMCRAFT_MAX_AUXILIARY", &raw)?),
            };
        }
        if let Some(raw) = lookup("ROOMCRAFT_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = parse_env("ROOMCRAFT_REQUEST_TIMEOUT_SECS", &raw)?;
        }
        if let Some(dir) = lookup("ROOMCRAFT_DOWNLOAD_DIR") {
            config.download_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let thresholds = self.budget_thresholds;
        if BudgetThresholds::new(thresholds.low_max, thresholds.medium_max).is_none() {
            return Err(ConfigError::InvalidThresholds {
                low_max: thresholds.low_max,
                medium_max: thresholds.medium_max,
            });
        }
        self.generation_url()?;
        Ok(())
    }

    pub fn generation_url(&self) -> Result<Url, ConfigError> {
        let base = Url::parse(self.endpoint.trim())
            .map_err(|_| ConfigError::InvalidEndpoint(self.endpoint.clone()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEndpoint(self.endpoint.clone()));
        }
        if base.path().trim_end_matches('/').is_empty() {
            return base
                .join(self.variant.endpoint_path())
                .map_err(|_| ConfigError::InvalidEndpoint(self.endpoint.clone()));
        }
        Ok(base)
    }

    pub fn payload_profile(&self) -> PayloadProfile {
        let mut profile = self.variant.profile();
        if let Some(inline) = self.inline_primary_image {
            profile.inline_primary_image = inline;
        }
        profile.inline_auxiliary_images = self.inline_auxiliary_images;
        profile.quality = self.quality.clone();
        profile.size = self.size.clone();
        profile
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

fn parse_env<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.replace(['_', ','], "")
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidEnv {
            key,
            value: raw.to_string(),
        })
}
