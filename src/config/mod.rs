#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::domain::model::ProviderKind;
use crate::utils::error::Result;
use crate::utils::validation::{validate_limits, validate_range, validate_url, Validate};
use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
pub use cli::CliConfig;

pub const BRASILAPI_URL: &str = "https://brasilapi.com.br/api/cep/v2/";
pub const GEOCODE_URL: &str = "https://geocode.xyz/";
pub const DEFAULT_MAX_CONCURRENT: usize = 10;
pub const DEFAULT_MAX_PER_SECOND: usize = 1;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;
pub const DEFAULT_SNAPSHOT_DIR: &str = "consultas";
pub const DEFAULT_KEY_COLUMN: &str = "cep";

/// 單一供應商層級的設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub base_url: String,
    #[serde(default)]
    pub credential: Option<String>,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_max_per_second")]
    pub max_per_second: usize,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_max_concurrent() -> usize {
    DEFAULT_MAX_CONCURRENT
}

fn default_max_per_second() -> usize {
    DEFAULT_MAX_PER_SECOND
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_enabled() -> bool {
    true
}

impl ProviderSettings {
    pub fn new(kind: ProviderKind, base_url: impl Into<String>) -> Self {
        Self {
            kind,
            base_url: base_url.into(),
            credential: None,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            max_per_second: DEFAULT_MAX_PER_SECOND,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            enabled: true,
        }
    }

    pub fn with_limits(mut self, max_concurrent: usize, max_per_second: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self.max_per_second = max_per_second;
        self
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_seconds)
    }
}

impl Validate for ProviderSettings {
    fn validate(&self) -> Result<()> {
        let field = format!("providers.{}", self.kind);
        validate_url(&format!("{}.base_url", field), &self.base_url)?;
        validate_limits(&format!("{}.", field), self.max_concurrent, self.max_per_second)?;
        validate_range(
            &format!("{}.timeout_seconds", field),
            self.timeout_seconds,
            1,
            600,
        )?;
        Ok(())
    }
}

/// 沒有 TOML 設定時的預設鏈：BrasilAPI → geocode.xyz
pub fn default_providers() -> Vec<ProviderSettings> {
    vec![
        ProviderSettings::new(ProviderKind::BrasilApi, BRASILAPI_URL),
        ProviderSettings::new(ProviderKind::Geocode, GEOCODE_URL),
    ]
}

/// 一次執行所需的完整設定（CLI 參數 + 供應商鏈）
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input_path: String,
    pub output_path: String,
    pub snapshot_path: Option<String>,
    pub snapshot_dir: String,
    pub key_column: String,
    pub offline: bool,
    pub providers: Vec<ProviderSettings>,
}

impl crate::domain::ports::ConfigProvider for RunConfig {
    fn input_path(&self) -> &str {
        &self.input_path
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn snapshot_path(&self) -> Option<&str> {
        self.snapshot_path.as_deref()
    }

    fn snapshot_dir(&self) -> &str {
        &self.snapshot_dir
    }

    fn key_column(&self) -> &str {
        &self.key_column
    }

    fn offline(&self) -> bool {
        self.offline
    }

    fn providers(&self) -> &[ProviderSettings] {
        &self.providers
    }
}

impl Validate for RunConfig {
    fn validate(&self) -> Result<()> {
        crate::utils::validation::validate_path("input", &self.input_path)?;
        crate::utils::validation::validate_file_extension("input", &self.input_path, &["csv"])?;
        crate::utils::validation::validate_path("output", &self.output_path)?;
        crate::utils::validation::validate_path("snapshot_dir", &self.snapshot_dir)?;
        crate::utils::validation::validate_non_empty_string("key_column", &self.key_column)?;

        if self.offline {
            crate::utils::validation::validate_required_field("snapshot", &self.snapshot_path)?;
        } else if !self.providers.iter().any(|p| p.enabled) {
            return Err(crate::utils::error::GeoError::MissingConfig {
                field: "providers".to_string(),
            });
        }

        for provider in &self.providers {
            provider.validate()?;
        }
        Ok(())
    }
}
