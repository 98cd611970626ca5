use crate::config::{ProviderSettings, DEFAULT_KEY_COLUMN, DEFAULT_SNAPSHOT_DIR};
use crate::utils::error::{GeoError, Result};
use crate::utils::validation::Validate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub run: RunSection,
    pub providers: Vec<ProviderSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSection {
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: String,
    #[serde(default = "default_key_column")]
    pub key_column: String,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            snapshot_dir: default_snapshot_dir(),
            key_column: default_key_column(),
        }
    }
}

fn default_snapshot_dir() -> String {
    DEFAULT_SNAPSHOT_DIR.to_string()
}

fn default_key_column() -> String {
    DEFAULT_KEY_COLUMN.to_string()
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(GeoError::Io)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| GeoError::Config {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${GEOCODE_API_KEY})；找不到的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = env_placeholder()?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 啟用中的供應商，依設定順序；未替換的憑證視為沒有憑證
    pub fn enabled_providers(&self) -> Result<Vec<ProviderSettings>> {
        let re = env_placeholder()?;
        Ok(self
            .providers
            .iter()
            .filter(|p| p.enabled)
            .cloned()
            .map(|mut provider| {
                if provider
                    .credential
                    .as_deref()
                    .is_some_and(|c| c.trim().is_empty() || re.is_match(c))
                {
                    tracing::warn!(
                        "⚠️ Credential for {} is not set, querying without it",
                        provider.kind
                    );
                    provider.credential = None;
                }
                provider
            })
            .collect())
    }
}

fn env_placeholder() -> Result<Regex> {
    Regex::new(r"\$\{([^}]+)\}").map_err(|e| GeoError::Config {
        message: format!("invalid placeholder pattern: {}", e),
    })
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        if self.providers.is_empty() {
            return Err(GeoError::MissingConfig {
                field: "providers".to_string(),
            });
        }
        crate::utils::validation::validate_path("run.snapshot_dir", &self.run.snapshot_dir)?;
        crate::utils::validation::validate_non_empty_string("run.key_column", &self.run.key_column)?;
        for provider in &self.providers {
            provider.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::ProviderKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CHAIN: &str = r#"
[run]
snapshot_dir = "geodecode"

[[providers]]
kind = "brasilapi"
base_url = "https://brasilapi.com.br/api/cep/v2/"
max_concurrent = 5
max_per_second = 2

[[providers]]
kind = "geocode"
base_url = "https://geocode.xyz/"
credential = "${CEP_GEOCODER_TEST_KEY}"

[[providers]]
kind = "scrape"
base_url = "https://example.com/cep/"
enabled = false
"#;

    #[test]
    fn test_parse_provider_chain() {
        let config = TomlConfig::from_toml_str(CHAIN).unwrap();

        assert_eq!(config.run.snapshot_dir, "geodecode");
        assert_eq!(config.run.key_column, "cep");
        assert_eq!(config.providers.len(), 3);
        assert_eq!(config.providers[0].kind, ProviderKind::BrasilApi);
        assert_eq!(config.providers[0].max_per_second, 2);
        assert_eq!(config.providers[1].max_concurrent, 10);
        assert_eq!(config.providers[1].timeout_seconds, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("CEP_GEOCODER_TEST_TOKEN", "segredo");
        let content = CHAIN.replace("CEP_GEOCODER_TEST_KEY", "CEP_GEOCODER_TEST_TOKEN");

        let config = TomlConfig::from_toml_str(&content).unwrap();
        let enabled = config.enabled_providers().unwrap();
        assert_eq!(enabled[1].credential.as_deref(), Some("segredo"));

        std::env::remove_var("CEP_GEOCODER_TEST_TOKEN");
    }

    #[test]
    fn test_unset_credential_and_disabled_provider_are_dropped() {
        let config = TomlConfig::from_toml_str(CHAIN).unwrap();
        let enabled = config.enabled_providers().unwrap();

        assert_eq!(enabled.len(), 2);
        assert_eq!(enabled[1].credential, None);
    }

    #[test]
    fn test_config_validation() {
        let content = CHAIN.replace("https://geocode.xyz/", "geocode.xyz");
        let config = TomlConfig::from_toml_str(&content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(CHAIN.as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.providers[2].kind, ProviderKind::Scrape);
        assert!(!config.providers[2].enabled);
    }
}
