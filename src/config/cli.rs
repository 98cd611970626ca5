use crate::config::toml_config::TomlConfig;
use crate::config::{default_providers, RunConfig, DEFAULT_KEY_COLUMN, DEFAULT_SNAPSHOT_DIR};
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "cep-geocoder")]
#[command(about = "Resolve coordinates for the postal codes of a CSV file")]
pub struct CliConfig {
    /// CSV file with a postal code column
    #[arg(long)]
    pub input: String,

    /// Where to write the CSV with latitude/longitude filled in
    #[arg(long, default_value = "saida.csv")]
    pub output: String,

    /// Snapshot from a previous run; resolved keys in it are not queried again
    #[arg(long)]
    pub snapshot: Option<String>,

    #[arg(long, default_value = DEFAULT_SNAPSHOT_DIR)]
    pub snapshot_dir: String,

    /// TOML file describing the provider chain
    #[arg(long)]
    pub config: Option<String>,

    #[arg(long, default_value = DEFAULT_KEY_COLUMN)]
    pub key_column: String,

    /// Only use the snapshot, do not query any provider
    #[arg(long)]
    pub offline: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[arg(long, help = "Log timing and memory for each phase")]
    pub monitor: bool,
}

impl CliConfig {
    /// 合併 CLI 參數與（選用的）TOML 供應商設定
    pub fn to_run_config(&self) -> Result<RunConfig> {
        let (providers, toml_run) = match &self.config {
            Some(path) => {
                tracing::info!("📁 Loading provider chain from: {}", path);
                let toml = TomlConfig::from_file(path)?;
                toml.validate()?;
                (toml.enabled_providers()?, Some(toml.run))
            }
            None => (default_providers(), None),
        };

        // CLI 參數為預設值時才採用 TOML 的設定
        let snapshot_dir = match &toml_run {
            Some(run) if self.snapshot_dir == DEFAULT_SNAPSHOT_DIR => run.snapshot_dir.clone(),
            _ => self.snapshot_dir.clone(),
        };
        let key_column = match &toml_run {
            Some(run) if self.key_column == DEFAULT_KEY_COLUMN => run.key_column.clone(),
            _ => self.key_column.clone(),
        };

        let config = RunConfig {
            input_path: self.input.clone(),
            output_path: self.output.clone(),
            snapshot_path: self.snapshot.clone(),
            snapshot_dir,
            key_column,
            offline: self.offline,
            providers,
        };
        config.validate()?;
        Ok(config)
    }
}
