use crate::adapters::tabular::Table;
use crate::app::providers::build_resolver;
use crate::core::merge::merge;
use crate::core::normalize::normalize_all;
use crate::core::populate::{populate, UnresolvedRow};
use crate::core::resolver::Resolution;
use crate::core::store::ResultStore;
use crate::domain::model::{InvalidInput, Key, UnresolvedKey};
use crate::domain::ports::{ConfigProvider, Storage};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use std::collections::BTreeSet;
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub const SNAPSHOT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// 一次執行的摘要；未解析的 key 與列也以值的形式回傳
#[derive(Debug)]
pub struct RunReport {
    pub output_path: String,
    pub snapshot_path: String,
    pub distinct_keys: usize,
    pub keys_queried: usize,
    pub resolved_keys: usize,
    pub unresolved: Vec<UnresolvedKey>,
    pub pending: Vec<Key>,
    pub invalid_keys: Vec<InvalidInput>,
    /// 先前 snapshot 中被略過的 key
    pub invalid_snapshot_keys: Vec<InvalidInput>,
    pub rows_filled: usize,
    pub unresolved_rows: Vec<UnresolvedRow>,
}

impl RunReport {
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }
}

pub struct GeocodeEngine<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    monitor: SystemMonitor,
    cancel: CancellationToken,
}

impl<S: Storage, C: ConfigProvider> GeocodeEngine<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self::new_with_monitoring(storage, config, false)
    }

    pub fn new_with_monitoring(storage: S, config: C, monitor_enabled: bool) -> Self {
        Self {
            storage,
            config,
            monitor: SystemMonitor::new(monitor_enabled),
            cancel: CancellationToken::new(),
        }
    }

    /// 取消後尚未開始的查詢不再送出；已取得的結果仍會寫入 snapshot 與輸出
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&self) -> Result<RunReport> {
        tracing::info!("🚀 Starting geocoding run for {}", self.config.input_path());

        // Read
        let data = self.storage.read_file(self.config.input_path()).await?;
        let table = Table::from_csv(&data, self.config.key_column())?;
        tracing::info!("📥 Read {} rows", table.records.len());
        self.monitor.finish_phase("read");

        // Normalize
        let (keys, invalid_keys) = normalize_all(table.raw_keys());
        for invalid in &invalid_keys {
            tracing::warn!("⚠️ Skipping key '{}': {}", invalid.raw, invalid.reason);
        }
        let (prior, invalid_snapshot_keys) = self.load_prior().await?;
        let to_query: BTreeSet<Key> = keys
            .iter()
            .filter(|key| prior.needs_lookup(key))
            .cloned()
            .collect();
        tracing::info!(
            "🔑 {} distinct keys, {} already resolved, {} to query",
            keys.len(),
            keys.len() - to_query.len(),
            to_query.len()
        );
        self.monitor.finish_phase("normalize");

        // Resolve
        let (resolution, keys_queried) = if self.config.offline() {
            tracing::info!("📴 Offline run, no provider will be queried");
            (Resolution::default(), 0)
        } else if to_query.is_empty() {
            (Resolution::default(), 0)
        } else {
            let resolver = build_resolver(self.config.providers())?;
            let resolution = resolver.resolve(&to_query, &self.cancel).await?;
            let queried = to_query.len() - resolution.pending.len();
            (resolution, queried)
        };
        if !resolution.pending.is_empty() {
            tracing::warn!(
                "⏹️ Run cancelled, {} keys were not queried",
                resolution.pending.len()
            );
        }
        self.monitor.finish_phase("resolve");

        // Snapshot
        let merged = merge(&prior, &resolution.store);
        let snapshot_path = self.snapshot_path();
        self.storage
            .write_file(&snapshot_path, merged.dump()?.as_bytes())
            .await?;
        tracing::info!("💾 Snapshot with {} entries saved to {}", merged.len(), snapshot_path);
        self.monitor.finish_phase("snapshot");

        // Populate
        let outcome = populate(&table.records, &merged);
        let rows_filled = outcome.filled;
        let unresolved_rows = outcome.unresolved;
        let output = table.with_records(outcome.records).to_csv()?;
        self.storage
            .write_file(self.config.output_path(), &output)
            .await?;
        self.monitor.finish_phase("populate");
        self.monitor.log_final_stats();

        let resolved_keys = keys
            .iter()
            .filter(|key| merged.get(key).is_some_and(|r| r.is_resolved()))
            .count();

        // 本次沒有查詢、但 snapshot 裡仍未解析的 key 也列入
        let mut unresolved = resolution.unresolved;
        for key in &keys {
            let Some(entry) = merged.get(key) else {
                continue;
            };
            if entry.is_resolved()
                || resolution.pending.contains(key)
                || unresolved.iter().any(|u| &u.key == key)
            {
                continue;
            }
            unresolved.push(UnresolvedKey {
                key: key.clone(),
                attempted_providers: entry.attempted_providers().to_vec(),
                failures: Vec::new(),
            });
        }

        Ok(RunReport {
            output_path: self.config.output_path().to_string(),
            snapshot_path,
            distinct_keys: keys.len(),
            keys_queried,
            resolved_keys,
            unresolved,
            pending: resolution.pending,
            invalid_keys,
            invalid_snapshot_keys,
            rows_filled,
            unresolved_rows,
        })
    }

    async fn load_prior(&self) -> Result<(ResultStore, Vec<InvalidInput>)> {
        match self.config.snapshot_path() {
            Some(path) => {
                tracing::info!("📂 Loading prior snapshot from {}", path);
                let data = self.storage.read_file(path).await?;
                ResultStore::load_bytes(&data)
            }
            None => Ok((ResultStore::new(), Vec::new())),
        }
    }

    fn snapshot_path(&self) -> String {
        let name = format!(
            "{}.json",
            chrono::Local::now().format(SNAPSHOT_TIMESTAMP_FORMAT)
        );
        Path::new(self.config.snapshot_dir())
            .join(name)
            .to_string_lossy()
            .into_owned()
    }
}
