use crate::config::ProviderSettings;
use crate::domain::model::{Key, ProviderHit, ProviderKind};
use crate::utils::error::{ProviderError, Result};
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn input_path(&self) -> &str;
    fn output_path(&self) -> &str;
    fn snapshot_path(&self) -> Option<&str>;
    fn snapshot_dir(&self) -> &str;
    fn key_column(&self) -> &str;
    fn offline(&self) -> bool;
    fn providers(&self) -> &[ProviderSettings];
}

/// 能把一個 key 解析成座標的外部來源
#[async_trait]
pub trait Provider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// 任何 `Err` 都代表「此供應商無結果」，由呼叫端決定是否換下一個
    async fn lookup(
        &self,
        key: &Key,
        credential: Option<&str>,
    ) -> std::result::Result<ProviderHit, ProviderError>;
}
