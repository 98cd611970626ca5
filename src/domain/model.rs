use crate::utils::error::ProviderError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 正規化後的 8 碼郵遞區號，只能經由 `core::normalize` 產生
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Key(String);

impl Key {
    pub(crate) fn from_normalized(digits: String) -> Self {
        Self(digits)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `DD.DDD-DDD` 格式，表單型供應商使用
    pub fn dotted(&self) -> String {
        let digits = self.0.as_str();
        format!(
            "{}.{}-{}",
            digits.get(0..2).unwrap_or_default(),
            digits.get(2..5).unwrap_or_default(),
            digits.get(5..8).unwrap_or_default()
        )
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// 只接受有限且落在地理範圍內的座標
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let usable = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        usable.then_some(Self {
            latitude,
            longitude,
        })
    }

    pub fn from_pair(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(lat), Some(lng)) => Self::new(lat, lng),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// 結構化 API（BrasilAPI `cep/v2`）
    BrasilApi,
    /// 表單 POST 的地理編碼服務（geocode.xyz）
    Geocode,
    /// 內嵌地圖 iframe 的網頁
    Scrape,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::BrasilApi => "brasilapi",
            ProviderKind::Geocode => "geocode",
            ProviderKind::Scrape => "scrape",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 供應商成功時回傳的片段
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderHit {
    pub coordinates: Coordinates,
    pub raw_payload: serde_json::Value,
}

/// 每個 key 的查詢結果。有座標時必定有來源供應商。
#[derive(Debug, Clone, PartialEq)]
pub struct LookupResult {
    coordinates: Option<Coordinates>,
    source_provider: Option<ProviderKind>,
    raw_payload: Option<serde_json::Value>,
    attempted_providers: Vec<ProviderKind>,
}

impl LookupResult {
    pub fn resolved(
        coordinates: Coordinates,
        source_provider: ProviderKind,
        raw_payload: Option<serde_json::Value>,
        attempted_providers: Vec<ProviderKind>,
    ) -> Self {
        Self {
            coordinates: Some(coordinates),
            source_provider: Some(source_provider),
            raw_payload,
            attempted_providers,
        }
    }

    pub fn unresolved(
        raw_payload: Option<serde_json::Value>,
        attempted_providers: Vec<ProviderKind>,
    ) -> Self {
        Self {
            coordinates: None,
            source_provider: None,
            raw_payload,
            attempted_providers,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.coordinates.is_some()
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        self.coordinates
    }

    pub fn source_provider(&self) -> Option<ProviderKind> {
        self.source_provider
    }

    pub fn raw_payload(&self) -> Option<&serde_json::Value> {
        self.raw_payload.as_ref()
    }

    pub fn attempted_providers(&self) -> &[ProviderKind] {
        &self.attempted_providers
    }
}

/// 外部表格的一列；座標欄位保留原始文字
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TabularRecord {
    pub raw_key: String,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    /// 其他欄位（grupo、icon、color、texto…）依原順序保留
    pub attributes: Vec<(String, String)>,
}

impl TabularRecord {
    pub fn new(raw_key: impl Into<String>) -> Self {
        Self {
            raw_key: raw_key.into(),
            ..Self::default()
        }
    }

    pub fn with_coordinates(mut self, latitude: &str, longitude: &str) -> Self {
        self.latitude = Some(latitude.to_string());
        self.longitude = Some(longitude.to_string());
        self
    }

    pub fn has_coordinates(&self) -> bool {
        is_present(&self.latitude) && is_present(&self.longitude)
    }
}

fn is_present(value: &Option<String>) -> bool {
    value
        .as_deref()
        .map(|v| {
            let v = v.trim();
            !v.is_empty() && !v.eq_ignore_ascii_case("nan") && !v.eq_ignore_ascii_case("null")
        })
        .unwrap_or(false)
}

/// 某個供應商失敗的原因
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptFailure {
    pub provider: ProviderKind,
    pub cause: ProviderError,
}

/// 整條 fallback 鏈都失敗的 key
#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedKey {
    pub key: Key,
    pub attempted_providers: Vec<ProviderKind>,
    pub failures: Vec<AttemptFailure>,
}

/// 無法正規化的原始輸入
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidInput {
    pub raw: String,
    pub reason: String,
}
