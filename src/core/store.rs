use crate::core::normalize::normalize;
use crate::domain::model::{Coordinates, InvalidInput, Key, LookupResult, ProviderKind};
use crate::utils::error::{GeoError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// key → 查詢結果。已有座標的項目不會被無座標的項目覆蓋。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultStore {
    entries: BTreeMap<Key, LookupResult>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入；若既有項目已解析而新項目未解析則保留既有項目。回傳是否寫入。
    pub fn insert(&mut self, key: Key, result: LookupResult) -> bool {
        if let Some(existing) = self.entries.get(&key) {
            if existing.is_resolved() && !result.is_resolved() {
                tracing::debug!("Keeping resolved entry for {}", key);
                return false;
            }
        }
        self.entries.insert(key, result);
        true
    }

    pub fn get(&self, key: &Key) -> Option<&LookupResult> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn resolved_count(&self) -> usize {
        self.entries.values().filter(|r| r.is_resolved()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &LookupResult)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.keys()
    }

    /// 不存在或尚未解析的 key，需要（重新）查詢
    pub fn needs_lookup(&self, key: &Key) -> bool {
        self.entries.get(key).map(|r| !r.is_resolved()).unwrap_or(true)
    }

    pub fn load(snapshot: &str) -> Result<Self> {
        Self::load_with_diagnostics(snapshot).map(|(store, _)| store)
    }

    /// 無法正規化的 key 會略過，並以 `InvalidInput` 回報
    pub fn load_with_diagnostics(snapshot: &str) -> Result<(Self, Vec<InvalidInput>)> {
        let raw: BTreeMap<String, SnapshotEntry> = serde_json::from_str(snapshot)?;
        let mut store = Self::new();
        let mut invalid = Vec::new();
        for (raw_key, entry) in raw {
            match normalize(&raw_key) {
                Ok(key) => {
                    store.insert(key, entry.into_result());
                }
                Err(e) => {
                    tracing::warn!("⚠️ Skipping snapshot entry '{}': {}", raw_key, e);
                    invalid.push(InvalidInput {
                        raw: raw_key,
                        reason: e.to_string(),
                    });
                }
            }
        }
        tracing::debug!(
            "Loaded snapshot with {} entries ({} resolved, {} skipped)",
            store.len(),
            store.resolved_count(),
            invalid.len()
        );
        Ok((store, invalid))
    }

    pub fn load_bytes(snapshot: &[u8]) -> Result<(Self, Vec<InvalidInput>)> {
        let text = std::str::from_utf8(snapshot).map_err(|e| GeoError::Snapshot {
            message: format!("snapshot is not valid UTF-8: {}", e),
        })?;
        Self::load_with_diagnostics(text)
    }

    pub fn dump(&self) -> Result<String> {
        let entries: BTreeMap<&str, SnapshotEntry> = self
            .entries
            .iter()
            .map(|(key, result)| (key.as_str(), SnapshotEntry::from_result(key, result)))
            .collect();
        Ok(serde_json::to_string_pretty(&entries)?)
    }
}

/// 快照格式：沿用 BrasilAPI 的欄位，並附加 provider / attempted_providers / raw
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SnapshotEntry {
    #[serde(default)]
    cep: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    neighborhood: Option<String>,
    #[serde(default)]
    street: Option<String>,
    #[serde(default)]
    service: Option<String>,
    #[serde(default)]
    location: SnapshotLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    provider: Option<ProviderKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    attempted_providers: Vec<ProviderKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    raw: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotLocation {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    coordinates: SnapshotCoordinates,
}

impl Default for SnapshotLocation {
    fn default() -> Self {
        Self {
            kind: Some("Point".to_string()),
            coordinates: SnapshotCoordinates::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SnapshotCoordinates {
    #[serde(default, deserialize_with = "lenient_coordinate")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_coordinate")]
    longitude: Option<f64>,
}

const ATTRIBUTE_FIELDS: [&str; 6] = ["cep", "state", "city", "neighborhood", "street", "service"];

impl SnapshotEntry {
    fn from_result(key: &Key, result: &LookupResult) -> Self {
        let attribute = |name: &str| -> Option<String> {
            result
                .raw_payload()
                .and_then(|raw| raw.get(name))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let coordinates = result.coordinates();

        Self {
            cep: attribute("cep").or_else(|| Some(key.as_str().to_string())),
            state: attribute("state"),
            city: attribute("city"),
            neighborhood: attribute("neighborhood"),
            street: attribute("street"),
            service: attribute("service"),
            location: SnapshotLocation {
                kind: Some("Point".to_string()),
                coordinates: SnapshotCoordinates {
                    latitude: coordinates.map(|c| c.latitude),
                    longitude: coordinates.map(|c| c.longitude),
                },
            },
            provider: result.source_provider(),
            attempted_providers: result.attempted_providers().to_vec(),
            raw: result.raw_payload().cloned(),
        }
    }

    fn into_result(self) -> LookupResult {
        let coordinates = Coordinates::from_pair(
            self.location.coordinates.latitude,
            self.location.coordinates.longitude,
        );
        let raw_payload = self.raw.clone().or_else(|| self.legacy_payload());

        match coordinates {
            // 舊版快照沒有 provider 欄位，預設為 BrasilAPI
            Some(coordinates) => LookupResult::resolved(
                coordinates,
                self.provider.unwrap_or(ProviderKind::BrasilApi),
                raw_payload,
                self.attempted_providers,
            ),
            None => LookupResult::unresolved(raw_payload, self.attempted_providers),
        }
    }

    /// 沒有 `raw` 欄位時，以 BrasilAPI 欄位重建原始回應
    fn legacy_payload(&self) -> Option<Value> {
        let values = [
            &self.cep,
            &self.state,
            &self.city,
            &self.neighborhood,
            &self.street,
            &self.service,
        ];
        if self.provider.is_some() || values.iter().skip(1).all(|v| v.is_none()) {
            return None;
        }

        let mut object = serde_json::Map::new();
        for (name, value) in ATTRIBUTE_FIELDS.iter().zip(values) {
            if let Some(value) = value {
                object.insert(name.to_string(), Value::String(value.clone()));
            }
        }
        object.insert(
            "location".to_string(),
            serde_json::json!({
                "type": self.location.kind,
                "coordinates": {
                    "latitude": self.location.coordinates.latitude,
                    "longitude": self.location.coordinates.longitude,
                }
            }),
        );
        Some(Value::Object(object))
    }
}

/// 座標可能是數字、數字字串、空字串或 null
fn lenient_coordinate<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}
