use crate::app::providers::{coordinate_value, with_deadline};
use crate::domain::model::{Coordinates, Key, ProviderHit, ProviderKind};
use crate::domain::ports::Provider;
use crate::utils::error::ProviderError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// 免費額度用盡時 latt/longt 會是這個字串
pub const THROTTLE_SENTINEL: &str = "Throttled! See geocode.xyz/pricing";

/// geocode.xyz 表單查詢，CEP 以 `DD.DDD-DDD` 送出
pub struct GeocodeProvider {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl GeocodeProvider {
    pub fn new(client: Client, base_url: String, timeout: Duration) -> Self {
        Self {
            client,
            base_url,
            timeout,
        }
    }

    async fn fetch(&self, key: &Key, credential: Option<&str>) -> Result<ProviderHit, ProviderError> {
        let locate = key.dotted();
        tracing::debug!("Consulting geocode.xyz for {} as {}", key, locate);

        let mut form = vec![
            ("locate", locate.as_str()),
            ("geoit", "JSON"),
            ("region", "BR"),
        ];
        if let Some(auth) = credential {
            form.push(("auth", auth));
        }

        let response = self.client.post(&self.base_url).form(&form).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ProviderError::Http {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let payload: Value =
            serde_json::from_str(&body).map_err(|e| ProviderError::Parse(e.to_string()))?;

        if let Some(error) = payload.get("error") {
            tracing::warn!("geocode.xyz returned an error for {}: {}", key, error);
            return Err(ProviderError::NoResult(error.to_string()));
        }
        if payload.get("latt").and_then(Value::as_str) == Some(THROTTLE_SENTINEL) {
            tracing::warn!("geocode.xyz quota exceeded while querying {}", key);
            return Err(ProviderError::Throttled);
        }

        let coordinates = Coordinates::from_pair(
            coordinate_value(payload.get("latt")),
            coordinate_value(payload.get("longt")),
        )
        .ok_or_else(|| ProviderError::NoResult("latt/longt missing or not numeric".to_string()))?;

        Ok(ProviderHit {
            coordinates,
            raw_payload: payload,
        })
    }
}

#[async_trait]
impl Provider for GeocodeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Geocode
    }

    async fn lookup(&self, key: &Key, credential: Option<&str>) -> Result<ProviderHit, ProviderError> {
        with_deadline(self.timeout, self.fetch(key, credential)).await
    }
}
