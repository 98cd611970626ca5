use crate::app::providers::{coordinate_value, join_path, with_deadline};
use crate::domain::model::{Coordinates, Key, ProviderHit, ProviderKind};
use crate::domain::ports::Provider;
use crate::utils::error::ProviderError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// BrasilAPI `cep/v2/{cep}`：200 且同時有 latitude/longitude 才算成功
pub struct BrasilApiProvider {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl BrasilApiProvider {
    pub fn new(client: Client, base_url: String, timeout: Duration) -> Self {
        Self {
            client,
            base_url,
            timeout,
        }
    }

    async fn fetch(&self, key: &Key) -> Result<ProviderHit, ProviderError> {
        let url = join_path(&self.base_url, key.as_str());
        tracing::debug!("Consulting BrasilAPI for {}: {}", key, url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ProviderError::Http {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let payload: Value =
            serde_json::from_str(&body).map_err(|e| ProviderError::Parse(e.to_string()))?;

        let coordinates = Coordinates::from_pair(
            coordinate_value(payload.pointer("/location/coordinates/latitude")),
            coordinate_value(payload.pointer("/location/coordinates/longitude")),
        )
        .ok_or_else(|| ProviderError::NoResult("response has no usable coordinates".to_string()))?;

        Ok(ProviderHit {
            coordinates,
            raw_payload: payload,
        })
    }
}

#[async_trait]
impl Provider for BrasilApiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::BrasilApi
    }

    async fn lookup(&self, key: &Key, _credential: Option<&str>) -> Result<ProviderHit, ProviderError> {
        with_deadline(self.timeout, self.fetch(key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::normalize::normalize;
    use httpmock::prelude::*;

    fn provider(server: &MockServer) -> BrasilApiProvider {
        BrasilApiProvider::new(Client::new(), server.url("/api/cep/v2/"), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_lookup_with_coordinates() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET).path("/api/cep/v2/01310100");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({
                    "cep": "01310100",
                    "state": "SP",
                    "city": "São Paulo",
                    "neighborhood": "Bela Vista",
                    "street": "Avenida Paulista",
                    "service": "open-cep",
                    "location": {
                        "type": "Point",
                        "coordinates": {"longitude": "-46.6558", "latitude": "-23.5614"}
                    }
                }));
        });

        let hit = provider(&server)
            .lookup(&normalize("01310-100").unwrap(), None)
            .await
            .unwrap();

        api_mock.assert();
        assert_eq!(hit.coordinates, Coordinates::new(-23.5614, -46.6558).unwrap());
        assert_eq!(hit.raw_payload["city"], "São Paulo");
    }

    #[tokio::test]
    async fn test_lookup_without_coordinates_is_no_result() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/cep/v2/01001000");
            then.status(200).json_body(serde_json::json!({
                "cep": "01001000",
                "location": {"type": "Point", "coordinates": {}}
            }));
        });

        let result = provider(&server)
            .lookup(&normalize("01001000").unwrap(), None)
            .await;
        assert!(matches!(result, Err(ProviderError::NoResult(_))));
    }

    #[tokio::test]
    async fn test_lookup_not_found_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/cep/v2/99999999");
            then.status(404).json_body(serde_json::json!({
                "name": "CepPromiseError",
                "message": "Todos os serviços de CEP retornaram erro."
            }));
        });

        let result = provider(&server)
            .lookup(&normalize("99999999").unwrap(), None)
            .await;
        assert_eq!(result, Err(ProviderError::Http { status: 404 }));
    }

    #[tokio::test]
    async fn test_lookup_invalid_json_is_parse_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/cep/v2/01310100");
            then.status(200).body("<html>maintenance</html>");
        });

        let result = provider(&server)
            .lookup(&normalize("01310100").unwrap(), None)
            .await;
        assert!(matches!(result, Err(ProviderError::Parse(_))));
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/cep/v2/01310100");
            then.status(200)
                .delay(Duration::from_secs(2))
                .json_body(serde_json::json!({}));
        });

        let slow = BrasilApiProvider::new(
            Client::new(),
            server.url("/api/cep/v2"),
            Duration::from_millis(200),
        );
        let result = slow.lookup(&normalize("01310100").unwrap(), None).await;
        assert!(matches!(result, Err(ProviderError::Timeout { .. })));
    }
}
