pub mod brasil_api;
pub mod geocode;
pub mod scrape;

pub use brasil_api::BrasilApiProvider;
pub use geocode::GeocodeProvider;
pub use scrape::ScrapeProvider;

use crate::config::ProviderSettings;
use crate::core::dispatcher::RateLimits;
use crate::core::resolver::{FallbackResolver, ProviderTier};
use crate::domain::model::ProviderKind;
use crate::domain::ports::Provider;
use crate::utils::error::{ProviderError, Result};
use reqwest::Client;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub fn build_provider(settings: &ProviderSettings, client: Client) -> Result<Arc<dyn Provider>> {
    let timeout = settings.timeout();
    let provider: Arc<dyn Provider> = match settings.kind {
        ProviderKind::BrasilApi => Arc::new(BrasilApiProvider::new(
            client,
            settings.base_url.clone(),
            timeout,
        )),
        ProviderKind::Geocode => Arc::new(GeocodeProvider::new(
            client,
            settings.base_url.clone(),
            timeout,
        )),
        ProviderKind::Scrape => Arc::new(ScrapeProvider::new(
            client,
            settings.base_url.clone(),
            timeout,
        )?),
    };
    Ok(provider)
}

/// 依設定順序建立 fallback 鏈，每層各自一個 dispatcher
pub fn build_resolver(settings: &[ProviderSettings]) -> Result<FallbackResolver> {
    let client = Client::builder()
        .user_agent(concat!("cep-geocoder/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let tiers = settings
        .iter()
        .filter(|s| s.enabled)
        .map(|s| {
            tracing::debug!(
                "Provider tier {}: {} ({} at once, {}/s)",
                s.kind,
                s.base_url,
                s.max_concurrent,
                s.max_per_second
            );
            Ok(ProviderTier::new(
                build_provider(s, client.clone())?,
                s.credential.clone(),
                RateLimits::new(s.max_concurrent, s.max_per_second)?,
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    FallbackResolver::new(tiers)
}

/// 整個查詢的時限；逾時轉為 `ProviderError::Timeout`
pub(crate) async fn with_deadline<T, F>(timeout: Duration, fut: F) -> std::result::Result<T, ProviderError>
where
    F: Future<Output = std::result::Result<T, ProviderError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout { after: timeout }),
    }
}

/// 座標可能是數字或數字字串
pub(crate) fn coordinate_value(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn join_path(base_url: &str, segment: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), segment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coordinate_value_accepts_numbers_and_strings() {
        assert_eq!(coordinate_value(Some(&json!(-23.5))), Some(-23.5));
        assert_eq!(coordinate_value(Some(&json!(" -46.6 "))), Some(-46.6));
        assert_eq!(coordinate_value(Some(&json!("Throttled!"))), None);
        assert_eq!(coordinate_value(None), None);
    }

    #[test]
    fn test_join_path() {
        assert_eq!(
            join_path("https://brasilapi.com.br/api/cep/v2/", "01310100"),
            "https://brasilapi.com.br/api/cep/v2/01310100"
        );
        assert_eq!(join_path("http://localhost:1234", "01310100"), "http://localhost:1234/01310100");
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_maps_to_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok::<(), ProviderError>(())
        };
        let result = with_deadline(Duration::from_secs(60), slow).await;
        assert_eq!(
            result,
            Err(ProviderError::Timeout {
                after: Duration::from_secs(60)
            })
        );
    }

    #[test]
    fn test_build_resolver_skips_disabled_tiers() {
        let mut scrape = ProviderSettings::new(ProviderKind::Scrape, "https://example.com/");
        scrape.enabled = false;
        let settings = vec![
            ProviderSettings::new(ProviderKind::BrasilApi, crate::config::BRASILAPI_URL),
            scrape,
        ];

        let resolver = build_resolver(&settings).unwrap();
        assert_eq!(resolver.tiers().len(), 1);
        assert_eq!(resolver.tiers()[0].kind(), ProviderKind::BrasilApi);
    }
}
