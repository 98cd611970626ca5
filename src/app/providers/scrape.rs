use crate::app::providers::{join_path, with_deadline};
use crate::domain::model::{Coordinates, Key, ProviderHit, ProviderKind};
use crate::domain::ports::Provider;
use crate::utils::error::{GeoError, ProviderError, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

/// 任何以 `{base}/{cep}/` 提供查詢、並以單一 iframe 內嵌地圖的網站。
///
/// 頁面必須剛好有一個 iframe；取其 `src` 後在地圖內容中找第一組
/// `[lat, lon]`（小數點後至少四位）。
pub struct ScrapeProvider {
    client: Client,
    base_url: String,
    timeout: Duration,
    iframe: Regex,
    src: Regex,
    coordinates: Regex,
}

impl ScrapeProvider {
    pub fn new(client: Client, base_url: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client,
            base_url,
            timeout,
            iframe: compile(r"(?is)<iframe\b[^>]*>")?,
            src: compile(r#"(?i)\ssrc\s*=\s*["']([^"']+)["']"#)?,
            coordinates: compile(r"\[\s*(-?\d{1,2}\.\d{4,})\s*,\s*(-?\d{1,3}\.\d{4,})\s*\]")?,
        })
    }

    /// 從頁面取出唯一 iframe 的絕對網址
    fn frame_url(&self, page_url: &str, html: &str) -> std::result::Result<Url, ProviderError> {
        let frames: Vec<&str> = self.iframe.find_iter(html).map(|m| m.as_str()).collect();
        let [frame] = frames.as_slice() else {
            return Err(ProviderError::ScrapeStructure(format!(
                "expected exactly one iframe, found {}",
                frames.len()
            )));
        };

        let src = self
            .src
            .captures(frame)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().replace("&amp;", "&"))
            .ok_or_else(|| ProviderError::ScrapeStructure("iframe has no src attribute".to_string()))?;

        let base = Url::parse(page_url).map_err(|e| ProviderError::ScrapeStructure(e.to_string()))?;
        base.join(&src)
            .map_err(|e| ProviderError::ScrapeStructure(format!("invalid iframe src {}: {}", src, e)))
    }

    fn first_coordinates(&self, body: &str) -> Option<Coordinates> {
        let caps = self.coordinates.captures(body)?;
        let latitude = caps.get(1)?.as_str().parse().ok();
        let longitude = caps.get(2)?.as_str().parse().ok();
        Coordinates::from_pair(latitude, longitude)
    }

    async fn get_text(&self, url: &str) -> std::result::Result<String, ProviderError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(ProviderError::Http {
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    async fn fetch(&self, key: &Key) -> std::result::Result<ProviderHit, ProviderError> {
        let page_url = format!("{}/", join_path(&self.base_url, key.as_str()));
        tracing::debug!("Scraping {} for {}", page_url, key);
        let page = self.get_text(&page_url).await?;

        let frame_url = self.frame_url(&page_url, &page)?;
        tracing::debug!("Following map frame for {}: {}", key, frame_url);
        let frame = self.get_text(frame_url.as_str()).await?;

        let coordinates = self.first_coordinates(&frame).ok_or_else(|| {
            ProviderError::ScrapeStructure("no coordinate pair in map frame".to_string())
        })?;

        Ok(ProviderHit {
            coordinates,
            raw_payload: serde_json::json!({
                "latitude": coordinates.latitude,
                "longitude": coordinates.longitude,
                "frame": frame_url.as_str(),
            }),
        })
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| GeoError::Config {
        message: format!("invalid scrape pattern {}: {}", pattern, e),
    })
}

#[async_trait]
impl Provider for ScrapeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Scrape
    }

    async fn lookup(&self, key: &Key, _credential: Option<&str>) -> std::result::Result<ProviderHit, ProviderError> {
        with_deadline(self.timeout, self.fetch(key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::normalize::normalize;
    use httpmock::prelude::*;

    const MAP_FRAME: &str = r#"<html><script>
        var initEmbed = [null,[[-23.5613991, -46.6565712],"Av. Paulista"],[[-22.9068, -43.1729]]];
    </script></html>"#;

    fn provider(server: &MockServer, timeout: Duration) -> ScrapeProvider {
        ScrapeProvider::new(Client::new(), server.url("/cep"), timeout).unwrap()
    }

    #[tokio::test]
    async fn test_follows_single_iframe() {
        let server = MockServer::start();
        let page = server.mock(|when, then| {
            when.method(GET).path("/cep/01310100/");
            then.status(200).body(
                r#"<html><body><h1>CEP 01310-100</h1>
                <iframe width="600" src="/maps/embed?q=01310100&amp;z=15"></iframe>
                </body></html>"#,
            );
        });
        let frame = server.mock(|when, then| {
            when.method(GET)
                .path("/maps/embed")
                .query_param("q", "01310100")
                .query_param("z", "15");
            then.status(200).body(MAP_FRAME);
        });

        let hit = provider(&server, Duration::from_secs(5))
            .lookup(&normalize("01310-100").unwrap(), None)
            .await
            .unwrap();

        page.assert();
        frame.assert();
        assert_eq!(hit.coordinates, Coordinates::new(-23.5613991, -46.6565712).unwrap());
        assert!(hit.raw_payload["frame"].as_str().unwrap().contains("/maps/embed"));
    }

    #[tokio::test]
    async fn test_two_iframes_is_structure_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/cep/01310100/");
            then.status(200).body(
                r#"<iframe src="/maps/a"></iframe><IFRAME src='/maps/b'></IFRAME>"#,
            );
        });

        let result = provider(&server, Duration::from_secs(5))
            .lookup(&normalize("01310100").unwrap(), None)
            .await;
        assert_eq!(
            result,
            Err(ProviderError::ScrapeStructure(
                "expected exactly one iframe, found 2".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_page_without_iframe_is_structure_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/cep/01310100/");
            then.status(200).body("<html><body><p>CEP não encontrado</p></body></html>");
        });

        let result = provider(&server, Duration::from_secs(5))
            .lookup(&normalize("01310100").unwrap(), None)
            .await;
        assert_eq!(
            result,
            Err(ProviderError::ScrapeStructure(
                "expected exactly one iframe, found 0".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_iframe_without_src_is_structure_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/cep/01310100/");
            then.status(200)
                .body(r#"<iframe width="600" data-src="/maps/embed"></iframe>"#);
        });
        let frame = server.mock(|when, then| {
            when.method(GET).path("/maps/embed");
            then.status(200).body(MAP_FRAME);
        });

        let result = provider(&server, Duration::from_secs(5))
            .lookup(&normalize("01310100").unwrap(), None)
            .await;
        frame.assert_hits(0);
        assert_eq!(
            result,
            Err(ProviderError::ScrapeStructure(
                "iframe has no src attribute".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_frame_without_coordinates() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/cep/01001000/");
            then.status(200).body(r#"<iframe src="/maps/embed"></iframe>"#);
        });
        server.mock(|when, then| {
            when.method(GET).path("/maps/embed");
            then.status(200).body("<html>[-23.5, -46.6]</html>");
        });

        let result = provider(&server, Duration::from_secs(5))
            .lookup(&normalize("01001000").unwrap(), None)
            .await;
        assert!(matches!(result, Err(ProviderError::ScrapeStructure(_))));
    }

    #[tokio::test]
    async fn test_slow_page_times_out() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/cep/01310100/");
            then.status(200)
                .delay(Duration::from_secs(2))
                .body(r#"<iframe src="/maps/embed"></iframe>"#);
        });

        let result = provider(&server, Duration::from_millis(200))
            .lookup(&normalize("01310100").unwrap(), None)
            .await;
        assert!(matches!(result, Err(ProviderError::Timeout { .. })));
    }
}
