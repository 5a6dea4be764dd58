//! Image search providers.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::REFERER;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::{AppConfig, SafeSearch};
use crate::error::FetchError;

/// Best match returned by a search provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub image_url: Url,
    pub title: String,
}

#[async_trait]
pub trait ImageSearch: Send + Sync {
    /// Returns the single top image for `query`, or `None` when nothing matched.
    async fn top_image(&self, query: &str) -> Result<Option<SearchHit>, FetchError>;
}

/// DuckDuckGo image search.
///
/// The provider needs a per-query `vqd` token scraped from the regular search
/// page before its JSON endpoint will answer.
#[derive(Debug, Clone)]
pub struct DuckDuckGoImages {
    client: reqwest::Client,
    base_url: Url,
    region: String,
    safesearch: SafeSearch,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ImagePage {
    #[serde(default)]
    results: Vec<ImageResult>,
}

#[derive(Debug, Deserialize)]
struct ImageResult {
    image: String,
    #[serde(default)]
    title: String,
}

fn vqd_pattern() -> &'static Regex {
    static VQD: OnceLock<Regex> = OnceLock::new();
    VQD.get_or_init(|| Regex::new(r#"vqd=["']?([^"'&\s]+)"#).expect("vqd pattern compiles"))
}

/// Pulls the `vqd` token out of a search results page.
pub(crate) fn extract_vqd(page: &str) -> Option<&str> {
    vqd_pattern()
        .captures(page)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

impl DuckDuckGoImages {
    pub fn new(client: reqwest::Client, config: &AppConfig) -> Self {
        Self {
            client,
            base_url: config.search_url.clone(),
            region: config.region.clone(),
            safesearch: config.safesearch,
            timeout: config.search_timeout,
        }
    }

    async fn fetch_vqd(&self, query: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(self.base_url.clone())
            .query(&[("q", query), ("iax", "images"), ("ia", "images")])
            .timeout(self.timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status(),
                url: response.url().to_string(),
            });
        }
        let page = response.text().await?;
        extract_vqd(&page)
            .map(str::to_string)
            .ok_or_else(|| FetchError::Search("search page carried no vqd token".to_string()))
    }
}

#[async_trait]
impl ImageSearch for DuckDuckGoImages {
    async fn top_image(&self, query: &str) -> Result<Option<SearchHit>, FetchError> {
        let vqd = self.fetch_vqd(query).await?;
        debug!(query, vqd = %vqd, "obtained search token");

        let endpoint = self
            .base_url
            .join("i.js")
            .map_err(|e| FetchError::Search(format!("bad search endpoint: {e}")))?;
        let response = self
            .client
            .get(endpoint)
            .header(REFERER, self.base_url.as_str())
            .query(&[
                ("l", self.region.as_str()),
                ("o", "json"),
                ("q", query),
                ("vqd", vqd.as_str()),
                ("f", ",,,,,"),
                ("p", self.safesearch.as_param()),
            ])
            .timeout(self.timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status(),
                url: response.url().to_string(),
            });
        }

        let body = response.text().await?;
        let page: ImagePage = serde_json::from_str(&body)
            .map_err(|e| FetchError::Search(format!("unreadable search results: {e}")))?;

        let Some(first) = page.results.into_iter().next() else {
            debug!(query, "search returned no images");
            return Ok(None);
        };
        let image_url =
            Url::parse(&first.image).map_err(|_| FetchError::InvalidUrl(first.image.clone()))?;
        Ok(Some(SearchHit {
            image_url,
            title: first.title,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_quoted_and_bare_tokens() {
        assert_eq!(
            extract_vqd(r#"<script>nrj('/d.js?q=cat&vqd="4-1234567890"&p=1')</script>"#),
            Some("4-1234567890")
        );
        assert_eq!(extract_vqd("...&vqd=4-987&kl=wt-wt"), Some("4-987"));
        assert_eq!(extract_vqd("vqd='4-55'"), Some("4-55"));
        assert_eq!(extract_vqd("<html>no token here</html>"), None);
    }

    #[test]
    fn safesearch_maps_to_provider_param() {
        assert_eq!(SafeSearch::On.as_param(), "1");
        assert_eq!(SafeSearch::Moderate.as_param(), "1");
        assert_eq!(SafeSearch::Off.as_param(), "-1");
    }
}
