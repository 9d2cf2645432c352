use std::time::Duration;
use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;

use crate::config::FETCH_TIMEOUT_SECS;
use crate::error::FetchError;

/// One row of the upstream ticker listing. Only `ticker` feeds the snapshot.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TickerRecord {
    pub ticker: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "primary_exchange")]
    pub exchange: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TickerListing {
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub next_url: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub results: Vec<TickerRecord>,
}

impl TickerListing {
    /// A zero count means the source has nothing to track, which is not an error.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.results.iter().map(|record| record.ticker.as_str())
    }
}

/// Where the poller gets its candidate instruments from.
#[async_trait]
pub trait TickerSource: Send + Sync {
    async fn fetch_listing(&self) -> Result<TickerListing, FetchError>;
}

/// Polygon.io v3 reference tickers endpoint.
pub struct PolygonSource {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    max_pages: usize,
}

impl PolygonSource {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, max_pages: usize) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_pages: max_pages.max(1),
        })
    }

    fn first_page_url(&self) -> String {
        format!(
            "{}/v3/reference/tickers?type=all&active=true&apiKey={}",
            self.base_url, self.api_key
        )
    }

    // next_url comes back without credentials
    fn with_api_key(&self, url: &str) -> String {
        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{}{}apiKey={}", url, separator, self.api_key)
    }

    async fn fetch_page(&self, url: &str) -> Result<TickerListing, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[async_trait]
impl TickerSource for PolygonSource {
    async fn fetch_listing(&self) -> Result<TickerListing, FetchError> {
        info!("Fetching ticker symbols from {}", self.base_url);

        let mut listing = self.fetch_page(&self.first_page_url()).await?;
        let mut pages = 1;

        while pages < self.max_pages {
            let next = match listing.next_url.take() {
                Some(next) => next,
                None => break,
            };

            let page = self.fetch_page(&self.with_api_key(&next)).await?;
            pages += 1;
            debug!("Fetched listing page {} with {} results", pages, page.results.len());

            listing.count += page.count;
            listing.results.extend(page.results);
            listing.next_url = page.next_url;
        }

        Ok(listing)
    }
}
