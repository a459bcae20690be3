pub mod aggregator;
pub mod extract;
pub mod http_client;

use crate::config::ScraperConfig;
use crate::models::{Quote, StockDescriptor};
use async_trait::async_trait;
use chrono::Local;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tokio_retry::strategy::FixedInterval;
use tracing::{debug, warn};

use self::extract::Extractor;

pub use self::aggregator::QuoteAggregator;
pub use self::http_client::HttpClient;

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The page came back but no current price could be read from it.
    #[error("could not extract price for {0}")]
    MissingPrice(String),
}

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable page source.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch_document(&self, url: &str) -> Result<String, FetchError>;
}

// ── Quote fetcher ─────────────────────────────────────────────────────────────

/// Fetches one quote page with bounded retries and extracts its fields.
pub struct QuoteFetcher<S> {
    source: S,
    extractor: Extractor,
    max_retries: u32,
    backoff: Duration,
}

impl<S: DocumentSource> QuoteFetcher<S> {
    pub fn new(source: S, extractor: Extractor, config: &ScraperConfig) -> Self {
        Self {
            source,
            extractor,
            max_retries: config.max_retries.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    async fn attempt(&self, descriptor: &StockDescriptor) -> Result<Quote, FetchError> {
        let html = self.source.fetch_document(&descriptor.url).await?;
        let fields = self.extractor.extract_page(&html);
        debug!("{}: extracted {:?}", descriptor.symbol, fields);

        Quote::from_fields(
            descriptor,
            fields.current_price,
            fields.previous_close,
            fields.week_52_high,
            Local::now(),
        )
        .ok_or_else(|| FetchError::MissingPrice(descriptor.symbol.clone()))
    }

    /// Up to `max_retries` attempts. Network and HTTP failures wait the
    /// fixed backoff before the next attempt; a page without a price is
    /// retried at once. `None` once every attempt has failed.
    pub async fn fetch(&self, descriptor: &StockDescriptor) -> Option<Quote> {
        let retries = (self.max_retries - 1) as usize;
        let mut backoff = FixedInterval::new(self.backoff).take(retries);

        let mut attempt = 1u32;
        loop {
            let err = match self.attempt(descriptor).await {
                Ok(quote) => return Some(quote),
                Err(e) => e,
            };

            match &err {
                FetchError::MissingPrice(_) => warn!("{} (attempt {})", err, attempt),
                _ => warn!("Error fetching {} (attempt {}): {}", descriptor.symbol, attempt, err),
            }

            let Some(delay) = backoff.next() else {
                warn!(
                    "{}: giving up after {} attempts ({})",
                    descriptor.symbol, self.max_retries, err
                );
                return None;
            };
            if !matches!(err, FetchError::MissingPrice(_)) {
                sleep(delay).await;
            }
            attempt += 1;
        }
    }
}
