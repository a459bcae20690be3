use super::{DocumentSource, QuoteFetcher};
use crate::catalog::DescriptorTable;
use crate::models::{Quote, StockDescriptor};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Sequential, rate-limited fetch of a whole exchange.
pub struct QuoteAggregator<'a, S> {
    fetcher: &'a QuoteFetcher<S>,
    table: &'a DescriptorTable,
    delay: Duration,
}

impl<'a, S: DocumentSource> QuoteAggregator<'a, S> {
    pub fn new(fetcher: &'a QuoteFetcher<S>, table: &'a DescriptorTable, delay: Duration) -> Self {
        Self { fetcher, table, delay }
    }

    /// Descriptors to fetch, in request order. Unknown symbols are dropped.
    fn resolve(&self, filter: Option<&[String]>) -> Vec<&'a StockDescriptor> {
        let table = self.table;
        match filter {
            Some(symbols) if !symbols.is_empty() => symbols
                .iter()
                .filter_map(|s| {
                    let symbol = s.trim().to_uppercase();
                    let found = table.get(&symbol);
                    if found.is_none() {
                        warn!("Unknown {} symbol: {}", table.exchange(), symbol);
                    }
                    found
                })
                .collect(),
            _ => table.iter().collect(),
        }
    }

    /// One quote per resolvable symbol that could be fetched. Failures are
    /// omitted; an empty result is a normal outcome.
    pub async fn fetch_all(&self, filter: Option<&[String]>) -> Vec<Quote> {
        let descriptors = self.resolve(filter);
        let mut quotes = Vec::with_capacity(descriptors.len());

        for (i, d) in descriptors.iter().enumerate() {
            if i > 0 {
                sleep(self.delay).await;
            }
            info!("Fetching {}: {} ({})", self.table.exchange(), d.symbol, d.name);

            if let Some(q) = self.fetcher.fetch(d).await {
                quotes.push(q);
            }
        }

        info!(
            "{}: {} of {} quotes fetched",
            self.table.exchange(),
            quotes.len(),
            descriptors.len()
        );
        quotes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Exchange;
    use crate::scraper::extract::Extractor;
    use crate::scraper::testing::*;

    fn table() -> DescriptorTable {
        let descriptors: Vec<StockDescriptor> = ["FAB", "ADCB", "ALDAR"]
            .iter()
            .map(|s| StockDescriptor {
                symbol: s.to_string(),
                name: s.to_string(),
                url: format!("https://quotes.test/{}", s.to_lowercase()),
            })
            .collect();
        DescriptorTable::from_descriptors(Exchange::Adx, &descriptors)
    }

    fn source() -> StaticSource {
        StaticSource::default()
            .page("https://quotes.test/fab", &quote_page("15.20", "15.00", "18.00"))
            .failure("https://quotes.test/adcb")
            .page("https://quotes.test/aldar", &quote_page("5.10", "5.30", "6.00"))
    }

    #[tokio::test]
    async fn test_fetch_all_skips_failures() {
        let table = table();
        let fetcher = QuoteFetcher::new(source(), Extractor::investing_com().unwrap(), &fast_config());
        let agg = QuoteAggregator::new(&fetcher, &table, Duration::ZERO);

        let quotes = agg.fetch_all(None).await;
        let symbols: Vec<&str> = quotes.iter().map(|q| q.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["FAB", "ALDAR"]);
    }

    #[tokio::test]
    async fn test_filter_order_and_unknown_symbols() {
        let table = table();
        let fetcher = QuoteFetcher::new(source(), Extractor::investing_com().unwrap(), &fast_config());
        let agg = QuoteAggregator::new(&fetcher, &table, Duration::ZERO);

        let filter = vec!["aldar".to_string(), "NOPE".to_string(), "FAB".to_string()];
        let quotes = agg.fetch_all(Some(filter.as_slice())).await;
        let symbols: Vec<&str> = quotes.iter().map(|q| q.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["ALDAR", "FAB"]);
        assert_eq!(fetcher.source.request_count("https://quotes.test/adcb"), 0);
    }

    #[tokio::test]
    async fn test_empty_filter_means_all() {
        let table = table();
        let fetcher = QuoteFetcher::new(source(), Extractor::investing_com().unwrap(), &fast_config());
        let agg = QuoteAggregator::new(&fetcher, &table, Duration::ZERO);

        assert_eq!(agg.fetch_all(Some(&[][..])).await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_pacing_between_symbols_and_retries() {
        let table = table();
        let config = crate::config::ScraperConfig::default();
        let fetcher = QuoteFetcher::new(source(), Extractor::investing_com().unwrap(), &config);
        let agg = QuoteAggregator::new(&fetcher, &table, Duration::from_millis(config.request_delay_ms));

        let start = tokio::time::Instant::now();
        let quotes = agg.fetch_all(None).await;

        // 2 x 500ms between symbols, 2 x 1s backoff for ADCB, nothing trailing
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        assert_eq!(quotes.len(), 2);
        assert_eq!(fetcher.source.request_count("https://quotes.test/adcb"), 3);
    }

    #[tokio::test]
    async fn test_nothing_fetchable_is_empty_not_error() {
        let table = table();
        let fetcher = QuoteFetcher::new(
            StaticSource::default(),
            Extractor::investing_com().unwrap(),
            &fast_config(),
        );
        let agg = QuoteAggregator::new(&fetcher, &table, Duration::ZERO);

        assert!(agg.fetch_all(None).await.is_empty());
    }
}
