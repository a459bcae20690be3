//! Pipeline orchestrator: scraper → analysis → archive.
//!
//! One `run()` is one cycle for one exchange:
//!   1. Resolve the symbols to fetch (explicit list, configured allowlist,
//!      or the whole descriptor table)
//!   2. Fetch quotes one at a time with a pause between symbols
//!   3. Rank, select and size the buy recommendations
//!   4. Archive the snapshot and the recommendation bundle (best-effort)
//!   5. Replace the cached result for that exchange
//!
//! Whatever goes wrong inside a cycle comes back as a failed
//! `AnalysisReport`, never as an error.

use crate::analysis::{DipAnalyzer, PositionSizer};
use crate::catalog::DescriptorTable;
use crate::config::AppConfig;
use crate::models::{AnalysisReport, Exchange};
use crate::scraper::extract::Extractor;
use crate::scraper::{DocumentSource, HttpClient, QuoteAggregator, QuoteFetcher};
use crate::storage::Archive;
use anyhow::{Context, Result, ensure};
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

// ── Result cache ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CachedAnalysis {
    pub report: AnalysisReport,
    pub cached_at: DateTime<Local>,
}

/// Last successful report per exchange. A new entry replaces the old one.
#[derive(Debug, Clone, Default)]
pub struct ResultCache {
    inner: Arc<RwLock<HashMap<Exchange, CachedAnalysis>>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn store(&self, exchange: Exchange, report: AnalysisReport) {
        let entry = CachedAnalysis {
            report,
            cached_at: Local::now(),
        };
        self.inner.write().await.insert(exchange, entry);
    }

    pub async fn get(&self, exchange: Exchange) -> Option<CachedAnalysis> {
        self.inner.read().await.get(&exchange).cloned()
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

pub struct Pipeline<S> {
    config: AppConfig,
    fetcher: QuoteFetcher<S>,
    analyzer: DipAnalyzer,
    sizer: PositionSizer,
    archive: Option<Archive>,
    cache: ResultCache,
}

impl Pipeline<HttpClient> {
    pub fn new(config: AppConfig, cache: ResultCache) -> Result<Self> {
        let client = HttpClient::new(&config.scraper).context("Failed to build scraper")?;

        let archive = if config.storage.enabled {
            match Archive::open(&config.storage.archive_dir) {
                Ok(a) => Some(a),
                Err(e) => {
                    warn!("Archive unavailable, results will not be persisted: {:#}", e);
                    None
                }
            }
        } else {
            info!("Archive disabled, results will not be persisted");
            None
        };

        Self::with_source(config, client, archive, cache)
    }
}

impl<S: DocumentSource> Pipeline<S> {
    pub fn with_source(
        config: AppConfig,
        source: S,
        archive: Option<Archive>,
        cache: ResultCache,
    ) -> Result<Self> {
        let extractor = Extractor::investing_com()?;
        Ok(Self {
            fetcher: QuoteFetcher::new(source, extractor, &config.scraper),
            analyzer: DipAnalyzer::new(&config.investment),
            sizer: PositionSizer::new(&config.investment),
            archive,
            cache,
            config,
        })
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Runs one cycle. `symbols` overrides the configured allowlist.
    pub async fn run(&self, exchange: Exchange, symbols: Option<Vec<String>>) -> AnalysisReport {
        match self.try_run(exchange, symbols).await {
            Ok(report) => report,
            Err(e) => {
                error!("Error analysing {} data: {:#}", exchange, e);
                AnalysisReport::failed(exchange, e.to_string())
            }
        }
    }

    /// Runs every exchange once per `every` until `shutdown` resolves.
    /// Shutdown is observed while waiting and mid-cycle; an interrupted
    /// cycle emits no report.
    pub async fn watch<F>(
        &self,
        exchanges: &[Exchange],
        every: Duration,
        shutdown: F,
        mut on_report: impl FnMut(&AnalysisReport),
    ) where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(every);
        tokio::pin!(shutdown);

        'watch: loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = &mut shutdown => break,
            }
            for exchange in exchanges {
                tokio::select! {
                    report = self.run(*exchange, None) => on_report(&report),
                    _ = &mut shutdown => break 'watch,
                }
            }
        }
        info!("Interrupted, stopping");
    }

    async fn try_run(
        &self,
        exchange: Exchange,
        symbols: Option<Vec<String>>,
    ) -> Result<AnalysisReport> {
        info!("Fetching {} stock data...", exchange);

        let table = DescriptorTable::for_exchange(exchange, &self.config);
        let filter = symbols
            .filter(|s| !s.is_empty())
            .or_else(|| self.config.symbol_filter(exchange));
        let delay = Duration::from_millis(self.config.scraper.request_delay_ms);

        let quotes = QuoteAggregator::new(&self.fetcher, &table, delay)
            .fetch_all(filter.as_deref())
            .await;

        if quotes.is_empty() {
            warn!("No {} data available", exchange);
            return Ok(AnalysisReport::no_data(exchange));
        }

        let rate = self.config.exchange_rate.usd_to_aed;
        ensure!(rate.is_finite() && rate > 0.0, "invalid USD→AED exchange rate {}", rate);

        let (stocks, picks) = self.analyzer.analyze(&quotes);
        let recommendations = self.sizer.size(&picks, rate);
        let summary = self.sizer.summarize(&recommendations);

        let report = AnalysisReport::completed(exchange, stocks, recommendations, summary);
        self.persist(&report);
        self.log_changes(&report).await;
        self.cache.store(exchange, report.clone()).await;

        Ok(report)
    }

    /// Archive failures are logged and otherwise ignored.
    fn persist(&self, report: &AnalysisReport) {
        let Some(archive) = &self.archive else {
            return;
        };
        let exchange = report.exchange;

        if let Err(e) = archive.save_daily_snapshot(exchange, &report.stocks, report.timestamp) {
            warn!("{}: failed to save snapshot: {:#}", exchange, e);
        }
        if let Some(summary) = &report.summary {
            if let Err(e) = archive.save_buy_recommendations(
                exchange,
                &report.recommendations,
                summary,
                report.timestamp,
            ) {
                warn!("{}: failed to save recommendations: {:#}", exchange, e);
            }
        }
    }

    async fn log_changes(&self, report: &AnalysisReport) {
        let Some(previous) = self.cache.get(report.exchange).await else {
            return;
        };
        let picks = |r: &AnalysisReport| -> Vec<String> {
            r.recommendations.iter().map(|x| x.quote.symbol.clone()).collect()
        };
        let (before, after) = (picks(&previous.report), picks(report));
        if before != after {
            info!(
                "{}: recommendations changed since {}: {:?} → {:?}",
                report.exchange,
                previous.cached_at.format("%H:%M:%S"),
                before,
                after
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StockDescriptor;
    use crate::scraper::testing::*;
    use std::fs;

    fn config() -> AppConfig {
        let mut cfg = AppConfig {
            scraper: fast_config(),
            ..AppConfig::default()
        };
        for (symbol, name) in [("A", "Alpha"), ("B", "Beta"), ("C", "Gamma")] {
            cfg.catalog.dfm.push(StockDescriptor {
                symbol: symbol.into(),
                name: name.into(),
                url: format!("https://quotes.test/{}", symbol.to_lowercase()),
            });
        }
        cfg
    }

    fn source() -> StaticSource {
        StaticSource::default()
            .page("https://quotes.test/a", &quote_page("90", "85", "100"))
            .page("https://quotes.test/b", &quote_page("95", "96", "100"))
            .page("https://quotes.test/c", &quote_page("70", "65", "100"))
    }

    #[tokio::test]
    async fn test_run_produces_ranked_sized_report() {
        let pipeline = Pipeline::with_source(config(), source(), None, ResultCache::new()).unwrap();
        let report = pipeline.run(Exchange::Dfm, None).await;

        assert!(report.success);
        let ranked: Vec<&str> = report.stocks.iter().map(|q| q.symbol.as_str()).collect();
        assert_eq!(ranked, vec!["C", "A", "B"]);
        let picks: Vec<&str> = report
            .recommendations
            .iter()
            .map(|r| r.quote.symbol.as_str())
            .collect();
        assert_eq!(picks, vec!["C", "A"]);

        let summary = report.summary.unwrap();
        assert_eq!(summary.num_stocks_to_buy, 2);
        assert_eq!(summary.total_allocated_aed, 2500.0);
    }

    #[tokio::test]
    async fn test_symbols_argument_overrides_allowlist() {
        let mut cfg = config();
        cfg.stocks.dfm = vec!["A".into()];
        let pipeline = Pipeline::with_source(cfg, source(), None, ResultCache::new()).unwrap();

        let report = pipeline.run(Exchange::Dfm, None).await;
        assert_eq!(report.stocks.len(), 1);

        let report = pipeline.run(Exchange::Dfm, Some(vec!["B".into(), "C".into()])).await;
        assert_eq!(report.stocks.len(), 2);
    }

    #[tokio::test]
    async fn test_no_quotes_is_flagged_no_data() {
        let cache = ResultCache::new();
        let pipeline =
            Pipeline::with_source(config(), StaticSource::default(), None, cache.clone()).unwrap();
        let report = pipeline.run(Exchange::Dfm, None).await;

        assert!(!report.success);
        assert_eq!(report.error.as_deref(), Some("No DFM data available"));
        assert!(report.stocks.is_empty());
        assert!(cache.get(Exchange::Dfm).await.is_none());
    }

    #[tokio::test]
    async fn test_bad_exchange_rate_is_reported_not_raised() {
        let mut cfg = config();
        cfg.exchange_rate.usd_to_aed = 0.0;
        let pipeline = Pipeline::with_source(cfg, source(), None, ResultCache::new()).unwrap();
        let report = pipeline.run(Exchange::Dfm, None).await;

        assert!(!report.success);
        assert!(report.error.unwrap().contains("exchange rate"));
        assert!(report.summary.is_none());
    }

    #[tokio::test]
    async fn test_cache_keeps_latest_report() {
        let cache = ResultCache::new();
        let pipeline = Pipeline::with_source(config(), source(), None, cache.clone()).unwrap();

        let first = pipeline.run(Exchange::Dfm, Some(vec!["A".into()])).await;
        let second = pipeline.run(Exchange::Dfm, None).await;

        let cached = cache.get(Exchange::Dfm).await.unwrap();
        assert_ne!(cached.report, first);
        assert_eq!(cached.report, second);
        assert!(pipeline.cache().get(Exchange::Adx).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_repeats_until_shutdown() {
        let pipeline = Pipeline::with_source(config(), source(), None, ResultCache::new()).unwrap();
        let mut reports = 0;

        pipeline
            .watch(
                &[Exchange::Dfm],
                Duration::from_secs(10),
                tokio::time::sleep(Duration::from_secs(25)),
                |r| {
                    assert!(r.success);
                    reports += 1;
                },
            )
            .await;

        // ticks at 0s, 10s and 20s
        assert_eq!(reports, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_stops_mid_cycle() {
        let mut cfg = config();
        cfg.scraper.request_delay_ms = 500;
        let pipeline = Pipeline::with_source(cfg, source(), None, ResultCache::new()).unwrap();
        let mut reports = 0;

        let start = tokio::time::Instant::now();
        pipeline
            .watch(
                &[Exchange::Dfm],
                Duration::from_secs(60),
                tokio::time::sleep(Duration::from_millis(250)),
                |_| reports += 1,
            )
            .await;

        assert_eq!(start.elapsed(), Duration::from_millis(250));
        assert_eq!(reports, 0);
        assert!(pipeline.cache().get(Exchange::Dfm).await.is_none());
    }

    #[test]
    fn test_cache_store_overwrites() {
        let cache = ResultCache::new();
        tokio_test::block_on(cache.store(Exchange::Adx, AnalysisReport::no_data(Exchange::Adx)));
        tokio_test::block_on(cache.store(
            Exchange::Adx,
            AnalysisReport::failed(Exchange::Adx, "boom"),
        ));

        let entry = tokio_test::block_on(cache.get(Exchange::Adx)).unwrap();
        assert_eq!(entry.report.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_run_archives_snapshot_and_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::open(dir.path()).unwrap();
        let pipeline =
            Pipeline::with_source(config(), source(), Some(archive), ResultCache::new()).unwrap();

        let report = pipeline.run(Exchange::Dfm, None).await;
        assert!(report.success);

        let snapshots = fs::read_dir(dir.path().join("snapshots/dfm")).unwrap().count();
        let bundles = fs::read_dir(dir.path().join("recommendations/dfm")).unwrap().count();
        assert_eq!(snapshots, 1);
        assert_eq!(bundles, 1);
    }

    #[tokio::test]
    async fn test_archive_failure_does_not_change_result() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::open(dir.path()).unwrap();
        // a plain file where the directories should go
        fs::write(dir.path().join("snapshots"), b"x").unwrap();
        fs::write(dir.path().join("recommendations"), b"x").unwrap();

        let with_archive =
            Pipeline::with_source(config(), source(), Some(archive), ResultCache::new()).unwrap();
        let without = Pipeline::with_source(config(), source(), None, ResultCache::new()).unwrap();

        let a = with_archive.run(Exchange::Dfm, None).await;
        let b = without.run(Exchange::Dfm, None).await;
        assert!(a.success);
        assert_eq!(a.stocks.len(), b.stocks.len());
        assert_eq!(a.recommendations.len(), b.recommendations.len());
        assert_eq!(a.summary, b.summary);
    }
}
