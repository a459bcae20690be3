//! Known listings per exchange and their quote pages.

use crate::config::AppConfig;
use crate::models::{Exchange, StockDescriptor};
use std::collections::HashSet;
use tracing::warn;
use url::Url;

const DFM_STOCKS: &[(&str, &str, &str)] = &[
    ("DFM", "Dubai Financial Market", "https://www.investing.com/equities/dfm"),
    ("EMAAR", "Emaar Properties", "https://www.investing.com/equities/emaar-properties"),
    ("DIB", "Dubai Islamic Bank", "https://www.investing.com/equities/dubai-islamic-bank"),
    ("ARABTECH", "Arabtec Holding", "https://www.investing.com/equities/arabtec-holding"),
    ("DEWA", "Dubai Electricity & Water", "https://www.investing.com/equities/dewa"),
    ("EMAARDEV", "Emaar Development", "https://www.investing.com/equities/emaar-development"),
    ("TAKAFUL", "Dubai Islamic Insurance", "https://www.investing.com/equities/dubai-islamic-insurance"),
    ("GFH", "GFH Financial Group", "https://www.investing.com/equities/gfh-financial-group"),
    ("DAMAC", "Damac Properties", "https://www.investing.com/equities/damac-properties"),
    ("AMANAT", "Amanat Holdings", "https://www.investing.com/equities/amanat-holdings"),
];

const ADX_STOCKS: &[(&str, &str, &str)] = &[
    ("FAB", "First Abu Dhabi Bank", "https://www.investing.com/equities/fab"),
    ("ADCB", "Abu Dhabi Commercial Bank", "https://www.investing.com/equities/adcb"),
    ("ALDAR", "Aldar Properties", "https://www.investing.com/equities/aldar-properties"),
    ("TAQA", "Abu Dhabi National Energy", "https://www.investing.com/equities/taqa"),
    ("ADNOCDIST", "ADNOC Distribution", "https://www.investing.com/equities/adnoc-distribution"),
    ("ADNOCDRILL", "ADNOC Drilling", "https://www.investing.com/equities/adnoc-drilling"),
    ("ADNHC", "Abu Dhabi National Hotels", "https://www.investing.com/equities/adnhc"),
    ("ALPHAMENA", "Alpha Dhabi Holding", "https://www.investing.com/equities/alpha-dhabi"),
    ("ADPORTS", "AD Ports Group", "https://www.investing.com/equities/ad-ports"),
    ("MULTIPLY", "Multiply Group", "https://www.investing.com/equities/multiply-group"),
];

/// Ordered symbol → descriptor table for one exchange.
#[derive(Debug, Clone)]
pub struct DescriptorTable {
    exchange: Exchange,
    entries: Vec<StockDescriptor>,
}

impl DescriptorTable {
    pub fn builtin(exchange: Exchange) -> Self {
        let rows = match exchange {
            Exchange::Dfm => DFM_STOCKS,
            Exchange::Adx => ADX_STOCKS,
        };
        let entries = rows
            .iter()
            .map(|(symbol, name, url)| StockDescriptor {
                symbol: symbol.to_string(),
                name: name.to_string(),
                url: url.to_string(),
            })
            .collect();
        Self { exchange, entries }
    }

    /// Builds a table from configured descriptors. Entries with an invalid
    /// URL or a repeated symbol are dropped with a warning.
    pub fn from_descriptors(exchange: Exchange, descriptors: &[StockDescriptor]) -> Self {
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(descriptors.len());

        for d in descriptors {
            let symbol = d.symbol.trim().to_uppercase();
            if symbol.is_empty() {
                warn!("{}: descriptor without symbol skipped", exchange);
                continue;
            }
            if let Err(e) = Url::parse(&d.url) {
                warn!("{}: invalid URL for {} ({}): {}", exchange, symbol, d.url, e);
                continue;
            }
            if !seen.insert(symbol.clone()) {
                warn!("{}: duplicate descriptor for {} skipped", exchange, symbol);
                continue;
            }
            entries.push(StockDescriptor {
                symbol,
                name: d.name.trim().to_string(),
                url: d.url.clone(),
            });
        }

        Self { exchange, entries }
    }

    /// Configured override if present, otherwise the built-in table.
    pub fn for_exchange(exchange: Exchange, config: &AppConfig) -> Self {
        let overrides = config.catalog.get(exchange);
        if overrides.is_empty() {
            Self::builtin(exchange)
        } else {
            Self::from_descriptors(exchange, overrides)
        }
    }

    pub fn exchange(&self) -> Exchange {
        self.exchange
    }

    pub fn get(&self, symbol: &str) -> Option<&StockDescriptor> {
        self.entries.iter().find(|d| d.symbol == symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StockDescriptor> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tables_keep_declaration_order() {
        let dfm = DescriptorTable::builtin(Exchange::Dfm);
        assert_eq!(dfm.len(), 10);
        assert_eq!(dfm.iter().next().unwrap().symbol, "DFM");

        let adx = DescriptorTable::builtin(Exchange::Adx);
        assert_eq!(adx.get("ALDAR").unwrap().name, "Aldar Properties");
        assert!(adx.get("EMAAR").is_none());
    }

    #[test]
    fn test_builtin_urls_are_valid() {
        for exchange in Exchange::ALL {
            for d in DescriptorTable::builtin(exchange).iter() {
                assert!(Url::parse(&d.url).is_ok(), "{}", d.url);
            }
        }
    }

    #[test]
    fn test_overrides_skip_bad_urls_and_duplicates() {
        let descriptors = vec![
            StockDescriptor { symbol: "emaar".into(), name: "Emaar".into(), url: "https://example.com/emaar".into() },
            StockDescriptor { symbol: "BAD".into(), name: "Bad".into(), url: "not a url".into() },
            StockDescriptor { symbol: "EMAAR".into(), name: "Dup".into(), url: "https://example.com/dup".into() },
        ];
        let table = DescriptorTable::from_descriptors(Exchange::Dfm, &descriptors);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("EMAAR").unwrap().name, "Emaar");
    }

    #[test]
    fn test_for_exchange_prefers_config() {
        let mut cfg = AppConfig::default();
        assert_eq!(DescriptorTable::for_exchange(Exchange::Adx, &cfg).len(), 10);

        cfg.catalog.adx.push(StockDescriptor {
            symbol: "FAB".into(),
            name: "First Abu Dhabi Bank".into(),
            url: "https://www.investing.com/equities/fab".into(),
        });
        let table = DescriptorTable::for_exchange(Exchange::Adx, &cfg);
        assert_eq!(table.len(), 1);
        assert_eq!(table.exchange(), Exchange::Adx);
    }
}
