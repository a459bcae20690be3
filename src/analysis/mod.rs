//! Dip-buy rule: rank quotes by their drop from the 52-week high and pick
//! the ones that are also trading above yesterday's close.
//!
//! How many to pick depends on the best candidate. A drop steeper than the
//! threshold allows `max_stocks_high_dip` picks, anything shallower allows
//! `max_stocks_low_dip`.

pub mod sizing;

use crate::config::InvestmentConfig;
use crate::models::{AnalyzedQuote, Quote};
use tracing::info;

pub use self::sizing::PositionSizer;

#[derive(Debug, Clone)]
pub struct DipAnalyzer {
    dip_threshold: f64,
    max_stocks_high_dip: usize,
    max_stocks_low_dip: usize,
}

impl DipAnalyzer {
    pub fn new(config: &InvestmentConfig) -> Self {
        Self {
            dip_threshold: config.dip_threshold_percent,
            max_stocks_high_dip: config.max_stocks_high_dip,
            max_stocks_low_dip: config.max_stocks_low_dip,
        }
    }

    /// Returns every quote ranked by drop (steepest first) and the
    /// candidates selected for purchase, in the same order.
    pub fn analyze(&self, quotes: &[Quote]) -> (Vec<AnalyzedQuote>, Vec<AnalyzedQuote>) {
        if quotes.is_empty() {
            return (Vec::new(), Vec::new());
        }

        let mut ranked: Vec<AnalyzedQuote> = quotes.iter().map(analyze_quote).collect();
        // stable: ties keep input order
        ranked.sort_by(|a, b| a.pct_from_52w_high.total_cmp(&b.pct_from_52w_high));

        let candidates: Vec<&AnalyzedQuote> = ranked.iter().filter(|q| q.meets_criteria).collect();
        let Some(top) = candidates.first() else {
            info!("No stocks meet buy criteria");
            return (ranked, Vec::new());
        };

        let top_drop = top.pct_from_52w_high;
        let cap = self.cap_for(top_drop);
        let picks: Vec<AnalyzedQuote> = candidates.into_iter().take(cap).cloned().collect();

        info!("Top stock drop: {:.2}%, recommending {} stocks", top_drop, picks.len());
        (ranked, picks)
    }

    /// Strictly below the threshold counts as a deep dip.
    pub fn cap_for(&self, top_drop: f64) -> usize {
        if top_drop < self.dip_threshold {
            self.max_stocks_high_dip
        } else {
            self.max_stocks_low_dip
        }
    }
}

pub fn analyze_quote(q: &Quote) -> AnalyzedQuote {
    let pct_from_52w_high = (q.current_price - q.week_52_high) / q.week_52_high * 100.0;
    let pct_change_from_prev = (q.current_price - q.previous_close) / q.previous_close * 100.0;
    let condition_a = q.current_price < q.week_52_high;
    let condition_b = q.current_price > q.previous_close;

    AnalyzedQuote {
        symbol: q.symbol.clone(),
        name: q.name.clone(),
        current_price: q.current_price,
        previous_close: q.previous_close,
        week_52_high: q.week_52_high,
        pct_from_52w_high,
        pct_change_from_prev,
        condition_a,
        condition_b,
        meets_criteria: condition_a && condition_b,
        last_updated: q.fetched_at,
    }
}

#[cfg(test)]
pub(crate) fn quote(symbol: &str, price: f64, prev: f64, high: f64) -> Quote {
    use chrono::{Local, TimeZone};
    Quote {
        symbol: symbol.to_string(),
        name: format!("{} Holding", symbol),
        current_price: price,
        previous_close: prev,
        week_52_high: high,
        fetched_at: Local.with_ymd_and_hms(2026, 10, 1, 10, 0, 0).unwrap(),
    }
}
