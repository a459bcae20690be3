use crate::config::InvestmentConfig;
use crate::models::{AnalyzedQuote, Recommendation, Summary};

/// Turns picks into whole-share orders against a fixed AED allocation.
#[derive(Debug, Clone)]
pub struct PositionSizer {
    total_capital_aed: f64,
    allocation_per_stock_aed: f64,
}

impl PositionSizer {
    pub fn new(config: &InvestmentConfig) -> Self {
        Self {
            total_capital_aed: config.total_capital_aed,
            allocation_per_stock_aed: config.allocation_per_stock_aed,
        }
    }

    /// `usd_to_aed` is AED per USD; prices are quoted in USD.
    pub fn size(&self, picks: &[AnalyzedQuote], usd_to_aed: f64) -> Vec<Recommendation> {
        picks.iter().map(|q| self.size_one(q, usd_to_aed)).collect()
    }

    fn size_one(&self, quote: &AnalyzedQuote, usd_to_aed: f64) -> Recommendation {
        let investment_aed = self.allocation_per_stock_aed;
        let investment_usd = investment_aed / usd_to_aed;
        // never round up: spend stays within the allocation
        let shares_to_buy = (investment_usd / quote.current_price).floor().max(0.0) as u64;
        let total_cost_usd = shares_to_buy as f64 * quote.current_price;

        Recommendation {
            quote: quote.clone(),
            investment_aed,
            investment_usd,
            shares_to_buy,
            total_cost_usd,
            total_cost_aed: total_cost_usd * usd_to_aed,
        }
    }

    pub fn summarize(&self, recommendations: &[Recommendation]) -> Summary {
        let num_stocks_to_buy = recommendations.len();
        let total_allocated_aed = num_stocks_to_buy as f64 * self.allocation_per_stock_aed;

        Summary {
            total_capital_aed: self.total_capital_aed,
            allocation_per_stock_aed: self.allocation_per_stock_aed,
            num_stocks_to_buy,
            total_allocated_aed,
            available_capital_aed: self.total_capital_aed - total_allocated_aed,
            total_actual_cost_aed: recommendations.iter().map(|r| r.total_cost_aed).sum(),
        }
    }
}
