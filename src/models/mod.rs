use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ── Exchange ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    Dfm,
    Adx,
}

impl Exchange {
    pub const ALL: [Exchange; 2] = [Exchange::Dfm, Exchange::Adx];

    /// Lowercase id, used for config keys and archive paths.
    pub fn id(&self) -> &'static str {
        match self {
            Exchange::Dfm => "dfm",
            Exchange::Adx => "adx",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Exchange::Dfm => "DFM",
            Exchange::Adx => "ADX",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Exchange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dfm" => Ok(Exchange::Dfm),
            "adx" => Ok(Exchange::Adx),
            other => Err(format!("unknown exchange '{}' (expected dfm or adx)", other)),
        }
    }
}

// ── Descriptor ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockDescriptor {
    pub symbol: String,
    pub name: String,
    pub url: String,
}

// ── Quote ─────────────────────────────────────────────────────────────────────

/// One price snapshot. Only built when a current price was extracted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub name: String,
    pub current_price: f64,
    pub previous_close: f64,
    #[serde(rename = "52_week_high")]
    pub week_52_high: f64,
    #[serde(rename = "last_updated")]
    pub fetched_at: DateTime<Local>,
}

impl Quote {
    /// Builds a quote, substituting `current_price` for a missing or
    /// non-positive previous close / 52-week high. Returns `None` when the
    /// current price itself is unusable.
    pub fn from_fields(
        descriptor: &StockDescriptor,
        current_price: Option<f64>,
        previous_close: Option<f64>,
        week_52_high: Option<f64>,
        fetched_at: DateTime<Local>,
    ) -> Option<Self> {
        let current_price = current_price.filter(|p| *p > 0.0)?;
        let or_current = |v: Option<f64>| v.filter(|x| *x > 0.0).unwrap_or(current_price);

        Some(Self {
            symbol: descriptor.symbol.clone(),
            name: descriptor.name.clone(),
            current_price,
            previous_close: or_current(previous_close),
            week_52_high: or_current(week_52_high),
            fetched_at,
        })
    }
}

// ── Analysis output ───────────────────────────────────────────────────────────

/// A quote with its dip metrics and buy-rule flags.
///
/// Field names match the snapshot archive columns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyzedQuote {
    pub symbol: String,
    pub name: String,
    pub current_price: f64,
    pub previous_close: f64,
    #[serde(rename = "52_week_high")]
    pub week_52_high: f64,
    pub pct_from_52w_high: f64,
    pub pct_change_from_prev: f64,
    /// Below the 52-week high.
    pub condition_a: bool,
    /// Above the previous close.
    pub condition_b: bool,
    pub meets_criteria: bool,
    pub last_updated: DateTime<Local>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    #[serde(flatten)]
    pub quote: AnalyzedQuote,
    pub investment_aed: f64,
    pub investment_usd: f64,
    pub shares_to_buy: u64,
    pub total_cost_usd: f64,
    pub total_cost_aed: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    pub total_capital_aed: f64,
    pub allocation_per_stock_aed: f64,
    pub num_stocks_to_buy: usize,
    pub total_allocated_aed: f64,
    /// Nominal headroom; negative when the configuration over-allocates.
    pub available_capital_aed: f64,
    pub total_actual_cost_aed: f64,
}

// ── Report envelope ───────────────────────────────────────────────────────────

/// What a caller sees for one exchange cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisReport {
    pub success: bool,
    pub exchange: Exchange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub stocks: Vec<AnalyzedQuote>,
    pub recommendations: Vec<Recommendation>,
    pub summary: Option<Summary>,
    pub timestamp: DateTime<Local>,
}

impl AnalysisReport {
    pub fn completed(
        exchange: Exchange,
        stocks: Vec<AnalyzedQuote>,
        recommendations: Vec<Recommendation>,
        summary: Summary,
    ) -> Self {
        Self {
            success: true,
            exchange,
            error: None,
            stocks,
            recommendations,
            summary: Some(summary),
            timestamp: Local::now(),
        }
    }

    /// Nothing could be fetched.
    pub fn no_data(exchange: Exchange) -> Self {
        Self::failed(exchange, format!("No {} data available", exchange.label()))
    }

    pub fn failed(exchange: Exchange, error: impl Into<String>) -> Self {
        Self {
            success: false,
            exchange,
            error: Some(error.into()),
            stocks: Vec::new(),
            recommendations: Vec::new(),
            summary: None,
            timestamp: Local::now(),
        }
    }
}
