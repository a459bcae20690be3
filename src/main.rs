mod analysis;
mod catalog;
mod config;
mod models;
mod pipeline;
mod scraper;
mod storage;
mod utils;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::catalog::DescriptorTable;
use crate::config::AppConfig;
use crate::models::{AnalysisReport, AnalyzedQuote, Exchange};
use crate::pipeline::{Pipeline, ResultCache};
use crate::storage::Archive;
use crate::utils::{fmt_amount, fmt_pct};

#[derive(Parser)]
#[command(name = "dip-tracker", about = "DFM/ADX dip-buy tracker", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch quotes and print buy recommendations
    Analyze {
        /// Exchanges to analyse (default: dfm and adx)
        exchanges: Vec<Exchange>,

        /// Only these symbols, e.g. --symbols EMAAR,DIB
        #[arg(short, long, value_delimiter = ',')]
        symbols: Vec<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-run the analysis on a fixed interval until Ctrl-C
    Watch {
        exchanges: Vec<Exchange>,

        #[arg(short, long, default_value_t = 900)]
        interval_secs: u64,
    },

    /// Show the most recent archived snapshot (no network)
    Latest {
        exchange: Exchange,

        #[arg(long)]
        json: bool,
    },

    /// List the tracked symbols of an exchange
    Symbols { exchange: Exchange },
}

fn or_all(exchanges: Vec<Exchange>) -> Vec<Exchange> {
    if exchanges.is_empty() {
        Exchange::ALL.to_vec()
    } else {
        exchanges
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "dip_tracker=info,warn",
        1 => "dip_tracker=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load();

    match cli.command {
        Command::Analyze {
            exchanges,
            symbols,
            json,
        } => {
            let _t = utils::Timer::start("Analysis");
            let pipeline = Pipeline::new(config, ResultCache::new())?;
            let symbols = if symbols.is_empty() { None } else { Some(symbols) };

            let mut reports = Vec::new();
            for exchange in or_all(exchanges) {
                reports.push(pipeline.run(exchange, symbols.clone()).await);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                reports.iter().for_each(print_report);
            }
        }

        Command::Watch {
            exchanges,
            interval_secs,
        } => {
            if interval_secs == 0 {
                bail!("--interval-secs must be positive");
            }
            let exchanges = or_all(exchanges);
            let pipeline = Pipeline::new(config, ResultCache::new())?;
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Cannot listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            };

            pipeline
                .watch(
                    &exchanges,
                    Duration::from_secs(interval_secs),
                    shutdown,
                    print_report,
                )
                .await;

            for exchange in &exchanges {
                if let Some(last) = pipeline.cache().get(*exchange).await {
                    info!(
                        "{}: last successful run at {}",
                        exchange,
                        last.cached_at.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
        }

        Command::Latest { exchange, json } => {
            let archive = Archive::open(&config.storage.archive_dir)?;
            match archive.load_latest_snapshot(exchange)? {
                Some((path, rows)) if json => {
                    info!("Snapshot {:?}", path);
                    println!("{}", serde_json::to_string_pretty(&rows)?);
                }
                Some((path, rows)) => {
                    println!("Snapshot: {}", path.display());
                    print_stocks(&rows);
                }
                None => println!("No {} snapshot archived yet, run `dip-tracker analyze` first.", exchange),
            }
        }

        Command::Symbols { exchange } => {
            let table = DescriptorTable::for_exchange(exchange, &config);
            let allow = config.symbol_filter(exchange);
            println!("{} symbols ({}):", exchange, table.len());
            for d in table.iter() {
                let mark = match &allow {
                    Some(list) if !list.contains(&d.symbol) => " (not in allowlist)",
                    _ => "",
                };
                println!("  {:<11} {}{}", d.symbol, d.name, mark);
            }
            if let Some(list) = &allow {
                for s in list.iter().filter(|s| table.get(s).is_none()) {
                    warn!("Allowlisted {} symbol {} is unknown", exchange, s);
                }
            }
        }
    }

    Ok(())
}

// ── Output ────────────────────────────────────────────────────────────────────

fn print_stocks(rows: &[AnalyzedQuote]) {
    println!(
        "  {:<11} {:>10} {:>10} {:>10} {:>9} {:>8}  {}",
        "Symbol", "Price", "Prev", "52W High", "vs High", "vs Prev", "Buy?"
    );
    for q in rows {
        println!(
            "  {:<11} {:>10.2} {:>10.2} {:>10.2} {:>9} {:>8}  {}",
            q.symbol,
            q.current_price,
            q.previous_close,
            q.week_52_high,
            fmt_pct(q.pct_from_52w_high),
            fmt_pct(q.pct_change_from_prev),
            if q.meets_criteria { "yes" } else { "" },
        );
    }
}

fn print_report(report: &AnalysisReport) {
    println!("─────────────────────────────────────────────────────────────────");
    println!("  {} — {}", report.exchange, report.timestamp.format("%Y-%m-%d %H:%M:%S"));
    println!("─────────────────────────────────────────────────────────────────");

    if !report.success {
        println!("  {}", report.error.as_deref().unwrap_or("Analysis failed"));
        return;
    }

    print_stocks(&report.stocks);
    println!();

    if report.recommendations.is_empty() {
        println!("  No stocks meet buy criteria.");
    } else {
        println!("  Buy:");
        for r in &report.recommendations {
            println!(
                "    {:<11} {:>5} shares @ {:.2} USD = {} AED",
                r.quote.symbol,
                r.shares_to_buy,
                r.quote.current_price,
                fmt_amount(r.total_cost_aed)
            );
        }
    }

    if let Some(s) = &report.summary {
        println!();
        println!("  Capital   : {} AED", fmt_amount(s.total_capital_aed));
        println!(
            "  Allocated : {} AED ({} × {})",
            fmt_amount(s.total_allocated_aed),
            s.num_stocks_to_buy,
            fmt_amount(s.allocation_per_stock_aed)
        );
        println!("  Spent     : {} AED", fmt_amount(s.total_actual_cost_aed));
        println!("  Available : {} AED", fmt_amount(s.available_capital_aed));
    }
}
