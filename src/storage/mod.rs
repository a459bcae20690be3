//! File-backed archive of analysis runs.
//!
//! Layout under the archive root:
//!
//! ```text
//! snapshots/{exchange}/{YYYY-MM-DD}.csv
//! recommendations/{exchange}/{YYYY-MM-DD_HH-MM-SS}.json
//! ```
//!
//! A snapshot is per day, so a later run on the same day replaces it.

use crate::models::{AnalyzedQuote, Exchange, Recommendation, Summary};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationBundle {
    pub timestamp: DateTime<Local>,
    pub exchange: Exchange,
    pub summary: Summary,
    pub recommendations: Vec<Recommendation>,
}

pub struct Archive {
    root: PathBuf,
}

impl Archive {
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)
            .with_context(|| format!("Could not create archive dir {:?}", root))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn dir(&self, kind: &str, exchange: Exchange) -> Result<PathBuf> {
        let dir = self.root.join(kind).join(exchange.id());
        fs::create_dir_all(&dir).with_context(|| format!("Could not create dir {:?}", dir))?;
        Ok(dir)
    }

    // ── Snapshots ─────────────────────────────────────────────────────────────

    pub fn save_daily_snapshot(
        &self,
        exchange: Exchange,
        stocks: &[AnalyzedQuote],
        at: DateTime<Local>,
    ) -> Result<PathBuf> {
        let path = self
            .dir("snapshots", exchange)?
            .join(format!("{}.csv", at.format("%Y-%m-%d")));

        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create {:?}", path))?;
        for row in stocks {
            writer
                .serialize(row)
                .with_context(|| format!("write snapshot row {}", row.symbol))?;
        }
        writer.flush()?;

        info!("Saved snapshot to {:?}", path);
        Ok(path)
    }

    /// Most recently written snapshot for `exchange`, if any.
    pub fn load_latest_snapshot(
        &self,
        exchange: Exchange,
    ) -> Result<Option<(PathBuf, Vec<AnalyzedQuote>)>> {
        let dir = self.root.join("snapshots").join(exchange.id());
        if !dir.exists() {
            info!("No snapshots found for {}", exchange);
            return Ok(None);
        }

        let mut latest: Option<(SystemTime, PathBuf)> = None;
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().map(|e| e != "csv").unwrap_or(true) {
                continue;
            }
            let modified = fs::metadata(&path)?.modified()?;
            let newer = match &latest {
                None => true,
                Some((t, p)) => (modified, &path) > (*t, p),
            };
            if newer {
                latest = Some((modified, path));
            }
        }

        let Some((_, path)) = latest else {
            info!("No snapshots found for {}", exchange);
            return Ok(None);
        };

        let mut reader = csv::Reader::from_path(&path)
            .with_context(|| format!("Failed to open {:?}", path))?;
        let rows = reader
            .deserialize()
            .collect::<Result<Vec<AnalyzedQuote>, _>>()
            .with_context(|| format!("Malformed snapshot {:?}", path))?;

        info!("Loaded snapshot from {:?}", path);
        Ok(Some((path, rows)))
    }

    // ── Recommendations ───────────────────────────────────────────────────────

    pub fn save_buy_recommendations(
        &self,
        exchange: Exchange,
        recommendations: &[Recommendation],
        summary: &Summary,
        at: DateTime<Local>,
    ) -> Result<PathBuf> {
        let path = self
            .dir("recommendations", exchange)?
            .join(format!("{}.json", at.format("%Y-%m-%d_%H-%M-%S")));

        let bundle = RecommendationBundle {
            timestamp: at,
            exchange,
            summary: summary.clone(),
            recommendations: recommendations.to_vec(),
        };
        let json = serde_json::to_string_pretty(&bundle)?;
        fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;

        info!("Saved recommendations to {:?}", path);
        Ok(path)
    }
}
