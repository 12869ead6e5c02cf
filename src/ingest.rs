//! Trend ingestion: rate limit check, fetch, parse, hash-keyed upsert and
//! checkpoint bookkeeping.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::db::{Database, Trend};
use crate::feed::{parse_trends_feed, FeedError, ParsedTrend};
use crate::fetcher::FeedFetcher;

/// Minimum time between two feed fetches.
pub const RATE_LIMIT_WINDOW_SECS: i64 = 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to fetch trends feed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("failed to parse trends feed: {0}")]
    Parse(#[from] FeedError),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Result of one call to [`TrendIngestor::update_trends_from_rss`].
#[derive(Debug, Clone, Serialize)]
pub struct UpdateSummary {
    pub message: String,
    #[serde(rename = "insertedTrendsCount")]
    pub inserted_count: usize,
    #[serde(rename = "updatedTrendsCount")]
    pub updated_count: usize,
    #[serde(rename = "addedTrends", skip_serializing_if = "Option::is_none")]
    pub added_trends: Option<Vec<Trend>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
}

impl UpdateSummary {
    fn skipped(last_checked_at: DateTime<Utc>) -> Self {
        Self {
            message: format!(
                "Trends were last checked at {}; skipping update (limit is once per hour)",
                last_checked_at.to_rfc3339()
            ),
            inserted_count: 0,
            updated_count: 0,
            added_trends: None,
            skipped: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct UpsertOutcome {
    pub added: Vec<Trend>,
    pub updated: usize,
}

/// Reconcile parsed trends with the store, one record at a time in feed
/// order. The first failing lookup or write aborts the remaining records.
pub async fn upsert_trends(
    db: &Database,
    parsed: &[ParsedTrend],
) -> anyhow::Result<UpsertOutcome> {
    let mut outcome = UpsertOutcome::default();

    for trend in parsed {
        match db.find_trend_by_hash(&trend.hash).await? {
            Some(existing) => {
                db.update_trend(existing.id, trend).await?;
                outcome.updated += 1;
            }
            None => {
                let inserted = db.insert_trend(trend).await?;
                outcome.added.push(inserted);
            }
        }
    }

    Ok(outcome)
}

/// True when the last run is recent enough that the feed must not be fetched.
pub fn within_rate_limit(last_checked_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    (now - last_checked_at).num_seconds() < RATE_LIMIT_WINDOW_SECS
}

pub struct TrendIngestor {
    db: Arc<Database>,
    fetcher: FeedFetcher,
    // Serializes the checkpoint read and write across concurrent requests.
    run_lock: Mutex<()>,
}

impl TrendIngestor {
    pub fn new(db: Arc<Database>, fetcher: FeedFetcher) -> Self {
        Self {
            db,
            fetcher,
            run_lock: Mutex::new(()),
        }
    }

    pub async fn update_trends_from_rss(&self) -> Result<UpdateSummary, IngestError> {
        let _guard = self.run_lock.lock().await;

        if let Some(checkpoint) = self.db.get_checkpoint().await? {
            if within_rate_limit(checkpoint.last_checked_at, Utc::now()) {
                info!(
                    "Trends checked at {}, skipping refresh",
                    checkpoint.last_checked_at
                );
                return Ok(UpdateSummary::skipped(checkpoint.last_checked_at));
            }
        }

        match self.run_cycle().await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                error!("Trend update failed: {}", e);
                Err(e)
            }
        }
    }

    async fn run_cycle(&self) -> Result<UpdateSummary, IngestError> {
        let xml = self.fetcher.fetch().await?;
        let parsed = parse_trends_feed(&xml)?;
        info!("Parsed {} trends from {}", parsed.len(), self.fetcher.feed_url());

        let outcome = upsert_trends(&self.db, &parsed).await?;
        self.db.save_checkpoint(Utc::now()).await?;

        let inserted_count = outcome.added.len();
        info!(
            "Trend update complete: {} inserted, {} updated",
            inserted_count, outcome.updated
        );

        Ok(UpdateSummary {
            message: format!(
                "Trends updated: {} new, {} refreshed",
                inserted_count, outcome.updated
            ),
            inserted_count,
            updated_count: outcome.updated,
            added_trends: Some(outcome.added),
            skipped: false,
        })
    }
}
