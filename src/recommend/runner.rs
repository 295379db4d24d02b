//! Bounded, retrying execution of a recommendation provider

use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::{RecommendationProvider, RecommendationStatus};
use crate::analytics::{QueryStats, RankedQuery};
use crate::config::RecommendationConfig;
use crate::error::{ProviderError, Result};

/// Calls a provider once per ranked query
pub struct RecommendationRunner {
    provider: Arc<dyn RecommendationProvider>,
    config: RecommendationConfig,
}

impl RecommendationRunner {
    pub fn new(provider: Arc<dyn RecommendationProvider>, config: RecommendationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { provider, config })
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// One status per query, in the order of `queries`
    pub async fn run(&self, queries: &[RankedQuery]) -> Vec<RecommendationStatus> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut tasks = JoinSet::new();

        for (index, query) in queries.iter().enumerate() {
            let provider = Arc::clone(&self.provider);
            let semaphore = Arc::clone(&semaphore);
            let config = self.config.clone();
            let stats = query.stats.clone();
            let rank = query.rank;

            tasks.spawn(async move {
                let status = match semaphore.acquire_owned().await {
                    Ok(_permit) => recommend_with_retry(provider, stats, &config, rank).await,
                    Err(_) => RecommendationStatus::Unavailable {
                        reason: "recommendation runner shut down".to_string(),
                    },
                };
                (index, status)
            });
        }

        let mut results: Vec<Option<RecommendationStatus>> = vec![None; queries.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, status)) => results[index] = Some(status),
                Err(e) => warn!("Recommendation task failed: {}", e),
            }
        }

        results
            .into_iter()
            .map(|status| {
                status.unwrap_or_else(|| RecommendationStatus::Unavailable {
                    reason: "recommendation task failed".to_string(),
                })
            })
            .collect()
    }
}

/// Delay before the next attempt, doubled and capped at `Duration::MAX`
fn next_backoff(backoff: Duration) -> Duration {
    backoff.saturating_mul(2)
}

async fn recommend_with_retry(
    provider: Arc<dyn RecommendationProvider>,
    stats: QueryStats,
    config: &RecommendationConfig,
    rank: usize,
) -> RecommendationStatus {
    let stats = Arc::new(stats);
    let mut backoff = Duration::from_millis(config.retry_backoff_ms);
    let mut attempt = 1;

    loop {
        let call_provider = Arc::clone(&provider);
        let call_stats = Arc::clone(&stats);
        let outcome = tokio::task::spawn_blocking(move || call_provider.recommend(&call_stats))
            .await
            .unwrap_or_else(|e| Err(ProviderError::Unavailable(format!("provider panicked: {e}"))));

        match outcome {
            Ok(recommendation) => return RecommendationStatus::Available(recommendation),
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                debug!(
                    "Provider {} failed for query #{} (attempt {}): {}; retrying",
                    provider.name(),
                    rank,
                    attempt,
                    e
                );
                tokio::time::sleep(backoff).await;
                backoff = next_backoff(backoff);
                attempt += 1;
            }
            Err(e) => {
                warn!(
                    "No recommendation from {} for query #{}: {}",
                    provider.name(),
                    rank,
                    e
                );
                return RecommendationStatus::Unavailable {
                    reason: e.to_string(),
                };
            }
        }
    }
}
