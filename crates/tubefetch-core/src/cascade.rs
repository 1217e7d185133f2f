//! Ordered extraction fallback: try each strategy once, keep the first
//! usable result.

use crate::error::{ExtractError, FailedAttempt};
use crate::extractor::{Extractor, VideoInfo};
use crate::store::StrategyStore;
use crate::strategy::ExtractionStrategy;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A successful cascade run.
#[derive(Debug, Clone)]
pub struct CascadeOutcome {
    pub info: VideoInfo,
    pub strategy: ExtractionStrategy,
}

pub struct Cascade {
    extractor: Arc<dyn Extractor>,
    strategies: Vec<ExtractionStrategy>,
    store: Arc<dyn StrategyStore>,
}

impl Cascade {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        strategies: Vec<ExtractionStrategy>,
        store: Arc<dyn StrategyStore>,
    ) -> Self {
        Self {
            extractor,
            strategies,
            store,
        }
    }

    pub fn strategies(&self) -> &[ExtractionStrategy] {
        &self.strategies
    }

    pub fn store(&self) -> &Arc<dyn StrategyStore> {
        &self.store
    }

    /// Run the strategies in order until one yields a titled video with at
    /// least one format.
    pub async fn run(&self, url: &str) -> Result<CascadeOutcome, ExtractError> {
        self.run_ordered(url, self.strategies.iter().collect()).await
    }

    /// Like `run`, but the strategy that last worked for `video_id` goes
    /// first. The rest keep their configured order; none is tried twice.
    pub async fn run_preferring(
        &self,
        url: &str,
        video_id: Option<&str>,
    ) -> Result<CascadeOutcome, ExtractError> {
        let remembered = video_id.and_then(|id| self.store.get(id));
        let mut order: Vec<&ExtractionStrategy> = self.strategies.iter().collect();
        if let Some(pos) = remembered.and_then(|name| order.iter().position(|s| s.name == name)) {
            let preferred = order.remove(pos);
            debug!("Reusing strategy '{}' for {}", preferred.name, url);
            order.insert(0, preferred);
        }
        self.run_ordered(url, order).await
    }

    async fn run_ordered(
        &self,
        url: &str,
        order: Vec<&ExtractionStrategy>,
    ) -> Result<CascadeOutcome, ExtractError> {
        let mut attempts = Vec::with_capacity(order.len());

        for (index, strategy) in order.iter().enumerate() {
            info!(
                "[{}/{}] Trying {} with strategy '{}'",
                index + 1,
                order.len(),
                self.extractor.name(),
                strategy.name
            );

            let result = self
                .extractor
                .extract(url, strategy)
                .await
                .and_then(check_usable);

            match result {
                Ok(info) => {
                    info!("Strategy '{}' succeeded: {}", strategy.name, info.title);
                    self.store.record(&strategy.name, true);
                    if !info.id.is_empty() {
                        self.store.put(&info.id, &strategy.name);
                    }
                    return Ok(CascadeOutcome {
                        info,
                        strategy: (*strategy).clone(),
                    });
                }
                Err(e) => {
                    warn!("Strategy '{}' failed: {}", strategy.name, e);
                    self.store.record(&strategy.name, false);
                    attempts.push(FailedAttempt {
                        strategy: strategy.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Err(ExtractError::Exhausted { attempts })
    }
}

fn check_usable(info: VideoInfo) -> Result<VideoInfo, ExtractError> {
    if info.title.trim().is_empty() {
        return Err(ExtractError::Unusable("no title".to_string()));
    }
    if info.formats.is_empty() {
        return Err(ExtractError::Unusable("no formats".to_string()));
    }
    Ok(info)
}
