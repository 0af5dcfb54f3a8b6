//! Core run orchestration.
//!
//! A [`SyncRun`] applies every source change made since the last successful run: it reads the
//! watermark, converges each step of its [`LoadPlan`] in order, purges cache entries of the
//! coders it touched, and finally advances the watermark. A failing step aborts the run and the
//! watermark stays where it was, so the next run reprocesses the same window.

use chrono::{DateTime, Utc};
use config::shared::SyncConfig;
use tracing::{error, info, warn};

use crate::cache::{CacheKeyMatcher, CacheService, invalidate};
use crate::error::LoadResult;
use crate::loaders::{load_entity, load_ratings, load_season_ratings};
use crate::plan::{LoadPlan, LoadStep, StepJob};
use crate::rounds::RoundStartResolver;
use crate::store::{ChangeFilter, SourceStore, TargetStore};
use crate::types::TouchedIdentifiers;
use crate::watermark::WatermarkStore;

/// Number of rows one step converged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    pub step: LoadStep,
    pub rows: u64,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Instant the run began. Committed as the new watermark.
    pub started_at: DateTime<Utc>,
    /// Watermark the run extracted changes from.
    pub watermark: DateTime<Utc>,
    pub steps: Vec<StepReport>,
    pub touched: TouchedIdentifiers,
    /// Number of cache keys removed, or `None` when no cache is configured.
    pub invalidated: Option<usize>,
}

impl RunReport {
    /// Total number of rows converged across steps.
    pub fn rows(&self) -> u64 {
        self.steps.iter().map(|step| step.rows).sum()
    }
}

/// A single synchronization run over borrowed stores.
///
/// Runs must not overlap: the run assumes it is the only writer of the tables it loads and of
/// the watermark category.
#[derive(Debug)]
pub struct SyncRun<'a, S, T, C> {
    source: &'a S,
    target: &'a T,
    cache: Option<&'a C>,
    config: &'a SyncConfig,
    plan: LoadPlan,
}

impl<'a, S, T, C> SyncRun<'a, S, T, C>
where
    S: SourceStore,
    T: TargetStore,
    C: CacheService,
{
    /// Creates a run executing the default plan.
    pub fn new(source: &'a S, target: &'a T, cache: Option<&'a C>, config: &'a SyncConfig) -> Self {
        Self {
            source,
            target,
            cache,
            config,
            plan: LoadPlan::default(),
        }
    }

    /// Replaces the plan executed by the run.
    pub fn with_plan(mut self, plan: LoadPlan) -> Self {
        self.plan = plan;
        self
    }

    /// Executes the run to completion or to its first error.
    ///
    /// Errors raised by a step are tagged with the step's entity name.
    pub async fn execute(&self) -> LoadResult<RunReport> {
        let started_at = Utc::now();
        let watermarks = WatermarkStore::new(self.target, self.config.log_category);

        let watermark = watermarks.read().await?;
        let filter = ChangeFilter::new(watermark, self.config);
        let mut resolver = RoundStartResolver::new(self.source, self.config.coding_segment_id);

        info!(%watermark, steps = self.plan.steps().len(), "starting load run");

        let mut steps = Vec::with_capacity(self.plan.steps().len());
        let mut touched = TouchedIdentifiers::new();
        for step in self.plan.steps() {
            let rows = self
                .run_step(*step, &filter, &mut resolver, &mut touched)
                .await
                .map_err(|err| err.with_entity(step.name()))
                .inspect_err(|err| error!(entity = step.name(), error = %err, "load step failed"))?;

            steps.push(StepReport { step: *step, rows });
        }

        let invalidated = match self.cache {
            Some(cache) => {
                let matcher = CacheKeyMatcher::from_config(self.config);
                let removed = invalidate(cache, &matcher, &touched)
                    .await
                    .map_err(|err| err.with_entity("cache"))?;
                Some(removed)
            }
            None => {
                warn!(touched = touched.len(), "no cache configured, skipping invalidation");
                None
            }
        };

        watermarks
            .commit(started_at)
            .await
            .map_err(|err| err.with_entity("update_log"))?;

        let report = RunReport {
            started_at,
            watermark,
            steps,
            touched,
            invalidated,
        };
        info!(rows = report.rows(), touched = report.touched.len(), "load run succeeded");

        Ok(report)
    }

    async fn run_step(
        &self,
        step: LoadStep,
        filter: &ChangeFilter,
        resolver: &mut RoundStartResolver<'a, S>,
        touched: &mut TouchedIdentifiers,
    ) -> LoadResult<u64> {
        match step.job() {
            StepJob::Entity(spec) => {
                let outcome = load_entity(
                    self.source,
                    self.target,
                    &spec,
                    filter,
                    self.config.insert_fallback,
                )
                .await?;
                touched.extend(outcome.touched);
                Ok(outcome.rows)
            }
            StepJob::Rating => load_ratings(self.source, self.target, filter).await,
            StepJob::SeasonRating => {
                load_season_ratings(self.source, self.target, resolver, filter).await
            }
        }
    }
}
