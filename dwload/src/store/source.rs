use chrono::{DateTime, Utc};
use config::shared::SyncConfig;
use std::future::Future;

use crate::catalog::Extract;
use crate::error::LoadResult;
use crate::types::TableRow;

/// Extraction parameters shared by every entity of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeFilter {
    /// Only rows modified strictly after this instant are extracted.
    pub since: DateTime<Utc>,
    pub excluded_groups: Vec<i64>,
    /// Empty means every rating type.
    pub rating_types: Vec<i32>,
    pub image_type_id: i32,
    pub team_type_id: i32,
}

impl ChangeFilter {
    pub fn new(since: DateTime<Utc>, config: &SyncConfig) -> Self {
        Self {
            since,
            excluded_groups: config.excluded_group_ids.clone(),
            rating_types: config.rating_type_ids.clone(),
            image_type_id: config.image_type_id,
            team_type_id: config.team_type_id,
        }
    }
}

/// Read-only access to the operational database.
pub trait SourceStore {
    /// Returns the rows of `extract` changed after `filter.since`, with every predicate of the
    /// extract applied.
    ///
    /// Rows carry one value per [`Extract::columns`] entry, in the same order.
    fn fetch_changed(
        &self,
        extract: &'static Extract,
        filter: &ChangeFilter,
    ) -> impl Future<Output = LoadResult<Vec<TableRow>>> + Send;

    /// Returns the start of segment `segment_id` of round `round_id`, or `None` when the round
    /// or its segment does not exist.
    fn round_start(
        &self,
        round_id: i64,
        segment_id: i32,
    ) -> impl Future<Output = LoadResult<Option<DateTime<Utc>>>> + Send;

    /// Counts the rounds of `season_id` the coder attended.
    fn count_attended(
        &self,
        coder_id: i64,
        season_id: i32,
    ) -> impl Future<Output = LoadResult<i64>> + Send;
}
