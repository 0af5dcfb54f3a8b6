use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::bail;
use crate::catalog::{Extract, Predicate};
use crate::error::{ErrorKind, LoadResult};
use crate::store::{ChangeFilter, SourceStore};
use crate::types::{Cell, TableRow};

/// A source row together with the instant it was last modified.
#[derive(Debug, Clone)]
struct SourceRecord {
    modified_at: DateTime<Utc>,
    row: TableRow,
}

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<&'static str, Vec<SourceRecord>>,
    groups: HashMap<i64, BTreeSet<i64>>,
    round_starts: HashMap<(i64, i32), DateTime<Utc>>,
    attendance: HashMap<(i64, i32), i64>,
    failing_extracts: HashSet<&'static str>,
    round_lookups: usize,
}

/// In-memory operational database.
///
/// Rows are registered per extract in the extract's output layout. Predicates are evaluated on
/// the output row; a predicate whose column is not part of the output (because the real query
/// reads it from a joined table) is not evaluated.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a row of `extract` last modified at `modified_at`.
    pub async fn add_row(&self, extract: &'static Extract, modified_at: DateTime<Utc>, row: TableRow) {
        let mut inner = self.inner.lock().await;
        inner
            .records
            .entry(extract.name)
            .or_default()
            .push(SourceRecord { modified_at, row });
    }

    /// Drops every registered row of `extract`.
    pub async fn clear_rows(&self, extract: &'static Extract) {
        let mut inner = self.inner.lock().await;
        inner.records.remove(extract.name);
    }

    pub async fn add_group_member(&self, user_id: i64, group_id: i64) {
        let mut inner = self.inner.lock().await;
        inner.groups.entry(user_id).or_default().insert(group_id);
    }

    pub async fn set_round_start(&self, round_id: i64, segment_id: i32, start: DateTime<Utc>) {
        let mut inner = self.inner.lock().await;
        inner.round_starts.insert((round_id, segment_id), start);
    }

    pub async fn set_attendance(&self, coder_id: i64, season_id: i32, attended: i64) {
        let mut inner = self.inner.lock().await;
        inner.attendance.insert((coder_id, season_id), attended);
    }

    /// Makes every extraction of `extract` fail.
    pub async fn fail_extract(&self, extract: &'static Extract) {
        let mut inner = self.inner.lock().await;
        inner.failing_extracts.insert(extract.name);
    }

    /// Number of round start lookups served so far.
    pub async fn round_lookups(&self) -> usize {
        self.inner.lock().await.round_lookups
    }
}

fn output_value<'r>(extract: &Extract, row: &'r TableRow, column: &str) -> Option<&'r Cell> {
    extract
        .columns
        .iter()
        .position(|c| c.name == column)
        .and_then(|index| row.get(index))
}

fn admits(
    extract: &Extract,
    row: &TableRow,
    filter: &ChangeFilter,
    groups: &HashMap<i64, BTreeSet<i64>>,
) -> bool {
    extract.predicates.iter().all(|predicate| {
        let Some(value) = output_value(extract, row, predicate.output_column()) else {
            return true;
        };

        match predicate {
            Predicate::NotInGroups { .. } => value
                .as_i64()
                .and_then(|member| groups.get(&member))
                .is_none_or(|member_groups| {
                    !filter
                        .excluded_groups
                        .iter()
                        .any(|group| member_groups.contains(group))
                }),
            Predicate::RatingTypeIn { .. } => {
                filter.rating_types.is_empty()
                    || value
                        .as_i32()
                        .is_some_and(|rating_type| filter.rating_types.contains(&rating_type))
            }
            Predicate::ImageTypeIs { .. } => value.as_i32() == Some(filter.image_type_id),
            Predicate::TeamTypeIs { .. } => value.as_i32() == Some(filter.team_type_id),
        }
    })
}

impl SourceStore for MemorySource {
    async fn fetch_changed(
        &self,
        extract: &'static Extract,
        filter: &ChangeFilter,
    ) -> LoadResult<Vec<TableRow>> {
        let inner = self.inner.lock().await;

        if inner.failing_extracts.contains(extract.name) {
            bail!(
                ErrorKind::SourceQueryFailed,
                "Source database query failed",
                format!("injected failure extracting {}", extract.name)
            );
        }

        let rows = inner
            .records
            .get(extract.name)
            .into_iter()
            .flatten()
            .filter(|record| record.modified_at > filter.since)
            .filter(|record| admits(extract, &record.row, filter, &inner.groups))
            .map(|record| record.row.clone())
            .collect();

        Ok(rows)
    }

    async fn round_start(&self, round_id: i64, segment_id: i32) -> LoadResult<Option<DateTime<Utc>>> {
        let mut inner = self.inner.lock().await;
        inner.round_lookups += 1;

        Ok(inner.round_starts.get(&(round_id, segment_id)).copied())
    }

    async fn count_attended(&self, coder_id: i64, season_id: i32) -> LoadResult<i64> {
        let inner = self.inner.lock().await;

        Ok(inner
            .attendance
            .get(&(coder_id, season_id))
            .copied()
            .unwrap_or_default())
    }
}
