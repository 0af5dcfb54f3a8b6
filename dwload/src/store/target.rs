use chrono::{DateTime, Utc};
use std::future::Future;

use crate::catalog::TableDef;
use crate::error::LoadResult;
use crate::types::{Cell, TableRow};

/// Read/write access to the warehouse.
///
/// Write methods return the number of rows the statement affected; callers enforce their own
/// expectations on that count. Key arguments are given in [`TableDef::key`] order.
pub trait TargetStore {
    /// Returns the instant of the most recent watermark logged under `category`.
    fn latest_watermark(
        &self,
        category: i32,
    ) -> impl Future<Output = LoadResult<Option<DateTime<Utc>>>> + Send;

    /// Appends a watermark entry for `category`.
    fn append_watermark(
        &self,
        category: i32,
        instant: DateTime<Utc>,
    ) -> impl Future<Output = LoadResult<u64>> + Send;

    fn insert_row(
        &self,
        table: &'static TableDef,
        row: &TableRow,
    ) -> impl Future<Output = LoadResult<u64>> + Send;

    /// Overwrites the non-key columns of every row whose key equals the key of `row`.
    fn update_row(
        &self,
        table: &'static TableDef,
        row: &TableRow,
    ) -> impl Future<Output = LoadResult<u64>> + Send;

    /// Deletes every row whose `columns` equal `values`.
    fn delete_rows(
        &self,
        table: &'static TableDef,
        columns: &'static [&'static str],
        values: &[Cell],
    ) -> impl Future<Output = LoadResult<u64>> + Send;

    /// Returns one row with the given key, if any.
    fn fetch_row(
        &self,
        table: &'static TableDef,
        key: &[Cell],
    ) -> impl Future<Output = LoadResult<Option<TableRow>>> + Send;

    /// Counts the rows with the given key.
    fn count_rows(
        &self,
        table: &'static TableDef,
        key: &[Cell],
    ) -> impl Future<Output = LoadResult<u64>> + Send;
}
