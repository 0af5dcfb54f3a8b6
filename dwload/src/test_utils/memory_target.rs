use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::bail;
use crate::catalog::TableDef;
use crate::error::{ErrorKind, LoadResult};
use crate::store::TargetStore;
use crate::types::{Cell, TableRow};

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<&'static str, Vec<TableRow>>,
    watermarks: Vec<(i32, DateTime<Utc>)>,
    failing_inserts: HashSet<&'static str>,
    failing_writes: HashSet<&'static str>,
    mutations: u64,
}

impl Inner {
    fn check_writable(&self, table: &TableDef) -> LoadResult<()> {
        if self.failing_writes.contains(table.name) {
            bail!(
                ErrorKind::TargetQueryFailed,
                "Target database statement failed",
                format!("injected failure writing {}", table.name)
            );
        }

        Ok(())
    }
}

/// In-memory warehouse.
///
/// Inserts enforce key uniqueness against the rows present, while [`MemoryTarget::seed_row`]
/// bypasses it so that tests can stage duplicate keys. [`MemoryTarget::mutations`] counts writes
/// that changed the stored state; rewriting a row with identical values is not a mutation.
#[derive(Debug, Clone, Default)]
pub struct MemoryTarget {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a target whose watermark log holds one entry for `category`.
    pub async fn with_watermark(category: i32, instant: DateTime<Utc>) -> Self {
        let target = Self::new();
        target
            .inner
            .lock()
            .await
            .watermarks
            .push((category, instant));
        target
    }

    /// Stores `row` without any key check and without counting a mutation.
    pub async fn seed_row(&self, table: &'static TableDef, row: TableRow) {
        let mut inner = self.inner.lock().await;
        inner.tables.entry(table.name).or_default().push(row);
    }

    /// Returns the rows of `table` in insertion order.
    pub async fn rows(&self, table: &'static TableDef) -> Vec<TableRow> {
        let inner = self.inner.lock().await;
        inner.tables.get(table.name).cloned().unwrap_or_default()
    }

    /// Returns every watermark logged for `category`, oldest first.
    pub async fn watermarks(&self, category: i32) -> Vec<DateTime<Utc>> {
        let inner = self.inner.lock().await;
        inner
            .watermarks
            .iter()
            .filter(|(logged, _)| *logged == category)
            .map(|(_, instant)| *instant)
            .collect()
    }

    pub async fn mutations(&self) -> u64 {
        self.inner.lock().await.mutations
    }

    /// Makes inserts into `table` fail with an error that is not a key conflict.
    pub async fn fail_inserts(&self, table: &'static TableDef) {
        self.inner.lock().await.failing_inserts.insert(table.name);
    }

    /// Makes every write to `table` fail.
    pub async fn fail_writes(&self, table: &'static TableDef) {
        self.inner.lock().await.failing_writes.insert(table.name);
    }

    /// Lets writes to `table` succeed again.
    pub async fn heal(&self, table: &'static TableDef) {
        let mut inner = self.inner.lock().await;
        inner.failing_inserts.remove(table.name);
        inner.failing_writes.remove(table.name);
    }
}

/// Resolves the positions of `columns` in `table`.
fn column_indices(table: &TableDef, columns: &[&str]) -> LoadResult<Vec<usize>> {
    let mut indices = Vec::with_capacity(columns.len());
    for name in columns {
        let Some(index) = table.column_index(name) else {
            bail!(
                ErrorKind::InvalidData,
                "Column is not part of the table",
                format!("table {} has no column {name}", table.name)
            );
        };
        indices.push(index);
    }

    Ok(indices)
}

fn row_matches(row: &TableRow, indices: &[usize], values: &[Cell]) -> bool {
    indices.len() == values.len()
        && indices
            .iter()
            .zip(values)
            .all(|(index, value)| row.get(*index) == Some(value))
}

impl TargetStore for MemoryTarget {
    async fn latest_watermark(&self, category: i32) -> LoadResult<Option<DateTime<Utc>>> {
        let inner = self.inner.lock().await;

        Ok(inner
            .watermarks
            .iter()
            .rev()
            .find(|(logged, _)| *logged == category)
            .map(|(_, instant)| *instant))
    }

    async fn append_watermark(&self, category: i32, instant: DateTime<Utc>) -> LoadResult<u64> {
        let mut inner = self.inner.lock().await;
        inner.watermarks.push((category, instant));

        Ok(1)
    }

    async fn insert_row(&self, table: &'static TableDef, row: &TableRow) -> LoadResult<u64> {
        table.check_row(row)?;
        let key = table.key_of(row)?;
        let indices = column_indices(table, table.key)?;

        let mut inner = self.inner.lock().await;
        inner.check_writable(table)?;
        if inner.failing_inserts.contains(table.name) {
            bail!(
                ErrorKind::TargetQueryFailed,
                "Target database statement failed",
                format!("injected insert failure on {}", table.name)
            );
        }

        let rows = inner.tables.entry(table.name).or_default();
        if rows.iter().any(|existing| row_matches(existing, &indices, &key)) {
            bail!(
                ErrorKind::KeyConflict,
                "Row with the same key already exists",
                format!("duplicate key in {}", table.name)
            );
        }
        rows.push(row.clone());
        inner.mutations += 1;

        Ok(1)
    }

    async fn update_row(&self, table: &'static TableDef, row: &TableRow) -> LoadResult<u64> {
        table.check_row(row)?;
        let key = table.key_of(row)?;
        let indices = column_indices(table, table.key)?;

        let mut inner = self.inner.lock().await;
        inner.check_writable(table)?;

        let mut affected = 0;
        let mut changed = 0;
        for existing in inner.tables.entry(table.name).or_default().iter_mut() {
            if row_matches(existing, &indices, &key) {
                affected += 1;
                if existing != row {
                    *existing = row.clone();
                    changed += 1;
                }
            }
        }
        inner.mutations += changed;

        Ok(affected)
    }

    async fn delete_rows(
        &self,
        table: &'static TableDef,
        columns: &'static [&'static str],
        values: &[Cell],
    ) -> LoadResult<u64> {
        let indices = column_indices(table, columns)?;

        let mut inner = self.inner.lock().await;
        inner.check_writable(table)?;

        let rows = inner.tables.entry(table.name).or_default();
        let before = rows.len();
        rows.retain(|row| !row_matches(row, &indices, values));
        let deleted = (before - rows.len()) as u64;
        inner.mutations += deleted;

        Ok(deleted)
    }

    async fn fetch_row(&self, table: &'static TableDef, key: &[Cell]) -> LoadResult<Option<TableRow>> {
        let indices = column_indices(table, table.key)?;
        let inner = self.inner.lock().await;

        Ok(inner
            .tables
            .get(table.name)
            .and_then(|rows| rows.iter().find(|row| row_matches(row, &indices, key)))
            .cloned())
    }

    async fn count_rows(&self, table: &'static TableDef, key: &[Cell]) -> LoadResult<u64> {
        let indices = column_indices(table, table.key)?;
        let inner = self.inner.lock().await;

        let count = inner
            .tables
            .get(table.name)
            .map(|rows| rows.iter().filter(|row| row_matches(row, &indices, key)).count())
            .unwrap_or_default();

        Ok(count as u64)
    }
}
