use config::shared::InsertFallback;
use tracing::{debug, info};

use crate::catalog::{Extract, TableDef};
use crate::error::{ErrorKind, LoadError, LoadResult};
use crate::loaders::{RowReader, expect_one};
use crate::store::{ChangeFilter, SourceStore, TargetStore};
use crate::types::{TableRow, TouchedIdentifiers};

/// How a changed source row converges into its target table.
///
/// Every strategy requires the final write to affect exactly one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStrategy {
    /// Insert the row; when the insert fails, update the row with the same key. Which failures
    /// fall back to the update is decided by [`InsertFallback`].
    InsertOrUpdate,
    /// Count the rows with the same key, then update when any exist and insert otherwise.
    ProbeThenWrite,
    /// Delete every row sharing the `scope` columns with the incoming row, then insert it.
    ///
    /// Only valid for relations whose columns are all part of the key, since nothing of the old
    /// row is preserved.
    FullReplace { scope: &'static [&'static str] },
}

/// Describes how one entity is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitySpec {
    pub extract: &'static Extract,
    pub strategy: LoadStrategy,
    /// Column whose values are reported as touched identifiers.
    pub touches: Option<&'static str>,
}

/// Result of loading one entity.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EntityOutcome {
    /// Number of source rows converged.
    pub rows: u64,
    pub touched: TouchedIdentifiers,
}

fn falls_back(fallback: InsertFallback, err: &LoadError) -> bool {
    match fallback {
        InsertFallback::KeyConflict => err.kind() == ErrorKind::KeyConflict,
        InsertFallback::AnyError => true,
    }
}

/// Converges every row of `spec.extract` changed since the filter's watermark.
///
/// Rows are applied one by one; the first failure aborts the entity and is returned unchanged.
pub async fn load_entity<S, T>(
    source: &S,
    target: &T,
    spec: &EntitySpec,
    filter: &ChangeFilter,
    fallback: InsertFallback,
) -> LoadResult<EntityOutcome>
where
    S: SourceStore,
    T: TargetStore,
{
    let extract = spec.extract;
    let rows = source.fetch_changed(extract, filter).await?;
    debug!(entity = extract.name, rows = rows.len(), "extracted changed rows");

    let mut outcome = EntityOutcome::default();
    for row in &rows {
        converge_row(target, extract.table, spec.strategy, fallback, row).await?;

        if let Some(column) = spec.touches {
            let id = RowReader::new(extract.name, extract.columns, row).i64(column)?;
            outcome.touched.insert(id);
        }
        outcome.rows += 1;
    }

    info!(entity = extract.name, rows = outcome.rows, "entity loaded");

    Ok(outcome)
}

/// Writes one row into `table` following `strategy`.
pub async fn converge_row<T>(
    target: &T,
    table: &'static TableDef,
    strategy: LoadStrategy,
    fallback: InsertFallback,
    row: &TableRow,
) -> LoadResult<()>
where
    T: TargetStore,
{
    let key = table.key_of(row)?;

    let affected = match strategy {
        LoadStrategy::InsertOrUpdate => match target.insert_row(table, row).await {
            Ok(affected) => affected,
            Err(err) if falls_back(fallback, &err) => {
                debug!(table = table.name, kind = ?err.kind(), "insert failed, updating");
                target.update_row(table, row).await?
            }
            Err(err) => return Err(err),
        },
        LoadStrategy::ProbeThenWrite => {
            if target.count_rows(table, &key).await? > 0 {
                target.update_row(table, row).await?
            } else {
                target.insert_row(table, row).await?
            }
        }
        LoadStrategy::FullReplace { scope } => {
            let scope_values = table.project(row, scope)?;
            target.delete_rows(table, scope, &scope_values).await?;
            target.insert_row(table, row).await?
        }
    };

    expect_one(table.name, &key, affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_error;

    #[test]
    fn key_conflict_fallback_only_retries_conflicts() {
        let conflict = load_error!(ErrorKind::KeyConflict, "Row with the same key already exists");
        let broken = load_error!(ErrorKind::TargetQueryFailed, "Target database statement failed");

        assert!(falls_back(InsertFallback::KeyConflict, &conflict));
        assert!(!falls_back(InsertFallback::KeyConflict, &broken));
        assert!(falls_back(InsertFallback::AnyError, &broken));
    }
}
