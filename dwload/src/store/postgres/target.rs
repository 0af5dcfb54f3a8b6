use chrono::{DateTime, Utc};
use config::shared::PgConnectionConfig;
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::catalog::TableDef;
use crate::error::{LoadError, LoadResult, Side};
use crate::store::TargetStore;
use crate::store::postgres::codec::{bind_columns, decode_row};
use crate::store::postgres::create_database_pool;
use crate::store::postgres::sql;
use crate::types::{Cell, TableRow};

fn target_error(err: sqlx::Error) -> LoadError {
    LoadError::from_sqlx(Side::Target, err)
}

/// Writes converged rows and the watermark log to the warehouse Postgres database.
///
/// Every statement runs in its own implicit transaction.
#[derive(Debug, Clone)]
pub struct PostgresTarget {
    pool: PgPool,
}

impl PostgresTarget {
    /// Creates a target with a lazily connected pool.
    pub fn new(config: &PgConnectionConfig) -> Self {
        Self {
            pool: create_database_pool(config),
        }
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl TargetStore for PostgresTarget {
    async fn latest_watermark(&self, category: i32) -> LoadResult<Option<DateTime<Utc>>> {
        let instant: Option<Option<DateTime<Utc>>> = sqlx::query_scalar(sql::LATEST_WATERMARK)
            .bind(category)
            .fetch_optional(&self.pool)
            .await
            .map_err(target_error)?;

        Ok(instant.flatten())
    }

    async fn append_watermark(&self, category: i32, instant: DateTime<Utc>) -> LoadResult<u64> {
        let result = sqlx::query(sql::APPEND_WATERMARK)
            .bind(instant)
            .bind(category)
            .execute(&self.pool)
            .await
            .map_err(target_error)?;

        Ok(result.rows_affected())
    }

    async fn insert_row(&self, table: &'static TableDef, row: &TableRow) -> LoadResult<u64> {
        table.check_row(row)?;

        let statement = sql::insert(table);
        let columns: Vec<&str> = table.columns.iter().map(|column| column.name).collect();
        let query = bind_columns(sqlx::query(&statement), table, &columns, row.values())?;
        let result = query.execute(&self.pool).await.map_err(target_error)?;

        Ok(result.rows_affected())
    }

    async fn update_row(&self, table: &'static TableDef, row: &TableRow) -> LoadResult<u64> {
        table.check_row(row)?;

        let (statement, order) = sql::update(table);
        let values = table.project(row, &order)?;
        let query = bind_columns(sqlx::query(&statement), table, &order, &values)?;
        let result = query.execute(&self.pool).await.map_err(target_error)?;

        Ok(result.rows_affected())
    }

    async fn delete_rows(
        &self,
        table: &'static TableDef,
        columns: &'static [&'static str],
        values: &[Cell],
    ) -> LoadResult<u64> {
        let statement = sql::delete(table, columns);
        let query = bind_columns(sqlx::query(&statement), table, columns, values)?;
        let result = query.execute(&self.pool).await.map_err(target_error)?;
        debug!(table = table.name, rows = result.rows_affected(), "deleted rows");

        Ok(result.rows_affected())
    }

    async fn fetch_row(&self, table: &'static TableDef, key: &[Cell]) -> LoadResult<Option<TableRow>> {
        let statement = sql::select_by_key(table);
        let query = bind_columns(sqlx::query(&statement), table, table.key, key)?;
        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(target_error)?;

        row.map(|row| decode_row(&row, table.columns, Side::Target))
            .transpose()
    }

    async fn count_rows(&self, table: &'static TableDef, key: &[Cell]) -> LoadResult<u64> {
        let statement = sql::count_by_key(table);
        let query = bind_columns(sqlx::query(&statement), table, table.key, key)?;
        let row = query.fetch_one(&self.pool).await.map_err(target_error)?;
        let count: i64 = row.try_get(0).map_err(target_error)?;

        Ok(count.unsigned_abs())
    }
}
