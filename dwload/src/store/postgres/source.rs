use chrono::{DateTime, Utc};
use config::shared::PgConnectionConfig;
use sqlx::PgPool;
use tracing::debug;

use crate::catalog::Extract;
use crate::error::{LoadError, LoadResult, Side};
use crate::store::postgres::codec::decode_row;
use crate::store::postgres::sql::{self, FilterBind};
use crate::store::postgres::create_database_pool;
use crate::store::{ChangeFilter, SourceStore};
use crate::types::TableRow;

fn source_error(err: sqlx::Error) -> LoadError {
    LoadError::from_sqlx(Side::Source, err)
}

/// Reads changed rows from the operational Postgres database.
#[derive(Debug, Clone)]
pub struct PostgresSource {
    pool: PgPool,
}

impl PostgresSource {
    /// Creates a source with a lazily connected pool.
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

impl SourceStore for PostgresSource {
    async fn fetch_changed(
        &self,
        extract: &'static Extract,
        filter: &ChangeFilter,
    ) -> LoadResult<Vec<TableRow>> {
        let (statement, binds) = sql::extract(extract, filter);
        debug!(entity = extract.name, %statement, "extracting changed rows");

        let mut query = sqlx::query(&statement).bind(filter.since);
        for bind in binds {
            query = match bind {
                FilterBind::BigIntArray(values) => query.bind(values),
                FilterBind::IntArray(values) => query.bind(values),
                FilterBind::Int(value) => query.bind(value),
            };
        }

        let rows = query.fetch_all(&self.pool).await.map_err(source_error)?;

        rows.iter()
            .map(|row| decode_row(row, extract.columns, Side::Source))
            .collect()
    }

    async fn round_start(&self, round_id: i64, segment_id: i32) -> LoadResult<Option<DateTime<Utc>>> {
        let start: Option<Option<DateTime<Utc>>> = sqlx::query_scalar(sql::ROUND_START)
            .bind(round_id)
            .bind(segment_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(source_error)?;

        Ok(start.flatten())
    }

    async fn count_attended(&self, coder_id: i64, season_id: i32) -> LoadResult<i64> {
        sqlx::query_scalar(sql::COUNT_ATTENDED)
            .bind(coder_id)
            .bind(season_id)
            .fetch_one(&self.pool)
            .await
            .map_err(source_error)
    }
}
