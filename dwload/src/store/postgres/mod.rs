//! Postgres-backed source and target stores.

mod codec;
mod source;
mod sql;
mod target;

use config::shared::{IntoConnectOptions, PgConnectionConfig};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

pub use source::PostgresSource;
pub use target::PostgresTarget;

/// Maximum number of connections in each pool.
///
/// A run issues one statement at a time, so one connection is used and a second covers a
/// connection being recycled.
const MAX_POOL_CONNECTIONS: u32 = 2;

/// Duration after which idle connections are closed.
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Creates a lazily connected pool with automatic idle connection cleanup.
///
/// No connection is opened until the first statement runs. Between scheduled runs the pool
/// drains back to zero connections.
fn create_database_pool(config: &PgConnectionConfig) -> PgPool {
    let options = config.with_db();

    PgPoolOptions::new()
        .min_connections(0)
        .max_connections(MAX_POOL_CONNECTIONS)
        .idle_timeout(Some(IDLE_TIMEOUT))
        .connect_lazy_with(options)
}
