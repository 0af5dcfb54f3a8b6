//! Shared configuration types for the warehouse loader.

mod cache;
mod connection;
mod loader;
mod sync;

pub use cache::RedisConfig;
pub use connection::{IntoConnectOptions, PgConnectionConfig, TlsConfig};
pub use loader::{LoaderConfig, ScheduleConfig};
pub use sync::{InsertFallback, SyncConfig};

use thiserror::Error;

/// Errors returned when a configuration is structurally valid but semantically wrong.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("tls is enabled but no trusted root certificates were provided")]
    MissingTrustedRootCerts,

    #[error("invalid value for `{field}`: {reason}")]
    InvalidFieldValue { field: &'static str, reason: String },
}
