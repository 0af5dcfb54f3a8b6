//! Incremental warehouse load of coder data.
//!
//! Each run copies the rows of a fixed set of entities changed since the previous successful
//! run from the operational database into the warehouse, folds rating observations into stored
//! aggregates, purges stale cache entries and advances the watermark.
//!
//! The main entry point is [`pipeline::SyncRun`], generic over a [`store::SourceStore`], a
//! [`store::TargetStore`] and a [`cache::CacheService`].

pub mod cache;
pub mod catalog;
pub mod error;
pub mod loaders;
mod macros;
pub mod pipeline;
pub mod plan;
pub mod rounds;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod watermark;
