//! Invalidation of downstream cache entries that reference touched coders.

mod invalidator;
mod matcher;
pub mod redis;

use std::future::Future;

use crate::error::LoadResult;

pub use invalidator::invalidate;
pub use matcher::CacheKeyMatcher;

/// Minimal view of a key-value cache.
pub trait CacheService {
    /// Returns the keys currently held that may reference a coder.
    ///
    /// Implementations may narrow the listing to keys starting with the matcher's prefix.
    fn list_keys(&self) -> impl Future<Output = LoadResult<Vec<String>>> + Send;

    /// Removes `key`, returning whether it was present.
    fn remove(&self, key: &str) -> impl Future<Output = LoadResult<bool>> + Send;
}
