use tracing::{debug, info};

use crate::cache::{CacheKeyMatcher, CacheService};
use crate::error::LoadResult;
use crate::types::TouchedIdentifiers;

/// Removes every cache entry referencing one of the touched coders.
///
/// Returns the number of keys removed. The cache is not listed when nothing was touched.
pub async fn invalidate<C>(
    cache: &C,
    matcher: &CacheKeyMatcher,
    touched: &TouchedIdentifiers,
) -> LoadResult<usize>
where
    C: CacheService,
{
    if touched.is_empty() {
        debug!("no coder touched, cache left as is");
        return Ok(0);
    }

    let keys = cache.list_keys().await?;

    let mut removed = 0;
    for key in keys.iter().filter(|key| matcher.matches(key, touched)) {
        if cache.remove(key).await? {
            removed += 1;
        }
    }

    info!(touched = touched.len(), removed, "cache records cleared");

    Ok(removed)
}
