use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::bail;
use crate::cache::CacheService;
use crate::error::{ErrorKind, LoadResult};

#[derive(Debug, Default)]
struct Inner {
    keys: BTreeSet<String>,
    failing: bool,
}

/// In-memory key set standing in for the downstream cache.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryCache {
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let inner = Inner {
            keys: keys.into_iter().map(Into::into).collect(),
            failing: false,
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Returns the keys still held, in ascending order.
    pub async fn keys(&self) -> Vec<String> {
        self.inner.lock().await.keys.iter().cloned().collect()
    }

    /// Makes every cache operation fail.
    pub async fn fail(&self) {
        self.inner.lock().await.failing = true;
    }
}

impl CacheService for MemoryCache {
    async fn list_keys(&self) -> LoadResult<Vec<String>> {
        let inner = self.inner.lock().await;
        if inner.failing {
            bail!(ErrorKind::CacheError, "Cache command failed", "injected cache failure");
        }

        Ok(inner.keys.iter().cloned().collect())
    }

    async fn remove(&self, key: &str) -> LoadResult<bool> {
        let mut inner = self.inner.lock().await;
        if inner.failing {
            bail!(ErrorKind::CacheError, "Cache command failed", "injected cache failure");
        }

        Ok(inner.keys.remove(key))
    }
}
