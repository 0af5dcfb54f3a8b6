//! Redis-backed [`CacheService`].

use config::shared::RedisConfig;
use fred::prelude::{
    ClientLike, EventInterface, KeysInterface, Pool, ReconnectPolicy, Server, ServerConfig,
    TcpConfig,
};
use fred::types::Builder;
use fred::types::config::UnresponsiveConfig;
use fred::types::Key;
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error};

use crate::cache::{CacheKeyMatcher, CacheService};
use crate::error::LoadResult;

const POOL_SIZE: usize = 2;

/// Cache client listing keys with paged `SCAN` and removing them with `UNLINK`.
///
/// Listing only covers keys under the matcher's prefix and does not work with Redis cluster.
#[derive(Clone)]
pub struct RedisCache {
    client: Pool,
    pattern: String,
    scan_count: u32,
}

impl RedisCache {
    /// Connects to Redis and waits until the pool is ready.
    pub async fn connect(config: &RedisConfig, matcher: &CacheKeyMatcher) -> LoadResult<Self> {
        let username = config.username.clone();
        let password = config
            .password
            .as_ref()
            .map(|password| password.expose_secret().to_owned());
        let server = Server::new(config.host.clone(), config.port);

        let pool = Builder::default_centralized()
            .with_config(|redis_config| {
                redis_config.username = username;
                redis_config.password = password;
                redis_config.server = ServerConfig::Centralized { server };
            })
            .with_connection_config(|config| {
                config.internal_command_timeout = Duration::from_secs(5);
                config.reconnect_on_auth_error = true;
                config.tcp = TcpConfig {
                    #[cfg(target_os = "linux")]
                    user_timeout: Some(Duration::from_secs(5)),
                    ..Default::default()
                };
                config.unresponsive = UnresponsiveConfig {
                    max_timeout: Some(Duration::from_secs(10)),
                    interval: Duration::from_secs(3),
                };
            })
            .with_performance_config(|config| {
                config.default_command_timeout = Duration::from_secs(5);
            })
            .set_policy(ReconnectPolicy::new_exponential(0, 1, 2000, 5))
            .build_pool(POOL_SIZE)?;

        for client in pool.clients() {
            let mut error_rx = client.error_rx();
            tokio::spawn(async move {
                loop {
                    match error_rx.recv().await {
                        Ok((error, Some(server))) => {
                            error!("Redis client ({server:?}) error: {error:?}");
                        }
                        Ok((error, None)) => {
                            error!("Redis client error: {error:?}");
                        }
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    }
                }
            });
        }

        let _connections = pool.connect_pool();
        debug!("waiting for redis connection");
        pool.wait_for_connect().await?;
        debug!("connected to redis");

        Ok(Self {
            client: pool,
            pattern: matcher.scan_pattern(),
            scan_count: config.scan_count,
        })
    }

    /// Closes every pooled connection.
    pub async fn quit(&self) -> LoadResult<()> {
        self.client.quit().await?;
        Ok(())
    }
}

impl CacheService for RedisCache {
    async fn list_keys(&self) -> LoadResult<Vec<String>> {
        let mut cursor = "0".to_string();
        let mut listed = Vec::new();

        loop {
            let (next_cursor, keys): (String, Vec<Key>) = self
                .client
                .scan_page(
                    cursor,
                    self.pattern.clone(),
                    Some(self.scan_count),
                    None,
                )
                .await?;

            listed.extend(keys.iter().filter_map(|key| key.as_str().map(str::to_owned)));

            cursor = next_cursor;
            if cursor == "0" {
                break;
            }
        }

        debug!(pattern = %self.pattern, keys = listed.len(), "listed cache keys");

        Ok(listed)
    }

    async fn remove(&self, key: &str) -> LoadResult<bool> {
        let removed: i64 = self.client.unlink(key.to_owned()).await?;
        Ok(removed > 0)
    }
}
