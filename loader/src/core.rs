use std::time::Duration;

use config::shared::{LoaderConfig, PgConnectionConfig, RedisConfig, SyncConfig};
use dwload::cache::CacheKeyMatcher;
use dwload::cache::redis::RedisCache;
use dwload::error::LoadResult;
use dwload::pipeline::{RunReport, SyncRun};
use dwload::store::postgres::{PostgresSource, PostgresTarget};
use tokio::signal::unix::{Signal, SignalKind, signal};
use tracing::{debug, error, info, warn};

/// Starts the loader with the provided configuration.
///
/// Without a schedule a single run is executed and its error, if any, is returned. With a
/// schedule runs repeat until SIGTERM or SIGINT is received; a failed run is logged and the
/// next one retries the same window.
pub async fn start_loader_with_config(loader_config: LoaderConfig) -> anyhow::Result<()> {
    info!("starting loader service");

    log_config(&loader_config);

    let source = PostgresSource::new(&loader_config.source);
    let target = PostgresTarget::new(&loader_config.target);
    let cache = match &loader_config.cache {
        Some(cache_config) => {
            let matcher = CacheKeyMatcher::from_config(&loader_config.sync);
            Some(RedisCache::connect(cache_config, &matcher).await?)
        }
        None => {
            warn!("no cache configured, touched coders will not be invalidated");
            None
        }
    };

    let result = match &loader_config.schedule {
        None => run_once(&source, &target, cache.as_ref(), &loader_config.sync)
            .await
            .map(|_| ())
            .map_err(anyhow::Error::from),
        Some(schedule) => {
            run_scheduled(
                &source,
                &target,
                cache.as_ref(),
                &loader_config.sync,
                Duration::from_secs(schedule.interval_secs),
            )
            .await
        }
    };

    if let Some(cache) = &cache {
        if let Err(err) = cache.quit().await {
            warn!(error = %err, "failed to close cache connection");
        }
    }
    source.close().await;
    target.close().await;

    result
}

async fn run_once(
    source: &PostgresSource,
    target: &PostgresTarget,
    cache: Option<&RedisCache>,
    sync_config: &SyncConfig,
) -> LoadResult<RunReport> {
    let report = SyncRun::new(source, target, cache, sync_config)
        .execute()
        .await?;

    info!(
        watermark = %report.watermark,
        started_at = %report.started_at,
        rows = report.rows(),
        touched = report.touched.len(),
        invalidated = ?report.invalidated,
        "load run completed"
    );

    Ok(report)
}

/// Repeats runs every `interval` until a shutdown signal arrives.
///
/// Signals are only observed between runs, so an in-flight run always completes or fails on
/// its own.
#[tracing::instrument(skip_all, fields(interval_secs = interval.as_secs()))]
async fn run_scheduled(
    source: &PostgresSource,
    target: &PostgresTarget,
    cache: Option<&RedisCache>,
    sync_config: &SyncConfig,
    interval: Duration,
) -> anyhow::Result<()> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = sigint.recv() => {
                info!("sigint (ctrl+c) received, shutting down loader");
                return Ok(());
            }
            _ = sigterm.recv() => {
                info!("sigterm received, shutting down loader");
                return Ok(());
            }
        }

        if let Err(err) = run_once(source, target, cache, sync_config).await {
            error!(error = %err, "load run failed, retrying on next tick");
        }

        if shutdown_requested(&mut sigint, &mut sigterm) {
            info!("shutdown signal received during run, stopping loader");
            return Ok(());
        }
    }
}

/// Returns `true` when a signal was delivered while a run was in flight.
fn shutdown_requested(sigint: &mut Signal, sigterm: &mut Signal) -> bool {
    let mut context = std::task::Context::from_waker(std::task::Waker::noop());

    sigint.poll_recv(&mut context).is_ready() || sigterm.poll_recv(&mut context).is_ready()
}

fn log_config(config: &LoaderConfig) {
    log_pg_connection_config("source", &config.source);
    log_pg_connection_config("target", &config.target);
    match &config.cache {
        Some(cache) => log_cache_config(cache),
        None => debug!("cache invalidation disabled"),
    }
    log_sync_config(&config.sync);
    match &config.schedule {
        Some(schedule) => debug!(interval_secs = schedule.interval_secs, "using schedule"),
        None => debug!("running once"),
    }
}

fn log_pg_connection_config(role: &str, config: &PgConnectionConfig) {
    debug!(
        role,
        host = %config.host,
        port = config.port,
        dbname = %config.name,
        username = %config.username,
        tls_enabled = config.tls.enabled,
        "using postgres connection config"
    );
}

fn log_cache_config(config: &RedisConfig) {
    debug!(
        host = %config.host,
        port = config.port,
        username = ?config.username,
        scan_count = config.scan_count,
        "using redis cache config"
    );
}

fn log_sync_config(config: &SyncConfig) {
    debug!(
        log_category = config.log_category,
        excluded_group_ids = ?config.excluded_group_ids,
        rating_type_ids = ?config.rating_type_ids,
        coding_segment_id = config.coding_segment_id,
        team_type_id = config.team_type_id,
        image_type_id = config.image_type_id,
        insert_fallback = ?config.insert_fallback,
        cache_key_prefix = %config.cache_key_prefix,
        cache_key_delimiter = %config.cache_key_delimiter,
        "using sync config"
    );
}
