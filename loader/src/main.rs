//! Warehouse loader binary.
//!
//! Copies the rows changed since the last committed watermark from the operational database
//! into the warehouse, then purges the cache entries of every touched coder. Runs once, or
//! repeatedly when a schedule is configured.

use crate::core::start_loader_with_config;
use crate::settings::load_loader_config;

use telemetry::tracing::init_tracing;

mod core;
mod settings;

fn main() -> anyhow::Result<()> {
    let loader_config = load_loader_config()?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"))?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_loader_with_config(loader_config))?;

    Ok(())
}
