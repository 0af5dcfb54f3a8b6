use chrono::{DateTime, Utc};
use tracing::info;

use crate::bail;
use crate::error::{ErrorKind, LoadResult};
use crate::store::TargetStore;

/// Reads and advances the watermark of one load category.
///
/// The watermark is read once when a run starts and appended once when it succeeds. A category
/// without any logged watermark is a deployment error; the store never invents a starting point.
#[derive(Debug)]
pub struct WatermarkStore<'a, T> {
    target: &'a T,
    category: i32,
}

impl<'a, T> WatermarkStore<'a, T>
where
    T: TargetStore,
{
    pub fn new(target: &'a T, category: i32) -> Self {
        Self { target, category }
    }

    /// Returns the instant of the last successful run.
    pub async fn read(&self) -> LoadResult<DateTime<Utc>> {
        let Some(watermark) = self.target.latest_watermark(self.category).await? else {
            bail!(
                ErrorKind::WatermarkMissing,
                "No watermark logged for the load category",
                format!("the watermark log has no entry for category {}", self.category)
            );
        };

        info!(category = self.category, %watermark, "read watermark");

        Ok(watermark)
    }

    /// Records a successful run that began at `run_started_at`.
    ///
    /// Rows modified while the run was in progress fall into the next run's window.
    pub async fn commit(&self, run_started_at: DateTime<Utc>) -> LoadResult<()> {
        let affected = self
            .target
            .append_watermark(self.category, run_started_at)
            .await?;
        if affected != 1 {
            bail!(
                ErrorKind::RowCountMismatch,
                "Watermark append affected an unexpected number of rows",
                format!("appending the watermark modified {affected} rows, not one")
            );
        }

        info!(category = self.category, watermark = %run_started_at, "committed watermark");

        Ok(())
    }
}
