use serde::Deserialize;

use crate::Config;
use crate::shared::{PgConnectionConfig, RedisConfig, SyncConfig, ValidationError};

/// Top level configuration of the loader service.
#[derive(Debug, Clone, Deserialize)]
pub struct LoaderConfig {
    /// Operational store the changed rows are read from.
    pub source: PgConnectionConfig,
    /// Warehouse the rows are converged into. Also holds the watermark log.
    pub target: PgConnectionConfig,
    /// Downstream cache purged after every successful run. Invalidation is skipped when absent.
    #[serde(default)]
    pub cache: Option<RedisConfig>,
    /// Fixed run parameters.
    #[serde(default)]
    pub sync: SyncConfig,
    /// When present, runs are repeated on this schedule instead of running once.
    #[serde(default)]
    pub schedule: Option<ScheduleConfig>,
}

impl LoaderConfig {
    /// Validates every nested section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.source.validate()?;
        self.target.validate()?;
        self.sync.validate()?;
        if let Some(schedule) = &self.schedule {
            schedule.validate()?;
        }

        Ok(())
    }
}

impl Config for LoaderConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] =
        &["sync.excluded_group_ids", "sync.rating_type_ids"];
}

/// Interval between two consecutive runs.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    pub interval_secs: u64,
}

impl ScheduleConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.interval_secs == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "schedule.interval_secs",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
