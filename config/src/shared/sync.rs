use serde::Deserialize;

use crate::shared::ValidationError;

/// Category under which coder loads are recorded in the watermark log.
const DEFAULT_LOG_CATEGORY: i32 = 2;
/// Administrative and test account groups never copied to the warehouse.
const DEFAULT_EXCLUDED_GROUP_IDS: [i64; 2] = [13, 14];
/// Round segment whose start time orders rating observations (the coding phase).
const DEFAULT_CODING_SEGMENT_ID: i32 = 2;
/// Only high school teams are loaded.
const DEFAULT_TEAM_TYPE_ID: i32 = 4;
/// Only member photos are loaded.
const DEFAULT_IMAGE_TYPE_ID: i32 = 1;
const DEFAULT_CACHE_KEY_PREFIX: &str = "coder";
const DEFAULT_CACHE_KEY_DELIMITER: char = ':';

/// Decides which failed inserts are retried as updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertFallback {
    /// Only a unique key violation falls back to an update.
    #[default]
    KeyConflict,
    /// Any insert failure falls back to an update.
    AnyError,
}

/// Fixed parameters of a synchronization run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Watermark log category owned by this loader.
    pub log_category: i32,
    /// Members of these groups are filtered out at extraction time.
    pub excluded_group_ids: Vec<i64>,
    /// Rating types folded by the overall rating loader. Empty means every type.
    pub rating_type_ids: Vec<i32>,
    pub coding_segment_id: i32,
    pub team_type_id: i32,
    pub image_type_id: i32,
    pub insert_fallback: InsertFallback,
    /// Leading segment of every cache key that references a coder.
    pub cache_key_prefix: String,
    pub cache_key_delimiter: char,
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.cache_key_prefix.is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "sync.cache_key_prefix",
                reason: "must not be empty".to_string(),
            });
        }

        if self.cache_key_delimiter.is_ascii_digit() {
            return Err(ValidationError::InvalidFieldValue {
                field: "sync.cache_key_delimiter",
                reason: "must not be a digit".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            log_category: DEFAULT_LOG_CATEGORY,
            excluded_group_ids: DEFAULT_EXCLUDED_GROUP_IDS.to_vec(),
            rating_type_ids: Vec::new(),
            coding_segment_id: DEFAULT_CODING_SEGMENT_ID,
            team_type_id: DEFAULT_TEAM_TYPE_ID,
            image_type_id: DEFAULT_IMAGE_TYPE_ID,
            insert_fallback: InsertFallback::default(),
            cache_key_prefix: DEFAULT_CACHE_KEY_PREFIX.to_string(),
            cache_key_delimiter: DEFAULT_CACHE_KEY_DELIMITER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_sync_config_keeps_defaults() {
        let config: SyncConfig =
            serde_json::from_str(r#"{"insert_fallback":"any_error","rating_type_ids":[1,3]}"#)
                .unwrap();

        assert_eq!(config.insert_fallback, InsertFallback::AnyError);
        assert_eq!(config.rating_type_ids, vec![1, 3]);
        assert_eq!(config.log_category, 2);
        assert_eq!(config.excluded_group_ids, vec![13, 14]);
        assert_eq!(config.cache_key_delimiter, ':');
    }

    #[test]
    fn digit_delimiter_is_rejected() {
        let config = SyncConfig {
            cache_key_delimiter: '7',
            ..SyncConfig::default()
        };

        assert!(config.validate().is_err());
    }
}
