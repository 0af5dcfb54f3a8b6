use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

use crate::bail;
use crate::error::{ErrorKind, LoadResult};
use crate::store::SourceStore;

/// Memoized lookup of the instant a round's scoring segment started.
///
/// Scored rounds never move, so entries live for the whole run without eviction. One resolver
/// is created per run.
#[derive(Debug)]
pub struct RoundStartResolver<'a, S> {
    source: &'a S,
    segment_id: i32,
    starts: HashMap<i64, DateTime<Utc>>,
}

impl<'a, S> RoundStartResolver<'a, S>
where
    S: SourceStore,
{
    pub fn new(source: &'a S, segment_id: i32) -> Self {
        Self {
            source,
            segment_id,
            starts: HashMap::new(),
        }
    }

    /// Returns the segment start of `round_id`, querying the source on first use.
    ///
    /// Fails with [`ErrorKind::RoundNotFound`] when the round or its segment does not exist.
    pub async fn resolve(&mut self, round_id: i64) -> LoadResult<DateTime<Utc>> {
        if let Some(start) = self.starts.get(&round_id) {
            return Ok(*start);
        }

        let Some(start) = self.source.round_start(round_id, self.segment_id).await? else {
            bail!(
                ErrorKind::RoundNotFound,
                "Round has no scoring segment",
                format!("round {round_id} has no segment {}", self.segment_id)
            );
        };

        debug!(round_id, %start, "resolved round start");
        self.starts.insert(round_id, start);

        Ok(start)
    }

    /// Number of rounds resolved so far.
    pub fn resolved(&self) -> usize {
        self.starts.len()
    }
}
