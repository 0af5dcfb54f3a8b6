use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::catalog::{SEASON_ALGO_RATING, SEASON_RATING_EXTRACT};
use crate::error::LoadResult;
use crate::loaders::{RowReader, expect_one};
use crate::rounds::RoundStartResolver;
use crate::row;
use crate::store::{ChangeFilter, SourceStore, TargetStore};
use crate::types::{Cell, TableRow};

/// Season rating of a coder as of the round that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonObservation {
    pub coder_id: i64,
    pub season_id: i32,
    pub rating: i32,
    pub vol: i32,
    pub num_ratings: i32,
    pub round_id: i64,
}

impl SeasonObservation {
    pub(crate) fn from_row(row: &TableRow) -> LoadResult<Self> {
        let reader = RowReader::new(
            SEASON_RATING_EXTRACT.name,
            SEASON_RATING_EXTRACT.columns,
            row,
        );
        Ok(Self {
            coder_id: reader.i64("coder_id")?,
            season_id: reader.i32("season_id")?,
            rating: reader.i32("rating")?,
            vol: reader.i32("vol")?,
            num_ratings: reader.i32("num_ratings")?,
            round_id: reader.i64("round_id")?,
        })
    }

    fn key(&self) -> Vec<Cell> {
        vec![Cell::I64(self.coder_id), Cell::I32(self.season_id)]
    }
}

/// A round placed on the timeline by the start of its scoring segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundMark {
    pub round_id: i64,
    pub start: DateTime<Utc>,
}

/// Rating extremes and the chronologically first and last rated rounds of a season.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonEnvelope {
    pub lowest: i32,
    pub highest: i32,
    pub first: Option<RoundMark>,
    pub last: Option<RoundMark>,
}

impl SeasonEnvelope {
    /// Envelope of a single observation.
    pub fn seed(rating: i32, round: RoundMark) -> Self {
        Self {
            lowest: rating,
            highest: rating,
            first: Some(round),
            last: Some(round),
        }
    }

    /// Extends the envelope with an observation made in `round`.
    ///
    /// Rounds are ordered by start instant. On equal starts the round already in the envelope
    /// is kept.
    pub fn absorb(self, rating: i32, round: RoundMark) -> Self {
        let first = match self.first {
            Some(first) if first.start <= round.start => first,
            _ => round,
        };
        let last = match self.last {
            Some(last) if last.start >= round.start => last,
            _ => round,
        };

        Self {
            lowest: self.lowest.min(rating),
            highest: self.highest.max(rating),
            first: Some(first),
            last: Some(last),
        }
    }

    /// Folds an observation into an optional previous envelope.
    pub fn merge(previous: Option<SeasonEnvelope>, rating: i32, round: RoundMark) -> Self {
        match previous {
            Some(previous) => previous.absorb(rating, round),
            None => Self::seed(rating, round),
        }
    }
}

/// Stored envelope columns of a `season_algo_rating` row.
struct StoredEnvelope {
    lowest: i32,
    highest: i32,
    first_round: Option<i64>,
    last_round: Option<i64>,
}

impl StoredEnvelope {
    fn from_row(row: &TableRow) -> LoadResult<Self> {
        let reader = RowReader::new(SEASON_ALGO_RATING.name, SEASON_ALGO_RATING.columns, row);
        Ok(Self {
            lowest: reader.i32("lowest_rating")?,
            highest: reader.i32("highest_rating")?,
            first_round: reader.opt_i64("first_rated_round_id")?,
            last_round: reader.opt_i64("last_rated_round_id")?,
        })
    }

    /// Places the stored rounds on the timeline.
    async fn resolve<S>(&self, resolver: &mut RoundStartResolver<'_, S>) -> LoadResult<SeasonEnvelope>
    where
        S: SourceStore,
    {
        let first = match self.first_round {
            Some(round_id) => Some(RoundMark {
                round_id,
                start: resolver.resolve(round_id).await?,
            }),
            None => None,
        };
        let last = match self.last_round {
            Some(round_id) => Some(RoundMark {
                round_id,
                start: resolver.resolve(round_id).await?,
            }),
            None => None,
        };

        Ok(SeasonEnvelope {
            lowest: self.lowest,
            highest: self.highest,
            first,
            last,
        })
    }
}

fn aggregate_row(observation: &SeasonObservation, envelope: &SeasonEnvelope, num_competitions: i64) -> TableRow {
    row![
        observation.coder_id,
        observation.season_id,
        observation.rating,
        observation.vol,
        observation.num_ratings,
        num_competitions,
        envelope.highest,
        envelope.lowest,
        envelope.first.map(|round| round.round_id),
        envelope.last.map(|round| round.round_id),
    ]
}

/// Folds every changed season rating into its (coder, season) aggregate.
///
/// The competition count is recounted from attendance each time rather than carried forward.
pub async fn load_season_ratings<S, T>(
    source: &S,
    target: &T,
    resolver: &mut RoundStartResolver<'_, S>,
    filter: &ChangeFilter,
) -> LoadResult<u64>
where
    S: SourceStore,
    T: TargetStore,
{
    let rows = source.fetch_changed(&SEASON_RATING_EXTRACT, filter).await?;

    let mut loaded = 0;
    for row in &rows {
        let observation = SeasonObservation::from_row(row)?;
        let round = RoundMark {
            round_id: observation.round_id,
            start: resolver.resolve(observation.round_id).await?,
        };
        let key = observation.key();

        let previous = match target.fetch_row(&SEASON_ALGO_RATING, &key).await? {
            Some(row) => Some(StoredEnvelope::from_row(&row)?.resolve(resolver).await?),
            None => None,
        };
        let envelope = SeasonEnvelope::merge(previous, observation.rating, round);

        let num_competitions = source
            .count_attended(observation.coder_id, observation.season_id)
            .await?;

        target
            .delete_rows(&SEASON_ALGO_RATING, SEASON_ALGO_RATING.key, &key)
            .await?;
        let affected = target
            .insert_row(&SEASON_ALGO_RATING, &aggregate_row(&observation, &envelope, num_competitions))
            .await?;
        expect_one(SEASON_ALGO_RATING.name, &key, affected)?;

        debug!(
            coder_id = observation.coder_id,
            season_id = observation.season_id,
            round_id = observation.round_id,
            "season rating folded"
        );
        loaded += 1;
    }

    info!(entity = SEASON_RATING_EXTRACT.name, rows = loaded, "entity loaded");

    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn mark(round_id: i64, day: u32) -> RoundMark {
        RoundMark {
            round_id,
            start: Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap(),
        }
    }

    fn fold(observations: &[(i32, RoundMark)]) -> SeasonEnvelope {
        observations
            .iter()
            .fold(None, |envelope, (rating, round)| {
                Some(SeasonEnvelope::merge(envelope, *rating, *round))
            })
            .unwrap()
    }

    #[test]
    fn envelope_is_independent_of_arrival_order() {
        let observations = [(1500, mark(100, 1)), (1400, mark(101, 2)), (1720, mark(102, 3))];
        let orders: [[usize; 3]; 6] = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];

        for order in orders {
            let arrived: Vec<_> = order.iter().map(|index| observations[*index]).collect();
            let envelope = fold(&arrived);

            assert_eq!(envelope.lowest, 1400, "order {order:?}");
            assert_eq!(envelope.highest, 1720, "order {order:?}");
            assert_eq!(envelope.first.map(|r| r.round_id), Some(100), "order {order:?}");
            assert_eq!(envelope.last.map(|r| r.round_id), Some(102), "order {order:?}");
        }
    }

    #[test]
    fn round_ids_do_not_decide_chronology() {
        // Round 900 was scheduled before round 300.
        let envelope = fold(&[(1200, mark(300, 20)), (1250, mark(900, 5))]);

        assert_eq!(envelope.first.map(|r| r.round_id), Some(900));
        assert_eq!(envelope.last.map(|r| r.round_id), Some(300));
    }

    #[test]
    fn missing_stored_rounds_are_filled_by_the_observation() {
        let previous = SeasonEnvelope {
            lowest: 1100,
            highest: 1300,
            first: None,
            last: None,
        };

        let envelope = previous.absorb(1250, mark(55, 9));

        assert_eq!((envelope.lowest, envelope.highest), (1100, 1300));
        assert_eq!(envelope.first, Some(mark(55, 9)));
        assert_eq!(envelope.last, Some(mark(55, 9)));
    }

    #[test]
    fn equal_starts_keep_existing_rounds() {
        let envelope = SeasonEnvelope::seed(1000, mark(1, 4)).absorb(1001, mark(2, 4));

        assert_eq!(envelope.first.map(|r| r.round_id), Some(1));
        assert_eq!(envelope.last.map(|r| r.round_id), Some(1));
    }
}
