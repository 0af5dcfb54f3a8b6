use tracing::{debug, info};

use crate::catalog::{ALGO_RATING, RATING_EXTRACT};
use crate::error::LoadResult;
use crate::loaders::{RowReader, expect_one};
use crate::row;
use crate::store::{ChangeFilter, SourceStore, TargetStore};
use crate::types::{Cell, TableRow};

/// Current overall rating of a coder for one rating type, as read from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingObservation {
    pub coder_id: i64,
    pub rating_type_id: i32,
    pub rating: i32,
    pub vol: i32,
    pub num_ratings: i32,
}

impl RatingObservation {
    pub(crate) fn from_row(row: &TableRow) -> LoadResult<Self> {
        let reader = RowReader::new(RATING_EXTRACT.name, RATING_EXTRACT.columns, row);
        Ok(Self {
            coder_id: reader.i64("coder_id")?,
            rating_type_id: reader.i32("algo_rating_type_id")?,
            rating: reader.i32("rating")?,
            vol: reader.i32("vol")?,
            num_ratings: reader.i32("num_ratings")?,
        })
    }
}

/// Stored `algo_rating` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingAggregate {
    pub coder_id: i64,
    pub rating_type_id: i32,
    pub rating: i32,
    pub vol: i32,
    pub num_ratings: i32,
    pub num_competitions: i32,
    pub lowest: i32,
    pub highest: i32,
    pub first_round: Option<i64>,
    pub last_round: Option<i64>,
}

impl RatingAggregate {
    /// Combines the current source values with the history kept by the previous aggregate.
    ///
    /// The envelope, rated rounds and competition count are copied from `previous` unchanged.
    /// Without a previous aggregate the envelope collapses onto the observed rating, rated
    /// rounds are unset and no competition is counted.
    pub fn carry_forward(observation: &RatingObservation, previous: Option<&RatingAggregate>) -> Self {
        let (lowest, highest, first_round, last_round, num_competitions) = match previous {
            Some(previous) => (
                previous.lowest,
                previous.highest,
                previous.first_round,
                previous.last_round,
                previous.num_competitions,
            ),
            None => (observation.rating, observation.rating, None, None, 0),
        };

        Self {
            coder_id: observation.coder_id,
            rating_type_id: observation.rating_type_id,
            rating: observation.rating,
            vol: observation.vol,
            num_ratings: observation.num_ratings,
            num_competitions,
            lowest,
            highest,
            first_round,
            last_round,
        }
    }

    pub(crate) fn from_row(row: &TableRow) -> LoadResult<Self> {
        let reader = RowReader::new(ALGO_RATING.name, ALGO_RATING.columns, row);
        Ok(Self {
            coder_id: reader.i64("coder_id")?,
            rating_type_id: reader.i32("algo_rating_type_id")?,
            rating: reader.i32("rating")?,
            vol: reader.i32("vol")?,
            num_ratings: reader.i32("num_ratings")?,
            num_competitions: reader.i32("num_competitions")?,
            lowest: reader.i32("lowest_rating")?,
            highest: reader.i32("highest_rating")?,
            first_round: reader.opt_i64("first_rated_round_id")?,
            last_round: reader.opt_i64("last_rated_round_id")?,
        })
    }

    pub(crate) fn key(&self) -> Vec<Cell> {
        vec![Cell::I64(self.coder_id), Cell::I32(self.rating_type_id)]
    }

    pub(crate) fn to_row(&self) -> TableRow {
        row![
            self.coder_id,
            self.rating,
            self.num_ratings,
            self.vol,
            self.highest,
            self.lowest,
            self.first_round,
            self.last_round,
            self.num_competitions,
            self.rating_type_id,
        ]
    }
}

/// Replaces the overall rating aggregate of every changed (coder, rating type).
pub async fn load_ratings<S, T>(source: &S, target: &T, filter: &ChangeFilter) -> LoadResult<u64>
where
    S: SourceStore,
    T: TargetStore,
{
    let rows = source.fetch_changed(&RATING_EXTRACT, filter).await?;

    let mut loaded = 0;
    for row in &rows {
        let observation = RatingObservation::from_row(row)?;
        let key = vec![
            Cell::I64(observation.coder_id),
            Cell::I32(observation.rating_type_id),
        ];

        let previous = match target.fetch_row(&ALGO_RATING, &key).await? {
            Some(row) => Some(RatingAggregate::from_row(&row)?),
            None => None,
        };
        let aggregate = RatingAggregate::carry_forward(&observation, previous.as_ref());

        target.delete_rows(&ALGO_RATING, ALGO_RATING.key, &key).await?;
        let affected = target.insert_row(&ALGO_RATING, &aggregate.to_row()).await?;
        expect_one(ALGO_RATING.name, &aggregate.key(), affected)?;

        debug!(coder_id = observation.coder_id, rating_type_id = observation.rating_type_id, "rating replaced");
        loaded += 1;
    }

    info!(entity = RATING_EXTRACT.name, rows = loaded, "entity loaded");

    Ok(loaded)
}
