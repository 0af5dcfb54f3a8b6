//! Loaders converging one entity each from the source into the warehouse.
//!
//! [`entity`] covers the plain entities. [`rating`] and [`season_rating`] fold new observations
//! into previously stored aggregates.

pub mod entity;
pub mod rating;
pub mod season_rating;

use crate::bail;
use crate::catalog::ColumnDef;
use crate::error::{ErrorKind, LoadResult};
use crate::types::{Cell, TableRow};

pub use entity::{EntityOutcome, EntitySpec, LoadStrategy, converge_row, load_entity};
pub use rating::{RatingAggregate, RatingObservation, load_ratings};
pub use season_rating::{RoundMark, SeasonEnvelope, SeasonObservation, load_season_ratings};

/// Fails with [`ErrorKind::RowCountMismatch`] unless exactly one row was affected.
pub(crate) fn expect_one(table: &str, key: &[Cell], affected: u64) -> LoadResult<()> {
    if affected != 1 {
        let key = key
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        bail!(
            ErrorKind::RowCountMismatch,
            "Write affected an unexpected number of rows",
            format!("load of {table} for key ({key}) modified {affected} rows, not one")
        );
    }

    Ok(())
}

/// Typed access to the named columns of a row.
pub(crate) struct RowReader<'r> {
    relation: &'static str,
    columns: &'static [ColumnDef],
    row: &'r TableRow,
}

impl<'r> RowReader<'r> {
    pub(crate) fn new(
        relation: &'static str,
        columns: &'static [ColumnDef],
        row: &'r TableRow,
    ) -> Self {
        Self {
            relation,
            columns,
            row,
        }
    }

    fn cell(&self, name: &str) -> LoadResult<&'r Cell> {
        let value = self
            .columns
            .iter()
            .position(|column| column.name == name)
            .and_then(|index| self.row.get(index));
        let Some(value) = value else {
            bail!(
                ErrorKind::InvalidData,
                "Row is missing a column",
                format!("{} row has no value for {name}", self.relation)
            );
        };

        Ok(value)
    }

    pub(crate) fn opt_i64(&self, name: &str) -> LoadResult<Option<i64>> {
        let cell = self.cell(name)?;
        if cell.is_null() {
            return Ok(None);
        }
        match cell.as_i64() {
            Some(value) => Ok(Some(value)),
            None => bail!(
                ErrorKind::ConversionError,
                "Column is not an integer",
                format!("{}.{name} holds {cell:?}", self.relation)
            ),
        }
    }

    pub(crate) fn i64(&self, name: &str) -> LoadResult<i64> {
        match self.opt_i64(name)? {
            Some(value) => Ok(value),
            None => bail!(
                ErrorKind::InvalidData,
                "Null value in a required column",
                format!("{}.{name} is null", self.relation)
            ),
        }
    }

    pub(crate) fn i32(&self, name: &str) -> LoadResult<i32> {
        let value = self.i64(name)?;
        match i32::try_from(value) {
            Ok(value) => Ok(value),
            Err(_) => bail!(
                ErrorKind::ConversionError,
                "Integer does not fit in 32 bits",
                format!("{}.{name} is {value}", self.relation)
            ),
        }
    }
}
