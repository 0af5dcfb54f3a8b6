use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;

/// Declared type of a column, used to decode source values and bind target parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellType {
    Bool,
    I32,
    I64,
    F64,
    String,
    Date,
    TimestampTz,
}

/// A single column value.
///
/// [`Cell::Null`] is valid for any [`CellType`]; other variants must match the declared type of
/// their column.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    String(String),
    Date(NaiveDate),
    TimestampTz(DateTime<Utc>),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Returns true when the cell can be stored in a column of type `cell_type`.
    pub fn fits(&self, cell_type: CellType) -> bool {
        matches!(
            (self, cell_type),
            (Cell::Null, _)
                | (Cell::Bool(_), CellType::Bool)
                | (Cell::I32(_), CellType::I32)
                | (Cell::I64(_), CellType::I64)
                | (Cell::F64(_), CellType::F64)
                | (Cell::String(_), CellType::String)
                | (Cell::Date(_), CellType::Date)
                | (Cell::TimestampTz(_), CellType::TimestampTz)
        )
    }

    /// Returns the integer value, widening 32-bit integers.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::I32(value) => Some(i64::from(*value)),
            Cell::I64(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the integer value when it fits in 32 bits.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Cell::I32(value) => Some(*value),
            Cell::I64(value) => i32::try_from(*value).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => write!(f, "null"),
            Cell::Bool(value) => write!(f, "{value}"),
            Cell::I32(value) => write!(f, "{value}"),
            Cell::I64(value) => write!(f, "{value}"),
            Cell::F64(value) => write!(f, "{value}"),
            Cell::String(value) => write!(f, "{value}"),
            Cell::Date(value) => write!(f, "{value}"),
            Cell::TimestampTz(value) => write!(f, "{}", value.to_rfc3339()),
        }
    }
}

macro_rules! impl_cell_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Cell {
                fn from(value: $ty) -> Self {
                    Cell::$variant(value)
                }
            }
        )*
    };
}

impl_cell_from!(
    bool => Bool,
    i32 => I32,
    i64 => I64,
    f64 => F64,
    String => String,
    NaiveDate => Date,
    DateTime<Utc> => TimestampTz,
);

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::String(value.to_owned())
    }
}

impl<T> From<Option<T>> for Cell
where
    T: Into<Cell>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}
