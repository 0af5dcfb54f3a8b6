use crate::types::Cell;

/// Represents a complete row of data from a database table.
///
/// The values are ordered to match the column order of the extract or table that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    values: Vec<Cell>,
}

impl TableRow {
    /// Creates a new table row with the given cell values.
    pub fn new(values: Vec<Cell>) -> Self {
        Self { values }
    }

    /// Returns the row values in column order.
    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    /// Returns the value at `index`, or `None` when the row is shorter.
    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consumes the row and returns its values in column order.
    pub fn into_values(self) -> Vec<Cell> {
        self.values
    }
}

impl From<Vec<Cell>> for TableRow {
    fn from(values: Vec<Cell>) -> Self {
        Self::new(values)
    }
}

/// Builds a [`TableRow`] from a list of values convertible into [`Cell`].
///
/// ```
/// use dwload::row;
/// use dwload::types::Cell;
///
/// let row = row![7_i64, "tourist", None::<String>];
/// assert_eq!(row.values()[2], Cell::Null);
/// ```
#[macro_export]
macro_rules! row {
    ($($value:expr),* $(,)?) => {
        $crate::types::TableRow::new(vec![$($crate::types::Cell::from($value)),*])
    };
}
