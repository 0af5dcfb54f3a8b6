use crate::bail;
use crate::error::{ErrorKind, LoadResult};
use crate::types::{Cell, CellType, TableRow};

/// A column of a warehouse table or source extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub cell_type: CellType,
    pub nullable: bool,
}

impl ColumnDef {
    pub const fn required(name: &'static str, cell_type: CellType) -> Self {
        Self {
            name,
            cell_type,
            nullable: false,
        }
    }

    pub const fn nullable(name: &'static str, cell_type: CellType) -> Self {
        Self {
            name,
            cell_type,
            nullable: true,
        }
    }
}

/// A warehouse table together with its natural key.
///
/// Rows written to the table carry one value per column in declaration order.
#[derive(Debug, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
    /// Columns forming the natural key used to match source and target rows.
    pub key: &'static [&'static str],
}

impl TableDef {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    /// Returns the columns that are not part of the natural key, in declaration order.
    pub fn value_columns(&self) -> impl Iterator<Item = &'static ColumnDef> + '_ {
        self.columns
            .iter()
            .filter(|column| !self.key.contains(&column.name))
    }

    /// Extracts the values of `columns` from `row`, in the order the columns are given.
    pub fn project(&self, row: &TableRow, columns: &[&str]) -> LoadResult<Vec<Cell>> {
        let mut values = Vec::with_capacity(columns.len());
        for name in columns {
            let Some(index) = self.column_index(name) else {
                bail!(
                    ErrorKind::InvalidData,
                    "Column is not part of the table",
                    format!("table {} has no column {name}", self.name)
                );
            };
            let Some(value) = row.get(index) else {
                bail!(
                    ErrorKind::InvalidData,
                    "Row is shorter than its table",
                    format!(
                        "row for table {} has {} values, column {name} is at {index}",
                        self.name,
                        row.len()
                    )
                );
            };
            values.push(value.clone());
        }

        Ok(values)
    }

    /// Extracts the natural key of `row`.
    pub fn key_of(&self, row: &TableRow) -> LoadResult<Vec<Cell>> {
        self.project(row, self.key)
    }

    /// Verifies that `row` has one value per column and that every value fits its column.
    pub fn check_row(&self, row: &TableRow) -> LoadResult<()> {
        check_columns(self.name, self.columns, row)
    }
}

/// Verifies arity, nullability and types of `row` against `columns`.
pub(crate) fn check_columns(
    relation: &str,
    columns: &[ColumnDef],
    row: &TableRow,
) -> LoadResult<()> {
    if row.len() != columns.len() {
        bail!(
            ErrorKind::InvalidData,
            "Row does not match its column list",
            format!(
                "{relation} expects {} values, got {}",
                columns.len(),
                row.len()
            )
        );
    }

    for (column, value) in columns.iter().zip(row.values()) {
        if value.is_null() && !column.nullable {
            bail!(
                ErrorKind::InvalidData,
                "Null value in a required column",
                format!("{relation}.{} must not be null", column.name)
            );
        }
        if !value.fits(column.cell_type) {
            bail!(
                ErrorKind::ConversionError,
                "Value does not match the column type",
                format!(
                    "{relation}.{} is {:?}, got {value:?}",
                    column.name, column.cell_type
                )
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CODER_SKILL_XREF, STATE};
    use crate::row;

    #[test]
    fn key_of_follows_key_order() {
        let row = row![1001_i64, 14_i32, 3_i32, chrono::Utc::now(), 2_i32];

        assert_eq!(
            CODER_SKILL_XREF.key_of(&row).unwrap(),
            vec![Cell::I64(1001), Cell::I32(14)]
        );
        let values: Vec<_> = CODER_SKILL_XREF.value_columns().map(|c| c.name).collect();
        assert_eq!(values, vec!["ranking", "modify_date", "skill_type_id"]);
    }

    #[test]
    fn check_row_rejects_wrong_shape() {
        let short = row!["CT", "Connecticut"];
        assert_eq!(
            STATE.check_row(&short).unwrap_err().kind(),
            ErrorKind::InvalidData
        );

        let null_key = row![None::<String>, "Connecticut", "NE"];
        assert_eq!(
            STATE.check_row(&null_key).unwrap_err().kind(),
            ErrorKind::InvalidData
        );

        let wrong_type = row![5_i32, "Connecticut", "NE"];
        assert_eq!(
            STATE.check_row(&wrong_type).unwrap_err().kind(),
            ErrorKind::ConversionError
        );

        assert!(STATE.check_row(&row!["CT", "Connecticut", None::<String>]).is_ok());
    }
}
