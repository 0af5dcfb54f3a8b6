use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Postgres, Row};

use crate::bail;
use crate::catalog::{ColumnDef, TableDef};
use crate::error::{ErrorKind, LoadError, LoadResult, Side};
use crate::types::{Cell, CellType, TableRow};

pub(super) type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// Binds `cell` as the next parameter. `cell_type` types the parameter when the cell is null.
pub(super) fn bind_cell<'q>(query: PgQuery<'q>, cell: &Cell, cell_type: CellType) -> PgQuery<'q> {
    match cell {
        Cell::Null => bind_null(query, cell_type),
        Cell::Bool(value) => query.bind(*value),
        Cell::I32(value) => query.bind(*value),
        Cell::I64(value) => query.bind(*value),
        Cell::F64(value) => query.bind(*value),
        Cell::String(value) => query.bind(value.clone()),
        Cell::Date(value) => query.bind(*value),
        Cell::TimestampTz(value) => query.bind(*value),
    }
}

fn bind_null(query: PgQuery<'_>, cell_type: CellType) -> PgQuery<'_> {
    match cell_type {
        CellType::Bool => query.bind(None::<bool>),
        CellType::I32 => query.bind(None::<i32>),
        CellType::I64 => query.bind(None::<i64>),
        CellType::F64 => query.bind(None::<f64>),
        CellType::String => query.bind(None::<String>),
        CellType::Date => query.bind(None::<chrono::NaiveDate>),
        CellType::TimestampTz => query.bind(None::<chrono::DateTime<chrono::Utc>>),
    }
}

/// Binds the values of the named columns of `table`, in order.
pub(super) fn bind_columns<'q>(
    mut query: PgQuery<'q>,
    table: &TableDef,
    columns: &[&str],
    values: &[Cell],
) -> LoadResult<PgQuery<'q>> {
    if columns.len() != values.len() {
        bail!(
            ErrorKind::InvalidData,
            "Value count does not match column count",
            format!(
                "{} columns of {} given {} values",
                columns.len(),
                table.name,
                values.len()
            )
        );
    }

    for (name, value) in columns.iter().zip(values) {
        let Some(column) = table.columns.iter().find(|column| column.name == *name) else {
            bail!(
                ErrorKind::InvalidData,
                "Column is not part of the table",
                format!("table {} has no column {name}", table.name)
            );
        };
        query = bind_cell(query, value, column.cell_type);
    }

    Ok(query)
}

/// Decodes a fetched row according to `columns`.
pub(super) fn decode_row(row: &PgRow, columns: &[ColumnDef], side: Side) -> LoadResult<TableRow> {
    let mut values = Vec::with_capacity(columns.len());
    for (index, column) in columns.iter().enumerate() {
        let value = decode_cell(row, index, column.cell_type)
            .map_err(|err| LoadError::from_sqlx(side, err))?;
        values.push(value);
    }

    Ok(TableRow::new(values))
}

fn decode_cell(row: &PgRow, index: usize, cell_type: CellType) -> Result<Cell, sqlx::Error> {
    let cell = match cell_type {
        CellType::Bool => row.try_get::<Option<bool>, _>(index)?.into(),
        CellType::I32 => row.try_get::<Option<i32>, _>(index)?.into(),
        CellType::I64 => row.try_get::<Option<i64>, _>(index)?.into(),
        CellType::F64 => row.try_get::<Option<f64>, _>(index)?.into(),
        CellType::String => row.try_get::<Option<String>, _>(index)?.into(),
        CellType::Date => row.try_get::<Option<chrono::NaiveDate>, _>(index)?.into(),
        CellType::TimestampTz => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)?
            .into(),
    };

    Ok(cell)
}
