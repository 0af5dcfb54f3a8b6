use pg_escape::quote_identifier;

use crate::catalog::{Extract, Predicate, TableDef};
use crate::store::ChangeFilter;

/// A parameter appended to an extract by one of its predicates.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum FilterBind {
    BigIntArray(Vec<i64>),
    IntArray(Vec<i32>),
    Int(i32),
}

fn column_list(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|column| quote_identifier(column).into_owned())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Renders `a = $n AND b = $n+1 ...` starting at parameter `first`.
fn equalities(columns: &[&str], first: usize, separator: &str) -> String {
    columns
        .iter()
        .enumerate()
        .map(|(offset, column)| format!("{} = ${}", quote_identifier(column), first + offset))
        .collect::<Vec<_>>()
        .join(separator)
}

fn column_names(table: &TableDef) -> Vec<&'static str> {
    table.columns.iter().map(|column| column.name).collect()
}

pub(super) fn insert(table: &TableDef) -> String {
    let columns = column_names(table);
    let params = (1..=columns.len())
        .map(|index| format!("${index}"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {} ({}) VALUES ({params})",
        quote_identifier(table.name),
        column_list(&columns)
    )
}

/// Renders the update of a row by key and returns the columns in parameter order.
///
/// A table made only of key columns re-assigns its key so that the statement still reports the
/// matched rows.
pub(super) fn update(table: &TableDef) -> (String, Vec<&'static str>) {
    let mut assigned: Vec<&'static str> = table.value_columns().map(|column| column.name).collect();
    if assigned.is_empty() {
        assigned = table.key.to_vec();
    }

    let statement = format!(
        "UPDATE {} SET {} WHERE {}",
        quote_identifier(table.name),
        equalities(&assigned, 1, ", "),
        equalities(table.key, assigned.len() + 1, " AND ")
    );

    let mut order = assigned;
    order.extend_from_slice(table.key);
    (statement, order)
}

pub(super) fn delete(table: &TableDef, columns: &[&str]) -> String {
    format!(
        "DELETE FROM {} WHERE {}",
        quote_identifier(table.name),
        equalities(columns, 1, " AND ")
    )
}

pub(super) fn select_by_key(table: &TableDef) -> String {
    format!(
        "SELECT {} FROM {} WHERE {} LIMIT 1",
        column_list(&column_names(table)),
        quote_identifier(table.name),
        equalities(table.key, 1, " AND ")
    )
}

pub(super) fn count_by_key(table: &TableDef) -> String {
    format!(
        "SELECT count(*) FROM {} WHERE {}",
        quote_identifier(table.name),
        equalities(table.key, 1, " AND ")
    )
}

/// Appends the predicates of `extract` to its select. The watermark stays `$1`; predicate
/// parameters follow in the returned order.
pub(super) fn extract(extract: &Extract, filter: &ChangeFilter) -> (String, Vec<FilterBind>) {
    let mut statement = extract.select.to_owned();
    let mut binds = Vec::new();

    for predicate in extract.predicates {
        let param = binds.len() + 2;
        match predicate {
            Predicate::NotInGroups { member } => {
                if filter.excluded_groups.is_empty() {
                    continue;
                }
                binds.push(FilterBind::BigIntArray(filter.excluded_groups.clone()));
                statement.push_str(&format!(
                    " AND NOT EXISTS (SELECT 1 FROM group_user gu \
                     WHERE gu.user_id = {member} AND gu.group_id = ANY(${param}))"
                ));
            }
            Predicate::RatingTypeIn { column } => {
                if filter.rating_types.is_empty() {
                    continue;
                }
                binds.push(FilterBind::IntArray(filter.rating_types.clone()));
                statement.push_str(&format!(" AND {column} = ANY(${param})"));
            }
            Predicate::ImageTypeIs { column } => {
                binds.push(FilterBind::Int(filter.image_type_id));
                statement.push_str(&format!(" AND {column} = ${param}"));
            }
            Predicate::TeamTypeIs { column } => {
                binds.push(FilterBind::Int(filter.team_type_id));
                statement.push_str(&format!(" AND {column} = ${param}"));
            }
        }
    }

    (statement, binds)
}

pub(super) const LATEST_WATERMARK: &str = "SELECT \"timestamp\" FROM update_log \
     WHERE log_id = (SELECT max(log_id) FROM update_log WHERE log_type_id = $1)";

/// `calendar_id` is left NULL; the target's `update_log` must allow it.
pub(super) const APPEND_WATERMARK: &str =
    "INSERT INTO update_log (\"timestamp\", log_type_id) VALUES ($1, $2)";

pub(super) const ROUND_START: &str =
    "SELECT rs.start_time FROM round_segment rs WHERE rs.round_id = $1 AND rs.segment_id = $2";

pub(super) const COUNT_ATTENDED: &str = "SELECT count(*) \
     FROM room_result rr \
     JOIN round r ON r.round_id = rr.round_id \
     JOIN contest c ON c.contest_id = r.contest_id \
     WHERE rr.attended = 'Y' AND rr.coder_id = $1 AND c.season_id = $2";

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use config::shared::SyncConfig;

    use super::*;
    use crate::catalog::{
        CODER_SKILL_XREF, IMAGE_EXTRACT, RATING_EXTRACT, STATE, STATE_EXTRACT, TEAM_EXTRACT,
    };

    #[test]
    fn renders_row_statements() {
        assert_eq!(
            insert(&STATE),
            "INSERT INTO state (state_code, state_name, region_code) VALUES ($1, $2, $3)"
        );

        let (statement, order) = update(&CODER_SKILL_XREF);
        assert_eq!(
            statement,
            "UPDATE coder_skill_xref SET ranking = $1, modify_date = $2, skill_type_id = $3 \
             WHERE coder_id = $4 AND skill_id = $5"
        );
        assert_eq!(
            order,
            vec!["ranking", "modify_date", "skill_type_id", "coder_id", "skill_id"]
        );

        assert_eq!(
            delete(&CODER_SKILL_XREF, &["coder_id"]),
            "DELETE FROM coder_skill_xref WHERE coder_id = $1"
        );
        assert_eq!(
            count_by_key(&STATE),
            "SELECT count(*) FROM state WHERE state_code = $1"
        );
    }

    #[test]
    fn appends_predicates_after_watermark() {
        let mut config = SyncConfig::default();
        config.rating_type_ids = vec![1];
        let filter = ChangeFilter::new(Utc::now(), &config);

        let (statement, binds) = extract(&RATING_EXTRACT, &filter);
        assert!(statement.ends_with(
            "AND NOT EXISTS (SELECT 1 FROM group_user gu WHERE gu.user_id = r.coder_id \
             AND gu.group_id = ANY($2)) AND r.algo_rating_type_id = ANY($3)"
        ));
        assert_eq!(
            binds,
            vec![
                FilterBind::BigIntArray(vec![13, 14]),
                FilterBind::IntArray(vec![1])
            ]
        );

        let (statement, binds) = extract(&STATE_EXTRACT, &filter);
        assert_eq!(statement, STATE_EXTRACT.select);
        assert!(binds.is_empty());
    }

    #[test]
    fn skips_empty_list_predicates() {
        let mut config = SyncConfig::default();
        config.excluded_group_ids.clear();
        let filter = ChangeFilter::new(Utc::now(), &config);

        let (statement, binds) = extract(&RATING_EXTRACT, &filter);
        assert_eq!(statement, RATING_EXTRACT.select);
        assert!(binds.is_empty());
    }

    #[test]
    fn binds_configured_type_filters() {
        let mut config = SyncConfig::default();
        config.image_type_id = 3;
        config.team_type_id = 7;
        let filter = ChangeFilter::new(Utc::now(), &config);

        let (statement, binds) = extract(&IMAGE_EXTRACT, &filter);
        assert!(statement.ends_with("WHERE i.modify_date > $1 AND i.image_type_id = $2"));
        assert_eq!(binds, vec![FilterBind::Int(3)]);

        let (statement, binds) = extract(&TEAM_EXTRACT, &filter);
        assert!(statement.ends_with("WHERE t.modify_date > $1 AND t.team_type = $2"));
        assert_eq!(binds, vec![FilterBind::Int(7)]);
    }
}
