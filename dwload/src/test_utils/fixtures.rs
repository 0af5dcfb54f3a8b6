//! Well-typed rows for the catalog tables and extracts.
//!
//! Only the columns tests care about are parameters; the rest get fixed plausible values.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::row;
use crate::types::TableRow;

/// Midnight UTC of the given day.
pub fn instant(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

pub fn state(code: &str, name: &str) -> TableRow {
    row![code, name, "NE"]
}

pub fn country(code: &str, name: &str) -> TableRow {
    row![code, name, 1_i32]
}

pub fn coder(coder_id: i64, handle: &str) -> TableRow {
    row![
        coder_id,
        "CT",
        "840",
        "Ada",
        "Lovelace",
        "12 Analytical Way",
        None::<String>,
        "Hartford",
        "06101",
        None::<String>,
        "A1B2C3",
        instant(2003, 5, 17),
        None::<String>,
        1_i32,
        1_i32,
        handle,
        "A",
        format!("{handle}@example.com"),
        "NE",
        "840",
    ]
}

pub fn skill_type(skill_type_id: i32, desc: &str) -> TableRow {
    row![skill_type_id, desc, 1_i32, "A", instant(2024, 1, 1)]
}

pub fn skill(skill_id: i32, skill_type_id: i32, desc: &str) -> TableRow {
    row![skill_id, skill_type_id, desc, "A", 1_i32, instant(2024, 1, 1)]
}

pub fn coder_skill(coder_id: i64, skill_id: i32, ranking: i32) -> TableRow {
    row![coder_id, skill_id, ranking, instant(2024, 1, 1), 1_i32]
}

/// Row of the overall rating extract.
pub fn rating(coder_id: i64, rating_type_id: i32, rating: i32, num_ratings: i32) -> TableRow {
    row![coder_id, rating, num_ratings, 350_i32, rating_type_id]
}

/// Row of the season rating extract.
pub fn season_rating(coder_id: i64, season_id: i32, round_id: i64, rating: i32) -> TableRow {
    row![coder_id, rating, 4_i32, 320_i32, season_id, round_id]
}

pub fn path(path_id: i32, path: &str) -> TableRow {
    row![path_id, path]
}

pub fn image(image_id: i64, image_type_id: i32, path_id: i32) -> TableRow {
    row![
        image_id,
        format!("{image_id}.jpg"),
        image_type_id,
        path_id,
        None::<String>,
        126_i32,
        126_i32,
    ]
}

pub fn coder_image(coder_id: i64, image_id: i64, display_flag: i32) -> TableRow {
    row![coder_id, image_id, display_flag]
}

pub fn school(school_id: i64, name: &str) -> TableRow {
    row![school_id, "H", "Hartford", "CT", "840", name, None::<String>]
}

pub fn current_school(coder_id: i64, school_id: i64) -> TableRow {
    row![coder_id, school_id, 3.6_f64, 4.0_f64, 1_i32]
}

pub fn achievement(coder_id: i64, date: NaiveDate, achievement_type_id: i32) -> TableRow {
    row![
        coder_id,
        date,
        achievement_type_id,
        "First Rated Event",
        "Algorithm Competitions"
    ]
}

pub fn team(team_id: i64, name: &str, team_type: i32, school_id: i64) -> TableRow {
    row![team_id, name, team_type, school_id]
}

pub fn team_coder(team_id: i64, coder_id: i64) -> TableRow {
    row![team_id, coder_id]
}
