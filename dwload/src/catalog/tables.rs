use crate::catalog::{ColumnDef, TableDef};
use crate::types::CellType::{Date, F64, I32, I64, String as Text, TimestampTz};

const fn req(name: &'static str, cell_type: crate::types::CellType) -> ColumnDef {
    ColumnDef::required(name, cell_type)
}

const fn opt(name: &'static str, cell_type: crate::types::CellType) -> ColumnDef {
    ColumnDef::nullable(name, cell_type)
}

pub const STATE: TableDef = TableDef {
    name: "state",
    columns: &[
        req("state_code", Text),
        opt("state_name", Text),
        opt("region_code", Text),
    ],
    key: &["state_code"],
};

pub const COUNTRY: TableDef = TableDef {
    name: "country",
    columns: &[
        req("country_code", Text),
        opt("country_name", Text),
        opt("participating", I32),
    ],
    key: &["country_code"],
};

/// The primary entity. Its keys feed cache invalidation.
pub const CODER: TableDef = TableDef {
    name: "coder",
    columns: &[
        req("coder_id", I64),
        opt("state_code", Text),
        opt("country_code", Text),
        opt("first_name", Text),
        opt("last_name", Text),
        opt("address1", Text),
        opt("address2", Text),
        opt("city", Text),
        opt("zip", Text),
        opt("middle_name", Text),
        opt("activation_code", Text),
        opt("member_since", TimestampTz),
        opt("quote", Text),
        opt("language_id", I32),
        opt("coder_type_id", I32),
        opt("handle", Text),
        opt("status", Text),
        opt("email", Text),
        opt("coder_region_code", Text),
        opt("comp_country_code", Text),
    ],
    key: &["coder_id"],
};

pub const SKILL_TYPE: TableDef = TableDef {
    name: "skill_type_lu",
    columns: &[
        req("skill_type_id", I32),
        opt("skill_type_desc", Text),
        opt("skill_type_order", I32),
        opt("status", Text),
        opt("modify_date", TimestampTz),
    ],
    key: &["skill_type_id"],
};

pub const SKILL: TableDef = TableDef {
    name: "skill",
    columns: &[
        req("skill_id", I32),
        req("skill_type_id", I32),
        opt("skill_desc", Text),
        opt("status", Text),
        opt("skill_order", I32),
        opt("modify_date", TimestampTz),
    ],
    key: &["skill_id"],
};

pub const CODER_SKILL_XREF: TableDef = TableDef {
    name: "coder_skill_xref",
    columns: &[
        req("coder_id", I64),
        req("skill_id", I32),
        opt("ranking", I32),
        opt("modify_date", TimestampTz),
        opt("skill_type_id", I32),
    ],
    key: &["coder_id", "skill_id"],
};

pub const ALGO_RATING: TableDef = TableDef {
    name: "algo_rating",
    columns: &[
        req("coder_id", I64),
        req("rating", I32),
        req("num_ratings", I32),
        req("vol", I32),
        req("highest_rating", I32),
        req("lowest_rating", I32),
        opt("first_rated_round_id", I64),
        opt("last_rated_round_id", I64),
        req("num_competitions", I32),
        req("algo_rating_type_id", I32),
    ],
    key: &["coder_id", "algo_rating_type_id"],
};

pub const SEASON_ALGO_RATING: TableDef = TableDef {
    name: "season_algo_rating",
    columns: &[
        req("coder_id", I64),
        req("season_id", I32),
        req("rating", I32),
        req("vol", I32),
        req("num_ratings", I32),
        req("num_competitions", I64),
        req("highest_rating", I32),
        req("lowest_rating", I32),
        opt("first_rated_round_id", I64),
        opt("last_rated_round_id", I64),
    ],
    key: &["coder_id", "season_id"],
};

pub const PATH: TableDef = TableDef {
    name: "path",
    columns: &[req("path_id", I32), opt("path", Text)],
    key: &["path_id"],
};

pub const IMAGE: TableDef = TableDef {
    name: "image",
    columns: &[
        req("image_id", I64),
        opt("file_name", Text),
        req("image_type_id", I32),
        opt("path_id", I32),
        opt("link", Text),
        opt("height", I32),
        opt("width", I32),
    ],
    key: &["image_id"],
};

pub const CODER_IMAGE_XREF: TableDef = TableDef {
    name: "coder_image_xref",
    columns: &[
        req("coder_id", I64),
        req("image_id", I64),
        opt("display_flag", I32),
    ],
    key: &["coder_id", "image_id"],
};

pub const SCHOOL: TableDef = TableDef {
    name: "school",
    columns: &[
        req("school_id", I64),
        opt("sort_letter", Text),
        opt("city", Text),
        opt("state_code", Text),
        opt("country_code", Text),
        opt("name", Text),
        opt("short_name", Text),
    ],
    key: &["school_id"],
};

/// One row per coder: the school they currently attend.
pub const CURRENT_SCHOOL: TableDef = TableDef {
    name: "current_school",
    columns: &[
        req("coder_id", I64),
        opt("school_id", I64),
        opt("gpa", F64),
        opt("gpa_scale", F64),
        opt("viewable", I32),
    ],
    key: &["coder_id"],
};

pub const USER_ACHIEVEMENT: TableDef = TableDef {
    name: "user_achievement",
    columns: &[
        req("coder_id", I64),
        req("achievement_date", Date),
        req("achievement_type_id", I32),
        opt("description", Text),
        opt("achievement_type_desc", Text),
    ],
    key: &["coder_id", "achievement_type_id", "achievement_date"],
};

pub const TEAM: TableDef = TableDef {
    name: "team",
    columns: &[
        req("team_id", I64),
        opt("name", Text),
        req("team_type", I32),
        opt("school_id", I64),
    ],
    key: &["team_id"],
};

pub const TEAM_CODER_XREF: TableDef = TableDef {
    name: "team_coder_xref",
    columns: &[req("team_id", I64), req("coder_id", I64)],
    key: &["team_id", "coder_id"],
};
