use crate::catalog::{
    CODER, CODER_IMAGE_XREF, CODER_SKILL_XREF, COUNTRY, ColumnDef, CURRENT_SCHOOL, IMAGE, PATH,
    SCHOOL, SKILL, SKILL_TYPE, STATE, TEAM, TEAM_CODER_XREF, TableDef, USER_ACHIEVEMENT,
};
use crate::types::CellType::{I32, I64};

/// A standing restriction appended to an extract's `WHERE` clause.
///
/// Expressions are SQL fragments evaluated against the extract's `FROM` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    /// Drops rows whose member belongs to one of the excluded groups.
    NotInGroups { member: &'static str },
    /// Keeps only the configured rating types. Ignored when no rating type is configured.
    RatingTypeIn { column: &'static str },
    /// Keeps only the configured image type.
    ImageTypeIs { column: &'static str },
    /// Keeps only the configured team type.
    TeamTypeIs { column: &'static str },
}

impl Predicate {
    /// Returns the name the predicate's expression takes in the extract output, which is the
    /// expression without its table alias.
    pub fn output_column(&self) -> &'static str {
        let expression = match self {
            Predicate::NotInGroups { member } => member,
            Predicate::RatingTypeIn { column }
            | Predicate::ImageTypeIs { column }
            | Predicate::TeamTypeIs { column } => column,
        };
        expression.rsplit('.').next().unwrap_or(expression)
    }
}

/// A hand-written source query returning rows changed since the watermark.
///
/// `select` binds the watermark as `$1` (it may be referenced several times) and ends with a
/// `WHERE` clause so that predicates can be appended with `AND`.
#[derive(Debug, PartialEq, Eq)]
pub struct Extract {
    /// Entity name used in logs and error tags.
    pub name: &'static str,
    /// Warehouse table the rows converge into.
    pub table: &'static TableDef,
    /// Output columns, in `select` order.
    pub columns: &'static [ColumnDef],
    pub select: &'static str,
    pub predicates: &'static [Predicate],
}

const NOT_EXCLUDED_CODER: Predicate = Predicate::NotInGroups {
    member: "c.coder_id",
};

pub static STATE_EXTRACT: Extract = Extract {
    name: "state",
    table: &STATE,
    columns: STATE.columns,
    select: "SELECT s.state_code, s.state_name, s.region_code \
             FROM state s \
             WHERE s.modify_date > $1",
    predicates: &[],
};

pub static COUNTRY_EXTRACT: Extract = Extract {
    name: "country",
    table: &COUNTRY,
    columns: COUNTRY.columns,
    select: "SELECT c.country_code, c.country_name, c.participating \
             FROM country c \
             WHERE c.modify_date > $1",
    predicates: &[],
};

/// Joins the member's profile, primary email and home address. A change to any of them
/// re-extracts the coder.
pub static CODER_EXTRACT: Extract = Extract {
    name: "coder",
    table: &CODER,
    columns: CODER.columns,
    select: "SELECT c.coder_id, a.state_code, a.country_code, u.first_name, u.last_name, \
                    a.address1, a.address2, a.city, a.zip, u.middle_name, u.activation_code, \
                    c.member_since, c.quote, c.language_id, c.coder_type_id, u.handle, u.status, \
                    e.address, \
                    (SELECT rs.region_code FROM region_state rs \
                      WHERE rs.state_code = a.state_code AND rs.user_type_id = 3) AS coder_region_code, \
                    c.comp_country_code \
             FROM coder c \
             JOIN \"user\" u ON u.user_id = c.coder_id \
             JOIN email e ON e.user_id = u.user_id AND e.primary_ind = 1 \
             JOIN user_address_xref x ON x.user_id = u.user_id \
             JOIN address a ON a.address_id = x.address_id AND a.address_type_id = 2 \
             WHERE (c.modify_date > $1 OR a.modify_date > $1 OR e.modify_date > $1 OR u.modify_date > $1)",
    predicates: &[NOT_EXCLUDED_CODER],
};

pub static SKILL_TYPE_EXTRACT: Extract = Extract {
    name: "skill_type",
    table: &SKILL_TYPE,
    columns: SKILL_TYPE.columns,
    select: "SELECT st.skill_type_id, st.skill_type_desc, st.skill_type_order, st.status, \
                    CURRENT_TIMESTAMP \
             FROM skill_type st \
             WHERE st.modify_date > $1",
    predicates: &[],
};

pub static SKILL_EXTRACT: Extract = Extract {
    name: "skill",
    table: &SKILL,
    columns: SKILL.columns,
    select: "SELECT s.skill_id, s.skill_type_id, s.skill_desc, s.status, s.skill_order, \
                    CURRENT_TIMESTAMP \
             FROM skill s \
             WHERE s.modify_date > $1",
    predicates: &[],
};

pub static CODER_SKILL_EXTRACT: Extract = Extract {
    name: "coder_skill",
    table: &CODER_SKILL_XREF,
    columns: CODER_SKILL_XREF.columns,
    select: "SELECT cs.coder_id, s.skill_id, cs.ranking, CURRENT_TIMESTAMP, s.skill_type_id \
             FROM coder_skill cs \
             JOIN skill s ON s.skill_id = cs.skill_id \
             WHERE cs.modify_date > $1",
    predicates: &[Predicate::NotInGroups {
        member: "cs.coder_id",
    }],
};

/// Current overall rating per (coder, rating type). Folded into `algo_rating`.
pub static RATING_EXTRACT: Extract = Extract {
    name: "rating",
    table: &crate::catalog::ALGO_RATING,
    columns: &[
        ColumnDef::required("coder_id", I64),
        ColumnDef::required("rating", I32),
        ColumnDef::required("num_ratings", I32),
        ColumnDef::required("vol", I32),
        ColumnDef::required("algo_rating_type_id", I32),
    ],
    select: "SELECT r.coder_id, r.rating, r.num_ratings, r.vol, r.algo_rating_type_id \
             FROM algo_rating r \
             WHERE r.modify_date > $1",
    predicates: &[
        Predicate::NotInGroups {
            member: "r.coder_id",
        },
        Predicate::RatingTypeIn {
            column: "r.algo_rating_type_id",
        },
    ],
};

/// Latest season rating per (coder, season) with the round that produced it. Folded into
/// `season_algo_rating`.
pub static SEASON_RATING_EXTRACT: Extract = Extract {
    name: "season_rating",
    table: &crate::catalog::SEASON_ALGO_RATING,
    columns: &[
        ColumnDef::required("coder_id", I64),
        ColumnDef::required("rating", I32),
        ColumnDef::required("num_ratings", I32),
        ColumnDef::required("vol", I32),
        ColumnDef::required("season_id", I32),
        ColumnDef::required("round_id", I64),
    ],
    select: "SELECT r.coder_id, r.rating, r.num_ratings, r.vol, r.season_id, r.round_id \
             FROM season_algo_rating r \
             WHERE r.modify_date > $1",
    predicates: &[Predicate::NotInGroups {
        member: "r.coder_id",
    }],
};

pub static PATH_EXTRACT: Extract = Extract {
    name: "path",
    table: &PATH,
    columns: PATH.columns,
    select: "SELECT p.path_id, p.path FROM path p WHERE p.modify_date > $1",
    predicates: &[],
};

pub static IMAGE_EXTRACT: Extract = Extract {
    name: "image",
    table: &IMAGE,
    columns: IMAGE.columns,
    select: "SELECT i.image_id, i.file_name, i.image_type_id, i.path_id, i.link, i.height, i.width \
             FROM image i \
             WHERE i.modify_date > $1",
    predicates: &[Predicate::ImageTypeIs {
        column: "i.image_type_id",
    }],
};

pub static CODER_IMAGE_EXTRACT: Extract = Extract {
    name: "coder_image_xref",
    table: &CODER_IMAGE_XREF,
    columns: CODER_IMAGE_XREF.columns,
    select: "SELECT cix.coder_id, cix.image_id, cix.display_flag \
             FROM coder_image_xref cix \
             JOIN image i ON i.image_id = cix.image_id \
             WHERE cix.modify_date > $1",
    predicates: &[Predicate::ImageTypeIs {
        column: "i.image_type_id",
    }],
};

pub static SCHOOL_EXTRACT: Extract = Extract {
    name: "school",
    table: &SCHOOL,
    columns: SCHOOL.columns,
    select: "SELECT s.school_id, s.sort_letter, s.city, s.state_code, s.country_code, s.name, \
                    s.short_name \
             FROM school s \
             WHERE s.modify_date > $1",
    predicates: &[],
};

pub static CURRENT_SCHOOL_EXTRACT: Extract = Extract {
    name: "current_school",
    table: &CURRENT_SCHOOL,
    columns: CURRENT_SCHOOL.columns,
    select: "SELECT cs.coder_id, cs.school_id, cs.gpa, cs.gpa_scale, cs.viewable \
             FROM current_school cs \
             WHERE cs.modify_date > $1",
    predicates: &[],
};

/// Achievements are immutable once granted, so they are selected by creation date.
pub static ACHIEVEMENT_EXTRACT: Extract = Extract {
    name: "achievement",
    table: &USER_ACHIEVEMENT,
    columns: USER_ACHIEVEMENT.columns,
    select: "SELECT ua.user_id AS coder_id, ua.achievement_date, ua.achievement_type_id, \
                    ua.description, t.achievement_type_desc \
             FROM user_achievement ua \
             JOIN achievement_type_lu t ON t.achievement_type_id = ua.achievement_type_id \
             WHERE ua.create_date > $1",
    predicates: &[],
};

pub static TEAM_EXTRACT: Extract = Extract {
    name: "team",
    table: &TEAM,
    columns: TEAM.columns,
    select: "SELECT t.team_id, t.team_name AS name, t.team_type, t.school_id \
             FROM team t \
             WHERE t.modify_date > $1",
    predicates: &[Predicate::TeamTypeIs {
        column: "t.team_type",
    }],
};

pub static TEAM_CODER_EXTRACT: Extract = Extract {
    name: "team_coder_xref",
    table: &TEAM_CODER_XREF,
    columns: TEAM_CODER_XREF.columns,
    select: "SELECT tc.team_id, tc.coder_id \
             FROM team_coder_xref tc \
             JOIN team t ON t.team_id = tc.team_id \
             WHERE tc.create_date > $1",
    predicates: &[Predicate::TeamTypeIs {
        column: "t.team_type",
    }],
};
