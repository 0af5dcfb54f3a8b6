//! Dependency-ordered list of load steps.
//!
//! Steps declare the steps whose tables they reference. A [`LoadPlan`] is a topological order
//! of a set of steps where ties are broken by declaration order, so the default plan always
//! runs the same sequence.

use std::collections::HashSet;
use std::fmt;

use crate::bail;
use crate::catalog::{
    ACHIEVEMENT_EXTRACT, CODER_EXTRACT, CODER_IMAGE_EXTRACT, CODER_SKILL_EXTRACT,
    COUNTRY_EXTRACT, CURRENT_SCHOOL_EXTRACT, IMAGE_EXTRACT, PATH_EXTRACT, SCHOOL_EXTRACT,
    SKILL_EXTRACT, SKILL_TYPE_EXTRACT, STATE_EXTRACT, TEAM_CODER_EXTRACT, TEAM_EXTRACT,
};
use crate::error::{ErrorKind, LoadResult};
use crate::loaders::{EntitySpec, LoadStrategy};

/// One unit of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadStep {
    State,
    Country,
    Coder,
    SkillType,
    Skill,
    CoderSkill,
    Rating,
    SeasonRating,
    Path,
    Image,
    CoderImageXref,
    School,
    CurrentSchool,
    Achievement,
    Team,
    TeamCoderXref,
}

/// What a step does when it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepJob {
    Entity(EntitySpec),
    Rating,
    SeasonRating,
}

impl LoadStep {
    /// Every step, in the order a full run executes them.
    pub const ALL: [LoadStep; 16] = [
        LoadStep::State,
        LoadStep::Country,
        LoadStep::Coder,
        LoadStep::SkillType,
        LoadStep::Skill,
        LoadStep::CoderSkill,
        LoadStep::Rating,
        LoadStep::SeasonRating,
        LoadStep::Path,
        LoadStep::Image,
        LoadStep::CoderImageXref,
        LoadStep::School,
        LoadStep::CurrentSchool,
        LoadStep::Achievement,
        LoadStep::Team,
        LoadStep::TeamCoderXref,
    ];

    /// Entity name used in logs and error tags.
    pub fn name(self) -> &'static str {
        match self {
            LoadStep::State => "state",
            LoadStep::Country => "country",
            LoadStep::Coder => "coder",
            LoadStep::SkillType => "skill_type",
            LoadStep::Skill => "skill",
            LoadStep::CoderSkill => "coder_skill",
            LoadStep::Rating => "rating",
            LoadStep::SeasonRating => "season_rating",
            LoadStep::Path => "path",
            LoadStep::Image => "image",
            LoadStep::CoderImageXref => "coder_image_xref",
            LoadStep::School => "school",
            LoadStep::CurrentSchool => "current_school",
            LoadStep::Achievement => "achievement",
            LoadStep::Team => "team",
            LoadStep::TeamCoderXref => "team_coder_xref",
        }
    }

    /// Steps that must have converged before this one runs.
    pub fn dependencies(self) -> &'static [LoadStep] {
        use LoadStep::*;

        match self {
            State | Country | SkillType | Path => &[],
            Coder => &[State, Country],
            Skill => &[SkillType],
            CoderSkill => &[Coder, Skill],
            Rating | SeasonRating | Achievement => &[Coder],
            Image => &[Path],
            CoderImageXref => &[Coder, Image],
            School => &[State, Country],
            CurrentSchool => &[Coder, School],
            Team => &[School],
            TeamCoderXref => &[Coder, Team],
        }
    }

    pub fn job(self) -> StepJob {
        let entity = |extract, strategy| {
            StepJob::Entity(EntitySpec {
                extract,
                strategy,
                touches: None,
            })
        };

        match self {
            LoadStep::State => entity(&STATE_EXTRACT, LoadStrategy::InsertOrUpdate),
            LoadStep::Country => entity(&COUNTRY_EXTRACT, LoadStrategy::InsertOrUpdate),
            LoadStep::Coder => StepJob::Entity(EntitySpec {
                extract: &CODER_EXTRACT,
                strategy: LoadStrategy::ProbeThenWrite,
                touches: Some("coder_id"),
            }),
            LoadStep::SkillType => entity(&SKILL_TYPE_EXTRACT, LoadStrategy::ProbeThenWrite),
            LoadStep::Skill => entity(&SKILL_EXTRACT, LoadStrategy::ProbeThenWrite),
            LoadStep::CoderSkill => entity(
                &CODER_SKILL_EXTRACT,
                LoadStrategy::FullReplace {
                    scope: &["coder_id", "skill_id"],
                },
            ),
            LoadStep::Rating => StepJob::Rating,
            LoadStep::SeasonRating => StepJob::SeasonRating,
            LoadStep::Path => entity(&PATH_EXTRACT, LoadStrategy::InsertOrUpdate),
            LoadStep::Image => entity(&IMAGE_EXTRACT, LoadStrategy::InsertOrUpdate),
            LoadStep::CoderImageXref => entity(&CODER_IMAGE_EXTRACT, LoadStrategy::InsertOrUpdate),
            LoadStep::School => entity(&SCHOOL_EXTRACT, LoadStrategy::InsertOrUpdate),
            LoadStep::CurrentSchool => entity(&CURRENT_SCHOOL_EXTRACT, LoadStrategy::InsertOrUpdate),
            LoadStep::Achievement => entity(&ACHIEVEMENT_EXTRACT, LoadStrategy::InsertOrUpdate),
            LoadStep::Team => entity(&TEAM_EXTRACT, LoadStrategy::InsertOrUpdate),
            LoadStep::TeamCoderXref => entity(
                &TEAM_CODER_EXTRACT,
                LoadStrategy::FullReplace {
                    scope: &["coder_id"],
                },
            ),
        }
    }
}

impl fmt::Display for LoadStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An executable order of load steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadPlan {
    steps: Vec<LoadStep>,
}

impl LoadPlan {
    /// Orders `steps` so that every step runs after its dependencies.
    ///
    /// Fails with [`ErrorKind::InvalidPlan`] when a step is listed twice, depends on a step not
    /// in the plan, or takes part in a dependency cycle.
    pub fn resolve(steps: &[LoadStep]) -> LoadResult<Self> {
        let steps = topological_order(steps, |step| step.dependencies())?;
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[LoadStep] {
        &self.steps
    }
}

impl Default for LoadPlan {
    fn default() -> Self {
        Self {
            steps: LoadStep::ALL.to_vec(),
        }
    }
}

/// Kahn's algorithm choosing, at every point, the earliest declared node whose dependencies
/// have all been emitted.
fn topological_order<T, F>(nodes: &[T], dependencies: F) -> LoadResult<Vec<T>>
where
    T: Copy + Eq + std::hash::Hash + fmt::Display + 'static,
    F: Fn(T) -> &'static [T],
{
    let mut declared = HashSet::with_capacity(nodes.len());
    for node in nodes {
        if !declared.insert(*node) {
            bail!(
                ErrorKind::InvalidPlan,
                "Load step listed twice",
                format!("step {node} appears more than once")
            );
        }
    }

    for node in nodes {
        if let Some(missing) = dependencies(*node)
            .iter()
            .find(|dependency| !declared.contains(*dependency))
        {
            bail!(
                ErrorKind::InvalidPlan,
                "Load step depends on a step outside the plan",
                format!("step {node} depends on {missing}")
            );
        }
    }

    let mut emitted = HashSet::with_capacity(nodes.len());
    let mut order = Vec::with_capacity(nodes.len());
    while order.len() < nodes.len() {
        let next = nodes.iter().find(|node| {
            !emitted.contains(*node)
                && dependencies(**node)
                    .iter()
                    .all(|dependency| emitted.contains(dependency))
        });

        let Some(next) = next else {
            let blocked = nodes
                .iter()
                .filter(|node| !emitted.contains(*node))
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            bail!(
                ErrorKind::InvalidPlan,
                "Load steps form a dependency cycle",
                format!("no order exists for {blocked}")
            );
        };

        emitted.insert(*next);
        order.push(*next);
    }

    Ok(order)
}
