//! Flat names and collision detection.
//!
//! A skill's flat name is its relative path with segments joined by
//! [`FLAT_SEPARATOR`]. It is the skill's directory-entry name inside merge
//! and copy targets, so two skills sharing one is a configuration error.
//! Skills sharing a front matter `name` are only a notice: identity is
//! path-derived.

use std::collections::BTreeMap;

use itertools::Itertools;
use serde::Serialize;

use crate::error::{Result, SkillsyncError};

use super::config::TargetConfig;
use super::filter::select_for_target;
use super::inventory::SourceSkill;

/// Separator between path segments in a flat name.
pub const FLAT_SEPARATOR: &str = "__";

/// Flatten a `/`-separated relative path.
#[must_use]
pub fn flatten(rel_path: &str) -> String {
    rel_path
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty())
        .join(FLAT_SEPARATOR)
}

/// Fail when two skills share a flat name.
pub fn check_flat_collisions<'a>(skills: impl IntoIterator<Item = &'a SourceSkill>) -> Result<()> {
    let groups = skills.into_iter().into_group_map_by(|s| s.flat_name.clone());
    let collision = groups
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .sorted_by(|a, b| a.0.cmp(&b.0))
        .next();

    match collision {
        Some((flat_name, members)) => Err(SkillsyncError::FlatNameCollision {
            flat_name,
            paths: members.iter().map(|s| s.rel_path.clone()).sorted().collect(),
        }),
        None => Ok(()),
    }
}

/// Skills that declare the same front matter name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameCoincidence {
    pub name: String,
    pub paths: Vec<String>,
}

impl NameCoincidence {
    #[must_use]
    pub fn message(&self) -> String {
        format!(
            "skills {} share the name '{}'; they remain distinct by path",
            self.paths.join(", "),
            self.name
        )
    }
}

/// Group skills by front matter name, keeping groups of two or more.
#[must_use]
pub fn name_coincidences<'a>(
    skills: impl IntoIterator<Item = &'a SourceSkill>,
) -> Vec<NameCoincidence> {
    skills
        .into_iter()
        .filter_map(|s| s.frontmatter_name.as_deref().map(|name| (name, s)))
        .into_group_map()
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(name, members)| NameCoincidence {
            name: name.to_string(),
            paths: members.iter().map(|s| s.rel_path.clone()).sorted().collect(),
        })
        .sorted_by(|a, b| a.name.cmp(&b.name))
        .collect()
}

/// Coincidences over the whole inventory and per target after filtering.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CoincidenceReport {
    pub global: Vec<NameCoincidence>,
    /// Keyed by target name; symlink targets and clean targets are absent.
    pub per_target: BTreeMap<String, Vec<NameCoincidence>>,
}

impl CoincidenceReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.global.is_empty()
    }
}

/// Compute name coincidences globally and for each per-skill target.
///
/// A global coincidence that target filters split apart does not appear
/// under that target.
pub fn check_name_collisions(
    skills: &[SourceSkill],
    targets: &[TargetConfig],
) -> Result<CoincidenceReport> {
    let mut report = CoincidenceReport {
        global: name_coincidences(skills),
        per_target: BTreeMap::new(),
    };
    if report.global.is_empty() {
        return Ok(report);
    }

    for target in targets.iter().filter(|t| t.mode.is_per_skill()) {
        let eligible = select_for_target(target, skills)?;
        let found = name_coincidences(eligible);
        if !found.is_empty() {
            report.per_target.insert(target.name.clone(), found);
        }
    }
    Ok(report)
}
