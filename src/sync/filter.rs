//! Include/exclude eligibility filters.
//!
//! Patterns are shell globs matched against flat names. Include is
//! evaluated first (a name must match at least one pattern when any are
//! configured), then exclude removes matches.

use glob::Pattern;

use crate::error::{Result, SkillsyncError};

use super::config::TargetConfig;
use super::inventory::SourceSkill;

/// Compile glob patterns, failing on the first invalid one.
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|raw| {
            Pattern::new(raw).map_err(|err| SkillsyncError::InvalidFilterPattern {
                pattern: raw.clone(),
                reason: err.msg.to_string(),
            })
        })
        .collect()
}

/// Compiled eligibility filter for one target.
#[derive(Debug, Clone, Default)]
pub struct SkillFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl SkillFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            include: compile_patterns(include)?,
            exclude: compile_patterns(exclude)?,
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Whether `name` survives include-then-exclude.
    #[must_use]
    pub fn allows(&self, name: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|p| p.matches(name));
        included && !self.exclude.iter().any(|p| p.matches(name))
    }

    /// Keep the items whose key passes the filter.
    pub fn apply<'a, T>(&self, items: &'a [T], key: impl Fn(&T) -> &str) -> Vec<&'a T> {
        items.iter().filter(|item| self.allows(key(item))).collect()
    }
}

/// Skills a per-skill target receives: its include/exclude filter first,
/// then each skill's own front matter `targets` restriction.
pub fn select_for_target<'a>(
    target: &TargetConfig,
    skills: &'a [SourceSkill],
) -> Result<Vec<&'a SourceSkill>> {
    let filter = SkillFilter::new(&target.include, &target.exclude)?;
    Ok(filter
        .apply(skills, |s| s.flat_name.as_str())
        .into_iter()
        .filter(|skill| skill.allows_target(&target.name))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::config::SyncMode;
    use std::path::PathBuf;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn empty_filter_allows_everything() {
        let filter = SkillFilter::default();
        assert!(filter.is_empty());
        assert!(filter.allows("anything"));
    }

    #[test]
    fn include_then_exclude_precedence() {
        let filter = SkillFilter::new(&strings(&["app-*"]), &strings(&["*-beta"])).unwrap();
        let names = ["app-main", "app-beta", "tool-main"];
        let kept: Vec<&str> = filter.apply(&names, |n| *n).into_iter().copied().collect();
        assert_eq!(kept, vec!["app-main"]);
    }

    #[test]
    fn exclude_applies_without_include() {
        let filter = SkillFilter::new(&[], &strings(&["legacy__*"])).unwrap();
        assert!(filter.allows("tools__lint"));
        assert!(!filter.allows("legacy__old"));
    }

    #[test]
    fn invalid_pattern_names_the_pattern() {
        let err = SkillFilter::new(&strings(&["ok-*", "[abc"]), &[]).unwrap_err();
        match err {
            SkillsyncError::InvalidFilterPattern { pattern, .. } => assert_eq!(pattern, "[abc"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn target_restriction_applies_after_filters() {
        let skill = |rel: &str, targets: Option<&[&str]>| SourceSkill {
            rel_path: rel.to_string(),
            flat_name: rel.to_string(),
            path: PathBuf::from("/src").join(rel),
            frontmatter_name: None,
            targets: targets.map(strings),
        };
        let skills = vec![
            skill("everywhere", None),
            skill("claude-only", Some(&["claude"][..])),
            skill("legacy", Some(&["claude"][..])),
            skill("nowhere", Some(&[][..])),
        ];
        let claude = TargetConfig::new("claude", "/t", SyncMode::Merge).with_exclude(&["legacy"]);
        let codex = TargetConfig::new("codex", "/t2", SyncMode::Copy);

        let names = |target: &TargetConfig| -> Vec<String> {
            select_for_target(target, &skills)
                .unwrap()
                .into_iter()
                .map(|s| s.flat_name.clone())
                .collect()
        };
        assert_eq!(names(&claude), vec!["everywhere", "claude-only"]);
        assert_eq!(names(&codex), vec!["everywhere"]);
    }
}
