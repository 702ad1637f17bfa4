//! Source string resolution.
//!
//! Turns the raw `<SOURCE>` argument into a [`SourceDescriptor`]. Accepted
//! forms, checked in order:
//!
//! - local paths: absolute, `~`-prefixed, `./`, `../`, `.`, `file://`, or any
//!   existing directory
//! - GitHub URLs with optional `tree/<branch>/` or `blob/<branch>/` segments
//! - `git@host:owner/repo[.git]`
//! - `https://host/owner/repo[.git][/subdir]`
//! - `owner/repo[/subdir...]` shorthand, expanded to GitHub

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{Result, SkillsyncError};
use crate::utils::fs::{expand_tilde, normalize_path};

static GITHUB_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?github\.com/([^/]+)/([^/]+)(?:/(.+))?$").unwrap()
});

static GIT_SSH_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^git@([^:]+):([^/]+)/(.+?)(?:\.git)?$").unwrap());

static GIT_HTTPS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://([^/]+)/([^/]+)/([^/]+?)(?:\.git)?(?:/(.+))?$").unwrap()
});

static SHORTHAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9][A-Za-z0-9_.-]*)/([A-Za-z0-9_.-]+?)(?:\.git)?(?:/(.+))?$").unwrap()
});

const GITHUB_HOST: &str = "github.com";

/// How a source is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    LocalPath,
    GitHttps,
    GitSsh,
    GitShorthand,
}

/// A parsed installation source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceDescriptor {
    pub kind: SourceKind,
    /// Input as the user typed it (trimmed).
    pub raw_input: String,
    /// Clone URL for git kinds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clone_url: Option<String>,
    /// Path inside the repository or local tree, `/`-separated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subdir: Option<String>,
    /// Absolute path for local sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
    /// Name derived from the subdir, repository, or directory basename.
    pub resolved_name: String,
    #[serde(skip)]
    host: Option<String>,
}

impl SourceDescriptor {
    /// Build a git descriptor for an arbitrary clone URL.
    ///
    /// Bypasses string parsing, so any URL libgit2 understands (including
    /// plain filesystem paths) can be used as a git source.
    pub fn from_clone_url(clone_url: impl Into<String>, subdir: Option<&str>) -> Result<Self> {
        let clone_url = clone_url.into();
        let subdir = match subdir {
            Some(raw) => normalize_subdir(&clone_url, raw)?,
            None => None,
        };
        let repo = repo_name_from_url(&clone_url);
        let resolved_name = derive_name(&clone_url, subdir.as_deref(), &repo)?;
        Ok(Self {
            kind: SourceKind::GitHttps,
            raw_input: clone_url.clone(),
            clone_url: Some(clone_url),
            subdir,
            local_path: None,
            resolved_name,
            host: None,
        })
    }

    /// Whether the source must be cloned.
    #[must_use]
    pub const fn is_git(&self) -> bool {
        !matches!(self.kind, SourceKind::LocalPath)
    }

    #[must_use]
    pub const fn has_subdir(&self) -> bool {
        self.subdir.is_some()
    }

    /// Type string recorded in install metadata.
    #[must_use]
    pub fn meta_type(&self) -> String {
        let base = match self.kind {
            SourceKind::LocalPath => "local",
            SourceKind::GitShorthand => "github",
            SourceKind::GitHttps if self.host.as_deref() == Some(GITHUB_HOST) => "github",
            SourceKind::GitHttps => "git-https",
            SourceKind::GitSsh => "git-ssh",
        };
        if self.has_subdir() {
            format!("{base}-subdir")
        } else {
            base.to_string()
        }
    }

    /// Replace the subdir after fuzzy resolution, re-deriving the name.
    pub fn set_resolved_subdir(&mut self, subdir: &str) {
        let trimmed = subdir.trim_matches('/');
        if trimmed.is_empty() || trimmed == "." {
            return;
        }
        if let Some(base) = trimmed.rsplit('/').next() {
            self.resolved_name = base.to_string();
        }
        self.subdir = Some(trimmed.to_string());
    }

    /// String to record as provenance; re-parsing it yields an equivalent source.
    #[must_use]
    pub fn provenance(&self) -> String {
        match (&self.local_path, &self.clone_url) {
            (Some(path), _) => path.display().to_string(),
            (None, Some(url)) if self.kind == SourceKind::GitShorthand || self.host.as_deref() == Some(GITHUB_HOST) => {
                let base = url
                    .trim_start_matches("https://")
                    .trim_end_matches(".git")
                    .to_string();
                match &self.subdir {
                    Some(sub) => format!("{base}/{sub}"),
                    None => base,
                }
            }
            _ => self.raw_input.clone(),
        }
    }
}

/// Parse a raw source string.
pub fn parse(raw: &str) -> Result<SourceDescriptor> {
    let input = raw.trim();
    if input.is_empty() {
        return Err(invalid(raw, "source cannot be empty"));
    }

    if let Some(path) = input.strip_prefix("file://") {
        return parse_local(input, path);
    }
    if looks_local(input) {
        return parse_local(input, input);
    }

    if let Some(caps) = GITHUB_URL.captures(input) {
        let owner = &caps[1];
        let repo = caps[2].trim_end_matches(".git");
        let subdir = caps
            .get(3)
            .map(|m| strip_branch_prefix(m.as_str()))
            .unwrap_or_default();
        return git_descriptor(
            input,
            SourceKind::GitHttps,
            Some(GITHUB_HOST),
            format!("https://{GITHUB_HOST}/{owner}/{repo}.git"),
            repo,
            &subdir,
        );
    }

    if let Some(caps) = GIT_SSH_URL.captures(input) {
        let (host, owner) = (&caps[1], &caps[2]);
        let repo = caps[3].trim_end_matches(".git");
        return git_descriptor(
            input,
            SourceKind::GitSsh,
            Some(host),
            format!("git@{host}:{owner}/{repo}.git"),
            repo,
            "",
        );
    }

    if let Some(caps) = GIT_HTTPS_URL.captures(input) {
        let (host, owner, repo) = (&caps[1], &caps[2], &caps[3]);
        let subdir = caps.get(4).map_or("", |m| m.as_str());
        return git_descriptor(
            input,
            SourceKind::GitHttps,
            Some(host),
            format!("https://{host}/{owner}/{repo}.git"),
            repo,
            subdir,
        );
    }

    if !input.contains("://") {
        if let Some(caps) = SHORTHAND.captures(input) {
            let (owner, repo) = (&caps[1], &caps[2]);
            let subdir = caps.get(3).map_or("", |m| m.as_str());
            return git_descriptor(
                input,
                SourceKind::GitShorthand,
                Some(GITHUB_HOST),
                format!("https://{GITHUB_HOST}/{owner}/{repo}.git"),
                repo,
                subdir,
            );
        }
    }

    Err(invalid(input, "unrecognized source format"))
}

fn looks_local(input: &str) -> bool {
    input == "."
        || input == ".."
        || input.starts_with('/')
        || input.starts_with('~')
        || input.starts_with("./")
        || input.starts_with("../")
        || input.starts_with(".\\")
        || input.starts_with("..\\")
        || (!input.contains("://") && !input.starts_with("git@") && Path::new(input).is_dir())
        || Path::new(input).is_absolute()
}

fn parse_local(input: &str, path: &str) -> Result<SourceDescriptor> {
    if path.is_empty() {
        return Err(invalid(input, "empty path"));
    }
    let expanded = expand_tilde(path);
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()?.join(expanded)
    };
    let absolute = normalize_path(&absolute);
    let name = absolute
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| invalid(input, "cannot derive a skill name from this path"))?;

    Ok(SourceDescriptor {
        kind: SourceKind::LocalPath,
        raw_input: input.to_string(),
        clone_url: None,
        subdir: None,
        local_path: Some(absolute),
        resolved_name: name,
        host: None,
    })
}

fn git_descriptor(
    input: &str,
    kind: SourceKind,
    host: Option<&str>,
    clone_url: String,
    repo: &str,
    raw_subdir: &str,
) -> Result<SourceDescriptor> {
    let subdir = normalize_subdir(input, raw_subdir)?;
    let resolved_name = derive_name(input, subdir.as_deref(), repo)?;
    Ok(SourceDescriptor {
        kind,
        raw_input: input.to_string(),
        clone_url: Some(clone_url),
        subdir,
        local_path: None,
        resolved_name,
        host: host.map(str::to_string),
    })
}

/// Drop `tree/<branch>/` or `blob/<branch>/` from GitHub web URLs.
fn strip_branch_prefix(subdir: &str) -> String {
    let mut parts = subdir.splitn(3, '/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("tree" | "blob"), Some(_branch), Some(rest)) => rest.to_string(),
        (Some("tree" | "blob"), Some(_branch), None) => String::new(),
        _ => subdir.to_string(),
    }
}

/// Normalize a subdir: drop `.` and empty segments, reject `..`.
fn normalize_subdir(input: &str, raw: &str) -> Result<Option<String>> {
    let mut segments = Vec::new();
    for segment in raw.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => return Err(invalid(input, "subdirectory may not contain '..'")),
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        Ok(None)
    } else {
        Ok(Some(segments.join("/")))
    }
}

fn derive_name(input: &str, subdir: Option<&str>, repo: &str) -> Result<String> {
    let name = subdir
        .and_then(|s| s.rsplit('/').next())
        .unwrap_or(repo)
        .trim();
    if name.is_empty() {
        return Err(invalid(input, "cannot derive a skill name"));
    }
    Ok(name.to_string())
}

fn repo_name_from_url(url: &str) -> String {
    url.trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\', ':'])
        .next()
        .unwrap_or(url)
        .trim_end_matches(".git")
        .to_string()
}

fn invalid(input: &str, reason: &str) -> SkillsyncError {
    SkillsyncError::InvalidSource {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}
