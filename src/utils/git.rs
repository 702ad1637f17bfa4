//! Git utilities
//!
//! Thin wrappers over `git2` for the clone, pull and head lookups the
//! installer needs. Credentials come from the ambient git configuration
//! (credential helpers, ssh-agent); nothing is retried.

use std::path::Path;

use git2::{Cred, CredentialType, RemoteCallbacks, Repository, build::CheckoutBuilder};
use tracing::debug;

use crate::error::{Result, SkillsyncError};

/// Result of a fast-forward pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    UpToDate,
    FastForwarded { from: Option<String>, to: String },
}

/// Check if directory is a git repository
pub fn is_repo(path: impl AsRef<Path>) -> bool {
    path.as_ref().join(".git").exists()
}

/// Whether a clone URL addresses the local filesystem.
///
/// libgit2's local transport cannot perform shallow fetches, so callers use
/// this to decide whether `depth(1)` is applicable.
#[must_use]
pub fn is_local_url(url: &str) -> bool {
    if url.starts_with("file://") {
        return true;
    }
    if url.contains("://") || url.starts_with("git@") {
        return false;
    }
    Path::new(url).exists()
}

/// Clone `url` into `dest`.
///
/// With `shallow`, remote clones fetch only the tip of the default branch.
pub fn clone(url: &str, dest: &Path, shallow: bool) -> Result<Repository> {
    let mut fetch = git2::FetchOptions::new();
    fetch.remote_callbacks(build_callbacks());
    if shallow && !is_local_url(url) {
        fetch.depth(1);
    }

    let mut builder = git2::build::RepoBuilder::new();
    builder.fetch_options(fetch);
    debug!(url, dest = %dest.display(), shallow, "cloning repository");
    let repo = builder.clone(url, dest)?;
    Ok(repo)
}

/// Open the working copy at `path`, mapping failures to `NotAGitRepository`.
pub fn open(path: &Path) -> Result<Repository> {
    Repository::open(path).map_err(|err| {
        debug!(path = %path.display(), error = %err, "cannot open repository");
        SkillsyncError::NotAGitRepository {
            path: path.to_path_buf(),
        }
    })
}

/// Commit id checked out at HEAD, if any.
#[must_use]
pub fn head_commit(repo: &Repository) -> Option<String> {
    repo.head()
        .ok()
        .and_then(|head| head.target())
        .map(|oid| oid.to_string())
}

/// Fetch `origin` and fast-forward the current branch of the working copy
/// at `path`. A diverged branch is reported as an error, never merged.
pub fn pull_fast_forward(path: &Path) -> Result<PullOutcome> {
    let repo = open(path)?;
    let before = head_commit(&repo);

    let mut remote = repo.find_remote("origin")?;
    let mut fetch = git2::FetchOptions::new();
    fetch.remote_callbacks(build_callbacks());
    remote.fetch(
        &["refs/heads/*:refs/remotes/origin/*"],
        Some(&mut fetch),
        None,
    )?;

    let branch = resolve_branch_name(&repo)?;
    let remote_ref_name = format!("refs/remotes/origin/{branch}");
    let remote_ref = repo.find_reference(&remote_ref_name).map_err(|_| {
        SkillsyncError::ValidationFailed(format!("remote branch not found: {branch}"))
    })?;
    let Some(target) = remote_ref.target() else {
        return Err(SkillsyncError::ValidationFailed(format!(
            "remote branch has no target: {branch}"
        )));
    };

    let annotated = repo.reference_to_annotated_commit(&remote_ref)?;
    let analysis = repo.merge_analysis(&[&annotated])?;
    if analysis.0.is_up_to_date() {
        return Ok(PullOutcome::UpToDate);
    }
    if !analysis.0.is_fast_forward() {
        return Err(SkillsyncError::ValidationFailed(format!(
            "non-fast-forward update required for branch {branch} in {}",
            path.display()
        )));
    }

    let dirty = modified_paths(&repo)?;
    if !dirty.is_empty() {
        return Err(SkillsyncError::ValidationFailed(format!(
            "local changes in {} would be overwritten: {}",
            path.display(),
            dirty.join(", ")
        )));
    }

    let local_ref = format!("refs/heads/{branch}");
    let mut reference = match repo.find_reference(&local_ref) {
        Ok(r) => r,
        Err(_) => repo.reference(&local_ref, target, true, "init branch")?,
    };
    reference.set_target(target, "fast-forward")?;
    repo.set_head(&local_ref)?;
    repo.checkout_head(Some(CheckoutBuilder::new().safe()))?;

    Ok(PullOutcome::FastForwarded {
        from: before,
        to: target.to_string(),
    })
}

/// Tracked paths whose working copy or index differs from HEAD.
fn modified_paths(repo: &Repository) -> Result<Vec<String>> {
    let mut opts = git2::StatusOptions::new();
    opts.include_untracked(false).include_ignored(false);
    let statuses = repo.statuses(Some(&mut opts))?;
    Ok(statuses
        .iter()
        .filter(|entry| entry.status() != git2::Status::CURRENT)
        .filter_map(|entry| entry.path().map(str::to_string))
        .collect())
}

fn resolve_branch_name(repo: &Repository) -> Result<String> {
    let head = repo.head()?;
    Ok(head.shorthand().unwrap_or("main").to_string())
}

fn build_callbacks() -> RemoteCallbacks<'static> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(|url, username_from_url, allowed| {
        if allowed.contains(CredentialType::SSH_KEY) {
            return Cred::ssh_key_from_agent(username_from_url.unwrap_or("git"));
        }
        if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
            if let Ok(config) = git2::Config::open_default() {
                return Cred::credential_helper(&config, url, username_from_url);
            }
        }
        Cred::default()
    });
    callbacks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::init_git_repo;
    use tempfile::TempDir;

    // =========================================================================
    // is_repo tests
    // =========================================================================

    #[test]
    fn is_repo_with_git_directory() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join(".git")).unwrap();

        assert!(is_repo(temp.path()));
    }

    #[test]
    fn is_repo_without_git_directory() {
        let temp = TempDir::new().unwrap();

        assert!(!is_repo(temp.path()));
    }

    #[test]
    fn is_repo_with_git_file_not_dir() {
        let temp = TempDir::new().unwrap();
        // worktrees carry a .git file
        std::fs::write(temp.path().join(".git"), "gitdir: ../other").unwrap();

        assert!(is_repo(temp.path()));
    }

    // =========================================================================
    // is_local_url tests
    // =========================================================================

    #[test]
    fn local_url_detection() {
        let temp = TempDir::new().unwrap();
        assert!(is_local_url("file:///tmp/repo"));
        assert!(is_local_url(&temp.path().display().to_string()));
        assert!(!is_local_url("https://github.com/o/r.git"));
        assert!(!is_local_url("git@github.com:o/r.git"));
    }

    // =========================================================================
    // clone / pull tests
    // =========================================================================

    #[test]
    fn clone_local_repository_records_head() {
        let temp = TempDir::new().unwrap();
        let origin = temp.path().join("origin");
        let commit = init_git_repo(&origin, &[("SKILL.md", "---\nname: x\n---\n")]);

        let dest = temp.path().join("clone");
        let repo = clone(&origin.display().to_string(), &dest, true).unwrap();

        assert_eq!(head_commit(&repo).as_deref(), Some(commit.as_str()));
        assert!(dest.join("SKILL.md").is_file());
    }

    #[test]
    fn pull_fast_forwards_to_new_commit() {
        let temp = TempDir::new().unwrap();
        let origin = temp.path().join("origin");
        init_git_repo(&origin, &[("SKILL.md", "v1")]);
        let dest = temp.path().join("clone");
        clone(&origin.display().to_string(), &dest, false).unwrap();

        let second = crate::test_utils::fixtures::commit_files(&origin, &[("SKILL.md", "v2")]);

        let outcome = pull_fast_forward(&dest).unwrap();
        assert!(matches!(outcome, PullOutcome::FastForwarded { ref to, .. } if *to == second));
        assert_eq!(std::fs::read_to_string(dest.join("SKILL.md")).unwrap(), "v2");

        assert_eq!(pull_fast_forward(&dest).unwrap(), PullOutcome::UpToDate);
    }

    #[test]
    fn pull_refuses_to_overwrite_local_edits() {
        let temp = TempDir::new().unwrap();
        let origin = temp.path().join("origin");
        init_git_repo(&origin, &[("SKILL.md", "v1"), ("notes.md", "n1")]);
        let dest = temp.path().join("clone");
        clone(&origin.display().to_string(), &dest, false).unwrap();
        std::fs::write(dest.join("SKILL.md"), "edited locally").unwrap();

        crate::test_utils::fixtures::commit_files(&origin, &[("SKILL.md", "v2")]);

        let err = pull_fast_forward(&dest).unwrap_err();
        match err {
            SkillsyncError::ValidationFailed(msg) => assert!(msg.contains("SKILL.md"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            std::fs::read_to_string(dest.join("SKILL.md")).unwrap(),
            "edited locally"
        );
    }

    #[test]
    fn pull_ignores_untracked_files() {
        let temp = TempDir::new().unwrap();
        let origin = temp.path().join("origin");
        init_git_repo(&origin, &[("SKILL.md", "v1")]);
        let dest = temp.path().join("clone");
        clone(&origin.display().to_string(), &dest, false).unwrap();
        std::fs::write(dest.join("scratch.md"), "mine").unwrap();

        crate::test_utils::fixtures::commit_files(&origin, &[("SKILL.md", "v2")]);

        assert!(matches!(
            pull_fast_forward(&dest).unwrap(),
            PullOutcome::FastForwarded { .. }
        ));
        assert!(dest.join("scratch.md").is_file());
    }

    #[test]
    fn pull_on_plain_directory_is_not_a_repository() {
        let temp = TempDir::new().unwrap();
        let err = pull_fast_forward(temp.path()).unwrap_err();
        assert!(matches!(err, SkillsyncError::NotAGitRepository { .. }));
    }
}
