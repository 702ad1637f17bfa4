//! Filesystem utilities.
//!
//! Directory copies, directory links, and path helpers shared by the
//! installer and the sync engine.

use std::path::{Component, Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::Result;

/// Version-control metadata directory, never copied or traversed.
pub const GIT_DIR: &str = ".git";

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Read a file to string, returning None if it doesn't exist.
pub fn read_optional(path: impl AsRef<Path>) -> Result<Option<String>> {
    let path = path.as_ref();
    if path.exists() {
        Ok(Some(std::fs::read_to_string(path)?))
    } else {
        Ok(None)
    }
}

/// Whether a file name is hidden (dot-prefixed).
#[must_use]
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Whether `path` itself is a symbolic link (not followed).
#[must_use]
pub fn is_symlink(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_symlink())
}

/// Whether anything (including a dangling link) exists at `path`.
#[must_use]
pub fn entry_exists(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}

/// Expand a leading `~` to the user's home directory.
#[must_use]
pub fn expand_tilde(raw: &str) -> PathBuf {
    if raw == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(raw));
    }
    if let Some(rest) = raw.strip_prefix("~/").or_else(|| raw.strip_prefix("~\\")) {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

/// Lexically normalize a path: drop `.` components and fold `..` where possible.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Relative path of `path` under `root`, joined with `/` on every platform.
#[must_use]
pub fn slash_relative(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Some(parts.join("/"))
}

/// Copy the directory tree at `src` into `dst`.
///
/// `.git` directories are skipped, as is every subtree rooted at a path in
/// `skip`. Directories are created as files land in them, so a directory
/// left empty by `skip` is not recreated. Symlinked files are copied by
/// content; symlinked directories are not descended into. Returns the
/// number of files copied.
pub fn copy_dir(src: &Path, dst: &Path, skip: &[PathBuf]) -> Result<usize> {
    ensure_dir(dst)?;
    let mut copied = 0usize;

    let walker = WalkDir::new(src)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            if entry.file_type().is_dir() && entry.file_name() == GIT_DIR {
                return false;
            }
            !skip.iter().any(|s| s == entry.path())
        });

    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.depth() == 0 {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            continue;
        }
        if file_type.is_file() {
            if let Some(parent) = target.parent() {
                ensure_dir(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
        } else if file_type.is_symlink() {
            if entry.path().is_file() {
                if let Some(parent) = target.parent() {
                    ensure_dir(parent)?;
                }
                std::fs::copy(entry.path(), &target)?;
                copied += 1;
            } else {
                debug!(path = %entry.path().display(), "skipping symlinked directory during copy");
            }
        }
    }
    Ok(copied)
}

/// Create a directory link at `link` pointing to `target`.
pub fn create_dir_link(target: &Path, link: &Path) -> Result<()> {
    if let Some(parent) = link.parent() {
        ensure_dir(parent)?;
    }
    #[cfg(unix)]
    std::os::unix::fs::symlink(target, link)?;
    #[cfg(windows)]
    std::os::windows::fs::symlink_dir(target, link)?;
    Ok(())
}

/// Remove whatever is at `path`: a link is unlinked (never followed),
/// a directory is removed recursively, a file is deleted.
pub fn remove_entry(path: &Path) -> Result<()> {
    let meta = std::fs::symlink_metadata(path)?;
    if meta.file_type().is_symlink() {
        #[cfg(windows)]
        {
            if std::fs::remove_dir(path).is_ok() {
                return Ok(());
            }
        }
        std::fs::remove_file(path)?;
    } else if meta.is_dir() {
        std::fs::remove_dir_all(path)?;
    } else {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

/// Target of the link at `link`, made absolute against the link's parent.
#[must_use]
pub fn read_link_absolute(link: &Path) -> Option<PathBuf> {
    let target = std::fs::read_link(link).ok()?;
    if target.is_absolute() {
        Some(target)
    } else {
        Some(link.parent().unwrap_or_else(|| Path::new("")).join(target))
    }
}

/// Whether two paths name the same location once canonicalized.
///
/// Falls back to lexical comparison when either path cannot be resolved.
#[must_use]
pub fn same_location(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => normalize_path(a) == normalize_path(b),
    }
}

/// Whether `path` resolves to `root` or somewhere beneath it.
#[must_use]
pub fn is_within(path: &Path, root: &Path) -> bool {
    let root = std::fs::canonicalize(root).unwrap_or_else(|_| normalize_path(root));
    match std::fs::canonicalize(path) {
        Ok(resolved) => resolved.starts_with(&root),
        // Dangling: resolve the nearest existing parent instead.
        Err(_) => {
            let lexical = normalize_path(path);
            let resolved = lexical
                .ancestors()
                .skip(1)
                .find_map(|ancestor| {
                    let base = std::fs::canonicalize(ancestor).ok()?;
                    let rest = lexical.strip_prefix(ancestor).ok()?;
                    Some(base.join(rest))
                })
                .unwrap_or_else(|| lexical.clone());
            resolved.starts_with(&root)
        }
    }
}

/// Whether a directory exists and contains no entries.
#[must_use]
pub fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path).is_ok_and(|mut entries| entries.next().is_none())
}

/// Move a directory, falling back to copy-and-delete across filesystems.
pub fn move_dir(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        ensure_dir(parent)?;
    }
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }
    copy_dir(src, dst, &[])?;
    std::fs::remove_dir_all(src)?;
    Ok(())
}
