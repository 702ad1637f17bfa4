//! Copy-mode manifest.
//!
//! The manifest lives inside the target directory and records every copy
//! the reconciler owns, keyed by flat name, with a content fingerprint of
//! the source at the time of the last sync.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;
use walkdir::WalkDir;

use crate::error::{Result, SkillsyncError};
use crate::utils::fs::{GIT_DIR, slash_relative};

/// File name of the manifest inside a copy-mode target.
pub const MANIFEST_FILE: &str = ".skillsync-manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub fingerprint: String,
    pub last_synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub managed: BTreeMap<String, ManifestEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Manifest {
    #[must_use]
    pub fn path(target_dir: &Path) -> PathBuf {
        target_dir.join(MANIFEST_FILE)
    }

    #[must_use]
    pub fn exists(target_dir: &Path) -> bool {
        Self::path(target_dir).is_file()
    }

    /// Load the manifest for `target_dir`.
    ///
    /// Missing, unreadable, and corrupt manifests all load as empty.
    #[must_use]
    pub fn load(target_dir: &Path) -> Self {
        let path = Self::path(target_dir);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Self::default(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "unreadable manifest; treating as empty");
                return Self::default();
            }
        };
        let mut manifest: Self = serde_json::from_str(&contents).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "corrupt manifest; treating as empty");
            Self::default()
        });
        manifest.managed.retain(|name, _| {
            let keep = is_entry_name(name);
            if !keep {
                warn!(path = %path.display(), entry = %name, "ignoring manifest entry outside the target");
            }
            keep
        });
        manifest
    }

    pub fn save(&mut self, target_dir: &Path) -> Result<()> {
        let path = Self::path(target_dir);
        self.updated_at = Some(Utc::now());
        let rendered = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, rendered).map_err(|err| {
            SkillsyncError::Io(std::io::Error::new(
                err.kind(),
                format!("write manifest {}: {err}", path.display()),
            ))
        })?;
        Ok(())
    }

    /// Delete the manifest file. Returns whether one was present.
    pub fn remove(target_dir: &Path) -> Result<bool> {
        let path = Self::path(target_dir);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    #[must_use]
    pub fn get(&self, flat_name: &str) -> Option<&ManifestEntry> {
        self.managed.get(flat_name)
    }

    #[must_use]
    pub fn contains(&self, flat_name: &str) -> bool {
        self.managed.contains_key(flat_name)
    }

    pub fn record(&mut self, flat_name: &str, fingerprint: String) {
        self.managed.insert(
            flat_name.to_string(),
            ManifestEntry {
                fingerprint,
                last_synced_at: Utc::now(),
            },
        );
    }

    pub fn forget(&mut self, flat_name: &str) -> bool {
        self.managed.remove(flat_name).is_some()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.managed.is_empty()
    }
}

/// Whether `name` is a single plain entry directly inside a target directory.
#[must_use]
pub fn is_entry_name(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Content fingerprint of a skill directory.
///
/// SHA-256 over every file below `dir` in sorted relative-path order,
/// hashing `path \0 content \0` for each. `.git` is skipped; file links
/// contribute their target's content, directory links are not followed.
pub fn dir_fingerprint(dir: &Path) -> Result<String> {
    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && e.file_name() == GIT_DIR));
    for entry in walker {
        let entry = entry.map_err(|err| {
            SkillsyncError::Io(err.into_io_error().unwrap_or_else(|| {
                std::io::Error::other(format!("walk {}", dir.display()))
            }))
        })?;
        if !entry.path().is_file() {
            continue;
        }
        if let Some(rel) = slash_relative(dir, entry.path()) {
            files.push((rel, entry.into_path()));
        }
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Sha256::new();
    for (rel, path) in files {
        let content = std::fs::read(&path)?;
        hasher.update(rel.as_bytes());
        hasher.update([0u8]);
        hasher.update(&content);
        hasher.update([0u8]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::UnitTestFixture;

    // =========================================================================
    // load / save
    // =========================================================================

    #[test]
    fn missing_manifest_loads_empty() {
        let fixture = UnitTestFixture::new();
        assert!(Manifest::load(&fixture.data_path).is_empty());
        assert!(!Manifest::exists(&fixture.data_path));
    }

    #[test]
    fn save_then_load() {
        let fixture = UnitTestFixture::new();
        let mut manifest = Manifest::default();
        manifest.record("acme__formatter", "abc".to_string());
        manifest.save(&fixture.data_path).unwrap();

        let loaded = Manifest::load(&fixture.data_path);
        assert_eq!(loaded.get("acme__formatter").unwrap().fingerprint, "abc");
        assert!(loaded.updated_at.is_some());

        let raw = std::fs::read_to_string(Manifest::path(&fixture.data_path)).unwrap();
        assert!(raw.contains("lastSyncedAt"));
    }

    #[test]
    fn corrupt_manifest_is_not_fatal() {
        let fixture = UnitTestFixture::new();
        fixture.create_file(MANIFEST_FILE, "{ not json");
        assert!(Manifest::load(&fixture.data_path).is_empty());
    }

    #[test]
    fn load_drops_entries_that_escape_the_target() {
        let fixture = UnitTestFixture::new();
        let victim = fixture.path("victim");
        let entry = r#"{"fingerprint":"x","lastSyncedAt":"2024-01-01T00:00:00Z"}"#;
        let raw = format!(
            r#"{{"managed":{{"ok__skill":{entry},"{}":{entry},"..":{entry},"../up":{entry},".":{entry},"a/b":{entry}}}}}"#,
            victim.display()
        );
        fixture.create_file(&format!("t/{MANIFEST_FILE}"), &raw);

        let loaded = Manifest::load(&fixture.path("t"));
        let keys: Vec<&str> = loaded.managed.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["ok__skill"]);
    }

    #[test]
    fn entry_names_are_single_components() {
        assert!(is_entry_name("team__pdf"));
        assert!(is_entry_name(".curated__x"));
        assert!(!is_entry_name(""));
        assert!(!is_entry_name("."));
        assert!(!is_entry_name(".."));
        assert!(!is_entry_name("/abs"));
        assert!(!is_entry_name("a\\b"));
    }

    #[test]
    fn save_failure_is_io_error() {
        let fixture = UnitTestFixture::new();
        let err = Manifest::default().save(&fixture.path("missing/dir")).unwrap_err();
        assert!(matches!(err, SkillsyncError::Io(_)), "{err:?}");
    }

    #[test]
    fn remove_reports_presence() {
        let fixture = UnitTestFixture::new();
        assert!(!Manifest::remove(&fixture.data_path).unwrap());
        Manifest::default().save(&fixture.data_path).unwrap();
        assert!(Manifest::remove(&fixture.data_path).unwrap());
        assert!(!Manifest::exists(&fixture.data_path));
    }

    // =========================================================================
    // dir_fingerprint
    // =========================================================================

    #[test]
    fn fingerprint_tracks_content_and_paths() {
        let fixture = UnitTestFixture::new();
        fixture.create_skill("a");
        fixture.create_file("a/refs/notes.md", "one");
        let dir = fixture.path("a");

        let first = dir_fingerprint(&dir).unwrap();
        assert_eq!(first, dir_fingerprint(&dir).unwrap());
        assert_eq!(first.len(), 64);

        fixture.create_file("a/refs/notes.md", "two");
        let second = dir_fingerprint(&dir).unwrap();
        assert_ne!(first, second);

        std::fs::rename(dir.join("refs/notes.md"), dir.join("refs/other.md")).unwrap();
        assert_ne!(second, dir_fingerprint(&dir).unwrap());
    }

    #[test]
    fn fingerprint_ignores_git_dir() {
        let fixture = UnitTestFixture::new();
        fixture.create_skill("a");
        let before = dir_fingerprint(&fixture.path("a")).unwrap();
        fixture.create_file("a/.git/HEAD", "ref: refs/heads/main");
        assert_eq!(before, dir_fingerprint(&fixture.path("a")).unwrap());
    }
}
