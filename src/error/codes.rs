//! Standardized error codes for machine-parseable output.
//!
//! Error codes follow a numeric taxonomy:
//! - 1xx: Source errors
//! - 2xx: Install errors
//! - 3xx: Config errors
//! - 4xx: Sync errors
//! - 6xx: Storage errors
//! - 7xx: Git errors
//! - 8xx: Validation errors
//! - 9xx: Internal errors

use serde::{Deserialize, Serialize};

/// Standardized error codes for robot mode output.
///
/// Each variant maps to a numeric code (e.g., `SourceInvalid` -> E101).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================
    // Source errors (1xx)
    // ========================================
    /// E101: Source string could not be parsed or does not exist
    SourceInvalid,
    /// E102: Requested subdirectory has no literal or fuzzy match
    SubdirNotFound,
    /// E103: A named skill was not found among discovered skills
    SkillNotFound,

    // ========================================
    // Install errors (2xx)
    // ========================================
    /// E201: Skill name is not usable as a directory name
    NameInvalid,
    /// E202: Subgroup path contains an unusable segment
    SubgroupSegmentInvalid,
    /// E203: Destination already holds a skill
    SkillAlreadyExists,
    /// E204: Custom name given for a multi-skill source
    NameNotApplicable,
    /// E205: Installed skill has no provenance record to update from
    NoProvenance,

    // ========================================
    // Config errors (3xx)
    // ========================================
    /// E301: Config file has invalid syntax or values
    ConfigInvalid,
    /// E302: Required config value is missing
    ConfigMissingRequired,

    // ========================================
    // Sync errors (4xx)
    // ========================================
    /// E401: Target holds a link or directory that does not match the desired state
    LinkConflict,
    /// E402: Include/exclude pattern is not a valid glob
    FilterPatternInvalid,
    /// E403: Two skills flatten to the same on-disk name
    FlatNameCollision,

    // ========================================
    // Storage errors (6xx)
    // ========================================
    /// E601: Serialization/deserialization failed
    SerializationError,

    // ========================================
    // Git errors (7xx)
    // ========================================
    /// E701: Directory is not a git repository
    GitNotRepository,
    /// E702: General git error (clone, fetch, checkout)
    GitError,

    // ========================================
    // Validation errors (8xx)
    // ========================================
    /// E801: Validation rules failed
    ValidationFailed,

    // ========================================
    // Internal errors (9xx)
    // ========================================
    /// E901: IO operation failed
    IoError,
}

impl ErrorCode {
    /// Get the numeric error code (e.g., `SourceInvalid` -> 101).
    #[must_use]
    pub const fn numeric(&self) -> u16 {
        match self {
            Self::SourceInvalid => 101,
            Self::SubdirNotFound => 102,
            Self::SkillNotFound => 103,

            Self::NameInvalid => 201,
            Self::SubgroupSegmentInvalid => 202,
            Self::SkillAlreadyExists => 203,
            Self::NameNotApplicable => 204,
            Self::NoProvenance => 205,

            Self::ConfigInvalid => 301,
            Self::ConfigMissingRequired => 302,

            Self::LinkConflict => 401,
            Self::FilterPatternInvalid => 402,
            Self::FlatNameCollision => 403,

            Self::SerializationError => 601,

            Self::GitNotRepository => 701,
            Self::GitError => 702,

            Self::ValidationFailed => 801,

            Self::IoError => 901,
        }
    }

    /// Get the error code as a formatted string (e.g., "E101").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("E{}", self.numeric())
    }

    /// Get the default suggestion for this error code.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::SourceInvalid => "Use a local path, a git URL, or owner/repo[/path] shorthand",
            Self::SubdirNotFound => "Check the path inside the repository. Run `skillsync install <repo> --list` to see discovered skills",
            Self::SkillNotFound => "Run `skillsync install <source> --list` to see the skills the source provides",
            Self::NameInvalid => "Skill names may not start with '-' or contain path separators",
            Self::SubgroupSegmentInvalid => "Use a relative --into path without '.', '..' or empty segments",
            Self::SkillAlreadyExists => "Re-run with --force to overwrite or --update to reinstall from the recorded source",
            Self::NameNotApplicable => "--name only applies when the source provides exactly one skill",
            Self::NoProvenance => "The skill has no install metadata. Reinstall it with `skillsync install <source> --force`",
            Self::ConfigInvalid => "Check config.toml syntax and values",
            Self::ConfigMissingRequired => "Add the missing key to config.toml or set the matching SKILLSYNC_* variable",
            Self::LinkConflict => "Inspect the target path, then re-run with --force to replace it",
            Self::FilterPatternInvalid => "Fix the include/exclude glob for this target in config.toml",
            Self::FlatNameCollision => "Rename one of the skill directories so their flattened names differ",
            Self::SerializationError => "A metadata or manifest file is malformed. Remove it and re-run",
            Self::GitNotRepository => "The directory has no usable .git; reinstall it instead of updating",
            Self::GitError => "Check the repository URL, network access and credentials",
            Self::ValidationFailed => "Review the reported problems and adjust the command arguments",
            Self::IoError => "File operation failed. Check path exists and permissions are correct",
        }
    }

    /// Check if this error is potentially recoverable by the user.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::SerializationError)
    }

    /// Get the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self.numeric() / 100 {
            1 => "source",
            2 => "install",
            3 => "config",
            4 => "sync",
            6 => "storage",
            7 => "git",
            8 => "validation",
            9 => "internal",
            _ => "unknown",
        }
    }

    /// Iterate over all error codes.
    pub fn all() -> impl Iterator<Item = Self> {
        [
            Self::SourceInvalid,
            Self::SubdirNotFound,
            Self::SkillNotFound,
            Self::NameInvalid,
            Self::SubgroupSegmentInvalid,
            Self::SkillAlreadyExists,
            Self::NameNotApplicable,
            Self::NoProvenance,
            Self::ConfigInvalid,
            Self::ConfigMissingRequired,
            Self::LinkConflict,
            Self::FilterPatternInvalid,
            Self::FlatNameCollision,
            Self::SerializationError,
            Self::GitNotRepository,
            Self::GitError,
            Self::ValidationFailed,
            Self::IoError,
        ]
        .into_iter()
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code_string())
    }
}
