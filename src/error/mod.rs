//! Error handling for skillsync.
//!
//! This module provides:
//! - [`SkillsyncError`]: The main error enum for all operations
//! - [`ErrorCode`]: Standardized error codes for machine parsing
//! - [`StructuredError`]: Rich error type with suggestions and context
//! - Suggestion helpers for context-aware error recovery hints

mod codes;
mod suggestions;

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use codes::ErrorCode;
pub use suggestions::{suggest_for_error, suggest_similar_names};

/// Main error type for skillsync operations.
#[derive(Error, Debug)]
pub enum SkillsyncError {
    #[error("Invalid source '{input}': {reason}")]
    InvalidSource { input: String, reason: String },

    #[error("Subdirectory '{subdir}' not found in {root}")]
    SubdirNotFound { subdir: String, root: String },

    #[error("Skill not found: {name}")]
    SkillNotFound { name: String, available: Vec<String> },

    #[error("Invalid skill name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Invalid segment '{segment}' in subgroup '{path}'")]
    InvalidSubgroupSegment { path: String, segment: String },

    #[error("Skill already exists at {}", .path.display())]
    AlreadyExists { path: PathBuf },

    #[error("Conflict at {}: {reason}", .path.display())]
    LinkConflict { path: PathBuf, reason: String },

    #[error("--name requires a source with exactly one skill (found {found})")]
    NameNotApplicable { found: usize },

    #[error("No install metadata for {}; cannot update", .path.display())]
    NoProvenanceForUpdate { path: PathBuf },

    #[error("Invalid filter pattern '{pattern}': {reason}")]
    InvalidFilterPattern { pattern: String, reason: String },

    #[error("Not a git repository: {}", .path.display())]
    NotAGitRepository { path: PathBuf },

    #[error("Flattened name '{flat_name}' is shared by: {}", .paths.join(", "))]
    FlatNameCollision { flat_name: String, paths: Vec<String> },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Some entries of a batch failed; each failure is already in the report.
    #[error("{failed} of {total} entries failed")]
    PartialFailure { failed: usize, total: usize },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Missing required config: {0}")]
    MissingConfig(String),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl SkillsyncError {
    /// Get the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidSource { .. } => ErrorCode::SourceInvalid,
            Self::SubdirNotFound { .. } => ErrorCode::SubdirNotFound,
            Self::SkillNotFound { .. } => ErrorCode::SkillNotFound,
            Self::InvalidName { .. } => ErrorCode::NameInvalid,
            Self::InvalidSubgroupSegment { .. } => ErrorCode::SubgroupSegmentInvalid,
            Self::AlreadyExists { .. } => ErrorCode::SkillAlreadyExists,
            Self::LinkConflict { .. } => ErrorCode::LinkConflict,
            Self::NameNotApplicable { .. } => ErrorCode::NameNotApplicable,
            Self::NoProvenanceForUpdate { .. } => ErrorCode::NoProvenance,
            Self::InvalidFilterPattern { .. } => ErrorCode::FilterPatternInvalid,
            Self::NotAGitRepository { .. } => ErrorCode::GitNotRepository,
            Self::FlatNameCollision { .. } => ErrorCode::FlatNameCollision,
            Self::ValidationFailed(_) | Self::PartialFailure { .. } => ErrorCode::ValidationFailed,
            Self::Config(_) => ErrorCode::ConfigInvalid,
            Self::MissingConfig(_) => ErrorCode::ConfigMissingRequired,
            Self::Git(_) => ErrorCode::GitError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) | Self::Yaml(_) => ErrorCode::SerializationError,
        }
    }

    /// Get context information for this error as JSON.
    #[must_use]
    pub fn context(&self) -> Option<Value> {
        match self {
            Self::InvalidSource { input, reason } => {
                Some(serde_json::json!({ "input": input, "reason": reason }))
            }
            Self::SubdirNotFound { subdir, root } => {
                Some(serde_json::json!({ "subdir": subdir, "root": root }))
            }
            Self::SkillNotFound { name, available } => {
                Some(serde_json::json!({ "name": name, "available": available }))
            }
            Self::AlreadyExists { path } | Self::NoProvenanceForUpdate { path } => {
                Some(serde_json::json!({ "path": path.display().to_string() }))
            }
            Self::LinkConflict { path, reason } => Some(serde_json::json!({
                "path": path.display().to_string(),
                "reason": reason,
            })),
            Self::InvalidFilterPattern { pattern, .. } => {
                Some(serde_json::json!({ "pattern": pattern }))
            }
            Self::FlatNameCollision { flat_name, paths } => {
                Some(serde_json::json!({ "flat_name": flat_name, "paths": paths }))
            }
            Self::MissingConfig(key) => Some(serde_json::json!({ "config_key": key })),
            _ => None,
        }
    }

    /// Whether the failure details were already emitted with a report.
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        matches!(self, Self::PartialFailure { .. })
    }

    /// Convert this error to a structured error.
    #[must_use]
    pub fn to_structured(&self) -> StructuredError {
        StructuredError::from_error(self)
    }
}

/// A structured error with machine-readable code, suggestion, and context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// The error code (e.g., "SUBDIR_NOT_FOUND")
    pub code: ErrorCode,

    /// The numeric error code (e.g., 102)
    pub numeric_code: u16,

    /// Human-readable error message
    pub message: String,

    /// Actionable suggestion for recovery
    pub suggestion: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,

    pub recoverable: bool,

    /// Error category (e.g., "source", "sync")
    pub category: String,
}

impl StructuredError {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            numeric_code: code.numeric(),
            suggestion: code.suggestion().to_string(),
            context: None,
            recoverable: code.is_recoverable(),
            category: code.category().to_string(),
            code,
            message: message.into(),
        }
    }

    /// Create a structured error from a [`SkillsyncError`].
    #[must_use]
    pub fn from_error(err: &SkillsyncError) -> Self {
        let code = err.code();
        let context = err.context();
        let suggestion = suggest_for_error(code, context.as_ref());

        Self {
            code,
            numeric_code: code.numeric(),
            message: err.to_string(),
            suggestion,
            context,
            recoverable: code.is_recoverable(),
            category: code.category().to_string(),
        }
    }

    /// Add context to this error, regenerating the suggestion.
    #[must_use]
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self.suggestion = suggest_for_error(self.code, self.context.as_ref());
        self
    }
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<&SkillsyncError> for StructuredError {
    fn from(err: &SkillsyncError) -> Self {
        Self::from_error(err)
    }
}

/// Result type alias using [`SkillsyncError`].
pub type Result<T> = std::result::Result<T, SkillsyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(
            SkillsyncError::InvalidSource {
                input: "???".into(),
                reason: "unrecognized".into()
            }
            .code(),
            ErrorCode::SourceInvalid
        );
        assert_eq!(
            SkillsyncError::Config("bad".into()).code(),
            ErrorCode::ConfigInvalid
        );
        assert_eq!(
            SkillsyncError::NameNotApplicable { found: 3 }.code(),
            ErrorCode::NameNotApplicable
        );
    }

    #[test]
    fn test_error_messages_name_the_offender() {
        let err = SkillsyncError::InvalidSubgroupSegment {
            path: "a/../b".into(),
            segment: "..".into(),
        };
        assert!(err.to_string().contains("'..'"));

        let err = SkillsyncError::FlatNameCollision {
            flat_name: "a__b".into(),
            paths: vec!["a/b".into(), "a__b".into()],
        };
        assert!(err.to_string().contains("a/b, a__b"));
    }

    #[test]
    fn test_error_context() {
        let err = SkillsyncError::SubdirNotFound {
            subdir: "pdf".into(),
            root: "repo".into(),
        };
        let ctx = err.context().unwrap();
        assert_eq!(ctx.get("subdir").unwrap(), "pdf");
    }

    #[test]
    fn test_structured_error_from_error() {
        let err = SkillsyncError::AlreadyExists {
            path: PathBuf::from("/skills/pdf"),
        };
        let structured = StructuredError::from_error(&err);

        assert_eq!(structured.code, ErrorCode::SkillAlreadyExists);
        assert_eq!(structured.numeric_code, 203);
        assert!(structured.message.contains("/skills/pdf"));
        assert!(structured.suggestion.contains("--force"));
        assert!(structured.recoverable);
        assert_eq!(structured.category, "install");
    }

    #[test]
    fn test_structured_error_serialization() {
        let err = StructuredError::new(ErrorCode::LinkConflict, "target exists");
        let json = serde_json::to_string(&err).unwrap();

        assert!(json.contains("LINK_CONFLICT"));
        assert!(json.contains("\"numeric_code\":401"));
        assert!(json.contains("\"category\":\"sync\""));
    }

    #[test]
    fn test_structured_error_display() {
        let err = StructuredError::new(ErrorCode::SubdirNotFound, "no pdf");
        let display = format!("{err}");
        assert!(display.contains("E102"));
        assert!(display.contains("no pdf"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SkillsyncError = io.into();
        assert_eq!(err.code(), ErrorCode::IoError);
    }
}
