use chrono::{DateTime, Utc};
use console::style;
use serde::Serialize;

use crate::error::{ErrorCode, Result, SkillsyncError, StructuredError};

#[derive(Serialize)]
pub struct RobotResponse<T> {
    pub status: RobotStatus,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub data: T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl<T> RobotResponse<T> {
    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotStatus {
    Ok,
    Error {
        /// Error code enum value (e.g., "SUBDIR_NOT_FOUND")
        code: ErrorCode,
        numeric_code: u16,
        message: String,
        suggestion: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        context: Option<serde_json::Value>,
        recoverable: bool,
        category: String,
    },
    /// Some entries succeeded and some failed.
    Partial { completed: usize, failed: usize },
}

impl From<StructuredError> for RobotStatus {
    fn from(err: StructuredError) -> Self {
        Self::Error {
            code: err.code,
            numeric_code: err.numeric_code,
            message: err.message,
            suggestion: err.suggestion,
            context: err.context,
            recoverable: err.recoverable,
            category: err.category,
        }
    }
}

impl From<&SkillsyncError> for RobotStatus {
    fn from(err: &SkillsyncError) -> Self {
        err.to_structured().into()
    }
}

fn response<T>(status: RobotStatus, data: T) -> RobotResponse<T> {
    RobotResponse {
        status,
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        data,
        warnings: Vec::new(),
    }
}

pub fn robot_ok<T: Serialize>(data: T) -> RobotResponse<T> {
    response(RobotStatus::Ok, data)
}

/// `Ok` when nothing failed, `Partial` otherwise.
pub fn robot_outcome<T: Serialize>(data: T, completed: usize, failed: usize) -> RobotResponse<T> {
    if failed == 0 {
        robot_ok(data)
    } else {
        response(RobotStatus::Partial { completed, failed }, data)
    }
}

/// Create a robot error response with code, suggestion, and context.
pub fn robot_error_structured(err: &SkillsyncError) -> RobotResponse<serde_json::Value> {
    response(err.into(), serde_json::Value::Null)
}

pub fn emit_robot<T: Serialize>(response: &RobotResponse<T>) -> Result<()> {
    emit_json(response)
}

pub fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value)?;
    println!("{payload}");
    Ok(())
}

pub struct HumanLayout {
    lines: Vec<String>,
    key_width: usize,
}

impl Default for HumanLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl HumanLayout {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lines: Vec::new(),
            key_width: 18,
        }
    }

    pub fn title(&mut self, text: &str) -> &mut Self {
        self.lines.push(style(text).bold().to_string());
        self.lines.push(String::new());
        self
    }

    pub fn section(&mut self, text: &str) -> &mut Self {
        self.lines.push(style(text).bold().to_string());
        self.lines.push("-".repeat(text.len().max(3)));
        self
    }

    pub fn kv(&mut self, key: &str, value: &str) -> &mut Self {
        let key_style = style(key).dim().to_string();
        self.lines.push(format!(
            "{key_style:width$} {value}",
            width = self.key_width
        ));
        self
    }

    pub fn bullet(&mut self, text: &str) -> &mut Self {
        self.lines.push(format!("- {text}"));
        self
    }

    /// Bullet with a colored status tag in front.
    pub fn status(&mut self, ok: bool, tag: &str, text: &str) -> &mut Self {
        let tag = if ok {
            style(tag).green().to_string()
        } else {
            style(tag).red().to_string()
        };
        self.lines.push(format!("- {tag} {text}"));
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.lines.push(String::new());
        self
    }

    pub fn push_line(&mut self, line: impl Into<String>) -> &mut Self {
        self.lines.push(line.into());
        self
    }

    #[must_use]
    pub fn build(self) -> String {
        self.lines.join("\n")
    }
}

pub fn emit_human(layout: HumanLayout) {
    println!("{}", layout.build());
}

/// Human rendering of an error, with its suggestion.
#[must_use]
pub fn render_error(err: &SkillsyncError) -> String {
    let structured = err.to_structured();
    format!(
        "{} [{}] {}\n  {} {}",
        style("error").red().bold(),
        structured.code.code_string(),
        structured.message,
        style("hint:").dim(),
        structured.suggestion
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn robot_error_structured_includes_all_fields() {
        let err = SkillsyncError::SubdirNotFound {
            subdir: "pdf".into(),
            root: "/tmp/repo".into(),
        };
        let response = robot_error_structured(&err);

        match response.status {
            RobotStatus::Error {
                code,
                message,
                suggestion,
                category,
                ..
            } => {
                assert_eq!(code, ErrorCode::SubdirNotFound);
                assert!(message.contains("pdf"));
                assert!(!suggestion.is_empty());
                assert_eq!(category, "source");
            }
            _ => panic!("Expected Error status"),
        }
    }

    #[test]
    fn robot_error_serialization() {
        let err = SkillsyncError::Config("bad config".into());
        let json = serde_json::to_string(&robot_error_structured(&err)).unwrap();
        assert!(json.contains("CONFIG_INVALID"));
        assert!(json.contains("\"category\":\"config\""));
        assert!(json.contains("\"suggestion\":"));
    }

    #[test]
    fn outcome_reports_partial_failures() {
        let json = serde_json::to_string(&robot_outcome(1, 2, 1)).unwrap();
        assert!(json.contains("\"partial\":{\"completed\":2,\"failed\":1}"));
        let json = serde_json::to_string(&robot_outcome(1, 2, 0)).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
    }

    #[test]
    fn layout_builds_lines() {
        let mut layout = HumanLayout::new();
        layout.title("Install").kv("Source", "acme/skills").bullet("one");
        let out = layout.build();
        assert!(out.contains("acme/skills"));
        assert!(out.contains("- one"));
    }
}
