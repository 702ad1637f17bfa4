//! Managed block inside the managed tree's `.gitignore`.
//!
//! Tracked repositories keep their own history, so their directories are
//! listed between marker lines to keep them out of the managed tree's
//! repository.

use std::path::Path;

use crate::error::Result;
use crate::utils::fs::read_optional;

pub const GITIGNORE_FILE: &str = ".gitignore";
const MARKER_START: &str = "# BEGIN SKILLSYNC MANAGED - DO NOT EDIT";
const MARKER_END: &str = "# END SKILLSYNC MANAGED";

/// Add `entry` (as a directory pattern) to the managed block of
/// `<dir>/.gitignore`, creating the file or block when missing.
///
/// Returns `false` when the entry was already present.
pub fn add_entry(dir: &Path, entry: &str) -> Result<bool> {
    let path = dir.join(GITIGNORE_FILE);
    let entry = directory_entry(entry);
    let mut lines: Vec<String> = read_optional(&path)?
        .map(|content| content.lines().map(str::to_string).collect())
        .unwrap_or_default();

    let (start, end) = ensure_block(&mut lines);
    if lines[start + 1..end].iter().any(|line| line.trim() == entry) {
        return Ok(false);
    }
    lines.insert(end, entry);
    write_lines(&path, &lines)?;
    Ok(true)
}

fn directory_entry(entry: &str) -> String {
    let entry = entry.replace('\\', "/");
    if entry.ends_with('/') {
        entry
    } else {
        format!("{entry}/")
    }
}

fn find_block(lines: &[String]) -> Option<(usize, usize)> {
    let start = lines.iter().position(|l| l.trim() == MARKER_START)?;
    let end = lines[start..].iter().position(|l| l.trim() == MARKER_END)? + start;
    Some((start, end))
}

fn ensure_block(lines: &mut Vec<String>) -> (usize, usize) {
    if let Some(block) = find_block(lines) {
        return block;
    }
    if lines.last().is_some_and(|l| !l.trim().is_empty()) {
        lines.push(String::new());
    }
    lines.push(MARKER_START.to_string());
    lines.push(MARKER_END.to_string());
    (lines.len() - 2, lines.len() - 1)
}

fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    let mut content = lines.join("\n");
    content.push('\n');
    std::fs::write(path, content)?;
    Ok(())
}
