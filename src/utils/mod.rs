//! Shared helpers for filesystem and git plumbing.

pub mod fs;
pub mod git;
