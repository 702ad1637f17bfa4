//! Install pipeline: source resolution, discovery, and materialization.
//!
//! ```text
//! raw source -> source::parse -> discover -> select -> installer::install
//! ```

pub mod discover;
pub mod gitignore;
pub mod installer;
pub mod meta;
pub mod source;

pub use discover::{Discovery, SkillInfo, discover};
pub use installer::{
    InstallAction, InstallOptions, InstallReport, TrackedRepoReport, UpdateOptions, install,
    install_tracked, update_from_provenance,
};
pub use meta::{InstallMethod, SkillMeta};
pub use source::{SourceDescriptor, SourceKind};
