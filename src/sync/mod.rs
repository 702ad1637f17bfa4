//! Mirroring the managed tree into per-tool target directories.

pub mod config;
pub mod engine;
pub mod filter;
pub mod flatten;
pub mod inventory;
pub mod manifest;
pub mod status;

pub use config::{SyncMode, TargetConfig};
pub use engine::{SkillFailure, SyncEngine, SyncOptions, SyncReport};
pub use filter::SkillFilter;
pub use flatten::{CoincidenceReport, NameCoincidence, check_name_collisions, flatten};
pub use inventory::{SourceSkill, scan};
pub use manifest::{MANIFEST_FILE, Manifest, ManifestEntry};
pub use status::{TargetState, TargetStatus, check_status};
