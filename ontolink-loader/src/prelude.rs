//! Prelude module for `ontolink-loader`.
//!
//! Re-exports the parser façade, configuration types and the full
//! `ontolink-core` prelude for convenient import.

pub use crate::archive::ArchiveKind;
pub use crate::config::{ArchiveLimits, ArtifactProbing, ImportLimits, LoaderConfig};
pub use crate::import::{FsImportLoader, ImportLoader};
pub use crate::parser::Parser;
pub use crate::registry::{ArtifactFile, LoadedModule, ModuleRegistry, Section};
pub use ontolink_core::prelude::*;
