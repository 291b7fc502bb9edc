//! # ontolink-loader
//!
//! Parser, import resolver and archive I/O for the ontology description
//! language: turns a model document (types) or an ontology document
//! (instances) — plus everything it transitively imports — into a
//! populated [`ontolink_core`] entity graph, and turns that graph back
//! into canonical YAML for export.
//!
//! ## Pipeline
//!
//! 1. [`build`] parses one document's own YAML tree into entities with
//!    every cross-reference left unfulfilled (two-phase construction).
//! 2. [`import`] resolves the document's `imports` section to other
//!    documents, recursively, reusing already-loaded modules by path or
//!    original name and guarding against cycles and runaway depth.
//! 3. [`parser::Parser::finalize_references`] re-attempts every deferred
//!    reference across the whole loaded module graph until it stabilizes.
//! 4. [`represent`] turns a loaded module back into the same canonical
//!    YAML shape, and [`archive`] packages a module and its transitive
//!    imports into a single zip for distribution.
//!
//! [`parser::Parser`] is the façade tying these stages together; most
//! callers only need it and [`config::LoaderConfig`].

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Loader configuration: import depth, archive limits, artifact probing.
pub mod config;

/// The parser's module table and cross-module alias registries.
pub mod registry;

/// Shorthand normalization for the authored document forms.
pub mod shapes;

/// Two-phase construction and the deferred reference queue.
pub mod build;

/// Import graph resolution.
pub mod import;

/// Archive ingress/egress.
pub mod archive;

/// Canonical YAML representation (export).
pub mod represent;

/// The `Parser` façade tying the above together.
pub mod parser;

pub use config::{ArchiveLimits, ArtifactProbing, ImportLimits, LoaderConfig};
pub use import::{FsImportLoader, ImportLoader};
pub use parser::Parser;
pub use registry::{ArtifactFile, LoadedModule, ModuleRegistry, Section};

/// Convenience re-exports for downstream crates.
pub mod prelude;
