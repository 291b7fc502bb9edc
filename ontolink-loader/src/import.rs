//! Import graph resolution: mapping each authored [`ImportDefinition`]
//! to a loaded module, reusing already-loaded modules, and walking the
//! transitive module graph without looping on cycles.
//!
//! Kept deliberately shallow: a visited-stack cycle guard and a cache keyed
//! by resolved path, nothing more. Unlike a resolver that flattens every
//! imported schema's classes and slots into one namespace, each imported
//! module here stays distinct — `resolved_imports` records the edge, never
//! merges the target module's entities into the importer.

use std::path::{Path, PathBuf};

use ontolink_core::error::ImportError;

/// A strategy for turning one authored import entry into a file on disk.
/// The parser tries each registered loader in order and raises a
/// [`LoadError`](ontolink_core::error::LoadError) aggregating every
/// loader's [`ImportError`] only if all of them fail.
pub trait ImportLoader: std::fmt::Debug {
    /// Resolve `file` (as authored, already known not to be a by-orig-name
    /// or by-absolute-path cache hit) to a path that must exist on disk.
    /// `importing_dir` is the directory of the module declaring the import.
    fn resolve(&self, file: &str, importing_dir: &Path) -> Result<PathBuf, ImportError>;
}

/// The default (and only built-in) import loader: resolves an
/// absolute `file` as-is, and a relative one against the importing module's
/// directory.
#[derive(Debug, Default)]
pub struct FsImportLoader;

impl ImportLoader for FsImportLoader {
    fn resolve(&self, file: &str, importing_dir: &Path) -> Result<PathBuf, ImportError> {
        let candidate = Path::new(file);
        let resolved = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            importing_dir.join(candidate)
        };
        if resolved.is_file() {
            Ok(resolved)
        } else {
            Err(ImportError::new(
                format!("import target does not exist: {}", resolved.display()),
                ontolink_core::Context::root().child("imports").child(file.to_string()),
            ))
        }
    }
}

/// Whether `file`, as authored, denotes an absolute path. Used to decide
/// whether a newly-loaded module's `orig_name` is set from the authored
/// string — a relative import string is never reused that way, since the
/// same string can mean different files depending on which document
/// imports it.
#[must_use]
pub fn is_absolute_import(file: &str) -> bool {
    Path::new(file).is_absolute()
}
