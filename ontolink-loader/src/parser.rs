//! The `Parser` façade: the single entry point that ties the
//! module registry, two-phase builder, shorthand layer, import resolver,
//! archive I/O and representation layer together into `load_model`,
//! `load_ontology`, `finalize_references` and `build_archive`.

use std::path::{Path, PathBuf};

use tracing::{debug, error, instrument, warn};

use ontolink_core::error::{ErrorDetail, ImportError, LoadError};
use ontolink_core::prelude::*;
use ontolink_core::OntolinkError;

use crate::archive::{self, ArchiveKind};
use crate::build::{self, PendingRef};
use crate::config::{ArtifactProbing, LoaderConfig};
use crate::import::{FsImportLoader, ImportLoader};
use crate::registry::{ArtifactFile, ModuleRegistry};
use crate::represent;

/// The parser's accumulated state: every module reachable from whatever has
/// been loaded so far, the still-unresolved reference queue, and the
/// configuration governing import depth, archive limits and artifact
/// probing.
pub struct Parser {
    registry: ModuleRegistry,
    pending: Vec<PendingRef>,
    config: LoaderConfig,
    import_loaders: Vec<Box<dyn ImportLoader>>,
    root_context: Context,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new(LoaderConfig::default())
    }
}

impl Parser {
    #[must_use]
    pub fn new(config: LoaderConfig) -> Self {
        Parser {
            registry: ModuleRegistry::new(),
            pending: Vec::new(),
            config,
            import_loaders: vec![Box::new(FsImportLoader)],
            root_context: Context::root(),
        }
    }

    /// Registers an additional import resolution strategy, tried after the
    /// ones already registered.
    #[must_use]
    pub fn with_import_loader(mut self, loader: Box<dyn ImportLoader>) -> Self {
        self.import_loaders.push(loader);
        self
    }

    #[must_use]
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Loads a model document from `path` on disk, resolving its import
    /// graph transitively before returning. Returns the `ModuleId` of the
    /// root document.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn load_model_yaml_file(&mut self, path: &Path) -> Result<ModuleId, OntolinkError> {
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.load_model_at_path(&path, &self.root_context.clone(), 0)
    }

    /// Loads an ontology document from `path` on disk, resolving the model
    /// imports it depends on transitively.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn load_ontology_yaml_file(&mut self, path: &Path) -> Result<ModuleId, OntolinkError> {
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.load_ontology_at_path(&path, &self.root_context.clone(), 0)
    }

    /// Extracts `archive_path` under the configured temp directory, verifies
    /// the single-root-YAML rule, and loads the extracted model document.
    pub fn load_model_archive(&mut self, archive_path: &Path) -> Result<ModuleId, OntolinkError> {
        let dest = self.stage_archive(archive_path)?;
        let root_yaml = archive::find_root_yaml(&dest, &self.root_context.clone())?;
        self.load_model_yaml_file(&root_yaml)
    }

    /// Archive counterpart to [`Parser::load_ontology_yaml_file`].
    pub fn load_ontology_archive(&mut self, archive_path: &Path) -> Result<ModuleId, OntolinkError> {
        let dest = self.stage_archive(archive_path)?;
        let root_yaml = archive::find_root_yaml(&dest, &self.root_context.clone())?;
        self.load_ontology_yaml_file(&root_yaml)
    }

    fn stage_archive(&self, archive_path: &Path) -> Result<PathBuf, OntolinkError> {
        let dest = self.config.temp_dir().join(format!("ontolink-extract-{}", staging_token(archive_path)));
        archive::extract_archive(archive_path, &dest, &self.config.archive, &self.root_context)?;
        Ok(dest)
    }

    fn load_model_at_path(&mut self, path: &Path, ctx: &Context, depth: usize) -> Result<ModuleId, OntolinkError> {
        if let Some(existing) = self.registry.find_by_path(path) {
            return Ok(existing);
        }
        if depth > self.config.imports.max_depth {
            return Err(OntolinkError::Load(LoadError::new(
                format!("import depth exceeded {} while loading {}", self.config.imports.max_depth, path.display()),
                ctx.clone(),
            )));
        }
        debug!(path = %path.display(), depth, "loading model module");
        let text = std::fs::read_to_string(path)?;
        let doc: serde_yaml::Value = serde_yaml::from_str(&text)
            .map_err(|e| OntolinkError::yaml(e, ctx.clone()))?;
        let module = build::build_model(&doc, path, ctx)
            .map_err(OntolinkError::Load)?;
        let import_defs = module.model.imports.clone();
        let module_id = self.registry.insert_model(path.to_path_buf(), module);
        build::register_model_names(&mut self.registry, module_id);
        build::enqueue_model_pending(&self.registry, module_id, &mut self.pending);
        self.discover_artifacts(path, module_id)?;

        let importing_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        for import_def in import_defs {
            let import_ctx = ctx.child("imports").child(import_def.file.clone());
            let imported_id = self.resolve_model_import(&import_def, &importing_dir, &import_ctx, depth + 1)?;
            self.registry.model_mut(module_id).resolved_imports.push((import_def, imported_id));
        }
        Ok(module_id)
    }

    fn load_ontology_at_path(&mut self, path: &Path, ctx: &Context, depth: usize) -> Result<ModuleId, OntolinkError> {
        if let Some(existing) = self.registry.find_by_path(path) {
            return Ok(existing);
        }
        debug!(path = %path.display(), "loading ontology module");
        let text = std::fs::read_to_string(path)?;
        let doc: serde_yaml::Value = serde_yaml::from_str(&text)
            .map_err(|e| OntolinkError::yaml(e, ctx.clone()))?;
        let module = build::build_ontology(&doc, path, ctx)
            .map_err(OntolinkError::Load)?;
        let import_defs = module.ontology.imports.clone();
        let module_id = self.registry.insert_ontology(path.to_path_buf(), module);
        build::register_ontology_names(&mut self.registry, module_id);
        build::enqueue_ontology_pending(&self.registry, module_id, &mut self.pending);
        self.discover_artifacts(path, module_id)?;

        let importing_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        for import_def in import_defs {
            let import_ctx = ctx.child("imports").child(import_def.file.clone());
            let imported_id = self.resolve_model_import(&import_def, &importing_dir, &import_ctx, depth + 1)?;
            self.registry.ontology_mut(module_id).resolved_imports.push((import_def, imported_id));
        }
        Ok(module_id)
    }

    /// Resolves one authored import edge to a (possibly already-loaded)
    /// model module. An import is only matched against a module
    /// already known under the same `orig_name` when the authored string is
    /// itself absolute — a relative string can mean different files
    /// depending on which document imports it, so it is never reused that
    /// way.
    fn resolve_model_import(
        &mut self,
        import_def: &ImportDefinition,
        importing_dir: &Path,
        ctx: &Context,
        depth: usize,
    ) -> Result<ModuleId, OntolinkError> {
        if crate::import::is_absolute_import(&import_def.file) {
            if let Some(existing) = self.registry.find_by_orig_name(&import_def.file) {
                return Ok(existing);
            }
        }

        let mut errors = Vec::new();
        for loader in &self.import_loaders {
            match loader.resolve(&import_def.file, importing_dir) {
                Ok(resolved_path) => {
                    let resolved_path = resolved_path.canonicalize().unwrap_or(resolved_path);
                    if let Some(existing) = self.registry.find_by_path(&resolved_path) {
                        return Ok(existing);
                    }
                    let module_id = self.load_model_at_path(&resolved_path, ctx, depth)?;
                    if crate::import::is_absolute_import(&import_def.file) {
                        if let Some(m) = self.registry.module_mut(module_id).as_model_mut() {
                            m.orig_name = Some(import_def.file.clone());
                        }
                    }
                    return Ok(module_id);
                }
                Err(e) => errors.push(e),
            }
        }
        error!(file = %import_def.file, "every import loader failed to resolve");
        Err(OntolinkError::Load(LoadError::with_errors(
            format!("could not resolve import \"{}\"", import_def.file),
            ctx.clone(),
            errors
                .into_iter()
                .map(|e: ImportError| ErrorDetail { message: e.message, context: e.context })
                .collect(),
        )))
    }

    fn discover_artifacts(&mut self, module_source: &Path, module_id: ModuleId) -> Result<(), OntolinkError> {
        let Some(dir) = module_source.parent() else {
            return Ok(());
        };
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Ok(());
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || path == module_source {
                continue;
            }
            if matches!(path.extension().and_then(std::ffi::OsStr::to_str), Some("yml" | "yaml")) {
                continue;
            }
            let relative_path = path.strip_prefix(dir).unwrap_or(&path).to_path_buf();
            let is_text = match self.config.artifact_probing {
                ArtifactProbing::Eager => Some(probe_is_text(&path)?),
                ArtifactProbing::Lazy => None,
            };
            self.registry.artifacts_mut(module_id).push(ArtifactFile {
                relative_path,
                absolute_path: path,
                is_text,
            });
        }
        Ok(())
    }

    /// Opens an artifact's bytes, probing UTF-8-ness now if it was deferred
    /// at discovery time ([`ArtifactProbing::Lazy`]).
    pub fn open_file_auto_mode(&self, artifact: &ArtifactFile) -> Result<(Vec<u8>, bool), OntolinkError> {
        let bytes = std::fs::read(&artifact.absolute_path)?;
        let is_text = match artifact.is_text {
            Some(flag) => flag,
            None => std::str::from_utf8(&bytes[..bytes.len().min(1024)]).is_ok(),
        };
        Ok((bytes, is_text))
    }

    /// Re-attempts every still-pending reference until the queue stabilizes,
    /// then raises a single [`LoadError`]
    /// aggregating every reference that never resolved.
    pub fn finalize_references(&mut self) -> Result<(), OntolinkError> {
        loop {
            let mut made_progress = false;
            let registry = &mut self.registry;
            self.pending.retain(|pending_ref| {
                let resolved = pending_ref.try_resolve(registry);
                if resolved {
                    made_progress = true;
                }
                !resolved
            });
            if !made_progress || self.pending.is_empty() {
                break;
            }
        }
        if self.pending.is_empty() {
            return Ok(());
        }
        let errors: Vec<ErrorDetail> = self
            .pending
            .iter()
            .filter_map(|p| {
                p.describe(&self.registry).map(|(alias, context)| ErrorDetail {
                    message: format!("unknown reference: {} \"{alias}\"", p.target_section().label()),
                    context,
                })
            })
            .collect();
        warn!(count = errors.len(), "references remained unresolved after finalization");
        Err(OntolinkError::Load(LoadError::with_errors(
            "one or more references could not be resolved",
            self.root_context.clone(),
            errors,
        )))
    }

    /// Packages `root` and every module transitively reachable from it via
    /// `resolved_imports`, minus anything named in `skip_modules`, into a
    /// single zip archive at `dest_zip`. Each module is re-serialized
    /// through [`represent`], its `imports` rewritten to the relative path
    /// its own export subpath and its imported modules' subpaths imply, and
    /// its artifacts copied alongside it.
    ///
    /// `export_dir` lets a caller supply (and keep) the staging directory
    /// the canonical documents and artifacts are written to before zipping;
    /// when `None`, a scratch directory under the configured temp root is
    /// used instead and removed again once the zip has been written.
    ///
    /// # Errors
    /// Returns [`OntologyError`](ontolink_core::error::OntologyError) if
    /// `root` itself appears in `skip_modules` — a root cannot skip itself
    /// out of its own archive.
    pub fn build_archive(
        &self,
        root: ModuleId,
        skip_modules: &[ModuleId],
        export_dir: Option<&Path>,
        dest_zip: &Path,
    ) -> Result<(), OntolinkError> {
        if skip_modules.contains(&root) {
            return Err(OntolinkError::Ontology(ontolink_core::error::OntologyError::new(
                "build_archive root module cannot also appear in skip_modules",
                self.root_context.clone(),
            )));
        }

        let owns_staging = export_dir.is_none();
        let staging = export_dir.map(Path::to_path_buf).unwrap_or_else(|| {
            self.config.temp_dir().join(format!("ontolink-export-{}", staging_token(dest_zip)))
        });
        std::fs::create_dir_all(&staging)?;

        let closure: Vec<ModuleId> = self
            .transitive_closure(root)
            .into_iter()
            .filter(|id| !skip_modules.contains(id))
            .collect();
        let subpaths: std::collections::HashMap<ModuleId, PathBuf> = closure
            .iter()
            .map(|&id| (id, module_subpath(&self.registry, id, id == root)))
            .collect();

        for &module_id in &closure {
            let subpath = &subpaths[&module_id];
            let out_path = staging.join(subpath);
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let out_dir = out_path.parent().unwrap_or(&staging).to_path_buf();

            let yaml = match self.registry.module(module_id) {
                crate::registry::LoadedModule::Model(_) => represent::represent_model(&self.registry, module_id),
                crate::registry::LoadedModule::Ontology(_) => represent::represent_ontology(&self.registry, module_id)
                    .map_err(OntolinkError::Ontology)?,
            };
            let yaml = rewrite_import_paths(yaml, self.registry.module(module_id), &subpaths, subpath);
            let text = serde_yaml::to_string(&yaml).map_err(|e| OntolinkError::yaml(e, self.root_context.clone()))?;
            std::fs::write(&out_path, text)?;

            for artifact in self.registry.artifacts(module_id) {
                let dest = out_dir.join(&artifact.relative_path);
                if let Some(parent) = dest.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::copy(&artifact.absolute_path, &dest)?;
            }
        }

        archive::package_directory_as_zip(&staging, dest_zip, &self.root_context)?;
        if owns_staging {
            let _ = std::fs::remove_dir_all(&staging);
        }
        Ok(())
    }

    /// `root` plus every module reachable from it by following
    /// `resolved_imports` edges, visited at most once each (a cycle guard
    /// shared with import resolution and export).
    fn transitive_closure(&self, root: ModuleId) -> Vec<ModuleId> {
        let mut seen = std::collections::HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            order.push(id);
            for (_, imported) in self.registry.module(id).resolved_imports() {
                stack.push(*imported);
            }
        }
        order
    }
}

fn staging_token(path: &Path) -> String {
    path.file_name().and_then(std::ffi::OsStr::to_str).unwrap_or("archive").replace(['.', '/'], "-")
}

fn probe_is_text(path: &Path) -> Result<bool, OntolinkError> {
    let bytes = std::fs::read(path)?;
    Ok(std::str::from_utf8(&bytes[..bytes.len().min(1024)]).is_ok())
}

/// Default module export subpath generator: the root document always
/// exports to a fixed top-level name so a re-ingested archive satisfies the
/// single-root-YAML rule; every transitively imported module nests under
/// `imports/`, with a dotted module name becoming a nested path there
/// (`a.b.c` -> `imports/a/b/c.mdl.yml`) so two distinctly-named imports
/// never collide.
fn module_subpath(registry: &ModuleRegistry, module: ModuleId, is_root: bool) -> PathBuf {
    let loaded = registry.module(module);
    let extension = match loaded {
        crate::registry::LoadedModule::Model(_) => "mdl.yml",
        crate::registry::LoadedModule::Ontology(_) => "ont.yml",
    };
    if is_root {
        return PathBuf::from(format!("root.{extension}"));
    }
    let name = loaded.name();
    let mut path = PathBuf::from("imports");
    let mut parts: Vec<&str> = name.split('.').collect();
    let last = parts.pop().unwrap_or(name);
    for part in parts {
        path.push(part);
    }
    path.push(format!("{last}.{extension}"));
    path
}

/// Rewrites the `imports` section of an already-built canonical document to
/// point at each imported module's export subpath, expressed relative to
/// `own_subpath`'s directory.
fn rewrite_import_paths(
    mut yaml: serde_yaml::Value,
    module: &crate::registry::LoadedModule,
    subpaths: &std::collections::HashMap<ModuleId, PathBuf>,
    own_subpath: &Path,
) -> serde_yaml::Value {
    let resolved = module.resolved_imports();
    if resolved.is_empty() {
        return yaml;
    }
    let own_dir = own_subpath.parent().unwrap_or_else(|| Path::new(""));
    if let serde_yaml::Value::Mapping(ref mut map) = yaml {
        if let Some(serde_yaml::Value::Sequence(ref mut seq)) = map.get_mut(serde_yaml::Value::String("imports".to_string())) {
            for (entry, (_, imported_module)) in seq.iter_mut().zip(resolved.iter()) {
                let Some(target_subpath) = subpaths.get(imported_module) else {
                    continue;
                };
                let relative = pathdiff(target_subpath, own_dir);
                match entry {
                    serde_yaml::Value::String(s) => *s = relative,
                    serde_yaml::Value::Mapping(m) => {
                        if let Some((_, v)) = m.iter_mut().next() {
                            *v = serde_yaml::Value::String(relative);
                        }
                    }
                    _ => {}
                }
            }
        }
    }
    yaml
}

fn pathdiff(target: &Path, from_dir: &Path) -> String {
    let target_components: Vec<_> = target.components().collect();
    let from_components: Vec<_> = from_dir.components().collect();
    let common = target_components.iter().zip(from_components.iter()).take_while(|(a, b)| a == b).count();
    let mut rel = PathBuf::new();
    for _ in common..from_components.len() {
        rel.push("..");
    }
    for part in &target_components[common..] {
        rel.push(part.as_os_str());
    }
    rel.to_string_lossy().replace('\\', "/")
}

/// Detects whether `bytes` denote a supported archive format, exposed for
/// callers deciding between [`Parser::load_model_yaml_file`] and
/// [`Parser::load_model_archive`] without inspecting a file extension.
#[must_use]
pub fn sniff_archive_kind(bytes: &[u8]) -> Option<ArchiveKind> {
    archive::detect_archive_kind(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_single_model_file_with_no_imports() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "normative-types.mdl.yml", "data_types:\n  Text:\n    label: Plain text\n");
        let mut parser = Parser::default();
        let id = parser.load_model_yaml_file(&path).unwrap();
        assert_eq!(parser.registry().model(id).model.name, "normative-types");
        parser.finalize_references().unwrap();
    }

    #[test]
    fn loads_model_importing_model() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "base.mdl.yml", "data_types:\n  Text:\n    label: t\n");
        let root = write(
            dir.path(),
            "root.mdl.yml",
            "imports:\n  - base.mdl.yml\nvertex_types:\n  Person:\n    properties:\n      name:\n        type: Text\n",
        );
        let mut parser = Parser::default();
        let id = parser.load_model_yaml_file(&root).unwrap();
        assert_eq!(parser.registry().model_count(), 2);
        parser.finalize_references().unwrap();
        let person_id = parser.registry().model(id).model.vertex_types.get_by_name("Person").unwrap();
        let person = parser.registry().model(id).model.vertex_types.get(person_id);
        let (_, prop_id, _) = person.slots.properties.iter().next().unwrap();
        assert!(person.slots.properties.get(prop_id).r#type.fulfilled());
    }

    #[test]
    fn loads_ontology_importing_model() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "model.mdl.yml",
            "data_types:\n  Text:\n    label: t\nvertex_types:\n  Person:\n    properties:\n      name:\n        type: Text\n",
        );
        let ont_path = write(
            dir.path(),
            "data.ont.yml",
            "imports:\n  - model.mdl.yml\nvertices:\n  alice:\n    type: Person\n    properties:\n      name: Alice\n",
        );
        let mut parser = Parser::default();
        let ont_id = parser.load_ontology_yaml_file(&ont_path).unwrap();
        parser.finalize_references().unwrap();
        let alice_id = parser.registry().ontology(ont_id).ontology.vertices.get_by_name("alice").unwrap();
        assert!(parser.registry().ontology(ont_id).ontology.vertices.get(alice_id).r#type.fulfilled());
    }

    #[test]
    fn cyclic_import_pair_does_not_infinite_loop() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.mdl.yml", "imports:\n  - b.mdl.yml\ndata_types:\n  A:\n    label: a\n");
        let b_path = write(dir.path(), "b.mdl.yml", "imports:\n  - a.mdl.yml\ndata_types:\n  B:\n    label: b\n");
        let mut parser = Parser::default();
        let id = parser.load_model_yaml_file(&b_path).unwrap();
        assert_eq!(parser.registry().model_count(), 2);
        parser.finalize_references().unwrap();
        assert!(parser.registry().model(id).model.data_types.get_by_name("B").is_some());
    }

    #[test]
    fn build_archive_round_trips_a_single_module() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "normative-types.mdl.yml", "data_types:\n  Text:\n    label: t\n");
        let mut parser = Parser::default();
        let id = parser.load_model_yaml_file(&path).unwrap();
        parser.finalize_references().unwrap();
        let out_zip = dir.path().join("out.zip");
        parser.build_archive(id, &[], None, &out_zip).unwrap();
        assert!(out_zip.is_file());
    }
}
