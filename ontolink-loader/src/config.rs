//! Loader configuration: import recursion limits, archive ingestion
//! limits, and the artifact-probing policy, using a
//! nested-struct-with-`Default`-impl configuration shape rather than a
//! single flat struct.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How eagerly an artifact's byte source decides whether to open in text
/// or binary mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactProbing {
    /// Probe the first KiB when the artifact is discovered during import
    /// resolution.
    Eager,
    /// Defer the probe until `Parser::open_file_auto_mode` is called.
    Lazy,
}

impl Default for ArtifactProbing {
    fn default() -> Self {
        ArtifactProbing::Lazy
    }
}

/// Import-graph traversal limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportLimits {
    /// Maximum depth of transitive import resolution before the loader
    /// gives up and raises a `LoadError` (guards against pathological
    /// import graphs that are not true cycles but still unbounded, e.g. a
    /// generated chain of ten thousand single-import files).
    pub max_depth: usize,
}

impl Default for ImportLimits {
    fn default() -> Self {
        ImportLimits { max_depth: 256 }
    }
}

/// Archive ingress/egress limits, a zip/tar-bomb guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveLimits {
    /// Maximum number of entries an archive may contain.
    pub max_entries: usize,
    /// Maximum total uncompressed bytes an archive may expand to.
    pub max_total_bytes: u64,
}

impl Default for ArchiveLimits {
    fn default() -> Self {
        ArchiveLimits {
            max_entries: 10_000,
            max_total_bytes: 512 * 1024 * 1024,
        }
    }
}

/// Top-level loader configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Import graph traversal limits.
    pub imports: ImportLimits,
    /// Archive ingestion limits.
    pub archive: ArchiveLimits,
    /// Root directory under which archive extraction and export staging
    /// happen. `None` defers to `std::env::temp_dir()`.
    pub temp_dir: Option<PathBuf>,
    /// Artifact UTF-8 probing policy.
    pub artifact_probing: ArtifactProbing,
}

impl LoaderConfig {
    /// A configuration tuned for local development: lazy artifact probing
    /// and generous limits.
    #[must_use]
    pub fn development() -> Self {
        LoaderConfig::default()
    }

    /// A configuration tuned for untrusted input (e.g. a service ingesting
    /// archives uploaded by third parties): eager probing and tighter
    /// archive limits.
    #[must_use]
    pub fn production() -> Self {
        LoaderConfig {
            imports: ImportLimits { max_depth: 64 },
            archive: ArchiveLimits {
                max_entries: 2_000,
                max_total_bytes: 64 * 1024 * 1024,
            },
            temp_dir: None,
            artifact_probing: ArtifactProbing::Eager,
        }
    }

    /// The effective temp directory root: the configured one, or the
    /// process-wide default.
    #[must_use]
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_and_production_differ_on_limits() {
        let dev = LoaderConfig::development();
        let prod = LoaderConfig::production();
        assert!(dev.archive.max_entries > prod.archive.max_entries);
        assert_eq!(dev.artifact_probing, ArtifactProbing::Lazy);
        assert_eq!(prod.artifact_probing, ArtifactProbing::Eager);
    }

    #[test]
    fn default_temp_dir_falls_back_to_env() {
        let cfg = LoaderConfig::default();
        assert_eq!(cfg.temp_dir(), std::env::temp_dir());
    }
}
