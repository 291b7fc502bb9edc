//! Archive ingress/egress: packaging a loaded module graph as a
//! single zip for export, and unpacking an inbound zip/tar/tar.gz/tar.bz2
//! archive before parsing begins.
//!
//! Kind detection is by magic bytes rather than file extension, since an
//! uploaded archive's name is not a trustworthy signal. Extraction enforces
//! [`ArchiveLimits`] entry-by-entry as it streams, guarding against
//! zip/tar bombs.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use ontolink_core::error::LoadError;
use ontolink_core::{Context, OntolinkError};

use crate::config::ArchiveLimits;

/// The archive container format, detected from its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarPlain,
    TarGz,
    TarBz2,
}

/// Inspects `bytes` (only the first few hundred are ever needed) and
/// returns the container format they denote, or `None` if none of the
/// supported magic signatures match.
#[must_use]
pub fn detect_archive_kind(bytes: &[u8]) -> Option<ArchiveKind> {
    if bytes.len() >= 2 && &bytes[0..2] == b"PK" {
        return Some(ArchiveKind::Zip);
    }
    if bytes.len() >= 2 && bytes[0] == 0x1F && bytes[1] == 0x8B {
        return Some(ArchiveKind::TarGz);
    }
    if bytes.len() >= 3 && &bytes[0..3] == b"BZh" {
        return Some(ArchiveKind::TarBz2);
    }
    if bytes.len() >= 262 && &bytes[257..262] == b"ustar" {
        return Some(ArchiveKind::TarPlain);
    }
    None
}

/// Reads enough of `path` to detect its archive kind.
pub fn detect_archive_kind_of_file(path: &Path) -> Result<Option<ArchiveKind>, OntolinkError> {
    let mut file = File::open(path)?;
    let mut header = vec![0u8; 512];
    let n = file.read(&mut header)?;
    header.truncate(n);
    Ok(detect_archive_kind(&header))
}

/// Extracts `path` into `dest_dir`, enforcing `limits` as a zip/tar-bomb
/// guard: extraction stops with a [`LoadError`] the moment either the entry
/// count or the cumulative uncompressed size would exceed its configured
/// maximum, before the offending entry is written to disk.
pub fn extract_archive(
    path: &Path,
    dest_dir: &Path,
    limits: &ArchiveLimits,
    ctx: &Context,
) -> Result<(), OntolinkError> {
    let kind = detect_archive_kind_of_file(path)?.ok_or_else(|| {
        OntolinkError::Load(LoadError::new(
            format!("unrecognized archive format: {}", path.display()),
            ctx.clone(),
        ))
    })?;
    std::fs::create_dir_all(dest_dir)?;
    debug!(archive = %path.display(), kind = ?kind, "extracting archive");
    match kind {
        ArchiveKind::Zip => extract_zip(path, dest_dir, limits, ctx),
        ArchiveKind::TarPlain => {
            let file = File::open(path)?;
            extract_tar(Box::new(BufReader::new(file)), dest_dir, limits, ctx)
        }
        ArchiveKind::TarGz => {
            let file = File::open(path)?;
            extract_tar(Box::new(flate2::read::GzDecoder::new(BufReader::new(file))), dest_dir, limits, ctx)
        }
        ArchiveKind::TarBz2 => {
            let file = File::open(path)?;
            extract_tar(Box::new(bzip2::read::BzDecoder::new(BufReader::new(file))), dest_dir, limits, ctx)
        }
    }
}

fn extract_zip(path: &Path, dest_dir: &Path, limits: &ArchiveLimits, ctx: &Context) -> Result<(), OntolinkError> {
    let file = File::open(path)?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|e| OntolinkError::Load(LoadError::new(format!("corrupt zip archive: {e}"), ctx.clone())))?;
    if archive.len() > limits.max_entries {
        return Err(OntolinkError::Load(LoadError::new(
            format!("archive has {} entries, exceeding the configured limit of {}", archive.len(), limits.max_entries),
            ctx.clone(),
        )));
    }
    let mut total_bytes: u64 = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| OntolinkError::Load(LoadError::new(format!("corrupt zip entry: {e}"), ctx.clone())))?;
        total_bytes += entry.size();
        if total_bytes > limits.max_total_bytes {
            return Err(OntolinkError::Load(LoadError::new(
                format!("archive expands past the configured limit of {} bytes", limits.max_total_bytes),
                ctx.clone(),
            )));
        }
        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = %entry.name(), "skipping zip entry with unsafe path");
            continue;
        };
        let out_path = dest_dir.join(relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out_file = File::create(&out_path)?;
        std::io::copy(&mut entry, &mut out_file)?;
    }
    Ok(())
}

fn extract_tar(
    reader: Box<dyn Read>,
    dest_dir: &Path,
    limits: &ArchiveLimits,
    ctx: &Context,
) -> Result<(), OntolinkError> {
    let mut archive = tar::Archive::new(reader);
    let mut entry_count = 0usize;
    let mut total_bytes: u64 = 0;
    for entry in archive
        .entries()
        .map_err(|e| OntolinkError::Load(LoadError::new(format!("corrupt tar archive: {e}"), ctx.clone())))?
    {
        let mut entry =
            entry.map_err(|e| OntolinkError::Load(LoadError::new(format!("corrupt tar entry: {e}"), ctx.clone())))?;
        entry_count += 1;
        if entry_count > limits.max_entries {
            return Err(OntolinkError::Load(LoadError::new(
                format!("archive has more than {} entries", limits.max_entries),
                ctx.clone(),
            )));
        }
        total_bytes += entry.header().size().unwrap_or(0);
        if total_bytes > limits.max_total_bytes {
            return Err(OntolinkError::Load(LoadError::new(
                format!("archive expands past the configured limit of {} bytes", limits.max_total_bytes),
                ctx.clone(),
            )));
        }
        entry
            .unpack_in(dest_dir)
            .map_err(|e| OntolinkError::Load(LoadError::new(format!("could not unpack tar entry: {e}"), ctx.clone())))?;
    }
    Ok(())
}

/// Enforces the "exactly one root YAML document" ingress rule: after
/// extraction, precisely one `.yml`/`.yaml` file must sit directly
/// inside `dir` (not nested in a subdirectory). Returns its path.
pub fn find_root_yaml(dir: &Path, ctx: &Context) -> Result<PathBuf, LoadError> {
    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| LoadError::new(format!("could not read extracted archive: {e}"), ctx.clone()))? {
        let entry = entry.map_err(|e| LoadError::new(format!("could not read directory entry: {e}"), ctx.clone()))?;
        let path = entry.path();
        if path.is_file() {
            if let Some(ext) = path.extension().and_then(std::ffi::OsStr::to_str) {
                if ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml") {
                    candidates.push(path);
                }
            }
        }
    }
    match candidates.len() {
        0 => Err(LoadError::new("archive contains no top-level YAML document", ctx.clone())),
        1 => Ok(candidates.into_iter().next().expect("checked len == 1")),
        _ => Err(LoadError::new(
            format!("archive must contain exactly one top-level YAML document, found {}", candidates.len()),
            ctx.clone(),
        )),
    }
}

/// Packages every file under `src_dir` into a new zip archive at `dest_zip`,
/// used by export once a module tree (and its rewritten import paths and
/// copied artifacts) has been staged on disk.
pub fn package_directory_as_zip(src_dir: &Path, dest_zip: &Path, ctx: &Context) -> Result<(), OntolinkError> {
    let file = File::create(dest_zip)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for entry in walkdir::WalkDir::new(src_dir).into_iter() {
        let entry = entry
            .map_err(|e| OntolinkError::Load(LoadError::new(format!("could not walk staging directory: {e}"), ctx.clone())))?;
        let path = entry.path();
        let relative = path
            .strip_prefix(src_dir)
            .expect("walkdir always yields descendants of src_dir");
        if relative.as_os_str().is_empty() {
            continue;
        }
        let name = relative.to_string_lossy().replace('\\', "/");
        if path.is_dir() {
            writer
                .add_directory(format!("{name}/"), options)
                .map_err(|e| OntolinkError::Load(LoadError::new(format!("could not write zip directory: {e}"), ctx.clone())))?;
        } else {
            writer
                .start_file(name, options)
                .map_err(|e| OntolinkError::Load(LoadError::new(format!("could not start zip entry: {e}"), ctx.clone())))?;
            let mut src = File::open(path)?;
            std::io::copy(&mut src, &mut writer)?;
        }
    }
    writer
        .finish()
        .map_err(|e| OntolinkError::Load(LoadError::new(format!("could not finalize zip archive: {e}"), ctx.clone())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zip_magic_bytes_detected() {
        assert_eq!(detect_archive_kind(b"PK\x03\x04rest"), Some(ArchiveKind::Zip));
    }

    #[test]
    fn gzip_magic_bytes_detected() {
        assert_eq!(detect_archive_kind(&[0x1F, 0x8B, 0x08]), Some(ArchiveKind::TarGz));
    }

    #[test]
    fn bzip2_magic_bytes_detected() {
        assert_eq!(detect_archive_kind(b"BZh91AY"), Some(ArchiveKind::TarBz2));
    }

    #[test]
    fn unrecognized_bytes_detect_as_none() {
        assert_eq!(detect_archive_kind(b"not an archive"), None);
    }

    #[test]
    fn single_root_yaml_is_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("root.mdl.yml"), "data_types: {}").unwrap();
        let found = find_root_yaml(dir.path(), &Context::root()).unwrap();
        assert_eq!(found.file_name().unwrap(), "root.mdl.yml");
    }

    #[test]
    fn zero_or_many_root_yaml_files_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_root_yaml(dir.path(), &Context::root()).is_err());
        std::fs::write(dir.path().join("a.yml"), "{}").unwrap();
        std::fs::write(dir.path().join("b.yml"), "{}").unwrap();
        assert!(find_root_yaml(dir.path(), &Context::root()).is_err());
    }
}
