//! Source payload unpacking.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use tar::Archive;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Whether `data` starts with the gzip magic bytes.
pub fn is_gzip(data: &[u8]) -> bool {
    data.starts_with(&GZIP_MAGIC)
}

/// Place a fetched payload into `dest` and return the source root.
///
/// Gzip tarballs are extracted; when the archive holds a single top-level
/// directory, that directory is the source root. Any other payload is
/// written as `dest/<file_name>` and `dest` is the source root.
pub fn unpack_source(data: &[u8], dest: &Path, file_name: &str) -> Result<PathBuf> {
    if is_gzip(data) {
        extract_tarball(data, dest)?;
        return source_root(dest);
    }

    std::fs::create_dir_all(dest)
        .with_context(|| format!("failed to create directory: {}", dest.display()))?;
    let target = dest.join(file_name);
    std::fs::write(&target, data)
        .with_context(|| format!("failed to write source file: {}", target.display()))?;
    Ok(dest.to_path_buf())
}

/// Extract a `.tar.gz` into `dest`.
///
/// Entries that would land outside `dest` are rejected.
pub fn extract_tarball(data: &[u8], dest: &Path) -> Result<()> {
    let mut archive = Archive::new(GzDecoder::new(Cursor::new(data)));

    std::fs::create_dir_all(dest)
        .with_context(|| format!("failed to create destination directory: {}", dest.display()))?;

    for entry in archive
        .entries()
        .context("failed to read tarball entries")?
    {
        let mut entry = entry.context("failed to read tarball entry")?;
        let entry_path = entry
            .path()
            .context("failed to get entry path")?
            .into_owned();

        match entry.header().entry_type() {
            tar::EntryType::Regular
            | tar::EntryType::Continuous
            | tar::EntryType::Directory
            | tar::EntryType::Symlink
            | tar::EntryType::Link => {
                let unpacked = entry.unpack_in(dest).with_context(|| {
                    format!("failed to extract {}", entry_path.display())
                })?;
                if !unpacked {
                    bail!(
                        "tarball entry escapes destination directory: {}",
                        entry_path.display()
                    );
                }
            }
            other => {
                tracing::debug!(
                    "skipping unsupported entry type {:?}: {}",
                    other,
                    entry_path.display()
                );
            }
        }
    }

    Ok(())
}

/// The single top-level directory of `dir`, or `dir` itself.
fn source_root(dir: &Path) -> Result<PathBuf> {
    let mut children = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;

    if children.len() == 1 {
        let only = children.remove(0).path();
        if only.is_dir() {
            return Ok(only);
        }
    }
    Ok(dir.to_path_buf())
}
