//! Orchestrates one application run: base archive → working file table,
//! overlaid and patched by each enabled mod in order → derived archive,
//! committed by delete-then-rename. Single-threaded and not reentrant; the
//! table is owned here for the duration of one run and discarded after.

use crate::{
    archive::{self, ArchiveError, BaseArchive},
    library::ModDescriptor,
    package::{self, PackageReport},
};
use std::{
    collections::BTreeMap,
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Fatal-to-run failures. Everything else (bad manifests, missed finds,
/// absent targets) is downgraded to a logged diagnostic in the report.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("base archive not found at {0}")]
    BaseMissing(PathBuf),
    #[error("read base archive {path}: {source}")]
    BaseOpen {
        path: PathBuf,
        source: ArchiveError,
    },
    #[error("write output archive {path}: {source}")]
    Write {
        path: PathBuf,
        source: ArchiveError,
    },
    #[error("commit output archive {path}: {source}")]
    Commit {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("remove stale output {path}: {source}")]
    Cleanup {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug)]
pub struct ApplyReport {
    pub applied: usize,
    pub mods: Vec<PackageReport>,
    pub message: String,
}

/// In-memory overlay of archive-relative paths to current content. Starts
/// empty; entries come from mod asset injection or are pulled from the base
/// archive the first time a patch needs them. Once a path is present it is
/// never re-read from the base, so every later mod sees the accumulated
/// state.
pub struct WorkingTable {
    files: BTreeMap<String, Vec<u8>>,
    base: BaseArchive,
}

impl WorkingTable {
    pub fn new(base: BaseArchive) -> Self {
        Self {
            files: BTreeMap::new(),
            base,
        }
    }

    pub fn insert(&mut self, path: String, bytes: Vec<u8>) {
        self.files.insert(path, bytes);
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Makes `path` present in the table if it exists anywhere, fetching it
    /// from the base archive on first sight. Returns whether it is present.
    pub fn ensure(&mut self, path: &str) -> Result<bool, ArchiveError> {
        if self.files.contains_key(path) {
            return Ok(true);
        }
        match self.base.read(path)? {
            Some(bytes) => {
                log::debug!("loaded {path} from base archive");
                self.files.insert(path.to_string(), bytes);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn entries(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.files
    }
}

/// Applies the ordered, already-enabled mod list against `base_archive` and
/// commits the merged result at `output_archive`. The caller's ordering is
/// authoritative. With an empty list any previous output is removed and the
/// run still succeeds.
pub fn apply_mods(
    base_archive: &Path,
    output_archive: &Path,
    mods: &[ModDescriptor],
) -> Result<ApplyReport, ApplyError> {
    if mods.is_empty() {
        if output_archive.exists() {
            fs::remove_file(output_archive).map_err(|source| ApplyError::Cleanup {
                path: output_archive.to_path_buf(),
                source,
            })?;
            log::info!("no mods enabled, removed {}", output_archive.display());
        }
        return Ok(ApplyReport {
            applied: 0,
            mods: Vec::new(),
            message: "All mods disabled; derived archive removed.".to_string(),
        });
    }

    if !base_archive.exists() {
        return Err(ApplyError::BaseMissing(base_archive.to_path_buf()));
    }
    let base = BaseArchive::open(base_archive).map_err(|source| ApplyError::BaseOpen {
        path: base_archive.to_path_buf(),
        source,
    })?;

    let compression = archive::select_compression();
    log::info!(
        "applying {} mod(s) with {} compression",
        mods.len(),
        archive::compression_label(compression)
    );

    let mut table = WorkingTable::new(base);
    let mut reports = Vec::with_capacity(mods.len());
    for descriptor in mods {
        log::info!("processing {}", descriptor.id);
        reports.push(package::process_package(descriptor, &mut table));
    }

    if let Some(parent) = output_archive.parent() {
        fs::create_dir_all(parent).map_err(|source| ApplyError::Write {
            path: output_archive.to_path_buf(),
            source: source.into(),
        })?;
    }

    let temp_path = temp_output_path(output_archive);
    if let Err(source) = archive::write_archive(&temp_path, table.entries(), compression) {
        let _ = fs::remove_file(&temp_path);
        return Err(ApplyError::Write {
            path: temp_path,
            source,
        });
    }

    // Sole commit point: readers only ever see the previous output or the
    // fully written new one.
    if output_archive.exists() {
        if let Err(source) = fs::remove_file(output_archive) {
            let _ = fs::remove_file(&temp_path);
            return Err(ApplyError::Commit {
                path: output_archive.to_path_buf(),
                source,
            });
        }
    }
    if let Err(source) = fs::rename(&temp_path, output_archive) {
        let _ = fs::remove_file(&temp_path);
        return Err(ApplyError::Commit {
            path: output_archive.to_path_buf(),
            source,
        });
    }

    Ok(ApplyReport {
        applied: mods.len(),
        mods: reports,
        message: format!(
            "Applied {} mod(s) to {}",
            mods.len(),
            output_archive.display()
        ),
    })
}

fn temp_output_path(output: &Path) -> PathBuf {
    let mut name = OsString::from(output.file_name().unwrap_or_default());
    name.push(".tmp");
    output.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_path_is_sibling_of_output() {
        let temp = temp_output_path(Path::new("/game/extensions/resources0.jz"));
        assert_eq!(temp, Path::new("/game/extensions/resources0.jz.tmp"));
    }
}
