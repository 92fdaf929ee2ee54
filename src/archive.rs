//! Random-access reads of the base archive and write-once production of the
//! derived archive. Writes only ever target a temporary path; the atomic
//! rename is the orchestrator's job.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{Read, Write},
    path::Path,
};
use thiserror::Error;
use zip::{result::ZipError, write::SimpleFileOptions, CompressionMethod, ZipArchive, ZipWriter};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Zip(#[from] ZipError),
}

pub struct BaseArchive {
    zip: ZipArchive<File>,
}

impl BaseArchive {
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let file = File::open(path)?;
        let zip = ZipArchive::new(file)?;
        Ok(Self { zip })
    }

    /// Reads one entry in full, or `None` when the archive has no entry at
    /// that exact (case-sensitive) path.
    pub fn read(&mut self, name: &str) -> Result<Option<Vec<u8>>, ArchiveError> {
        let mut entry = match self.zip.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        Ok(Some(bytes))
    }

    pub fn entry_names(&self) -> Vec<String> {
        self.zip.file_names().map(|name| name.to_string()).collect()
    }
}

/// Picks the compression method once per run: zstd when compiled in (the
/// game client reads it much faster), plain deflate otherwise.
pub fn select_compression() -> CompressionMethod {
    #[cfg(feature = "zstd")]
    {
        CompressionMethod::Zstd
    }
    #[cfg(not(feature = "zstd"))]
    {
        CompressionMethod::Deflated
    }
}

pub fn compression_label(method: CompressionMethod) -> &'static str {
    #[cfg(feature = "zstd")]
    if method == CompressionMethod::Zstd {
        return "zstd";
    }
    if method == CompressionMethod::Deflated {
        "deflate"
    } else {
        "other"
    }
}

/// Writes the full entry table to `path` and fsyncs it. The caller passes a
/// temporary path; the final location is never written directly.
pub fn write_archive(
    path: &Path,
    entries: &BTreeMap<String, Vec<u8>>,
    method: CompressionMethod,
) -> Result<(), ArchiveError> {
    let file = File::create(path)?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(method);

    for (name, bytes) in entries {
        writer.start_file(name.as_str(), options)?;
        writer.write_all(bytes)?;
    }

    let file = writer.finish()?;
    file.sync_all()?;
    Ok(())
}
