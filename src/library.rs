//! Mod package discovery: scans the mods dir, turns each package's manifest
//! into a descriptor, and handles import/removal of package files.

use crate::manifest::{self, ModManifest, DEFAULT_ICON};
use anyhow::{bail, Context, Result};
use std::{
    fs::{self, File},
    io::Read,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;
use zip::{result::ZipError, ZipArchive};

pub const PACKAGE_EXTENSIONS: [&str; 2] = ["honmod", "zip"];

/// Identity and state of one installable package. Built from the package's
/// `mod.xml`; the enabled flag comes from the persisted config.
#[derive(Debug, Clone)]
pub struct ModDescriptor {
    pub id: String,
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: String,
    pub enabled: bool,
    pub icon: Option<Vec<u8>>,
    pub package_path: PathBuf,
}

/// Enumerates readable packages under `mods_dir` in file-name order.
/// Unreadable packages are logged and skipped.
pub fn scan_mods(mods_dir: &Path, enabled_ids: &[String]) -> Vec<ModDescriptor> {
    let mut mods = Vec::new();
    for entry in WalkDir::new(mods_dir).max_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("scan mods dir: {err}");
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_package_file(entry.path()) {
            continue;
        }
        match read_descriptor(entry.path()) {
            Ok(mut descriptor) => {
                descriptor.enabled = enabled_ids.iter().any(|id| *id == descriptor.id);
                mods.push(descriptor);
            }
            Err(err) => log::warn!("skipping {}: {err:#}", entry.path().display()),
        }
    }
    mods
}

pub fn is_package_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            PACKAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

pub fn read_descriptor(path: &Path) -> Result<ModDescriptor> {
    let file =
        File::open(path).with_context(|| format!("open package {}", path.display()))?;
    let mut package = ZipArchive::new(file).context("read package archive")?;

    let manifest_bytes = read_entry(&mut package, crate::package::MANIFEST_NAME)?
        .context("package has no mod.xml")?;
    let manifest = manifest::parse_manifest(&manifest_bytes).context("parse mod.xml")?;

    let name = display_name(&manifest, path);
    let icon = read_icon(&mut package, &manifest)?;

    Ok(ModDescriptor {
        id: manifest::mod_id(&name),
        name,
        version: manifest.version.unwrap_or_else(|| "1.0".to_string()),
        author: manifest.author.unwrap_or_else(|| "Unknown".to_string()),
        description: manifest
            .description
            .unwrap_or_else(|| "No description provided.".to_string()),
        enabled: false,
        icon,
        package_path: path.to_path_buf(),
    })
}

fn display_name(manifest: &ModManifest, path: &Path) -> String {
    manifest
        .name
        .clone()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "Unknown".to_string())
        })
}

fn read_icon(package: &mut ZipArchive<File>, manifest: &ModManifest) -> Result<Option<Vec<u8>>> {
    let declared = manifest.icon.as_deref().unwrap_or(DEFAULT_ICON);
    if let Some(bytes) = read_entry(package, declared)? {
        return Ok(Some(bytes));
    }
    if declared != DEFAULT_ICON {
        return read_entry(package, DEFAULT_ICON);
    }
    Ok(None)
}

fn read_entry(package: &mut ZipArchive<File>, name: &str) -> Result<Option<Vec<u8>>> {
    let mut entry = match package.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("open package entry {name}")),
    };
    let mut bytes = Vec::with_capacity(entry.size() as usize);
    entry
        .read_to_end(&mut bytes)
        .with_context(|| format!("read package entry {name}"))?;
    Ok(Some(bytes))
}

/// Copies a package file into the mods dir. The descriptor is picked up on
/// the next scan.
pub fn import_package(source: &Path, mods_dir: &Path) -> Result<PathBuf> {
    if !is_package_file(source) {
        bail!(
            "not a mod package (expected .honmod or .zip): {}",
            source.display()
        );
    }
    let file_name = source.file_name().context("package file name")?;
    let dest = mods_dir.join(file_name);
    fs::create_dir_all(mods_dir).context("create mods dir")?;
    fs::copy(source, &dest).with_context(|| format!("import {}", source.display()))?;
    Ok(dest)
}

pub fn remove_package(descriptor: &ModDescriptor) -> Result<()> {
    fs::remove_file(&descriptor.package_path)
        .with_context(|| format!("remove {}", descriptor.package_path.display()))
}
