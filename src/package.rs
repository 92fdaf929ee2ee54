//! Processes one mod package against the shared working table: blanket
//! asset injection (reserved members excluded), then the manifest's edit
//! blocks in document order. All side effects stay in the table; a broken
//! package is reported and never stops the run.

use crate::{
    engine::WorkingTable,
    library::ModDescriptor,
    manifest::{self, EditBlock},
    patch,
};
use anyhow::{Context, Result};
use std::{fs::File, io::Read};
use zip::{result::ZipError, ZipArchive};

pub const MANIFEST_NAME: &str = "mod.xml";

/// Package members that are metadata for the manager, not game assets.
const RESERVED_NAMES: [&str; 5] = ["mod.xml", "icon.png", "icon.jpg", "changelog.txt", "thumbs.db"];

#[derive(Debug)]
pub struct PackageReport {
    pub mod_id: String,
    pub mod_name: String,
    pub assets_injected: usize,
    pub blocks: Vec<BlockReport>,
    pub skipped_targets: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct BlockReport {
    pub target: String,
    pub applied: usize,
    pub missed: usize,
}

impl PackageReport {
    fn new(descriptor: &ModDescriptor) -> Self {
        Self {
            mod_id: descriptor.id.clone(),
            mod_name: descriptor.name.clone(),
            assets_injected: 0,
            blocks: Vec::new(),
            skipped_targets: Vec::new(),
            error: None,
        }
    }

    pub fn missed_directives(&self) -> usize {
        self.blocks.iter().map(|block| block.missed).sum()
    }
}

pub fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES
        .iter()
        .any(|reserved| name.eq_ignore_ascii_case(reserved))
}

/// Runs one package. Internal failures (unreadable zip, malformed manifest)
/// land in the report's `error` field; the caller keeps going.
pub fn process_package(descriptor: &ModDescriptor, table: &mut WorkingTable) -> PackageReport {
    let mut report = PackageReport::new(descriptor);
    if let Err(err) = process_inner(descriptor, table, &mut report) {
        log::warn!("mod {}: {err:#}", descriptor.id);
        report.error = Some(format!("{err:#}"));
    }
    report
}

fn process_inner(
    descriptor: &ModDescriptor,
    table: &mut WorkingTable,
    report: &mut PackageReport,
) -> Result<()> {
    let file = File::open(&descriptor.package_path)
        .with_context(|| format!("open package {}", descriptor.package_path.display()))?;
    let mut package = ZipArchive::new(file).context("read package archive")?;

    inject_assets(&mut package, table, report)?;

    let manifest_bytes = match read_entry(&mut package, MANIFEST_NAME)? {
        Some(bytes) => bytes,
        None => return Ok(()),
    };
    let manifest = manifest::parse_manifest(&manifest_bytes).context("parse mod.xml")?;

    for block in &manifest.edits {
        apply_edit_block(descriptor, block, table, report);
    }
    Ok(())
}

fn inject_assets(
    package: &mut ZipArchive<File>,
    table: &mut WorkingTable,
    report: &mut PackageReport,
) -> Result<()> {
    for index in 0..package.len() {
        let mut entry = package.by_index(index).context("package entry")?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().replace('\\', "/");
        if is_reserved(&name) {
            continue;
        }
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut bytes)
            .with_context(|| format!("read package entry {name}"))?;
        log::debug!("inject asset {name}");
        table.insert(name, bytes);
        report.assets_injected += 1;
    }
    Ok(())
}

fn apply_edit_block(
    descriptor: &ModDescriptor,
    block: &EditBlock,
    table: &mut WorkingTable,
    report: &mut PackageReport,
) {
    match table.ensure(&block.target) {
        Ok(true) => {}
        Ok(false) => {
            log::warn!(
                "mod {}: target {} absent from base archive, block skipped",
                descriptor.id,
                block.target
            );
            report.skipped_targets.push(block.target.clone());
            return;
        }
        Err(err) => {
            log::warn!(
                "mod {}: failed to load target {}: {err}",
                descriptor.id,
                block.target
            );
            report.skipped_targets.push(block.target.clone());
            return;
        }
    }

    let Some(bytes) = table.get(&block.target) else {
        report.skipped_targets.push(block.target.clone());
        return;
    };
    let text = patch::decode_buffer(bytes);
    let result = patch::apply_block(&text, &block.directives);

    report.blocks.push(BlockReport {
        target: block.target.clone(),
        applied: result.applied(),
        missed: result.misses(),
    });
    table.insert(block.target.clone(), patch::encode_buffer(&result.text));
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
