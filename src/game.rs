//! Fixed path layout around a game root. The client loads
//! `extensions/resources0.jz` in place of the stock archive when launched
//! with the extensions mod path.

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const BASE_ARCHIVE_NAME: &str = "resources0.jz";
const RESOURCES_DIR: &str = "heroes of newerth";
const EXTENSIONS_DIR: &str = "extensions";
const MODS_DIR: &str = "mods";

#[derive(Debug, Clone)]
pub struct GamePaths {
    pub game_root: PathBuf,
    pub base_archive: PathBuf,
    pub extensions_dir: PathBuf,
    pub mods_dir: PathBuf,
    pub output_archive: PathBuf,
}

impl GamePaths {
    pub fn resolve(root: &Path) -> Self {
        let extensions_dir = root.join(EXTENSIONS_DIR);
        Self {
            game_root: root.to_path_buf(),
            base_archive: root.join(RESOURCES_DIR).join(BASE_ARCHIVE_NAME),
            mods_dir: extensions_dir.join(MODS_DIR),
            output_archive: extensions_dir.join(BASE_ARCHIVE_NAME),
            extensions_dir,
        }
    }

    pub fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.extensions_dir).context("create extensions dir")?;
        fs::create_dir_all(&self.mods_dir).context("create mods dir")?;
        Ok(())
    }
}
