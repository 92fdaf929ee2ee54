use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Persisted user preferences. The enabled list is ordered: it is the exact
/// order mods are applied in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub game_root: Option<PathBuf>,
    #[serde(default)]
    pub enabled_mods: Vec<String>,
}

impl AppConfig {
    pub fn load_or_create() -> Result<Self> {
        let base_dir = base_data_dir()?;
        fs::create_dir_all(&base_dir).context("create app data dir")?;
        Self::load_or_create_at(&base_dir.join("config.json"))
    }

    pub fn load_or_create_at(path: &Path) -> Result<Self> {
        if path.exists() {
            let raw = fs::read_to_string(path).context("read config")?;
            let config = serde_json::from_str(&raw).context("parse config")?;
            return Ok(config);
        }
        let config = AppConfig::default();
        config.save_at(path)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let base_dir = base_data_dir()?;
        fs::create_dir_all(&base_dir).context("create app data dir")?;
        self.save_at(&base_dir.join("config.json"))
    }

    pub fn save_at(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self).context("serialize config")?;
        fs::write(path, raw).context("write config")?;
        Ok(())
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.enabled_mods.iter().any(|entry| entry == id)
    }

    /// Appends `id` to the application order. Already-enabled ids keep their
    /// position.
    pub fn enable(&mut self, id: &str) -> bool {
        if self.is_enabled(id) {
            return false;
        }
        self.enabled_mods.push(id.to_string());
        true
    }

    pub fn disable(&mut self, id: &str) -> bool {
        let before = self.enabled_mods.len();
        self.enabled_mods.retain(|entry| entry != id);
        self.enabled_mods.len() != before
    }
}

fn base_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join("jzmod"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enable_keeps_order_and_deduplicates() {
        let mut config = AppConfig::default();
        assert!(config.enable("a"));
        assert!(config.enable("b"));
        assert!(!config.enable("a"));
        assert_eq!(config.enabled_mods, vec!["a", "b"]);
    }

    #[test]
    fn disable_removes_only_matching_id() {
        let mut config = AppConfig::default();
        config.enable("a");
        config.enable("b");
        assert!(config.disable("a"));
        assert!(!config.disable("a"));
        assert_eq!(config.enabled_mods, vec!["b"]);
    }

    #[test]
    fn round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = AppConfig::load_or_create_at(&path).unwrap();
        config.game_root = Some(PathBuf::from("/games/hon"));
        config.enable("ui_tweaks");
        config.save_at(&path).unwrap();

        let loaded = AppConfig::load_or_create_at(&path).unwrap();
        assert_eq!(loaded.game_root.as_deref(), Some(Path::new("/games/hon")));
        assert_eq!(loaded.enabled_mods, vec!["ui_tweaks"]);
    }
}
