//! Persistent user preferences.
//!
//! The dialog only needs string key/value pairs; storage is a small JSON object on disk.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Preference key holding the last historical data file used for a back test.
pub const DATA_FILE_KEY: &str = "backTester.dataFileName";

pub trait Preferences {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Default location: `<config dir>/backtest-dialog/preferences.json`.
pub fn default_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("no config dir")?;
    Ok(base.join("backtest-dialog").join("preferences.json"))
}

/// Preferences backed by a JSON file, rewritten on every `set`.
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FilePreferences {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            let data = std::fs::read(&path)
                .with_context(|| format!("read preferences {}", path.display()))?;
            serde_json::from_slice(&data)
                .with_context(|| format!("parse preferences {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Preferences for FilePreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("create preferences dir")?;
        }
        let data = serde_json::to_vec_pretty(&self.values)?;
        std::fs::write(&self.path, data)
            .with_context(|| format!("write preferences {}", self.path.display()))?;
        Ok(())
    }
}

/// In-memory preferences for tests.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemoryPreferences {
    values: BTreeMap<String, String>,
}

#[cfg(test)]
impl Preferences for MemoryPreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
