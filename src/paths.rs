use std::path::{Path, PathBuf};

use anyhow::anyhow;

const DATA_DIR_ENV: &str = "DESKTOP_TODO_DATA_DIR";
const APP_DIR_NAME: &str = "desktop-todo";
const TASKS_FILE_NAME: &str = "todos.json";
const SETTINGS_FILE_NAME: &str = "settings.json";

/// Locations of the widget's per-user files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    data_dir: PathBuf,
}

impl AppPaths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// `DESKTOP_TODO_DATA_DIR` when set, otherwise the platform data directory.
    pub fn resolve() -> anyhow::Result<Self> {
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|value| !value.is_empty()) {
            return Ok(Self::new(dir));
        }

        let base = dirs::data_dir().ok_or_else(|| anyhow!("unable to determine data directory"))?;
        Ok(Self::new(base.join(APP_DIR_NAME)))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn tasks_file(&self) -> PathBuf {
        self.data_dir.join(TASKS_FILE_NAME)
    }

    pub fn settings_file(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE_NAME)
    }
}
