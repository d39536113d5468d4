//! JSON file persistence for tasks and settings.
//!
//! Loads never fail: a missing, unreadable or malformed file yields the
//! default value. Saves report success as a `bool` and log the cause.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::settings::Settings;
use crate::types::Task;

/// Where a [`TaskList`](crate::model::TaskList) writes after each mutation.
pub trait TaskPersistence {
    fn load(&self) -> Vec<Task>;
    fn save(&self, tasks: &[Task]) -> bool;
}

#[derive(Debug, Clone)]
pub struct TaskStore {
    path: PathBuf,
}

impl TaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Vec<Task> {
        read_json(&self.path, "tasks").unwrap_or_default()
    }

    pub fn save(&self, tasks: &[Task]) -> bool {
        match write_json(&self.path, &tasks) {
            Ok(()) => {
                debug!(path = %self.path.display(), task_count = tasks.len(), "saved tasks");
                true
            }
            Err(error) => {
                warn!(
                    path = %self.path.display(),
                    error = %format!("{error:#}"),
                    "failed to save tasks"
                );
                false
            }
        }
    }
}

impl TaskPersistence for TaskStore {
    fn load(&self) -> Vec<Task> {
        TaskStore::load(self)
    }

    fn save(&self, tasks: &[Task]) -> bool {
        TaskStore::save(self, tasks)
    }
}

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Settings {
        match read_json::<Settings>(&self.path, "settings") {
            Some(settings) if settings.is_valid() => settings,
            Some(settings) => {
                warn!(
                    path = %self.path.display(),
                    ?settings,
                    "settings file holds out-of-range values; using defaults"
                );
                Settings::default()
            }
            None => Settings::default(),
        }
    }

    pub fn save(&self, settings: &Settings) -> bool {
        match write_json(&self.path, settings) {
            Ok(()) => {
                debug!(path = %self.path.display(), "saved settings");
                true
            }
            Err(error) => {
                warn!(
                    path = %self.path.display(),
                    error = %format!("{error:#}"),
                    "failed to save settings"
                );
                false
            }
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path, kind: &str) -> Option<T> {
    if !path.exists() {
        debug!(path = %path.display(), kind, "no persisted file; using defaults");
        return None;
    }

    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) => {
            warn!("failed to read {kind} file '{}': {}", path.display(), error);
            return None;
        }
    };

    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(error) => {
            warn!("failed to parse {kind} file '{}': {}", path.display(), error);
            None
        }
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create data directory '{}'", parent.display()))?;
    }

    let contents = serde_json::to_string_pretty(value).context("failed to serialize JSON")?;

    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("invalid file path '{}'", path.display()))?
        .to_string_lossy()
        .to_string();
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

    fs::write(&tmp_path, contents)
        .with_context(|| format!("failed to write temporary file '{}'", tmp_path.display()))?;
    if let Err(error) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(error).with_context(|| {
            format!(
                "failed to rename '{}' to '{}'",
                tmp_path.display(),
                path.display()
            )
        });
    }

    Ok(())
}
