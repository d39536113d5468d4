use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_LEVEL_ENV: &str = "DESKTOP_TODO_LOG_LEVEL";
const LOG_FILE_PREFIX: &str = "desktop-todo-";
const KEPT_LOG_FILES: usize = 10;

/// Keeps the background log writer alive. Dropping it flushes pending lines.
pub struct LoggingGuard {
    path: PathBuf,
    _writer: WorkerGuard,
}

impl LoggingGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn init_logging() -> anyhow::Result<LoggingGuard> {
    let log_dir = get_log_directory()?;
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log directory '{}'", log_dir.display()))?;
    prune_old_logs(&log_dir, KEPT_LOG_FILES);

    let log_file_path = get_log_file_path(&log_dir);
    let file = fs::File::create(&log_file_path)
        .with_context(|| format!("failed to create log file '{}'", log_file_path.display()))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(build_log_filter())
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    tracing::info!("Logging initialized. Log file: {}", log_file_path.display());

    Ok(LoggingGuard {
        path: log_file_path,
        _writer: guard,
    })
}

fn build_log_filter() -> EnvFilter {
    let level = std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|raw| normalize_log_level(raw.as_str()))
        .unwrap_or("warn");
    EnvFilter::new(format!("{level},desktop_todo={level}"))
}

fn normalize_log_level(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" | "warning" => Some("warn"),
        "error" => Some("error"),
        _ => None,
    }
}

pub fn get_log_directory() -> anyhow::Result<PathBuf> {
    let data_dir =
        dirs::data_local_dir().ok_or_else(|| anyhow!("failed to determine local data directory"))?;
    Ok(data_dir.join("desktop-todo").join("logs"))
}

pub fn get_log_file_path(log_dir: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    log_dir.join(format!("{LOG_FILE_PREFIX}{timestamp}.log"))
}

fn is_log_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX) && name.ends_with(".log"))
}

/// Deletes all but the `keep` most recent log files. Best effort.
fn prune_old_logs(log_dir: &Path, keep: usize) {
    let Ok(entries) = fs::read_dir(log_dir) else {
        return;
    };

    let mut logs = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| is_log_file(path))
        .collect::<Vec<_>>();

    // Timestamped names sort chronologically.
    logs.sort();
    let excess = logs.len().saturating_sub(keep);
    for stale in logs.into_iter().take(excess) {
        let _ = fs::remove_file(stale);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_get_log_directory() {
        let path = get_log_directory().expect("log directory should resolve");
        assert!(path.to_string_lossy().contains("desktop-todo"));
    }

    #[test]
    fn test_get_log_file_path() {
        let path = get_log_file_path(Path::new("/tmp/test-logs"));
        let path_str = path.to_string_lossy();
        assert!(path_str.contains("desktop-todo-"));
        assert!(path_str.ends_with(".log"));
    }

    #[test]
    fn test_normalize_log_level() {
        assert_eq!(normalize_log_level("TRACE"), Some("trace"));
        assert_eq!(normalize_log_level("warning"), Some("warn"));
        assert_eq!(normalize_log_level("nope"), None);
    }

    #[test]
    fn test_prune_old_logs_keeps_most_recent() {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        for day in 1..=5 {
            let name = format!("desktop-todo-2024-01-0{day}_00-00-00.log");
            fs::write(temp_dir.path().join(name), "").expect("write should succeed");
        }
        fs::write(temp_dir.path().join("unrelated.txt"), "").expect("write should succeed");

        prune_old_logs(temp_dir.path(), 2);

        let mut remaining = fs::read_dir(temp_dir.path())
            .expect("dir should be readable")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect::<Vec<_>>();
        remaining.sort();
        assert_eq!(
            remaining,
            vec![
                "desktop-todo-2024-01-04_00-00-00.log",
                "desktop-todo-2024-01-05_00-00-00.log",
                "unrelated.txt",
            ]
        );
    }
}
