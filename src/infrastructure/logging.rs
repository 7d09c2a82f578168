//! Logging system configuration and initialization
//!
//! - Console and file output (file through a non-blocking appender)
//! - Config based level with quiet defaults for noisy dependencies
//! - Optional JSON format for the file layer
//! - Previous log file rotated on startup, old rotations cleaned up

#![allow(clippy::uninlined_format_args)]

use anyhow::{Result, anyhow};
use chrono::Local;
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

// Keeps the file writer alive for the whole process
static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Local wall-clock timestamps with millisecond precision
struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f %:z"))
    }
}

/// `logs/` next to the executable
pub fn get_log_directory() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    exe_dir.join("logs")
}

/// Initialize the logging system with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(&LoggingConfig::default())
}

/// Build the filter: `RUST_LOG` wins, otherwise the configured level with
/// dependency noise suppressed unless TRACE was asked for.
fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let mut filter = EnvFilter::new(&config.level);
    if !config.level.to_lowercase().contains("trace") {
        for directive in [
            "sqlx::query=warn",
            "sqlx::sqlite=warn",
            "reqwest=info",
            "hyper=warn",
            "hyper_util=warn",
            "h2=warn",
            "tower_http=info",
            "chromiumoxide=warn",
            "tungstenite=warn",
        ] {
            match directive.parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(e) => eprintln!("invalid log directive {}: {}", directive, e),
            }
        }
    }
    filter
}

/// Initialize logging with custom configuration
///
/// ```bash
/// # Show SQL queries too
/// RUST_LOG="debug,sqlx::query=debug" clothing-crawler scrape --site nike
/// ```
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    let env_filter = build_env_filter(config);
    let registry = Registry::default().with(env_filter);

    let console_layer = config.console_output.then(|| {
        fmt::Layer::new()
            .with_writer(std::io::stdout)
            .with_timer(LocalTimeFormatter)
            .with_target(false)
    });

    let log_dir = config.log_dir.clone().unwrap_or_else(get_log_directory);

    match (config.file_output, config.console_output) {
        (false, false) => return Err(anyhow!("No logging output configured")),
        (false, true) => {
            registry.with(console_layer).try_init()?;
        }
        (true, _) => {
            std::fs::create_dir_all(&log_dir)
                .map_err(|e| anyhow!("Failed to create log directory {:?}: {}", log_dir, e))?;
            rotate_existing_log_file(&log_dir, &config.file_name)?;
            if config.auto_cleanup_logs {
                cleanup_old_logs(&log_dir, &config.file_name, config.max_log_files)?;
            }

            let file_appender = rolling::never(&log_dir, &config.file_name);
            let (file_writer, guard) = non_blocking(file_appender);
            if LOG_GUARD.set(guard).is_err() {
                warn!("Logging guard already installed");
            }

            if config.json_format {
                let file_layer = fmt::Layer::new()
                    .json()
                    .with_writer(file_writer)
                    .with_timer(LocalTimeFormatter)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_ansi(false);
                registry.with(console_layer).with(file_layer).try_init()?;
            } else {
                // time + level + message only
                let file_layer = fmt::Layer::new()
                    .with_writer(file_writer)
                    .with_timer(LocalTimeFormatter)
                    .with_target(false)
                    .with_ansi(false);
                registry.with(console_layer).with(file_layer).try_init()?;
            }
        }
    }

    info!("Logging system initialized");
    info!("Log level: {}", config.level);
    if config.file_output {
        info!("Log file: {:?}", log_dir.join(&config.file_name));
    }
    if !config.level.to_lowercase().contains("trace") {
        info!("SQL and verbose dependency logs suppressed (use TRACE level to see all logs)");
    }

    Ok(())
}

/// Rename the previous run's log file with its modification timestamp
fn rotate_existing_log_file(log_dir: &Path, log_file_name: &str) -> Result<()> {
    let log_file_path = log_dir.join(log_file_name);
    if !log_file_path.exists() {
        return Ok(());
    }

    let metadata = std::fs::metadata(&log_file_path)
        .map_err(|e| anyhow!("Failed to get log file metadata: {}", e))?;
    let file_time = metadata.modified().unwrap_or_else(|_| std::time::SystemTime::now());
    let stamp: chrono::DateTime<Local> = file_time.into();

    let file_stem = log_file_name.trim_end_matches(".log");
    let rotated_name = format!("{}.{}.log", file_stem, stamp.format("%Y%m%dT%H%M%S"));
    std::fs::rename(&log_file_path, log_dir.join(&rotated_name)).map_err(|e| {
        anyhow!("Failed to rotate log file {}: {}", log_file_path.display(), e)
    })?;

    Ok(())
}

/// Keep only the newest `max_files` rotated logs of this application
fn cleanup_old_logs(log_dir: &Path, log_file_name: &str, max_files: usize) -> Result<()> {
    let file_stem = log_file_name.trim_end_matches(".log");
    let mut rotated = Vec::new();

    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name != log_file_name && name.starts_with(file_stem) && name.ends_with(".log") {
            if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
                rotated.push((path, modified));
            }
        }
    }

    // newest first
    rotated.sort_by(|a, b| b.1.cmp(&a.1));
    for (path, _) in rotated.into_iter().skip(max_files) {
        if let Err(e) = std::fs::remove_file(&path) {
            eprintln!("Failed to remove old log file {:?}: {}", path, e);
        }
    }

    Ok(())
}

/// Log system information for diagnostics
pub fn log_system_info() {
    info!("=== Clothing Crawler System Information ===");
    info!("Application version: {}", env!("CARGO_PKG_VERSION"));
    info!("Operating system: {}", std::env::consts::OS);
    info!("Architecture: {}", std::env::consts::ARCH);
    if let Ok(current_dir) = std::env::current_dir() {
        info!("Working directory: {:?}", current_dir);
    }
    info!("===========================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert!(!config.level.is_empty());
        assert!(config.console_output);
        assert!(config.file_output);
    }

    #[test]
    fn test_log_directory_is_logs() {
        assert!(get_log_directory().to_string_lossy().ends_with("logs"));
    }

    // the only test installing the global subscriber
    #[test]
    fn test_init_with_console_and_file_output() -> Result<()> {
        let dir = tempdir()?;
        let config = LoggingConfig {
            console_output: true,
            file_output: true,
            json_format: false,
            auto_cleanup_logs: true,
            log_dir: Some(dir.path().to_path_buf()),
            file_name: "crawler.log".to_string(),
            ..LoggingConfig::default()
        };

        init_logging_with_config(&config)?;
        info!("after init");

        assert!(dir.path().join("crawler.log").exists());
        Ok(())
    }

    #[test]
    fn test_rotation_and_cleanup() -> Result<()> {
        let dir = tempdir()?;
        for i in 0..4 {
            std::fs::write(dir.path().join(format!("app.2024010{}T000000.log", i)), "old")?;
        }
        std::fs::write(dir.path().join("app.log"), "current")?;
        std::fs::write(dir.path().join("other.log"), "keep")?;

        rotate_existing_log_file(dir.path(), "app.log")?;
        assert!(!dir.path().join("app.log").exists());

        cleanup_old_logs(dir.path(), "app.log", 2)?;
        let remaining: Vec<_> = std::fs::read_dir(dir.path())?
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|n| n.starts_with("app."))
            .collect();
        assert_eq!(remaining.len(), 2);
        assert!(dir.path().join("other.log").exists());
        Ok(())
    }
}
