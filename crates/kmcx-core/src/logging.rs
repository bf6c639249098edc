//! Session logging. Every CLI run writes to its own file under the cache
//! home unless `-v` routes events to stderr instead.

use crate::config::LoggingConfig;
use crate::constants::dirs;
use crate::errors::ConfigError;
use chrono::{Local, NaiveDate};
use std::env;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Overrides the session log level, e.g. `KMCX_LOG_LEVEL=debug`.
pub const LEVEL_ENV: &str = "KMCX_LOG_LEVEL";

const SESSION_PREFIX: &str = "kmcx_";
const LATEST_LINK: &str = "kmcx.log";

struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// `-v` enables debug output, `-vv` and above trace.
pub fn verbosity_filter(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn env_level() -> Option<LevelFilter> {
    env::var(LEVEL_ENV).ok()?.parse().ok()
}

/// `RUST_LOG` wins over `default`.
fn env_filter(default: LevelFilter) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(default.into()))
}

fn session_date(path: &Path) -> Option<NaiveDate> {
    let name = path.file_name()?.to_str()?;
    let date = name.strip_prefix(SESSION_PREFIX)?.split('_').next()?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

fn session_logs(log_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let mut logs: Vec<PathBuf> = fs::read_dir(log_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(SESSION_PREFIX) && n.ends_with(".log"))
        })
        .collect();
    logs.sort();
    Ok(logs)
}

/// Logs to delete: the oldest ones beyond `max_files`, plus every dated log
/// at least `max_age_days` old. A zero limit disables that rule. Undated
/// names are only subject to the count rule.
fn expired(logs: &[PathBuf], config: &LoggingConfig, today: NaiveDate) -> Vec<PathBuf> {
    let surplus = match config.max_files {
        0 => 0,
        max => logs.len().saturating_sub(max),
    };
    let too_old = |path: &Path| {
        config.max_age_days > 0
            && session_date(path).is_some_and(|date| {
                u64::try_from(today.signed_duration_since(date).num_days())
                    .is_ok_and(|days| days >= config.max_age_days)
            })
    };
    logs.iter()
        .enumerate()
        .filter(|(index, path)| *index < surplus || too_old(path))
        .map(|(_, path)| path.clone())
        .collect()
}

fn rotate_logs(log_dir: &Path, config: &LoggingConfig) -> Result<(), ConfigError> {
    fs::create_dir_all(log_dir)?;
    let logs = session_logs(log_dir)?;
    for path in expired(&logs, config, Local::now().date_naive()) {
        let _ = fs::remove_file(path);
    }
    Ok(())
}

/// Opens a fresh session log under the XDG cache home and points `kmcx.log`
/// at it. Returns the path of the new log.
pub fn init_session_logger(config: &LoggingConfig) -> Result<PathBuf, ConfigError> {
    let cache_home = xdg::BaseDirectories::with_prefix(dirs::KMCX)
        .get_cache_home()
        .ok_or(ConfigError::HomeDirectoryNotFound)?;
    let log_dir = cache_home.join(dirs::LOGS);
    rotate_logs(&log_dir, config)?;

    let file_name = format!(
        "{}{}_{}.log",
        SESSION_PREFIX,
        Local::now().format("%Y-%m-%d_%H-%M-%S"),
        std::process::id()
    );
    let log_path = log_dir.join(&file_name);
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|source| ConfigError::PathIo {
            path: log_path.clone(),
            source,
        })?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(log_file))
        .with_timer(LocalTime)
        .with_ansi(false)
        .with_thread_names(true)
        .with_line_number(true);
    tracing_subscriber::registry()
        .with(env_filter(env_level().unwrap_or(LevelFilter::INFO)))
        .with(file_layer)
        .try_init()
        .map_err(|e| ConfigError::General(format!("Logger already initialized: {}", e)))?;

    let link = cache_home.join(LATEST_LINK);
    let _ = fs::remove_file(&link);
    #[cfg(unix)]
    {
        let _ = std::os::unix::fs::symlink(Path::new(dirs::LOGS).join(&file_name), &link);
    }

    tracing::info!("kmcx {} session started", env!("CARGO_PKG_VERSION"));
    Ok(log_path)
}

pub fn init_stderr_logger(level: LevelFilter) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_writer(std::io::stderr)
        .with_timer(LocalTime)
        .with_target(false)
        .try_init();
}

pub fn log_remote_command(host: &str, command: &str) {
    tracing::debug!("[CMD {}] {}", host, command);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use std::fs::File;
    use tempfile::tempdir;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(verbosity_filter(0), LevelFilter::INFO);
        assert_eq!(verbosity_filter(1), LevelFilter::DEBUG);
        assert_eq!(verbosity_filter(4), LevelFilter::TRACE);
    }

    #[test]
    fn test_session_date_is_read_from_the_name() {
        assert_eq!(
            session_date(Path::new("/tmp/kmcx_2024-02-29_08-15-00_77.log")),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(session_date(Path::new("kmcx_latest.log")), None);
        assert_eq!(session_date(Path::new("other_2024-02-29.log")), None);
    }

    #[test]
    fn test_expired_combines_count_and_age() {
        let logs = paths(&[
            "kmcx_2024-03-01_10-00-00_1.log",
            "kmcx_2024-03-05_10-00-00_1.log",
            "kmcx_2024-03-09_10-00-00_1.log",
            "kmcx_2024-03-10_10-00-00_1.log",
        ]);
        let today = NaiveDate::from_ymd_opt(2024, 3, 12).unwrap();
        let config = LoggingConfig {
            max_files: 3,
            max_age_days: 7,
        };

        assert_eq!(
            expired(&logs, &config, today),
            paths(&[
                "kmcx_2024-03-01_10-00-00_1.log",
                "kmcx_2024-03-05_10-00-00_1.log",
            ])
        );

        let unlimited = LoggingConfig {
            max_files: 0,
            max_age_days: 0,
        };
        assert!(expired(&logs, &unlimited, today).is_empty());
    }

    #[test]
    fn test_rotate_logs_max_files() {
        let dir = tempdir().unwrap();
        let path = dir.path();

        let filenames = [
            "kmcx_2023-01-01_10-00-00_1.log",
            "kmcx_2023-01-02_10-00-00_1.log",
            "kmcx_2023-01-03_10-00-00_1.log",
            "kmcx_2023-01-04_10-00-00_1.log",
        ];
        for name in &filenames {
            File::create(path.join(name)).unwrap();
        }
        File::create(path.join("notes.txt")).unwrap();

        let config = LoggingConfig {
            max_files: 2,
            max_age_days: 0,
        };
        rotate_logs(path, &config).unwrap();

        assert!(!path.join(filenames[0]).exists());
        assert!(!path.join(filenames[1]).exists());
        assert!(path.join(filenames[2]).exists());
        assert!(path.join(filenames[3]).exists());
        assert!(path.join("notes.txt").exists());
    }

    #[test]
    fn test_rotate_logs_max_age() {
        let dir = tempdir().unwrap();
        let path = dir.path();

        let today = Local::now();
        let name_now = format!("kmcx_{}_10-00-00_1.log", today.format("%Y-%m-%d"));
        let name_old = format!(
            "kmcx_{}_10-00-00_1.log",
            (today - ChronoDuration::days(10)).format("%Y-%m-%d")
        );
        let name_odd = "kmcx_not-a-date_1.log";
        for name in [name_now.as_str(), name_old.as_str(), name_odd] {
            File::create(path.join(name)).unwrap();
        }

        let config = LoggingConfig {
            max_files: 0,
            max_age_days: 7,
        };
        rotate_logs(path, &config).unwrap();

        assert!(path.join(&name_now).exists());
        assert!(!path.join(&name_old).exists());
        assert!(path.join(name_odd).exists());
    }
}
