//! Shared logging utilities for Conduit binaries.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "conduit=info,conduit_dqm=info,conduit_api=info,conduit_registry=info";
const MAX_LOG_FILES: usize = 4;
const MAX_LOG_FILE_SIZE: u64 = 8 * 1024 * 1024;

/// Logging configuration shared by Conduit binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
}

/// Initialize tracing with a rolling file writer and stderr output.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let log_dir = ensure_logs_dir().context("Failed to ensure log directory")?;
    let file_writer = RollingLogWriter::open(log_dir, config.app_name)
        .context("Failed to initialize rolling log writer")?;

    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let console_filter = if config.verbose {
        file_filter.clone()
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .init();

    Ok(())
}

/// Get the Conduit home directory: ~/.conduit
pub fn conduit_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("CONDUIT_HOME") {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".conduit")
}

/// Get the logs directory: ~/.conduit/logs
pub fn logs_dir() -> PathBuf {
    conduit_home().join("logs")
}

/// Ensure the logs directory exists.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir();
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

/// Size-capped appender keeping `MAX_LOG_FILES` rotations.
struct Appender {
    dir: PathBuf,
    base_name: String,
    file: File,
    written: u64,
}

impl Appender {
    fn open(dir: PathBuf, base_name: String) -> io::Result<Self> {
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.log", base_name));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();
        let mut appender = Self {
            dir,
            base_name,
            file,
            written,
        };
        if appender.written > MAX_LOG_FILE_SIZE {
            appender.rotate()?;
        }
        Ok(appender)
    }

    fn current_path(&self) -> PathBuf {
        self.dir.join(format!("{}.log", self.base_name))
    }

    fn rotated_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}.log.{}", self.base_name, index))
    }

    fn rotate(&mut self) -> io::Result<()> {
        let _ = self.file.flush();

        let oldest = self.rotated_path(MAX_LOG_FILES - 1);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for index in (1..MAX_LOG_FILES - 1).rev() {
            let src = self.rotated_path(index);
            if src.exists() {
                fs::rename(&src, self.rotated_path(index + 1))?;
            }
        }
        let current = self.current_path();
        if current.exists() {
            fs::rename(&current, self.rotated_path(1))?;
        }

        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.current_path())?;
        self.written = 0;
        Ok(())
    }
}

impl Write for Appender {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written + buf.len() as u64 > MAX_LOG_FILE_SIZE {
            self.rotate()?;
        }
        let bytes = self.file.write(buf)?;
        self.written += bytes as u64;
        Ok(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Cloneable `MakeWriter` handle over the shared appender.
#[derive(Clone)]
struct RollingLogWriter {
    inner: Arc<Mutex<Appender>>,
}

impl RollingLogWriter {
    fn open(dir: PathBuf, base_name: &str) -> Result<Self> {
        let appender = Appender::open(dir, sanitize_name(base_name))
            .with_context(|| format!("Failed to open log file for {}", base_name))?;
        Ok(Self {
            inner: Arc::new(Mutex::new(appender)),
        })
    }
}

struct RollingLogGuard {
    inner: Arc<Mutex<Appender>>,
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for RollingLogWriter {
    type Writer = RollingLogGuard;

    fn make_writer(&'a self) -> Self::Writer {
        RollingLogGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Write for RollingLogGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        guard.flush()
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn appender_rotates_when_size_cap_exceeded() {
        let tmp = TempDir::new().unwrap();
        let mut appender =
            Appender::open(tmp.path().to_path_buf(), "test".to_string()).unwrap();
        appender.written = MAX_LOG_FILE_SIZE;
        appender.write_all(b"over the cap").unwrap();
        appender.flush().unwrap();

        assert!(tmp.path().join("test.log").exists());
        assert!(tmp.path().join("test.log.1").exists());
    }

    #[test]
    fn sanitize_replaces_path_characters() {
        assert_eq!(sanitize_name("conduit/serve"), "conduit_serve");
        assert_eq!(sanitize_name("conduit-api_1"), "conduit-api_1");
    }
}
