// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The per-run audit log.
//!
//! A run cannot know where its log file lives until the feed title is known, so
//! [`FileRunLog`] keeps early lines in memory and writes them out when it is
//! attached to a file. Every line is also forwarded to `tracing`.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Local};

/// Severity of a run log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// Append-only sink for the run's audit trail
pub trait RunLog: Send + Sync {
    /// Append a line
    fn log(&self, level: LogLevel, message: &str);

    /// Start persisting to `path`; lines logged before this call are kept
    fn attach(&self, path: &Path) -> io::Result<()>;

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

/// Log file name for a run: `<YYYYMMDD>_<HHMMSS>_<folder>.log`
pub fn log_file_name(started_at: DateTime<Local>, folder_name: &str) -> String {
    format!("{}_{}.log", started_at.format("%Y%m%d_%H%M%S"), folder_name)
}

fn forward_to_tracing(level: LogLevel, message: &str) {
    match level {
        LogLevel::Info => tracing::info!("{message}"),
        LogLevel::Warn => tracing::warn!("{message}"),
        LogLevel::Error => tracing::error!("{message}"),
    }
}

fn format_line(level: LogLevel, message: &str) -> String {
    format!(
        "{} [{}] {}\n",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        level,
        message
    )
}

#[derive(Default)]
struct FileLogState {
    pending: Vec<String>,
    file: Option<File>,
    path: Option<PathBuf>,
}

/// Run log backed by a text file, durable line by line once attached
#[derive(Default)]
pub struct FileRunLog {
    state: Mutex<FileLogState>,
}

impl FileRunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of the attached log file, if any
    pub fn path(&self) -> Option<PathBuf> {
        self.lock().path.clone()
    }

    fn lock(&self) -> MutexGuard<'_, FileLogState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RunLog for FileRunLog {
    fn log(&self, level: LogLevel, message: &str) {
        forward_to_tracing(level, message);

        let line = format_line(level, message);
        let mut state = self.lock();
        let Some(file) = state.file.as_mut() else {
            state.pending.push(line);
            return;
        };

        let written = file
            .write_all(line.as_bytes())
            .and_then(|_| file.sync_data());
        if let Err(e) = written {
            tracing::error!(error = %e, "failed to write run log line");
        }
    }

    fn attach(&self, path: &Path) -> io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        let mut state = self.lock();
        for line in state.pending.drain(..) {
            file.write_all(line.as_bytes())?;
        }
        file.sync_data()?;

        state.file = Some(file);
        state.path = Some(path.to_path_buf());
        Ok(())
    }
}

/// Run log that keeps lines in memory
#[derive(Debug, Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<(LogLevel, String)>>,
    attached: Mutex<Option<PathBuf>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All lines logged so far
    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Whether any line at `level` contains `needle`
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.lines()
            .iter()
            .any(|(l, message)| *l == level && message.contains(needle))
    }

    /// Path passed to the last [`RunLog::attach`] call
    pub fn attached_path(&self) -> Option<PathBuf> {
        self.attached
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl RunLog for MemoryLog {
    fn log(&self, level: LogLevel, message: &str) {
        forward_to_tracing(level, message);
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((level, message.to_string()));
    }

    fn attach(&self, path: &Path) -> io::Result<()> {
        *self
            .attached
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(path.to_path_buf());
        Ok(())
    }
}
