// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Default number of download attempts per episode
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default pause between two download attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Folder created below the user's downloads directory by default
const DEFAULT_OUTPUT_FOLDER: &str = "Podcasts";

/// How many of the newest episodes to act on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// Only the newest episode
    #[default]
    Latest,
    /// The newest `n` episodes
    Custom(usize),
    /// Every downloadable episode
    All,
}

/// Selection mode without its count, as named on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModeKind {
    #[default]
    Latest,
    Custom,
    All,
}

impl SelectionMode {
    /// Combine a mode and an optional count into a validated selection
    pub fn from_parts(kind: ModeKind, count: Option<usize>) -> Result<Self, ConfigError> {
        match (kind, count) {
            (ModeKind::Custom, None) => Err(ConfigError::MissingCount),
            (ModeKind::Custom, Some(0)) => Err(ConfigError::InvalidCount(0)),
            (ModeKind::Custom, Some(n)) => Ok(SelectionMode::Custom(n)),
            (_, Some(_)) => Err(ConfigError::CountWithoutCustom),
            (ModeKind::Latest, None) => Ok(SelectionMode::Latest),
            (ModeKind::All, None) => Ok(SelectionMode::All),
        }
    }
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionMode::Latest => write!(f, "Latest"),
            SelectionMode::Custom(n) => write!(f, "Custom ({n})"),
            SelectionMode::All => write!(f, "All"),
        }
    }
}

/// Bounded, fixed-delay retry discipline for downloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per episode, including the first
    pub max_attempts: u32,
    /// Pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Everything a pipeline run needs besides the feed itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub mode: SelectionMode,
    /// Root under which the per-podcast folder is created
    pub output_root: PathBuf,
    pub retry: RetryPolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: SelectionMode::default(),
            output_root: default_output_root(),
            retry: RetryPolicy::default(),
        }
    }
}

impl RunOptions {
    /// Reject configurations that can never run
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let SelectionMode::Custom(0) = self.mode {
            return Err(ConfigError::InvalidCount(0));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidAttempts);
        }
        Ok(())
    }
}

/// `<Downloads>/Podcasts`, falling back to the home directory and then the
/// working directory when no downloads directory is known
pub fn default_output_root() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_OUTPUT_FOLDER)
}
