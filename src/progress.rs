// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::sync::Arc;

/// Events emitted during a run for progress reporting
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// The user-supplied URL is being inspected
    LocatingFeed { url: String },

    /// The feed behind the user-supplied URL is known
    FeedLocated {
        requested_url: String,
        resolved_url: String,
    },

    /// Feed is being fetched from URL
    FetchingFeed { url: String },

    /// Feed has been parsed and episodes selected
    FeedParsed {
        podcast_title: String,
        total_items: usize,
        downloadable: usize,
        selected: usize,
    },

    /// Processing of an episode begins
    EpisodeStarting {
        /// Index of this episode in the selection
        episode_index: usize,
        /// Number of selected episodes
        total: usize,
        episode_title: String,
        target_path: PathBuf,
    },

    /// The target file already exists
    EpisodeSkipped {
        episode_title: String,
        target_path: PathBuf,
    },

    /// A download attempt received a response and starts writing
    DownloadStarting {
        episode_title: String,
        /// 1-based attempt number
        attempt: u32,
        /// Expected content length in bytes, if known
        content_length: Option<u64>,
    },

    /// Download progress update
    DownloadProgress {
        episode_title: String,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },

    /// A download attempt failed; another may follow
    AttemptFailed {
        episode_title: String,
        attempt: u32,
        max_attempts: u32,
        error: String,
    },

    /// An episode was written to disk
    EpisodeDownloaded {
        episode_title: String,
        bytes_downloaded: u64,
    },

    /// All attempts for an episode failed
    EpisodeFailed { episode_title: String, error: String },

    /// Every selected episode has been processed
    RunCompleted {
        downloaded_count: usize,
        skipped_count: usize,
        failed_count: usize,
    },
}

/// Trait for reporting progress events during a run.
///
/// Implementations can use this to display progress bars, log messages,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}
