// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// Errors in the requested run configuration, detected before any network activity
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No feed URL was given")]
    MissingFeedUrl,

    #[error("Custom mode needs an episode count")]
    MissingCount,

    #[error("Episode count must be at least 1, got {0}")]
    InvalidCount(usize),

    #[error("An episode count is only valid with custom mode")]
    CountWithoutCustom,

    #[error("Download attempts must be at least 1")]
    InvalidAttempts,
}

/// Errors that can occur when locating, fetching or parsing feeds
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to fetch {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("No feed could be discovered at {url}")]
    NoFeedDiscovered { url: String },

    #[error("Failed to parse XML from {url}: {reason}")]
    XmlParse { url: String, reason: String },

    #[error(
        "No episodes found in the feed{}",
        .last_error.as_deref().map(|e| format!(" (last failure: {e})")).unwrap_or_default()
    )]
    NoEpisodesFound {
        /// Why the last candidate URL was rejected, if it failed outright
        last_error: Option<String>,
    },
}

impl FeedError {
    /// Whether the error happened while discovering the feed, as opposed to reading it.
    ///
    /// Discovery errors can be recovered from by asking for a different URL.
    pub fn is_discovery(&self) -> bool {
        matches!(
            self,
            FeedError::InvalidUrl { .. }
                | FeedError::FetchFailed { .. }
                | FeedError::NoFeedDiscovered { .. }
        )
    }
}

/// Errors that can occur during a single download attempt
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to create file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to move download into place at {path}: {source}")]
    FinalizeFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level errors for a pipeline run
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("No downloadable enclosure URLs found in the feed")]
    NoDownloadableEpisodes,

    #[error("Failed to create output folder {path}: {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open log file {path}: {source}")]
    LogFileFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
