// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod config;
pub mod episode;
pub mod error;
pub mod feed;
pub mod http;
pub mod log;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;

// Re-export main types for convenience
pub use config::{ModeKind, RetryPolicy, RunOptions, SelectionMode, default_output_root};
pub use episode::{Episode, resolve_filename, select};
pub use error::{ConfigError, DownloadError, FeedError, RunError};
pub use feed::{FeedSource, fetch_and_parse, locate};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use log::{FileRunLog, LogLevel, MemoryLog, RunLog};
pub use orchestrator::{DownloadOutcome, DownloadSummary, OutcomeStatus, download_all};
pub use pipeline::{RunReport, run, run_url};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
