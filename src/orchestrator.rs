// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use crate::config::RetryPolicy;
use crate::episode::{Episode, PARTIAL_SUFFIX, download_episode, resolve_filename};
use crate::http::HttpClient;
use crate::log::RunLog;
use crate::progress::{ProgressEvent, SharedProgressReporter};

/// Terminal state of one episode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// Full body written to the target path
    Downloaded,
    /// Target file already existed and was left untouched
    Skipped,
    /// Every attempt failed
    Failed,
}

/// What happened to one selected episode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub status: OutcomeStatus,
    pub episode_title: String,
    pub target_path: PathBuf,
    /// Error of the last attempt, for failed episodes
    pub error: Option<String>,
}

/// Outcomes of a run, each list in processing order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub downloaded: Vec<DownloadOutcome>,
    pub skipped: Vec<DownloadOutcome>,
    pub failed: Vec<DownloadOutcome>,
}

impl DownloadSummary {
    fn record(&mut self, outcome: DownloadOutcome) {
        match outcome.status {
            OutcomeStatus::Downloaded => self.downloaded.push(outcome),
            OutcomeStatus::Skipped => self.skipped.push(outcome),
            OutcomeStatus::Failed => self.failed.push(outcome),
        }
    }

    /// Number of episodes processed
    pub fn total(&self) -> usize {
        self.downloaded.len() + self.skipped.len() + self.failed.len()
    }

    /// Write the end-of-run summary to the run log
    pub fn log_to(&self, log: &dyn RunLog) {
        log.info(&format!(
            "Summary: {} downloaded, {} skipped, {} failed",
            self.downloaded.len(),
            self.skipped.len(),
            self.failed.len()
        ));
        for outcome in &self.failed {
            log.error(&format!(
                "Failed: '{}' -> {} ({})",
                outcome.episode_title,
                outcome.target_path.display(),
                outcome.error.as_deref().unwrap_or("unknown error")
            ));
        }
    }
}

/// Remove `*.partial` files left in `folder` by an interrupted run.
///
/// Returns the number of files removed. A missing folder counts as clean.
pub fn clean_partial_files(folder: &Path) -> std::io::Result<usize> {
    let entries = match std::fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    for entry in entries {
        let path = entry?.path();
        let is_partial = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(PARTIAL_SUFFIX));

        if is_partial && path.is_file() && std::fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }

    Ok(removed)
}

/// Download each episode in order into `folder`.
///
/// Episodes whose target file exists are skipped. Others are attempted up to
/// `policy.max_attempts` times with `policy.delay` between attempts; a failed
/// episode never stops the remaining ones.
pub async fn download_all<C: HttpClient>(
    client: &C,
    episodes: &[Episode],
    folder: &Path,
    policy: &RetryPolicy,
    log: &dyn RunLog,
    reporter: &SharedProgressReporter,
) -> DownloadSummary {
    let mut summary = DownloadSummary::default();
    let total = episodes.len();

    for (episode_index, episode) in episodes.iter().enumerate() {
        let filename = resolve_filename(episode, episode_index + 1);
        let target_path = folder.join(filename);

        log.info(&format!(
            "[{}/{}] '{}' -> {}",
            episode_index + 1,
            total,
            episode.title,
            target_path.display()
        ));
        reporter.report(ProgressEvent::EpisodeStarting {
            episode_index,
            total,
            episode_title: episode.title.clone(),
            target_path: target_path.clone(),
        });

        let outcome = process_episode(client, episode, target_path, policy, log, reporter).await;
        summary.record(outcome);
    }

    reporter.report(ProgressEvent::RunCompleted {
        downloaded_count: summary.downloaded.len(),
        skipped_count: summary.skipped.len(),
        failed_count: summary.failed.len(),
    });

    summary
}

async fn process_episode<C: HttpClient>(
    client: &C,
    episode: &Episode,
    target_path: PathBuf,
    policy: &RetryPolicy,
    log: &dyn RunLog,
    reporter: &SharedProgressReporter,
) -> DownloadOutcome {
    let title = episode.title.clone();

    if target_path.exists() {
        log.info(&format!("Skipped, file exists: {}", target_path.display()));
        reporter.report(ProgressEvent::EpisodeSkipped {
            episode_title: title.clone(),
            target_path: target_path.clone(),
        });
        return DownloadOutcome {
            status: OutcomeStatus::Skipped,
            episode_title: title,
            target_path,
            error: None,
        };
    }

    let Some(url) = episode.audio_url.as_deref() else {
        let error = "Episode has no audio URL".to_string();
        return failed(title, target_path, error, log, reporter);
    };

    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=max_attempts {
        match download_episode(client, url, &target_path, &title, attempt, reporter).await {
            Ok(bytes_downloaded) => {
                log.info(&format!(
                    "Downloaded {} bytes: {}",
                    bytes_downloaded,
                    target_path.display()
                ));
                reporter.report(ProgressEvent::EpisodeDownloaded {
                    episode_title: title.clone(),
                    bytes_downloaded,
                });
                return DownloadOutcome {
                    status: OutcomeStatus::Downloaded,
                    episode_title: title,
                    target_path,
                    error: None,
                };
            }
            Err(e) => {
                last_error = e.to_string();
                log.warn(&format!(
                    "Attempt {attempt}/{max_attempts} failed for '{title}': {last_error}"
                ));
                reporter.report(ProgressEvent::AttemptFailed {
                    episode_title: title.clone(),
                    attempt,
                    max_attempts,
                    error: last_error.clone(),
                });

                if attempt < max_attempts && !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }

    failed(title, target_path, last_error, log, reporter)
}

fn failed(
    title: String,
    target_path: PathBuf,
    error: String,
    log: &dyn RunLog,
    reporter: &SharedProgressReporter,
) -> DownloadOutcome {
    log.error(&format!("Giving up on '{title}': {error}"));
    reporter.report(ProgressEvent::EpisodeFailed {
        episode_title: title.clone(),
        error: error.clone(),
    });
    DownloadOutcome {
        status: OutcomeStatus::Failed,
        episode_title: title,
        target_path,
        error: Some(error),
    }
}
