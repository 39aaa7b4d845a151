// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One end-to-end run: feed source in, files and a summary out.

use std::path::PathBuf;

use chrono::Local;
use url::Url;

use crate::config::RunOptions;
use crate::episode::{Episode, extract, podcast_folder_name, select};
use crate::error::RunError;
use crate::feed::{FeedSource, fetch_and_parse, locate};
use crate::http::HttpClient;
use crate::log::{RunLog, log_file_name};
use crate::orchestrator::{DownloadSummary, clean_partial_files, download_all};
use crate::progress::{ProgressEvent, SharedProgressReporter};

/// Result of a run that got as far as downloading
#[derive(Debug, Clone)]
pub struct RunReport {
    pub source: FeedSource,
    pub podcast_title: Option<String>,
    /// Per-podcast folder the episodes were written to
    pub folder: PathBuf,
    /// The run's log file inside `folder`
    pub log_path: PathBuf,
    pub summary: DownloadSummary,
}

/// Locate the feed behind `url`, then [`run`] it.
pub async fn run_url<C: HttpClient>(
    client: &C,
    url: &str,
    options: &RunOptions,
    log: &dyn RunLog,
    reporter: &SharedProgressReporter,
) -> Result<RunReport, RunError> {
    if let Err(e) = options.validate() {
        log.error(&e.to_string());
        return Err(e.into());
    }

    reporter.report(ProgressEvent::LocatingFeed {
        url: url.to_string(),
    });

    let source = match locate(client, url).await {
        Ok(source) => source,
        Err(e) => {
            log.error(&format!("Could not locate a feed at {url}: {e}"));
            return Err(e.into());
        }
    };

    reporter.report(ProgressEvent::FeedLocated {
        requested_url: source.requested_url.clone(),
        resolved_url: source.resolved_url.clone(),
    });

    run(client, &source, options, log, reporter).await
}

/// Fetch the located feed, select episodes and download them.
///
/// Fatal errors are written to `log` before they are returned. Failed episodes
/// are not fatal; they end up in the report's summary.
pub async fn run<C: HttpClient>(
    client: &C,
    source: &FeedSource,
    options: &RunOptions,
    log: &dyn RunLog,
    reporter: &SharedProgressReporter,
) -> Result<RunReport, RunError> {
    let result = run_inner(client, source, options, log, reporter).await;
    if let Err(e) = &result {
        log.error(&e.to_string());
    }
    result
}

async fn run_inner<C: HttpClient>(
    client: &C,
    source: &FeedSource,
    options: &RunOptions,
    log: &dyn RunLog,
    reporter: &SharedProgressReporter,
) -> Result<RunReport, RunError> {
    options.validate()?;

    log.info(&format!("Requested URL: {}", source.requested_url));
    log.info(&format!("Resolved feed URL: {}", source.resolved_url));

    reporter.report(ProgressEvent::FetchingFeed {
        url: source.resolved_url.clone(),
    });
    let feed = fetch_and_parse(client, std::slice::from_ref(&source.resolved_url)).await?;

    let folder_name = podcast_folder_name(feed.title.as_deref());
    let folder = options.output_root.join(&folder_name);
    tokio::fs::create_dir_all(&folder)
        .await
        .map_err(|e| RunError::OutputDirFailed {
            path: folder.clone(),
            source: e,
        })?;

    let log_path = folder.join(log_file_name(Local::now(), &folder_name));
    log.attach(&log_path)
        .map_err(|e| RunError::LogFileFailed {
            path: log_path.clone(),
            source: e,
        })?;

    match clean_partial_files(&folder) {
        Ok(0) => {}
        Ok(n) => log.info(&format!("Removed {n} unfinished download(s) from an earlier run")),
        Err(e) => log.warn(&format!("Could not scan for unfinished downloads: {e}")),
    }

    log.info(&format!(
        "Podcast: {}",
        feed.title.as_deref().unwrap_or(&folder_name)
    ));
    log.info(&format!("Mode: {}", options.mode));
    log.info(&format!("Output folder: {}", folder.display()));

    let base = Url::parse(&feed.resolved_url).ok();
    let episodes: Vec<Episode> = feed
        .items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let mut episode = extract(item, index + 1);
            if let Some(base) = &base {
                episode.resolve_audio_url(base);
            }
            episode
        })
        .collect();

    let total_items = episodes.len();
    let downloadable: Vec<Episode> = episodes
        .into_iter()
        .filter(Episode::is_downloadable)
        .collect();

    log.info(&format!(
        "Items in feed: {}, with audio URL: {}",
        total_items,
        downloadable.len()
    ));

    if downloadable.is_empty() {
        return Err(RunError::NoDownloadableEpisodes);
    }

    let downloadable_count = downloadable.len();
    let selected = select(downloadable, options.mode);
    log.info(&format!("Selected {} episode(s)", selected.len()));

    reporter.report(ProgressEvent::FeedParsed {
        podcast_title: folder_name.clone(),
        total_items,
        downloadable: downloadable_count,
        selected: selected.len(),
    });

    let summary = download_all(client, &selected, &folder, &options.retry, log, reporter).await;
    summary.log_to(log);

    Ok(RunReport {
        source: source.clone(),
        podcast_title: feed.title,
        folder,
        log_path,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RetryPolicy, SelectionMode};
    use crate::error::FeedError;
    use crate::http::ReqwestClient;
    use crate::log::{FileRunLog, LogLevel, MemoryLog};
    use crate::progress::{NoopReporter, ProgressReporter};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::{TempDir, tempdir};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct EventRecorder {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl ProgressReporter for EventRecorder {
        fn report(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn options(output: &TempDir, mode: SelectionMode) -> RunOptions {
        RunOptions {
            mode,
            output_root: output.path().to_path_buf(),
            retry: RetryPolicy {
                max_attempts: 3,
                delay: Duration::ZERO,
            },
        }
    }

    fn direct(server: &MockServer, feed_path: &str) -> FeedSource {
        let url = format!("{}{}", server.uri(), feed_path);
        FeedSource {
            requested_url: url.clone(),
            resolved_url: url,
        }
    }

    async fn serve(server: &MockServer, route: &str, body: impl Into<String>) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body.into()))
            .mount(server)
            .await;
    }

    /// Five items dated 2024-01-01..05, deliberately out of order
    fn five_day_feed(base: &str) -> String {
        let items: String = [3, 1, 5, 2, 4]
            .iter()
            .map(|day| {
                format!(
                    r#"<item>
                        <title>Day {day}</title>
                        <pubDate>0{day} Jan 2024 10:00:00 +0000</pubDate>
                        <guid>day-{day}</guid>
                        <enclosure url="{base}/audio/day{day}.mp3" type="audio/mpeg"/>
                    </item>"#
                )
            })
            .collect();

        format!(
            r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Test Show</title>{items}</channel></rss>"#
        )
    }

    async fn serve_five_day_feed(server: &MockServer) {
        serve(server, "/feed.xml", five_day_feed(&server.uri())).await;
        for day in 1..=5 {
            serve(server, &format!("/audio/day{day}.mp3"), format!("audio {day}")).await;
        }
    }

    #[tokio::test]
    async fn latest_downloads_only_the_newest_episode() {
        let server = MockServer::start().await;
        serve_five_day_feed(&server).await;
        let output = tempdir().unwrap();
        let client = ReqwestClient::new().unwrap();
        let log = MemoryLog::new();

        let report = run(
            &client,
            &direct(&server, "/feed.xml"),
            &options(&output, SelectionMode::Latest),
            &log,
            &NoopReporter::shared(),
        )
        .await
        .unwrap();

        let folder = output.path().join("Test Show");
        assert_eq!(report.folder, folder);
        assert_eq!(report.summary.downloaded.len(), 1);
        assert_eq!(
            std::fs::read_to_string(folder.join("2024-01-05 - Day 5.mp3")).unwrap(),
            "audio 5"
        );
        assert!(!folder.join("2024-01-04 - Day 4.mp3").exists());

        assert!(log.contains(LogLevel::Info, "Resolved feed URL"));
        assert!(log.contains(LogLevel::Info, "Mode: Latest"));
        assert!(log.contains(LogLevel::Info, "Items in feed: 5, with audio URL: 5"));
        let attached = log.attached_path().unwrap();
        assert_eq!(attached.parent(), Some(folder.as_path()));
        assert!(attached.to_string_lossy().ends_with("_Test Show.log"));
    }

    #[tokio::test]
    async fn custom_count_downloads_newest_n() {
        let server = MockServer::start().await;
        serve_five_day_feed(&server).await;
        let output = tempdir().unwrap();
        let client = ReqwestClient::new().unwrap();

        let report = run(
            &client,
            &direct(&server, "/feed.xml"),
            &options(&output, SelectionMode::Custom(2)),
            &MemoryLog::new(),
            &NoopReporter::shared(),
        )
        .await
        .unwrap();

        let titles: Vec<&str> = report
            .summary
            .downloaded
            .iter()
            .map(|o| o.episode_title.as_str())
            .collect();
        assert_eq!(titles, vec!["Day 5", "Day 4"]);
    }

    #[tokio::test]
    async fn second_run_skips_everything() {
        let server = MockServer::start().await;
        serve_five_day_feed(&server).await;
        let output = tempdir().unwrap();
        let client = ReqwestClient::new().unwrap();
        let opts = options(&output, SelectionMode::All);
        let source = direct(&server, "/feed.xml");

        let first = run(&client, &source, &opts, &MemoryLog::new(), &NoopReporter::shared())
            .await
            .unwrap();
        assert_eq!(first.summary.downloaded.len(), 5);

        let second = run(&client, &source, &opts, &MemoryLog::new(), &NoopReporter::shared())
            .await
            .unwrap();
        assert!(second.summary.downloaded.is_empty());
        assert_eq!(second.summary.skipped.len(), 5);
    }

    #[tokio::test]
    async fn feed_without_audio_urls_is_fatal_and_logged() {
        let server = MockServer::start().await;
        serve(
            &server,
            "/feed.xml",
            r#"<rss><channel><title>Text Only</title>
                <item><title>A</title><link>https://example.com/a.html</link></item>
                <item><title>B</title></item>
            </channel></rss>"#,
        )
        .await;
        let output = tempdir().unwrap();
        let client = ReqwestClient::new().unwrap();
        let log = MemoryLog::new();

        let result = run(
            &client,
            &direct(&server, "/feed.xml"),
            &options(&output, SelectionMode::All),
            &log,
            &NoopReporter::shared(),
        )
        .await;

        assert!(matches!(result, Err(RunError::NoDownloadableEpisodes)));
        assert!(log.contains(LogLevel::Error, "No downloadable enclosure URLs"));
        let entries: Vec<_> = std::fs::read_dir(output.path().join("Text Only"))
            .unwrap()
            .collect();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn unavailable_feed_logs_the_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let output = tempdir().unwrap();
        let client = ReqwestClient::new().unwrap();
        let log = MemoryLog::new();

        let result = run(
            &client,
            &direct(&server, "/feed.xml"),
            &options(&output, SelectionMode::Latest),
            &log,
            &NoopReporter::shared(),
        )
        .await;

        assert!(matches!(
            result,
            Err(RunError::Feed(FeedError::NoEpisodesFound {
                last_error: Some(_)
            }))
        ));
        assert!(log.contains(LogLevel::Error, "No episodes found"));
        assert!(log.contains(LogLevel::Error, "503"));
    }

    #[tokio::test]
    async fn atom_enclosure_links_and_relative_urls_are_followed() {
        let server = MockServer::start().await;
        serve(
            &server,
            "/atom",
            r#"<feed xmlns="http://www.w3.org/2005/Atom">
                <title>Atom Show</title>
                <entry>
                    <title>Only Entry</title>
                    <updated>2024-02-10T08:00:00Z</updated>
                    <link rel="alternate" href="/page"/>
                    <link rel="enclosure" href="/media/entry.m4a"/>
                </entry>
            </feed>"#,
        )
        .await;
        serve(&server, "/media/entry.m4a", "m4a bytes").await;
        let output = tempdir().unwrap();
        let client = ReqwestClient::new().unwrap();

        let report = run(
            &client,
            &direct(&server, "/atom"),
            &options(&output, SelectionMode::Latest),
            &MemoryLog::new(),
            &NoopReporter::shared(),
        )
        .await
        .unwrap();

        assert_eq!(report.summary.downloaded.len(), 1);
        assert!(
            output
                .path()
                .join("Atom Show/2024-02-10 - Only Entry.m4a")
                .exists()
        );
    }

    #[tokio::test]
    async fn failing_episode_is_reported_not_fatal() {
        let server = MockServer::start().await;
        let feed = format!(
            r#"<rss><channel><title>Mixed</title>
                <item><title>Broken</title><pubDate>Tue, 02 Jan 2024 00:00:00 GMT</pubDate>
                    <enclosure url="{0}/missing.mp3"/></item>
                <item><title>Fine</title><pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate>
                    <enclosure url="{0}/fine.mp3"/></item>
            </channel></rss>"#,
            server.uri()
        );
        serve(&server, "/feed.xml", feed).await;
        serve(&server, "/fine.mp3", "fine").await;
        Mock::given(method("GET"))
            .and(path("/missing.mp3"))
            .respond_with(ResponseTemplate::new(404))
            .expect(3)
            .mount(&server)
            .await;
        let output = tempdir().unwrap();
        let client = ReqwestClient::new().unwrap();
        let log = MemoryLog::new();

        let report = run(
            &client,
            &direct(&server, "/feed.xml"),
            &options(&output, SelectionMode::All),
            &log,
            &NoopReporter::shared(),
        )
        .await
        .unwrap();

        assert_eq!(report.summary.failed.len(), 1);
        assert_eq!(report.summary.failed[0].episode_title, "Broken");
        assert_eq!(report.summary.downloaded.len(), 1);
        assert!(log.contains(LogLevel::Info, "1 downloaded, 0 skipped, 1 failed"));
        assert!(!output.path().join("Mixed/2024-01-02 - Broken.mp3").exists());
    }

    #[tokio::test]
    async fn run_url_discovers_feed_from_show_page() {
        let server = MockServer::start().await;
        serve_five_day_feed(&server).await;
        serve(
            &server,
            "/show",
            r#"<html><head>
                <link rel="alternate" type="application/rss+xml" href="/feed.xml">
            </head><body>Show page</body></html>"#,
        )
        .await;
        let output = tempdir().unwrap();
        let client = ReqwestClient::new().unwrap();
        let log = FileRunLog::new();
        let page_url = format!("{}/show", server.uri());

        let report = run_url(
            &client,
            &page_url,
            &options(&output, SelectionMode::Latest),
            &log,
            &NoopReporter::shared(),
        )
        .await
        .unwrap();

        assert_eq!(report.source.requested_url, page_url);
        assert_eq!(
            report.source.resolved_url,
            format!("{}/feed.xml", server.uri())
        );
        assert_eq!(report.summary.downloaded.len(), 1);

        let content = std::fs::read_to_string(&report.log_path).unwrap();
        assert!(content.contains(&format!("[INFO] Requested URL: {page_url}")));
        assert!(content.contains("[INFO] Summary: 1 downloaded, 0 skipped, 0 failed"));
    }

    #[tokio::test]
    async fn run_url_reports_location_before_fetching() {
        let server = MockServer::start().await;
        serve_five_day_feed(&server).await;
        let output = tempdir().unwrap();
        let client = ReqwestClient::new().unwrap();
        let recorder = Arc::new(EventRecorder::default());
        let reporter: SharedProgressReporter = recorder.clone();
        let feed_url = format!("{}/feed.xml", server.uri());

        run_url(
            &client,
            &feed_url,
            &options(&output, SelectionMode::Latest),
            &MemoryLog::new(),
            &reporter,
        )
        .await
        .unwrap();

        let events = recorder.events.lock().unwrap();
        assert!(matches!(&events[0], ProgressEvent::LocatingFeed { url } if *url == feed_url));
        assert!(matches!(
            &events[1],
            ProgressEvent::FeedLocated { resolved_url, .. } if *resolved_url == feed_url
        ));
        assert!(matches!(&events[2], ProgressEvent::FetchingFeed { .. }));
        assert!(matches!(
            events.last(),
            Some(ProgressEvent::RunCompleted {
                downloaded_count: 1,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn run_url_without_feed_link_fails_with_discovery_error() {
        let server = MockServer::start().await;
        serve(&server, "/blog", "<html><head><title>Blog</title></head></html>").await;
        let output = tempdir().unwrap();
        let client = ReqwestClient::new().unwrap();
        let log = MemoryLog::new();

        let result = run_url(
            &client,
            &format!("{}/blog", server.uri()),
            &options(&output, SelectionMode::Latest),
            &log,
            &NoopReporter::shared(),
        )
        .await;

        match result {
            Err(RunError::Feed(e)) => assert!(e.is_discovery()),
            other => panic!("Expected discovery error, got {other:?}"),
        }
        assert!(log.contains(LogLevel::Error, "Could not locate a feed"));
        assert!(log.attached_path().is_none());
    }

    #[tokio::test]
    async fn invalid_options_fail_before_network() {
        let output = tempdir().unwrap();
        let client = ReqwestClient::new().unwrap();
        let mut opts = options(&output, SelectionMode::Latest);
        opts.retry.max_attempts = 0;

        let result = run_url(
            &client,
            "http://127.0.0.1:9/unreachable",
            &opts,
            &MemoryLog::new(),
            &NoopReporter::shared(),
        )
        .await;

        assert!(matches!(result, Err(RunError::Config(_))));
    }
}
