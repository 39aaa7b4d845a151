// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod prompt;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use console::{Emoji, Term};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use castfetch::config::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};
use castfetch::{
    ConfigError, FeedSource, FileRunLog, HttpClient, ModeKind, NoopReporter, ProgressEvent,
    ProgressReporter, ReqwestClient, RetryPolicy, RunLog, RunOptions, RunReport,
    SelectionMode, SharedProgressReporter, default_output_root, locate, run, run_url,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static SKIPPED: Emoji<'_, '_> = Emoji("⏭️  ", "[-] ");
static WARNING: Emoji<'_, '_> = Emoji("⚠️  ", "[?] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static LOG: Emoji<'_, '_> = Emoji("📝 ", "");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Selection mode as accepted on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Only the newest episode
    Latest,
    /// The newest --count episodes
    Custom,
    /// Every episode
    All,
}

impl From<ModeArg> for ModeKind {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Latest => ModeKind::Latest,
            ModeArg::Custom => ModeKind::Custom,
            ModeArg::All => ModeKind::All,
        }
    }
}

/// Download podcast episodes from an RSS/Atom feed or a page linking to one
#[derive(Parser, Debug)]
#[command(name = "castfetch")]
#[command(about = "Download podcast episodes from an RSS/Atom feed or a page linking to one")]
#[command(version)]
struct Args {
    /// Feed URL or show page URL; asked for interactively when omitted
    url: Option<String>,

    /// Which episodes to download
    #[arg(short, long, value_enum)]
    mode: Option<ModeArg>,

    /// Number of newest episodes to download in custom mode
    #[arg(short = 'n', long)]
    count: Option<usize>,

    /// Root directory; episodes go to a per-podcast folder below it
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Download attempts per episode
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    attempts: u32,

    /// Seconds to wait between download attempts
    #[arg(long, default_value_t = DEFAULT_RETRY_DELAY.as_secs())]
    retry_delay: u64,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    main_bar: ProgressBar,
    episode_bar: Mutex<Option<ProgressBar>>,
}

impl IndicatifReporter {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let main_style = ProgressStyle::default_bar()
            .template("{spinner:.green} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            multi,
            main_bar,
            episode_bar: Mutex::new(None),
        }
    }

    fn start_episode_bar(&self) -> ProgressBar {
        let style = ProgressStyle::default_bar()
            .template(&format!(
                "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");

        let bar = self.multi.add(ProgressBar::new(0));
        bar.set_style(style);

        let mut current = self.episode_bar.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = current.replace(bar.clone()) {
            old.finish_and_clear();
        }
        bar
    }

    fn episode_bar(&self) -> Option<ProgressBar> {
        self.episode_bar
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn finish_episode(&self, line: String) {
        if let Some(bar) = self
            .episode_bar
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            bar.finish_and_clear();
        }
        self.main_bar.println(line);
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::LocatingFeed { url } => {
                self.main_bar
                    .set_message(format!("{SEARCH}Looking for a feed at {}", url.cyan()));
            }

            ProgressEvent::FeedLocated {
                requested_url,
                resolved_url,
            } => {
                if requested_url != resolved_url {
                    self.main_bar.println(format!(
                        "{SEARCH}Discovered feed: {}",
                        resolved_url.cyan()
                    ));
                }
            }

            ProgressEvent::FetchingFeed { url } => {
                self.main_bar
                    .set_message(format!("{SEARCH}Fetching feed: {}", url.cyan()));
            }

            ProgressEvent::FeedParsed {
                podcast_title,
                total_items,
                downloadable,
                selected,
            } => {
                self.main_bar.set_message(format!(
                    "{HEADPHONES}{} • {} items, {} downloadable, {} selected",
                    podcast_title.bold().green(),
                    total_items.to_string().cyan(),
                    downloadable.to_string().cyan(),
                    selected.to_string().yellow()
                ));
            }

            ProgressEvent::EpisodeStarting {
                episode_index,
                total,
                episode_title,
                ..
            } => {
                let bar = self.start_episode_bar();
                bar.set_message(format!(
                    "[{}/{}] {}",
                    (episode_index + 1).to_string().cyan(),
                    total.to_string().cyan(),
                    truncate_title(&episode_title, 40)
                ));
            }

            ProgressEvent::EpisodeSkipped { episode_title, .. } => {
                self.finish_episode(format!(
                    "{SKIPPED}{} {}",
                    truncate_title(&episode_title, 50).dimmed(),
                    "(already downloaded)".dimmed()
                ));
            }

            ProgressEvent::DownloadStarting {
                episode_title,
                attempt,
                content_length,
            } => {
                if let Some(bar) = self.episode_bar() {
                    bar.set_length(content_length.unwrap_or(0));
                    bar.set_position(0);
                    if attempt > 1 {
                        bar.set_message(format!(
                            "{} {}",
                            truncate_title(&episode_title, 40),
                            format!("(attempt {attempt})").yellow()
                        ));
                    }
                }
            }

            ProgressEvent::DownloadProgress {
                bytes_downloaded,
                total_bytes,
                ..
            } => {
                if let Some(bar) = self.episode_bar() {
                    if let Some(total) = total_bytes {
                        bar.set_length(total);
                    }
                    bar.set_position(bytes_downloaded);
                }
            }

            ProgressEvent::AttemptFailed {
                episode_title,
                attempt,
                max_attempts,
                error,
            } => {
                self.main_bar.println(format!(
                    "{WARNING}{} attempt {}/{} failed: {}",
                    truncate_title(&episode_title, 40).yellow(),
                    attempt,
                    max_attempts,
                    error.dimmed()
                ));
            }

            ProgressEvent::EpisodeDownloaded {
                episode_title,
                bytes_downloaded,
            } => {
                self.finish_episode(format!(
                    "{SUCCESS}{} {}",
                    truncate_title(&episode_title, 50).green(),
                    indicatif::HumanBytes(bytes_downloaded).to_string().dimmed()
                ));
            }

            ProgressEvent::EpisodeFailed {
                episode_title,
                error,
            } => {
                self.finish_episode(format!(
                    "{FAILURE}{} - {}",
                    truncate_title(&episode_title, 30).red(),
                    error.red()
                ));
            }

            ProgressEvent::RunCompleted {
                downloaded_count,
                skipped_count,
                failed_count,
            } => {
                self.main_bar.finish_and_clear();
                println!(
                    "\n{PARTY}{} {} downloaded, {} skipped, {} failed",
                    "Done:".bold().green(),
                    downloaded_count.to_string().green().bold(),
                    skipped_count.to_string().yellow(),
                    if failed_count > 0 {
                        failed_count.to_string().red().bold()
                    } else {
                        failed_count.to_string().green()
                    }
                );
            }
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let kept: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Ask for URLs until one leads to a feed. `None` if the user quits.
async fn locate_interactively<C: HttpClient>(
    client: &C,
    term: &Term,
    log: &dyn RunLog,
) -> Result<Option<FeedSource>> {
    loop {
        let Some(url) = prompt::ask_url(term)? else {
            return Ok(None);
        };

        match locate(client, &url).await {
            Ok(source) => return Ok(Some(source)),
            Err(e) if e.is_discovery() => {
                log.warn(&format!("No feed at {url}: {e}"));
                term.write_line(&format!("{FAILURE}{}", e.to_string().red()))?;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn print_report(report: &RunReport) {
    if !report.summary.failed.is_empty() {
        println!("\n{}", "Failed episodes:".red().bold());
        for outcome in &report.summary.failed {
            println!(
                "  {}{} - {}",
                CROSS,
                outcome.episode_title.yellow(),
                outcome.error.as_deref().unwrap_or("unknown error").dimmed()
            );
        }
    }

    println!(
        "\n{FOLDER}Output: {}",
        report.folder.display().to_string().cyan()
    );
    println!(
        "{LOG}Log: {}\n",
        report.log_path.display().to_string().dimmed()
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if !args.quiet {
        println!(
            "\n{}{} {}\n",
            MICROPHONE,
            "castfetch".bold().magenta(),
            "- Podcast Downloader".dimmed()
        );
    }

    let interactive = args.url.is_none() && console::user_attended();
    if args.url.is_none() && !interactive {
        return Err(ConfigError::MissingFeedUrl.into());
    }

    let mut options = RunOptions {
        mode: SelectionMode::from_parts(
            args.mode.map(ModeKind::from).unwrap_or_default(),
            args.count,
        )?,
        output_root: args.output.unwrap_or_else(default_output_root),
        retry: RetryPolicy {
            max_attempts: args.attempts,
            delay: Duration::from_secs(args.retry_delay),
        },
    };
    options.validate()?;

    let client = ReqwestClient::new().context("Failed to create HTTP client")?;
    let log = FileRunLog::new();

    let new_reporter = || -> SharedProgressReporter {
        if args.quiet {
            NoopReporter::shared()
        } else {
            Arc::new(IndicatifReporter::new())
        }
    };

    let result = match &args.url {
        Some(url) => run_url(&client, url, &options, &log, &new_reporter()).await,
        None => {
            let term = Term::stdout();
            let Some(source) = locate_interactively(&client, &term, &log).await? else {
                return Ok(());
            };
            if args.mode.is_none() && args.count.is_none() {
                options.mode = prompt::ask_mode(&term)?;
            }

            let reporter = new_reporter();
            reporter.report(ProgressEvent::FeedLocated {
                requested_url: source.requested_url.clone(),
                resolved_url: source.resolved_url.clone(),
            });
            run(&client, &source, &options, &log, &reporter).await
        }
    };

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            if let Some(path) = log.path() {
                eprintln!("{LOG}Log: {}", path.display());
            }
            return Err(e).context("Run failed");
        }
    };

    if !args.quiet {
        print_report(&report);
    }

    Ok(())
}
