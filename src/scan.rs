//! scan and check commands: audit the links of one article
//!
//! A scan fetches the article, indexes its citations, then walks the sorted
//! URL set one link at a time: archive links are reported as-is, everything
//! else gets a live probe and an availability lookup. The deadline and the
//! cancellation token are checked between links, never mid-probe.

use crate::archive::is_archive_url;
use crate::cli::{cancel_on_ctrl_c, print_output, truncate, ApiArgs, OutputFormat};
use crate::config::Config;
use crate::error::{CancelReason, ScanError};
use crate::live::LiveChecker;
use crate::schema::{LinkResult, ScanReport};
use crate::wayback::WaybackClient;
use crate::wiki::{SourceMode, WikiSource};
use anyhow::{Context, Result};
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const ARCHIVE_SKIPPED: &str = "archive URL (skipped)";
pub const IS_ARCHIVE: &str = "is archive";

/// Where a scan is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanPhase {
    FetchingSource { title: String },
    ParsingCitations { total_urls: usize, to_check: usize },
    CheckingLink {
        index: usize,
        total: usize,
        url: String,
    },
    SkippedArchive {
        index: usize,
        total: usize,
        url: String,
    },
    Done { processed: usize },
    Cancelled {
        processed: usize,
        reason: CancelReason,
    },
    Failed { error: String },
}

impl std::fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanPhase::FetchingSource { title } => write!(f, "fetching {}", title),
            ScanPhase::ParsingCitations {
                total_urls,
                to_check,
            } => {
                write!(f, "found {} URLs, checking {}", total_urls, to_check)
            }
            ScanPhase::CheckingLink { index, total, url } => {
                write!(f, "[{}/{}] {}", index + 1, total, url)
            }
            ScanPhase::SkippedArchive { index, total, url } => {
                write!(f, "[{}/{}] {} (archive, skipped)", index + 1, total, url)
            }
            ScanPhase::Done { processed } => write!(f, "done: {} links", processed),
            ScanPhase::Cancelled { processed, reason } => {
                write!(f, "{} after {} links", reason, processed)
            }
            ScanPhase::Failed { error } => write!(f, "failed: {}", error),
        }
    }
}

/// Progress callback invoked on every phase change
pub type ProgressCallback = Arc<dyn Fn(&ScanPhase) + Send + Sync>;

pub struct Scanner {
    source: WikiSource,
    live: LiveChecker,
    wayback: WaybackClient,
    scan_timeout: Duration,
    max_links: usize,
    mode: SourceMode,
    progress: Option<ProgressCallback>,
}

impl Scanner {
    pub fn new(config: &Config) -> reqwest::Result<Self> {
        Ok(Self {
            source: WikiSource::new(config)?,
            live: LiveChecker::new(config)?,
            wayback: WaybackClient::new(config)?,
            scan_timeout: config.scan_timeout,
            max_links: config.max_links,
            mode: SourceMode::default(),
            progress: None,
        })
    }

    pub fn with_mode(mut self, mode: SourceMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    fn report(&self, phase: ScanPhase) {
        if let Some(ref callback) = self.progress {
            callback(&phase);
        }
    }

    /// Why the loop must stop now, if it must
    fn stop_reason(cancel: &CancellationToken, deadline: Instant) -> Option<CancelReason> {
        if cancel.is_cancelled() {
            Some(CancelReason::Requested)
        } else if Instant::now() >= deadline {
            Some(CancelReason::DeadlineExceeded)
        } else {
            None
        }
    }

    fn cancelled(&self, reason: CancelReason, report: ScanReport) -> ScanError {
        let processed = report.results.len();
        warn!(title = %report.title, processed, %reason, "scan stopped early");
        self.report(ScanPhase::Cancelled { processed, reason });
        ScanError::Cancelled {
            reason,
            processed,
            partial: Box::new(report),
        }
    }

    /// Scan every cited link of `title`
    pub async fn scan(
        &self,
        title: &str,
        cancel: &CancellationToken,
    ) -> Result<ScanReport, ScanError> {
        let deadline = Instant::now() + self.scan_timeout;
        let mut report = ScanReport {
            title: title.to_string(),
            ..ScanReport::default()
        };

        if let Some(reason) = Self::stop_reason(cancel, deadline) {
            return Err(self.cancelled(reason, report));
        }

        self.report(ScanPhase::FetchingSource {
            title: title.to_string(),
        });
        let fetch_timeout = deadline.saturating_duration_since(Instant::now());
        let index = tokio::select! {
            fetched = self.source.citations(title, self.mode, fetch_timeout) => match fetched {
                Ok(index) => index,
                Err(e) => {
                    warn!(title, error = %e, "citation source failed");
                    self.report(ScanPhase::Failed { error: e.to_string() });
                    return Err(e.into());
                }
            },
            _ = cancel.cancelled() => {
                return Err(self.cancelled(CancelReason::Requested, report));
            }
        };

        let mut urls = index.unique_urls();
        urls.sort();
        report.total_urls = urls.len();
        urls.truncate(self.max_links);
        info!(
            title,
            total_urls = report.total_urls,
            checking = urls.len(),
            "citations indexed"
        );
        self.report(ScanPhase::ParsingCitations {
            total_urls: report.total_urls,
            to_check: urls.len(),
        });

        let total = urls.len();
        for (i, url) in urls.iter().enumerate() {
            if let Some(reason) = Self::stop_reason(cancel, deadline) {
                report.citations = index.citations;
                return Err(self.cancelled(reason, report));
            }

            if is_archive_url(url) {
                self.report(ScanPhase::SkippedArchive {
                    index: i,
                    total,
                    url: url.clone(),
                });
            } else {
                self.report(ScanPhase::CheckingLink {
                    index: i,
                    total,
                    url: url.clone(),
                });
            }

            let mut result = self.check_url(url, deadline).await;
            result.citation_numbers = index.citation_numbers(url).to_vec();
            report.results.push(result);
        }

        report.citations = index.citations;
        info!(title, processed = report.results.len(), "scan finished");
        self.report(ScanPhase::Done {
            processed: report.results.len(),
        });
        Ok(report)
    }

    /// Live status and archive coverage of one URL, without citation numbers
    pub async fn check_url(&self, url: &str, deadline: Instant) -> LinkResult {
        if is_archive_url(url) {
            return LinkResult {
                url: url.to_string(),
                live_code: 0,
                live_status: ARCHIVE_SKIPPED.to_string(),
                archived: true,
                archive_url: Some(url.to_string()),
                archive_status: IS_ARCHIVE.to_string(),
                citation_numbers: Vec::new(),
            };
        }

        let live = self.live.check(url, deadline).await;
        let archive = self.wayback.lookup(url, deadline).await;
        LinkResult {
            url: url.to_string(),
            live_code: live.code,
            live_status: live.status.to_string(),
            archived: archive.is_archived(),
            archive_url: archive.archive_url().map(str::to_string),
            archive_status: archive.status_text(),
            citation_numbers: Vec::new(),
        }
    }
}

#[derive(Args)]
pub struct ScanArgs {
    /// Article title, e.g. "Rust (programming language)"
    #[arg(value_name = "TITLE")]
    pub title: String,

    /// Read ref tags from wikitext, or use the parser's external-links list
    #[arg(long, value_enum, default_value_t = SourceMode::Wikitext)]
    pub mode: SourceMode,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Maximum links to check (sorted, first N)
    #[arg(long, default_value = "50")]
    pub max_links: usize,

    /// Whole-scan deadline in seconds
    #[arg(long, default_value = "300")]
    pub timeout: u64,

    #[command(flatten)]
    pub api: ApiArgs,
}

pub async fn run_scan(args: ScanArgs) -> Result<()> {
    let config = Config {
        max_links: args.max_links,
        scan_timeout: Duration::from_secs(args.timeout),
        ..args.api.config()
    };

    let progress: ProgressCallback = Arc::new(|phase: &ScanPhase| match phase {
        ScanPhase::CheckingLink { url, .. } | ScanPhase::SkippedArchive { url, .. } => {
            eprintln!("  -> {}", truncate(url, 60));
        }
        ScanPhase::FetchingSource { .. } | ScanPhase::ParsingCitations { .. } => {
            eprintln!("{}", phase);
        }
        ScanPhase::Done { .. } | ScanPhase::Cancelled { .. } | ScanPhase::Failed { .. } => {}
    });
    let scanner = Scanner::new(&config)
        .context("Failed to build HTTP clients")?
        .with_mode(args.mode)
        .with_progress_callback(progress);

    let cancel = cancel_on_ctrl_c();
    match scanner.scan(&args.title, &cancel).await {
        Ok(report) => {
            let results = &report.results;
            let alive = results.iter().filter(|r| r.live_status == "OK").count();
            let archived = results.iter().filter(|r| r.archived).count();
            print_output(&report, args.format)?;
            eprintln!(
                "Done: {}/{} OK, {} archived",
                alive,
                results.len(),
                archived
            );
            Ok(())
        }
        Err(err) => {
            if let Some(partial) = err.partial() {
                print_output(partial, args.format)?;
            }
            Err(err).with_context(|| format!("Scan of {:?} failed", args.title))
        }
    }
}

#[derive(Args)]
pub struct CheckArgs {
    /// URL to probe
    #[arg(value_name = "URL")]
    pub url: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    #[command(flatten)]
    pub api: ApiArgs,
}

/// Time a single-URL check may take: HEAD, a possible ranged GET, then the lookup
fn check_budget(config: &Config) -> Duration {
    config.live_timeout * 2 + config.availability_timeout
}

pub async fn run_check(args: CheckArgs) -> Result<()> {
    let config = args.api.config();
    let scanner = Scanner::new(&config).context("Failed to build HTTP clients")?;
    let deadline = Instant::now() + check_budget(&config);
    eprintln!("  -> {}", truncate(&args.url, 60));
    let result = scanner.check_url(&args.url, deadline).await;
    print_output(&result, args.format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn unreachable_config() -> Config {
        Config::default().with_base_url("http://127.0.0.1:1")
    }

    #[test]
    fn test_phase_display() {
        let phase = ScanPhase::CheckingLink {
            index: 0,
            total: 3,
            url: "http://x".to_string(),
        };
        assert_eq!(phase.to_string(), "[1/3] http://x");
        let phase = ScanPhase::Cancelled {
            processed: 2,
            reason: CancelReason::DeadlineExceeded,
        };
        assert_eq!(phase.to_string(), "deadline exceeded after 2 links");
    }

    #[tokio::test]
    async fn test_check_url_skips_archive_links() {
        let scanner = Scanner::new(&unreachable_config()).unwrap();
        let url = "https://web.archive.org/web/20200101000000/http://x";
        let result = scanner
            .check_url(url, Instant::now() + Duration::from_secs(5))
            .await;
        assert_eq!(result.live_code, 0);
        assert_eq!(result.live_status, ARCHIVE_SKIPPED);
        assert!(result.archived);
        assert_eq!(result.archive_url.as_deref(), Some(url));
        assert_eq!(result.archive_status, IS_ARCHIVE);
    }

    #[test]
    fn test_check_budget_covers_get_fallback() {
        let config = Config::default();
        assert_eq!(check_budget(&config), Duration::from_secs(24));

        let config = Config {
            live_timeout: Duration::from_secs(3),
            availability_timeout: Duration::from_secs(5),
            ..Config::default()
        };
        assert_eq!(check_budget(&config), Duration::from_secs(11));
    }

    #[tokio::test]
    async fn test_scan_cancelled_before_fetch() {
        let phases = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&phases);
        let scanner = Scanner::new(&unreachable_config())
            .unwrap()
            .with_progress_callback(Arc::new(move |p: &ScanPhase| {
                seen.lock().unwrap().push(p.clone());
            }));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = scanner.scan("Anything", &cancel).await.unwrap_err();
        match &err {
            ScanError::Cancelled {
                reason, processed, ..
            } => {
                assert_eq!(*reason, CancelReason::Requested);
                assert_eq!(*processed, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.partial().map(|r| r.title.as_str()), Some("Anything"));
        assert_eq!(
            phases.lock().unwrap().as_slice(),
            &[ScanPhase::Cancelled {
                processed: 0,
                reason: CancelReason::Requested
            }]
        );
    }

    #[tokio::test]
    async fn test_zero_deadline_cancels_immediately() {
        let config = Config {
            scan_timeout: Duration::ZERO,
            ..unreachable_config()
        };
        let scanner = Scanner::new(&config).unwrap();
        let err = scanner
            .scan("Anything", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScanError::Cancelled {
                reason: CancelReason::DeadlineExceeded,
                ..
            }
        ));
    }
}
