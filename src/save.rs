//! Save Page Now: capture submissions and job status polls
//!
//! Submissions are paced by the shared [`RateLimiter`]; status polls are not.

use crate::cli::{cancel_on_ctrl_c, print_output, ApiArgs, OutputFormat};
use crate::client::api_client;
use crate::config::Config;
use crate::error::SaveError;
use crate::rate_limit::RateLimiter;
use crate::schema::{JobStatus, SnapshotJob, SubmitReport};
use anyhow::{Context, Result};
use clap::Args;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Access/secret key pair, passed through to the archive and never stored
#[derive(Clone)]
pub struct Credentials {
    access_key: String,
    secret_key: String,
}

impl Credentials {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Result<Self, SaveError> {
        let access_key = access_key.into();
        let secret_key = secret_key.into();
        if access_key.trim().is_empty() || secret_key.trim().is_empty() {
            return Err(SaveError::MissingCredentials);
        }
        Ok(Self {
            access_key,
            secret_key,
        })
    }

    fn authorization(&self) -> String {
        format!("LOW {}:{}", self.access_key, self.secret_key)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    job_id: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    timestamp: String,
}

#[derive(Debug, Default, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    original_url: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    job_id: String,
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Explicit status wins, then a job id means queued, then a timestamp
/// means already captured
fn derive_status(resp: &SubmitResponse) -> JobStatus {
    if !resp.status.is_empty() {
        JobStatus::from_upstream(&resp.status)
    } else if !resp.job_id.is_empty() {
        JobStatus::Pending
    } else if !resp.timestamp.is_empty() {
        JobStatus::Success
    } else {
        JobStatus::Pending
    }
}

pub struct SaveClient {
    client: Client,
    endpoint: String,
    submit_timeout: Duration,
    status_timeout: Duration,
    max_urls: usize,
    limiter: Arc<RateLimiter>,
}

impl SaveClient {
    pub fn new(config: &Config, limiter: Arc<RateLimiter>) -> reqwest::Result<Self> {
        Ok(Self {
            client: api_client(config)?,
            endpoint: config.save_api.clone(),
            submit_timeout: config.submit_timeout,
            status_timeout: config.status_timeout,
            max_urls: config.max_submit_urls,
            limiter,
        })
    }

    /// Submit URLs one after another. A failing URL is reported as an
    /// `error` job and does not stop the rest.
    pub async fn submit(
        &self,
        urls: &[String],
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> Result<SubmitReport, SaveError> {
        if urls.is_empty() {
            return Err(SaveError::NoUrls);
        }

        let mut report = SubmitReport::default();
        let batch = if urls.len() > self.max_urls {
            warn!(
                requested = urls.len(),
                limit = self.max_urls,
                "truncating submission batch"
            );
            report.errors.push(format!(
                "only the first {} of {} URLs were submitted",
                self.max_urls,
                urls.len()
            ));
            &urls[..self.max_urls]
        } else {
            urls
        };

        for url in batch {
            let job = match self.submit_one(url, credentials, cancel).await {
                Ok(job) => job,
                Err(e) => {
                    warn!(url = %url, error = %e, "submission failed");
                    SnapshotJob::failed(url, e)
                }
            };
            report.submitted.push(job);
        }

        Ok(report)
    }

    /// Submit one URL, waiting for the shared pacing gate first
    pub async fn submit_one(
        &self,
        url: &str,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> Result<SnapshotJob, SaveError> {
        self.limiter.wait(cancel).await?;

        info!(url, "submitting capture request");
        let response = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, credentials.authorization())
            .form(&[("url", url), ("capture_all", "1")])
            .timeout(self.submit_timeout)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        debug!(
            url,
            status = status.as_u16(),
            body = %String::from_utf8_lossy(&body),
            "submission response"
        );

        match status {
            StatusCode::TOO_MANY_REQUESTS => return Err(SaveError::RateLimited),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(SaveError::InvalidCredentials)
            }
            StatusCode::OK => {}
            other => return Err(SaveError::Status(other.as_u16())),
        }

        let mut job = SnapshotJob {
            url: url.to_string(),
            job_id: None,
            status: JobStatus::Pending,
            timestamp: None,
            error: None,
        };

        let parsed: SubmitResponse = match serde_json::from_slice(&body) {
            Ok(p) => p,
            Err(e) => {
                // Success responses are sometimes HTML
                debug!(url, error = %e, "non-JSON submission response");
                return Ok(job);
            }
        };

        job.status = derive_status(&parsed);
        if job.status == JobStatus::Error {
            job.error = non_empty(parsed.message);
        }
        job.job_id = non_empty(parsed.job_id);
        job.timestamp = non_empty(parsed.timestamp);

        info!(url, job_id = ?job.job_id, status = %job.status, "submitted");
        Ok(job)
    }

    fn status_url(&self, job_id: &str) -> Result<Url, SaveError> {
        let mut url = Url::parse(&self.endpoint)?;
        url.path_segments_mut()
            .map_err(|_| SaveError::InvalidEndpoint(self.endpoint.clone()))?
            .pop_if_empty()
            .push("status")
            .push(job_id);
        Ok(url)
    }

    /// Poll a capture job. Not paced.
    pub async fn status(&self, job_id: &str) -> Result<SnapshotJob, SaveError> {
        let url = self.status_url(job_id)?;
        debug!(%url, "checking capture status");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .timeout(self.status_timeout)
            .send()
            .await?;
        let body = response.bytes().await?;

        let parsed: StatusResponse =
            serde_json::from_slice(&body).map_err(|_| SaveError::InvalidResponse)?;

        let status = JobStatus::from_upstream(&parsed.status);
        let error = if status == JobStatus::Error {
            non_empty(parsed.message)
        } else {
            None
        };

        Ok(SnapshotJob {
            url: parsed.original_url,
            job_id: non_empty(parsed.job_id).or_else(|| Some(job_id.to_string())),
            status,
            timestamp: non_empty(parsed.timestamp),
            error,
        })
    }
}

#[derive(Args)]
pub struct SaveArgs {
    /// URLs to capture (at most 10 per call)
    #[arg(value_name = "URL", required = true)]
    pub urls: Vec<String>,

    /// Archive access key
    #[arg(long, env = "IA_ACCESS_KEY", hide_env_values = true)]
    pub access_key: Option<String>,

    /// Archive secret key
    #[arg(long, env = "IA_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    #[command(flatten)]
    pub api: ApiArgs,
}

const CREDENTIALS_HINT: &str = "Set --access-key/--secret-key or IA_ACCESS_KEY/IA_SECRET_KEY";

pub async fn run_save(args: SaveArgs) -> Result<()> {
    let credentials = Credentials::new(
        args.access_key.unwrap_or_default(),
        args.secret_key.unwrap_or_default(),
    )
    .context(CREDENTIALS_HINT)?;

    let config = args.api.config();
    let limiter = Arc::new(RateLimiter::new(config.save_interval));
    let client = SaveClient::new(&config, limiter).context("Failed to build HTTP client")?;

    let cancel = cancel_on_ctrl_c();
    for url in args.urls.iter().take(config.max_submit_urls) {
        eprintln!("  -> {}", url);
    }
    let report = client.submit(&args.urls, &credentials, &cancel).await?;
    print_output(&report, args.format)?;

    let jobs = &report.submitted;
    let failed = jobs
        .iter()
        .filter(|job| job.status == JobStatus::Error)
        .count();
    eprintln!("Done: {}/{} submitted", jobs.len() - failed, jobs.len());
    Ok(())
}

#[derive(Args)]
pub struct StatusArgs {
    /// Job id returned by `save`
    #[arg(value_name = "JOB_ID")]
    pub job_id: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    #[command(flatten)]
    pub api: ApiArgs,
}

pub async fn run_status(args: StatusArgs) -> Result<()> {
    let config = args.api.config();
    let limiter = Arc::new(RateLimiter::new(config.save_interval));
    let client = SaveClient::new(&config, limiter).context("Failed to build HTTP client")?;
    let job = client
        .status(&args.job_id)
        .await
        .with_context(|| format!("Status check for job {} failed", args.job_id))?;
    print_output(&job, args.format)
}
