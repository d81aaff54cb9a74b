//! Wayback availability lookups
//!
//! The availability API accepts a `statuscodes` filter but it drops valid
//! results in practice, so it is never sent. Snapshot status is checked
//! here instead.

use crate::archive::is_valid_archive_timestamp;
use crate::client::api_client;
use crate::config::Config;
use crate::live::reason_phrase;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Snapshot statuses worth linking to
const ACCEPTED_SNAPSHOT_STATUSES: &[&str] = &["200", "203", "206"];

#[derive(Debug, Default, Deserialize)]
struct AvailabilityResponse {
    #[serde(default)]
    archived_snapshots: ArchivedSnapshots,
}

#[derive(Debug, Default, Deserialize)]
struct ArchivedSnapshots {
    #[serde(default)]
    closest: Option<Snapshot>,
}

/// Closest snapshot as reported upstream
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub status: String,
}

/// Why a snapshot was not accepted. Valid negative answers, not failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NotArchived,
    InvalidTimestamp,
    BadStatus(String),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::NotArchived => write!(f, "not archived"),
            Rejection::InvalidTimestamp => write!(f, "invalid archive timestamp"),
            Rejection::BadStatus(status) => write!(f, "snapshot has bad status: {}", status),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Archived { url: String, status: String },
    Rejected(Rejection),
    /// The lookup itself failed; says nothing about archive coverage
    CheckFailed(String),
}

impl ArchiveOutcome {
    pub fn is_archived(&self) -> bool {
        matches!(self, ArchiveOutcome::Archived { .. })
    }

    pub fn archive_url(&self) -> Option<&str> {
        match self {
            ArchiveOutcome::Archived { url, .. } => Some(url),
            _ => None,
        }
    }

    /// Snapshot status for accepted snapshots, otherwise the reason
    pub fn status_text(&self) -> String {
        match self {
            ArchiveOutcome::Archived { status, .. } => status.clone(),
            ArchiveOutcome::Rejected(rejection) => rejection.to_string(),
            ArchiveOutcome::CheckFailed(reason) => reason.clone(),
        }
    }
}

/// Decide whether a reported snapshot is usable
pub fn evaluate_snapshot(snapshot: &Snapshot) -> ArchiveOutcome {
    if !snapshot.available || snapshot.url.is_empty() {
        return ArchiveOutcome::Rejected(Rejection::NotArchived);
    }
    if !is_valid_archive_timestamp(&snapshot.timestamp) {
        return ArchiveOutcome::Rejected(Rejection::InvalidTimestamp);
    }
    if !ACCEPTED_SNAPSHOT_STATUSES.contains(&snapshot.status.as_str()) {
        return ArchiveOutcome::Rejected(Rejection::BadStatus(snapshot.status.clone()));
    }
    ArchiveOutcome::Archived {
        url: snapshot.url.clone(),
        status: snapshot.status.clone(),
    }
}

/// Client for the availability API
pub struct WaybackClient {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl WaybackClient {
    pub fn new(config: &Config) -> reqwest::Result<Self> {
        Ok(Self {
            client: api_client(config)?,
            endpoint: config.availability_api.clone(),
            timeout: config.availability_timeout,
        })
    }

    /// Look up the closest snapshot of `url`
    pub async fn lookup(&self, url: &str, deadline: Instant) -> ArchiveOutcome {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return ArchiveOutcome::CheckFailed("error: deadline exceeded".to_string());
        }

        debug!(url, "checking availability");
        let response = match self
            .client
            .get(&self.endpoint)
            .query(&[("url", url)])
            .timeout(remaining.min(self.timeout))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(url, error = %e, "availability request failed");
                return ArchiveOutcome::CheckFailed(format!("error: {}", e.without_url()));
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            warn!(
                url,
                status = status.as_u16(),
                "availability check returned non-OK"
            );
            return ArchiveOutcome::CheckFailed(format!("HTTP {}", reason_phrase(status)));
        }

        let body = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                warn!(url, error = %e, "availability body read failed");
                return ArchiveOutcome::CheckFailed("read error".to_string());
            }
        };

        let parsed: AvailabilityResponse = match serde_json::from_slice(&body) {
            Ok(p) => p,
            Err(e) => {
                warn!(url, error = %e, "availability decode failed");
                return ArchiveOutcome::CheckFailed(format!("decode error: {}", e));
            }
        };

        let snapshot = parsed.archived_snapshots.closest.unwrap_or_default();
        let outcome = evaluate_snapshot(&snapshot);
        debug!(
            url,
            available = snapshot.available,
            timestamp = %snapshot.timestamp,
            snapshot_status = %snapshot.status,
            outcome = %outcome.status_text(),
            "availability result"
        );
        outcome
    }
}
