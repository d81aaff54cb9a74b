//! Error types for the citation source, the scan and snapshot submission
//!
//! Per-URL outcomes (dead links, rejected snapshots) are not errors; see
//! [`crate::live::LiveStatus`] and [`crate::wayback::ArchiveOutcome`].

use crate::rate_limit::WaitCancelled;
use crate::schema::ScanReport;
use thiserror::Error;

/// Failure to obtain article source from the wiki API.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("mediawiki api request: {0}")]
    Http(#[from] reqwest::Error),

    #[error("mediawiki api decode: {status}: {snippet}")]
    Decode { status: u16, snippet: String },

    #[error("mediawiki api error: {code}: {info}")]
    Api { code: String, info: String },

    #[error("invalid api url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Why a scan stopped before visiting every URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    DeadlineExceeded,
    Requested,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::DeadlineExceeded => write!(f, "deadline exceeded"),
            CancelReason::Requested => write!(f, "cancelled"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The partial report holds every result gathered before the stop.
    #[error("scan cancelled after {processed} links: {reason}")]
    Cancelled {
        reason: CancelReason,
        processed: usize,
        partial: Box<ScanReport>,
    },
}

impl ScanError {
    /// Results gathered before a cancellation, if any.
    pub fn partial(&self) -> Option<&ScanReport> {
        match self {
            ScanError::Cancelled { partial, .. } => Some(partial),
            ScanError::Source(_) => None,
        }
    }
}

/// Snapshot submission and status polling failures.
#[derive(Error, Debug)]
pub enum SaveError {
    #[error("credentials required")]
    MissingCredentials,

    #[error("no URLs provided")]
    NoUrls,

    #[error("rate limited, try again later")]
    RateLimited,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("SPN error: HTTP {0}")]
    Status(u16),

    #[error("invalid response from SPN")]
    InvalidResponse,

    #[error(transparent)]
    WaitCancelled(#[from] WaitCancelled),

    #[error("SPN request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid save url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("save endpoint cannot take a path: {0}")]
    InvalidEndpoint(String),
}
