//! wikiref: citation link auditing for wiki articles
//!
//! Commands:
//! - scan: check every cited link of an article, live and archived
//! - check: check one URL
//! - extract: parse citations from a local wikitext file
//! - save: request archive captures
//! - status: poll a capture job

pub mod archive;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod live;
pub mod rate_limit;
pub mod save;
pub mod scan;
pub mod schema;
pub mod wayback;
pub mod wiki;

pub use archive::{is_archive_url, is_valid_archive_timestamp};
pub use config::Config;
pub use error::{CancelReason, SaveError, ScanError, SourceError};
pub use extract::parse_citations;
pub use live::{LiveCheck, LiveChecker, LiveStatus};
pub use rate_limit::RateLimiter;
pub use save::{Credentials, SaveClient};
pub use scan::{ProgressCallback, ScanPhase, Scanner};
pub use schema::{
    Citation, CitationIndex, JobStatus, LinkResult, ScanReport, SnapshotJob, SubmitReport,
};
pub use wayback::{ArchiveOutcome, WaybackClient};
pub use wiki::{SourceMode, WikiSource};
