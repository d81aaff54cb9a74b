//! Scan and snapshot data model
//!
//! Everything here is plain data: built once by the pipeline and
//! serialized by the CLI.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A `<ref>` definition that contained at least one checkable URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// 1-based, in document order of definition
    pub number: usize,
    /// `name` attribute, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// URLs in extraction order, unique within the citation
    pub urls: Vec<String>,
}

/// Citations plus the lookups between citations, names and URLs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CitationIndex {
    pub citations: Vec<Citation>,
    /// URL -> citation numbers that mention it
    pub url_to_citations: BTreeMap<String, Vec<usize>>,
    /// ref name -> first assigned citation number
    pub name_to_number: BTreeMap<String, usize>,
}

impl CitationIndex {
    /// All distinct URLs, sorted
    pub fn unique_urls(&self) -> Vec<String> {
        self.url_to_citations.keys().cloned().collect()
    }

    /// Citation numbers referencing `url` (empty when unknown)
    pub fn citation_numbers(&self, url: &str) -> &[usize] {
        self.url_to_citations
            .get(url)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub(crate) fn push(&mut self, citation: Citation) {
        for url in &citation.urls {
            let numbers = self.url_to_citations.entry(url.clone()).or_default();
            if !numbers.contains(&citation.number) {
                numbers.push(citation.number);
            }
        }
        self.citations.push(citation);
    }

    /// Register a URL that is not tied to any citation
    pub(crate) fn insert_uncited(&mut self, url: String) {
        self.url_to_citations.entry(url).or_default();
    }
}

/// Outcome for one distinct URL of a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkResult {
    pub url: String,
    /// HTTP status, 0 when no response was obtained
    pub live_code: u16,
    pub live_status: String,
    pub archived: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_url: Option<String>,
    /// Snapshot status code, or the reason no snapshot was accepted
    pub archive_status: String,
    pub citation_numbers: Vec<usize>,
}

/// Full result of scanning one page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanReport {
    pub title: String,
    /// Distinct URLs found before the per-scan cap
    pub total_urls: usize,
    pub results: Vec<LinkResult>,
    pub citations: Vec<Citation>,
}

/// Capture job state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Success,
    Error,
}

impl JobStatus {
    /// Map an upstream status string; anything unknown is still in flight
    pub fn from_upstream(s: &str) -> Self {
        match s {
            "success" => JobStatus::Success,
            "error" => JobStatus::Error,
            _ => JobStatus::Pending,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Success => write!(f, "success"),
            JobStatus::Error => write!(f, "error"),
        }
    }
}

/// A capture request and what is known about it so far
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotJob {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SnapshotJob {
    pub fn failed(url: &str, error: impl std::fmt::Display) -> Self {
        Self {
            url: url.to_string(),
            job_id: None,
            status: JobStatus::Error,
            timestamp: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitReport {
    pub submitted: Vec<SnapshotJob>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_display() {
        assert_eq!(JobStatus::Pending.to_string(), "pending");
        assert_eq!(JobStatus::Success.to_string(), "success");
        assert_eq!(JobStatus::Error.to_string(), "error");
    }

    #[test]
    fn test_job_status_from_upstream() {
        assert_eq!(JobStatus::from_upstream("success"), JobStatus::Success);
        assert_eq!(JobStatus::from_upstream("error"), JobStatus::Error);
        assert_eq!(JobStatus::from_upstream("pending"), JobStatus::Pending);
        assert_eq!(JobStatus::from_upstream("queued"), JobStatus::Pending);
    }

    #[test]
    fn test_index_push_builds_reverse_map() {
        let mut index = CitationIndex::default();
        index.push(Citation {
            number: 1,
            name: None,
            urls: vec!["http://a".to_string(), "http://b".to_string()],
        });
        index.push(Citation {
            number: 3,
            name: Some("c".to_string()),
            urls: vec!["http://b".to_string()],
        });
        assert_eq!(index.citation_numbers("http://a"), &[1]);
        assert_eq!(index.citation_numbers("http://b"), &[1, 3]);
        assert!(index.citation_numbers("http://missing").is_empty());
        assert_eq!(index.unique_urls().len(), 2);
    }

    #[test]
    fn test_serialize_snapshot_job() {
        let job = SnapshotJob {
            url: "https://example.com".to_string(),
            job_id: Some("spn2-abc".to_string()),
            status: JobStatus::Pending,
            timestamp: None,
            error: None,
        };
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains(r#""status":"pending""#));
        assert!(json.contains(r#""job_id":"spn2-abc""#));
        // Optional fields should not appear when None
        assert!(!json.contains("timestamp"));
        assert!(!json.contains("error"));
    }

    #[test]
    fn test_serialize_link_result_yaml() {
        let result = LinkResult {
            url: "http://x".to_string(),
            live_code: 404,
            live_status: "404 Not Found".to_string(),
            archived: false,
            archive_url: None,
            archive_status: "not archived".to_string(),
            citation_numbers: vec![2],
        };
        let yaml = serde_yaml::to_string(&result).unwrap();
        assert!(yaml.contains("live_code: 404"));
        assert!(yaml.contains("archive_status: not archived"));
        assert!(!yaml.contains("archive_url"));
    }
}
