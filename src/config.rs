//! Endpoints, timeouts and limits for the scan and snapshot clients

use std::time::Duration;

pub const DEFAULT_WIKI_API: &str = "https://en.wikipedia.org/w/api.php";
pub const DEFAULT_AVAILABILITY_API: &str = "https://archive.org/wayback/available";
pub const DEFAULT_SAVE_API: &str = "https://web.archive.org/save";

/// Stable client identity sent on every outbound request
pub const USER_AGENT: &str = concat!(
    "wikiref/",
    env!("CARGO_PKG_VERSION"),
    " (+https://github.com/royalbit/wikiref)"
);

/// Runtime configuration shared by all clients
#[derive(Debug, Clone)]
pub struct Config {
    pub user_agent: String,
    pub wiki_api: String,
    pub availability_api: String,
    /// Base URL; submissions POST here, polls GET `<base>/status/<job>`
    pub save_api: String,
    pub live_timeout: Duration,
    pub availability_timeout: Duration,
    pub submit_timeout: Duration,
    pub status_timeout: Duration,
    /// Deadline for a whole scan, wiki fetch included
    pub scan_timeout: Duration,
    pub max_links: usize,
    pub max_redirects: usize,
    /// Minimum spacing between snapshot submissions, process-wide
    pub save_interval: Duration,
    pub max_submit_urls: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_agent: USER_AGENT.to_string(),
            wiki_api: DEFAULT_WIKI_API.to_string(),
            availability_api: DEFAULT_AVAILABILITY_API.to_string(),
            save_api: DEFAULT_SAVE_API.to_string(),
            live_timeout: Duration::from_secs(8),
            availability_timeout: Duration::from_secs(8),
            submit_timeout: Duration::from_secs(30),
            status_timeout: Duration::from_secs(10),
            scan_timeout: Duration::from_secs(5 * 60),
            max_links: 50,
            max_redirects: 10,
            save_interval: Duration::from_secs(10),
            max_submit_urls: 10,
        }
    }
}

impl Config {
    /// Point every upstream API at one base URL (mock servers, mirrors)
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.wiki_api = format!("{}/w/api.php", base);
        self.availability_api = format!("{}/wayback/available", base);
        self.save_api = format!("{}/save", base);
        self
    }
}
