//! HTTP client construction

use crate::config::Config;
use reqwest::redirect::{Attempt, Policy};
use reqwest::Client;

/// Client for API calls (wiki, availability, save). Timeouts are set per
/// request.
pub fn api_client(config: &Config) -> reqwest::Result<Client> {
    Client::builder().user_agent(&config.user_agent).build()
}

/// Client for probing article links.
///
/// Follows up to `max_redirects` hops, then hands back the last 3xx
/// response instead of failing.
pub fn probe_client(config: &Config) -> reqwest::Result<Client> {
    let max = config.max_redirects;
    Client::builder()
        .user_agent(&config.user_agent)
        .redirect(Policy::custom(move |attempt: Attempt| {
            if attempt.previous().len() >= max {
                attempt.stop()
            } else {
                attempt.follow()
            }
        }))
        .build()
}
