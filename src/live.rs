//! Live link probing
//!
//! HEAD first; servers that refuse HEAD (405/501) get a one-byte ranged GET.
//! Redirects are followed by the client, so a 3xx here means the chain was
//! cut short.

use crate::client::probe_client;
use crate::config::Config;
use reqwest::header::RANGE;
use reqwest::{Client, StatusCode};
use std::error::Error as StdError;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Why no HTTP response was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkError {
    Dns,
    Tls,
    Timeout,
    ConnectionRefused,
    ConnectionReset,
    Other,
}

impl std::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkError::Dns => write!(f, "DNS lookup failed"),
            NetworkError::Tls => write!(f, "TLS/certificate error"),
            NetworkError::Timeout => write!(f, "timeout"),
            NetworkError::ConnectionRefused => write!(f, "connection refused"),
            NetworkError::ConnectionReset => write!(f, "connection reset"),
            NetworkError::Other => write!(f, "network error"),
        }
    }
}

/// Human-readable classification of a probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveStatus {
    /// Any 2xx
    Ok,
    /// 403, possibly alive but blocking us
    Forbidden,
    /// 429, alive but throttled
    RateLimited,
    /// Other statuses, shown with their reason phrase
    Reason(String),
    Network(NetworkError),
}

impl std::fmt::Display for LiveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LiveStatus::Ok => write!(f, "OK"),
            LiveStatus::Forbidden => write!(f, "403 Forbidden"),
            LiveStatus::RateLimited => write!(f, "429 Rate Limited"),
            LiveStatus::Reason(reason) => write!(f, "{}", reason),
            LiveStatus::Network(err) => write!(f, "{}", err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveCheck {
    /// 0 when no response was obtained
    pub code: u16,
    pub status: LiveStatus,
}

impl LiveCheck {
    fn network(err: NetworkError) -> Self {
        Self {
            code: 0,
            status: LiveStatus::Network(err),
        }
    }

    fn response(code: StatusCode) -> Self {
        Self {
            code: code.as_u16(),
            status: classify_status(code),
        }
    }
}

/// `"404 Not Found"` style status line
pub fn reason_phrase(code: StatusCode) -> String {
    match code.canonical_reason() {
        Some(reason) => format!("{} {}", code.as_u16(), reason),
        None => code.as_u16().to_string(),
    }
}

pub fn classify_status(code: StatusCode) -> LiveStatus {
    match code.as_u16() {
        200..=299 => LiveStatus::Ok,
        403 => LiveStatus::Forbidden,
        429 => LiveStatus::RateLimited,
        _ => LiveStatus::Reason(reason_phrase(code)),
    }
}

/// Classify a transport error by the text of its source chain
pub fn classify_error_text(text: &str) -> NetworkError {
    let lower = text.to_lowercase();
    if lower.contains("no such host")
        || lower.contains("dns")
        || lower.contains("failed to lookup address")
        || lower.contains("name or service not known")
    {
        NetworkError::Dns
    } else if lower.contains("certificate") || lower.contains("tls") || lower.contains("ssl") {
        NetworkError::Tls
    } else if lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("deadline exceeded")
    {
        NetworkError::Timeout
    } else if lower.contains("connection refused") {
        NetworkError::ConnectionRefused
    } else if lower.contains("connection reset") {
        NetworkError::ConnectionReset
    } else {
        NetworkError::Other
    }
}

pub fn classify_error(err: reqwest::Error) -> NetworkError {
    if err.is_timeout() {
        return NetworkError::Timeout;
    }

    // Drop the URL so hostnames like "tls.example" cannot skew matching
    let err = err.without_url();
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    classify_error_text(&text)
}

/// Probes article links over HTTP
pub struct LiveChecker {
    client: Client,
    timeout: Duration,
}

impl LiveChecker {
    pub fn new(config: &Config) -> reqwest::Result<Self> {
        Ok(Self {
            client: probe_client(config)?,
            timeout: config.live_timeout,
        })
    }

    /// Per-call timeout, clipped to what is left before `deadline`
    fn call_timeout(&self, deadline: Instant) -> Option<Duration> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            None
        } else {
            Some(remaining.min(self.timeout))
        }
    }

    pub async fn check(&self, url: &str, deadline: Instant) -> LiveCheck {
        let Some(timeout) = self.call_timeout(deadline) else {
            return LiveCheck::network(NetworkError::Timeout);
        };

        let head = match self.client.head(url).timeout(timeout).send().await {
            Ok(resp) => LiveCheck::response(resp.status()),
            Err(e) => {
                debug!(url, error = %e, "HEAD failed");
                return LiveCheck::network(classify_error(e));
            }
        };
        debug!(url, code = head.code, status = %head.status, "HEAD response");

        if head.code != StatusCode::METHOD_NOT_ALLOWED.as_u16()
            && head.code != StatusCode::NOT_IMPLEMENTED.as_u16()
        {
            return head;
        }

        let Some(timeout) = self.call_timeout(deadline) else {
            return LiveCheck {
                code: head.code,
                status: LiveStatus::Network(NetworkError::Timeout),
            };
        };

        debug!(url, code = head.code, "HEAD refused, trying ranged GET");
        match self
            .client
            .get(url)
            .header(RANGE, "bytes=0-0")
            .timeout(timeout)
            .send()
            .await
        {
            Ok(resp) => {
                let check = LiveCheck::response(resp.status());
                debug!(url, code = check.code, status = %check.status, "GET response");
                check
            }
            Err(e) => {
                debug!(url, error = %e, "GET failed");
                LiveCheck {
                    code: head.code,
                    status: LiveStatus::Network(classify_error(e)),
                }
            }
        }
    }
}
