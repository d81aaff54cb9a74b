//! MediaWiki parse API: article source for a page title

use crate::client::api_client;
use crate::config::Config;
use crate::error::SourceError;
use crate::extract::{index_external_links, parse_citations};
use crate::schema::CitationIndex;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Longest body excerpt carried by a decode error
const SNIPPET_CHARS: usize = 240;

/// What to ask the wiki for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceMode {
    /// Article wikitext; URLs keep their citation numbers
    #[default]
    Wikitext,
    /// The parser's external-links list; no citation numbers
    ExternalLinks,
}

#[derive(Debug, Deserialize)]
struct ParseEnvelope<T> {
    parse: Option<T>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    info: String,
}

#[derive(Debug, Deserialize)]
struct WikitextParse {
    wikitext: Wikitext,
}

#[derive(Debug, Deserialize)]
struct Wikitext {
    #[serde(rename = "*")]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ExternalLinksParse {
    #[serde(default)]
    externallinks: Vec<String>,
}

fn snippet(body: &str) -> String {
    if body.chars().count() > SNIPPET_CHARS {
        let kept: String = body.chars().take(SNIPPET_CHARS).collect();
        format!("{}...", kept)
    } else {
        body.to_string()
    }
}

pub struct WikiSource {
    client: Client,
    endpoint: String,
}

impl WikiSource {
    pub fn new(config: &Config) -> reqwest::Result<Self> {
        Ok(Self {
            client: api_client(config)?,
            endpoint: config.wiki_api.clone(),
        })
    }

    async fn parse<T: DeserializeOwned>(
        &self,
        title: &str,
        prop: &str,
        timeout: Duration,
    ) -> Result<T, SourceError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("action", "parse"),
                ("page", title),
                ("prop", prop),
                ("redirects", "1"),
                ("format", "json"),
                ("origin", "*"),
            ])
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(title, status, bytes = body.len(), "mediawiki response");

        let envelope: ParseEnvelope<T> = match serde_json::from_str(&body) {
            Ok(e) => e,
            Err(e) => {
                warn!(title, status, error = %e, "mediawiki response did not decode");
                return Err(SourceError::Decode {
                    status,
                    snippet: snippet(&body),
                });
            }
        };

        if let Some(err) = envelope.error {
            return Err(SourceError::Api {
                code: err.code,
                info: err.info,
            });
        }

        envelope.parse.ok_or_else(|| SourceError::Decode {
            status,
            snippet: snippet(&body),
        })
    }

    pub async fn fetch_wikitext(
        &self,
        title: &str,
        timeout: Duration,
    ) -> Result<String, SourceError> {
        let parsed: WikitextParse = self.parse(title, "wikitext", timeout).await?;
        Ok(parsed.wikitext.content)
    }

    pub async fn fetch_external_links(
        &self,
        title: &str,
        timeout: Duration,
    ) -> Result<Vec<String>, SourceError> {
        let parsed: ExternalLinksParse = self.parse(title, "externallinks", timeout).await?;
        Ok(parsed.externallinks)
    }

    /// Fetch a page and index its URLs
    pub async fn citations(
        &self,
        title: &str,
        mode: SourceMode,
        timeout: Duration,
    ) -> Result<CitationIndex, SourceError> {
        let index = match mode {
            SourceMode::Wikitext => {
                let wikitext = self.fetch_wikitext(title, timeout).await?;
                info!(title, chars = wikitext.len(), "fetched wikitext");
                parse_citations(&wikitext)
            }
            SourceMode::ExternalLinks => {
                let links = self.fetch_external_links(title, timeout).await?;
                info!(title, links = links.len(), "fetched external links");
                index_external_links(&links)
            }
        };
        Ok(index)
    }
}
