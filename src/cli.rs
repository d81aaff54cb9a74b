//! Shared pieces of the command-line front-end
//!
//! Output goes to stdout only; progress and logs go to stderr.

use crate::config::{Config, DEFAULT_AVAILABILITY_API, DEFAULT_SAVE_API, DEFAULT_WIKI_API};
use anyhow::Result;
use clap::{Args, ValueEnum};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Compact JSON, one document per line
    #[default]
    Json,
    Yaml,
}

/// Upstream endpoints, overridable for mirrors and local mocks
#[derive(Args, Debug, Clone)]
pub struct ApiArgs {
    /// MediaWiki API endpoint
    #[arg(long, env = "WIKIREF_WIKI_API", default_value = DEFAULT_WIKI_API)]
    pub wiki_api: String,

    /// Wayback availability endpoint
    #[arg(long, env = "WIKIREF_AVAILABILITY_API", default_value = DEFAULT_AVAILABILITY_API)]
    pub availability_api: String,

    /// Save Page Now base URL
    #[arg(long, env = "WIKIREF_SAVE_API", default_value = DEFAULT_SAVE_API)]
    pub save_api: String,
}

impl ApiArgs {
    pub fn config(&self) -> Config {
        Config {
            wiki_api: self.wiki_api.clone(),
            availability_api: self.availability_api.clone(),
            save_api: self.save_api.clone(),
            ..Config::default()
        }
    }
}

pub fn print_output<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

/// Token that fires on Ctrl-C
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received interrupt, cancelling");
            trigger.cancel();
        }
    });
    token
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
