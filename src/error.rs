use std::error::Error as StdError;
use std::path::PathBuf;

use thiserror::Error;

/// Failure while fetching a manifest, a branch reference or an artifact
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed")]
    Network {
        url: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("malformed response: {0}")]
    Parse(String),
    #[error("download I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    pub fn network(url: &str, source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Network {
            url: url.to_owned(),
            source: Box::new(source),
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid URL for '{field}': {url}")]
    InvalidUrl { field: &'static str, url: String },
}

#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("handoff I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("downloaded payload is empty: {}", .0.display())]
    EmptyPayload(PathBuf),
    #[error("failed to launch installer: {0}")]
    Installer(String),
}

/// Render an error with every `source()` below it, joined by `: `
pub fn chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut next = err.source();
    while let Some(cause) = next {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        next = cause.source();
    }
    out
}
