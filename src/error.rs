use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when fetching or parsing feeds
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to fetch feed from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Feed fetch for {url} returned HTTP {status}")]
    FetchStatus { url: String, status: u16 },

    #[error("Failed to parse feed as RSS or Atom: {0}")]
    ParseFailed(#[from] rss::Error),
}

/// Errors that can occur while downloading a single episode
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP request failed for {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    BadStatus { url: String, status: u16 },

    #[error("Download path exists but is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize magnet bookmark: {0}")]
    SerializeFailed(#[from] serde_json::Error),
}

/// Reasons the persisted configuration is unusable for a check.
///
/// Any of these turns the whole check into a skip, never a failure.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No feeds configured")]
    NoFeeds,

    #[error("Invalid feed URL: {0}")]
    InvalidFeedUrl(String),

    #[error("Download directory does not exist: {0}")]
    SavePathMissing(PathBuf),

    #[error("Download path is not a directory: {0}")]
    SavePathNotADirectory(PathBuf),

    #[error("Download directory is not writable: {0}")]
    SavePathNotWritable(PathBuf),

    #[error("Download script is enabled but not usable: {0}")]
    BadScript(PathBuf),
}

/// Errors that can occur while loading or persisting download history
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Failed to read history file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse history file {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write history file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The outcome of a failed check, as recorded in `LastCheckStatus::Failed`.
///
/// This error crosses the worker boundary as plain data, so the underlying
/// causes are flattened to strings when the richer per-layer errors are
/// converted at the worker side.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckError {
    #[error("Could not download feed {url}: {reason}")]
    FeedDownloadFailed { url: String, reason: String },

    #[error("Could not parse feed {url}: {reason}")]
    FeedParseFailed { url: String, reason: String },

    #[error("Could not download episode '{title}': {reason}")]
    EpisodeDownloadFailed { title: String, reason: String },

    #[error("Worker service crashed")]
    ServiceCrashed,
}

impl CheckError {
    pub fn feed_download(url: &url::Url, source: &FeedError) -> Self {
        CheckError::FeedDownloadFailed {
            url: url.to_string(),
            reason: source.to_string(),
        }
    }

    pub fn feed_parse(url: &url::Url, source: &FeedError) -> Self {
        CheckError::FeedParseFailed {
            url: url.to_string(),
            reason: source.to_string(),
        }
    }

    pub fn episode_download(title: &str, source: &DownloadError) -> Self {
        CheckError::EpisodeDownloadFailed {
            title: title.to_string(),
            reason: source.to_string(),
        }
    }
}
