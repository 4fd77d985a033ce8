// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The process-isolation boundary between the orchestrator and the code that
//! touches the network and the filesystem.
//!
//! All arguments and results cross as plain structured data; URLs travel as
//! absolute percent-escaped strings and raw feed bytes as hex.

mod proxy;
mod service;

pub use proxy::WorkerProxy;
pub use service::serve;

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::DownloadOptions;
use crate::episode::{DownloadedEpisode, Episode};
use crate::error::CheckError;
use crate::http::HttpClient;
use crate::pipeline::CheckPipeline;

/// A request to the worker, one of its three operations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WorkerRequest {
    CheckFeeds {
        feeds: Vec<crate::feed::Feed>,
        options: DownloadOptions,
        skip_urls: Vec<Url>,
    },
    DownloadEpisode {
        episode: Episode,
        options: DownloadOptions,
    },
    FetchFeedRaw {
        feed: crate::feed::Feed,
    },
}

/// The worker's reply to a single request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum WorkerReply {
    Episodes { episodes: Vec<DownloadedEpisode> },
    Episode { episode: DownloadedEpisode },
    FeedBytes { bytes_hex: String },
    Failed { error: CheckError },
}

/// The orchestrator's view of the worker.
///
/// Implemented by [`WorkerProxy`] (a real child process) and by
/// [`InProcessWorker`] (the pipeline called directly, for tests and
/// single-process use).
#[async_trait]
pub trait WorkerTransport: Send + Sync {
    async fn check_feeds(
        &self,
        feeds: Vec<crate::feed::Feed>,
        options: DownloadOptions,
        skip_urls: HashSet<Url>,
    ) -> Result<Vec<DownloadedEpisode>, CheckError>;

    async fn download_episode(
        &self,
        episode: Episode,
        options: DownloadOptions,
    ) -> Result<DownloadedEpisode, CheckError>;

    async fn fetch_feed_raw(&self, feed: crate::feed::Feed) -> Result<Vec<u8>, CheckError>;
}

/// Runs the pipeline in the calling process, without any isolation
pub struct InProcessWorker<C: HttpClient> {
    pipeline: CheckPipeline<C>,
}

impl<C: HttpClient> InProcessWorker<C> {
    pub fn new(client: C) -> Self {
        Self {
            pipeline: CheckPipeline::new(client),
        }
    }
}

#[async_trait]
impl<C: HttpClient> WorkerTransport for InProcessWorker<C> {
    async fn check_feeds(
        &self,
        feeds: Vec<crate::feed::Feed>,
        options: DownloadOptions,
        skip_urls: HashSet<Url>,
    ) -> Result<Vec<DownloadedEpisode>, CheckError> {
        self.pipeline.check_feeds(&feeds, &options, &skip_urls).await
    }

    async fn download_episode(
        &self,
        episode: Episode,
        options: DownloadOptions,
    ) -> Result<DownloadedEpisode, CheckError> {
        self.pipeline.download_episode(&episode, &options).await
    }

    async fn fetch_feed_raw(&self, feed: crate::feed::Feed) -> Result<Vec<u8>, CheckError> {
        self.pipeline
            .fetch_feed_raw(&feed)
            .await
            .map(|bytes| bytes.to_vec())
    }
}
