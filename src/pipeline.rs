// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;

use bytes::Bytes;
use tracing::{debug, info};
use url::Url;

use crate::config::DownloadOptions;
use crate::episode::{DownloadedEpisode, Episode, EpisodeDownloader};
use crate::error::{CheckError, FeedError};
use crate::feed::{Feed, fetch_feed_bytes, parse_feed};
use crate::http::HttpClient;

/// The feed-to-downloads pipeline. Runs inside the worker process.
///
/// For each feed in turn: fetch fresh bytes, parse, drop episodes whose URL
/// was already downloaded, and run the remainder through the episode
/// downloader in feed order. A failing episode download aborts the rest of
/// the batch; files already written stay on disk.
pub struct CheckPipeline<C: HttpClient> {
    client: C,
}

impl<C: HttpClient> CheckPipeline<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub async fn check_feeds(
        &self,
        feeds: &[Feed],
        options: &DownloadOptions,
        skip_urls: &HashSet<Url>,
    ) -> Result<Vec<DownloadedEpisode>, CheckError> {
        let mut downloaded = Vec::new();

        for feed in feeds {
            info!(feed = %feed.url, "checking feed");

            let bytes = fetch_feed_bytes(&self.client, feed)
                .await
                .map_err(|e| CheckError::feed_download(&feed.url, &e))?;

            let episodes = match parse_feed(&bytes, feed) {
                Ok(episodes) => episodes,
                Err(e @ FeedError::ParseFailed(_)) => {
                    return Err(CheckError::feed_parse(&feed.url, &e));
                }
                Err(e) => return Err(CheckError::feed_download(&feed.url, &e)),
            };

            let new_episodes: Vec<Episode> = episodes
                .into_iter()
                .filter(|episode| !skip_urls.contains(&episode.url))
                .collect();

            if new_episodes.is_empty() {
                debug!(feed = %feed.url, "no new episodes");
                continue;
            }

            info!(feed = %feed.url, count = new_episodes.len(), "downloading new episodes");

            let downloader = EpisodeDownloader::new(&self.client, options);
            for episode in &new_episodes {
                let result = downloader
                    .download(episode)
                    .await
                    .map_err(|e| CheckError::episode_download(&episode.title, &e))?;
                downloaded.push(result);
            }
        }

        Ok(downloaded)
    }

    /// Download one episode directly, bypassing feed fetch and history
    /// filtering. Used for "download again" requests.
    pub async fn download_episode(
        &self,
        episode: &Episode,
        options: &DownloadOptions,
    ) -> Result<DownloadedEpisode, CheckError> {
        let downloader = EpisodeDownloader::new(&self.client, options);

        downloader
            .download(episode)
            .await
            .map_err(|e| CheckError::episode_download(&episode.title, &e))
    }

    /// Fetch a feed's raw bytes, for preview/inspection only
    pub async fn fetch_feed_raw(&self, feed: &Feed) -> Result<Bytes, CheckError> {
        fetch_feed_bytes(&self.client, feed)
            .await
            .map_err(|e| CheckError::feed_download(&feed.url, &e))
    }
}
