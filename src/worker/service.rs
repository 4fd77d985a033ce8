// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use url::Url;

use crate::http::{HttpClient, ReqwestClient};
use crate::pipeline::CheckPipeline;

use super::{WorkerReply, WorkerRequest};

/// Worker-side serve loop: newline-delimited JSON requests on stdin, one
/// reply per request on stdout. Exits cleanly when stdin closes.
pub async fn serve() -> std::io::Result<()> {
    let pipeline = CheckPipeline::new(ReqwestClient::new());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    info!("worker ready");

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let request: WorkerRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                warn!("discarding malformed worker request: {e}");
                continue;
            }
        };

        let reply = handle_request(&pipeline, request).await;

        let mut json = serde_json::to_vec(&reply).map_err(std::io::Error::other)?;
        json.push(b'\n');
        stdout.write_all(&json).await?;
        stdout.flush().await?;
    }

    info!("worker input closed, shutting down");

    Ok(())
}

/// Dispatch one request to the pipeline
pub async fn handle_request<C: HttpClient>(
    pipeline: &CheckPipeline<C>,
    request: WorkerRequest,
) -> WorkerReply {
    match request {
        WorkerRequest::CheckFeeds {
            feeds,
            options,
            skip_urls,
        } => {
            let skip: HashSet<Url> = skip_urls.into_iter().collect();
            match pipeline.check_feeds(&feeds, &options, &skip).await {
                Ok(episodes) => WorkerReply::Episodes { episodes },
                Err(error) => WorkerReply::Failed { error },
            }
        }

        WorkerRequest::DownloadEpisode { episode, options } => {
            match pipeline.download_episode(&episode, &options).await {
                Ok(episode) => WorkerReply::Episode { episode },
                Err(error) => WorkerReply::Failed { error },
            }
        }

        WorkerRequest::FetchFeedRaw { feed } => match pipeline.fetch_feed_raw(&feed).await {
            Ok(bytes) => WorkerReply::FeedBytes {
                bytes_hex: hex::encode(bytes),
            },
            Err(error) => WorkerReply::Failed { error },
        },
    }
}
