// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};
use url::Url;

use crate::config::DownloadOptions;
use crate::episode::{DownloadedEpisode, Episode};
use crate::error::CheckError;

use super::{WorkerRequest, WorkerReply, WorkerTransport};

/// Proxy to the worker child process.
///
/// The worker is this same binary re-executed in `worker` mode, spoken to
/// over newline-delimited JSON on its stdin/stdout. Calls are serialized; a
/// broken connection fails the in-flight call with `ServiceCrashed`, signals
/// the out-of-band interruption channel, and is respawned lazily on the next
/// call.
pub struct WorkerProxy {
    program: PathBuf,
    connection: Mutex<Option<WorkerConnection>>,
    interruptions: mpsc::UnboundedSender<()>,
}

impl WorkerProxy {
    /// Proxy to the current executable re-run in worker mode
    pub fn spawn() -> std::io::Result<(Self, mpsc::UnboundedReceiver<()>)> {
        let program = std::env::current_exe()?;
        Ok(Self::with_program(program))
    }

    pub fn with_program(program: PathBuf) -> (Self, mpsc::UnboundedReceiver<()>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let proxy = Self {
            program,
            connection: Mutex::new(None),
            interruptions: tx,
        };

        (proxy, rx)
    }

    async fn call(&self, request: WorkerRequest) -> Result<WorkerReply, CheckError> {
        let mut guard = self.connection.lock().await;

        if guard.is_none() {
            match WorkerConnection::spawn(&self.program) {
                Ok(connection) => *guard = Some(connection),
                Err(e) => {
                    warn!("failed to spawn worker: {e}");
                    let _ = self.interruptions.send(());
                    return Err(CheckError::ServiceCrashed);
                }
            }
        }

        let connection = guard.as_mut().expect("connection was just established");

        match connection.round_trip(&request).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                warn!("worker connection interrupted: {e}");
                *guard = None;
                let _ = self.interruptions.send(());
                Err(CheckError::ServiceCrashed)
            }
        }
    }
}

struct WorkerConnection {
    // Held so the child is killed when the connection is dropped
    _child: Child,
    stdin: ChildStdin,
    replies: Lines<BufReader<ChildStdout>>,
}

impl WorkerConnection {
    fn spawn(program: &PathBuf) -> std::io::Result<Self> {
        debug!(program = %program.display(), "spawning worker process");

        let mut child = Command::new(program)
            .arg("worker")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take().expect("worker stdin is piped");
        let stdout = child.stdout.take().expect("worker stdout is piped");

        Ok(Self {
            _child: child,
            stdin,
            replies: BufReader::new(stdout).lines(),
        })
    }

    async fn round_trip(&mut self, request: &WorkerRequest) -> std::io::Result<WorkerReply> {
        let mut json = serde_json::to_vec(request).map_err(std::io::Error::other)?;
        json.push(b'\n');

        self.stdin.write_all(&json).await?;
        self.stdin.flush().await?;

        let line = self
            .replies
            .next_line()
            .await?
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::UnexpectedEof))?;

        serde_json::from_str(&line).map_err(std::io::Error::other)
    }
}

#[async_trait]
impl WorkerTransport for WorkerProxy {
    async fn check_feeds(
        &self,
        feeds: Vec<crate::feed::Feed>,
        options: DownloadOptions,
        skip_urls: HashSet<Url>,
    ) -> Result<Vec<DownloadedEpisode>, CheckError> {
        let request = WorkerRequest::CheckFeeds {
            feeds,
            options,
            skip_urls: skip_urls.into_iter().collect(),
        };

        match self.call(request).await? {
            WorkerReply::Episodes { episodes } => Ok(episodes),
            WorkerReply::Failed { error } => Err(error),
            other => bad_reply(other),
        }
    }

    async fn download_episode(
        &self,
        episode: Episode,
        options: DownloadOptions,
    ) -> Result<DownloadedEpisode, CheckError> {
        let request = WorkerRequest::DownloadEpisode { episode, options };

        match self.call(request).await? {
            WorkerReply::Episode { episode } => Ok(episode),
            WorkerReply::Failed { error } => Err(error),
            other => bad_reply(other),
        }
    }

    async fn fetch_feed_raw(&self, feed: crate::feed::Feed) -> Result<Vec<u8>, CheckError> {
        let request = WorkerRequest::FetchFeedRaw { feed };

        match self.call(request).await? {
            WorkerReply::FeedBytes { bytes_hex } => hex::decode(&bytes_hex).map_err(|e| {
                warn!("undecodable feed bytes from worker: {e}");
                CheckError::ServiceCrashed
            }),
            WorkerReply::Failed { error } => Err(error),
            other => bad_reply(other),
        }
    }
}

fn bad_reply<T>(reply: WorkerReply) -> Result<T, CheckError> {
    warn!(?reply, "mismatched worker reply");
    Err(CheckError::ServiceCrashed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[tokio::test]
    async fn dead_worker_fails_the_call_and_signals_interruption() {
        // A program that exits immediately stands in for a crashed worker
        let (proxy, mut interruptions) = WorkerProxy::with_program(PathBuf::from("/bin/false"));

        let feed = crate::feed::Feed::new(
            "Test",
            Url::parse("http://example.com/feed.xml").unwrap(),
        );

        let result = proxy.fetch_feed_raw(feed).await;

        assert_eq!(result, Err(CheckError::ServiceCrashed));
        assert!(interruptions.try_recv().is_ok());
    }
}
