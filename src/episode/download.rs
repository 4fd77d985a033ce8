// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use serde_json::json;
use tracing::{debug, info};

use crate::config::DownloadOptions;
use crate::error::DownloadError;
use crate::http::HttpClient;

use super::filename::{sanitized_file_name, torrent_file_name, webloc_file_name};
use super::{DownloadedEpisode, Episode};

/// Downloads episodes to the file system.
///
/// Does not download the *contents* of torrent files; that is delegated to
/// whatever torrent client ends up opening them.
pub struct EpisodeDownloader<'a, C: HttpClient + ?Sized> {
    client: &'a C,
    options: &'a DownloadOptions,
}

impl<'a, C: HttpClient + ?Sized> EpisodeDownloader<'a, C> {
    pub fn new(client: &'a C, options: &'a DownloadOptions) -> Self {
        Self { client, options }
    }

    pub async fn download(&self, episode: &Episode) -> Result<DownloadedEpisode, DownloadError> {
        if episode.is_magnetized() {
            // Magnet links never trigger a network fetch. Optionally save a
            // bookmark file; the caller is responsible for opening the link.
            if self.options.should_save_magnet_links {
                self.save_magnet_link(episode).await?;
            }

            Ok(DownloadedEpisode {
                episode: episode.clone(),
                local_path: None,
            })
        } else if self.options.should_save_torrent_files {
            let local_path = self.download_torrent_file(episode).await?;

            Ok(DownloadedEpisode {
                episode: episode.clone(),
                local_path: Some(local_path),
            })
        } else {
            // Neither flag set (e.g. an external script owns delivery): hand
            // the URL back untouched, with no network or disk activity.
            Ok(DownloadedEpisode {
                episode: episode.clone(),
                local_path: None,
            })
        }
    }

    /// Write a bookmark file that can be double-clicked to open the magnet link
    async fn save_magnet_link(&self, episode: &Episode) -> Result<PathBuf, DownloadError> {
        let bookmark = json!({ "URL": episode.url.as_str() });
        let data = serde_json::to_vec_pretty(&bookmark)?;

        let path = self.destination_path(episode, &webloc_file_name(&episode.title));
        write_with_intermediate_dirs(&data, &path).await?;

        debug!(path = %path.display(), "saved magnet link bookmark");

        Ok(path)
    }

    async fn download_torrent_file(&self, episode: &Episode) -> Result<PathBuf, DownloadError> {
        let url = episode.url.as_str();

        debug!(%url, "downloading torrent file");

        let response = self
            .client
            .get(url)
            .await
            .map_err(|e| DownloadError::Network {
                url: url.to_string(),
                source: e,
            })?;

        if response.status != 200 {
            return Err(DownloadError::BadStatus {
                url: url.to_string(),
                status: response.status,
            });
        }

        info!(%url, size = response.body.len(), "torrent file download complete");

        let path = self.destination_path(episode, &torrent_file_name(&episode.title));
        write_with_intermediate_dirs(&response.body, &path).await?;

        Ok(path)
    }

    fn destination_path(&self, episode: &Episode, file_name: &str) -> PathBuf {
        let mut path = self.options.container_directory.clone();

        if self.options.should_organize_by_show
            && let Some(show_name) = &episode.show_name
        {
            path.push(sanitized_file_name(show_name));
        }

        path.push(file_name);
        path
    }
}

/// Write `data` to `path`, creating missing parent directories.
///
/// A parent that exists but is not a directory is an error.
async fn write_with_intermediate_dirs(data: &[u8], path: &Path) -> Result<(), DownloadError> {
    if let Some(parent) = path.parent() {
        match tokio::fs::metadata(parent).await {
            Ok(metadata) if !metadata.is_dir() => {
                return Err(DownloadError::NotADirectory(parent.to_path_buf()));
            }
            Ok(_) => {}
            Err(_) => {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    DownloadError::DirectoryCreateFailed {
                        path: parent.to_path_buf(),
                        source: e,
                    }
                })?;
                debug!(path = %parent.display(), "created download directory");
            }
        }
    }

    tokio::fs::write(path, data)
        .await
        .map_err(|e| DownloadError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}
