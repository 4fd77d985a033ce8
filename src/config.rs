// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::error::ConfigError;
use crate::feed::Feed;
use crate::timeofday::is_time_of_day_between;

/// How often feeds are checked
pub const CHECK_INTERVAL: Duration = Duration::from_secs(600);

/// Leeway the scheduler may use when firing the check timer
pub const CHECK_INTERVAL_TOLERANCE: Duration = Duration::from_secs(30);

/// How many history items to keep around, per configured feed.
///
/// This must exceed the number of items any single feed normally serves, or
/// episodes that fall off the history will be downloaded again on every
/// check.
pub const HISTORY_LIMIT_PER_FEED: usize = 200;

/// Options for a single download, as passed to the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOptions {
    pub container_directory: PathBuf,
    pub should_organize_by_show: bool,
    pub should_save_magnet_links: bool,
    pub should_save_torrent_files: bool,
}

impl DownloadOptions {
    /// Check that the container directory exists, is a directory, and is
    /// writable. Called before every check; a failure skips the check
    /// entirely rather than failing it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dir = &self.container_directory;

        let metadata = std::fs::metadata(dir)
            .map_err(|_| ConfigError::SavePathMissing(dir.clone()))?;

        if !metadata.is_dir() {
            return Err(ConfigError::SavePathNotADirectory(dir.clone()));
        }

        // Probe writability with an anonymous temporary file
        if tempfile::tempfile_in(dir).is_err() {
            return Err(ConfigError::SavePathNotWritable(dir.clone()));
        }

        Ok(())
    }
}

/// The engine's persisted settings, stored as a single JSON document.
///
/// Every field has a default so a partial document loads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub feeds: Vec<Feed>,

    /// Container directory for saved magnet links and torrent files
    pub save_path: PathBuf,
    pub organize_by_show: bool,
    pub save_magnet_links: bool,
    pub save_torrent_files: bool,

    /// Hand new episodes to the platform's default handler
    pub open_automatically: bool,

    pub script_enabled: bool,
    pub script_path: Option<PathBuf>,

    /// Restrict scheduled checks to the time-of-day window below
    pub only_update_between: bool,
    #[serde(with = "hhmm")]
    pub update_from: NaiveTime,
    #[serde(with = "hhmm")]
    pub update_to: NaiveTime,

    pub prevent_system_sleep: bool,
    pub headless: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            feeds: Vec::new(),
            save_path: PathBuf::from("~/Downloads"),
            organize_by_show: false,
            save_magnet_links: false,
            save_torrent_files: true,
            open_automatically: true,
            script_enabled: false,
            script_path: None,
            only_update_between: false,
            update_from: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            update_to: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            prevent_system_sleep: true,
            headless: false,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut settings: Settings =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        settings.dedup_feeds();

        Ok(settings)
    }

    /// Drop duplicate feeds, keeping the first occurrence of each
    pub fn dedup_feeds(&mut self) {
        let mut seen: Vec<Feed> = Vec::new();

        self.feeds.retain(|feed| {
            if seen.contains(feed) {
                warn!(feed = %feed.url, "dropping duplicate feed");
                false
            } else {
                seen.push(feed.clone());
                true
            }
        });
    }

    /// Check feed list and script configuration.
    ///
    /// The download directory is validated separately via
    /// [`DownloadOptions::validate`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feeds.is_empty() {
            return Err(ConfigError::NoFeeds);
        }

        for feed in &self.feeds {
            if !is_valid_feed_url(&feed.url) {
                return Err(ConfigError::InvalidFeedUrl(feed.url.to_string()));
            }
        }

        if self.script_enabled {
            let path = self
                .script_path
                .as_deref()
                .map(expand_tilde)
                .ok_or_else(|| ConfigError::BadScript(PathBuf::new()))?;

            if !is_executable_file(&path) {
                return Err(ConfigError::BadScript(path));
            }
        }

        Ok(())
    }

    pub fn download_options(&self) -> DownloadOptions {
        DownloadOptions {
            container_directory: expand_tilde(&self.save_path),
            should_organize_by_show: self.organize_by_show,
            should_save_magnet_links: self.save_magnet_links,
            should_save_torrent_files: self.save_torrent_files,
        }
    }

    pub fn resolved_script_path(&self) -> Option<PathBuf> {
        if !self.script_enabled {
            return None;
        }
        self.script_path.as_deref().map(expand_tilde)
    }

    /// Whether scheduled checks are restricted away from this time of day
    pub fn restricts(&self, time: NaiveTime) -> bool {
        if !self.only_update_between {
            return false;
        }

        !is_time_of_day_between(time, self.update_from, self.update_to)
    }
}

fn is_valid_feed_url(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

fn is_executable_file(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };

    if !metadata.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(unix))]
    true
}

/// Expand a leading `~` to the user's home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Some(rest) = path.to_str().and_then(|s| s.strip_prefix("~")) else {
        return path.to_path_buf();
    };

    let Some(home) = std::env::var_os("HOME") else {
        return path.to_path_buf();
    };

    PathBuf::from(home).join(rest.trim_start_matches('/'))
}

/// Serialize time-of-day fields as "HH:MM"
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(D::Error::custom)
    }
}
