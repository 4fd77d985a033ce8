// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod download;
mod filename;

pub use download::EpisodeDownloader;
pub use filename::{sanitized_file_name, torrent_file_name, webloc_file_name};

use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::feed::Feed;

/// An episode found in a broadcatching feed.
///
/// The title usually contains a season/episode number code and other
/// stuff that isn't strictly the title.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub title: String,

    /// Magnet link or torrent-file URL for this episode
    pub url: Url,

    #[serde(rename = "showName", default, skip_serializing_if = "Option::is_none")]
    pub show_name: Option<String>,

    /// The feed this episode was parsed from, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed: Option<Feed>,
}

impl Episode {
    /// Whether this episode's URL is a magnet link (instead of a torrent file)
    pub fn is_magnetized(&self) -> bool {
        self.url.scheme() == "magnet"
    }
}

// Equality is structural on title, url and show name; the originating feed
// does not participate.
impl PartialEq for Episode {
    fn eq(&self, other: &Self) -> bool {
        self.title == other.title && self.url == other.url && self.show_name == other.show_name
    }
}

impl Eq for Episode {}

impl Hash for Episode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.title.hash(state);
        self.url.hash(state);
        self.show_name.hash(state);
    }
}

/// An episode the downloader has processed.
///
/// `local_path` is set only when a torrent file was actually fetched and
/// written to disk; it is absent for magnet links and for script-delegated
/// downloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadedEpisode {
    pub episode: Episode,
    #[serde(rename = "localPath", default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_episode(url: &str) -> Episode {
        Episode {
            title: "Show.S01E01".to_string(),
            url: Url::parse(url).unwrap(),
            show_name: None,
            feed: None,
        }
    }

    #[test]
    fn magnet_urls_are_magnetized() {
        assert!(make_episode("magnet:?xt=urn:btih:abc").is_magnetized());
        assert!(!make_episode("http://example.com/a.torrent").is_magnetized());
    }

    #[test]
    fn equality_ignores_the_originating_feed() {
        let mut a = make_episode("http://example.com/a.torrent");
        let b = make_episode("http://example.com/a.torrent");

        a.feed = Some(Feed::new(
            "Test",
            Url::parse("http://example.com/feed.xml").unwrap(),
        ));

        assert_eq!(a, b);
    }
}
