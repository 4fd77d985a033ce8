// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::config::HISTORY_LIMIT_PER_FEED;
use crate::episode::Episode;
use crate::error::HistoryError;

/// A previously downloaded episode.
///
/// Very old items, migrated from the legacy format, might not have a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Record", into = "Record")]
pub struct HistoryItem {
    pub episode: Episode,
    pub download_date: Option<DateTime<Utc>>,
}

/// On-disk shape of a history item
#[derive(Serialize, Deserialize)]
struct Record {
    title: String,
    url: Url,
    #[serde(rename = "showName", default, skip_serializing_if = "Option::is_none")]
    show_name: Option<String>,
    #[serde(rename = "date", default, skip_serializing_if = "Option::is_none")]
    date: Option<DateTime<Utc>>,
}

impl From<HistoryItem> for Record {
    fn from(item: HistoryItem) -> Self {
        Record {
            title: item.episode.title,
            url: item.episode.url,
            show_name: item.episode.show_name,
            date: item.download_date,
        }
    }
}

impl From<Record> for HistoryItem {
    fn from(record: Record) -> Self {
        HistoryItem {
            episode: Episode {
                title: record.title,
                url: record.url,
                show_name: record.show_name,
                feed: None,
            },
            download_date: record.date,
        }
    }
}

/// An ordered, deduplicated, size-bounded log of downloaded episodes.
///
/// Checks consult it to suppress re-delivery, so losing items past the bound
/// means re-downloading them; the bound must stay comfortably above the item
/// count of any single feed.
pub struct HistoryStore {
    path: PathBuf,
    items: Vec<HistoryItem>,
    feed_count: usize,
}

impl HistoryStore {
    /// Load history from `path`, migrating the legacy bare-URL-list format
    /// if present. A missing file is an empty history.
    pub fn load(path: impl Into<PathBuf>, feed_count: usize) -> Result<Self, HistoryError> {
        let path = path.into();

        let mut store = Self {
            path: path.clone(),
            items: Vec::new(),
            feed_count,
        };

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(store),
            Err(e) => return Err(HistoryError::ReadFailed { path, source: e }),
        };

        match serde_json::from_str::<Vec<HistoryItem>>(&content) {
            Ok(items) => {
                store.items = items;
                store.normalize();
            }
            Err(structured_error) => {
                // Legacy format: a bare array of URL strings. Convert once
                // and rewrite in the structured format.
                let Ok(urls) = serde_json::from_str::<Vec<String>>(&content) else {
                    return Err(HistoryError::ParseFailed {
                        path,
                        source: structured_error,
                    });
                };

                info!(count = urls.len(), "migrating legacy download history");

                store.items = urls
                    .into_iter()
                    .filter_map(|raw| {
                        let url = Url::parse(&raw).ok()?;
                        Some(HistoryItem {
                            episode: Episode {
                                title: raw,
                                url,
                                show_name: None,
                                feed: None,
                            },
                            download_date: None,
                        })
                    })
                    .collect();

                store.normalize();
                store.persist()?;
            }
        }

        Ok(store)
    }

    pub fn all(&self) -> &[HistoryItem] {
        &self.items
    }

    /// URLs of every episode in history, for the check's skip set
    pub fn downloaded_urls(&self) -> HashSet<Url> {
        self.items
            .iter()
            .map(|item| item.episode.url.clone())
            .collect()
    }

    pub fn append(&mut self, item: HistoryItem) -> Result<(), HistoryError> {
        self.items.push(item);
        self.normalize();
        self.persist()
    }

    pub fn remove_all(
        &mut self,
        predicate: impl Fn(&HistoryItem) -> bool,
    ) -> Result<(), HistoryError> {
        self.items.retain(|item| !predicate(item));
        self.persist()
    }

    /// The history bound scales with the number of configured feeds
    pub fn set_feed_count(&mut self, feed_count: usize) -> Result<(), HistoryError> {
        self.feed_count = feed_count;
        self.normalize();
        self.persist()
    }

    /// Write the full serialized list to disk
    pub fn persist(&self) -> Result<(), HistoryError> {
        let json = serde_json::to_string_pretty(&self.items).expect("history is serializable");

        std::fs::write(&self.path, json).map_err(|e| HistoryError::WriteFailed {
            path: self.path.clone(),
            source: e,
        })
    }

    fn limit(&self) -> usize {
        HISTORY_LIMIT_PER_FEED * self.feed_count.max(1)
    }

    /// Restore the store invariants: unique episodes (earliest-inserted copy
    /// wins), newest first with undated items last, bounded length.
    fn normalize(&mut self) {
        let mut seen: HashSet<Episode> = HashSet::with_capacity(self.items.len());
        self.items.retain(|item| {
            if seen.insert(item.episode.clone()) {
                true
            } else {
                warn!(title = %item.episode.title, "dropping duplicate history item");
                false
            }
        });

        // None sorts after every present date; stable, so insertion order
        // breaks ties
        self.items
            .sort_by(|a, b| b.download_date.cmp(&a.download_date));

        self.items.truncate(self.limit());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;
    use tempfile::tempdir;

    fn make_item(title: &str, url: &str, date: Option<DateTime<Utc>>) -> HistoryItem {
        HistoryItem {
            episode: Episode {
                title: title.to_string(),
                url: Url::parse(url).unwrap(),
                show_name: None,
                feed: None,
            },
            download_date: date,
        }
    }

    fn date(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn append_deduplicates_keeping_the_earliest_copy() {
        let dir = tempdir().unwrap();
        let mut store = HistoryStore::load(dir.path().join("history.json"), 1).unwrap();

        store
            .append(make_item("Ep", "http://x/a.torrent", Some(date(1))))
            .unwrap();
        store
            .append(make_item("Ep", "http://x/a.torrent", Some(date(2))))
            .unwrap();

        assert_eq!(store.all().len(), 1);
        assert_eq!(store.all()[0].download_date, Some(date(1)));
    }

    #[test]
    fn items_are_sorted_newest_first_with_undated_last() {
        let dir = tempdir().unwrap();
        let mut store = HistoryStore::load(dir.path().join("history.json"), 1).unwrap();

        store
            .append(make_item("Old", "http://x/old.torrent", Some(date(1))))
            .unwrap();
        store
            .append(make_item("Undated", "http://x/undated.torrent", None))
            .unwrap();
        store
            .append(make_item("New", "http://x/new.torrent", Some(date(3))))
            .unwrap();

        let titles: Vec<&str> = store
            .all()
            .iter()
            .map(|item| item.episode.title.as_str())
            .collect();
        assert_eq!(titles, vec!["New", "Old", "Undated"]);
    }

    #[test]
    fn history_is_bounded_by_limit_times_feed_count() {
        let dir = tempdir().unwrap();
        let mut store = HistoryStore::load(dir.path().join("history.json"), 1).unwrap();

        for i in 0..(HISTORY_LIMIT_PER_FEED + 5) {
            store
                .append(make_item(
                    &format!("Ep{i}"),
                    &format!("http://x/{i}.torrent"),
                    Some(date(1) + chrono::Duration::seconds(i as i64)),
                ))
                .unwrap();
        }

        assert_eq!(store.all().len(), HISTORY_LIMIT_PER_FEED);
        // The newest items survive the truncation
        assert_eq!(
            store.all()[0].episode.title,
            format!("Ep{}", HISTORY_LIMIT_PER_FEED + 4)
        );
    }

    #[test]
    fn history_survives_a_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.json");

        let mut store = HistoryStore::load(&path, 1).unwrap();
        store
            .append(make_item("Ep", "http://x/a.torrent", Some(date(1))))
            .unwrap();

        let reloaded = HistoryStore::load(&path, 1).unwrap();
        assert_eq!(reloaded.all(), store.all());
    }

    #[test]
    fn remove_all_applies_the_predicate() {
        let dir = tempdir().unwrap();
        let mut store = HistoryStore::load(dir.path().join("history.json"), 1).unwrap();

        store
            .append(make_item("Keep", "http://x/keep.torrent", Some(date(1))))
            .unwrap();
        store
            .append(make_item("Drop", "http://x/drop.torrent", Some(date(2))))
            .unwrap();

        store
            .remove_all(|item| item.episode.title == "Drop")
            .unwrap();

        assert_eq!(store.all().len(), 1);
        assert_eq!(store.all()[0].episode.title, "Keep");
    }

    #[test]
    fn legacy_url_list_is_migrated_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.json");

        std::fs::write(
            &path,
            r#"["http://x/a.torrent", "magnet:?xt=urn:btih:abc"]"#,
        )
        .unwrap();

        let store = HistoryStore::load(&path, 1).unwrap();

        assert_eq!(store.all().len(), 2);
        assert!(store.all().iter().all(|item| item.download_date.is_none()));

        // The file is rewritten in the structured format
        let rewritten = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<HistoryItem> = serde_json::from_str(&rewritten).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn missing_file_is_an_empty_history() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::load(dir.path().join("history.json"), 1).unwrap();
        assert!(store.all().is_empty());
    }
}
