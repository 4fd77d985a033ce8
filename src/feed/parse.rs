// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use tracing::{debug, trace};
use url::Url;

use crate::episode::Episode;
use crate::error::FeedError;

use super::Feed;

/// Parse a feed document into an ordered list of episodes.
///
/// The document is tried as RSS first, then as Atom. A document that parses
/// as neither fails the whole parse; individual items missing a usable URL or
/// a title are dropped without failing the rest.
pub fn parse_feed(bytes: &[u8], feed: &Feed) -> Result<Vec<Episode>, FeedError> {
    match rss::Channel::read_from(bytes) {
        Ok(channel) => {
            let total = channel.items().len();
            let episodes: Vec<Episode> = channel
                .items()
                .iter()
                .filter_map(|item| episode_from_rss_item(item, feed))
                .collect();
            debug!(
                feed = %feed.url,
                parsed = episodes.len(),
                dropped = total - episodes.len(),
                "parsed RSS feed"
            );
            Ok(episodes)
        }
        Err(rss_error) => match atom_syndication::Feed::read_from(bytes) {
            Ok(atom) => {
                let total = atom.entries().len();
                let episodes: Vec<Episode> = atom
                    .entries()
                    .iter()
                    .filter_map(|entry| episode_from_atom_entry(entry, feed))
                    .collect();
                debug!(
                    feed = %feed.url,
                    parsed = episodes.len(),
                    dropped = total - episodes.len(),
                    "parsed Atom feed"
                );
                Ok(episodes)
            }
            Err(_) => Err(FeedError::ParseFailed(rss_error)),
        },
    }
}

/// Build an episode from an RSS `channel/item` node.
///
/// The download URL comes from, in priority order: the enclosure URL
/// attribute, an `atom:link` `href` attribute, or the bare `link` text.
fn episode_from_rss_item(item: &rss::Item, feed: &Feed) -> Option<Episode> {
    let url_string = item
        .enclosure()
        .map(|enclosure| enclosure.url())
        .or_else(|| atom_link_href(item))
        .or_else(|| item.link());

    let Some(url_string) = url_string else {
        trace!("skipping feed item without a usable URL");
        return None;
    };

    let Ok(url) = Url::parse(url_string) else {
        trace!(url = url_string, "skipping feed item with invalid URL");
        return None;
    };

    let title = item.title().unwrap_or_default();
    if title.is_empty() {
        trace!("skipping feed item with missing or empty title");
        return None;
    }

    // The optional show name comes from the generic "tv" namespace, with a
    // fallback to the legacy "showrss" namespace.
    let show_name = extension_value(item.extensions(), "tv", "show_name")
        .or_else(|| extension_value(item.extensions(), "showrss", "showname"));

    Some(Episode {
        title: title.to_string(),
        url,
        show_name,
        feed: Some(feed.clone()),
    })
}

/// Build an episode from an Atom `feed/entry` node.
fn episode_from_atom_entry(entry: &atom_syndication::Entry, feed: &Feed) -> Option<Episode> {
    // Prefer an enclosure link, falling back to the first link of any kind.
    let link = entry
        .links()
        .iter()
        .find(|link| link.rel() == "enclosure")
        .or_else(|| entry.links().first());

    let Some(link) = link else {
        trace!("skipping Atom entry without links");
        return None;
    };

    let Ok(url) = Url::parse(link.href()) else {
        trace!(url = link.href(), "skipping Atom entry with invalid URL");
        return None;
    };

    let title = entry.title().value.clone();
    if title.is_empty() {
        trace!("skipping Atom entry with empty title");
        return None;
    }

    let show_name = atom_extension_value(entry.extensions(), "tv", "show_name")
        .or_else(|| atom_extension_value(entry.extensions(), "showrss", "showname"));

    Some(Episode {
        title,
        url,
        show_name,
        feed: Some(feed.clone()),
    })
}

/// Read the `href` attribute of an `atom:link` element embedded in an RSS item
fn atom_link_href(item: &rss::Item) -> Option<&str> {
    item.extensions()
        .get("atom")?
        .get("link")?
        .first()?
        .attrs()
        .get("href")
        .map(String::as_str)
}

fn extension_value(
    extensions: &rss::extension::ExtensionMap,
    namespace: &str,
    element: &str,
) -> Option<String> {
    extensions
        .get(namespace)?
        .get(element)?
        .first()?
        .value()
        .map(String::from)
}

fn atom_extension_value(
    extensions: &atom_syndication::extension::ExtensionMap,
    namespace: &str,
    element: &str,
) -> Option<String> {
    extensions
        .get(namespace)?
        .get(element)?
        .first()?
        .value()
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_feed() -> Feed {
        Feed::new("Test", Url::parse("http://example.com/feed.xml").unwrap())
    }

    const SAMPLE_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:tv="http://xmlns.example.org/broadcatching/" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>Test Feed</title>
    <description>Broadcatching test feed</description>
    <item>
      <title>Show.S01E01</title>
      <enclosure url="magnet:?xt=urn:btih:abc" type="application/x-bittorrent"/>
      <tv:show_name>Show</tv:show_name>
    </item>
    <item>
      <title>Show.S01E02</title>
      <enclosure url="http://example.com/b.torrent" type="application/x-bittorrent"/>
    </item>
    <item>
      <title>From atom link</title>
      <atom:link href="http://example.com/c.torrent"/>
    </item>
    <item>
      <title>From bare link</title>
      <link>http://example.com/d.torrent</link>
    </item>
    <item>
      <title>No usable URL at all</title>
    </item>
    <item>
      <title></title>
      <enclosure url="http://example.com/e.torrent" type="application/x-bittorrent"/>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_rss_items_in_order() {
        let episodes = parse_feed(SAMPLE_RSS.as_bytes(), &make_feed()).unwrap();

        assert_eq!(episodes.len(), 4);
        assert_eq!(episodes[0].title, "Show.S01E01");
        assert_eq!(episodes[1].title, "Show.S01E02");
        assert_eq!(episodes[1].url.as_str(), "http://example.com/b.torrent");
    }

    #[test]
    fn reads_show_name_from_tv_namespace() {
        let episodes = parse_feed(SAMPLE_RSS.as_bytes(), &make_feed()).unwrap();

        assert_eq!(episodes[0].show_name.as_deref(), Some("Show"));
        assert_eq!(episodes[1].show_name, None);
    }

    #[test]
    fn enclosure_wins_then_atom_link_then_bare_link() {
        let episodes = parse_feed(SAMPLE_RSS.as_bytes(), &make_feed()).unwrap();

        assert_eq!(episodes[0].url.scheme(), "magnet");
        assert_eq!(episodes[2].url.as_str(), "http://example.com/c.torrent");
        assert_eq!(episodes[3].url.as_str(), "http://example.com/d.torrent");
    }

    #[test]
    fn drops_items_missing_url_or_title() {
        let episodes = parse_feed(SAMPLE_RSS.as_bytes(), &make_feed()).unwrap();

        assert!(!episodes.iter().any(|e| e.title.is_empty()));
        assert!(!episodes.iter().any(|e| e.title == "No usable URL at all"));
    }

    #[test]
    fn episodes_remember_their_feed() {
        let feed = make_feed();
        let episodes = parse_feed(SAMPLE_RSS.as_bytes(), &feed).unwrap();

        assert_eq!(episodes[0].feed.as_ref(), Some(&feed));
    }

    #[test]
    fn parses_atom_entries() {
        let atom = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Test</title>
  <id>urn:uuid:1</id>
  <updated>2024-01-01T00:00:00Z</updated>
  <entry>
    <title>Show.S02E01</title>
    <id>urn:uuid:2</id>
    <updated>2024-01-01T00:00:00Z</updated>
    <link rel="enclosure" href="http://example.com/f.torrent"/>
    <link rel="alternate" href="http://example.com/page"/>
  </entry>
  <entry>
    <title>Show.S02E02</title>
    <id>urn:uuid:3</id>
    <updated>2024-01-01T00:00:00Z</updated>
    <link href="magnet:?xt=urn:btih:def"/>
  </entry>
</feed>"#;

        let episodes = parse_feed(atom.as_bytes(), &make_feed()).unwrap();

        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].url.as_str(), "http://example.com/f.torrent");
        assert!(episodes[1].is_magnetized());
    }

    #[test]
    fn unparsable_document_fails_the_parse() {
        let result = parse_feed(b"this is not xml at all", &make_feed());
        assert!(matches!(result, Err(FeedError::ParseFailed(_))));
    }
}
