// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bytes::Bytes;

use crate::error::FeedError;
use crate::http::HttpClient;

use super::Feed;

/// Fetch the raw bytes of a feed document, without parsing.
///
/// Feed checks must always see fresh results; the HTTP layer disables caching
/// on every request.
pub async fn fetch_feed_bytes<C: HttpClient + ?Sized>(
    client: &C,
    feed: &Feed,
) -> Result<Bytes, FeedError> {
    let url = feed.url.as_str();

    let response = client.get(url).await.map_err(|e| FeedError::FetchFailed {
        url: url.to_string(),
        source: e,
    })?;

    if response.status >= 400 {
        return Err(FeedError::FetchStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    Ok(response.body)
}
