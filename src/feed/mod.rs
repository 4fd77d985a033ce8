// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod fetch;
mod parse;

pub use fetch::fetch_feed_bytes;
pub use parse::parse_feed;

use serde::{Deserialize, Serialize};
use url::Url;

/// A named, user-configured source URL expected to serve an RSS or Atom
/// document of episodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Feed {
    pub name: String,
    pub url: Url,
}

impl Feed {
    pub fn new(name: impl Into<String>, url: Url) -> Self {
        Self {
            name: name.into(),
            url,
        }
    }
}
