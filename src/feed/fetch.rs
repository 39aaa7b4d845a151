// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bytes::Bytes;

use crate::error::FeedError;
use crate::http::HttpClient;

use super::xml::XmlNode;

const RSS_ITEM_PATH: [&str; 3] = ["rss", "channel", "item"];
const RSS_CHANNEL_PATH: [&str; 2] = ["rss", "channel"];
const ATOM_ENTRY_PATH: [&str; 2] = ["feed", "entry"];
const ATOM_ROOT_PATH: [&str; 1] = ["feed"];

/// A feed document reduced to its title and raw items
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    /// The candidate URL the feed was read from
    pub resolved_url: String,
    /// Feed-level title, if the document has one
    pub title: Option<String>,
    /// `<item>` (RSS) or `<entry>` (Atom) elements in document order
    pub items: Vec<XmlNode>,
}

/// Fetch raw feed bytes from a URL (without parsing)
pub async fn fetch_feed_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Bytes, FeedError> {
    let bytes = client
        .get_bytes(url)
        .await
        .map_err(|e| FeedError::FetchFailed {
            url: url.to_string(),
            source: e,
        })?;
    Ok(bytes)
}

/// Parse feed bytes into a title and item list, accepting RSS or Atom.
///
/// RSS-shaped items win when present; Atom entries are only looked for when the
/// document has no RSS items.
pub fn parse_feed(xml_bytes: &[u8], url: &str) -> Result<ParsedFeed, FeedError> {
    let root = XmlNode::parse(xml_bytes).map_err(|reason| FeedError::XmlParse {
        url: url.to_string(),
        reason,
    })?;

    let rss_items = root.select_path(&RSS_ITEM_PATH);
    let items: Vec<XmlNode> = if rss_items.is_empty() {
        root.select_path(&ATOM_ENTRY_PATH)
            .into_iter()
            .cloned()
            .collect()
    } else {
        rss_items.into_iter().cloned().collect()
    };

    let title = root
        .select_path(&RSS_CHANNEL_PATH)
        .into_iter()
        .chain(root.select_path(&ATOM_ROOT_PATH))
        .find_map(|node| node.child_text("title"))
        .map(String::from);

    Ok(ParsedFeed {
        resolved_url: url.to_string(),
        title,
        items,
    })
}

/// Fetch and parse candidate feed URLs in order, returning the first with items.
///
/// Failures of individual candidates are logged and skipped; if none yields an
/// item the result is [`FeedError::NoEpisodesFound`], carrying the last
/// candidate's fetch or parse error.
pub async fn fetch_and_parse<C: HttpClient>(
    client: &C,
    candidate_urls: &[String],
) -> Result<ParsedFeed, FeedError> {
    let mut last_error = None;

    for url in candidate_urls {
        let bytes = match fetch_feed_bytes(client, url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "feed candidate could not be fetched");
                last_error = Some(e.to_string());
                continue;
            }
        };

        match parse_feed(&bytes, url) {
            Ok(feed) if !feed.items.is_empty() => {
                tracing::debug!(url = %url, items = feed.items.len(), "feed parsed");
                return Ok(feed);
            }
            Ok(_) => {
                tracing::warn!(url = %url, "feed candidate has no items");
                last_error = None;
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "feed candidate could not be parsed");
                last_error = Some(e.to_string());
            }
        }
    }

    Err(FeedError::NoEpisodesFound { last_error })
}
