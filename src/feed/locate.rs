// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use url::Url;

use crate::error::FeedError;
use crate::http::HttpClient;

use super::fetch::fetch_feed_bytes;
use super::xml::root_name;

/// A user-supplied URL together with the feed URL it resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSource {
    pub requested_url: String,
    pub resolved_url: String,
}

/// Determine the actual feed URL behind a user-supplied URL.
///
/// A body that already is an RSS or Atom document resolves to the URL itself.
/// Anything else is scanned for an HTML `<link>` with an RSS/Atom type, whose
/// `href` is resolved against `url`.
pub async fn locate<C: HttpClient>(client: &C, url: &str) -> Result<FeedSource, FeedError> {
    let base = Url::parse(url).map_err(|e| FeedError::InvalidUrl {
        url: url.to_string(),
        source: e,
    })?;

    let bytes = fetch_feed_bytes(client, url).await?;

    if looks_like_feed(&bytes) {
        tracing::debug!(url, "URL is a feed");
        return Ok(FeedSource {
            requested_url: url.to_string(),
            resolved_url: url.to_string(),
        });
    }

    let body = String::from_utf8_lossy(&bytes);
    let href = find_feed_link_in_html(&body).ok_or_else(|| FeedError::NoFeedDiscovered {
        url: url.to_string(),
    })?;

    let resolved = base.join(&href).map_err(|e| FeedError::InvalidUrl {
        url: href.clone(),
        source: e,
    })?;

    tracing::debug!(url, resolved = %resolved, "discovered feed link");

    Ok(FeedSource {
        requested_url: url.to_string(),
        resolved_url: resolved.to_string(),
    })
}

/// Whether the document's root element is `<rss>` or `<feed>`
fn looks_like_feed(body: &[u8]) -> bool {
    root_name(body).is_some_and(|name| {
        name.eq_ignore_ascii_case("rss") || name.eq_ignore_ascii_case("feed")
    })
}

/// Find the `href` of the first `<link>` tag whose `type` is an RSS or Atom feed.
///
/// Uses plain string scanning: matching is case-insensitive, attribute order is
/// free, and values may be double-quoted, single-quoted or bare. The returned
/// value is HTML-entity decoded but not yet resolved against a base URL.
fn find_feed_link_in_html(html: &str) -> Option<String> {
    let html_lower = html.to_ascii_lowercase();
    let mut search_from = 0;

    while let Some(link_start) = html_lower[search_from..].find("<link") {
        let abs_start = search_from + link_start;
        let remaining = &html_lower[abs_start..];

        let tag_end = remaining.find('>')?;
        let tag_lower = &remaining[..=tag_end];

        let is_link_tag = tag_lower[5..]
            .chars()
            .next()
            .is_some_and(|c| c.is_whitespace() || c == '/' || c == '>');

        if is_link_tag
            && extract_attr_value(tag_lower, "type")
                .is_some_and(|t| is_feed_type(t.trim()))
        {
            // Pull href from the original text to preserve URL case
            let original_tag = &html[abs_start..abs_start + tag_end + 1];
            if let Some(href) = extract_attr_value(original_tag, "href")
                .map(|h| html_escape::decode_html_entities(h.trim()).into_owned())
                .filter(|h| !h.is_empty())
            {
                return Some(href);
            }
        }

        search_from = abs_start + tag_end + 1;
    }

    None
}

fn is_feed_type(value: &str) -> bool {
    value.eq_ignore_ascii_case("application/rss+xml")
        || value.eq_ignore_ascii_case("application/atom+xml")
}

/// Extract the value of an attribute from a single tag string.
///
/// The attribute name must be preceded by whitespace so that `href` does not
/// match inside `data-href`.
fn extract_attr_value<'a>(tag: &'a str, attr_name: &str) -> Option<&'a str> {
    let tag_lower = tag.to_ascii_lowercase();
    let mut search_from = 0;

    while let Some(found) = tag_lower[search_from..].find(attr_name) {
        let start = search_from + found;
        search_from = start + attr_name.len();

        let preceded_by_space = tag_lower[..start]
            .chars()
            .next_back()
            .is_some_and(char::is_whitespace);
        if !preceded_by_space {
            continue;
        }

        let after_name = tag[search_from..].trim_start();
        let Some(after_eq) = after_name.strip_prefix('=') else {
            continue;
        };
        let value = after_eq.trim_start();

        return match value.chars().next()? {
            quote @ ('"' | '\'') => {
                let inner = &value[1..];
                inner.find(quote).map(|end| &inner[..end])
            }
            _ => {
                let end = value
                    .find(|c: char| c.is_whitespace() || c == '>')
                    .unwrap_or(value.len());
                Some(&value[..end])
            }
        };
    }

    None
}
