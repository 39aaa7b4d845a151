// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use regex::Regex;
use url::Url;

use crate::feed::XmlNode;

/// Title used when an item has none
pub const FALLBACK_TITLE: &str = "Episode";

/// Date fields in priority order
const DATE_FIELDS: [&str; 3] = ["pubDate", "updated", "published"];

/// Elements whose text may itself be the audio URL
const URL_TEXT_FIELDS: [&str; 2] = ["guid", "link"];

static AUDIO_URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(mp3|m4a)(\?.*)?$").unwrap());

/// A single episode normalized from an RSS item or Atom entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Episode {
    pub title: String,
    pub pub_date: Option<DateTime<FixedOffset>>,
    /// Downloadable resource; episodes without one cannot be downloaded
    pub audio_url: Option<String>,
    /// Best available unique token, used only to disambiguate filenames
    pub stable_id: Option<String>,
}

impl Episode {
    /// Whether this episode has an audio URL to download
    pub fn is_downloadable(&self) -> bool {
        self.audio_url.is_some()
    }

    /// Resolve a relative audio URL against the feed URL.
    ///
    /// Absolute URLs are left untouched.
    pub fn resolve_audio_url(&mut self, base: &Url) {
        let Some(audio_url) = self.audio_url.as_deref() else {
            return;
        };

        if let Err(url::ParseError::RelativeUrlWithoutBase) = Url::parse(audio_url)
            && let Ok(resolved) = base.join(audio_url)
        {
            self.audio_url = Some(resolved.to_string());
        }
    }
}

/// Map a raw feed item into an [`Episode`].
///
/// `position` is the 1-based index of the item in the full feed, used as the
/// identifier of last resort.
pub fn extract(item: &XmlNode, position: usize) -> Episode {
    let title = item
        .child_text("title")
        .unwrap_or(FALLBACK_TITLE)
        .to_string();

    let pub_date = DATE_FIELDS
        .iter()
        .filter_map(|field| item.child_text(field))
        .find_map(parse_feed_date);

    let audio_url = find_audio_url(item);

    let stable_id = item
        .child_text("guid")
        .map(String::from)
        .or_else(|| audio_url.clone())
        .or_else(|| Some(format!("item-{position}")));

    Episode {
        title,
        pub_date,
        audio_url,
        stable_id,
    }
}

fn find_audio_url(item: &XmlNode) -> Option<String> {
    // <enclosure url="...">
    let from_enclosure = item
        .children("enclosure")
        .filter_map(|e| e.attr("url"))
        .map(str::trim)
        .find(|url| !url.is_empty());

    // <link rel="enclosure" href="...">
    let from_link = || {
        item.children("link")
            .filter(|l| l.attr("rel").is_some_and(|r| r.trim().eq_ignore_ascii_case("enclosure")))
            .filter_map(|l| l.attr("href"))
            .map(str::trim)
            .find(|href| !href.is_empty())
    };

    // <guid> or <link> text that is itself an audio file URL
    let from_text = || {
        URL_TEXT_FIELDS
            .iter()
            .flat_map(|field| item.children(*field))
            .filter_map(XmlNode::text)
            .find(|text| AUDIO_URL_PATTERN.is_match(text))
    };

    from_enclosure
        .or_else(from_link)
        .or_else(from_text)
        .map(String::from)
}

/// Parse a feed date without depending on the process locale.
///
/// Accepts RFC 2822 (RSS `pubDate`), RFC 3339 (Atom `updated`/`published`) and a
/// handful of common deviations. Dates without an offset are taken as UTC.
pub fn parse_feed_date(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    DateTime::parse_from_rfc2822(text)
        .or_else(|_| DateTime::parse_from_rfc3339(text))
        .ok()
        .or_else(|| parse_relaxed_date(text))
}

fn parse_relaxed_date(text: &str) -> Option<DateTime<FixedOffset>> {
    const WITH_OFFSET: [&str; 5] = [
        "%a, %d %b %Y %H:%M:%S %z",
        "%a, %d %b %Y %H:%M %z",
        "%d %b %Y %H:%M:%S %z",
        "%Y-%m-%dT%H:%M:%S%.f%z",
        "%Y-%m-%d %H:%M:%S %z",
    ];
    const WITHOUT_OFFSET: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%a, %d %b %Y %H:%M:%S",
        "%d %b %Y %H:%M:%S",
    ];

    for format in WITH_OFFSET {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }

    for format in WITHOUT_OFFSET {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc().fixed_offset());
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn item(xml: &str) -> XmlNode {
        XmlNode::parse(xml.as_bytes()).unwrap()
    }

    #[test]
    fn extracts_complete_rss_item() {
        let episode = extract(
            &item(
                r#"<item>
                    <title>Episode 1</title>
                    <pubDate>Mon, 01 Jan 2024 12:00:00 +0000</pubDate>
                    <guid isPermaLink="false">ep1-guid</guid>
                    <enclosure url="https://example.com/ep1.mp3" length="1" type="audio/mpeg"/>
                </item>"#,
            ),
            1,
        );

        assert_eq!(episode.title, "Episode 1");
        assert_eq!(episode.audio_url.as_deref(), Some("https://example.com/ep1.mp3"));
        assert_eq!(episode.stable_id.as_deref(), Some("ep1-guid"));
        let date = episode.pub_date.unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2024, 1, 1));
    }

    #[test]
    fn missing_title_uses_fallback() {
        let episode = extract(&item(r#"<item><title>  </title></item>"#), 3);
        assert_eq!(episode.title, FALLBACK_TITLE);
    }

    #[test]
    fn itunes_elements_do_not_shadow_plain_ones() {
        let episode = extract(
            &item(
                r#"<item xmlns:itunes="urn:itunes">
                    <itunes:title></itunes:title>
                    <title>Real Title</title>
                    <itunes:guid>itunes-id</itunes:guid>
                    <guid>plain-id</guid>
                    <pubDate>Fri, 05 Jan 2024 10:00:00 +0000</pubDate>
                    <enclosure url="https://example.com/real.mp3"/>
                </item>"#,
            ),
            1,
        );

        assert_eq!(episode.title, "Real Title");
        assert_eq!(episode.stable_id.as_deref(), Some("plain-id"));
        assert!(episode.pub_date.is_some());
    }

    #[test]
    fn date_prefers_pub_date_then_updated_then_published() {
        let episode = extract(
            &item(
                r#"<entry>
                    <published>2024-01-01T00:00:00Z</published>
                    <updated>2024-02-01T00:00:00Z</updated>
                </entry>"#,
            ),
            1,
        );
        assert_eq!(episode.pub_date.unwrap().month(), 2);

        let episode = extract(
            &item(
                r#"<item>
                    <published>2024-01-01T00:00:00Z</published>
                    <pubDate>Fri, 01 Mar 2024 00:00:00 GMT</pubDate>
                </item>"#,
            ),
            1,
        );
        assert_eq!(episode.pub_date.unwrap().month(), 3);
    }

    #[test]
    fn unparsable_date_falls_through_to_next_field() {
        let episode = extract(
            &item(
                r#"<item>
                    <pubDate>sometime last week</pubDate>
                    <published>2024-05-06T07:08:09+02:00</published>
                </item>"#,
            ),
            1,
        );
        assert_eq!(episode.pub_date.unwrap().day(), 6);
    }

    #[test]
    fn no_parsable_date_leaves_date_unset() {
        let episode = extract(&item(r#"<item><pubDate>garbage</pubDate></item>"#), 1);
        assert!(episode.pub_date.is_none());
    }

    #[test]
    fn audio_url_falls_back_to_enclosure_link() {
        let episode = extract(
            &item(
                r#"<entry xmlns="http://www.w3.org/2005/Atom">
                    <title>Atom</title>
                    <link rel="alternate" href="https://example.com/post"/>
                    <link rel="enclosure" type="audio/mp4" href="https://example.com/a.m4a"/>
                </entry>"#,
            ),
            1,
        );
        assert_eq!(episode.audio_url.as_deref(), Some("https://example.com/a.m4a"));
        assert_eq!(episode.stable_id.as_deref(), Some("https://example.com/a.m4a"));
    }

    #[test]
    fn enclosure_element_wins_over_enclosure_link() {
        let episode = extract(
            &item(
                r#"<item>
                    <link rel="enclosure" href="https://example.com/second.mp3"/>
                    <enclosure url="https://example.com/first.mp3"/>
                </item>"#,
            ),
            1,
        );
        assert_eq!(episode.audio_url.as_deref(), Some("https://example.com/first.mp3"));
    }

    #[test]
    fn audio_url_falls_back_to_guid_or_link_text() {
        let episode = extract(
            &item(
                r#"<item>
                    <guid>https://example.com/audio/ep7.MP3?dl=1</guid>
                </item>"#,
            ),
            1,
        );
        assert_eq!(
            episode.audio_url.as_deref(),
            Some("https://example.com/audio/ep7.MP3?dl=1")
        );

        let episode = extract(
            &item(
                r#"<item>
                    <guid>tag:example.com,2024:7</guid>
                    <link>https://example.com/ep7.m4a</link>
                </item>"#,
            ),
            1,
        );
        assert_eq!(episode.audio_url.as_deref(), Some("https://example.com/ep7.m4a"));
        assert_eq!(episode.stable_id.as_deref(), Some("tag:example.com,2024:7"));
    }

    #[test]
    fn non_audio_link_text_is_ignored() {
        let episode = extract(
            &item(r#"<item><link>https://example.com/episode-page.html</link></item>"#),
            1,
        );
        assert!(episode.audio_url.is_none());
        assert!(!episode.is_downloadable());
    }

    #[test]
    fn stable_id_falls_back_to_position() {
        let episode = extract(&item(r#"<item><title>Nothing</title></item>"#), 12);
        assert_eq!(episode.stable_id.as_deref(), Some("item-12"));
    }

    #[test]
    fn relative_audio_url_is_resolved_against_feed() {
        let mut episode = extract(
            &item(r#"<item><enclosure url="media/ep.mp3"/></item>"#),
            1,
        );
        let base = Url::parse("https://example.com/podcast/feed.xml").unwrap();

        episode.resolve_audio_url(&base);

        assert_eq!(
            episode.audio_url.as_deref(),
            Some("https://example.com/podcast/media/ep.mp3")
        );
    }

    #[test]
    fn absolute_audio_url_is_kept_verbatim() {
        let mut episode = extract(
            &item(r#"<item><enclosure url="https://cdn.example.com/ep.mp3?x=1"/></item>"#),
            1,
        );
        let base = Url::parse("https://example.com/feed.xml").unwrap();

        episode.resolve_audio_url(&base);

        assert_eq!(
            episode.audio_url.as_deref(),
            Some("https://cdn.example.com/ep.mp3?x=1")
        );
    }

    #[test]
    fn parses_common_date_formats() {
        assert!(parse_feed_date("Mon, 15 Jan 2024 12:00:00 +0000").is_some());
        assert!(parse_feed_date("Mon, 15 Jan 2024 12:00:00 GMT").is_some());
        assert!(parse_feed_date("2024-01-15T12:00:00Z").is_some());
        assert!(parse_feed_date("2024-01-15T12:00:00.123+01:00").is_some());
        assert!(parse_feed_date("2024-01-15 12:00:00").is_some());
        assert!(parse_feed_date("  Mon, 15 Jan 2024 12:00 +0000  ").is_some());
        assert!(parse_feed_date("").is_none());
        assert!(parse_feed_date("yesterday").is_none());
    }

    #[test]
    fn date_only_is_midnight_utc() {
        let date = parse_feed_date("2024-01-15").unwrap();
        assert_eq!((date.day(), date.hour()), (15, 0));
        assert_eq!(date.offset().local_minus_utc(), 0);
    }
}
