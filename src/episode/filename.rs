// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use sha1::{Digest, Sha1};
use url::Url;

use super::extract::{Episode, FALLBACK_TITLE};

/// Maximum length, in characters, of the title portion of a filename
const MAX_TITLE_LENGTH: usize = 150;

/// Folder name used when the feed has no usable title
pub const FALLBACK_PODCAST_FOLDER: &str = "UnknownPodcast";

/// Length of the hex disambiguator appended to ambiguous filenames
const HASH_LENGTH: usize = 8;

/// Build the filename for an episode: `"YYYY-MM-DD - Title.ext"`.
///
/// Undated episodes, and episodes whose title collapses to the fallback title,
/// get a `-<hash8>` suffix derived from their stable identifier so that they
/// cannot overwrite each other. `position` stands in for the identifier when
/// the episode carries none.
pub fn resolve_filename(episode: &Episode, position: usize) -> String {
    let mut base = sanitize_title(&episode.title);
    if base.is_empty() {
        base = FALLBACK_TITLE.to_string();
    }

    let date_prefix = episode
        .pub_date
        .map(|dt| format!("{} - ", dt.format("%Y-%m-%d")))
        .unwrap_or_default();

    let suffix = if base == FALLBACK_TITLE || date_prefix.is_empty() {
        let id = episode
            .stable_id
            .clone()
            .unwrap_or_else(|| format!("item-{position}"));
        format!("-{}", stable_hash(&id))
    } else {
        String::new()
    };

    format!(
        "{}{}{}.{}",
        date_prefix,
        base,
        suffix,
        audio_extension(episode)
    )
}

/// `m4a` when the audio URL's path ends in `.m4a`, `mp3` otherwise
pub fn audio_extension(episode: &Episode) -> &'static str {
    let is_m4a = episode
        .audio_url
        .as_deref()
        .map(url_path)
        .is_some_and(|path| path.to_ascii_lowercase().ends_with(".m4a"));

    if is_m4a { "m4a" } else { "mp3" }
}

/// First eight hex characters of the SHA-1 digest of `stable_id`
pub fn stable_hash(stable_id: &str) -> String {
    let digest = Sha1::digest(stable_id.as_bytes());
    let mut hex = format!("{digest:x}");
    hex.truncate(HASH_LENGTH);
    hex
}

/// Make a title safe to use as a file or folder name on any platform.
///
/// Characters forbidden on Windows (`\ / : * ? " < > |`) and control characters
/// become `_`, reserved device names are neutralized and surrounding whitespace
/// is trimmed. May return an empty string.
pub fn sanitize_title(title: &str) -> String {
    let truncated: String = title.trim().chars().take(MAX_TITLE_LENGTH).collect();

    let options = sanitize_filename::Options {
        windows: true,
        truncate: true,
        replacement: "_",
    };

    sanitize_filename::sanitize_with_options(truncated.trim(), options)
        .trim()
        .to_string()
}

/// Name of the per-podcast folder for a feed title
pub fn podcast_folder_name(feed_title: Option<&str>) -> String {
    feed_title
        .map(sanitize_title)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_PODCAST_FOLDER.to_string())
}

/// Path component of a URL, ignoring query and fragment
fn url_path(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => url.path().to_string(),
        Err(_) => raw.split(['?', '#']).next().unwrap_or_default().to_string(),
    }
}
