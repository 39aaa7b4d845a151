// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod download;
mod extract;
mod filename;
mod select;

pub use download::{PARTIAL_SUFFIX, download_episode, partial_path};
pub use extract::{Episode, FALLBACK_TITLE, extract, parse_feed_date};
pub use filename::{
    FALLBACK_PODCAST_FOLDER, audio_extension, podcast_folder_name, resolve_filename,
    sanitize_title, stable_hash,
};
pub use select::select;
