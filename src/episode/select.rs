// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::config::SelectionMode;

use super::extract::Episode;

/// Order episodes newest first and keep as many as the mode asks for.
///
/// Undated episodes sort after every dated one. The sort is stable, so episodes
/// with equal dates (or no date) keep their feed order.
pub fn select(mut episodes: Vec<Episode>, mode: SelectionMode) -> Vec<Episode> {
    // `None < Some(_)`, so comparing b to a puts undated episodes last
    episodes.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));

    match mode {
        SelectionMode::Latest => episodes.truncate(1),
        SelectionMode::Custom(n) => episodes.truncate(n),
        SelectionMode::All => {}
    }

    episodes
}
