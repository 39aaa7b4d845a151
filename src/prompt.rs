// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interactive questions asked when no feed URL is given on the command line.

use std::io;

use colored::Colorize;
use console::Term;

use castfetch::{ModeKind, SelectionMode};

/// Ask for a feed or show page URL. `None` means the user gave up (empty input).
pub fn ask_url(term: &Term) -> io::Result<Option<String>> {
    term.write_str(&format!(
        "{} ",
        "Feed or show page URL (empty to quit):".bold()
    ))?;
    let answer = term.read_line()?;
    let answer = answer.trim();

    if answer.is_empty() {
        Ok(None)
    } else {
        Ok(Some(answer.to_string()))
    }
}

/// Ask for the selection mode, and the count for custom mode, until valid
pub fn ask_mode(term: &Term) -> io::Result<SelectionMode> {
    let kind = loop {
        term.write_str(&format!(
            "{} {} ",
            "Which episodes?".bold(),
            "[latest/custom/all] (latest):".dimmed()
        ))?;
        match parse_mode_answer(&term.read_line()?) {
            Some(kind) => break kind,
            None => term.write_line(&"Please answer latest, custom or all.".yellow().to_string())?,
        }
    };

    if kind != ModeKind::Custom {
        return Ok(match kind {
            ModeKind::All => SelectionMode::All,
            _ => SelectionMode::Latest,
        });
    }

    loop {
        term.write_str(&format!("{} ", "How many of the newest episodes?".bold()))?;
        match parse_count_answer(&term.read_line()?) {
            Some(count) => return Ok(SelectionMode::Custom(count)),
            None => term.write_line(&"Please enter a number of at least 1.".yellow().to_string())?,
        }
    }
}

/// Interpret a mode answer; blank means the default
fn parse_mode_answer(answer: &str) -> Option<ModeKind> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "" | "l" | "latest" => Some(ModeKind::Latest),
        "c" | "custom" => Some(ModeKind::Custom),
        "a" | "all" => Some(ModeKind::All),
        _ => None,
    }
}

fn parse_count_answer(answer: &str) -> Option<usize> {
    answer.trim().parse().ok().filter(|n| *n >= 1)
}
