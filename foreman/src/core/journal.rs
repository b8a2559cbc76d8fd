//! Open-blocker detection over journal text.
//!
//! A blocker is recorded as a `## Blocker: <title>` heading and cleared
//! by a later (or earlier) `## Resolution: <title>` heading whose title
//! matches after trimming and case-folding. The first blocker without a
//! matching resolution is the open one.

use std::sync::LazyLock;

use regex::Regex;

static BLOCKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"## Blocker:[ \t]*(.+)").expect("blocker regex"));
static RESOLUTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"## Resolution:[ \t]*(.+)").expect("resolution regex"));

fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// First blocker title with no matching resolution, if any.
pub fn open_blocker(journal: &str) -> Option<String> {
    let resolutions: Vec<String> = RESOLUTION_RE
        .captures_iter(journal)
        .map(|caps| normalize_title(&caps[1]))
        .collect();
    for caps in BLOCKER_RE.captures_iter(journal) {
        let title = caps[1].trim();
        if !resolutions.contains(&normalize_title(title)) {
            return Some(title.to_string());
        }
    }
    None
}
