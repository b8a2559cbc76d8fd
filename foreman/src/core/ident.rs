//! Identifier normalization shared by the resolver strategies.

use std::sync::LazyLock;

use regex::Regex;

/// Width of zero-padded numeric ids (`7` -> `007`).
pub const ID_WIDTH: usize = 3;

static GROUP_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{3})").expect("group prefix regex"));

/// True when the query consists entirely of ASCII digits.
pub fn is_numeric(query: &str) -> bool {
    !query.is_empty() && query.bytes().all(|b| b.is_ascii_digit())
}

/// Directory-name candidates for a numeric id, in lookup order:
/// zero-padded, zero-stripped, then the raw query.
pub fn id_candidates(raw: &str) -> Vec<String> {
    let stripped = raw.trim_start_matches('0');
    let stripped = if stripped.is_empty() { "0" } else { stripped };
    let padded = format!("{stripped:0>ID_WIDTH$}");
    let mut candidates = vec![padded];
    for form in [stripped.to_string(), raw.to_string()] {
        if !candidates.contains(&form) {
            candidates.push(form);
        }
    }
    candidates
}

/// Case-fold and treat `-`/`_` as spaces so `user-auth` matches `User Auth`.
pub fn fuzzy_normalize(raw: &str) -> String {
    raw.to_lowercase().replace(['-', '_'], " ")
}

/// Case-fold and treat `_` as `-` for matching against folder slugs.
pub fn slug_normalize(raw: &str) -> String {
    raw.to_lowercase().replace('_', "-")
}

/// Substring containment in either direction. Empty strings never match.
pub fn bidirectional_contains(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(b) || b.contains(a)
}

/// Leading three-digit group id of a query (`001-user-auth` -> `001`).
pub fn parent_group_id(query: &str) -> Option<&str> {
    GROUP_PREFIX_RE.find(query).map(|m| m.as_str())
}
