//! Minimal front-matter parser for `member.md` metadata blocks.
//!
//! The grammar is deliberately small: a `---` delimited block of
//! `key: value` pairs, where an empty value opens a list of `  - ` items.
//! List items carrying `key: value` pairs (inline `{...}` or block-style
//! `- key: value`) become records, extended by deeper-indented
//! `key: value` lines. Anything that does not fit the
//! grammar is skipped rather than rejected; a document without a valid
//! block degrades to an empty record with the full text as body.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

/// Line that opens and closes a metadata block.
pub const DELIMITER: &str = "---";

static TOP_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+):\s*(.*)$").expect("top-level key regex"));
static NESTED_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+(\w+):\s*(.*)$").expect("nested key regex"));
static CONTEXT_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)##\s*Context[ \t]*\r?\n").expect("context header regex"));

/// One entry of a list-valued field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Scalar(String),
    Record(BTreeMap<String, String>),
}

/// A field value: either a scalar string or a list of items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Scalar(String),
    List(Vec<Item>),
}

/// Parsed metadata block. Field order is not significant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Scalar field value, or `None` if absent or list-valued.
    pub fn str(&self, key: &str) -> Option<&str> {
        match self.fields.get(key) {
            Some(Value::Scalar(s)) => Some(s),
            _ => None,
        }
    }

    /// List field items, or `None` if absent or scalar-valued.
    pub fn list(&self, key: &str) -> Option<&[Item]> {
        match self.fields.get(key) {
            Some(Value::List(items)) => Some(items),
            _ => None,
        }
    }

    fn push_item(&mut self, key: &str, item: Item) {
        if let Some(Value::List(items)) = self.fields.get_mut(key) {
            items.push(item);
        }
    }

    fn extend_last_record(&mut self, key: &str, field: String, value: String) {
        if let Some(Value::List(items)) = self.fields.get_mut(key)
            && let Some(Item::Record(entry)) = items.last_mut()
        {
            entry.insert(field, value);
        }
    }
}

/// Split a document into its metadata record and body.
///
/// Never fails: a missing opening delimiter, or an unterminated block,
/// yields an empty record and the entire input as body.
pub fn parse(content: &str) -> (Record, String) {
    let lines: Vec<&str> = content.split('\n').collect();
    if lines.first().map(|l| l.trim_end()) != Some(DELIMITER) {
        return (Record::default(), content.to_string());
    }
    let Some(end) = lines
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, line)| line.trim() == DELIMITER)
        .map(|(i, _)| i)
    else {
        return (Record::default(), content.to_string());
    };

    let mut record = Record::default();
    // Key of the most recently opened list field, if any.
    let mut open_list: Option<String> = None;

    for line in &lines[1..end] {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("  - ") {
            let Some(key) = open_list.clone() else {
                continue;
            };
            record.push_item(&key, parse_list_item(rest.trim()));
        } else if line.starts_with("    ") {
            if let Some(key) = open_list.clone()
                && let Some(caps) = NESTED_KEY_RE.captures(line)
            {
                record.extend_last_record(&key, caps[1].to_string(), unquote(caps[2].trim()));
            }
        } else if let Some(caps) = TOP_KEY_RE.captures(line) {
            let key = caps[1].to_string();
            let value = caps[2].trim();
            if value.is_empty() {
                record.fields.insert(key.clone(), Value::List(Vec::new()));
                open_list = Some(key);
            } else {
                record.fields.insert(key, Value::Scalar(unquote(value)));
                open_list = None;
            }
        }
    }

    let body = lines[end + 1..].join("\n");
    (record, body)
}

fn parse_list_item(raw: &str) -> Item {
    if let Some(inner) = raw.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
        let mut entry = BTreeMap::new();
        for pair in inner.split(',') {
            if let Some((key, value)) = pair.split_once(':') {
                entry.insert(unquote(key.trim()), unquote(value.trim()));
            }
        }
        return Item::Record(entry);
    }
    // Block-style item: `- id: t1` opens a record that the following
    // deeper-indented lines extend.
    if let Some(caps) = TOP_KEY_RE.captures(raw) {
        let mut entry = BTreeMap::new();
        entry.insert(caps[1].to_string(), unquote(caps[2].trim()));
        return Item::Record(entry);
    }
    Item::Scalar(unquote(raw))
}

fn unquote(raw: &str) -> String {
    raw.trim_matches('"').to_string()
}

/// Extract the `## Context` section from a body, capped at `max_chars`.
///
/// The section runs from the header to the next `##` header or end of
/// input. Longer sections are cut to the budget with a `...` marker.
/// Returns an empty string when the header is absent.
pub fn extract_excerpt(body: &str, max_chars: usize) -> String {
    let Some(header) = CONTEXT_HEADER_RE.find(body) else {
        return String::new();
    };
    let rest = &body[header.end()..];
    let section = match rest.find("\n##") {
        Some(idx) => &rest[..idx],
        None => rest,
    };
    let section = section.trim();
    if section.chars().count() <= max_chars {
        return section.to_string();
    }
    let cut: String = section.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{cut}...")
}
