//! Resolving a user-supplied identifier to a unit of work.
//!
//! Strategies are tried in a fixed order: numeric id lookup against the
//! worktree layout, fuzzy name matching over member metadata, then
//! parent-group prefix matching. Each strategy reports found, ambiguous,
//! or not found; ambiguity halts the chain so the caller can ask the
//! user rather than guess.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::core::front_matter;
use crate::core::ident;
use crate::core::journal;
use crate::io::store::{self, MEMBER_FILE, ScannedMember, StorePaths};

/// Character budget for the context excerpt carried on a match.
pub const CONTEXT_EXCERPT_CHARS: usize = 300;

/// A resolved unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberMatch {
    pub id: String,
    pub title: String,
    pub status: String,
    /// Excerpt of the member's `## Context` section.
    pub context: String,
    pub group: String,
    pub member: String,
    pub worktree_path: PathBuf,
}

impl MemberMatch {
    fn from_scanned(scanned: &ScannedMember) -> Self {
        Self {
            id: scanned.id.clone(),
            title: scanned.title.clone(),
            status: scanned.status.clone(),
            context: front_matter::extract_excerpt(&scanned.body, CONTEXT_EXCERPT_CHARS),
            group: scanned.group_slug.clone(),
            member: scanned.member_slug.clone(),
            worktree_path: scanned.worktree_path.clone(),
        }
    }
}

/// A matched group container (folder-name matching only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerMatch {
    pub group: String,
}

/// A matched parent group with its member roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupMatch {
    pub group_id: String,
    pub members: Vec<MemberMatch>,
    /// Set when the group exists but has no members yet.
    pub message: Option<String>,
}

/// Three-way outcome of a single resolution strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Find<T> {
    Found(T),
    Ambiguous(Vec<T>),
    NotFound(String),
}

/// Combined outcome across all strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Member(MemberMatch),
    Ambiguous(Vec<MemberMatch>),
    Group(GroupMatch),
    NotFound { reason: String },
}

/// Look up a numeric id against the worktree layout.
///
/// Tries each directory-name form (padded, stripped, raw) across every
/// group before falling through to the next form, so `7`, `07`, and
/// `007` all land on the same worktree.
pub fn resolve_by_id(paths: &StorePaths, query: &str) -> Result<Find<MemberMatch>> {
    if !ident::is_numeric(query) {
        return Ok(Find::NotFound(format!(
            "'{query}' is not a numeric member id"
        )));
    }
    let groups = store::scan_worktree_groups(paths)?;
    for candidate in ident::id_candidates(query) {
        for group in &groups {
            let worktree = paths.worktree(group, &candidate);
            if worktree.is_dir() {
                debug!(group = %group, member = %candidate, "id matched worktree");
                return Ok(Find::Found(member_match_at(paths, group, &candidate)));
            }
        }
    }
    Ok(Find::NotFound(format!(
        "no worktree found for member id '{query}'"
    )))
}

/// Build a match for a worktree hit, enriching from the store's member
/// file when one exists.
fn member_match_at(paths: &StorePaths, group: &str, member: &str) -> MemberMatch {
    let member_path = paths.member_file(group, member);
    let (record, body) = match fs::read_to_string(&member_path) {
        Ok(contents) => front_matter::parse(&contents),
        Err(_) => (front_matter::Record::default(), String::new()),
    };
    MemberMatch {
        id: record.str("id").unwrap_or(member).to_string(),
        title: record.str("title").unwrap_or_default().to_string(),
        status: record.str("status").unwrap_or_default().to_string(),
        context: front_matter::extract_excerpt(&body, CONTEXT_EXCERPT_CHARS),
        group: group.to_string(),
        member: member.to_string(),
        worktree_path: paths.worktree(group, member),
    }
}

/// Fuzzy name matching over member ids and titles.
///
/// An exact id or title match (after normalization) short-circuits, so
/// `User` resolves even when `User Authentication System` also exists.
/// Otherwise substring containment in either direction collects
/// candidates: exactly one wins, more than one is ambiguous.
pub fn resolve_by_name(paths: &StorePaths, query: &str) -> Result<Find<MemberMatch>> {
    if !paths.groups_dir.exists() {
        return Ok(Find::NotFound(format!(
            "no {} directory found",
            paths.groups_dir.display()
        )));
    }
    let normalized = ident::fuzzy_normalize(query);
    let mut matches = Vec::new();
    for scanned in store::scan_members(paths)? {
        let id = ident::fuzzy_normalize(&scanned.id);
        let title = ident::fuzzy_normalize(&scanned.title);
        if id == normalized || title == normalized {
            return Ok(Find::Found(MemberMatch::from_scanned(&scanned)));
        }
        if ident::bidirectional_contains(&id, &normalized)
            || ident::bidirectional_contains(&title, &normalized)
        {
            matches.push(MemberMatch::from_scanned(&scanned));
        }
    }
    match matches.len() {
        0 => Ok(Find::NotFound(format!(
            "no member found matching '{query}'"
        ))),
        1 => Ok(Find::Found(matches.remove(0))),
        _ => Ok(Find::Ambiguous(matches)),
    }
}

/// Treat the query's three-digit prefix as a parent group id and gather
/// that group's members.
///
/// Distinguishes a group that exists with no members yet (found, with a
/// message) from a group that does not exist at all (not found).
pub fn resolve_by_group(paths: &StorePaths, query: &str) -> Result<Find<GroupMatch>> {
    let Some(group_id) = ident::parent_group_id(query) else {
        return Ok(Find::NotFound(format!(
            "'{query}' has no three-digit group prefix"
        )));
    };

    let group_exists = paths.groups_dir.exists()
        && store::scan_group_slugs(paths)?
            .iter()
            .any(|slug| slug.starts_with(group_id));

    let members: Vec<MemberMatch> = store::scan_members(paths)?
        .iter()
        .filter(|m| m.parent_group.as_deref() == Some(group_id))
        .map(MemberMatch::from_scanned)
        .collect();

    if members.is_empty() && !group_exists {
        return Ok(Find::NotFound(format!("no group found for id '{group_id}'")));
    }
    let message = members
        .is_empty()
        .then(|| format!("group {group_id} has no members yet"));
    Ok(Find::Found(GroupMatch {
        group_id: group_id.to_string(),
        members,
        message,
    }))
}

/// Match a query against group folder names only.
///
/// An exact slug match (case-folded, `_` as `-`) short-circuits before
/// substring containment is considered.
pub fn resolve_container(paths: &StorePaths, query: &str) -> Result<Find<ContainerMatch>> {
    if !paths.groups_dir.exists() {
        return Ok(Find::NotFound(format!(
            "no {} directory found",
            paths.groups_dir.display()
        )));
    }
    let slugs = store::scan_group_slugs(paths)?;
    let normalized = ident::slug_normalize(query);
    let mut matches = Vec::new();
    for slug in slugs {
        let folded = ident::slug_normalize(&slug);
        if folded == normalized {
            return Ok(Find::Found(ContainerMatch { group: slug }));
        }
        if ident::bidirectional_contains(&folded, &normalized) {
            matches.push(ContainerMatch { group: slug });
        }
    }
    match matches.len() {
        0 => Ok(Find::NotFound(format!("no group found matching '{query}'"))),
        1 => Ok(Find::Found(matches.remove(0))),
        _ => Ok(Find::Ambiguous(matches)),
    }
}

/// Run the strategy chain: id, then name, then parent group.
///
/// Ambiguity from the name strategy halts the chain; a group prefix is
/// only consulted once both member strategies come up empty.
pub fn resolve_identifier(paths: &StorePaths, query: &str) -> Result<Resolution> {
    if ident::is_numeric(query)
        && let Find::Found(member) = resolve_by_id(paths, query)?
    {
        return Ok(Resolution::Member(member));
    }
    match resolve_by_name(paths, query)? {
        Find::Found(member) => return Ok(Resolution::Member(member)),
        Find::Ambiguous(candidates) => return Ok(Resolution::Ambiguous(candidates)),
        Find::NotFound(_) => {}
    }
    if let Find::Found(group) = resolve_by_group(paths, query)? {
        return Ok(Resolution::Group(group));
    }
    Ok(Resolution::NotFound {
        reason: format!("no unit of work found for '{query}'"),
    })
}

/// Check that a worktree path exists and is a directory.
pub fn validate_worktree(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!(
            "worktree not found at {} (has it been created yet?)",
            path.display()
        );
    }
    if !path.is_dir() {
        bail!("worktree path {} is not a directory", path.display());
    }
    Ok(())
}

/// Why a member file failed validation. Each shape is distinct so the
/// caller can report the precise problem.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MemberFileError {
    #[error("member directory not found at {0}")]
    ContainerMissing(String),
    #[error("member file not found at {0}")]
    FileMissing(String),
    #[error("member file at {0} has no readable metadata block")]
    Malformed(String),
}

/// Check that a worktree carries a valid member file for its identity.
pub fn validate_member_file(
    worktree: &Path,
    group: &str,
    member: &str,
) -> Result<(), MemberFileError> {
    let dir = worktree
        .join(store::STORE_DIR)
        .join("groups")
        .join(group)
        .join("members")
        .join(member);
    if !dir.is_dir() {
        return Err(MemberFileError::ContainerMissing(dir.display().to_string()));
    }
    let file = dir.join(MEMBER_FILE);
    if !file.exists() {
        return Err(MemberFileError::FileMissing(file.display().to_string()));
    }
    let contents = fs::read_to_string(&file)
        .map_err(|_| MemberFileError::Malformed(file.display().to_string()))?;
    let (record, _) = front_matter::parse(&contents);
    if record.is_empty() {
        return Err(MemberFileError::Malformed(file.display().to_string()));
    }
    Ok(())
}

/// Open blocker recorded in a member's journal, if any.
pub fn check_blocked(paths: &StorePaths, group: &str, member: &str) -> Result<Option<String>> {
    let journal_path = paths.journal_file(group, member);
    if !journal_path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(&journal_path)
        .with_context(|| format!("read {}", journal_path.display()))?;
    Ok(journal::open_blocker(&contents))
}

/// One row of `foreman list`: a member with a derived activity status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberListing {
    pub id: String,
    pub title: String,
    /// `in_progress` when a journal exists, `pending` otherwise.
    pub activity: String,
    pub group: String,
    pub member: String,
}

/// All members sorted by id, each tagged `in_progress` or `pending`
/// based on journal existence.
pub fn list_members(paths: &StorePaths) -> Result<Vec<MemberListing>> {
    let mut listings: Vec<MemberListing> = store::scan_members(paths)?
        .iter()
        .map(|m| MemberListing {
            id: m.id.clone(),
            title: m.title.clone(),
            activity: if paths.journal_file(&m.group_slug, &m.member_slug).exists() {
                "in_progress".to_string()
            } else {
                "pending".to_string()
            },
            group: m.group_slug.clone(),
            member: m.member_slug.clone(),
        })
        .collect();
    listings.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(listings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestStore;

    fn seeded_store() -> TestStore {
        let store = TestStore::new().expect("store");
        store
            .add_member("001-auth", "001-user", "001", "User", "pending", Some("001"))
            .expect("member");
        store
            .add_member(
                "001-auth",
                "002-user-auth",
                "005",
                "User Authentication System",
                "pending",
                Some("001"),
            )
            .expect("member");
        store
            .add_member(
                "002-billing",
                "001-invoice",
                "007",
                "Invoice Generation",
                "pending",
                Some("002"),
            )
            .expect("member");
        store
    }

    #[test]
    fn id_forms_resolve_to_the_same_worktree() {
        let store = seeded_store();
        store.add_worktree("001-auth", "007").expect("worktree");
        let paths = store.paths();

        for query in ["7", "07", "007"] {
            let Find::Found(found) = resolve_by_id(&paths, query).expect("resolve") else {
                panic!("'{query}' should resolve");
            };
            assert_eq!(found.member, "007");
            assert_eq!(found.group, "001-auth");
        }
    }

    #[test]
    fn non_numeric_id_is_not_found() {
        let store = seeded_store();
        let outcome = resolve_by_id(&store.paths(), "user-auth").expect("resolve");
        assert!(matches!(outcome, Find::NotFound(_)));
    }

    #[test]
    fn missing_worktree_id_is_not_found() {
        let store = seeded_store();
        let outcome = resolve_by_id(&store.paths(), "042").expect("resolve");
        assert!(matches!(outcome, Find::NotFound(_)));
    }

    #[test]
    fn exact_title_match_short_circuits_substring_candidates() {
        let store = seeded_store();
        let Find::Found(found) = resolve_by_name(&store.paths(), "User").expect("resolve") else {
            panic!("exact title should win");
        };
        assert_eq!(found.id, "001");
    }

    #[test]
    fn single_substring_match_resolves() {
        let store = seeded_store();
        let Find::Found(found) = resolve_by_name(&store.paths(), "invoice").expect("resolve")
        else {
            panic!("single candidate should resolve");
        };
        assert_eq!(found.id, "007");
    }

    #[test]
    fn separator_and_case_variants_match() {
        let store = seeded_store();
        let Find::Found(found) =
            resolve_by_name(&store.paths(), "INVOICE_GENERATION").expect("resolve")
        else {
            panic!("normalized query should match");
        };
        assert_eq!(found.id, "007");
    }

    #[test]
    fn multiple_substring_matches_are_ambiguous() {
        let store = seeded_store();
        store
            .add_member(
                "002-billing",
                "002-invoice-email",
                "008",
                "Invoice Email",
                "pending",
                Some("002"),
            )
            .expect("member");
        let outcome = resolve_by_name(&store.paths(), "invoice").expect("resolve");
        let Find::Ambiguous(candidates) = outcome else {
            panic!("expected ambiguity");
        };
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn name_miss_is_not_found() {
        let store = seeded_store();
        let outcome = resolve_by_name(&store.paths(), "payments").expect("resolve");
        assert!(matches!(outcome, Find::NotFound(_)));
    }

    #[test]
    fn match_carries_context_excerpt() {
        let store = seeded_store();
        let Find::Found(found) = resolve_by_name(&store.paths(), "invoice").expect("resolve")
        else {
            panic!("should resolve");
        };
        assert!(found.context.contains("Context for Invoice Generation"));
    }

    #[test]
    fn group_prefix_gathers_members() {
        let store = seeded_store();
        let Find::Found(group) = resolve_by_group(&store.paths(), "001-auth").expect("resolve")
        else {
            panic!("group should resolve");
        };
        assert_eq!(group.group_id, "001");
        assert_eq!(group.members.len(), 2);
        assert_eq!(group.message, None);
    }

    #[test]
    fn empty_group_is_found_with_a_message() {
        let store = seeded_store();
        store.add_group("003-search").expect("group");
        let Find::Found(group) = resolve_by_group(&store.paths(), "003").expect("resolve") else {
            panic!("empty group should still be found");
        };
        assert!(group.members.is_empty());
        assert!(group.message.is_some());
    }

    #[test]
    fn unknown_group_prefix_is_not_found() {
        let store = seeded_store();
        let outcome = resolve_by_group(&store.paths(), "099").expect("resolve");
        assert!(matches!(outcome, Find::NotFound(_)));
    }

    #[test]
    fn container_matching_uses_folder_names_only() {
        let store = seeded_store();
        let Find::Found(found) = resolve_container(&store.paths(), "001-auth").expect("resolve")
        else {
            panic!("exact slug should resolve");
        };
        assert_eq!(found.group, "001-auth");

        let Find::Found(found) = resolve_container(&store.paths(), "billing").expect("resolve")
        else {
            panic!("substring slug should resolve");
        };
        assert_eq!(found.group, "002-billing");
    }

    #[test]
    fn container_matching_folds_underscores_in_folder_names() {
        let store = seeded_store();
        store.add_group("004_legacy_import").expect("group");

        let Find::Found(found) =
            resolve_container(&store.paths(), "004-legacy-import").expect("resolve")
        else {
            panic!("underscore slug should match its hyphen form");
        };
        assert_eq!(found.group, "004_legacy_import");
    }

    #[test]
    fn combined_chain_prefers_id_then_name_then_group() {
        let store = seeded_store();
        store.add_worktree("001-auth", "002-user-auth").expect("worktree");
        let paths = store.paths();

        let resolution = resolve_identifier(&paths, "User").expect("resolve");
        assert!(matches!(resolution, Resolution::Member(ref m) if m.id == "001"));

        let resolution = resolve_identifier(&paths, "002-billing").expect("resolve");
        assert!(matches!(resolution, Resolution::Group(ref g) if g.group_id == "002"));

        let resolution = resolve_identifier(&paths, "nothing-here").expect("resolve");
        assert!(matches!(resolution, Resolution::NotFound { .. }));
    }

    #[test]
    fn ambiguity_halts_the_chain() {
        let store = seeded_store();
        store.add_group("005-sync").expect("group");
        store
            .add_member(
                "005-sync",
                "001-old",
                "010",
                "Old 005-sync migration",
                "pending",
                Some("005"),
            )
            .expect("member");
        store
            .add_member(
                "005-sync",
                "002-new",
                "011",
                "New 005-sync rollout",
                "pending",
                Some("005"),
            )
            .expect("member");

        // The query's name matching is ambiguous; the group prefix 005
        // would also resolve, but must not be consulted.
        let resolution = resolve_identifier(&store.paths(), "005-sync").expect("resolve");
        assert!(matches!(resolution, Resolution::Ambiguous(_)));
    }

    #[test]
    fn worktree_validation_distinguishes_missing_from_non_directory() {
        let store = seeded_store();
        let worktree = store.add_worktree("001-auth", "001-user").expect("worktree");
        assert!(validate_worktree(&worktree).is_ok());

        let missing = store.paths().worktree("001-auth", "099-absent");
        let err = validate_worktree(&missing).expect_err("missing should fail");
        assert!(format!("{err:#}").contains("not found"));

        let file_path = store.root().join("plain-file");
        std::fs::write(&file_path, "x").expect("write");
        let err = validate_worktree(&file_path).expect_err("file should fail");
        assert!(format!("{err:#}").contains("not a directory"));
    }

    #[test]
    fn member_file_validation_reports_distinct_failures() {
        let store = seeded_store();
        let worktree = store.add_worktree("001-auth", "001-user").expect("worktree");

        assert_eq!(
            validate_member_file(&worktree, "001-auth", "001-user"),
            Ok(())
        );
        assert!(matches!(
            validate_member_file(&worktree, "001-auth", "099-absent"),
            Err(MemberFileError::ContainerMissing(_))
        ));

        let empty_dir = worktree
            .join(".foreman")
            .join("groups")
            .join("001-auth")
            .join("members")
            .join("003-bare");
        std::fs::create_dir_all(&empty_dir).expect("dirs");
        assert!(matches!(
            validate_member_file(&worktree, "001-auth", "003-bare"),
            Err(MemberFileError::FileMissing(_))
        ));

        std::fs::write(empty_dir.join("member.md"), "no metadata\n").expect("write");
        assert!(matches!(
            validate_member_file(&worktree, "001-auth", "003-bare"),
            Err(MemberFileError::Malformed(_))
        ));
    }

    #[test]
    fn check_blocked_reads_the_journal() {
        let store = seeded_store();
        let paths = store.paths();
        assert_eq!(check_blocked(&paths, "001-auth", "001-user").expect("check"), None);

        store
            .add_journal("001-auth", "001-user", "## Blocker: waiting on schema review\n")
            .expect("journal");
        assert_eq!(
            check_blocked(&paths, "001-auth", "001-user").expect("check"),
            Some("waiting on schema review".to_string())
        );
    }

    #[test]
    fn listing_derives_activity_from_journals_and_sorts_by_id() {
        let store = seeded_store();
        store
            .add_journal("002-billing", "001-invoice", "# Journal\n")
            .expect("journal");

        let listings = list_members(&store.paths()).expect("list");
        let ids: Vec<_> = listings.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["001", "005", "007"]);
        assert_eq!(listings[0].activity, "pending");
        assert_eq!(listings[2].activity, "in_progress");
    }
}
