//! Store layout under `.foreman/` and member scanning.
//!
//! ```text
//! .foreman/
//!   config.toml
//!   groups/<group-slug>/members/<member-slug>/{member.md, journal.md}
//!   worktrees/<group-slug>/<member-slug>/
//!   archive/
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::front_matter;
use crate::io::config::{ForemanConfig, write_config};

/// Name of the store directory at the project root.
pub const STORE_DIR: &str = ".foreman";
/// Metadata document for one unit of work.
pub const MEMBER_FILE: &str = "member.md";
/// Worker session journal alongside the member file.
pub const JOURNAL_FILE: &str = "journal.md";

/// Resolved paths into one project's store.
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub root: PathBuf,
    pub store_dir: PathBuf,
    pub groups_dir: PathBuf,
    pub worktrees_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub config_path: PathBuf,
}

impl StorePaths {
    pub fn new(root: &Path) -> Self {
        let store_dir = root.join(STORE_DIR);
        Self {
            root: root.to_path_buf(),
            groups_dir: store_dir.join("groups"),
            worktrees_dir: store_dir.join("worktrees"),
            archive_dir: store_dir.join("archive"),
            config_path: store_dir.join("config.toml"),
            store_dir,
        }
    }

    pub fn group_dir(&self, group: &str) -> PathBuf {
        self.groups_dir.join(group)
    }

    pub fn member_dir(&self, group: &str, member: &str) -> PathBuf {
        self.group_dir(group).join("members").join(member)
    }

    pub fn member_file(&self, group: &str, member: &str) -> PathBuf {
        self.member_dir(group, member).join(MEMBER_FILE)
    }

    pub fn journal_file(&self, group: &str, member: &str) -> PathBuf {
        self.member_dir(group, member).join(JOURNAL_FILE)
    }

    pub fn worktree(&self, group: &str, member: &str) -> PathBuf {
        self.worktrees_dir.join(group).join(member)
    }
}

/// Create `.foreman/` scaffolding in the project root.
///
/// Idempotent: existing directories are kept and an existing config
/// file is left untouched; only a missing config gets the defaults.
pub fn init_store(paths: &StorePaths) -> Result<()> {
    for dir in [
        &paths.store_dir,
        &paths.groups_dir,
        &paths.worktrees_dir,
        &paths.archive_dir,
    ] {
        fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
    }
    if !paths.config_path.exists() {
        write_config(&paths.config_path, &ForemanConfig::default())?;
    }
    Ok(())
}

/// One member discovered by scanning the store, with its parsed metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedMember {
    pub group_slug: String,
    pub member_slug: String,
    /// `id` field from the metadata block, falling back to the folder name.
    pub id: String,
    pub title: String,
    pub status: String,
    /// `group` field naming the parent group id, when present.
    pub parent_group: Option<String>,
    pub body: String,
    pub member_path: PathBuf,
    pub worktree_path: PathBuf,
}

/// Sorted group folder names under `groups/`.
pub fn scan_group_slugs(paths: &StorePaths) -> Result<Vec<String>> {
    sorted_dir_names(&paths.groups_dir)
}

/// Sorted member folder names under `worktrees/<group>/`, grouped by group.
pub fn scan_worktree_groups(paths: &StorePaths) -> Result<Vec<String>> {
    if !paths.worktrees_dir.exists() {
        return Ok(Vec::new());
    }
    sorted_dir_names(&paths.worktrees_dir)
}

/// Every member in the store with a readable `member.md`, in group then
/// member folder order. Folders without a member file are skipped.
pub fn scan_members(paths: &StorePaths) -> Result<Vec<ScannedMember>> {
    let mut members = Vec::new();
    if !paths.groups_dir.exists() {
        return Ok(members);
    }
    for group_slug in scan_group_slugs(paths)? {
        let members_dir = paths.group_dir(&group_slug).join("members");
        if !members_dir.exists() {
            continue;
        }
        for member_slug in sorted_dir_names(&members_dir)? {
            let member_path = paths.member_file(&group_slug, &member_slug);
            if !member_path.exists() {
                debug!(group = %group_slug, member = %member_slug, "no member file, skipping");
                continue;
            }
            let contents = fs::read_to_string(&member_path)
                .with_context(|| format!("read {}", member_path.display()))?;
            let (record, body) = front_matter::parse(&contents);
            members.push(ScannedMember {
                id: record.str("id").unwrap_or(&member_slug).to_string(),
                title: record.str("title").unwrap_or_default().to_string(),
                status: record.str("status").unwrap_or_default().to_string(),
                parent_group: record.str("group").map(str::to_string),
                body,
                worktree_path: paths.worktree(&group_slug, &member_slug),
                member_path,
                group_slug: group_slug.clone(),
                member_slug,
            });
        }
    }
    Ok(members)
}

fn sorted_dir_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let entries = fs::read_dir(dir).with_context(|| format!("read directory {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
        if entry.path().is_dir()
            && let Ok(name) = entry.file_name().into_string()
        {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
