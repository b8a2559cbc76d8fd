//! Test-only helpers: a temporary store on disk, scripted worker
//! sessions, and a scripted clock.
//!
//! Compiled for this crate's own tests and for dependents that enable
//! the `test-support` feature.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use serde_json::json;
use tempfile::TempDir;

use crate::io::prompt::{WORKER_PROMPT_FILE, skill_dir};
use crate::io::spawn::{SpawnRequest, WorkerSpawner};
use crate::io::store::{JOURNAL_FILE, MEMBER_FILE, STORE_DIR, StorePaths};
use crate::looping::Clock;

/// A `.foreman/` store rooted in a temporary directory.
pub struct TestStore {
    temp: TempDir,
}

impl TestStore {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create tempdir")?;
        Ok(Self { temp })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn paths(&self) -> StorePaths {
        StorePaths::new(self.root())
    }

    /// Member document text with a standard metadata block.
    pub fn member_md(
        id: &str,
        title: &str,
        status: &str,
        parent_group: Option<&str>,
    ) -> String {
        let mut doc = format!("---\nid: \"{id}\"\ntitle: {title}\nstatus: {status}\n");
        if let Some(group) = parent_group {
            doc.push_str(&format!("group: \"{group}\"\n"));
        }
        doc.push_str(&format!("---\n\n## Context\n\nContext for {title}.\n"));
        doc
    }

    /// Create an empty group folder.
    pub fn add_group(&self, group: &str) -> Result<()> {
        fs::create_dir_all(self.paths().group_dir(group)).context("create group dir")
    }

    /// Create a member with a standard `member.md`.
    pub fn add_member(
        &self,
        group: &str,
        member: &str,
        id: &str,
        title: &str,
        status: &str,
        parent_group: Option<&str>,
    ) -> Result<()> {
        let dir = self.paths().member_dir(group, member);
        fs::create_dir_all(&dir).context("create member dir")?;
        fs::write(
            dir.join(MEMBER_FILE),
            Self::member_md(id, title, status, parent_group),
        )
        .context("write member file")
    }

    /// Write a journal for an existing member.
    pub fn add_journal(&self, group: &str, member: &str, contents: &str) -> Result<()> {
        let dir = self.paths().member_dir(group, member);
        fs::create_dir_all(&dir).context("create member dir")?;
        fs::write(dir.join(JOURNAL_FILE), contents).context("write journal")
    }

    /// Create a worktree for a member, mirroring its member file inside.
    pub fn add_worktree(&self, group: &str, member: &str) -> Result<PathBuf> {
        let worktree = self.paths().worktree(group, member);
        let mirror_dir = worktree
            .join(STORE_DIR)
            .join("groups")
            .join(group)
            .join("members")
            .join(member);
        fs::create_dir_all(&mirror_dir).context("create worktree member dir")?;
        let member_path = self.paths().member_file(group, member);
        let contents = if member_path.exists() {
            fs::read_to_string(&member_path).context("read member file")?
        } else {
            Self::member_md(member, member, "pending", None)
        };
        fs::write(mirror_dir.join(MEMBER_FILE), contents).context("write mirrored member file")?;
        Ok(worktree)
    }

    /// Create a plugin root carrying a minimal worker prompt.
    pub fn add_plugin_root(&self) -> Result<PathBuf> {
        let plugin_root = self.root().join("plugin");
        let dir = skill_dir(&plugin_root);
        fs::create_dir_all(&dir).context("create skill dir")?;
        fs::write(dir.join(WORKER_PROMPT_FILE), "Do the assigned work.\n")
            .context("write worker prompt")?;
        Ok(plugin_root)
    }
}

/// Raw worker stdout for a successful session with the given payload.
pub fn worker_envelope(status: &str, summary: &str, blocker: Option<&str>) -> String {
    json!({
        "type": "result",
        "is_error": false,
        "structured_output": {
            "status": status,
            "summary": summary,
            "blocker": blocker,
        }
    })
    .to_string()
}

/// Spawner that replays scripted stdout strings in order and fails once
/// they run out.
pub struct ScriptedSpawner {
    outputs: RefCell<VecDeque<String>>,
    requests: RefCell<Vec<SpawnRequest>>,
}

impl ScriptedSpawner {
    pub fn new(outputs: Vec<String>) -> Self {
        Self {
            outputs: RefCell::new(outputs.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Requests observed so far, in spawn order.
    pub fn requests(&self) -> Vec<SpawnRequest> {
        self.requests.borrow().clone()
    }
}

impl WorkerSpawner for ScriptedSpawner {
    fn spawn(&self, request: &SpawnRequest) -> Result<String> {
        self.requests.borrow_mut().push(request.clone());
        self.outputs
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted spawner has no output left"))
    }
}

/// Clock that returns scripted offsets from a fixed base, repeating the
/// last offset once the script is exhausted.
pub struct ScriptedClock {
    base: Instant,
    offsets: Vec<Duration>,
    cursor: Cell<usize>,
}

impl ScriptedClock {
    pub fn new(offsets: Vec<Duration>) -> Self {
        Self {
            base: Instant::now(),
            offsets,
            cursor: Cell::new(0),
        }
    }
}

impl Clock for ScriptedClock {
    fn now(&self) -> Instant {
        let idx = self.cursor.get();
        let offset = self
            .offsets
            .get(idx)
            .or_else(|| self.offsets.last())
            .copied()
            .unwrap_or(Duration::ZERO);
        if idx < self.offsets.len() {
            self.cursor.set(idx + 1);
        }
        self.base + offset
    }
}
