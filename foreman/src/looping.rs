//! The supervisor loop: spawn worker sessions until a terminal signal
//! or a budget runs out.
//!
//! The loop itself never returns an error. Every failure path folds
//! into a [`LoopReport`] with `ERROR` status so callers always have one
//! report to print: precondition failures carry zero cycles, in-cycle
//! failures carry the count reached so far.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::core::output::parse_worker_output;
use crate::core::scope::ScopeIdentity;
use crate::core::types::{LoopReport, LoopStatus, WorkerStatus};
use crate::io::prompt::{PromptContext, compose_worker_prompt, load_worker_prompt};
use crate::io::spawn::{SpawnRequest, WorkerSpawner, build_scope_settings};
use crate::io::store::{self, StorePaths};
use crate::resolve::{validate_member_file, validate_worktree};

/// Time source seam so tests can script budget expiry.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall clock used in production.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Everything one supervisor run needs, resolved up front. No
/// environment reads happen inside the loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub group: String,
    pub member: String,
    pub max_cycles: u32,
    pub max_time: Duration,
    pub model: String,
    pub project_dir: PathBuf,
    pub plugin_root: PathBuf,
    pub spawn_output_limit_bytes: usize,
}

/// Run worker sessions for one unit of work until FINISH, BLOCKED, or a
/// budget is exhausted.
#[instrument(skip_all, fields(group = %cfg.group, member = %cfg.member))]
pub fn run_loop<S: WorkerSpawner, C: Clock>(cfg: &LoopConfig, spawner: &S, clock: &C) -> LoopReport {
    let paths = StorePaths::new(&cfg.project_dir);
    let worktree = paths.worktree(&cfg.group, &cfg.member);

    let prompt = match prepare_prompt(cfg, &paths) {
        Ok(prompt) => prompt,
        Err(err) => return error_report(cfg, format!("{err:#}"), 0, 0.0),
    };
    let identity = ScopeIdentity::new(cfg.group.clone(), cfg.member.clone());
    let settings = build_scope_settings(&identity);

    let start = clock.now();
    let mut cycles = 0u32;
    let mut summaries: Vec<String> = Vec::new();
    let mut blocker = None;
    let mut outcome = None;

    while cycles < cfg.max_cycles {
        // Budget check happens before each spawn, never mid-session.
        let elapsed = clock.now().saturating_duration_since(start);
        if elapsed >= cfg.max_time {
            warn!(cycles, "time budget exhausted before next cycle");
            outcome = Some(LoopStatus::Timeout);
            break;
        }
        cycles += 1;
        debug!(cycle = cycles, "spawning worker session");

        let request = SpawnRequest {
            workdir: worktree.clone(),
            prompt: prompt.clone(),
            model: cfg.model.clone(),
            settings: settings.clone(),
            output_limit_bytes: cfg.spawn_output_limit_bytes,
        };
        let raw = match spawner.spawn(&request) {
            Ok(raw) => raw,
            Err(err) => {
                return error_report(
                    cfg,
                    format!("{err:#}"),
                    cycles,
                    elapsed_minutes(clock, start),
                );
            }
        };
        let parsed = match parse_worker_output(&raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                return error_report(cfg, err.to_string(), cycles, elapsed_minutes(clock, start));
            }
        };

        summaries.push(parsed.summary);
        match parsed.status {
            WorkerStatus::Finish => {
                info!(cycle = cycles, "worker reported finish");
                outcome = Some(LoopStatus::Finish);
                break;
            }
            WorkerStatus::Blocked => {
                warn!(cycle = cycles, blocker = ?parsed.blocker, "worker reported blocked");
                blocker = parsed.blocker;
                outcome = Some(LoopStatus::Blocked);
                break;
            }
            WorkerStatus::Ongoing => {
                info!(cycle = cycles, "worker ongoing, continuing");
            }
        }
    }

    LoopReport {
        status: outcome.unwrap_or(LoopStatus::MaxCycles),
        summary: combine_summaries(&summaries),
        cycles,
        elapsed_minutes: elapsed_minutes(clock, start),
        blocker,
        group: cfg.group.clone(),
        member: cfg.member.clone(),
    }
}

/// Validate preconditions and assemble the session prompt.
fn prepare_prompt(cfg: &LoopConfig, paths: &StorePaths) -> Result<String> {
    let worktree = paths.worktree(&cfg.group, &cfg.member);
    validate_worktree(&worktree)?;
    validate_member_file(&worktree, &cfg.group, &cfg.member)?;

    let base = load_worker_prompt(&cfg.plugin_root)?;
    let member_dir = format!(
        "{}/groups/{}/members/{}",
        store::STORE_DIR,
        cfg.group,
        cfg.member
    );
    compose_worker_prompt(
        &base,
        &PromptContext {
            worktree: worktree.display().to_string(),
            group: cfg.group.clone(),
            member: cfg.member.clone(),
            member_dir,
            project_dir: cfg.project_dir.display().to_string(),
            plugin_root: cfg.plugin_root.display().to_string(),
        },
    )
}

fn error_report(cfg: &LoopConfig, summary: String, cycles: u32, elapsed: f64) -> LoopReport {
    LoopReport {
        status: LoopStatus::Error,
        summary,
        cycles,
        elapsed_minutes: elapsed,
        blocker: None,
        group: cfg.group.clone(),
        member: cfg.member.clone(),
    }
}

fn combine_summaries(summaries: &[String]) -> String {
    match summaries {
        [single] => single.clone(),
        many => many.join(" | "),
    }
}

fn elapsed_minutes<C: Clock>(clock: &C, start: Instant) -> f64 {
    let minutes = clock.now().saturating_duration_since(start).as_secs_f64() / 60.0;
    (minutes * 100.0).round() / 100.0
}
