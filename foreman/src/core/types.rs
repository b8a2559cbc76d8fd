//! Shared result types for worker sessions and supervisor runs.

use serde::{Deserialize, Serialize};

/// Terminal signal a worker reports at the end of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkerStatus {
    /// Progress was made but the unit of work is not done.
    Ongoing,
    /// The unit of work is complete.
    Finish,
    /// The worker cannot proceed without outside help.
    Blocked,
}

impl WorkerStatus {
    /// Parse the wire form (`ONGOING` / `FINISH` / `BLOCKED`). Case-sensitive.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ONGOING" => Some(Self::Ongoing),
            "FINISH" => Some(Self::Finish),
            "BLOCKED" => Some(Self::Blocked),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ongoing => "ONGOING",
            Self::Finish => "FINISH",
            Self::Blocked => "BLOCKED",
        }
    }
}

/// One worker session's structured payload, already validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerOutput {
    pub status: WorkerStatus,
    pub summary: String,
    pub blocker: Option<String>,
}

/// Why a supervisor run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoopStatus {
    /// A worker reported the unit of work complete.
    Finish,
    /// A worker reported it cannot proceed.
    Blocked,
    /// The wall-clock budget was exhausted before a cycle could start.
    Timeout,
    /// The cycle budget was exhausted with work still ongoing.
    MaxCycles,
    /// The supervisor itself failed (bad preconditions, spawn or parse failure).
    Error,
}

/// Final report of a supervisor run. Always produced, even on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopReport {
    pub status: LoopStatus,
    /// Per-cycle summaries joined with `" | "`, or the failure description.
    pub summary: String,
    pub cycles: u32,
    /// Wall-clock minutes from loop entry to exit, rounded to two decimals.
    pub elapsed_minutes: f64,
    pub blocker: Option<String>,
    pub group: String,
    pub member: String,
}
