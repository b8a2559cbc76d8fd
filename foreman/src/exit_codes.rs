//! Stable exit codes for foreman CLI commands.

/// Command succeeded; for `run`, any clean terminal outcome.
pub const OK: i32 = 0;
/// Command failed: bad preconditions, resolution failure, or a run that
/// ended in ERROR.
pub const ERROR: i32 = 1;
/// `foreman scope-check` denied the tool call (or was misconfigured).
pub const SCOPE_BLOCKED: i32 = 2;
