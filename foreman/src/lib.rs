//! Supervisor for autonomous worker sessions over scoped units of work.
//!
//! A unit of work lives in a `.foreman/` store as a *member* of a
//! *group*, with its own worktree. The supervisor resolves a loose
//! identifier to one member, then repeatedly spawns headless worker
//! sessions in that worktree until the worker reports `FINISH` or
//! `BLOCKED`, or a cycle/time budget runs out. A scope hook confines
//! each session to its own member's files.
//!
//! Layout follows a core/io split: `core` holds pure decision logic
//! (parsing, matching, policy), `io` holds filesystem and process
//! concerns, and the top-level modules wire them into operations.

pub mod core;
pub mod exit_codes;
pub mod hook;
pub mod io;
pub mod logging;
pub mod looping;
pub mod resolve;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
