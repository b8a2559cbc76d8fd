//! I/O helpers for supervisor commands.

pub mod config;
pub mod prompt;
pub mod spawn;
pub mod store;
