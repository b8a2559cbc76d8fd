//! The `scope-check` hook: validate a tool payload against the
//! session's assigned scope.
//!
//! The worker CLI invokes this before each file tool call, passing the
//! tool payload on stdin. Identity comes from environment variables the
//! supervisor injected into the session settings. A missing identity is
//! a configuration error, reported distinctly from a scope denial so
//! operators can tell misconfiguration from enforcement.

use std::env;

use serde_json::Value;
use tracing::debug;

use crate::core::scope::{
    self, DenyReason, GROUPS_SEGMENT, MEMBERS_SEGMENT, ScopeDecision, ScopeIdentity,
};
use crate::io::store::STORE_DIR;

/// Group the running session is scoped to.
pub const ENV_GROUP: &str = "FOREMAN_GROUP";
/// Member the running session is scoped to.
pub const ENV_MEMBER: &str = "FOREMAN_MEMBER";

/// Outcome of one hook invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    Allowed,
    /// Denied, with the message to surface to the worker.
    Blocked(String),
}

/// Read the session identity from the environment.
///
/// Returns the operator-facing message when a variable is missing or
/// empty.
pub fn identity_from_env() -> Result<ScopeIdentity, String> {
    let group = non_empty_var(ENV_GROUP)?;
    let member = non_empty_var(ENV_MEMBER)?;
    Ok(ScopeIdentity::new(group, member))
}

fn non_empty_var(name: &str) -> Result<String, String> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| {
            format!(
                "scope-check misconfigured: {name} is not set; \
                 refusing the tool call rather than running unscoped"
            )
        })
}

/// Evaluate one tool payload. Payloads without a file path are allowed:
/// only file access is scoped.
pub fn evaluate_payload(identity: &ScopeIdentity, payload: &str) -> HookOutcome {
    let Some(path) = extract_file_path(payload) else {
        debug!("payload carries no file path, allowing");
        return HookOutcome::Allowed;
    };
    match scope::evaluate(&path, identity) {
        ScopeDecision::Allow => HookOutcome::Allowed,
        ScopeDecision::Deny(reason) => {
            HookOutcome::Blocked(render_violation(&path, identity, &reason))
        }
    }
}

/// Pull the target path out of a tool payload (`tool_input.file_path`,
/// falling back to `tool_input.path`). Unparseable payloads yield none.
fn extract_file_path(payload: &str) -> Option<String> {
    let value: Value = serde_json::from_str(payload).ok()?;
    let tool_input = value.get("tool_input")?;
    tool_input
        .get("file_path")
        .or_else(|| tool_input.get("path"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn render_violation(path: &str, identity: &ScopeIdentity, reason: &DenyReason) -> String {
    let headline = match reason {
        DenyReason::Archive => "archived work is read-only during execution".to_string(),
        DenyReason::WrongGroup { requested } => {
            format!("group '{requested}' belongs to another unit of work")
        }
        DenyReason::WrongMember { requested } => {
            format!("member '{requested}' belongs to another unit of work")
        }
    };
    let allowed = format!(
        "{STORE_DIR}/{GROUPS_SEGMENT}/{}/{MEMBERS_SEGMENT}/{}/",
        identity.group, identity.member
    );
    format!(
        "SCOPE VIOLATION: {headline}\n\
         Attempted path: {path}\n\
         Your scope is limited to:\n  \
         Group: {}\n  \
         Member: {}\n  \
         Allowed: {allowed}\n\
         To change other members, a separate run must be started for them.",
        identity.group, identity.member
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn identity() -> ScopeIdentity {
        ScopeIdentity::new("001-auth", "002-login")
    }

    fn payload_for(path: &str) -> String {
        json!({ "tool_name": "Write", "tool_input": { "file_path": path } }).to_string()
    }

    #[test]
    fn in_scope_write_is_allowed() {
        let payload = payload_for(".foreman/groups/001-auth/members/002-login/journal.md");
        assert_eq!(evaluate_payload(&identity(), &payload), HookOutcome::Allowed);
    }

    #[test]
    fn cross_member_write_is_blocked_with_permitted_subtree() {
        let payload = payload_for(".foreman/groups/001-auth/members/003-logout/member.md");
        let HookOutcome::Blocked(message) = evaluate_payload(&identity(), &payload) else {
            panic!("expected a denial");
        };
        assert!(message.contains("SCOPE VIOLATION"));
        assert!(message.contains(".foreman/groups/001-auth/members/002-login/"));
        assert!(message.contains("003-logout"));
    }

    #[test]
    fn archive_write_is_blocked() {
        let payload = payload_for(".foreman/archive/groups/001-auth/old.md");
        let HookOutcome::Blocked(message) = evaluate_payload(&identity(), &payload) else {
            panic!("expected a denial");
        };
        assert!(message.contains("read-only"));
    }

    #[test]
    fn payload_without_a_path_is_allowed() {
        let payload = json!({ "tool_name": "Bash", "tool_input": { "command": "ls" } }).to_string();
        assert_eq!(evaluate_payload(&identity(), &payload), HookOutcome::Allowed);
        assert_eq!(evaluate_payload(&identity(), "{}"), HookOutcome::Allowed);
    }

    #[test]
    fn unparseable_payload_is_allowed() {
        assert_eq!(
            evaluate_payload(&identity(), "not json"),
            HookOutcome::Allowed
        );
    }

    #[test]
    fn path_field_is_a_fallback() {
        let payload =
            json!({ "tool_input": { "path": ".foreman/archive/notes.md" } }).to_string();
        assert!(matches!(
            evaluate_payload(&identity(), &payload),
            HookOutcome::Blocked(_)
        ));
    }
}
