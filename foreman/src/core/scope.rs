//! Scope policy: which paths a worker session may touch.
//!
//! Decisions are made over path segments, not filesystem state, so the
//! same policy applies to paths that do not exist yet. Paths outside
//! the store area are always allowed; inside it, a worker is confined
//! to its own group and member, and the archive is off limits entirely.

/// Store segment that holds archived, immutable work.
pub const ARCHIVE_SEGMENT: &str = "archive";
/// Store segment under which groups live.
pub const GROUPS_SEGMENT: &str = "groups";
/// Group segment under which members live.
pub const MEMBERS_SEGMENT: &str = "members";

/// The group and member a worker session is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeIdentity {
    pub group: String,
    pub member: String,
}

impl ScopeIdentity {
    pub fn new(group: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            member: member.into(),
        }
    }
}

/// Outcome of a scope check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeDecision {
    Allow,
    Deny(DenyReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// The path touches the archive area.
    Archive,
    /// The path targets a group other than the assigned one.
    WrongGroup { requested: String },
    /// The path targets another member within the assigned group.
    WrongMember { requested: String },
}

/// Decide whether `path` is inside the worker's permitted area.
pub fn evaluate(path: &str, identity: &ScopeIdentity) -> ScopeDecision {
    let normalized = path.strip_prefix("./").unwrap_or(path);
    let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();

    if segments.iter().any(|s| *s == ARCHIVE_SEGMENT) {
        return ScopeDecision::Deny(DenyReason::Archive);
    }

    // Paths that never pass through a groups/ segment are out of the
    // store's protected area.
    let Some(groups_idx) = segments.iter().position(|s| *s == GROUPS_SEGMENT) else {
        return ScopeDecision::Allow;
    };
    let Some(group) = segments.get(groups_idx + 1) else {
        return ScopeDecision::Allow;
    };
    if *group != identity.group {
        return ScopeDecision::Deny(DenyReason::WrongGroup {
            requested: (*group).to_string(),
        });
    }

    if segments.get(groups_idx + 2).copied() == Some(MEMBERS_SEGMENT)
        && let Some(member) = segments.get(groups_idx + 3)
        && *member != identity.member
    {
        return ScopeDecision::Deny(DenyReason::WrongMember {
            requested: (*member).to_string(),
        });
    }

    ScopeDecision::Allow
}
