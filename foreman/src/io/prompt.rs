//! Worker prompt assembly: base instructions plus a session context header.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;

const CONTEXT_TEMPLATE: &str = include_str!("prompts/context.md");

/// Base worker instructions relative to the plugin's skill directory.
pub const WORKER_PROMPT_FILE: &str = "worker-prompt.md";

/// Directory holding the execute-work skill inside a plugin root.
pub fn skill_dir(plugin_root: &Path) -> PathBuf {
    plugin_root.join("skills").join("execute-work")
}

/// Per-session values rendered into the context header.
#[derive(Debug, Clone, Serialize)]
pub struct PromptContext {
    pub worktree: String,
    pub group: String,
    pub member: String,
    pub member_dir: String,
    pub project_dir: String,
    pub plugin_root: String,
}

/// Read the base worker prompt from the plugin's skill directory.
pub fn load_worker_prompt(plugin_root: &Path) -> Result<String> {
    let path = skill_dir(plugin_root).join(WORKER_PROMPT_FILE);
    fs::read_to_string(&path).with_context(|| format!("read worker prompt {}", path.display()))
}

/// Render the full prompt: context header followed by the base instructions.
pub fn compose_worker_prompt(base: &str, ctx: &PromptContext) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("context", CONTEXT_TEMPLATE)
        .expect("context template should be valid");
    let template = env.get_template("context")?;
    let rendered = template.render(context! {
        worktree => ctx.worktree,
        group => ctx.group,
        member => ctx.member,
        member_dir => ctx.member_dir,
        project_dir => ctx.project_dir,
        plugin_root => ctx.plugin_root,
        base => base.trim(),
    })?;
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_context() -> PromptContext {
        PromptContext {
            worktree: "/work/trees/001-auth/002-login".to_string(),
            group: "001-auth".to_string(),
            member: "002-login".to_string(),
            member_dir: ".foreman/groups/001-auth/members/002-login".to_string(),
            project_dir: "/work/project".to_string(),
            plugin_root: "/opt/plugin".to_string(),
        }
    }

    #[test]
    fn context_header_precedes_base_instructions() {
        let prompt =
            compose_worker_prompt("Do the work.", &sample_context()).expect("compose");
        let header_pos = prompt.find("# Session Context").expect("header");
        let base_pos = prompt.find("Do the work.").expect("base");
        assert!(header_pos < base_pos);
    }

    #[test]
    fn context_fields_are_rendered() {
        let prompt = compose_worker_prompt("Base.", &sample_context()).expect("compose");
        assert!(prompt.contains("/work/trees/001-auth/002-login"));
        assert!(prompt.contains("001-auth"));
        assert!(prompt.contains("002-login"));
        assert!(prompt.contains(".foreman/groups/001-auth/members/002-login/journal.md"));
    }

    #[test]
    fn missing_prompt_file_names_the_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = load_worker_prompt(temp.path()).expect_err("should fail");
        assert!(format!("{err:#}").contains(WORKER_PROMPT_FILE));
    }
}
