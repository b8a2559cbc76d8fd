//! Command-line entry point for the supervisor.

use std::io::Read as _;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{Value, json};
use tracing::warn;

use foreman::core::types::{LoopReport, LoopStatus};
use foreman::exit_codes;
use foreman::hook::{self, HookOutcome};
use foreman::io::config::load_config;
use foreman::io::spawn::ClaudeSpawner;
use foreman::io::store::{self, StorePaths};
use foreman::logging;
use foreman::looping::{LoopConfig, SystemClock, run_loop};
use foreman::resolve::{self, ContainerMatch, Find, GroupMatch, MemberMatch, Resolution};

/// Plugin installation root, holding the worker prompt.
const ENV_PLUGIN_ROOT: &str = "FOREMAN_PLUGIN_ROOT";
/// Project directory holding the `.foreman/` store.
const ENV_PROJECT_DIR: &str = "FOREMAN_PROJECT_DIR";

#[derive(Parser)]
#[command(
    name = "foreman",
    version,
    about = "Supervise autonomous worker sessions over scoped units of work"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve an identifier and run worker sessions to completion.
    Run {
        /// Member id, name fragment, or group prefix.
        identifier: String,
        /// Override the configured cycle budget.
        #[arg(long)]
        max_cycles: Option<u32>,
        /// Override the configured time budget, in minutes.
        #[arg(long)]
        max_time: Option<u64>,
        /// Override the configured model.
        #[arg(long)]
        model: Option<String>,
    },
    /// Resolve an identifier and print the outcome as JSON.
    Resolve {
        query: String,
        /// Restrict resolution to one strategy.
        #[arg(long, value_enum, default_value_t = Mode::Auto)]
        mode: Mode,
    },
    /// Create the `.foreman/` store scaffolding and a default config.
    Init,
    /// List every member with a derived activity status.
    List,
    /// Validate a tool payload from stdin against the session scope.
    ScopeCheck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Auto,
    Id,
    Name,
    Group,
    Container,
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match cli.command {
        Command::Run {
            identifier,
            max_cycles,
            max_time,
            model,
        } => cmd_run(&identifier, max_cycles, max_time, model),
        Command::Resolve { query, mode } => cmd_resolve(&query, mode),
        Command::Init => cmd_init(),
        Command::List => cmd_list(),
        Command::ScopeCheck => cmd_scope_check(),
    };
    std::process::exit(code);
}

fn cmd_run(
    identifier: &str,
    max_cycles: Option<u32>,
    max_time: Option<u64>,
    model: Option<String>,
) -> i32 {
    let (plugin_root, project_dir) = match required_env() {
        Ok(dirs) => dirs,
        Err(err) => return print_error_report(identifier, &format!("{err:#}")),
    };
    let paths = StorePaths::new(&project_dir);
    let config = match load_config(&paths.config_path) {
        Ok(config) => config,
        Err(err) => return print_error_report(identifier, &format!("{err:#}")),
    };

    let member = match resolve::resolve_identifier(&paths, identifier) {
        Ok(Resolution::Member(member)) => member,
        Ok(Resolution::Ambiguous(candidates)) => {
            print_json(&json!({
                "resolved": false,
                "error": format!("'{identifier}' matches more than one member"),
                "members": candidates,
            }));
            return exit_codes::ERROR;
        }
        Ok(Resolution::Group(group)) => {
            // A group is not runnable; show its roster instead.
            print_json(&group_json(&group));
            return exit_codes::OK;
        }
        Ok(Resolution::NotFound { reason }) => {
            let available = resolve::list_members(&paths).unwrap_or_default();
            print_json(&json!({
                "resolved": false,
                "error": reason,
                "available": available,
            }));
            return exit_codes::ERROR;
        }
        Err(err) => return print_error_report(identifier, &format!("{err:#}")),
    };

    if let Ok(Some(blocker)) = resolve::check_blocked(&paths, &member.group, &member.member) {
        warn!(blocker = %blocker, "member journal has an open blocker");
    }

    let cfg = LoopConfig {
        group: member.group.clone(),
        member: member.member.clone(),
        max_cycles: max_cycles.unwrap_or(config.max_cycles),
        max_time: Duration::from_secs(max_time.unwrap_or(config.max_time_minutes) * 60),
        model: model.unwrap_or(config.model),
        project_dir,
        plugin_root,
        spawn_output_limit_bytes: config.spawn_output_limit_bytes,
    };
    let report = run_loop(&cfg, &ClaudeSpawner, &SystemClock);
    print_report(&report);
    match report.status {
        LoopStatus::Error => exit_codes::ERROR,
        _ => exit_codes::OK,
    }
}

fn cmd_resolve(query: &str, mode: Mode) -> i32 {
    let project_dir = match env_path(ENV_PROJECT_DIR) {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("{err:#}");
            return exit_codes::ERROR;
        }
    };
    let paths = StorePaths::new(&project_dir);
    let outcome = match mode {
        Mode::Auto => resolve::resolve_identifier(&paths, query).map(resolution_json),
        Mode::Id => resolve::resolve_by_id(&paths, query).map(member_find_json),
        Mode::Name => resolve::resolve_by_name(&paths, query).map(member_find_json),
        Mode::Group => resolve::resolve_by_group(&paths, query).map(group_find_json),
        Mode::Container => resolve::resolve_container(&paths, query).map(container_find_json),
    };
    match outcome {
        Ok(value) => {
            print_json(&value);
            exit_codes::OK
        }
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::ERROR
        }
    }
}

fn cmd_init() -> i32 {
    let project_dir = match env_path(ENV_PROJECT_DIR) {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("{err:#}");
            return exit_codes::ERROR;
        }
    };
    let paths = StorePaths::new(&project_dir);
    match store::init_store(&paths) {
        Ok(()) => {
            println!("{}", paths.store_dir.display());
            exit_codes::OK
        }
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::ERROR
        }
    }
}

fn cmd_list() -> i32 {
    let project_dir = match env_path(ENV_PROJECT_DIR) {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("{err:#}");
            return exit_codes::ERROR;
        }
    };
    let paths = StorePaths::new(&project_dir);
    match resolve::list_members(&paths) {
        Ok(listings) => match serde_json::to_string_pretty(&listings) {
            Ok(text) => {
                println!("{text}");
                exit_codes::OK
            }
            Err(err) => {
                eprintln!("serialize listing: {err}");
                exit_codes::ERROR
            }
        },
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::ERROR
        }
    }
}

fn cmd_scope_check() -> i32 {
    let identity = match hook::identity_from_env() {
        Ok(identity) => identity,
        Err(message) => {
            eprintln!("{message}");
            return exit_codes::SCOPE_BLOCKED;
        }
    };
    let mut payload = String::new();
    if std::io::stdin().read_to_string(&mut payload).is_err() {
        eprintln!("scope-check: failed to read tool payload from stdin");
        return exit_codes::SCOPE_BLOCKED;
    }
    match hook::evaluate_payload(&identity, &payload) {
        HookOutcome::Allowed => exit_codes::OK,
        HookOutcome::Blocked(message) => {
            eprintln!("{message}");
            exit_codes::SCOPE_BLOCKED
        }
    }
}

fn resolution_json(resolution: Resolution) -> Value {
    match resolution {
        Resolution::Member(member) => json!({ "resolved": true, "member": member }),
        Resolution::Ambiguous(candidates) => {
            json!({ "resolved": false, "members": candidates })
        }
        Resolution::Group(group) => group_json(&group),
        Resolution::NotFound { reason } => json!({ "resolved": false, "error": reason }),
    }
}

fn member_find_json(find: Find<MemberMatch>) -> Value {
    match find {
        Find::Found(member) => json!({ "resolved": true, "member": member }),
        Find::Ambiguous(candidates) => json!({ "resolved": false, "members": candidates }),
        Find::NotFound(reason) => json!({ "resolved": false, "error": reason }),
    }
}

fn group_find_json(find: Find<GroupMatch>) -> Value {
    match find {
        Find::Found(group) => group_json(&group),
        Find::Ambiguous(groups) => json!({ "resolved": false, "groups": groups }),
        Find::NotFound(reason) => json!({ "resolved": false, "error": reason }),
    }
}

fn container_find_json(find: Find<ContainerMatch>) -> Value {
    match find {
        Find::Found(container) => json!({ "resolved": true, "group": container.group }),
        Find::Ambiguous(containers) => {
            let groups: Vec<&str> = containers.iter().map(|c| c.group.as_str()).collect();
            json!({ "resolved": false, "groups": groups })
        }
        Find::NotFound(reason) => json!({ "resolved": false, "error": reason }),
    }
}

fn group_json(group: &GroupMatch) -> Value {
    json!({
        "resolved": true,
        "group_id": group.group_id,
        "members": group.members,
        "message": group.message,
    })
}

fn print_error_report(identifier: &str, summary: &str) -> i32 {
    print_report(&LoopReport {
        status: LoopStatus::Error,
        summary: summary.to_string(),
        cycles: 0,
        elapsed_minutes: 0.0,
        blocker: None,
        group: String::new(),
        member: identifier.to_string(),
    });
    exit_codes::ERROR
}

fn print_report(report: &LoopReport) {
    match serde_json::to_string_pretty(report) {
        Ok(text) => println!("{text}"),
        Err(err) => eprintln!("serialize report: {err}"),
    }
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(err) => eprintln!("serialize output: {err}"),
    }
}

fn required_env() -> Result<(PathBuf, PathBuf)> {
    Ok((env_path(ENV_PLUGIN_ROOT)?, env_path(ENV_PROJECT_DIR)?))
}

fn env_path(name: &str) -> Result<PathBuf> {
    std::env::var_os(name)
        .map(PathBuf::from)
        .with_context(|| format!("{name} is not set"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_parses_budget_overrides() {
        let cli = Cli::parse_from([
            "foreman",
            "run",
            "007",
            "--max-cycles",
            "3",
            "--max-time",
            "45",
            "--model",
            "sonnet",
        ]);
        let Command::Run {
            identifier,
            max_cycles,
            max_time,
            model,
        } = cli.command
        else {
            panic!("expected run command");
        };
        assert_eq!(identifier, "007");
        assert_eq!(max_cycles, Some(3));
        assert_eq!(max_time, Some(45));
        assert_eq!(model.as_deref(), Some("sonnet"));
    }

    #[test]
    fn init_takes_no_arguments() {
        let cli = Cli::parse_from(["foreman", "init"]);
        assert!(matches!(cli.command, Command::Init));
    }

    #[test]
    fn resolve_mode_defaults_to_auto() {
        let cli = Cli::parse_from(["foreman", "resolve", "user-auth"]);
        let Command::Resolve { query, mode } = cli.command else {
            panic!("expected resolve command");
        };
        assert_eq!(query, "user-auth");
        assert_eq!(mode, Mode::Auto);
    }

    #[test]
    fn resolve_accepts_explicit_modes() {
        for (flag, expected) in [
            ("id", Mode::Id),
            ("name", Mode::Name),
            ("group", Mode::Group),
            ("container", Mode::Container),
        ] {
            let cli = Cli::parse_from(["foreman", "resolve", "q", "--mode", flag]);
            let Command::Resolve { mode, .. } = cli.command else {
                panic!("expected resolve command");
            };
            assert_eq!(mode, expected);
        }
    }
}
