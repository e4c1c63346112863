mod clients;
mod integrations;
mod serve;
mod tokens;
mod workflow;

use anyhow::Result;
use console::style;

use crate::core::app::App;
use crate::core::config::AppConfig;
use crate::core::errors::CoreError;
use crate::core::terminal::{self, GuideSection, print_error};

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Server")
        .command("serve", "Start the HTTP API (--host, --port)")
        .print();

    GuideSection::new("Workflow")
        .command("brief create", "Create a draft brief for a client")
        .command("content add", "Attach content to a brief for review")
        .command("transition", "Move a brief to a new status")
        .command("review", "Approve content or request a revision")
        .command("check-transition", "Exit 0 if <from> -> <to> is legal, 1 if not")
        .print();

    GuideSection::new("Integrations")
        .command("sync", "Pull provider data for a client")
        .command("health", "Show provider health (--logs <n> for recent calls)")
        .print();

    GuideSection::new("Access")
        .command("client upsert", "Create or update a client")
        .command("competitor add", "Track a competitor domain for a client")
        .command("access grant", "Grant a user access to a client")
        .command("token create", "Issue an API token for a user")
        .print();

    println!(
        "\n {} {} <command> [options]\n",
        style("Usage:").bold(),
        style("briefline").green()
    );
}

/// Hand-parsed `--name value` pairs, bare `--switch`es and positionals.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct Flags {
    values: Vec<(String, String)>,
    switches: Vec<String>,
    positionals: Vec<String>,
}

impl Flags {
    /// Last value given for any of `names`.
    pub(crate) fn get(&self, names: &[&str]) -> Option<&str> {
        self.values
            .iter()
            .rev()
            .find(|(name, _)| names.contains(&name.as_str()))
            .map(|(_, value)| value.as_str())
    }

    pub(crate) fn all(&self, names: &[&str]) -> Vec<String> {
        self.values
            .iter()
            .filter(|(name, _)| names.contains(&name.as_str()))
            .map(|(_, value)| value.clone())
            .collect()
    }

    pub(crate) fn has(&self, name: &str) -> bool {
        self.switches.iter().any(|s| s == name) || self.values.iter().any(|(n, _)| n == name)
    }

    pub(crate) fn positional(&self, index: usize) -> Option<&str> {
        self.positionals.get(index).map(String::as_str)
    }

    pub(crate) fn require(&self, names: &[&str]) -> Result<&str> {
        self.get(names)
            .ok_or_else(|| anyhow::anyhow!("missing required option {}", names[0]))
    }
}

pub(crate) fn parse_flags(args: &[String], start: usize) -> Flags {
    let mut flags = Flags::default();
    let mut i = start;
    while i < args.len() {
        let arg = &args[i];
        if arg.starts_with('-') && arg.len() > 1 {
            if i + 1 < args.len() && !args[i + 1].starts_with("--") {
                flags.values.push((arg.clone(), args[i + 1].clone()));
                i += 2;
            } else {
                flags.switches.push(arg.clone());
                i += 1;
            }
        } else {
            flags.positionals.push(arg.clone());
            i += 1;
        }
    }
    flags
}

/// Reads config, installs logging and wires the app for one command.
pub(crate) async fn load_app() -> Result<App> {
    let config = AppConfig::from_env()?;
    crate::logging::init(config.log_level);
    App::build(config).await
}

/// Adds the retry hint a bare error message would lose.
pub(crate) fn describe(err: &CoreError) -> String {
    match err.retry_after_secs() {
        Some(secs) => format!("{} (retry after {}s)", err, secs),
        None => err.to_string(),
    }
}

pub async fn run_main() -> Result<i32> {
    let args: Vec<String> = std::env::args().collect();
    let Some(cmd) = args.get(1).map(String::as_str) else {
        print_help();
        return Ok(0);
    };
    let sub_cmd = args.get(2).map(String::as_str).unwrap_or("");

    match cmd {
        "serve" => serve::run_serve(&args).await,
        "sync" => integrations::run_sync(&args).await,
        "health" => integrations::run_health(&args).await,
        "transition" => workflow::run_transition(&args).await,
        "review" => workflow::run_review(&args).await,
        "check-transition" => Ok(workflow::run_check_transition(&args)),
        "brief" if sub_cmd == "create" => workflow::run_brief_create(&args).await,
        "content" if sub_cmd == "add" => workflow::run_content_add(&args).await,
        "client" if sub_cmd == "upsert" => clients::run_client_upsert(&args).await,
        "competitor" if sub_cmd == "add" => clients::run_competitor_add(&args).await,
        "access" if sub_cmd == "grant" => clients::run_access_grant(&args).await,
        "token" if sub_cmd == "create" => tokens::run_token_create(&args).await,
        "help" | "--help" | "-h" => {
            print_help();
            Ok(0)
        }
        _ => {
            print_error(&format!("Unknown command: {}", args[1..].join(" ")));
            print_help();
            Ok(2)
        }
    }
}
