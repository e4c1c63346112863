use anyhow::Result;
use console::style;

use super::{load_app, parse_flags};
use crate::core::store::AccessStore;
use crate::core::terminal::{print_error, print_success};

pub async fn run_token_create(args: &[String]) -> Result<i32> {
    let flags = parse_flags(args, 3);
    let Some(name) = flags.get(&["--name", "-n"]).or(flags.positional(0)) else {
        println!(
            "{}",
            style("Usage: briefline token create <name> --user <id>").bold()
        );
        println!("  Example: briefline token create ci-bot --user editor-7");
        return Ok(2);
    };
    let name = name.trim();
    if name.is_empty() {
        print_error("Token name is required");
        return Ok(2);
    }
    let user_id = flags.require(&["--user", "-u"])?;

    let app = load_app().await?;
    let (raw_token, record) = app.store.create_api_token(name, user_id).await?;

    println!();
    print_success(&format!(
        "API token '{}' created for user '{}'.",
        record.name, record.user_id
    ));
    println!(
        "\n  {} {}\n",
        style("Token:").bold(),
        style(&raw_token).green().bold()
    );
    println!(
        "  {} Save this token now, it will not be shown again.",
        style("⚠").yellow()
    );
    println!(
        "  {} Use it with: Authorization: Bearer {}\n",
        style("→").cyan(),
        raw_token
    );
    Ok(0)
}
