use anyhow::Result;

use super::{load_app, parse_flags};
use crate::core::store::{AccessStore, ClientRecord, ClientStore};
use crate::core::terminal::print_success;

pub async fn run_client_upsert(args: &[String]) -> Result<i32> {
    let flags = parse_flags(args, 3);
    let client = ClientRecord {
        id: flags.require(&["--id"])?.to_string(),
        name: flags.require(&["--name"])?.to_string(),
        domain: flags.require(&["--domain"])?.to_string(),
        target_keywords: flags.all(&["--keyword", "-k"]),
    };

    let app = load_app().await?;
    app.store.upsert_client(&client).await?;
    print_success(&format!(
        "Client '{}' saved with {} target keyword(s)",
        client.id,
        client.target_keywords.len()
    ));
    Ok(0)
}

pub async fn run_competitor_add(args: &[String]) -> Result<i32> {
    let flags = parse_flags(args, 3);
    let client_id = flags.require(&["--client"])?;
    let domain = flags.require(&["--domain"])?;
    let name = flags.get(&["--name"]).unwrap_or(domain);

    let app = load_app().await?;
    let competitor = app.store.add_competitor(client_id, name, domain).await?;
    print_success(&format!(
        "Tracking {} for client '{}'",
        competitor.domain, competitor.client_id
    ));
    Ok(0)
}

pub async fn run_access_grant(args: &[String]) -> Result<i32> {
    let flags = parse_flags(args, 3);
    let user_id = flags.require(&["--user", "-u"])?;
    let client_id = flags.require(&["--client"])?;

    let app = load_app().await?;
    app.store.grant_client_access(user_id, client_id).await?;
    print_success(&format!("User '{}' can now access client '{}'", user_id, client_id));
    Ok(0)
}
