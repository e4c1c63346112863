use anyhow::{Result, anyhow};
use console::style;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::parse_flags;
use crate::core::app::App;
use crate::core::config::AppConfig;
use crate::core::terminal::GuideSection;
use crate::interfaces::web::{AppState, build_api_router};

const PURGE_INTERVAL: Duration = Duration::from_secs(300);

pub async fn run_serve(args: &[String]) -> Result<i32> {
    let flags = parse_flags(args, 2);
    let mut config = AppConfig::from_env()?;
    if let Some(host) = flags.get(&["--host"]) {
        config.api_host = host.to_string();
    }
    if let Some(port) = flags.get(&["--port", "-p"]) {
        config.api_port = port
            .parse()
            .map_err(|_| anyhow!("--port expects a number, got '{}'", port))?;
    }
    crate::logging::init(config.log_level);

    let app = App::build(config).await?;
    let kv = app.kv.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(PURGE_INTERVAL);
        loop {
            tick.tick().await;
            match kv.purge_expired().await {
                Ok(0) => {}
                Ok(n) => debug!("Purged {} expired cache entries", n),
                Err(e) => warn!("Cache purge failed: {}", e),
            }
        }
    });

    let addr = format!("{}:{}", app.config.api_host, app.config.api_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let router = build_api_router(AppState::from_app(&app));

    GuideSection::new("briefline API")
        .status(
            "Listening",
            &style(format!("http://{}", addr)).underlined().cyan().to_string(),
        )
        .status("Data", &app.config.data_dir.display().to_string())
        .blank()
        .info(&format!(
            "Press {} to stop the server.",
            style("Ctrl+C").bold().yellow()
        ))
        .print();
    println!();

    info!("API server running at http://{}", addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("Shutting down, flushing telemetry...");
    app.telemetry.flush().await;
    Ok(0)
}
