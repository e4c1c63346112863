use anyhow::{Result, anyhow};
use console::style;

use super::{describe, load_app, parse_flags};
use crate::core::store::{HealthStatus, IntegrationStore};
use crate::core::sync::{ItemOutcome, SyncReport, SyncRequest};
use crate::core::terminal::{GuideSection, print_error, print_info, print_success, print_warn};

const DEFAULT_LOG_LINES: usize = 20;

pub async fn run_sync(args: &[String]) -> Result<i32> {
    let flags = parse_flags(args, 2);
    let client_id = flags.require(&["--client", "-c"])?;
    let provider = flags.require(&["--provider", "-p"])?;
    let request = match SyncRequest::parse(
        provider,
        flags.get(&["--org"]),
        flags.get(&["--project"]),
    ) {
        Ok(request) => request,
        Err(e) => {
            print_error(&describe(&e));
            return Ok(2);
        }
    };

    let app = load_app().await?;
    let outcome = app.sync.sync(client_id, &request).await;
    app.telemetry.flush().await;

    let report = match outcome {
        Ok(report) => report,
        Err(e) => {
            print_error(&describe(&e));
            return Ok(1);
        }
    };

    match &report {
        SyncReport::KeywordData { competitors, .. } => {
            summarize("competitor", competitors.values().map(ItemOutcome::is_ok))
        }
        SyncReport::SerpAnalysis { keywords, .. } => {
            summarize("keyword", keywords.values().map(ItemOutcome::is_ok))
        }
        SyncReport::CitationTracking { citations, .. } => print_success(&format!(
            "Fetched citations for {} keyword(s)",
            citations.keywords.len()
        )),
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(0)
}

fn summarize(noun: &str, outcomes: impl Iterator<Item = bool>) {
    let (mut ok, mut total) = (0usize, 0usize);
    for is_ok in outcomes {
        total += 1;
        ok += usize::from(is_ok);
    }
    if ok == total {
        print_success(&format!("Synced {} {}(s)", total, noun));
    } else {
        print_warn(&format!("Synced {}/{} {}(s), see errors below", ok, total, noun));
    }
}

pub async fn run_health(args: &[String]) -> Result<i32> {
    let flags = parse_flags(args, 2);
    let log_lines = if flags.has("--logs") {
        match flags.get(&["--logs"]) {
            Some(n) => Some(
                n.parse::<usize>()
                    .map_err(|_| anyhow!("--logs expects a count, got '{}'", n))?,
            ),
            None => Some(DEFAULT_LOG_LINES),
        }
    } else {
        None
    };

    let app = load_app().await?;
    let health = app.store.list_health().await?;
    if health.is_empty() {
        print_info("No provider calls recorded yet.");
    } else {
        let mut section = GuideSection::new("Provider Health");
        for record in &health {
            let status = match record.status {
                HealthStatus::Healthy => style(record.status.as_str()).green().bold(),
                HealthStatus::Degraded => style(record.status.as_str()).yellow().bold(),
                HealthStatus::Down => style(record.status.as_str()).red().bold(),
                HealthStatus::Unknown => style(record.status.as_str()).dim(),
            };
            let latency = record
                .avg_response_time_ms
                .map(|ms| format!("{:.0}ms avg", ms))
                .unwrap_or_else(|| "no latency yet".to_string());
            section = section.status(
                &record.provider,
                &format!("{}  errors: {}  {}", status, record.error_count, latency),
            );
        }
        section.print();
        println!();
    }

    if let Some(limit) = log_lines {
        let logs = app.store.recent_request_logs(limit).await?;
        for log in logs {
            let code = log
                .status_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {} {} {} {} {}ms {}",
                style(log.created_at.format("%Y-%m-%d %H:%M:%S")).dim(),
                style(&log.provider).cyan(),
                log.endpoint,
                code,
                log.response_time_ms,
                log.error_message.unwrap_or_default()
            );
        }
    }
    Ok(0)
}
