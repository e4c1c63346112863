use anyhow::{Result, anyhow};
use console::style;

use super::{describe, load_app, parse_flags};
use crate::core::store::{BriefRequirements, BriefStore, NewBrief, NewContent};
use crate::core::terminal::{GuideSection, print_error, print_success};
use crate::core::workflow::{BriefStatus, ReviewAction, ReviewSubmission, can_transition};

pub async fn run_transition(args: &[String]) -> Result<i32> {
    let flags = parse_flags(args, 2);
    let brief_id = flags.require(&["--brief", "-b"])?;
    let to = flags.require(&["--to"])?;
    let actor = flags.get(&["--actor"]);

    let app = load_app().await?;
    match app
        .workflow
        .transition_brief_status(brief_id, to, actor, None)
        .await
    {
        Ok(moved) => {
            print_success(&format!(
                "Brief {} moved {} -> {}",
                moved.brief_id, moved.from, moved.to
            ));
            if let (Some(by), Some(at)) = (&moved.approved_by, moved.approved_at) {
                println!("  approved by {} at {}", style(by).bold(), at.to_rfc3339());
            }
            Ok(0)
        }
        Err(e) => {
            print_error(&describe(&e));
            Ok(1)
        }
    }
}

pub async fn run_review(args: &[String]) -> Result<i32> {
    let flags = parse_flags(args, 2);
    let content_id = flags.require(&["--content", "-c"])?;
    let raw_action = flags.require(&["--action", "-a"])?;
    let action = ReviewAction::parse(raw_action)
        .ok_or_else(|| anyhow!("--action must be 'approve' or 'revision', got '{}'", raw_action))?;
    let requests = flags.all(&["--request", "-r"]);
    let review_time_minutes = flags
        .get(&["--minutes"])
        .map(|m| {
            m.parse::<u32>()
                .map_err(|_| anyhow!("--minutes expects a whole number, got '{}'", m))
        })
        .transpose()?;

    let submission = ReviewSubmission {
        content_id: content_id.to_string(),
        action,
        reviewer_notes: flags.get(&["--notes"]).map(str::to_string),
        revision_requests: (!requests.is_empty()).then_some(requests),
        review_time_minutes,
    };

    let app = load_app().await?;
    match app.workflow.submit_review(submission).await {
        Ok(content) => {
            print_success(&format!("Content {} is now {}", content.id, content.status));
            if let Some(requests) = content.revision_requests.filter(|r| !r.is_empty()) {
                for request in requests {
                    println!("  {} {}", style("→").cyan(), request);
                }
            }
            Ok(0)
        }
        Err(e) => {
            print_error(&describe(&e));
            Ok(1)
        }
    }
}

/// Prints the verdict and returns the process exit code: 0 when legal.
pub fn run_check_transition(args: &[String]) -> i32 {
    let flags = parse_flags(args, 2);
    let (Some(from), Some(to)) = (flags.positional(0), flags.positional(1)) else {
        GuideSection::new("briefline check-transition")
            .text("Usage: briefline check-transition <from> <to>")
            .blank()
            .text(&format!(
                "Statuses: {}",
                BriefStatus::ALL
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
            .blank()
            .hint("briefline check-transition draft approved", "exits 0")
            .hint("briefline check-transition draft published", "exits 1")
            .print();
        return 2;
    };
    if can_transition(from, to) {
        println!("{} -> {}: allowed", from, to);
        0
    } else {
        println!("{} -> {}: not allowed", from, to);
        1
    }
}

pub async fn run_brief_create(args: &[String]) -> Result<i32> {
    let flags = parse_flags(args, 3);
    let word_count = flags
        .get(&["--words"])
        .map(|w| {
            w.parse::<u32>()
                .map_err(|_| anyhow!("--words expects a whole number, got '{}'", w))
        })
        .transpose()?;
    let brief = NewBrief {
        client_id: flags.require(&["--client"])?.to_string(),
        title: flags.require(&["--title"])?.to_string(),
        target_keyword: flags.require(&["--keyword"])?.to_string(),
        priority: flags.get(&["--priority"]).unwrap_or("medium").to_string(),
        requirements: BriefRequirements {
            word_count,
            required_sections: flags.all(&["--section"]),
            semantic_keywords: flags.all(&["--semantic"]),
        },
    };

    let app = load_app().await?;
    let created = app.store.create_brief(brief).await?;
    print_success(&format!("Brief '{}' created", created.title));
    println!("{}", created.id);
    Ok(0)
}

pub async fn run_content_add(args: &[String]) -> Result<i32> {
    let flags = parse_flags(args, 3);
    let brief_id = flags.require(&["--brief"])?;
    let body = match (flags.get(&["--body"]), flags.get(&["--body-file"])) {
        (Some(body), _) => body.to_string(),
        (None, Some(path)) => tokio::fs::read_to_string(path).await?,
        (None, None) => return Err(anyhow!("one of --body or --body-file is required")),
    };
    let status = match flags.get(&["--status"]) {
        Some(raw) => BriefStatus::from_status(raw).ok_or_else(|| {
            anyhow!(
                "--status must be one of {}, got '{}'",
                BriefStatus::ALL
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                raw
            )
        })?,
        None => BriefStatus::Reviewing,
    };

    let app = load_app().await?;
    let Some(brief) = app.store.get_brief(brief_id).await? else {
        print_error(&format!("brief '{}' not found", brief_id));
        return Ok(1);
    };
    let content = app
        .store
        .create_content(NewContent {
            brief_id: brief.id,
            client_id: brief.client_id,
            body,
            ai_model: flags.get(&["--model"]).map(str::to_string),
            status: status.as_str().to_string(),
            ..NewContent::default()
        })
        .await?;
    print_success(&format!(
        "Content added ({} words, status {})",
        content.word_count, content.status
    ));
    println!("{}", content.id);
    Ok(0)
}
