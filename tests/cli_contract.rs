use std::path::Path;
use std::process::{Command, Output};

const PROVIDER_ENV: &[&str] = &[
    "KEYWORD_DATA_LOGIN",
    "KEYWORD_DATA_PASSWORD",
    "SERP_ANALYSIS_API_KEY",
    "CITATION_CLIENT_ID",
    "CITATION_CLIENT_SECRET",
    "BRIEFLINE_ENCRYPTION_KEY",
];

fn briefline(data_dir: &Path, args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_briefline"));
    cmd.args(args)
        .env("BRIEFLINE_DATA_DIR", data_dir)
        .env("BRIEFLINE_LOG", "warn");
    for name in PROVIDER_ENV {
        cmd.env_remove(name);
    }
    cmd.output().expect("binary should run")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn last_line(output: &Output) -> String {
    stdout(output)
        .lines()
        .last()
        .expect("command should print an id")
        .trim()
        .to_string()
}

#[test]
fn check_transition_exit_codes_follow_the_state_machine() {
    let dir = tempfile::tempdir().unwrap();

    let allowed = briefline(dir.path(), &["check-transition", "draft", "approved"]);
    assert_eq!(allowed.status.code(), Some(0));
    assert!(stdout(&allowed).contains("draft -> approved: allowed"));

    let refused = briefline(dir.path(), &["check-transition", "draft", "published"]);
    assert_eq!(refused.status.code(), Some(1));
    assert!(stdout(&refused).contains("not allowed"));

    let usage = briefline(dir.path(), &["check-transition", "draft"]);
    assert_eq!(usage.status.code(), Some(2));
}

#[test]
fn unknown_command_exits_with_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = briefline(dir.path(), &["frobnicate"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown command: frobnicate"));
}

#[test]
fn help_lists_the_workflow_commands() {
    let dir = tempfile::tempdir().unwrap();
    let output = briefline(dir.path(), &["help"]);
    assert_eq!(output.status.code(), Some(0));
    let text = stdout(&output);
    for command in ["transition", "review", "sync", "check-transition"] {
        assert!(text.contains(command), "help should mention {}", command);
    }
}

#[test]
fn brief_moves_from_draft_to_published_through_the_cli() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path();

    let upsert = briefline(
        data,
        &["client", "upsert", "--id", "acme", "--name", "Acme", "--domain", "acme.test", "-k", "anvils"],
    );
    assert_eq!(upsert.status.code(), Some(0));

    let created = briefline(
        data,
        &[
            "brief", "create", "--client", "acme", "--title", "Anvil guide", "--keyword", "anvils",
        ],
    );
    assert_eq!(created.status.code(), Some(0));
    let brief_id = last_line(&created);

    let skipped = briefline(data, &["transition", "--brief", &brief_id, "--to", "published"]);
    assert_eq!(skipped.status.code(), Some(1));

    let approved = briefline(
        data,
        &["transition", "--brief", &brief_id, "--to", "approved", "--actor", "editor-7"],
    );
    assert_eq!(approved.status.code(), Some(0));
    assert!(stdout(&approved).contains("approved by editor-7"));

    let content = briefline(
        data,
        &["content", "add", "--brief", &brief_id, "--body", "Anvils are heavy and useful."],
    );
    assert_eq!(content.status.code(), Some(0));
    let content_id = last_line(&content);

    let reviewed = briefline(
        data,
        &["review", "--content", &content_id, "--action", "approve", "--minutes", "9"],
    );
    assert_eq!(reviewed.status.code(), Some(0));
    assert!(stdout(&reviewed).contains("is now published"));
}

#[test]
fn sync_without_configured_provider_fails() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path();
    briefline(
        data,
        &["client", "upsert", "--id", "acme", "--name", "Acme", "--domain", "acme.test"],
    );

    let output = briefline(data, &["sync", "--client", "acme", "--provider", "keyword_data"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not configured"));
}

#[test]
fn content_add_rejects_unknown_status() {
    let dir = tempfile::tempdir().unwrap();
    let output = briefline(
        dir.path(),
        &["content", "add", "--brief", "b-1", "--body", "text", "--status", "bogus"],
    );
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--status must be one of"), "stderr was: {}", stderr);
    assert!(stderr.contains("bogus"));
}
