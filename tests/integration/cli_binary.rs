//! Integration tests that drive the compiled `flowshell` binary

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
    config: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("flowshell.toml");
        fs::write(
            &config,
            format!(
                "[storage]\nstate_path = \"{}\"\n\n[security]\nblocked_auth_domains = [\"accounts.google.com\", \"login.corp.test\"]\n",
                dir.path().join("state").display()
            ),
        )
        .unwrap();
        Self { dir, config }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Run the binary in a fresh process with an isolated home.
    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_flowshell"))
            .arg("--workspace")
            .arg(self.path())
            .arg("--config")
            .arg(&self.config)
            .arg("--log-level")
            .arg("off")
            .args(args)
            .env("HOME", self.path().join("home"))
            .env("XDG_CONFIG_HOME", self.path().join("xdg-config"))
            .env("XDG_DATA_HOME", self.path().join("xdg-data"))
            .env_remove("FLOWSHELL_ENV")
            .env_remove("FLOWSHELL_SECURITY__BLOCKED_AUTH_DOMAINS")
            .output()
            .unwrap()
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_check_classifies_urls() {
    let ws = Workspace::new();

    let blocked = ws.run(&["check", "https://sso.login.corp.test/start"]);
    assert!(blocked.status.success());
    assert!(stdout(&blocked).contains("blocked authentication domain (login.corp.test)"));

    let allowed = ws.run(&["check", "https://example.org/"]);
    assert!(stdout(&allowed).contains("https://example.org/: allowed"));
}

#[test]
fn test_persisted_run_is_visible_to_later_processes() {
    let ws = Workspace::new();
    let pages = ws.path().join("pages.json");
    fs::write(
        &pages,
        r#"{"https://docs.test/guide": {"blocks": ["Intro", "Setup", "Usage"], "history_len": 2}}"#,
    )
    .unwrap();
    let script = ws.path().join("session.jsonl");
    fs::write(
        &script,
        concat!(
            r#"{"command":"create","flow_id":"work","page_id":"docs","url":"https://docs.test/guide"}"#,
            "\n",
            r#"{"command":"update_title","flow_id":"work","page_id":"docs","title":"Guide"}"#,
            "\n",
            r#"{"command":"remove","flow_id":"work","page_id":"docs"}"#,
            "\n",
        ),
    )
    .unwrap();

    let run = ws.run(&[
        "run",
        script.to_str().unwrap(),
        "--pages",
        pages.to_str().unwrap(),
        "--persist",
    ]);
    assert!(run.status.success(), "{}", String::from_utf8_lossy(&run.stderr));
    let run_out = stdout(&run);
    assert!(run_out.contains("url_updated work:docs https://docs.test/guide"));
    assert!(run_out.contains("title_updated work:docs \"Guide\""));

    let states = ws.run(&["states", "--format", "json"]);
    assert!(states.status.success());
    let listed: serde_json::Value = serde_json::from_slice(&states.stdout).unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["title"], "Guide");

    let shown = ws.run(&["show", "work", "docs"]);
    assert!(shown.status.success());
    assert!(stdout(&shown).contains("https://docs.test/guide"));

    let missing = ws.run(&["show", "work", "nowhere"]);
    assert!(!missing.status.success());
    assert!(String::from_utf8_lossy(&missing.stderr).contains("No captured state for work:nowhere"));
}

#[test]
fn test_run_reports_intercepted_navigation() {
    let ws = Workspace::new();
    let script = ws.path().join("login.jsonl");
    fs::write(
        &script,
        concat!(
            r#"{"command":"create","flow_id":"work","page_id":"mail","url":"https://mail.test/"}"#,
            "\n",
            r#"{"command":"update_url","page_id":"mail","url":"https://login.corp.test/auth"}"#,
            "\n",
            r#"{"command":"resolve","flow_id":"work","page_id":"mail","decision_id":1,"response":{"action":"open_external","url":"https://login.corp.test/auth"}}"#,
            "\n",
        ),
    )
    .unwrap();

    let run = ws.run(&["run", script.to_str().unwrap()]);
    assert!(run.status.success());
    let out = stdout(&run);
    assert!(out.contains("interstitial work:mail #1 blocked_auth_domain https://login.corp.test/auth"));
    assert!(out.contains("decision_resolved work:mail #1 open_external"));
    assert!(out.contains("opened externally: https://login.corp.test/auth"));
}
