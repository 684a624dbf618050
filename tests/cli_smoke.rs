use assert_cmd::Command;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

fn ghdigest(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ghdigest").unwrap();
    cmd.current_dir(dir)
        .env_remove("GHDIGEST_DSN")
        .env_remove("GHDIGEST_CONFIG")
        .env("RUST_LOG", "off");
    cmd
}

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Store with one account owning acme/rocket (10 views, 5 uniques) and
/// acme/anvil (3 views, 1 unique) in ISO week 2024-33.
fn seeded_store() -> (TempDir, String) {
    let dir = tempdir().unwrap();
    let dsn = dir.path().join("stats.db").to_string_lossy().to_string();

    ghdigest(dir.path()).args(["--dsn", &dsn, "init"]).assert().success();
    ghdigest(dir.path())
        .args(["--dsn", &dsn, "account", "add", "a@x.com"])
        .assert()
        .success();
    for repo in ["acme/rocket", "acme/anvil"] {
        ghdigest(dir.path())
            .args(["--dsn", &dsn, "repo", "add", "--email", "a@x.com", repo])
            .assert()
            .success();
    }

    let rocket = write_file(
        dir.path(),
        "rocket-views.json",
        r#"{"count": 10, "uniques": 5, "views": [
            {"timestamp": "2024-08-13T00:00:00Z", "count": 6, "uniques": 3},
            {"timestamp": "2024-08-14T00:00:00Z", "count": 4, "uniques": 2}
        ]}"#,
    );
    let rocket_clones = write_file(
        dir.path(),
        "rocket-clones.json",
        r#"{"count": 2, "uniques": 1, "clones": [
            {"timestamp": "2024-08-15T00:00:00Z", "count": 2, "uniques": 1}
        ]}"#,
    );
    let anvil = write_file(
        dir.path(),
        "anvil-views.json",
        r#"{"views": [{"timestamp": "2024-08-16T00:00:00Z", "count": 3, "uniques": 1}]}"#,
    );

    ghdigest(dir.path())
        .args(["--dsn", &dsn, "traffic", "import", "acme/rocket", "--views"])
        .arg(&rocket)
        .arg("--clones")
        .arg(&rocket_clones)
        .assert()
        .success();
    ghdigest(dir.path())
        .args(["--dsn", &dsn, "traffic", "import", "acme/anvil", "--views"])
        .arg(&anvil)
        .assert()
        .success();

    (dir, dsn)
}

#[test]
fn dry_run_prints_the_payload() {
    let (dir, dsn) = seeded_store();

    let out = ghdigest(dir.path())
        .args([
            "--dsn", &dsn, "digest", "--email", "a@x.com", "--channel", "#stats",
            "--date", "2024-08-21", "--dry-run",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();

    assert_eq!(v["channel"], "#stats");
    assert!(v["text"].as_str().unwrap().contains("Total repositories: 2"));
    let attachment = &v["attachments"][0];
    assert_eq!(attachment["title"], "Top 25 repositories by unique views (2024-33)");
    assert_eq!(attachment["mrkdwn_in"], serde_json::json!(["text"]));
    assert_eq!(
        attachment["text"],
        "```\nacme/rocket,10,5,2,1\nacme/anvil,3,1,0,0\n```"
    );
}

#[test]
fn params_record_drives_the_digest() {
    let (dir, dsn) = seeded_store();
    let params = serde_json::json!({
        "emailid": "a@x.com",
        "channel": "#weekly",
        "credentials": { "dsn": dsn },
    })
    .to_string();

    let out = ghdigest(dir.path())
        .args(["digest", "--params", &params, "--date", "2024-08-21", "--dry-run"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(v["channel"], "#weekly");
}

#[test]
fn rejected_webhook_reports_failed_to_post() {
    let (dir, dsn) = seeded_store();
    let mut server = mockito::Server::new();
    let mock = server.mock("POST", "/hook").with_status(500).expect(1).create();

    let out = ghdigest(dir.path())
        .args(["--dsn", &dsn, "digest", "--email", "a@x.com", "--channel", "#stats"])
        .args(["--webhook", &format!("{}/hook", server.url())])
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(v, serde_json::json!({ "message": "failed to post" }));
    mock.assert();
}

#[test]
fn accepted_webhook_reports_posted() {
    let (dir, dsn) = seeded_store();
    let mut server = mockito::Server::new();
    let mock = server.mock("POST", "/hook").with_status(200).expect(1).create();

    let out = ghdigest(dir.path())
        .args(["--dsn", &dsn, "digest", "--email", "a@x.com", "--channel", "#stats"])
        .args(["--webhook", &format!("{}/hook", server.url())])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(v, serde_json::json!({ "message": "ok, message posted" }));
    mock.assert();
}

#[test]
fn missing_store_reports_error_without_posting() {
    let dir = tempdir().unwrap();
    let dsn = dir.path().join("missing.db").to_string_lossy().to_string();
    let mut server = mockito::Server::new();
    let mock = server.mock("POST", "/hook").expect(0).create();

    let out = ghdigest(dir.path())
        .args(["--dsn", &dsn, "digest", "--email", "a@x.com", "--channel", "#stats"])
        .args(["--webhook", &format!("{}/hook", server.url())])
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert!(v.get("error").and_then(|e| e.as_str()).is_some());
    mock.assert();
}

#[test]
fn repo_list_and_remove() {
    let (dir, dsn) = seeded_store();

    ghdigest(dir.path())
        .args(["--dsn", &dsn, "repo", "remove", "--email", "a@x.com", "acme/anvil"])
        .assert()
        .success();
    ghdigest(dir.path())
        .args(["--dsn", &dsn, "repo", "remove", "--email", "a@x.com", "acme/anvil"])
        .assert()
        .failure();

    let out = ghdigest(dir.path())
        .args(["--dsn", &dsn, "repo", "list", "--email", "a@x.com", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    let names: Vec<&str> = v
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["repo_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["rocket"]);
}

#[test]
fn repo_add_requires_known_account() {
    let dir = tempdir().unwrap();
    let dsn = dir.path().join("stats.db").to_string_lossy().to_string();

    ghdigest(dir.path())
        .args(["--dsn", &dsn, "repo", "add", "--email", "nobody@x.com", "acme/rocket"])
        .assert()
        .failure();
    ghdigest(dir.path())
        .args(["--dsn", &dsn, "repo", "add", "--email", "nobody@x.com", "not-a-repo"])
        .assert()
        .failure();
}

#[test]
fn params_record_dsn_wins_over_environment() {
    let (dir, dsn) = seeded_store();
    let params = serde_json::json!({
        "emailid": "a@x.com",
        "channel": "#weekly",
        "credentials": { "dsn": dsn },
    })
    .to_string();

    let out = ghdigest(dir.path())
        .env("GHDIGEST_DSN", dir.path().join("bogus.db"))
        .args(["digest", "--params", &params, "--date", "2024-08-21", "--dry-run"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert!(v["text"].as_str().unwrap().contains("Total repositories: 2"));
}

#[test]
fn stats_exports_daily_rows_as_csv() {
    let (dir, dsn) = seeded_store();

    let out = ghdigest(dir.path())
        .args(["--dsn", &dsn, "stats", "--email", "a@x.com"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let csv = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines,
        vec![
            "repo_id,org_name,repo_name,date,view_count,unique_viewers,clone_count,unique_cloners",
            "2,acme,anvil,2024-08-16,3,1,0,0",
            "1,acme,rocket,2024-08-13,6,3,0,0",
            "1,acme,rocket,2024-08-14,4,2,0,0",
            "1,acme,rocket,2024-08-15,0,0,2,1",
        ]
    );

    let out = ghdigest(dir.path())
        .args(["--dsn", &dsn, "stats", "--email", "a@x.com", "--since", "2024-08-14"])
        .args(["--until", "2024-08-15"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(String::from_utf8(out).unwrap().lines().count(), 3);
}

#[test]
fn stats_weekly_sums_each_repo_per_iso_week() {
    let (dir, dsn) = seeded_store();

    let out = ghdigest(dir.path())
        .args(["--dsn", &dsn, "stats", "--email", "a@x.com", "--weekly", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(
        v,
        serde_json::json!([
            {
                "repo_id": 2, "org_name": "acme", "repo_name": "anvil", "week": "2024-33",
                "view_count": 3, "unique_viewers": 1, "clone_count": 0, "unique_cloners": 0
            },
            {
                "repo_id": 1, "org_name": "acme", "repo_name": "rocket", "week": "2024-33",
                "view_count": 10, "unique_viewers": 5, "clone_count": 2, "unique_cloners": 1
            }
        ])
    );
}

#[test]
fn stats_for_unknown_account_fails() {
    let (dir, dsn) = seeded_store();
    ghdigest(dir.path())
        .args(["--dsn", &dsn, "stats", "--email", "nobody@x.com"])
        .assert()
        .failure();
}
