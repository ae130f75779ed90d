use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use serde_json::{json, Value};
use tempfile::TempDir;

fn worksync_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_worksync"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

fn write_json(dir: &Path, name: &str, value: Value) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(&value).expect("serialize")).expect("write");
    path
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("utf8 path")
}

struct Fixture {
    home: TempDir,
    work: TempDir,
    current: PathBuf,
    desired: PathBuf,
}

fn fixture() -> Fixture {
    let home = TempDir::new().expect("home");
    let work = TempDir::new().expect("work");
    let current = write_json(
        work.path(),
        "current.json",
        json!([
            {"id": "A", "title": "Old", "tags": ["backend"]},
            {"id": "R", "title": "Retired"}
        ]),
    );
    let desired = write_json(
        work.path(),
        "desired.json",
        json!([
            {"id": "A", "title": "New", "tags": ["backend"]},
            {"id": "B", "title": "Brand New"}
        ]),
    );
    Fixture {
        home,
        work,
        current,
        desired,
    }
}

#[test]
fn diff_lists_every_partition() {
    let fx = fixture();
    let assert = worksync_cmd(fx.home.path())
        .args(["diff", "--current", path_arg(&fx.current)])
        .args(["--desired", path_arg(&fx.desired)])
        .assert()
        .success()
        .stdout(contains("1 added, 1 modified, 1 removed, 0 unchanged"));
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("stdout utf8");

    assert!(stdout.lines().any(|l| l.starts_with("+ B")));
    assert!(stdout.lines().any(|l| l.starts_with("- R")));
    assert!(stdout.lines().any(|l| l.starts_with("~ A") && l.contains("title")));
    assert!(stdout.lines().any(|l| l == "-Old"));
    assert!(stdout.lines().any(|l| l == "+New"));
}

#[test]
fn diff_json_is_machine_readable() {
    let fx = fixture();
    let output = worksync_cmd(fx.home.path())
        .args(["diff", "--json", "--current", path_arg(&fx.current)])
        .args(["--desired", path_arg(&fx.desired)])
        .output()
        .expect("run");
    assert!(output.status.success());

    let parsed: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(parsed["added"][0]["id"], "B");
    assert_eq!(parsed["modified"][0]["changes"], json!(["title"]));
    assert_eq!(parsed["removed"][0]["id"], "R");
}

#[test]
fn merge_writes_once_then_reports_unchanged() {
    let fx = fixture();
    let out = fx.work.path().join("out").join("next.json");
    let merge = |home: &Path| {
        worksync_cmd(home)
            .args(["merge", "--current", path_arg(&fx.current)])
            .args(["--desired", path_arg(&fx.desired)])
            .args(["--out", path_arg(&out)])
            .assert()
            .success()
    };

    merge(fx.home.path()).stdout(contains(format!("wrote {}", out.display())));
    let written: Value = serde_json::from_str(&fs::read_to_string(&out).expect("out")).expect("json");
    let ids: Vec<&str> = written
        .as_array()
        .expect("array")
        .iter()
        .map(|item| item["id"].as_str().expect("id"))
        .collect();
    assert_eq!(ids, ["A", "B"]);
    assert_eq!(written[0]["title"], "New");

    merge(fx.home.path()).stdout(contains(format!("unchanged {}", out.display())));
}

#[test]
fn merge_dry_run_writes_nothing() {
    let fx = fixture();
    let out = fx.work.path().join("next.json");
    worksync_cmd(fx.home.path())
        .args(["merge", "--dry-run", "--current", path_arg(&fx.current)])
        .args(["--desired", path_arg(&fx.desired)])
        .args(["--out", path_arg(&out)])
        .assert()
        .success()
        .stdout(contains("would write"));
    assert!(!out.exists());
    assert!(!fx.home.path().join(".worksync").exists());
}

#[test]
fn observed_manual_edit_survives_merge_until_cleared() {
    let fx = fixture();
    let generated = write_json(
        fx.work.path(),
        "generated.json",
        json!([{"id": "A", "title": "Old", "tags": ["backend"]}]),
    );
    let human = write_json(
        fx.work.path(),
        "human.json",
        json!([{"id": "A", "title": "Human Title", "tags": ["backend"]}]),
    );
    let out = fx.work.path().join("next.json");

    worksync_cmd(fx.home.path())
        .args(["merge", "--current", path_arg(&human)])
        .args(["--desired", path_arg(&fx.desired)])
        .args(["--generated", path_arg(&generated)])
        .args(["--out", path_arg(&out)])
        .assert()
        .success()
        .stdout(contains("Recorded 1 manual edit(s)."));
    let written: Value = serde_json::from_str(&fs::read_to_string(&out).expect("out")).expect("json");
    assert_eq!(written[0]["title"], "Human Title");

    worksync_cmd(fx.home.path())
        .args(["edits", "list"])
        .assert()
        .success()
        .stdout(contains("Human Title"));

    worksync_cmd(fx.home.path())
        .args(["edits", "clear", "--item", "A", "--field", "title"])
        .assert()
        .success()
        .stdout(contains("Cleared 1 manual edit(s)."));

    worksync_cmd(fx.home.path())
        .args(["edits", "list"])
        .assert()
        .success()
        .stdout(contains("No manual edits recorded."));
}

#[test]
fn canonical_hash_ignores_key_order() {
    let work = TempDir::new().expect("work");
    let home = TempDir::new().expect("home");
    let a = work.path().join("a.json");
    let b = work.path().join("b.json");
    fs::write(&a, r#"{"x": 1, "y": {"p": true, "q": [1, 2]}}"#).expect("write");
    fs::write(&b, r#"{"y":{"q":[1,2],"p":true},"x":1}"#).expect("write");

    let digest = |path: &Path, canonical: bool| {
        let mut cmd = worksync_cmd(home.path());
        cmd.arg("hash").arg(path);
        if canonical {
            cmd.arg("--canonical");
        }
        let output = cmd.output().expect("run");
        assert!(output.status.success());
        String::from_utf8(output.stdout)
            .expect("utf8")
            .split_whitespace()
            .next()
            .expect("digest")
            .to_string()
    };

    assert_eq!(digest(&a, true), digest(&b, true));
    assert_ne!(digest(&a, false), digest(&b, false));
    assert_eq!(digest(&a, false).len(), 64);
}

#[test]
fn malformed_config_is_reported() {
    let fx = fixture();
    let dir = fx.home.path().join(".worksync");
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(dir.join("config.yaml"), "retry: [not, a, map").expect("write");

    worksync_cmd(fx.home.path())
        .args(["diff", "--current", path_arg(&fx.current)])
        .args(["--desired", path_arg(&fx.desired)])
        .assert()
        .failure()
        .stderr(contains("config.yaml"));
}

#[test]
fn missing_input_names_the_file() {
    let home = TempDir::new().expect("home");
    worksync_cmd(home.path())
        .args(["diff", "--current", "/nonexistent/current.json", "--desired", "/nonexistent/d.json"])
        .assert()
        .failure()
        .stderr(contains("current.json"));
}
