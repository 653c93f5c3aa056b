//! CLI end-to-end tests that invoke the compiled `mirror` binary.
//!
//! Every run points `--registry` and the config directory into a temporary
//! fixture so the user's real data is never touched.

use assert_cmd::Command;
use mirror_test_utils::MirrorFixture;
use predicates::prelude::*;
use std::fs;

/// `mirror` with a private registry and config directory.
fn mirror(fx: &MirrorFixture) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("mirror"));
    cmd.env("XDG_CONFIG_HOME", fx.path("config"))
        .env_remove("MIRROR_REGISTRY")
        .env_remove("RUST_LOG")
        .arg("--registry")
        .arg(fx.registry_path());
    cmd
}

fn groups_json(fx: &MirrorFixture) -> Vec<serde_json::Value> {
    let output = mirror(fx).args(["group", "list", "--json"]).output().unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

fn create_pq(fx: &MirrorFixture) -> String {
    fx.folder("P");
    fx.folder("Q");
    mirror(fx)
        .args(["group", "create"])
        .arg(fx.path("P"))
        .arg(fx.path("Q"))
        .assert()
        .success();
    groups_json(fx)[0]["id"].as_str().unwrap().to_string()
}

#[test]
fn test_no_command_prints_hint() {
    let fx = MirrorFixture::new();
    mirror(&fx)
        .assert()
        .success()
        .stdout(predicate::str::contains("mirror --help"));
}

#[test]
fn test_group_create_and_list() {
    let fx = MirrorFixture::new();
    fx.folder("P");
    fx.folder("Q");

    mirror(&fx)
        .args(["group", "create", "--name", "photos"])
        .arg(fx.path("P"))
        .arg(fx.path("Q"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Created group"));

    let groups = groups_json(&fx);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["name"], "photos");
    assert_eq!(groups[0]["sync_enabled"], true);
    assert_eq!(groups[0]["folders"].as_array().unwrap().len(), 2);
    fx.assert_exists("P/.hardlink_mirror");

    mirror(&fx)
        .args(["group", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("photos"));
}

#[test]
fn test_group_create_rejects_missing_folder() {
    let fx = MirrorFixture::new();
    fx.folder("P");

    mirror(&fx)
        .args(["group", "create"])
        .arg(fx.path("P"))
        .arg(fx.path("nope"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not a directory"));

    assert!(!fx.registry_path().exists());
}

#[test]
fn test_group_edits() {
    let fx = MirrorFixture::new();
    let id = create_pq(&fx);
    fx.folder("R");

    mirror(&fx).args(["group", "rename", &id, "family"]).assert().success();
    mirror(&fx).args(["group", "auto-sync", &id, "off"]).assert().success();
    mirror(&fx)
        .args(["group", "add-folder", &id])
        .arg(fx.path("R"))
        .assert()
        .success()
        .stdout(predicate::str::contains("3 folders"));
    mirror(&fx)
        .args(["group", "remove-folder", &id])
        .arg(fx.path("Q"))
        .assert()
        .success();

    let group = &groups_json(&fx)[0];
    assert_eq!(group["sync_enabled"], false);
    assert_eq!(group["folders"].as_array().unwrap().len(), 2);
    fx.assert_not_exists("Q/.hardlink_mirror");

    mirror(&fx)
        .args(["group", "show", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains(id.as_str()));
}

#[test]
fn test_unknown_group_fails() {
    let fx = MirrorFixture::new();

    mirror(&fx)
        .args(["group", "delete", "missing-id"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Mirror group not found: missing-id"));
    mirror(&fx)
        .args(["sync", "missing-id"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing-id"));
}

#[test]
fn test_group_delete_and_clear() {
    let fx = MirrorFixture::new();
    let id = create_pq(&fx);
    fx.write("P/keep.txt", "k");

    mirror(&fx).args(["group", "delete", &id]).assert().success();
    assert!(groups_json(&fx).is_empty());
    fx.assert_exists("P/keep.txt");

    create_pq(&fx);
    mirror(&fx)
        .args(["group", "clear", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Unregistered 1 groups"));
    assert!(groups_json(&fx).is_empty());
}

#[test]
fn test_sync_links_files() {
    let fx = MirrorFixture::new();
    let id = create_pq(&fx);
    fx.write("P/notes/x.txt", "x");

    mirror(&fx)
        .args(["sync", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 linked, 0 deleted"));
    fx.assert_same_file("P/notes/x.txt", "Q/notes/x.txt");

    mirror(&fx)
        .args(["sync", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Already in sync"));
}

#[test]
fn test_sync_json_output() {
    let fx = MirrorFixture::new();
    let id = create_pq(&fx);
    fx.write("Q/a.txt", "a");

    let output = mirror(&fx).args(["sync", &id, "--json"]).output().unwrap();

    assert!(output.status.success());
    let reports: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(reports[0]["id"], id.as_str());
    assert_eq!(reports[0]["created"].as_object().unwrap().len(), 1);
}

#[test]
fn test_scan_content_registers_with_yes() {
    let fx = MirrorFixture::new();
    fx.write("root/c1/x.txt", "copy");
    fx.write("root/c2/y.txt", "copy");

    mirror(&fx)
        .args(["scan", "content", "--yes"])
        .arg(fx.path("root"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Registered 1 groups"));

    assert_eq!(groups_json(&fx).len(), 1);
}

#[test]
fn test_scan_quick_rebuilds_registry() {
    let fx = MirrorFixture::new();
    let id = create_pq(&fx);
    fs::remove_file(fx.registry_path()).unwrap();

    mirror(&fx)
        .args(["scan", "quick"])
        .arg(fx.root())
        .assert()
        .success();

    let groups = groups_json(&fx);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["id"], id.as_str());
}

#[test]
fn test_scan_links_groups_linked_folders() {
    let fx = MirrorFixture::new();
    fx.folder("B");
    fx.write("A/shared.txt", "s");
    mirror(&fx)
        .args(["link", "create"])
        .arg(fx.path("A/shared.txt"))
        .arg(fx.path("B"))
        .assert()
        .success();

    mirror(&fx)
        .args(["scan", "links"])
        .arg(fx.path("A"))
        .arg(fx.path("B"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Registered 1 groups"));
}

#[test]
fn test_link_create_info_and_find() {
    let fx = MirrorFixture::new();
    fx.folder("B");
    fx.write("A/data.bin", "bytes");

    mirror(&fx)
        .args(["link", "create", "--name", "copy.bin"])
        .arg(fx.path("A/data.bin"))
        .arg(fx.path("B"))
        .assert()
        .success();
    fx.assert_same_file("A/data.bin", "B/copy.bin");

    let output = mirror(&fx)
        .args(["link", "info", "--json"])
        .arg(fx.path("B/copy.bin"))
        .output()
        .unwrap();
    let info: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(info["kind"], "file");
    assert_eq!(info["link_count"], 2);

    mirror(&fx)
        .args(["link", "find"])
        .arg(fx.path("A/data.bin"))
        .arg(fx.root())
        .assert()
        .success()
        .stdout(predicate::str::contains("copy.bin"));
}

#[test]
fn test_link_delete_last_link_needs_confirmation() {
    let fx = MirrorFixture::new();
    fx.write("A/only.txt", "precious");

    // No terminal to confirm on, so the prompt fails and nothing is removed
    mirror(&fx)
        .args(["link", "delete"])
        .arg(fx.path("A/only.txt"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("last link"));
    fx.assert_exists("A/only.txt");

    mirror(&fx)
        .args(["link", "delete", "--yes"])
        .arg(fx.path("A/only.txt"))
        .assert()
        .success();
    fx.assert_not_exists("A/only.txt");
}

#[test]
fn test_link_delete_everywhere() {
    let fx = MirrorFixture::new();
    let id = create_pq(&fx);
    fx.write("P/a.txt", "a");
    mirror(&fx).args(["sync", &id]).assert().success();

    mirror(&fx)
        .args(["link", "delete", "--everywhere", "--yes"])
        .arg(fx.path("Q/a.txt"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted 2 entries"));

    fx.assert_not_exists("P/a.txt");
    fx.assert_not_exists("Q/a.txt");
}

#[test]
fn test_watch_without_groups_fails() {
    let fx = MirrorFixture::new();

    mirror(&fx)
        .arg("watch")
        .write_stdin("\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No auto-sync groups"));
}

#[test]
fn test_watch_stops_on_enter() {
    let fx = MirrorFixture::new();
    create_pq(&fx);

    mirror(&fx)
        .arg("watch")
        .write_stdin("\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Watching 2 folders"));
}

#[test]
fn test_completions() {
    let fx = MirrorFixture::new();
    mirror(&fx)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mirror"));
}
