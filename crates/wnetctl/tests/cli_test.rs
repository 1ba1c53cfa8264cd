//! Integration tests for the `wnetctl` binary.
//!
//! Everything here runs without an access point: registry commands and
//! site edits that validate or finish before any SSH session is opened.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────

/// A `wnetctl` command whose registry, data dir and home live in `dir`.
fn wnetctl_cmd(dir: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("wnetctl");
    cmd.env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join("config"))
        .env("XDG_DATA_HOME", dir.join("data"))
        .env("WNETCTL_CONFIG_FILE", dir.join("config.toml"))
        .env("WNETCTL_DATA_DIR", dir.join("data"))
        .env_remove("WNETCTL_SITE")
        .env_remove("WNETCTL_OUTPUT")
        .env_remove("WNETCTL_TIMEOUT")
        .env_remove("WNETCTL_CONNECT_TIMEOUT")
        .env_remove("WNETCTL_DEFAULT_SITE")
        .env_remove("WNETCTL_SSID_PASSWORD")
        .env_remove("WNETCTL_ADMIN_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

/// A temp home with a key pair and one initialised site called `home`.
fn site_home() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("id_site"), "private").unwrap();
    std::fs::write(dir.path().join("id_site.pub"), "ssh-ed25519 AAAA site\n").unwrap();

    wnetctl_cmd(dir.path())
        .env("WNETCTL_ADMIN_PASSWORD", "rotated-admin-pw")
        .args(["site", "init", "home", "--country", "de", "--key"])
        .arg(dir.path().join("id_site"))
        .assert()
        .success();
    dir
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn no_args_shows_help() {
    let dir = tempfile::tempdir().unwrap();
    let output = wnetctl_cmd(dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage"));
}

#[test]
fn help_lists_command_groups() {
    let dir = tempfile::tempdir().unwrap();
    wnetctl_cmd(dir.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("OpenWrt")
            .and(predicate::str::contains("ap"))
            .and(predicate::str::contains("ssid"))
            .and(predicate::str::contains("station")),
    );
}

#[test]
fn version_flag() {
    let dir = tempfile::tempdir().unwrap();
    wnetctl_cmd(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("wnetctl"));
}

#[test]
fn completions_bash() {
    let dir = tempfile::tempdir().unwrap();
    wnetctl_cmd(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Site resolution ─────────────────────────────────────────────────

#[test]
fn site_bound_command_without_site_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    wnetctl_cmd(dir.path())
        .args(["ap", "list"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No site selected"));
}

#[test]
fn each_site_bound_group_reaches_its_handler() {
    let dir = site_home();
    for group in ["device", "ap", "ssid"] {
        wnetctl_cmd(dir.path())
            .args([group, "list", "-o", "json"])
            .assert()
            .success()
            .stdout("[]\n");
    }

    wnetctl_cmd(dir.path())
        .args(["station", "list", "ghost"])
        .assert()
        .code(4);
}

#[test]
fn unknown_site_is_not_found() {
    let dir = site_home();
    wnetctl_cmd(dir.path())
        .args(["--site", "ghost", "ap", "list"])
        .assert()
        .code(4);
}

#[test]
fn site_init_without_password_fails_non_interactively() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("id_site.pub"), "ssh-ed25519 AAAA\n").unwrap();
    wnetctl_cmd(dir.path())
        .args(["site", "init", "home", "--key"])
        .arg(dir.path().join("id_site"))
        .assert()
        .code(2);
}

#[test]
fn site_init_requires_public_key() {
    let dir = tempfile::tempdir().unwrap();
    wnetctl_cmd(dir.path())
        .env("WNETCTL_ADMIN_PASSWORD", "pw")
        .args(["site", "init", "home", "--key"])
        .arg(dir.path().join("missing"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("public-key"));
}

#[test]
fn init_registers_and_selects_site() {
    let dir = site_home();

    wnetctl_cmd(dir.path())
        .args(["site", "list", "-o", "plain"])
        .assert()
        .success()
        .stdout("home\n");

    wnetctl_cmd(dir.path())
        .args(["site", "show", "-o", "json"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"country\": \"DE\"")
                .and(predicate::str::contains("\"accessPoints\": 0")),
        );

    wnetctl_cmd(dir.path())
        .env("WNETCTL_ADMIN_PASSWORD", "pw")
        .args(["site", "init", "home", "--key"])
        .arg(dir.path().join("id_site"))
        .assert()
        .code(6);
}

#[test]
fn export_prints_document() {
    let dir = site_home();
    wnetctl_cmd(dir.path())
        .args(["site", "export"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("sshPublicKey")
                .and(predicate::str::contains("password: rotated-admin-pw"))
                .and(predicate::str::contains("accessPoints: []")),
        );
}

#[test]
fn site_remove_requires_confirmation() {
    let dir = site_home();
    wnetctl_cmd(dir.path())
        .args(["site", "remove", "home"])
        .assert()
        .code(2);

    wnetctl_cmd(dir.path())
        .args(["site", "remove", "home", "--purge", "-y"])
        .assert()
        .success();

    wnetctl_cmd(dir.path())
        .args(["site", "list", "-o", "plain"])
        .assert()
        .success()
        .stdout("");
}

// ── Catalog, SSIDs and stations ─────────────────────────────────────

#[test]
fn device_catalog_add_list_remove() {
    let dir = site_home();

    wnetctl_cmd(dir.path())
        .args(["device", "add", "wr841", "--model", "TL-WR841N", "--wlan2", "radio0:wlan0:ath9k"])
        .assert()
        .success();

    wnetctl_cmd(dir.path())
        .args(["device", "list", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("TL-WR841N").and(predicate::str::contains("\"name\": \"wr841\"")));

    wnetctl_cmd(dir.path())
        .args(["device", "add", "wr841", "--model", "again"])
        .assert()
        .code(6);

    wnetctl_cmd(dir.path())
        .args(["device", "remove", "wr841"])
        .assert()
        .success();

    wnetctl_cmd(dir.path())
        .args(["device", "remove", "wr841"])
        .assert()
        .code(4);
}

#[test]
fn device_import_from_file() {
    let dir = site_home();
    let catalog = dir.path().join("devices.yml");
    std::fs::write(
        &catalog,
        "- name: c7\n  model: Archer C7\n  wlan2: { device: radio1, interface: wlan1 }\n  wlan5: { device: radio0, interface: wlan0 }\n",
    )
    .unwrap();

    wnetctl_cmd(dir.path())
        .args(["device", "add", "--file"])
        .arg(&catalog)
        .assert()
        .success();

    wnetctl_cmd(dir.path())
        .args(["device", "list", "-o", "plain"])
        .assert()
        .success()
        .stdout("c7\n");
}

#[test]
fn ap_add_with_unknown_model_fails_before_connecting() {
    let dir = site_home();
    wnetctl_cmd(dir.path())
        .args(["ap", "add", "ap1", "--model", "ghost", "--ip", "192.0.2.10", "--trust-on-first-use"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("device list"));

    wnetctl_cmd(dir.path())
        .args(["ap", "list", "-o", "json"])
        .assert()
        .success()
        .stdout("[]\n");
}

#[test]
fn ssid_and_stations_on_empty_site() {
    let dir = site_home();

    wnetctl_cmd(dir.path())
        .args(["ssid", "add", "guest", "--auth", "open", "--whitelisted"])
        .assert()
        .success();

    wnetctl_cmd(dir.path())
        .args(["ssid", "add", "home", "--password", "short"])
        .assert()
        .code(2);

    wnetctl_cmd(dir.path())
        .args(["station", "add", "guest", "AA-BB-CC-DD-EE-FF", "--name", "phone"])
        .assert()
        .success()
        .stderr(predicate::str::contains("ssid push guest"));

    wnetctl_cmd(dir.path())
        .args(["station", "add", "guest", "aa:bb:cc:dd:ee:ff", "--name", "phone 2"])
        .assert()
        .success();

    wnetctl_cmd(dir.path())
        .args(["station", "list", "guest", "-o", "plain"])
        .assert()
        .success()
        .stdout("aa:bb:cc:dd:ee:ff\n");

    wnetctl_cmd(dir.path())
        .args(["station", "add", "ghost", "aa:bb:cc:dd:ee:ff"])
        .assert()
        .code(4);

    wnetctl_cmd(dir.path())
        .args(["ssid", "list", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"guest\"").and(predicate::str::contains("password").not()));
}
