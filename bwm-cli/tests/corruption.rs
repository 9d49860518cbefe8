//! Kept apart from the other binary tests: recovery signals every other
//! process named `bwm`.

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn bwm_cmd(config_home: &Path, cache_home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("bwm"));
    cmd.env("XDG_CONFIG_HOME", config_home)
        .env("XDG_CACHE_HOME", cache_home)
        .env_remove("RUST_LOG");
    cmd
}

#[cfg(target_os = "linux")]
#[test]
fn corrupted_auth_file_is_removed_and_reported() {
    let config = TempDir::new().expect("config");
    let cache = TempDir::new().expect("cache");
    let config_dir = config.path().join("bwm");
    fs::create_dir_all(&config_dir).expect("config dir");
    // `true` stands in for the menu: it accepts the error and prints nothing.
    fs::write(config_dir.join("config.yaml"), "menu:\n  command: \"true\"\n")
        .expect("write config");
    let auth = cache.path().join(".bwm-auth");
    fs::write(&auth, "this is not an auth file").expect("write auth");

    bwm_cmd(config.path(), cache.path())
        .assert()
        .failure()
        .stderr(contains("Cache file was corrupted"));

    assert!(!auth.exists());
}
