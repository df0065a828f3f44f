//! Integration tests for core CLI contract behavior.

use {predicates::prelude::*, std::fs, std::path::Path, tempfile::tempdir};

const DFU_LINE: &str = r#"Found DFU: [0483:df11] ver=2200, devnum=17, cfg=1, intf=0, path="20-1", alt=0, name="@Internal Flash  /0x08000000/04*016Kg,01*064Kg,07*128Kg", serial="3276365D3336""#;

fn cli_cmd() -> assert_cmd::Command {
    assert_cmd::cargo::cargo_bin_cmd!("fclink")
}

/// Command isolated from the caller's environment and config files.
fn isolated_cmd(dir: &Path) -> assert_cmd::Command {
    let mut cmd = cli_cmd();
    cmd.current_dir(dir)
        .env("XDG_CONFIG_HOME", dir)
        .env("HOME", dir)
        .env_remove("FCLINK_SOURCE")
        .env_remove("FCLINK_TARGET")
        .env_remove("FCLINK_MAKE")
        .env_remove("FCLINK_DFU_UTIL")
        .env_remove("RUST_LOG");
    cmd
}

#[cfg(unix)]
fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    fs::write(path, format!("#!/bin/sh\n{body}\n")).expect("script should be written");
    let mut perms = fs::metadata(path)
        .expect("script should exist")
        .permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("script should be executable");
}

#[cfg(unix)]
fn fake_dfu_util(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("dfu-util");
    write_script(&path, &format!("echo 'dfu-util 0.9'\necho '{DFU_LINE}'"));
    path
}

#[test]
fn help_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("fclink"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn version_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fclink"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn completions_command_writes_to_stdout() {
    let mut cmd = cli_cmd();
    cmd.args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fclink"));
}

#[test]
fn exit_code_two_for_usage_error_unknown_command() {
    let mut cmd = cli_cmd();
    cmd.arg("definitely-not-a-command")
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty());
}

#[test]
fn flash_without_target_fails_fast() {
    let dir = tempdir().expect("tempdir should be created");

    isolated_cmd(dir.path())
        .args(["flash", "--no-prompt"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("empty target name"));
}

#[test]
fn devices_with_missing_dfu_util_fails() {
    let dir = tempdir().expect("tempdir should be created");

    isolated_cmd(dir.path())
        .args(["devices", "--dfu-util", "/nonexistent/dfu-util"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("dfu-util"));
}

#[cfg(unix)]
#[test]
fn devices_json_lists_internal_flash() {
    let dir = tempdir().expect("tempdir should be created");
    let dfu_util = fake_dfu_util(dir.path());

    let output = isolated_cmd(dir.path())
        .args(["devices", "--json", "--dfu-util"])
        .arg(&dfu_util)
        .output()
        .expect("command should execute");
    assert!(output.status.success());

    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be valid JSON");
    let devices = parsed
        .as_array()
        .expect("should be a JSON array");
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0]["serial"], "3276365D3336");
    assert_eq!(devices[0]["alt"], 0);
    assert_eq!(devices[0]["offset"], "0x08000000");
}

#[cfg(unix)]
#[test]
fn flash_builds_and_flashes_end_to_end() {
    let dir = tempdir().expect("tempdir should be created");
    let dfu_util = fake_dfu_util(dir.path());
    let make = dir.path().join("make");
    write_script(&make, "mkdir -p obj && touch obj/inav_$TARGET.bin");

    isolated_cmd(dir.path())
        .args(["flash", "--no-prompt", "--target", "F3", "--make"])
        .arg(&make)
        .arg("--dfu-util")
        .arg(&dfu_util)
        .assert()
        .success()
        .stderr(predicate::str::contains(
            "Flashing inav_F3.bin via DFU to offset 0x08000000...",
        ));

    assert!(dir.path().join("obj/inav_F3.bin").exists());
}

#[cfg(unix)]
#[test]
fn flash_target_comes_from_local_config() {
    let dir = tempdir().expect("tempdir should be created");
    let dfu_util = fake_dfu_util(dir.path());
    let make = dir.path().join("make");
    write_script(&make, "mkdir -p obj && touch obj/inav_$TARGET.bin");
    fs::write(
        dir.path().join("fclink.toml"),
        format!(
            "[flash]\ntarget = \"MATEKF405\"\nmake = \"{}\"\ndfu_util = \"{}\"\n",
            make.display(),
            dfu_util.display()
        ),
    )
    .expect("config should be written");

    isolated_cmd(dir.path())
        .args(["flash", "--no-prompt"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Building binary for MATEKF405..."));
}

#[cfg(unix)]
#[test]
fn invalid_config_file_warns_and_continues() {
    let dir = tempdir().expect("tempdir should be created");
    let dfu_util = fake_dfu_util(dir.path());
    fs::write(dir.path().join("fclink.toml"), "invalid toml [[[")
        .expect("config should be written");

    isolated_cmd(dir.path())
        .args(["devices", "--json", "--dfu-util"])
        .arg(&dfu_util)
        .assert()
        .success()
        .stdout(predicate::str::contains("3276365D3336"))
        .stderr(predicate::str::contains("TOML"));
}
