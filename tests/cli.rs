// ============================================================================
// File: tests/cli.rs
// ----------------------------------------------------------------------------
// End-to-end tests of the qvm binary against a temporary home directory.
// ============================================================================

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

fn home_with(configs: &[(&str, &str)]) -> TempDir {
    let home = TempDir::new().expect("Failed to create temp home in test");
    for (name, raw) in configs {
        home.child(format!("{name}.json"))
            .write_str(raw)
            .expect("Failed to write config in test");
    }
    home
}

fn qvm(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("qvm").expect("Failed to locate qvm binary in test");
    cmd.env("QVM_HOME", home.path()).env_remove("QVM_LOG");
    cmd
}

#[test]
fn command_prints_minimal_invocation() {
    let home = home_with(&[("deb", r#"{"memory": "6G", "disks": ["a.qcow2"]}"#)]);
    let monitor = home.path().join("tmp").join("deb.mon.sock");

    qvm(&home)
        .args(["command", "deb", "--single-line"])
        .assert()
        .success()
        .stdout(format!(
            "qemu-system-x86_64 -cpu host -enable-kvm -daemonize -name deb -m 6G -smp 2 \
             -display none -drive file=a.qcow2,media=disk -nic none \
             -monitor unix:{},server,nowait\n",
            monitor.display()
        ));
}

#[test]
fn command_defaults_to_multiline() {
    let home = home_with(&[(
        "deb",
        "{\n  // installer finished\n  \"memory\": \"6G\",\n  \"disks\": [\"a.qcow2\"]\n}",
    )]);

    qvm(&home)
        .args(["command", "deb"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "qemu-system-x86_64 -cpu host -enable-kvm -daemonize \\\n\t-name deb \\\n",
        ))
        .stdout(predicate::str::contains(",server,nowait\n"));
}

#[test]
fn keep_comments_rejects_commented_config() {
    let home = home_with(&[("deb", "{\n  // note\n  \"memory\": \"6G\"\n}")]);

    qvm(&home)
        .args(["--keep-comments", "command", "deb"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Malformed config"));
}

#[test]
fn missing_memory_is_fatal() {
    let home = home_with(&[("deb", r#"{"disks": ["a.qcow2"]}"#)]);

    qvm(&home)
        .args(["command", "deb"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("JSON: '.memory' field is required."));
}

#[test]
fn require_disks_flag() {
    let home = home_with(&[("deb", r#"{"memory": "6G"}"#)]);

    qvm(&home).args(["command", "deb"]).assert().success();
    qvm(&home)
        .args(["--require-disks", "command", "deb"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("'.disks' field is required"));
}

#[test]
fn unknown_vm_is_fatal() {
    let home = home_with(&[]);

    qvm(&home)
        .args(["command", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not find 'ghost' VM"));
}

#[test]
fn bridged_without_tap_warns_and_succeeds() {
    let home = home_with(&[("deb", r#"{"memory": "6G", "net": {"mode": "bridged"}}"#)]);

    qvm(&home)
        .args(["command", "deb", "--single-line"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-nic none"))
        .stdout(predicate::str::contains("-netdev").not())
        .stderr(predicate::str::contains(
            "Bridged network mode selected, but no TAP interfaces specified",
        ));
}

#[test]
fn start_runs_hypervisor() {
    let home = home_with(&[("deb", r#"{"memory": "6G", "disks": ["a.qcow2"]}"#)]);

    qvm(&home)
        .env("QVM_HYPERVISOR", "true")
        .args(["start", "deb"])
        .assert()
        .success()
        .stdout("'deb' VM started.\n");
}

#[test]
fn start_reports_failing_hypervisor() {
    let home = home_with(&[("deb", r#"{"memory": "6G"}"#)]);

    qvm(&home)
        .env("QVM_HYPERVISOR", "false")
        .args(["start", "deb"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to run false"));
}

/// Stand-in hypervisor that creates the monitor socket path it is given
fn socket_creating_hypervisor(dir: &Path) -> PathBuf {
    let script = dir.join("fake-qemu");
    fs::write(
        &script,
        "#!/bin/sh\n\
         while [ $# -gt 0 ]; do\n\
         \tif [ \"$1\" = -monitor ]; then\n\
         \t\tsocket=\"${2#unix:}\"\n\
         \t\t: > \"${socket%%,*}\"\n\
         \tfi\n\
         \tshift\n\
         done\n",
    )
    .expect("Failed to write hypervisor script in test");
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755))
        .expect("Failed to mark hypervisor script executable in test");
    script
}

#[test]
fn relative_home_sockets_are_found() {
    let cwd = TempDir::new().expect("Failed to create working directory in test");
    cwd.child("vms/deb.json")
        .write_str(r#"{"memory": "6G"}"#)
        .expect("Failed to write config in test");
    let hypervisor = socket_creating_hypervisor(cwd.path());

    let mut start = Command::cargo_bin("qvm").expect("Failed to locate qvm binary in test");
    start
        .current_dir(cwd.path())
        .env("QVM_HOME", "vms")
        .env("QVM_HYPERVISOR", &hypervisor)
        .env_remove("QVM_LOG")
        .args(["start", "deb"])
        .assert()
        .success();

    cwd.child("vms/tmp/deb.mon.sock").assert(predicate::path::exists());
    cwd.child("vms/vms").assert(predicate::path::missing());

    let mut monitor = Command::cargo_bin("qvm").expect("Failed to locate qvm binary in test");
    monitor
        .current_dir(cwd.path())
        .env("QVM_HOME", "vms")
        .env("QVM_MONITOR_CLIENT", "true")
        .env_remove("QVM_LOG")
        .args(["monitor", "deb"])
        .assert()
        .success();
}

#[test]
fn viewer_failure_still_reports_start() {
    let home = home_with(&[("deb", r#"{"memory": "6G", "display": {"mode": "spice"}}"#)]);

    qvm(&home)
        .env("QVM_HYPERVISOR", "true")
        .args(["start", "deb", "--viewer"])
        .assert()
        .failure()
        .stdout("'deb' VM started.\n")
        .stderr(predicate::str::contains("SPICE socket"));
}

#[test]
fn stop_inactive_vm_fails() {
    let home = home_with(&[]);

    qvm(&home)
        .args(["stop", "qvm-cli-test-never-started"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "'qvm-cli-test-never-started' VM, not active.",
        ));
}

#[test]
fn ls_succeeds() {
    let home = home_with(&[]);
    qvm(&home).arg("ls").assert().success();
}

#[test]
fn spice_without_socket_fails() {
    let home = home_with(&[]);

    qvm(&home)
        .args(["spice", "deb"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "'deb' does not have an available SPICE socket",
        ));
}

#[test]
fn monitor_wait_times_out() {
    let home = home_with(&[]);

    qvm(&home)
        .args(["monitor", "deb", "--wait", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Timed out after 1000 ms"));
}

#[test]
fn locate_prints_home_and_creates_tmp() {
    let home = home_with(&[]);

    qvm(&home)
        .arg("locate")
        .assert()
        .success()
        .stdout(format!("{}\n", home.path().display()));
    home.child("tmp").assert(predicate::path::is_dir());
}
