// Copyright (c) 2026 The ksops Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Exit status of the ksops binary.

use std::{
    net::TcpListener,
    process::Command,
    thread::sleep,
    time::{Duration, Instant},
};

use assert_cmd::prelude::*;
use nix::{
    sys::signal::{kill, Signal},
    unistd::Pid,
};
use tempfile::tempdir;

const PGP_KEY: &str = "FBC7B9E2A4F9289AC0C1D4843D16CEE4A27381B4";

fn ksops() -> Command {
    let mut cmd = Command::cargo_bin("ksops").expect("init 'cargo_bin' fail");
    cmd.env("RUST_LOG", "error");
    cmd
}

fn stderr_of(cmd: &mut Command, code: i32) -> String {
    let assert = cmd.assert().code(code);
    String::from_utf8_lossy(&assert.get_output().stderr).into_owned()
}

#[test]
fn help_and_version_exit_zero() {
    ksops().arg("--help").assert().success();
    ksops().arg("--version").assert().success();
}

#[test]
fn unknown_flag_exits_one() {
    ksops().arg("--no-such-flag").assert().code(1);
}

#[test]
fn missing_credentials_exit_one() {
    let stderr = stderr_of(ksops().args(["tcp:127.0.0.1:0", "127.0.0.1:5000"]), 1);
    assert!(stderr.contains("Missing group option"), "{stderr}");
}

#[test]
fn ambiguous_credentials_exit_one() {
    let stderr = stderr_of(
        ksops().args([
            "tcp:127.0.0.1:0",
            "127.0.0.1:5000",
            "--pgp-key",
            PGP_KEY,
            "--gcp-id",
            "projects/p/locations/global/keyRings/r/cryptoKeys/k",
        ]),
        1,
    );
    assert!(stderr.contains("GCP, PGP"), "{stderr}");
}

#[test]
fn bind_failure_exits_one() {
    let taken = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = taken.local_addr().expect("addr").port();

    ksops()
        .args([
            format!("tcp:127.0.0.1:{port}").as_str(),
            "127.0.0.1:5000",
            "--pgp-key",
            PGP_KEY,
        ])
        .assert()
        .code(1);
}

#[test]
fn sigterm_stops_and_removes_socket() {
    let dir = tempdir().expect("create temp dir");
    let socket = dir.path().join("ksops.sock");

    let mut child = ksops()
        .args([
            format!("unix:{}", socket.display()).as_str(),
            "127.0.0.1:5000",
            "--pgp-key",
            PGP_KEY,
        ])
        .spawn()
        .expect("spawn ksops");

    let started = Instant::now();
    while !socket.exists() {
        if started.elapsed() > Duration::from_secs(10) {
            let _ = child.kill();
            panic!("ksops did not create {}", socket.display());
        }
        sleep(Duration::from_millis(50));
    }

    kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM).expect("send SIGTERM");
    let status = child.wait().expect("wait for ksops");

    assert!(status.success(), "{status}");
    assert!(!socket.exists(), "socket file must be removed");
}
