//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use autotest_utils::shell::{CmdOutput, LocalShell, RunOpts, Shell};

#[tokio::test]
async fn run_captures_output() {
    let shell = LocalShell::new(false);
    let output = shell
        .run("echo first; echo second", RunOpts::CAPTURE)
        .await
        .unwrap();
    assert_eq!(output.rc, 0);
    assert_eq!(output.stdout, "first\nsecond\n");
}

#[tokio::test]
async fn run_merges_stderr() {
    let shell = LocalShell::new(false);
    let output = shell.run("echo oops >&2", RunOpts::CAPTURE).await.unwrap();
    assert_eq!(output.stdout, "oops\n");
}

#[tokio::test]
async fn run_without_capture() {
    let shell = LocalShell::new(false);
    let output = shell.run("echo ignored", RunOpts::default()).await.unwrap();
    assert_eq!(output, CmdOutput { rc: 0, stdout: String::new() });
}

#[tokio::test]
async fn run_reports_exit_code() {
    let shell = LocalShell::new(false);
    let output = shell.run("exit 3", RunOpts::default()).await.unwrap();
    assert_eq!(output.rc, 3);
    assert!(!output.success());
}

#[tokio::test]
async fn dry_run_skips_execution() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("marker");
    let cmd = format!("touch {}; exit 7", marker.display());

    let shell = LocalShell::new(true);
    let output = shell.run(&cmd, RunOpts::CAPTURE).await.unwrap();
    assert_eq!(output, CmdOutput::default());
    assert!(!marker.exists());
}

#[tokio::test]
async fn dry_run_forced() {
    let shell = LocalShell::new(true);
    let output = shell
        .run("echo forced; exit 2", RunOpts::FORCE_CAPTURE)
        .await
        .unwrap();
    assert_eq!(output.rc, 2);
    assert_eq!(output.stdout, "forced\n");
}
