// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn captures_output_within_timeout() {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg("echo hello");
    let output = run_with_timeout(cmd, Duration::from_secs(5), "echo")
        .await
        .unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
}

#[tokio::test]
async fn reports_timeout_with_description() {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg("sleep 5");
    let err = run_with_timeout(cmd, Duration::from_millis(50), "sleeper")
        .await
        .unwrap_err();
    assert!(err.contains("sleeper timed out"), "{err}");
}

#[tokio::test]
async fn reports_spawn_failure() {
    let cmd = Command::new("/nonexistent/binary/xyz");
    let err = run_with_timeout(cmd, Duration::from_secs(1), "ghost")
        .await
        .unwrap_err();
    assert!(err.contains("ghost failed"), "{err}");
}
