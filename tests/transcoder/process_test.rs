//! Tests for transcoder process spawning and control.

use std::time::Duration;

use frame_supervisor::transcoder::{InvocationSpec, SpawnError, TranscoderProcess};
use tokio::io::AsyncReadExt;

fn invocation(program: &str, args: &[&str]) -> InvocationSpec {
    InvocationSpec::new(program, args.iter().map(|s| (*s).to_string()).collect())
}

#[tokio::test]
async fn spawn_echo_and_read_stdout() {
    let mut process = TranscoderProcess::spawn(&invocation("echo", &["hello"])).unwrap();
    assert!(process.id().is_some());

    let mut stdout = process.take_stdout().unwrap();
    let mut output = String::new();
    stdout.read_to_string(&mut output).await.unwrap();
    assert_eq!(output, "hello\n");

    let status = process.wait().await.unwrap();
    assert!(status.success());
}

#[tokio::test]
async fn take_streams_once() {
    let mut process = TranscoderProcess::spawn(&invocation("echo", &[])).unwrap();

    assert!(process.take_stdout().is_some());
    assert!(process.take_stdout().is_none());
    assert!(process.take_stderr().is_some());
    assert!(process.take_stderr().is_none());

    process.wait().await.unwrap();
}

#[tokio::test]
async fn missing_binary_is_not_found() {
    let result = TranscoderProcess::spawn(&invocation("frame-supervisor-missing-ffmpeg", &[]));
    assert!(matches!(result, Err(SpawnError::NotFound)));
}

#[tokio::test]
async fn kill_running_process() {
    let mut process = TranscoderProcess::spawn(&invocation("sleep", &["10"])).unwrap();

    process.kill().await.unwrap();

    let status = process.wait().await.unwrap();
    assert!(!status.success());
}

#[tokio::test]
async fn graceful_terminate_with_timeout() {
    let mut process = TranscoderProcess::spawn(&invocation("sleep", &["10"])).unwrap();

    tokio_test::assert_ok!(process.graceful_terminate(Duration::from_millis(500)).await);
    assert!(process.id().is_none());
}

#[tokio::test]
async fn graceful_terminate_after_exit_is_ok() {
    let mut process = TranscoderProcess::spawn(&invocation("true", &[])).unwrap();
    process.wait().await.unwrap();

    tokio_test::assert_ok!(process.graceful_terminate(Duration::from_millis(100)).await);
}
