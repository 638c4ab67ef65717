//! Running a short-lived CLI subprocess with captured output.

use std::io;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

/// Why a subprocess produced no output.
#[derive(Debug)]
pub(crate) enum RunFailure {
    Io(io::Error),
    TimedOut,
}

/// Spawns `command`, feeds it `input` on stdin and waits up to `limit`.
///
/// The child is killed when the limit passes.
pub(crate) async fn run_captured(
    mut command: Command,
    input: Option<&str>,
    limit: Duration,
) -> Result<Output, RunFailure> {
    command
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let run = async {
        let mut child = command.spawn()?;
        if let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) {
            stdin.write_all(input.as_bytes()).await?;
            // Dropping stdin closes it so the child sees EOF.
        }
        child.wait_with_output().await
    };

    match timeout(limit, run).await {
        Ok(result) => result.map_err(RunFailure::Io),
        Err(_) => Err(RunFailure::TimedOut),
    }
}
