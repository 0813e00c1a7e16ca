//! Running external device tools.

use std::ffi::OsStr;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Failure of one external command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("cannot run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {limit:?}")]
    Timeout { program: String, limit: Duration },

    #[error("{program} failed ({status}): {message}")]
    Failed {
        program: String,
        status: String,
        message: String,
    },
}

/// Runs `program` with `args` and returns its stdout.
///
/// The child is killed if it outlives `limit`. A non-zero exit is reported
/// with the last line of stderr, which is where gphoto2 and lp put the
/// human-readable reason.
pub(crate) async fn run<I, S>(program: &str, args: I, limit: Duration) -> Result<String, CommandError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(program, "Running device command");

    let child = command.spawn().map_err(|source| CommandError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let output = match timeout(limit, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            return Err(CommandError::Spawn {
                program: program.to_string(),
                source,
            })
        }
        Err(_) => {
            return Err(CommandError::Timeout {
                program: program.to_string(),
                limit,
            })
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("no error output")
            .to_string();
        return Err(CommandError::Failed {
            program: program.to_string(),
            status: output.status.to_string(),
            message,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    const LIMIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let out = run("sh", ["-c", "echo request id is P-1"], LIMIT).await.unwrap();
        assert_eq!(out.trim(), "request id is P-1");
    }

    #[tokio::test]
    async fn test_run_reports_last_stderr_line() {
        let err = run("sh", ["-c", "echo first >&2; echo 'No camera found' >&2; exit 1"], LIMIT)
            .await
            .unwrap_err();
        match err {
            CommandError::Failed { message, .. } => assert_eq!(message, "No camera found"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_run_missing_program() {
        let err = run("photobox-no-such-tool", ["x"], LIMIT).await.unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let err = run("sh", ["-c", "sleep 5"], Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Timeout { .. }));
        assert_eq!(err.to_string(), "sh timed out after 100ms");
    }
}
