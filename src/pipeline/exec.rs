//! Bounded-capture execution of external tools.
//!
//! The rasterizer and the OCR engine are spawned as child processes with
//! piped stdout/stderr. Capture is capped: output beyond the limit is
//! discarded while the pipes keep draining (so the child never deadlocks on
//! a full pipe), and the overflow fails that request once the tool exits.
//! The cap applies per invocation, so one noisy request cannot affect
//! others.

use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// Captured result of a finished child process.
#[derive(Debug)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Why a tool invocation failed.
#[derive(Debug)]
pub enum ExecError {
    /// The binary could not be spawned (missing, not executable).
    Spawn(std::io::Error),
    /// The process exited non-zero; `stderr` holds its diagnostic.
    Failed { status: Option<i32>, stderr: String },
    /// stdout+stderr exceeded the capture bound.
    BufferExceeded { limit: usize },
    /// I/O error while reading the pipes or waiting for exit.
    Io(std::io::Error),
}

impl std::fmt::Display for ExecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecError::Spawn(e) => write!(f, "failed to spawn: {e}"),
            ExecError::Failed { status, stderr } => match status {
                Some(code) => write!(f, "exited with status {code}: {}", stderr.trim()),
                None => write!(f, "terminated by signal: {}", stderr.trim()),
            },
            ExecError::BufferExceeded { limit } => {
                write!(f, "output exceeded capture limit of {limit} bytes")
            }
            ExecError::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}

/// Run `program` with `args`, capturing stdout and stderr up to
/// `output_limit` bytes combined.
///
/// The child inherits nothing: stdin is closed, stdout/stderr are piped.
/// Arguments are passed exec-style; no shell is involved, so paths and
/// user-supplied values need no quoting.
pub async fn run_tool(
    program: &str,
    args: &[&std::ffi::OsStr],
    output_limit: usize,
) -> Result<ToolOutput, ExecError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(ExecError::Spawn)?;

    let stdout_pipe = child.stdout.take().expect("stdout was piped");
    let stderr_pipe = child.stderr.take().expect("stderr was piped");

    let (out, err) = tokio::join!(
        drain_capped(stdout_pipe, output_limit),
        drain_capped(stderr_pipe, output_limit),
    );
    let (stdout_buf, stdout_overflow) = out.map_err(ExecError::Io)?;
    let (stderr_buf, stderr_overflow) = err.map_err(ExecError::Io)?;

    let status = child.wait().await.map_err(ExecError::Io)?;

    if stdout_overflow || stderr_overflow || stdout_buf.len() + stderr_buf.len() > output_limit {
        return Err(ExecError::BufferExceeded {
            limit: output_limit,
        });
    }

    let stdout = String::from_utf8_lossy(&stdout_buf).into_owned();
    let stderr = String::from_utf8_lossy(&stderr_buf).into_owned();

    if !status.success() {
        return Err(ExecError::Failed {
            status: status.code(),
            stderr,
        });
    }

    Ok(ToolOutput { stdout, stderr })
}

/// Read a pipe to EOF, keeping at most `limit` bytes.
///
/// Draining past the limit (instead of stopping) keeps the child from
/// blocking on a full pipe while its sibling stream is still open.
async fn drain_capped(
    mut pipe: impl AsyncRead + Unpin,
    limit: usize,
) -> std::io::Result<(Vec<u8>, bool)> {
    let mut buf = Vec::new();
    let mut overflow = false;
    let mut chunk = [0u8; 8192];
    loop {
        let n = pipe.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        if buf.len() + n > limit {
            overflow = true;
            let keep = limit.saturating_sub(buf.len());
            buf.extend_from_slice(&chunk[..keep]);
        } else {
            buf.extend_from_slice(&chunk[..n]);
        }
    }
    Ok((buf, overflow))
}
