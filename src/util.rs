use std::process::{ExitStatus, Output, Stdio};
use std::{
    fmt,
    io::{Error as IoError, ErrorKind},
    path::Path,
    time::Duration,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command as TokioCommand;

/// Exit code reported when a command could not be started.
pub const EXIT_NOT_FOUND: i32 = 127;
/// Exit code reported when a command exists but is not executable.
pub const EXIT_NOT_EXECUTABLE: i32 = 126;
/// Exit code reported when a command was killed after its timeout.
pub const EXIT_TIMEOUT: i32 = 124;

#[derive(Debug)]
pub enum CommandError {
    Io(IoError),
    Timeout,
}

impl CommandError {
    /// Exit code a POSIX shell would report for the same failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            CommandError::Io(e) if e.kind() == ErrorKind::PermissionDenied => EXIT_NOT_EXECUTABLE,
            CommandError::Io(_) => EXIT_NOT_FOUND,
            CommandError::Timeout => EXIT_TIMEOUT,
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Io(e) => write!(f, "Command execution error: {}", e),
            CommandError::Timeout => write!(f, "Command timed out"),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::Io(e) => Some(e),
            CommandError::Timeout => None,
        }
    }
}

/// Exit code a POSIX shell would report: `128 + signal` for a killed process.
pub fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

pub fn parse_timeout(timeout_str: Option<&str>, default_timeout: Option<&str>) -> Option<Duration> {
    let timeout_to_parse = timeout_str.or(default_timeout)?;

    if timeout_to_parse == "0" || timeout_to_parse.is_empty() {
        return None;
    }

    match timeout_to_parse.parse::<humantime::Duration>() {
        Ok(duration) => Some(duration.into()),
        Err(e) => {
            eprintln!(
                "Warning: Invalid timeout format '{}': {}",
                timeout_to_parse, e
            );
            eprintln!("Use duration format like '5m', '30s', '1h30m'");
            None
        }
    }
}

pub fn display_command(command: &[String]) -> String {
    command
        .iter()
        .map(|arg| {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                format!("'{}'", arg)
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs `command` (program followed by its arguments) inside `cwd`.
///
/// With `stream_output` the output is forwarded to this process's
/// stdout/stderr as it arrives and the returned buffers stay empty;
/// otherwise it is collected.
pub async fn run_command_with_timeout(
    command: &[String],
    cwd: Option<&Path>,
    timeout: Option<Duration>,
    stream_output: bool,
) -> Result<Output, CommandError> {
    let (program, args) = command.split_first().ok_or_else(|| {
        CommandError::Io(IoError::new(ErrorKind::InvalidInput, "empty command"))
    })?;

    let mut cmd = TokioCommand::new(program);
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .kill_on_drop(true);

    tracing::debug!(command = %display_command(command), cwd = ?cwd, "spawning");
    let mut child = cmd.spawn().map_err(CommandError::Io)?;

    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();

    let stdout_handle = tokio::spawn(pump(stdout_pipe, tokio::io::stdout(), stream_output));
    let stderr_handle = tokio::spawn(pump(stderr_pipe, tokio::io::stderr(), stream_output));

    let status = match timeout {
        Some(duration) => {
            tokio::select! {
                result = child.wait() => result.map_err(CommandError::Io)?,
                _ = tokio::time::sleep(duration) => {
                    if let Err(kill_err) = child.kill().await {
                        eprintln!("Warning: Failed to kill timed-out process: {}", kill_err);
                    }
                    let _ = child.wait().await;
                    return Err(CommandError::Timeout);
                }
            }
        }
        None => child.wait().await.map_err(CommandError::Io)?,
    };

    let stdout = join_pump(stdout_handle).await?;
    let stderr = join_pump(stderr_handle).await?;

    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

async fn pump<R, W>(pipe: Option<R>, mut sink: W, forward: bool) -> Result<Vec<u8>, CommandError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut collected: Vec<u8> = Vec::new();
    let Some(mut pipe) = pipe else {
        return Ok(collected);
    };

    let mut buf = [0u8; 8192];
    loop {
        let n = pipe.read(&mut buf).await.map_err(CommandError::Io)?;
        if n == 0 {
            break;
        }
        if forward {
            sink.write_all(&buf[..n]).await.map_err(CommandError::Io)?;
        } else {
            collected.extend_from_slice(&buf[..n]);
        }
    }
    if forward {
        sink.flush().await.map_err(CommandError::Io)?;
    }

    Ok(collected)
}

async fn join_pump(
    handle: tokio::task::JoinHandle<Result<Vec<u8>, CommandError>>,
) -> Result<Vec<u8>, CommandError> {
    match handle.await {
        Ok(result) => result,
        Err(e) => Err(CommandError::Io(IoError::other(e))),
    }
}
