//! Child-process runner
//!
//! Output is forwarded line by line while the child runs. The last lines of stderr are
//! kept so a failure can be reported with the tool's own words.

use std::collections::VecDeque;
use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::debug;

const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("I/O error while running '{command}': {source}")]
    Io {
        command: String,
        source: std::io::Error,
    },

    #[error("'{command}' exited with {}{}", exit_label(.code), tail_label(.stderr_tail))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr_tail: String,
    },

    #[error("Unexpected output from '{command}': {message}")]
    UnexpectedOutput { command: String, message: String },

    #[error("Cannot pass input to '{command}': {message}")]
    InvalidInput { command: String, message: String },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "a signal".to_string(),
    }
}

fn tail_label(tail: &str) -> String {
    if tail.is_empty() {
        String::new()
    } else {
        format!(":\n{}", tail)
    }
}

/// What happens to the child's stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdoutMode {
    /// Forwarded to our stdout as it is produced
    Forward,
    /// Collected and returned
    Capture,
    /// Thrown away
    Discard,
}

/// A command line to run
#[derive(Clone)]
pub struct ProcessSpec {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    envs: Vec<(String, String)>,
    stdin: Option<String>,
    quiet_stderr: bool,
}

impl std::fmt::Debug for ProcessSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let env_keys: Vec<&str> = self.envs.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("ProcessSpec")
            .field("command", &self.display())
            .field("cwd", &self.cwd)
            .field("env_keys", &env_keys)
            .field("stdin", &self.stdin.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
            stdin: None,
            quiet_stderr: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Sets an environment variable; values never appear in logs or errors
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Feeds `input` to the child's stdin, then closes it
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Keeps stderr for the error report without echoing it
    pub fn quiet(mut self) -> Self {
        self.quiet_stderr = true;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Program and arguments, for messages
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Exit status plus whatever was collected
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr_tail: String,
}

/// Runs a command to completion without judging its exit status
///
/// The child is killed if the returned future is dropped.
pub async fn run(spec: &ProcessSpec, stdout_mode: StdoutMode) -> Result<ProcessOutput, ProcessError> {
    let command_line = spec.display();
    debug!(command = %command_line, cwd = ?spec.cwd, "Running command");

    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(if stdout_mode == StdoutMode::Discard {
            Stdio::null()
        } else {
            Stdio::piped()
        })
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &spec.cwd {
        command.current_dir(cwd);
    }
    for (key, value) in &spec.envs {
        command.env(key, value);
    }

    let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
        program: spec.program.clone(),
        source,
    })?;

    let io_error = |source| ProcessError::Io {
        command: command_line.clone(),
        source,
    };

    let stdout_task = child
        .stdout
        .take()
        .map(|stdout| tokio::spawn(pump_stdout(stdout, stdout_mode)));
    let stderr_task = child
        .stderr
        .take()
        .map(|stderr| tokio::spawn(pump_stderr(stderr, spec.quiet_stderr)));

    if let (Some(input), Some(mut stdin)) = (&spec.stdin, child.stdin.take()) {
        stdin.write_all(input.as_bytes()).await.map_err(io_error)?;
        stdin.shutdown().await.map_err(io_error)?;
    }

    let status = child.wait().await.map_err(io_error)?;

    let stdout = match stdout_task {
        Some(task) => task.await.unwrap_or_default(),
        None => String::new(),
    };
    let stderr_tail = match stderr_task {
        Some(task) => task.await.unwrap_or_default(),
        None => String::new(),
    };

    debug!(command = %command_line, code = ?status.code(), "Command finished");

    Ok(ProcessOutput {
        code: status.code(),
        success: status.success(),
        stdout,
        stderr_tail,
    })
}

/// Runs a command and turns a non-zero exit into [`ProcessError::Failed`]
pub async fn run_checked(spec: &ProcessSpec, stdout_mode: StdoutMode) -> Result<ProcessOutput, ProcessError> {
    let output = run(spec, stdout_mode).await?;
    if output.success {
        Ok(output)
    } else {
        Err(ProcessError::Failed {
            command: spec.display(),
            code: output.code,
            stderr_tail: output.stderr_tail,
        })
    }
}

async fn pump_stdout<R: AsyncRead + Unpin>(reader: R, mode: StdoutMode) -> String {
    let mut lines = BufReader::new(reader).lines();
    let mut captured = String::new();
    while let Ok(Some(line)) = lines.next_line().await {
        match mode {
            StdoutMode::Forward => {
                let mut out = std::io::stdout().lock();
                let _ = writeln!(out, "{}", line);
                let _ = out.flush();
            }
            StdoutMode::Capture => {
                captured.push_str(&line);
                captured.push('\n');
            }
            StdoutMode::Discard => {}
        }
    }
    captured
}

async fn pump_stderr<R: AsyncRead + Unpin>(reader: R, quiet: bool) -> String {
    let mut lines = BufReader::new(reader).lines();
    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
    while let Ok(Some(line)) = lines.next_line().await {
        if !quiet {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
        }
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail.into_iter().collect::<Vec<_>>().join("\n")
}
