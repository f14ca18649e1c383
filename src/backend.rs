use crate::t_args;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;
use wait_timeout::ChildExt;

/// A program and its argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Program followed by arguments, as recorded in `cmdline`.
    pub fn cmdline(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

/// Output of a process that ran to completion.
#[derive(Debug, Clone, PartialEq)]
pub struct Captured {
    /// `None` when the process was terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl Captured {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{program}' failed with return code {}", .code.map(|c| c.to_string()).unwrap_or_else(|| "none (signal)".into()))]
    NonZeroExit { program: String, code: Option<i32> },
    #[error("'{program}' timed out after {} s", .after.as_secs())]
    TimedOut { program: String, after: Duration },
    #[error("i/o error while running '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Runs external programs. Swapped for a mock in tests.
pub trait Runner {
    /// Run to completion. A non-zero exit is still `Ok`; callers decide.
    fn run(&self, invocation: &Invocation) -> Result<Captured, ExecError>;
}

/// Runs programs with `std::process`, blocking until they exit.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    /// No limit when `None`
    pub timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

fn read_back(mut file: File) -> std::io::Result<String> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

impl Runner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> Result<Captured, ExecError> {
        let program = invocation.program.clone();
        let io_err = |source| ExecError::Io {
            program: program.clone(),
            source,
        };

        // Output goes to anonymous files so a chatty child cannot fill a pipe
        // while we block in wait().
        let stdout_file = tempfile::tempfile().map_err(io_err)?;
        let stderr_file = tempfile::tempfile().map_err(io_err)?;

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_file.try_clone().map_err(io_err)?))
            .stderr(Stdio::from(stderr_file.try_clone().map_err(io_err)?));

        debug!("{}", t_args!("debug-spawn", "cmdline" => invocation.cmdline().join(" ")));

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|source| ExecError::Launch {
            program: program.clone(),
            source,
        })?;

        let status = match self.timeout {
            Some(timeout) => match child.wait_timeout(timeout).map_err(io_err)? {
                Some(status) => status,
                None => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ExecError::TimedOut {
                        program: program.clone(),
                        after: timeout,
                    });
                }
            },
            None => child.wait().map_err(io_err)?,
        };
        let elapsed = start.elapsed();

        Ok(Captured {
            code: status.code(),
            stdout: read_back(stdout_file).map_err(io_err)?,
            stderr: read_back(stderr_file).map_err(io_err)?,
            elapsed,
        })
    }
}

/// Best-effort absolute location of a program, for log output.
pub fn resolve_program_path(cmd: &str) -> String {
    if cmd.contains(std::path::MAIN_SEPARATOR) || cmd.starts_with("./") {
        return match std::fs::canonicalize(cmd) {
            Ok(p) => p.to_string_lossy().into_owned(),
            Err(_) => cmd.to_string(),
        };
    }
    match which::which(cmd) {
        Ok(p) => p.to_string_lossy().into_owned(),
        Err(_) => {
            debug!("{}", t_args!("debug-not-on-path", "cmd" => cmd));
            cmd.to_string()
        }
    }
}
