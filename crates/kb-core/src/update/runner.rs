//! Subprocess seam for the orchestrator.

use crate::error::{KbError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// A fully described child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Extra variables layered over the inherited environment.
    pub env: Vec<(String, String)>,
    /// Capture stdout instead of inheriting it.
    pub capture: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, cwd: &Path) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.to_path_buf(),
            env: Vec::new(),
            capture: false,
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

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn captured(mut self) -> Self {
        self.capture = true;
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
}

impl Output {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

pub trait ProcessRunner {
    /// Run to completion. Spawn failures are errors; non-zero exits are not.
    fn run(&self, cmd: &CommandSpec) -> Result<Output>;

    /// Run and fail on any non-zero exit.
    fn run_checked(&self, cmd: &CommandSpec) -> Result<Output> {
        let out = self.run(cmd)?;
        if !out.success() {
            return Err(KbError::CommandFailed {
                command: cmd.to_string(),
                reason: match out.code {
                    Some(code) => format!("exit status {code}"),
                    None => "terminated by signal".to_string(),
                },
            });
        }
        Ok(out)
    }
}

/// Runs real processes with inherited stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, cmd: &CommandSpec) -> Result<Output> {
        debug!(command = %cmd, cwd = %cmd.cwd.display(), "running");
        let mut command = Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .current_dir(&cmd.cwd)
            .envs(cmd.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stderr(Stdio::inherit());
        command.stdout(if cmd.capture {
            Stdio::piped()
        } else {
            Stdio::inherit()
        });

        let output = command.output().map_err(|e| KbError::CommandFailed {
            command: cmd.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Output {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}
