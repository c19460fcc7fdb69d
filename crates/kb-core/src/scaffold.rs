//! Hand-off to the code generator that writes project files.
//!
//! # Protocol
//! The external command reads a [`ScaffoldRequest`] as JSON on stdin and
//! writes a JSON array of [`ScaffoldFile`] on stdout. Stderr is passed
//! through. Every file names its own [`OverwritePolicy`].

use crate::config::ProjectConfig;
use crate::error::{KbError, Result};
use crate::io::{atomic_write, write_if_missing};
use crate::plugin::PluginArgs;
use crate::resource::Resource;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Init,
    Edit,
    CreateApi,
    CreateWebhook,
    DeleteApi,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaffoldRequest {
    pub operation: Operation,
    pub root: PathBuf,
    pub plugins: Vec<String>,
    /// The project file, as it will be saved.
    pub config: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Resource>,
    #[serde(skip_serializing_if = "PluginArgs::is_empty")]
    pub args: PluginArgs,
}

impl ScaffoldRequest {
    pub fn new(
        operation: Operation,
        root: &Path,
        plugins: Vec<String>,
        cfg: &dyn ProjectConfig,
    ) -> Result<Self> {
        let config: serde_json::Value = serde_yaml::from_str(&cfg.marshal()?)?;
        Ok(Self {
            operation,
            root: root.to_path_buf(),
            plugins,
            config,
            resource: None,
            args: PluginArgs::new(),
        })
    }

    pub fn with_resource(mut self, res: Resource) -> Self {
        self.resource = Some(res);
        self
    }

    pub fn with_args(mut self, args: PluginArgs) -> Self {
        self.args = args;
        self
    }
}

/// What to do when a generated file is already on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverwritePolicy {
    #[default]
    Overwrite,
    SkipIfExists,
    ErrorIfExists,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaffoldFile {
    /// Relative to the project root.
    pub path: PathBuf,
    pub content: String,
    #[serde(default)]
    pub policy: OverwritePolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScaffoldReport {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

pub trait Scaffolder {
    fn scaffold(&self, req: &ScaffoldRequest) -> Result<ScaffoldReport>;
}

/// Writes nothing; used when no generator is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopScaffolder;

impl Scaffolder for NoopScaffolder {
    fn scaffold(&self, req: &ScaffoldRequest) -> Result<ScaffoldReport> {
        debug!(operation = ?req.operation, "no scaffolder configured, skipping file generation");
        Ok(ScaffoldReport::default())
    }
}

/// Runs an external generator command.
#[derive(Debug, Clone)]
pub struct CommandScaffolder {
    program: String,
    args: Vec<String>,
}

impl CommandScaffolder {
    /// Parse a whitespace-separated command line, e.g. `kb-gen --templates ./t`.
    pub fn from_command_line(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| KbError::Scaffold("empty scaffolder command".into()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    fn run(&self, input: &str, root: &Path) -> Result<String> {
        which::which(&self.program).map_err(|_| KbError::ToolNotFound(self.program.clone()))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| KbError::Scaffold(format!("failed to start '{}': {e}", self.program)))?;

        // Feed stdin from its own thread so a generator that writes before it
        // has read everything cannot block on a full stdout pipe.
        let writer = child.stdin.take().map(|mut stdin| {
            let bytes = input.as_bytes().to_vec();
            std::thread::spawn(move || stdin.write_all(&bytes))
        });

        let output = child
            .wait_with_output()
            .map_err(|e| KbError::Scaffold(e.to_string()))?;
        let written = match writer.map(|w| w.join()) {
            None | Some(Ok(Ok(()))) => Ok(()),
            Some(Ok(Err(e))) => Err(e.to_string()),
            Some(Err(_)) => Err("stdin writer panicked".to_string()),
        };
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let hint = stdout.chars().take(500).collect::<String>();
            return Err(KbError::Scaffold(format!(
                "'{}' exited with {}: {hint}",
                self.program, output.status
            )));
        }
        // A generator may legitimately exit without reading all of stdin.
        if let Err(e) = written {
            debug!(program = %self.program, error = %e, "generator did not read the whole request");
        }
        Ok(stdout)
    }
}

impl Scaffolder for CommandScaffolder {
    fn scaffold(&self, req: &ScaffoldRequest) -> Result<ScaffoldReport> {
        let input = serde_json::to_string(req)?;
        let stdout = self.run(&input, &req.root)?;
        let files: Vec<ScaffoldFile> = serde_json::from_str(&stdout)
            .map_err(|e| KbError::Scaffold(format!("invalid generator output: {e}")))?;
        let report = write_files(&req.root, &files)?;
        info!(
            written = report.written.len(),
            skipped = report.skipped.len(),
            "scaffolded files"
        );
        Ok(report)
    }
}

/// Paths must stay inside the project root.
fn check_relative(path: &Path) -> Result<()> {
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes || path.as_os_str().is_empty() {
        return Err(KbError::Scaffold(format!(
            "refusing to write '{}' outside the project root",
            path.display()
        )));
    }
    Ok(())
}

/// Write generated files under `root`, honouring each file's policy.
pub fn write_files(root: &Path, files: &[ScaffoldFile]) -> Result<ScaffoldReport> {
    let mut report = ScaffoldReport::default();
    for file in files {
        check_relative(&file.path)?;
        let target = root.join(&file.path);
        let written = match file.policy {
            OverwritePolicy::Overwrite => {
                atomic_write(&target, file.content.as_bytes())?;
                true
            }
            OverwritePolicy::SkipIfExists => write_if_missing(&target, file.content.as_bytes())?,
            OverwritePolicy::ErrorIfExists => {
                if target.exists() {
                    return Err(KbError::Scaffold(format!(
                        "'{}' already exists",
                        file.path.display()
                    )));
                }
                atomic_write(&target, file.content.as_bytes())?;
                true
            }
        };
        if written {
            report.written.push(file.path.clone());
        } else {
            report.skipped.push(file.path.clone());
        }
    }
    Ok(report)
}
