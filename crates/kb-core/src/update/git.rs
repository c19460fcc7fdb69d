//! The handful of git operations the orchestrator needs.

use super::runner::{CommandSpec, Output, ProcessRunner};
use crate::error::{KbError, Result};
use std::path::{Path, PathBuf};

/// git's exit status for a merge stopped by conflicts.
const MERGE_CONFLICT_EXIT: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Clean,
    Conflicts,
}

pub struct Git<'a> {
    runner: &'a dyn ProcessRunner,
    cwd: PathBuf,
    config: Vec<String>,
}

impl<'a> Git<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, cwd: &Path, config: Vec<String>) -> Self {
        Self {
            runner,
            cwd: cwd.to_path_buf(),
            config,
        }
    }

    fn cmd<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut spec = CommandSpec::new("git", &self.cwd);
        for c in &self.config {
            spec = spec.arg("-c").arg(c.clone());
        }
        spec.args(args)
    }

    fn run<I, S>(&self, args: I) -> Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.runner.run_checked(&self.cmd(args))
    }

    pub fn is_repository(&self) -> Result<bool> {
        let out = self
            .runner
            .run(&self.cmd(["rev-parse", "--is-inside-work-tree"]).captured())?;
        Ok(out.success())
    }

    pub fn is_clean(&self) -> Result<bool> {
        let out = self.runner.run_checked(&self.cmd(["status", "--porcelain"]).captured())?;
        Ok(out.stdout.trim().is_empty())
    }

    pub fn branch_exists(&self, branch: &str) -> Result<bool> {
        let out = self.runner.run(
            &self
                .cmd(["show-ref", "--verify", "--quiet"])
                .arg(format!("refs/heads/{branch}")),
        )?;
        Ok(out.success())
    }

    /// `git checkout -b <branch> [<start>]`
    pub fn create_branch(&self, branch: &str, start: Option<&str>) -> Result<()> {
        let mut args = vec!["checkout", "-b", branch];
        args.extend(start);
        self.run(args)?;
        Ok(())
    }

    pub fn checkout(&self, branch: &str) -> Result<()> {
        self.run(["checkout", branch])?;
        Ok(())
    }

    /// `git checkout -B <branch> <start>`: create or reset.
    pub fn reset_branch(&self, branch: &str, start: &str) -> Result<()> {
        self.run(["checkout", "-B", branch, start])?;
        Ok(())
    }

    /// Force-delete a local branch if it exists. Returns whether it existed.
    pub fn delete_branch(&self, branch: &str) -> Result<bool> {
        if !self.branch_exists(branch)? {
            return Ok(false);
        }
        self.run(["branch", "-D", branch])?;
        Ok(true)
    }

    /// Restore a single path from `source`, leaving the rest of the tree alone.
    pub fn checkout_path_from(&self, source: &str, path: &str) -> Result<()> {
        self.run(["checkout", source, "--", path])?;
        Ok(())
    }

    /// Paths with unmerged index entries (`git ls-files -u`).
    pub fn unmerged_paths(&self) -> Result<Vec<String>> {
        let out = self
            .runner
            .run_checked(&self.cmd(["ls-files", "-u"]).captured())?;
        let mut paths: Vec<String> = out
            .stdout
            .lines()
            .filter_map(|line| line.split_once('\t').map(|(_, path)| path.to_string()))
            .collect();
        paths.dedup();
        Ok(paths)
    }

    /// Overlay the tree of `source` onto the working directory.
    pub fn checkout_tree_from(&self, source: &str) -> Result<()> {
        self.run(["checkout", source, "--", "."])?;
        Ok(())
    }

    pub fn add_all(&self) -> Result<()> {
        self.run(["add", "--all"])?;
        Ok(())
    }

    pub fn has_staged_changes(&self) -> Result<bool> {
        let out = self.runner.run(&self.cmd(["diff", "--cached", "--quiet"]))?;
        match out.code {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(KbError::CommandFailed {
                command: "git diff --cached --quiet".into(),
                reason: format!("unexpected exit status {:?}", out.code),
            }),
        }
    }

    /// Stage everything and commit it. Returns false when there was nothing to commit.
    pub fn commit_all(&self, message: &str) -> Result<bool> {
        self.add_all()?;
        if !self.has_staged_changes()? {
            return Ok(false);
        }
        self.run(["commit", "--no-verify", "-m", message])?;
        Ok(true)
    }

    /// `git merge --no-edit --no-commit <branch>`, separating conflicts from failures.
    pub fn merge(&self, branch: &str) -> Result<MergeOutcome> {
        let cmd = self.cmd(["merge", "--no-edit", "--no-commit", branch]);
        let out = self.runner.run(&cmd)?;
        match out.code {
            Some(0) => Ok(MergeOutcome::Clean),
            Some(MERGE_CONFLICT_EXIT) => Ok(MergeOutcome::Conflicts),
            code => Err(KbError::CommandFailed {
                command: cmd.to_string(),
                reason: format!("merge failed unexpectedly (exit status {code:?})"),
            }),
        }
    }
}
