use super::conflicts::{decide_make_targets, find_conflicts, ConflictReport};
use super::git::{Git, MergeOutcome};
use super::options::UpdateOptions;
use super::release::ReleaseSource;
use super::runner::{CommandSpec, ProcessRunner};
use super::session::{UpdateBranches, UpdateOutcome, UpdateReport, UpdateStep};
use crate::error::{KbError, Result};
use crate::io::OsFilesystem;
use crate::store::{self, DEFAULT_PATH};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Drives one upgrade run against the git working tree at `root`.
pub struct Orchestrator<'a> {
    root: PathBuf,
    opts: UpdateOptions,
    runner: &'a dyn ProcessRunner,
    release: &'a dyn ReleaseSource,
    branches: UpdateBranches,
}

/// Parse `raw` as semver, accepting an optional `v` prefix. Returns `vX.Y.Z`.
pub fn normalize_version(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
    semver::Version::parse(bare)
        .map(|v| format!("v{v}"))
        .map_err(|_| KbError::InvalidVersion(raw.to_string()))
}

/// Remove everything in `root` except `.git` and the project file.
pub fn clean_tree(root: &Path) -> Result<()> {
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name();
        if name == ".git" || name == DEFAULT_PATH {
            continue;
        }
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// `PATH` with `dir` in front, for a single child process.
fn prefixed_path(dir: &Path) -> Result<String> {
    let current = std::env::var_os("PATH").unwrap_or_default();
    let paths = std::iter::once(dir.to_path_buf()).chain(std::env::split_paths(&current));
    let joined = std::env::join_paths(paths).map_err(|e| KbError::CommandFailed {
        command: "PATH".into(),
        reason: e.to_string(),
    })?;
    Ok(joined.to_string_lossy().into_owned())
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        root: &Path,
        opts: UpdateOptions,
        runner: &'a dyn ProcessRunner,
        release: &'a dyn ReleaseSource,
    ) -> Self {
        Self {
            root: root.to_path_buf(),
            opts,
            runner,
            release,
            branches: UpdateBranches::now(),
        }
    }

    pub fn with_branches(mut self, branches: UpdateBranches) -> Self {
        self.branches = branches;
        self
    }

    pub fn new_report(&self) -> UpdateReport {
        UpdateReport::new(self.branches.clone(), &self.opts.from_branch)
    }

    fn git(&self) -> Git<'a> {
        Git::new(self.runner, &self.root, self.opts.effective_git_config())
    }

    fn step<T>(
        &self,
        report: &mut UpdateReport,
        step: UpdateStep,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        info!(%step, "update step");
        let out = f().map_err(|source| KbError::Step {
            step,
            source: Box::new(source),
        })?;
        report.completed.push(step);
        Ok(out)
    }

    /// Run every step in order. `report` is filled in as steps complete,
    /// so it is meaningful even when this returns an error.
    pub fn run(&self, report: &mut UpdateReport) -> Result<UpdateOutcome> {
        let git = self.git();
        let b = &self.branches;
        let from_branch = self.opts.from_branch.as_str();

        let (from, to) = self.step(report, UpdateStep::Validate, || self.validate(&git))?;
        report.from_version = from.clone();
        report.to_version = to.clone();

        let (old_binary, new_binary) = self.step(report, UpdateStep::DownloadOldBinary, || {
            let old = self.download(&from)?;
            let new = match self.opts.to_version {
                Some(_) => Some(self.download(&to)?),
                None => None,
            };
            Ok((old, new))
        })?;
        report.old_binary = Some(old_binary.clone());
        report.new_binary = new_binary.clone();

        self.step(report, UpdateStep::CreateAncestorBranch, || {
            git.create_branch(&b.ancestor, Some(from_branch))
        })?;

        self.step(report, UpdateStep::CleanAncestorBranch, || {
            clean_tree(&self.root)?;
            git.commit_all("(chore) remove scaffold before regeneration")?;
            Ok(())
        })?;

        self.step(report, UpdateStep::RegenerateAncestor, || {
            self.regenerate(&old_binary, true)?;
            git.commit_all(&format!("(chore) initial scaffold from release version: {from}"))?;
            Ok(())
        })?;

        self.step(report, UpdateStep::CreateCurrentBranch, || {
            git.create_branch(&b.current, None)?;
            clean_tree(&self.root)?;
            git.checkout_tree_from(from_branch)?;
            git.commit_all(&format!("(chore) original code from {from_branch} to keep changes"))?;
            Ok(())
        })?;

        self.step(report, UpdateStep::CreateUpgradeBranch, || {
            git.create_branch(&b.upgrade, Some(&b.ancestor))?;
            clean_tree(&self.root)?;
            match &new_binary {
                Some(downloaded) => self.regenerate(downloaded, true)?,
                None => {
                    let installed = match &self.opts.installed_binary {
                        Some(path) => path.clone(),
                        None => std::env::current_exe()?,
                    };
                    self.regenerate(&installed, false)?;
                }
            }
            git.commit_all(&format!("(chore) initial scaffold from release version: {to}"))?;
            Ok(())
        })?;

        self.step(report, UpdateStep::CreateMergeBranch, || {
            git.create_branch(&b.merge, Some(&b.current))
        })?;

        let (outcome, conflicts) = self.step(report, UpdateStep::MergeUpgradeIntoMerge, || {
            self.merge(&git, &from, &to)
        })?;
        report.outcome = Some(outcome);
        report.conflicts = conflicts;
        if outcome == UpdateOutcome::ConflictsLeftForUser && !self.opts.force {
            return Ok(outcome);
        }

        let output = self.opts.output_branch_name(&from, &to);
        self.step(report, UpdateStep::WriteOutputBranch, || {
            self.write_output_branch(&git, &output, &from, &to, outcome)
        })?;
        report.output_branch = Some(output.clone());

        let downloads: Vec<PathBuf> = report
            .old_binary
            .iter()
            .chain(&report.new_binary)
            .cloned()
            .collect();
        self.step(report, UpdateStep::CleanupTempBranches, || {
            self.cleanup(&git, &output, &downloads)
        })?;
        report.cleaned_up = true;
        Ok(outcome)
    }

    /// Returns the normalized `(from, to)` versions.
    fn validate(&self, git: &Git<'_>) -> Result<(String, String)> {
        self.opts.check()?;
        let from = self.resolve_from_version()?;
        let to = match &self.opts.to_version {
            Some(v) => normalize_version(v)?,
            None => self.opts.installed_version.clone(),
        };

        if !git.is_repository()? {
            return Err(KbError::NotAGitRepository);
        }
        if !git.is_clean()? {
            return Err(KbError::DirtyWorkingTree);
        }
        if !git.branch_exists(&self.opts.from_branch)? {
            return Err(KbError::BranchNotFound(self.opts.from_branch.clone()));
        }
        self.release.check_published(&from)?;
        if self.opts.to_version.is_some() {
            self.release.check_published(&to)?;
        }
        info!(%from, %to, branch = %self.opts.from_branch, "update preconditions met");
        Ok((from, to))
    }

    fn resolve_from_version(&self) -> Result<String> {
        if let Some(v) = &self.opts.from_version {
            return normalize_version(v);
        }
        let cfg = store::read_from(&OsFilesystem::new(&self.root), Path::new(DEFAULT_PATH))?;
        if cfg.cli_version().is_empty() {
            return Err(KbError::MissingCliVersion);
        }
        normalize_version(cfg.cli_version())
    }

    fn download(&self, version: &str) -> Result<PathBuf> {
        let dir = tempfile::Builder::new()
            .prefix("kubebuilder-")
            .tempdir()?
            .keep();
        let binary = self.release.download(version, &dir)?;
        info!(%version, path = %binary.display(), "downloaded release");
        Ok(binary)
    }

    /// Run `<binary> alpha generate`, then the make targets.
    fn regenerate(&self, binary: &Path, prefix_path: bool) -> Result<()> {
        let mut cmd = CommandSpec::new(binary.to_string_lossy(), &self.root).args(["alpha", "generate"]);
        if prefix_path {
            if let Some(dir) = binary.parent() {
                cmd = cmd.env("PATH", prefixed_path(dir)?);
            }
        }
        self.runner.run_checked(&cmd)?;
        self.run_make_targets(&self.opts.make_targets);
        Ok(())
    }

    /// Best effort: a failing target is reported and the run continues.
    fn run_make_targets(&self, targets: &[String]) {
        for target in targets {
            let cmd = CommandSpec::new("make", &self.root).arg(target.clone());
            match self.runner.run(&cmd) {
                Ok(out) if out.success() => {}
                Ok(out) => warn!(%target, code = ?out.code, "make target failed"),
                Err(e) => warn!(%target, error = %e, "make target failed"),
            }
        }
    }

    /// Make targets that can still succeed on the merged tree.
    fn conflict_aware_targets(&self, report: &ConflictReport) -> Vec<String> {
        let summary = &report.summary;
        if summary.makefile {
            warn!("Makefile has conflicts; skipping all make targets");
        }
        if summary.api {
            warn!("API conflicts detected; skipping make manifests and generate");
        }
        if summary.any_go {
            warn!("Go conflicts detected; skipping make fmt, vet and lint-fix");
        }
        decide_make_targets(summary, &self.opts.make_targets)
    }

    fn merge(
        &self,
        git: &Git<'_>,
        from: &str,
        to: &str,
    ) -> Result<(UpdateOutcome, Option<ConflictReport>)> {
        let b = &self.branches;
        match git.merge(&b.upgrade)? {
            MergeOutcome::Clean => {
                info!(branch = %b.merge, "merge completed without conflicts");
                self.run_make_targets(&self.opts.make_targets);
                git.commit_all(&self.opts.merge_message(from, to, false))?;
                Ok((UpdateOutcome::Done, None))
            }
            MergeOutcome::Conflicts if self.opts.force => {
                let conflicts = find_conflicts(git, &self.root)?;
                let targets = self.conflict_aware_targets(&conflicts);
                self.run_make_targets(&targets);
                git.commit_all(&self.opts.merge_message(from, to, true))?;
                warn!(branch = %b.merge, "merge completed with conflicts; conflict markers were committed");
                Ok((UpdateOutcome::ConflictsLeftForUser, Some(conflicts)))
            }
            MergeOutcome::Conflicts => {
                warn!(branch = %b.merge, "merge stopped due to conflicts; manual resolution is required");
                warn!("after resolving the conflicts, run: make manifests generate fmt vet lint-fix");
                Ok((UpdateOutcome::ConflictsLeftForUser, None))
            }
        }
    }

    /// Put the merge result on `output`: the merge branch history as-is, or
    /// one squashed commit on top of the base branch.
    fn write_output_branch(
        &self,
        git: &Git<'_>,
        output: &str,
        from: &str,
        to: &str,
        outcome: UpdateOutcome,
    ) -> Result<()> {
        if self.opts.show_commits {
            return git.create_branch(output, Some(&self.branches.merge));
        }
        let base = self.opts.from_branch.as_str();
        git.checkout(base)?;
        git.reset_branch(output, base)?;
        clean_tree(&self.root)?;
        git.checkout_tree_from(&self.branches.merge)?;
        for path in self.opts.restore_path.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
            if let Err(e) = git.checkout_path_from(base, path) {
                warn!(%path, branch = %base, error = %e, "failed to restore path");
            }
        }
        let conflicts = outcome == UpdateOutcome::ConflictsLeftForUser;
        git.commit_all(&self.opts.merge_message(from, to, conflicts))?;
        info!(branch = %output, "squashed update onto output branch");
        Ok(())
    }

    /// Delete the temporary branches and downloaded releases. Failures are logged.
    fn cleanup(&self, git: &Git<'_>, output: &str, downloads: &[PathBuf]) -> Result<()> {
        git.checkout(output)?;
        for branch in self.branches.all() {
            if let Err(e) = git.delete_branch(branch) {
                warn!(%branch, error = %e, "failed to delete temporary branch");
            }
        }
        for dir in downloads.iter().filter_map(|bin| bin.parent()) {
            if let Err(e) = std::fs::remove_dir_all(dir) {
                warn!(path = %dir.display(), error = %e, "failed to remove downloaded release");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::runner::Output;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Answers commands by substring; everything else exits 0 with no output.
    #[derive(Default)]
    struct ScriptedRunner {
        rules: Vec<(String, Output)>,
        calls: Mutex<Vec<CommandSpec>>,
    }

    impl ScriptedRunner {
        fn on(mut self, needle: &str, code: i32, stdout: &str) -> Self {
            self.rules.push((
                needle.to_string(),
                Output {
                    code: Some(code),
                    stdout: stdout.to_string(),
                },
            ));
            self
        }

        fn calls(&self) -> Vec<CommandSpec> {
            self.calls.lock().unwrap().clone()
        }

        fn lines(&self) -> Vec<String> {
            self.calls().iter().map(|c| c.to_string()).collect()
        }

        fn position(&self, needle: &str) -> Option<usize> {
            self.lines().iter().position(|l| l.contains(needle))
        }
    }

    impl ProcessRunner for ScriptedRunner {
        fn run(&self, cmd: &CommandSpec) -> Result<Output> {
            self.calls.lock().unwrap().push(cmd.clone());
            let line = cmd.to_string();
            Ok(self
                .rules
                .iter()
                .find(|(needle, _)| line.contains(needle.as_str()))
                .map(|(_, out)| out.clone())
                .unwrap_or(Output {
                    code: Some(0),
                    stdout: String::new(),
                }))
        }
    }

    #[derive(Default)]
    struct FakeRelease {
        checked: Mutex<Vec<String>>,
        downloaded: Mutex<Vec<String>>,
    }

    impl ReleaseSource for FakeRelease {
        fn check_published(&self, version: &str) -> Result<()> {
            self.checked.lock().unwrap().push(version.to_string());
            Ok(())
        }

        fn download(&self, version: &str, dir: &Path) -> Result<PathBuf> {
            self.downloaded.lock().unwrap().push(version.to_string());
            let path = dir.join("kubebuilder");
            std::fs::write(&path, "")?;
            Ok(path)
        }
    }

    const INSTALLED: &str = "/opt/kb/bin/kubebuilder";

    fn project(cli_version: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        let doc = if cli_version.is_empty() {
            "domain: test.io\nversion: \"3\"\n".to_string()
        } else {
            format!("cliVersion: {cli_version}\ndomain: test.io\nversion: \"3\"\n")
        };
        std::fs::write(dir.path().join("PROJECT"), doc).unwrap();
        std::fs::write(dir.path().join("main.go"), "package main\n").unwrap();
        dir
    }

    fn options() -> UpdateOptions {
        UpdateOptions {
            installed_binary: Some(INSTALLED.into()),
            installed_version: "v4.6.0".into(),
            ..Default::default()
        }
    }

    fn run_with(
        dir: &TempDir,
        opts: UpdateOptions,
        runner: &ScriptedRunner,
        release: &FakeRelease,
    ) -> (UpdateReport, Result<UpdateOutcome>) {
        let orch = Orchestrator::new(dir.path(), opts, runner, release)
            .with_branches(UpdateBranches::with_suffix("t"));
        let mut report = orch.new_report();
        let result = orch.run(&mut report);
        (report, result)
    }

    fn failed_step(result: Result<UpdateOutcome>) -> (UpdateStep, KbError) {
        match result {
            Err(KbError::Step { step, source }) => (step, *source),
            other => panic!("expected a step failure, got {other:?}"),
        }
    }

    #[test]
    fn versions_are_normalized() {
        assert_eq!(normalize_version("4.5.0").unwrap(), "v4.5.0");
        assert_eq!(normalize_version("v4.5.0").unwrap(), "v4.5.0");
        assert!(normalize_version("latest").is_err());
        assert!(normalize_version("v4.5").is_err());
    }

    #[test]
    fn invalid_from_version_fails_before_git_or_network() {
        let dir = project("v4.5.0");
        let runner = ScriptedRunner::default();
        let release = FakeRelease::default();
        let opts = UpdateOptions {
            from_version: Some("not-a-version".into()),
            ..options()
        };
        let (report, result) = run_with(&dir, opts, &runner, &release);
        let (step, source) = failed_step(result);
        assert_eq!(step, UpdateStep::Validate);
        assert!(matches!(source, KbError::InvalidVersion(_)));
        assert!(runner.calls().is_empty());
        assert!(release.checked.lock().unwrap().is_empty());
        assert!(report.completed.is_empty());
    }

    #[test]
    fn missing_cli_version_is_reported() {
        let dir = project("");
        let runner = ScriptedRunner::default();
        let (_, result) = run_with(&dir, options(), &runner, &FakeRelease::default());
        let (_, source) = failed_step(result);
        assert!(matches!(source, KbError::MissingCliVersion));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn dirty_tree_is_rejected_before_release_lookup() {
        let dir = project("v4.5.0");
        let runner = ScriptedRunner::default().on("status --porcelain", 0, " M main.go\n");
        let release = FakeRelease::default();
        let (_, result) = run_with(&dir, options(), &runner, &release);
        let (_, source) = failed_step(result);
        assert!(matches!(source, KbError::DirtyWorkingTree));
        assert!(release.checked.lock().unwrap().is_empty());
    }

    #[test]
    fn not_a_repository() {
        let dir = project("v4.5.0");
        let runner = ScriptedRunner::default().on("rev-parse", 128, "");
        let (_, result) = run_with(&dir, options(), &runner, &FakeRelease::default());
        assert!(matches!(failed_step(result).1, KbError::NotAGitRepository));
    }

    #[test]
    fn missing_from_branch() {
        let dir = project("v4.5.0");
        let runner = ScriptedRunner::default().on("show-ref", 1, "");
        let opts = UpdateOptions {
            from_branch: "develop".into(),
            ..options()
        };
        let (_, result) = run_with(&dir, opts, &runner, &FakeRelease::default());
        assert!(matches!(failed_step(result).1, KbError::BranchNotFound(b) if b == "develop"));
    }

    #[test]
    fn clean_merge_runs_make_targets_and_commits() {
        let dir = project("4.5.0");
        let runner = ScriptedRunner::default().on("diff --cached --quiet", 1, "");
        let release = FakeRelease::default();
        let (report, result) = run_with(&dir, options(), &runner, &release);

        assert_eq!(result.unwrap(), UpdateOutcome::Done);
        assert_eq!(report.from_version, "v4.5.0");
        assert_eq!(*release.checked.lock().unwrap(), vec!["v4.5.0".to_string()]);
        assert_eq!(report.to_version, "v4.6.0");
        assert_eq!(report.completed.len(), 11);
        assert_eq!(report.outcome, Some(UpdateOutcome::Done));
        assert!(report.new_binary.is_none());

        let lines = runner.lines();
        let merge_at = runner.position("merge --no-edit --no-commit tmp-kb-update-upgrade-t").unwrap();
        let after: Vec<&String> = lines[merge_at..].iter().collect();
        assert!(after.iter().any(|l| *l == "make manifests"));
        assert!(after.iter().any(|l| *l == "make lint-fix"));
        assert!(after.iter().any(|l| l.contains("commit --no-verify -m")));
    }

    #[test]
    fn conflicts_skip_post_merge_generation() {
        let dir = project("v4.5.0");
        let runner = ScriptedRunner::default()
            .on("merge --no-edit", 1, "")
            .on("diff --cached --quiet", 1, "");
        let (report, result) = run_with(&dir, options(), &runner, &FakeRelease::default());

        assert_eq!(result.unwrap(), UpdateOutcome::ConflictsLeftForUser);
        assert_eq!(report.outcome, Some(UpdateOutcome::ConflictsLeftForUser));
        let lines = runner.lines();
        let merge_at = runner.position("merge --no-edit").unwrap();
        assert_eq!(merge_at, lines.len() - 1, "nothing may run after a conflicted merge");
    }

    #[test]
    fn conflicts_without_force_keep_temporary_branches() {
        let dir = project("v4.5.0");
        let runner = ScriptedRunner::default().on("merge --no-edit", 1, "");
        let (report, result) = run_with(&dir, options(), &runner, &FakeRelease::default());

        assert_eq!(result.unwrap(), UpdateOutcome::ConflictsLeftForUser);
        assert!(runner.position("branch -D").is_none());
        assert!(report.output_branch.is_none());
        assert!(!report.cleaned_up);
        let old_binary = report.old_binary.unwrap();
        assert!(old_binary.exists());
        std::fs::remove_dir_all(old_binary.parent().unwrap()).unwrap();
    }

    #[test]
    fn force_commits_conflict_markers_without_generation() {
        let dir = project("v4.5.0");
        let runner = ScriptedRunner::default()
            .on("merge --no-edit", 1, "")
            .on("ls-files -u", 0, "100644 abc 2\tapi/v1/captain_types.go\n100644 def 3\tapi/v1/captain_types.go\n")
            .on("diff --cached --quiet", 1, "");
        let opts = UpdateOptions {
            force: true,
            ..options()
        };
        let (report, result) = run_with(&dir, opts, &runner, &FakeRelease::default());

        assert_eq!(result.unwrap(), UpdateOutcome::ConflictsLeftForUser);
        let lines = runner.lines();
        let merge_at = runner.position("merge --no-edit").unwrap();
        let after = &lines[merge_at + 1..];
        assert!(after.iter().any(|l| l.contains("manual conflict resolution required")));
        // API and Go conflicts rule out every default target.
        assert!(!after.iter().any(|l| l.starts_with("make ")));

        let conflicts = report.conflicts.unwrap();
        assert_eq!(conflicts.source_files, vec!["api/v1/captain_types.go"]);
        assert!(conflicts.summary.api && conflicts.summary.any_go);
        assert_eq!(
            report.output_branch.as_deref(),
            Some("kubebuilder-update-from-v4.5.0-to-v4.6.0")
        );
    }

    #[test]
    fn forced_merge_runs_targets_unaffected_by_conflicts() {
        let dir = project("v4.5.0");
        let runner = ScriptedRunner::default()
            .on("merge --no-edit", 1, "")
            .on("ls-files -u", 0, "100644 abc 2\tinternal/controller/captain_controller.go\n");
        let opts = UpdateOptions {
            force: true,
            ..options()
        };
        let (_, result) = run_with(&dir, opts, &runner, &FakeRelease::default());
        result.unwrap();

        let lines = runner.lines();
        let merge_at = runner.position("merge --no-edit").unwrap();
        let makes: Vec<&String> = lines[merge_at..].iter().filter(|l| l.starts_with("make ")).collect();
        assert_eq!(makes, vec!["make manifests", "make generate"]);
    }

    #[test]
    fn conflict_markers_on_disk_are_detected() {
        let dir = project("v4.5.0");
        std::fs::write(dir.path().join("Makefile"), "<<<<<<< HEAD\nall:\n=======\n>>>>>>> x\n").unwrap();
        let runner = ScriptedRunner::default().on("merge --no-edit", 1, "");
        let opts = UpdateOptions {
            force: true,
            ..options()
        };
        let (report, result) = run_with(&dir, opts, &runner, &FakeRelease::default());
        result.unwrap();

        assert!(report.conflicts.unwrap().summary.makefile);
        let merge_at = runner.position("merge --no-edit").unwrap();
        assert!(!runner.lines()[merge_at..].iter().any(|l| l.starts_with("make ")));
    }

    #[test]
    fn to_version_regenerates_upgrade_with_downloaded_release() {
        let dir = project("v4.5.0");
        let runner = ScriptedRunner::default();
        let release = FakeRelease::default();
        let opts = UpdateOptions {
            to_version: Some("4.7.0".into()),
            ..options()
        };
        let (report, result) = run_with(&dir, opts, &runner, &release);
        result.unwrap();

        assert_eq!(report.to_version, "v4.7.0");
        assert_eq!(*release.checked.lock().unwrap(), vec!["v4.5.0", "v4.7.0"]);
        assert_eq!(*release.downloaded.lock().unwrap(), vec!["v4.5.0", "v4.7.0"]);

        let new_binary = report.new_binary.unwrap();
        let generates: Vec<CommandSpec> = runner
            .calls()
            .into_iter()
            .filter(|c| c.args == ["alpha", "generate"])
            .collect();
        assert_eq!(generates.len(), 2);
        assert_eq!(generates[1].program, new_binary.to_string_lossy());
        assert_eq!(generates[1].env[0].0, "PATH");
        assert!(runner.calls().iter().all(|c| c.program != INSTALLED));
        assert!(runner
            .position("checkout -B kubebuilder-update-from-v4.5.0-to-v4.7.0 main")
            .is_some());
    }

    #[test]
    fn invalid_to_version_fails_before_git() {
        let dir = project("v4.5.0");
        let runner = ScriptedRunner::default();
        let opts = UpdateOptions {
            to_version: Some("next".into()),
            ..options()
        };
        let (_, result) = run_with(&dir, opts, &runner, &FakeRelease::default());
        assert!(matches!(failed_step(result).1, KbError::InvalidVersion(v) if v == "next"));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn squash_writes_one_commit_on_output_branch_and_restores_paths() {
        let dir = project("v4.5.0");
        let runner = ScriptedRunner::default().on("diff --cached --quiet", 1, "");
        let opts = UpdateOptions {
            output_branch: Some("upgrade-scaffold".into()),
            restore_path: vec![".github/workflows".into(), " ".into()],
            commit_message: Some("chore: upgrade scaffold".into()),
            ..options()
        };
        let (report, result) = run_with(&dir, opts, &runner, &FakeRelease::default());
        assert_eq!(result.unwrap(), UpdateOutcome::Done);
        assert_eq!(report.output_branch.as_deref(), Some("upgrade-scaffold"));

        let lines = runner.lines();
        let reset_at = runner.position("checkout -B upgrade-scaffold main").unwrap();
        let tree_at = runner.position("checkout tmp-kb-update-merge-t -- .").unwrap();
        let restore_at = runner.position("checkout main -- .github/workflows").unwrap();
        assert!(lines[reset_at - 1].ends_with("checkout main"));
        assert!(reset_at < tree_at && tree_at < restore_at);
        assert_eq!(
            lines.iter().filter(|l| l.contains("checkout main -- ")).count(),
            2,
            "blank restore paths are skipped"
        );
        let squash_commit = &lines[restore_at..]
            .iter()
            .find(|l| l.contains("commit --no-verify"))
            .unwrap();
        assert!(squash_commit.ends_with("-m chore: upgrade scaffold"));
    }

    #[test]
    fn show_commits_branches_output_from_merge() {
        let dir = project("v4.5.0");
        let runner = ScriptedRunner::default();
        let opts = UpdateOptions {
            show_commits: true,
            ..options()
        };
        let (_, result) = run_with(&dir, opts, &runner, &FakeRelease::default());
        result.unwrap();

        assert!(runner
            .position("checkout -b kubebuilder-update-from-v4.5.0-to-v4.6.0 tmp-kb-update-merge-t")
            .is_some());
        assert!(runner.position("checkout -B").is_none());
    }

    #[test]
    fn show_commits_rejects_restore_paths_up_front() {
        let dir = project("v4.5.0");
        let runner = ScriptedRunner::default();
        let opts = UpdateOptions {
            show_commits: true,
            restore_path: vec!["Dockerfile".into()],
            ..options()
        };
        let (_, result) = run_with(&dir, opts, &runner, &FakeRelease::default());
        assert!(matches!(failed_step(result).1, KbError::InvalidOptions(_)));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn custom_conflict_message_is_used_with_force() {
        let dir = project("v4.5.0");
        let runner = ScriptedRunner::default()
            .on("merge --no-edit", 1, "")
            .on("diff --cached --quiet", 1, "");
        let opts = UpdateOptions {
            force: true,
            commit_message_conflict: Some("chore: needs review".into()),
            ..options()
        };
        let (_, result) = run_with(&dir, opts, &runner, &FakeRelease::default());
        result.unwrap();

        let commits: Vec<String> = runner
            .lines()
            .into_iter()
            .filter(|l| l.contains("commit --no-verify"))
            .collect();
        // merge branch commit and squashed output commit
        assert_eq!(
            commits.iter().filter(|l| l.ends_with("-m chore: needs review")).count(),
            2
        );
    }

    #[test]
    fn success_removes_temporary_branches_and_downloads() {
        let dir = project("v4.5.0");
        let runner = ScriptedRunner::default();
        let (report, result) = run_with(&dir, options(), &runner, &FakeRelease::default());
        result.unwrap();

        let lines = runner.lines();
        let checkout_out = runner
            .position("checkout kubebuilder-update-from-v4.5.0-to-v4.6.0")
            .unwrap();
        for branch in UpdateBranches::with_suffix("t").all() {
            let delete_at = runner.position(&format!("branch -D {branch}")).unwrap();
            assert!(delete_at > checkout_out);
        }
        assert!(lines.last().unwrap().contains("branch -D tmp-kb-update-merge-t"));
        assert!(report.cleaned_up);
        assert_eq!(report.completed.last(), Some(&UpdateStep::CleanupTempBranches));
        assert!(!report.old_binary.unwrap().parent().unwrap().exists());
    }

    #[test]
    fn other_merge_failures_are_fatal() {
        let dir = project("v4.5.0");
        let runner = ScriptedRunner::default().on("merge --no-edit", 128, "");
        let (report, result) = run_with(&dir, options(), &runner, &FakeRelease::default());
        let (step, source) = failed_step(result);
        assert_eq!(step, UpdateStep::MergeUpgradeIntoMerge);
        assert!(matches!(source, KbError::CommandFailed { .. }));
        assert_eq!(report.completed.last(), Some(&UpdateStep::CreateMergeBranch));
        assert!(report.outcome.is_none());
    }

    #[test]
    fn branches_are_staged_from_the_right_bases() {
        let dir = project("v4.5.0");
        let runner = ScriptedRunner::default();
        let (_, result) = run_with(&dir, options(), &runner, &FakeRelease::default());
        result.unwrap();

        assert!(runner.position("checkout -b tmp-kb-update-ancestor-t main").is_some());
        assert!(runner.position("checkout main -- .").is_some());
        assert!(runner
            .position("checkout -b tmp-kb-update-upgrade-t tmp-kb-update-ancestor-t")
            .is_some());
        assert!(runner
            .position("checkout -b tmp-kb-update-merge-t tmp-kb-update-current-t")
            .is_some());
        // Nothing staged: commits are skipped.
        assert!(runner.position("commit --no-verify").is_none());
        // git config defaults are applied to every git call.
        for call in runner.calls().iter().filter(|c| c.program == "git") {
            assert_eq!(&call.args[..2], ["-c", "merge.renameLimit=999999"]);
        }
    }

    #[test]
    fn only_the_old_binary_gets_a_path_prefix() {
        let dir = project("v4.5.0");
        let runner = ScriptedRunner::default();
        let (report, result) = run_with(&dir, options(), &runner, &FakeRelease::default());
        result.unwrap();

        let old_binary = report.old_binary.unwrap();
        let old_dir = old_binary.parent().unwrap().to_string_lossy().into_owned();
        let generates: Vec<CommandSpec> = runner
            .calls()
            .into_iter()
            .filter(|c| c.args == ["alpha", "generate"])
            .collect();
        assert_eq!(generates.len(), 2);

        assert_eq!(generates[0].program, old_binary.to_string_lossy());
        let (key, value) = &generates[0].env[0];
        assert_eq!(key, "PATH");
        assert!(value.starts_with(&old_dir));

        assert_eq!(generates[1].program, INSTALLED);
        assert!(generates[1].env.is_empty());
    }

    #[test]
    fn clean_tree_keeps_git_and_project() {
        let dir = project("v4.5.0");
        std::fs::create_dir_all(dir.path().join(".git/refs")).unwrap();
        std::fs::create_dir_all(dir.path().join("api/v1")).unwrap();
        std::fs::write(dir.path().join("api/v1/types.go"), "x").unwrap();
        clean_tree(dir.path()).unwrap();

        let mut left: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(left, vec![".git".to_string(), "PROJECT".to_string()]);
    }
}
