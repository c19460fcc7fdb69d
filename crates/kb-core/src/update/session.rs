//! State of a single upgrade run.

use super::conflicts::ConflictReport;
use chrono::Local;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// UpdateStep
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateStep {
    Validate,
    DownloadOldBinary,
    CreateAncestorBranch,
    CleanAncestorBranch,
    RegenerateAncestor,
    CreateCurrentBranch,
    CreateUpgradeBranch,
    CreateMergeBranch,
    MergeUpgradeIntoMerge,
    WriteOutputBranch,
    CleanupTempBranches,
}

impl fmt::Display for UpdateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UpdateStep::Validate => "validate",
            UpdateStep::DownloadOldBinary => "download old binary",
            UpdateStep::CreateAncestorBranch => "create ancestor branch",
            UpdateStep::CleanAncestorBranch => "clean ancestor branch",
            UpdateStep::RegenerateAncestor => "regenerate ancestor",
            UpdateStep::CreateCurrentBranch => "create current branch",
            UpdateStep::CreateUpgradeBranch => "create upgrade branch",
            UpdateStep::CreateMergeBranch => "create merge branch",
            UpdateStep::MergeUpgradeIntoMerge => "merge upgrade into merge",
            UpdateStep::WriteOutputBranch => "write output branch",
            UpdateStep::CleanupTempBranches => "clean up temporary branches",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// UpdateBranches
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateBranches {
    pub ancestor: String,
    pub current: String,
    pub upgrade: String,
    pub merge: String,
}

impl UpdateBranches {
    /// `tmp-kb-update-<role>-<suffix>` for each role.
    pub fn with_suffix(suffix: &str) -> Self {
        let name = |role: &str| format!("tmp-kb-update-{role}-{suffix}");
        Self {
            ancestor: name("ancestor"),
            current: name("current"),
            upgrade: name("upgrade"),
            merge: name("merge"),
        }
    }

    /// Suffixed with the local time as `ddmmyy-HHMM`.
    pub fn now() -> Self {
        Self::with_suffix(&Local::now().format("%d%m%y-%H%M").to_string())
    }

    pub fn all(&self) -> [&str; 4] {
        [&self.ancestor, &self.current, &self.upgrade, &self.merge]
    }
}

// ---------------------------------------------------------------------------
// Outcome and report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateOutcome {
    /// The merge branch holds a clean, committed result.
    Done,
    /// Conflict markers remain on the merge branch for manual resolution.
    ConflictsLeftForUser,
}

/// Everything a run created, for the final summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReport {
    pub from_version: String,
    pub to_version: String,
    pub from_branch: String,
    pub branches: UpdateBranches,
    pub completed: Vec<UpdateStep>,
    pub old_binary: Option<PathBuf>,
    /// Set when the target release was downloaded rather than installed.
    pub new_binary: Option<PathBuf>,
    pub output_branch: Option<String>,
    /// Conflicted files committed with `--force`.
    pub conflicts: Option<ConflictReport>,
    /// Temporary branches and downloads were removed.
    pub cleaned_up: bool,
    pub outcome: Option<UpdateOutcome>,
}

impl UpdateReport {
    pub fn new(branches: UpdateBranches, from_branch: &str) -> Self {
        Self {
            from_version: String::new(),
            to_version: String::new(),
            from_branch: from_branch.to_string(),
            branches,
            completed: Vec::new(),
            old_binary: None,
            new_binary: None,
            output_branch: None,
            conflicts: None,
            cleaned_up: false,
            outcome: None,
        }
    }
}

impl fmt::Display for UpdateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "from version: {}", self.from_version)?;
        writeln!(f, "to version:   {}", self.to_version)?;
        writeln!(f, "from branch:  {}", self.from_branch)?;
        if self.cleaned_up {
            writeln!(f, "temporary branches removed")?;
        } else {
            writeln!(f, "branches:")?;
            writeln!(f, "  ancestor: {}", self.branches.ancestor)?;
            writeln!(f, "  current:  {}", self.branches.current)?;
            writeln!(f, "  upgrade:  {}", self.branches.upgrade)?;
            writeln!(f, "  merge:    {}", self.branches.merge)?;
            for bin in self.old_binary.iter().chain(&self.new_binary) {
                writeln!(f, "downloaded: {}", bin.display())?;
            }
        }
        if let Some(out) = &self.output_branch {
            writeln!(f, "output branch: {out}")?;
        }
        if let Some(conflicts) = &self.conflicts {
            for file in conflicts.source_files.iter().chain(&conflicts.generated_files) {
                writeln!(f, "  conflict: {file}")?;
            }
        }
        let conflict_branch = self.output_branch.as_ref().unwrap_or(&self.branches.merge);
        match self.outcome {
            Some(UpdateOutcome::Done) => writeln!(f, "result: merged cleanly"),
            Some(UpdateOutcome::ConflictsLeftForUser) => writeln!(
                f,
                "result: conflicts left on {conflict_branch}; resolve them, then run: make manifests generate fmt vet lint-fix"
            ),
            None => writeln!(
                f,
                "result: stopped after {}",
                self.completed
                    .last()
                    .map_or_else(|| "start".to_string(), |s| s.to_string())
            ),
        }
    }
}
