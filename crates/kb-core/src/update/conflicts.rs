//! Conflict detection after a merge, and which `make` targets are still safe to run.

use super::git::Git;
use crate::error::Result;
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::{BufRead, BufReader};
use std::path::Path;
use walkdir::WalkDir;

const SKIP_DIRS: &[&str] = &[".git", "vendor", "bin"];
const MAX_SCAN_BYTES: u64 = 2 << 20;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictSummary {
    pub makefile: bool,
    /// Anything under `api/` or `apis/`.
    pub api: bool,
    pub any_go: bool,
}

impl ConflictSummary {
    pub fn is_empty(&self) -> bool {
        !(self.makefile || self.api || self.any_go)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    pub summary: ConflictSummary,
    pub source_files: Vec<String>,
    pub generated_files: Vec<String>,
}

impl ConflictReport {
    pub fn has_conflicts(&self) -> bool {
        !(self.source_files.is_empty() && self.generated_files.is_empty())
    }
}

/// Files regenerated by `make manifests generate`.
pub fn is_generated(path: &str) -> bool {
    path.contains("/zz_generated.")
        || path.starts_with("config/crd/bases/")
        || path.starts_with("config/rbac/")
        || path == "dist/install.yaml"
        || path.ends_with("_deepcopy.go")
}

/// Unmerged index entries plus files under `root` carrying conflict markers.
pub fn find_conflicts(git: &Git<'_>, root: &Path) -> Result<ConflictReport> {
    let mut files: BTreeSet<String> = git.unmerged_paths()?.into_iter().collect();
    files.extend(scan_markers(root));
    Ok(categorize(files))
}

fn categorize(files: BTreeSet<String>) -> ConflictReport {
    let summary = ConflictSummary {
        makefile: files.iter().any(|f| f == "Makefile" || f == "makefile"),
        api: files.iter().any(|f| {
            ["api", "apis"]
                .iter()
                .any(|p| f == p || f.starts_with(&format!("{p}/")))
        }),
        any_go: files.iter().any(|f| f.ends_with(".go")),
    };
    let (generated_files, source_files) = files.into_iter().partition(|f| is_generated(f));
    ConflictReport {
        summary,
        source_files,
        generated_files,
    }
}

/// Relative paths of files containing `<<<<<<< `, `=======` or `>>>>>>> ` lines.
fn scan_markers(root: &Path) -> Vec<String> {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| {
            !(e.file_type().is_dir()
                && SKIP_DIRS.iter().any(|d| e.file_name() == *d))
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.metadata().map_or(false, |m| m.len() <= MAX_SCAN_BYTES))
        .filter(|e| has_markers(e.path()))
        .filter_map(|e| {
            e.path()
                .strip_prefix(root)
                .ok()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .collect()
}

fn has_markers(path: &Path) -> bool {
    let Ok(file) = std::fs::File::open(path) else {
        return false;
    };
    BufReader::new(file)
        .split(b'\n')
        .map_while(|line| line.ok())
        .any(|line| {
            line.starts_with(b"<<<<<<< ") || line.starts_with(b">>>>>>> ") || line == b"======="
        })
}

/// Targets from `all` that can still succeed with the given conflicts.
/// A conflicted Makefile rules out everything.
pub fn decide_make_targets(summary: &ConflictSummary, all: &[String]) -> Vec<String> {
    if summary.makefile {
        return Vec::new();
    }
    all.iter()
        .filter(|t| !(summary.api && matches!(t.as_str(), "manifests" | "generate")))
        .filter(|t| !(summary.any_go && matches!(t.as_str(), "fmt" | "vet" | "lint-fix")))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::options::DEFAULT_MAKE_TARGETS;
    use tempfile::TempDir;

    fn targets() -> Vec<String> {
        DEFAULT_MAKE_TARGETS.iter().map(|t| t.to_string()).collect()
    }

    fn set(files: &[&str]) -> BTreeSet<String> {
        files.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn makefile_conflict_skips_everything() {
        let summary = ConflictSummary {
            makefile: true,
            ..Default::default()
        };
        assert!(decide_make_targets(&summary, &targets()).is_empty());
    }

    #[test]
    fn api_conflict_skips_generation() {
        let summary = ConflictSummary {
            api: true,
            ..Default::default()
        };
        assert_eq!(decide_make_targets(&summary, &targets()), vec!["fmt", "vet", "lint-fix"]);
    }

    #[test]
    fn go_conflict_skips_formatting() {
        let summary = ConflictSummary {
            any_go: true,
            ..Default::default()
        };
        assert_eq!(decide_make_targets(&summary, &targets()), vec!["manifests", "generate"]);
    }

    #[test]
    fn no_conflicts_keeps_all_targets() {
        assert_eq!(decide_make_targets(&ConflictSummary::default(), &targets()), targets());
    }

    #[test]
    fn files_are_split_into_source_and_generated() {
        let report = categorize(set(&[
            "api/v1/zz_generated.deepcopy.go",
            "config/rbac/role.yaml",
            "internal/controller/captain_controller.go",
        ]));
        assert_eq!(report.source_files, vec!["internal/controller/captain_controller.go"]);
        assert_eq!(report.generated_files.len(), 2);
        assert!(report.summary.api);
        assert!(report.summary.any_go);
        assert!(!report.summary.makefile);
    }

    #[test]
    fn marker_scan_skips_vendor_and_clean_files() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("config/manager")).unwrap();
        std::fs::create_dir_all(root.join("vendor/x")).unwrap();
        std::fs::write(
            root.join("config/manager/manager.yaml"),
            "a: 1\n<<<<<<< HEAD\nb: 2\n=======\nb: 3\n>>>>>>> upgrade\n",
        )
        .unwrap();
        std::fs::write(root.join("vendor/x/x.go"), "<<<<<<< HEAD\n").unwrap();
        std::fs::write(root.join("README.md"), "no markers ======= here\n").unwrap();

        assert_eq!(scan_markers(root), vec!["config/manager/manager.yaml"]);
    }
}
