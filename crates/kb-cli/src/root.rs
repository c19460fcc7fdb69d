use kb_core::store::DEFAULT_PATH;
use std::path::{Path, PathBuf};

/// Walk upward from `start` to the first directory for which `found` holds.
fn find_upward(start: &Path, found: impl Fn(&Path) -> bool) -> Option<PathBuf> {
    start.ancestors().find(|dir| found(dir)).map(Path::to_path_buf)
}

/// Resolve the project root directory.
///
/// Priority:
/// 1. `--root` flag / `KUBEBUILDER_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for a `PROJECT` file
/// 3. Walk upward from `cwd` looking for `.git/`
/// 4. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_upward(&cwd, |d| d.join(DEFAULT_PATH).is_file())
        .or_else(|| find_upward(&cwd, |d| d.join(".git").is_dir()))
        .unwrap_or(cwd)
}
