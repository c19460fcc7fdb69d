//! Three-way upgrade of a scaffolded project between generator releases.
//!
//! The old release regenerates the project on an `ancestor` branch, the
//! user's real tree is laid on top of it as `current`, the installed release
//! regenerates it again as `upgrade`, and `upgrade` is merged into `merge`
//! (branched off `current`). Every step commits before the next starts, so a
//! failed run leaves all branches behind for inspection.
//!
//! Transitions: `Validate → DownloadOldBinary → CreateAncestorBranch →
//! CleanAncestorBranch → RegenerateAncestor → CreateCurrentBranch →
//! CreateUpgradeBranch → CreateMergeBranch → MergeUpgradeIntoMerge →
//! WriteOutputBranch → CleanupTempBranches`. A conflicted merge without
//! `force` stops after `MergeUpgradeIntoMerge` and keeps every branch.

pub mod conflicts;
pub mod git;
pub mod options;
pub mod orchestrator;
pub mod release;
pub mod runner;
pub mod session;

pub use conflicts::{ConflictReport, ConflictSummary};
pub use options::UpdateOptions;
pub use orchestrator::Orchestrator;
pub use release::{HttpReleaseSource, ReleaseSource};
pub use runner::{CommandSpec, Output, ProcessRunner, SystemRunner};
pub use session::{UpdateBranches, UpdateOutcome, UpdateReport, UpdateStep};
