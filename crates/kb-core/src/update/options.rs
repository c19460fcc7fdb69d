use crate::error::{KbError, Result};
use std::path::PathBuf;

pub const DEFAULT_FROM_BRANCH: &str = "main";
pub const DEFAULT_RELEASE_URL: &str = "https://github.com/kubernetes-sigs/kubebuilder/releases/download";

/// Applied to every git invocation unless `disable` is passed.
pub const DEFAULT_GIT_CONFIG: &[&str] = &["merge.renameLimit=999999", "diff.renameLimit=999999"];

/// `make` targets run after each regeneration and after a clean merge.
pub const DEFAULT_MAKE_TARGETS: &[&str] = &["manifests", "generate", "fmt", "vet", "lint-fix"];

/// Release of the running binary, used as the target when `to_version` is unset.
pub const INSTALLED_VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct UpdateOptions {
    /// Release the project was scaffolded with; read from the project file when unset.
    pub from_version: Option<String>,
    /// Release to upgrade to. When set, that release is downloaded and used
    /// for the upgrade branch instead of the installed binary.
    pub to_version: Option<String>,
    pub from_branch: String,
    /// Branch receiving the result. Defaults to
    /// `kubebuilder-update-from-<from>-to-<to>`.
    pub output_branch: Option<String>,
    /// Keep the temporary branch history on the output branch instead of
    /// squashing it into one commit.
    pub show_commits: bool,
    /// Paths restored from `from_branch` after squashing.
    pub restore_path: Vec<String>,
    pub commit_message: Option<String>,
    pub commit_message_conflict: Option<String>,
    /// Commit the merge result even when it contains conflict markers.
    pub force: bool,
    /// Extra `git -c key=value` settings. A literal `disable` drops the defaults.
    pub git_config: Vec<String>,
    pub make_targets: Vec<String>,
    pub release_url: String,
    /// Binary used to regenerate the upgrade branch; the running executable when unset.
    pub installed_binary: Option<PathBuf>,
    /// Version label of the installed binary.
    pub installed_version: String,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            from_version: None,
            to_version: None,
            from_branch: DEFAULT_FROM_BRANCH.to_string(),
            output_branch: None,
            show_commits: false,
            restore_path: Vec::new(),
            commit_message: None,
            commit_message_conflict: None,
            force: false,
            git_config: Vec::new(),
            make_targets: DEFAULT_MAKE_TARGETS.iter().map(|t| t.to_string()).collect(),
            release_url: DEFAULT_RELEASE_URL.to_string(),
            installed_binary: None,
            installed_version: INSTALLED_VERSION.to_string(),
        }
    }
}

impl UpdateOptions {
    /// Reject flag combinations that cannot be honoured.
    pub fn check(&self) -> Result<()> {
        if self.show_commits && self.restore_path.iter().any(|p| !p.trim().is_empty()) {
            return Err(KbError::InvalidOptions(
                "restore paths are not supported when keeping commit history".into(),
            ));
        }
        if self.output_branch.as_deref().is_some_and(|b| b.trim().is_empty()) {
            return Err(KbError::InvalidOptions("output branch name cannot be empty".into()));
        }
        Ok(())
    }

    pub fn output_branch_name(&self, from: &str, to: &str) -> String {
        match &self.output_branch {
            Some(name) => name.clone(),
            None => format!("kubebuilder-update-from-{from}-to-{to}"),
        }
    }

    /// Commit message for the merge result.
    pub fn merge_message(&self, from: &str, to: &str, conflicts: bool) -> String {
        let custom = if conflicts {
            &self.commit_message_conflict
        } else {
            &self.commit_message
        };
        if let Some(msg) = custom.as_ref().filter(|m| !m.trim().is_empty()) {
            return msg.clone();
        }
        if conflicts {
            format!("(chore) update scaffold from {from} to {to} (manual conflict resolution required)")
        } else {
            format!("(chore) update scaffold from {from} to {to}")
        }
    }

    /// Defaults followed by user settings, or only user settings after `disable`.
    pub fn effective_git_config(&self) -> Vec<String> {
        let disabled = self.git_config.iter().any(|c| c == "disable");
        let defaults = DEFAULT_GIT_CONFIG
            .iter()
            .filter(|_| !disabled)
            .map(|c| c.to_string());
        let user = self
            .git_config
            .iter()
            .filter(|c| c.as_str() != "disable" && !c.trim().is_empty())
            .cloned();
        defaults.chain(user).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_user_config() {
        assert_eq!(
            UpdateOptions::default().effective_git_config(),
            vec!["merge.renameLimit=999999", "diff.renameLimit=999999"]
        );
    }

    #[test]
    fn user_config_is_appended() {
        let opts = UpdateOptions {
            git_config: vec!["rerere.enabled=true".into()],
            ..Default::default()
        };
        assert_eq!(opts.effective_git_config().len(), 3);
        assert_eq!(opts.effective_git_config()[2], "rerere.enabled=true");
    }

    #[test]
    fn output_branch_defaults_to_version_pair() {
        let opts = UpdateOptions::default();
        assert_eq!(
            opts.output_branch_name("v4.5.0", "v4.6.0"),
            "kubebuilder-update-from-v4.5.0-to-v4.6.0"
        );
        let opts = UpdateOptions {
            output_branch: Some("upgrade-operator".into()),
            ..Default::default()
        };
        assert_eq!(opts.output_branch_name("v4.5.0", "v4.6.0"), "upgrade-operator");
    }

    #[test]
    fn custom_messages_override_defaults() {
        let opts = UpdateOptions {
            commit_message: Some("chore: bump scaffold".into()),
            ..Default::default()
        };
        assert_eq!(opts.merge_message("v1.0.0", "v1.1.0", false), "chore: bump scaffold");
        assert!(opts
            .merge_message("v1.0.0", "v1.1.0", true)
            .ends_with("(manual conflict resolution required)"));

        let opts = UpdateOptions {
            commit_message_conflict: Some("chore: resolve me".into()),
            ..Default::default()
        };
        assert_eq!(opts.merge_message("v1.0.0", "v1.1.0", true), "chore: resolve me");
        assert_eq!(
            opts.merge_message("v1.0.0", "v1.1.0", false),
            "(chore) update scaffold from v1.0.0 to v1.1.0"
        );
    }

    #[test]
    fn restore_path_requires_squash() {
        let opts = UpdateOptions {
            show_commits: true,
            restore_path: vec![".github/workflows".into()],
            ..Default::default()
        };
        assert!(matches!(opts.check(), Err(KbError::InvalidOptions(_))));
        assert!(UpdateOptions::default().check().is_ok());
    }

    #[test]
    fn disable_drops_defaults() {
        let opts = UpdateOptions {
            git_config: vec!["disable".into(), "merge.conflictStyle=diff3".into()],
            ..Default::default()
        };
        assert_eq!(opts.effective_git_config(), vec!["merge.conflictStyle=diff3"]);
    }
}
