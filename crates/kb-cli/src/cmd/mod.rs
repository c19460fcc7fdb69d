pub mod alpha;
pub mod config;
pub mod create;
pub mod delete;
pub mod edit;
pub mod init;

use anyhow::Context;
use kb_core::io::OsFilesystem;
use kb_core::plugin::{Catalog, PluginChain};
use kb_core::scaffold::{
    CommandScaffolder, NoopScaffolder, ScaffoldReport, ScaffoldRequest, Scaffolder,
};
use kb_core::store::{YamlStore, DEFAULT_PATH};
use kb_core::ProjectConfig;
use std::path::{Path, PathBuf};

/// Version recorded as `cliVersion` in new project files.
pub const CLI_VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

/// Shared by every subcommand.
pub struct Ctx {
    pub root: PathBuf,
    pub json: bool,
    pub scaffolder: Box<dyn Scaffolder>,
}

impl Ctx {
    pub fn new(root: PathBuf, json: bool, scaffolder_cmd: Option<&str>) -> anyhow::Result<Self> {
        let scaffolder: Box<dyn Scaffolder> =
            match scaffolder_cmd.map(str::trim).filter(|c| !c.is_empty()) {
                Some(line) => Box::new(
                    CommandScaffolder::from_command_line(line)
                        .context("invalid --scaffolder command")?,
                ),
                None => Box::new(NoopScaffolder),
            };
        Ok(Self {
            root,
            json,
            scaffolder,
        })
    }

    pub fn store(&self) -> YamlStore {
        YamlStore::new(Box::new(OsFilesystem::new(&self.root)))
    }

    pub fn load_store(&self) -> anyhow::Result<YamlStore> {
        let mut store = self.store();
        store.load().with_context(|| {
            format!(
                "failed to load {DEFAULT_PATH} from {}; run 'kubebuilder init' first",
                self.root.display()
            )
        })?;
        Ok(store)
    }

    pub fn scaffold(&self, req: &ScaffoldRequest) -> anyhow::Result<ScaffoldReport> {
        self.scaffolder
            .scaffold(req)
            .with_context(|| format!("scaffolding for {:?} failed", req.operation))
    }
}

/// Chain for a resource command: the project layout, then any `--plugins`
/// not already part of it.
pub fn resolve_chain(cfg: &dyn ProjectConfig, extra: &[String]) -> anyhow::Result<PluginChain> {
    let catalog = Catalog::builtin();
    let version = cfg.version();
    let layout = cfg.plugin_chain();
    let mut keys = catalog
        .resolve(&layout, version)
        .with_context(|| format!("unable to resolve project layout {layout:?}"))?
        .keys();
    let extra = catalog
        .resolve(extra, version)
        .with_context(|| format!("unable to resolve plugins {extra:?}"))?;
    for key in extra.keys() {
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    Ok(catalog.resolve(&keys, version)?)
}

/// Ignore a setter the project's schema has no field for.
pub fn set_if_supported(result: kb_core::Result<()>) -> kb_core::Result<()> {
    match result {
        Err(e) if e.is_unsupported_field() => Ok(()),
        other => other,
    }
}

/// One-line summary of generated files, for human output.
pub fn describe(report: &ScaffoldReport) -> Option<String> {
    if report.written.is_empty() && report.skipped.is_empty() {
        return None;
    }
    Some(format!(
        "{} file(s) written, {} skipped",
        report.written.len(),
        report.skipped.len()
    ))
}

/// Default project name: the root directory's name, lowercased.
pub fn root_name(root: &Path) -> String {
    root.canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_lowercase()))
        .unwrap_or_else(|| "project".to_string())
}
