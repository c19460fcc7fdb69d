//! Loading and saving the project file.

use crate::config::{self, ProjectConfig};
use crate::error::{KbError, Result};
use crate::io::Filesystem;
use crate::version::ProjectVersion;
use std::path::Path;
use tracing::debug;

pub const DEFAULT_PATH: &str = "PROJECT";

/// Holds at most one project file and the backend it is persisted to.
#[derive(Debug, Default)]
pub struct YamlStore {
    fs: Option<Box<dyn Filesystem>>,
    /// Set for freshly initialised projects: saving must not clobber a file.
    must_not_exist: bool,
    cfg: Option<Box<dyn ProjectConfig>>,
}

/// Decode a project file without attaching it to a store.
pub fn read_from(fs: &dyn Filesystem, path: &Path) -> Result<Box<dyn ProjectConfig>> {
    let data = fs.read_to_string(path)?;
    config::decode(&data).map_err(|e| match e {
        KbError::Decode(msg) => KbError::Decode(format!("{}: {msg}", path.display())),
        other => other,
    })
}

impl YamlStore {
    pub fn new(fs: Box<dyn Filesystem>) -> Self {
        Self {
            fs: Some(fs),
            must_not_exist: false,
            cfg: None,
        }
    }

    /// Start an empty project of `version`; saving will refuse to overwrite.
    pub fn init(&mut self, version: ProjectVersion) -> Result<&mut dyn ProjectConfig> {
        self.cfg = Some(config::new_config(version)?);
        self.must_not_exist = true;
        self.config_mut()
    }

    pub fn load(&mut self) -> Result<()> {
        self.load_from(Path::new(DEFAULT_PATH))
    }

    pub fn load_from(&mut self, path: &Path) -> Result<()> {
        self.must_not_exist = false;
        let fs = self
            .fs
            .as_deref()
            .ok_or_else(|| KbError::Decode("no filesystem configured".to_string()))?;
        let cfg = read_from(fs, path)?;
        debug!(path = %path.display(), version = %cfg.version(), "loaded project file");
        self.cfg = Some(cfg);
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(Path::new(DEFAULT_PATH))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let fs = self
            .fs
            .as_deref()
            .ok_or_else(|| KbError::Save("no filesystem configured".to_string()))?;
        let cfg = self.cfg.as_deref().ok_or_else(|| {
            KbError::Save("undefined config, use one of the initializers: init, load, load_from".to_string())
        })?;

        if self.must_not_exist && fs.exists(path) {
            return Err(KbError::Save(format!(
                "configuration already exists in '{}'",
                path.display()
            )));
        }

        let content = cfg
            .marshal()
            .map_err(|e| KbError::Save(format!("unable to marshal project file: {e}")))?;
        fs.write(path, content.as_bytes())
            .map_err(|e| KbError::Save(format!("failed to write '{}': {e}", path.display())))?;
        debug!(path = %path.display(), "saved project file");
        Ok(())
    }

    /// Swap in a regenerated config. Saving overwrites the existing file.
    pub fn replace(&mut self, cfg: Box<dyn ProjectConfig>) -> Option<Box<dyn ProjectConfig>> {
        self.must_not_exist = false;
        self.cfg.replace(cfg)
    }

    pub fn config(&self) -> Option<&dyn ProjectConfig> {
        self.cfg.as_deref()
    }

    pub fn config_mut(&mut self) -> Result<&mut dyn ProjectConfig> {
        match self.cfg.as_deref_mut() {
            Some(cfg) => Ok(cfg),
            None => Err(KbError::Save("no project file loaded".to_string())),
        }
    }

    pub fn filesystem(&self) -> Option<&dyn Filesystem> {
        self.fs.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::OsFilesystem;
    use crate::resource::{Api, Gvk, Resource};
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> YamlStore {
        YamlStore::new(Box::new(OsFilesystem::new(dir.path())))
    }

    #[test]
    fn init_then_save_twice_fails() {
        let dir = TempDir::new().unwrap();
        let mut s = store(&dir);
        s.init(ProjectVersion::stable(3)).unwrap();
        s.save().unwrap();
        let err = s.save().unwrap_err();
        assert!(matches!(err, KbError::Save(_)), "{err}");
    }

    #[test]
    fn loaded_config_can_be_resaved() {
        let dir = TempDir::new().unwrap();
        let mut s = store(&dir);
        s.init(ProjectVersion::stable(3)).unwrap();
        s.save().unwrap();

        let mut s = store(&dir);
        s.load().unwrap();
        s.config_mut().unwrap().set_domain("test.io").unwrap();
        s.save().unwrap();
        assert!(std::fs::read_to_string(dir.path().join("PROJECT"))
            .unwrap()
            .contains("domain: test.io"));
    }

    #[test]
    fn save_without_config_or_backend() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(store(&dir).save(), Err(KbError::Save(_))));
        assert!(matches!(YamlStore::default().save(), Err(KbError::Save(_))));
    }

    #[test]
    fn roundtrip_v3() {
        let dir = TempDir::new().unwrap();
        let mut s = store(&dir);
        let cfg = s.init(ProjectVersion::stable(3)).unwrap();
        cfg.set_domain("test.io").unwrap();
        cfg.set_repository("github.com/example/project").unwrap();
        cfg.set_project_name("project").unwrap();
        cfg.set_plugin_chain(vec!["go.kubebuilder.io/v4".into()]).unwrap();
        cfg.add_resource(Resource {
            api: Some(Api {
                crd_version: "v1".into(),
                namespaced: true,
            }),
            controller: true,
            path: "github.com/example/project/api/v1".into(),
            ..Resource::from_gvk(&Gvk::new("crew", "test.io", "v1", "Captain"))
        })
        .unwrap();
        s.save().unwrap();

        let back = read_from(&OsFilesystem::new(dir.path()), Path::new(DEFAULT_PATH)).unwrap();
        let original = s.config().unwrap();
        assert_eq!(back.domain(), original.domain());
        assert_eq!(back.project_name(), "project");
        assert_eq!(back.get_resources(), original.get_resources());
        assert_eq!(back.plugin_chain(), original.plugin_chain());
    }

    #[test]
    fn replaced_config_overwrites_file() {
        let dir = TempDir::new().unwrap();
        let mut s = store(&dir);
        s.init(ProjectVersion::stable(3)).unwrap();
        s.save().unwrap();

        let mut fresh = config::new_config(ProjectVersion::stable(3)).unwrap();
        fresh.set_domain("fresh.io").unwrap();
        assert!(s.replace(fresh).is_some());
        s.save().unwrap();
        let back = read_from(&OsFilesystem::new(dir.path()), Path::new(DEFAULT_PATH)).unwrap();
        assert_eq!(back.domain(), "fresh.io");
    }

    #[test]
    fn unknown_version_is_decode_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("PROJECT"), "version: \"9\"\n").unwrap();
        let err = store(&dir).load().unwrap_err();
        assert!(err.is_decode(), "{err}");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(store(&dir).load(), Err(KbError::Io(_))));
    }
}
