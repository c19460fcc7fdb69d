pub mod config;
pub mod error;
pub mod io;
pub mod plugin;
pub mod registry;
pub mod resource;
pub mod scaffold;
pub mod store;
pub mod update;
pub mod version;

pub use config::ProjectConfig;
pub use error::{KbError, Result};
pub use resource::{Gvk, Resource};
pub use store::YamlStore;
pub use version::{PluginVersion, ProjectVersion, Stage};
