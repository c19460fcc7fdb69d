//! Locating and fetching published generator binaries.

use crate::error::{KbError, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use tracing::info;

pub const BINARY_NAME: &str = "kubebuilder";

pub trait ReleaseSource {
    /// Confirm a binary is published for `version` without downloading it.
    fn check_published(&self, version: &str) -> Result<()>;

    /// Download the binary for `version` into `dir`, returning its path.
    fn download(&self, version: &str, dir: &Path) -> Result<PathBuf>;
}

/// GOOS-style name for the running platform.
pub fn release_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

/// GOARCH-style name for the running platform.
pub fn release_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "powerpc64" => "ppc64le",
        other => other,
    }
}

/// Releases published as `<base>/<version>/kubebuilder_<os>_<arch>`.
#[derive(Debug, Clone)]
pub struct HttpReleaseSource {
    base_url: String,
    os: String,
    arch: String,
    client: Client,
}

impl HttpReleaseSource {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            os: release_os().to_string(),
            arch: release_arch().to_string(),
            client: Client::new(),
        }
    }

    pub fn with_platform(mut self, os: &str, arch: &str) -> Self {
        self.os = os.to_string();
        self.arch = arch.to_string();
        self
    }

    pub fn binary_url(&self, version: &str) -> String {
        format!(
            "{}/{version}/{BINARY_NAME}_{}_{}",
            self.base_url, self.os, self.arch
        )
    }
}

impl ReleaseSource for HttpReleaseSource {
    fn check_published(&self, version: &str) -> Result<()> {
        let url = self.binary_url(version);
        let resp = self.client.head(&url).send()?;
        match resp.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => Err(KbError::BinaryNotPublished(version.to_string())),
            status => Err(KbError::UnexpectedResponse {
                status: status.as_u16(),
                version: version.to_string(),
            }),
        }
    }

    fn download(&self, version: &str, dir: &Path) -> Result<PathBuf> {
        let url = self.binary_url(version);
        info!(%url, "downloading release binary");
        let resp = self.client.get(&url).send()?;
        if !resp.status().is_success() {
            return Err(KbError::Download(format!(
                "GET {url} returned {}",
                resp.status()
            )));
        }
        let bytes = resp.bytes()?;
        let path = dir.join(BINARY_NAME);
        std::fs::write(&path, &bytes)?;
        make_executable(&path)?;
        Ok(path)
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
