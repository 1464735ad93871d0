use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::HandoffError;

/// File name of the artifact in the cache directory for system-install mode
pub const CACHE_ARTIFACT_NAME: &str = "app-update.pkg";

/// How a downloaded artifact reaches the user, fixed at build time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    /// The artifact replaces the payload the stub loads on its next launch
    SelfReplace,
    /// The artifact is handed to the platform installer
    SystemInstall,
}

impl DeploymentMode {
    pub fn from_build() -> Self {
        if cfg!(feature = "self-replace") {
            Self::SelfReplace
        } else {
            Self::SystemInstall
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub cache_dir: PathBuf,
    pub payload_path: PathBuf,
}

impl ArtifactPaths {
    /// Where the download for a given mode is written
    pub fn target_for(&self, mode: DeploymentMode) -> PathBuf {
        match mode {
            DeploymentMode::SelfReplace => self.payload_path.clone(),
            DeploymentMode::SystemInstall => self.cache_dir.join(CACHE_ARTIFACT_NAME),
        }
    }
}

/// A completed download. Consumed by [`ArtifactHandoff::handoff`]
#[derive(Debug, PartialEq, Eq)]
pub struct DownloadResult {
    pub path: PathBuf,
    pub source_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handoff {
    RelaunchRequired,
    InstallerLaunched,
}

/// Launches the platform package installer without waiting for it
pub trait Installer {
    fn launch(&self, package: &Path) -> Result<(), HandoffError>;
}

pub struct SystemInstaller {
    command: Vec<String>,
}

impl SystemInstaller {
    /// Use `command` (program followed by arguments), or the platform opener when `None`
    pub fn new(command: Option<Vec<String>>) -> Self {
        let command = command
            .filter(|argv| !argv.is_empty())
            .unwrap_or_else(default_opener);
        Self { command }
    }
}

fn default_opener() -> Vec<String> {
    let argv: &[&str] = if cfg!(target_os = "macos") {
        &["open"]
    } else if cfg!(windows) {
        &["cmd", "/C", "start", ""]
    } else {
        &["xdg-open"]
    };
    argv.iter().map(|s| s.to_string()).collect()
}

impl Installer for SystemInstaller {
    fn launch(&self, package: &Path) -> Result<(), HandoffError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| HandoffError::Installer("empty installer command".to_string()))?;

        // Spawned and dropped: installation continues after the stub exits
        let child = Command::new(program)
            .args(args)
            .arg(package)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| HandoffError::Installer(format!("{}: {}", program, e)))?;

        tracing::info!("installer '{}' started (pid {})", program, child.id());
        Ok(())
    }
}

pub struct ArtifactHandoff {
    mode: DeploymentMode,
    installer: Box<dyn Installer>,
}

impl ArtifactHandoff {
    pub fn new(mode: DeploymentMode, installer: Box<dyn Installer>) -> Self {
        Self { mode, installer }
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    /// Hand the downloaded artifact off according to the deployment mode
    ///
    /// Nothing is rolled back on failure
    pub fn handoff(&self, download: DownloadResult) -> Result<Handoff, HandoffError> {
        tracing::debug!(
            "handing off {} (from {}) in {:?} mode",
            download.path.display(),
            download.source_url,
            self.mode
        );
        match self.mode {
            DeploymentMode::SelfReplace => {
                prepare_payload(&download.path)?;
                Ok(Handoff::RelaunchRequired)
            }
            DeploymentMode::SystemInstall => {
                self.installer.launch(&download.path)?;
                Ok(Handoff::InstallerLaunched)
            }
        }
    }
}

/// Make a freshly written payload loadable by the next launch
fn prepare_payload(path: &Path) -> Result<(), HandoffError> {
    let metadata = fs::metadata(path)?;
    if metadata.len() == 0 {
        return Err(HandoffError::EmptyPayload(path.to_path_buf()));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = metadata.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms)?;
    }

    Ok(())
}
