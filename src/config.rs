use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::update::channel::{Endpoints, ReleaseChannel};
use crate::update::handoff::{ArtifactPaths, DeploymentMode};

/// Manifest URL pinned at build time. Empty counts as unset
const BUILD_OVERRIDE_URL: Option<&str> = option_env!("APP_STUB_CHANNEL_URL");

const BUILD_CANARY: bool = cfg!(feature = "canary");

pub const DEFAULT_PROBE_ADDR: &str = "api.github.com:443";

/// Optional overrides read from `config.toml`
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub override_url: Option<String>,

    #[serde(default)]
    pub canary: Option<bool>,

    #[serde(default)]
    pub stable_url: Option<String>,

    #[serde(default)]
    pub branch_url: Option<String>,

    /// Template with `{sha}` and `{path}` placeholders
    #[serde(default)]
    pub cdn_template: Option<String>,

    /// `host:port` probed before any request
    #[serde(default)]
    pub probe_addr: Option<String>,

    /// Installer program and arguments; the package path is appended
    #[serde(default)]
    pub installer: Option<Vec<String>>,

    #[serde(default)]
    pub payload_path: Option<PathBuf>,

    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub channel: ReleaseChannel,
    pub endpoints: Endpoints,
    pub mode: DeploymentMode,
    pub paths: ArtifactPaths,
    pub probe_addr: String,
    pub installer: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel: ReleaseChannel::select(BUILD_OVERRIDE_URL, BUILD_CANARY),
            endpoints: Endpoints::default(),
            mode: DeploymentMode::from_build(),
            paths: default_paths(),
            probe_addr: DEFAULT_PROBE_ADDR.to_string(),
            installer: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_required(path)
    }

    /// Load a file the user named explicitly; a missing file is an error
    pub fn load_required(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: FileConfig = toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        Self::default().merge(file)
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("app-stub")
            .join("config.toml")
    }

    /// Layer file values over build-time values. File URLs are validated, build-time ones are not
    pub fn merge(self, file: FileConfig) -> Result<Self, ConfigError> {
        let override_url = match non_empty(file.override_url) {
            Some(url) => Some(validate_url("override_url", url)?),
            None => BUILD_OVERRIDE_URL.map(String::from),
        };
        let canary = file.canary.unwrap_or(BUILD_CANARY);

        let mut endpoints = self.endpoints;
        if let Some(url) = non_empty(file.stable_url) {
            endpoints.stable_url = validate_url("stable_url", url)?;
        }
        if let Some(url) = non_empty(file.branch_url) {
            endpoints.branch_url = validate_url("branch_url", url)?;
        }
        if let Some(template) = non_empty(file.cdn_template) {
            if !template.contains("{sha}") || !template.contains("{path}") {
                return Err(ConfigError::InvalidUrl {
                    field: "cdn_template",
                    url: template,
                });
            }
            endpoints.cdn_template = template;
        }

        let mut paths = self.paths;
        if let Some(dir) = file.cache_dir {
            paths.cache_dir = dir;
        }
        if let Some(payload) = file.payload_path {
            paths.payload_path = payload;
        }

        Ok(Self {
            channel: ReleaseChannel::select(override_url.as_deref(), canary),
            endpoints,
            mode: self.mode,
            paths,
            probe_addr: non_empty(file.probe_addr).unwrap_or(self.probe_addr),
            installer: file.installer.or(self.installer),
        })
    }

    /// Where the artifact is downloaded in the configured deployment mode
    pub fn target_path(&self) -> PathBuf {
        self.paths.target_for(self.mode)
    }
}

fn default_paths() -> ArtifactPaths {
    ArtifactPaths {
        cache_dir: dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("app-stub"),
        payload_path: dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("app-stub")
            .join("current.pkg"),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_url(field: &'static str, url: String) -> Result<String, ConfigError> {
    match reqwest::Url::parse(&url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(url),
        _ => Err(ConfigError::InvalidUrl { field, url }),
    }
}
