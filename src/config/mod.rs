// ABOUTME: Configuration types and parsing for deployer.yml.
// ABOUTME: Handles discovery, validation, and turning selected services into deployment requests.

mod deserialize;

use crate::deploy::DeploymentRequest;
use crate::error::{Error, Result};
use crate::topology::CLUSTER_REGISTRY_NAME;
use crate::tunnel::DEFAULT_ALLOCATION_TIMEOUT;
use crate::types::{ImageRef, RemoteHost, ServiceName};
use deserialize::{deserialize_image_ref, deserialize_service_name};
use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "deployer.yml";
pub const CONFIG_FILENAME_ALT: &str = "deployer.yaml";
pub const CONFIG_FILENAME_JSON: &str = "deployer.json";

/// Service key that selects every configured service.
pub const ALL_SERVICES: &str = "all";

/// Default host port of the local registry.
pub const DEFAULT_REGISTRY_PORT: u16 = 20000;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Project name: prefix of deployed image tags and the name recorded in labels.
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub tunnel: TunnelConfig,

    pub services: BTreeMap<String, ServiceConfig>,

    /// Directory the file was loaded from; working directories resolve against it.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(alias = "serviceName", deserialize_with = "deserialize_service_name")]
    pub service_name: ServiceName,

    #[serde(alias = "imageName", deserialize_with = "deserialize_image_ref")]
    pub image_name: ImageRef,

    /// Shell command that builds `image_name` locally.
    pub build: String,

    #[serde(default, alias = "workingDir")]
    pub working_dir: Option<PathBuf>,
}

/// The local registry container tunnelled to the swarm.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_container")]
    pub container: String,

    #[serde(default = "default_registry_port")]
    pub port: u16,

    /// Start a throwaway registry when none is running, and remove it afterwards.
    #[serde(default, alias = "autoStart")]
    pub auto_start: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            container: default_registry_container(),
            port: default_registry_port(),
            auto_start: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TunnelConfig {
    #[serde(
        default = "default_allocation_timeout",
        alias = "allocationTimeout",
        with = "humantime_serde"
    )]
    pub allocation_timeout: Duration,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            allocation_timeout: default_allocation_timeout(),
        }
    }
}

fn default_name() -> String {
    "deployer".to_string()
}

fn default_registry_container() -> String {
    CLUSTER_REGISTRY_NAME.to_string()
}

fn default_registry_port() -> u16 {
    DEFAULT_REGISTRY_PORT
}

fn default_allocation_timeout() -> Duration {
    DEFAULT_ALLOCATION_TIMEOUT
}

impl Config {
    /// Parse and validate a config. JSON is accepted as well, being valid YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        Self::load(&Self::locate(dir)?)
    }

    /// Path of the config file in `dir`, trying each accepted file name in turn.
    pub fn locate(dir: &Path) -> Result<PathBuf> {
        [CONFIG_FILENAME, CONFIG_FILENAME_ALT, CONFIG_FILENAME_JSON]
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
            .ok_or_else(|| Error::ConfigNotFound(dir.to_path_buf()))
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty()
            || !self
                .name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-'))
        {
            // The name becomes a repository path component, which docker wants lowercase.
            return Err(Error::InvalidConfig(format!(
                "name {:?} may only contain lowercase letters, digits, '_' and '-'",
                self.name
            )));
        }

        if self.services.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one service is required".to_string(),
            ));
        }

        if self.services.contains_key(ALL_SERVICES) {
            return Err(Error::InvalidConfig(format!(
                "service key {:?} is reserved",
                ALL_SERVICES
            )));
        }

        for (key, service) in &self.services {
            if service.build.trim().is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "service {} has an empty build command",
                    key
                )));
            }
        }

        Ok(())
    }

    /// Keys of the selected services without duplicates; `all` yields them sorted.
    ///
    /// `all` anywhere in `selection` selects every service.
    pub fn select<S: AsRef<str>>(&self, selection: &[S]) -> Result<NonEmpty<String>> {
        let selection: Vec<&str> = selection.iter().map(|s| AsRef::<str>::as_ref(s)).collect();

        let keys: Vec<String> = if selection.contains(&ALL_SERVICES) {
            self.services.keys().cloned().collect()
        } else {
            let mut keys: Vec<String> = Vec::new();
            for key in selection {
                if !self.services.contains_key(key) {
                    return Err(Error::UnknownService(key.to_string()));
                }
                if !keys.iter().any(|k| k == key) {
                    keys.push(key.to_string());
                }
            }
            keys
        };

        NonEmpty::from_vec(keys)
            .ok_or_else(|| Error::InvalidConfig("no service selected".to_string()))
    }

    /// Build the deployment request for one service key.
    pub fn request(&self, key: &str, host: &RemoteHost) -> Result<DeploymentRequest> {
        let service = self
            .services
            .get(key)
            .ok_or_else(|| Error::UnknownService(key.to_string()))?;

        let working_dir = match &service.working_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => self.base_dir.join(dir),
            None => self.base_dir.clone(),
        };

        Ok(DeploymentRequest {
            key: key.to_string(),
            service_name: service.service_name.clone(),
            image: service.image_name.clone(),
            build_command: service.build.clone(),
            remote_host: host.clone(),
            working_dir: (!working_dir.as_os_str().is_empty()).then_some(working_dir),
            tag_prefix: self.name.clone(),
            registry: self.registry.clone(),
            allocation_timeout: self.tunnel.allocation_timeout,
        })
    }

    /// Requests for every selected service.
    pub fn requests<S: AsRef<str>>(
        &self,
        selection: &[S],
        host: &RemoteHost,
    ) -> Result<NonEmpty<DeploymentRequest>> {
        let keys = self.select(selection)?;
        let first = self.request(keys.first(), host)?;
        let rest = keys
            .tail()
            .iter()
            .map(|key| self.request(key, host))
            .collect::<Result<Vec<_>>>()?;
        Ok(NonEmpty {
            head: first,
            tail: rest,
        })
    }
}
