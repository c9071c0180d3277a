//! Configuration loader
//!
//! Reads the linker's configuration directory:
//!
//! ```text
//! <config_dir>/
//!   linker.yaml          settings (optional, defaults otherwise)
//!   providers/*.yaml     resource and container templates
//!   resources/*.yaml     global resources and containers
//! ```
//!
//! Files are read in sorted path order so template registration and global
//! catalog order do not depend on the filesystem.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::provision::TemplateRegistry;
use crate::scope::GlobalScope;

use super::types::{LinkerSettings, ProviderConfigFile, SystemResourcesFile};

pub const CONFIG_DIR_ENV: &str = "DEPLOY_LINKER_CONFIG_DIR";
pub const AUTO_CREATE_RESOURCES_ENV: &str = "DEPLOY_LINKER_AUTO_CREATE_RESOURCES";
pub const AUTO_CREATE_CONTAINERS_ENV: &str = "DEPLOY_LINKER_AUTO_CREATE_CONTAINERS";

const SETTINGS_FILE: &str = "linker.yaml";
const PROVIDERS_DIR: &str = "providers";
const RESOURCES_DIR: &str = "resources";

/// Everything read from one configuration directory.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub settings: LinkerSettings,
    pub templates: TemplateRegistry,
    pub global: Arc<GlobalScope>,
}

pub struct ConfigLoader {
    config_dir: PathBuf,
    auto_create_resources: Option<bool>,
    auto_create_containers: Option<bool>,
}

impl ConfigLoader {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            auto_create_resources: None,
            auto_create_containers: None,
        }
    }

    /// Create loader from DEPLOY_LINKER_CONFIG_DIR or default to "config".
    ///
    /// The policy flags in `linker.yaml` can be overridden with
    /// DEPLOY_LINKER_AUTO_CREATE_RESOURCES and
    /// DEPLOY_LINKER_AUTO_CREATE_CONTAINERS.
    pub fn from_env() -> Result<Self> {
        let dir = std::env::var(CONFIG_DIR_ENV).unwrap_or_else(|_| "config".to_string());
        let mut loader = Self::new(dir);
        loader.auto_create_resources = env_flag(AUTO_CREATE_RESOURCES_ENV)?;
        loader.auto_create_containers = env_flag(AUTO_CREATE_CONTAINERS_ENV)?;
        Ok(loader)
    }

    pub fn with_auto_create_resources(mut self, enabled: bool) -> Self {
        self.auto_create_resources = Some(enabled);
        self
    }

    pub fn with_auto_create_containers(mut self, enabled: bool) -> Self {
        self.auto_create_containers = Some(enabled);
        self
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn load(&self) -> Result<LoadedConfig> {
        let settings = self.load_settings()?;
        let templates = self.load_templates()?;
        let global = self.load_global()?;

        info!(
            config_dir = %self.config_dir.display(),
            templates = templates.len(),
            resources = global.resources.len(),
            containers = global.containers.len(),
            auto_create_resources = settings.policy.auto_create_resources,
            auto_create_containers = settings.policy.auto_create_containers,
            "Loaded linker configuration"
        );

        Ok(LoadedConfig {
            settings,
            templates,
            global,
        })
    }

    /// Load `linker.yaml`, falling back to defaults when it is absent, then
    /// apply policy overrides.
    pub fn load_settings(&self) -> Result<LinkerSettings> {
        let path = self.config_dir.join(SETTINGS_FILE);
        let mut settings = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_yaml::from_str::<LinkerSettings>(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            debug!("No {} found, using default settings", path.display());
            LinkerSettings::default()
        };

        if let Some(enabled) = self.auto_create_resources {
            settings.policy.auto_create_resources = enabled;
        }
        if let Some(enabled) = self.auto_create_containers {
            settings.policy.auto_create_containers = enabled;
        }
        Ok(settings)
    }

    /// Load every `providers/*.yaml` into one registry. Template ids must be
    /// unique across files.
    pub fn load_templates(&self) -> Result<TemplateRegistry> {
        let mut registry = TemplateRegistry::new();
        for path in self.yaml_files(PROVIDERS_DIR)? {
            let file: ProviderConfigFile = read_yaml(&path)?;
            let count = file.providers.len();
            for template in file.providers {
                registry
                    .register(template)
                    .with_context(|| format!("Invalid provider in {}", path.display()))?;
            }
            debug!("Loaded {} providers from {}", count, path.display());
        }
        Ok(registry)
    }

    /// Load every `resources/*.yaml` into the global scope.
    pub fn load_global(&self) -> Result<Arc<GlobalScope>> {
        let mut resources = Vec::new();
        let mut containers = Vec::new();
        for path in self.yaml_files(RESOURCES_DIR)? {
            let file: SystemResourcesFile = read_yaml(&path)?;
            debug!(
                "Loaded {} resources and {} containers from {}",
                file.resources.len(),
                file.containers.len(),
                path.display()
            );
            resources.extend(file.resources);
            containers.extend(file.containers);
        }
        GlobalScope::build(resources, containers).context("Invalid global resource configuration")
    }

    /// Sorted `.yaml`/`.yml` files directly under `<config_dir>/<sub>`.
    fn yaml_files(&self, sub: &str) -> Result<Vec<PathBuf>> {
        let dir = self.config_dir.join(sub);
        if !dir.is_dir() {
            warn!("Config directory does not exist: {}", dir.display());
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&dir)
            .with_context(|| format!("Failed to read directory {}", dir.display()))?
        {
            let path = entry?.path();
            if path.is_file()
                && path
                    .extension()
                    .map(|e| e == "yaml" || e == "yml")
                    .unwrap_or(false)
            {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn env_flag(name: &str) -> Result<Option<bool>> {
    match std::env::var(name) {
        Ok(value) => parse_flag(&value)
            .map(Some)
            .with_context(|| format!("{} must be true or false, got '{}'", name, value)),
        Err(_) => Ok(None),
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("unrecognised flag value '{}'", other),
    }
}
