//! Linker configuration
//!
//! YAML-driven settings, provider templates and system resources.

pub mod loader;
pub mod types;

pub use loader::{ConfigLoader, LoadedConfig};
pub use types::{LinkerSettings, ProviderConfigFile, SystemResourcesFile};
