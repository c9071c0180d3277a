//! Configuration types
//!
//! Shapes of `linker.yaml`, `providers/*.yaml` and `resources/*.yaml`.

use deploy_types::{LinkPolicy, ResourceInstance, ResourceTemplate};
use serde::{Deserialize, Serialize};

/// Linker settings, usually read from `linker.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkerSettings {
    #[serde(default)]
    pub policy: LinkPolicy,

    /// Prefixes stripped from reference names before matching, in order.
    #[serde(default = "default_strip_prefixes")]
    pub strip_prefixes: Vec<String>,

    /// Target schemes that are opaque to the linker.
    #[serde(default = "default_external_schemes")]
    pub external_schemes: Vec<String>,

    /// Reference types the runtime injects by itself.
    #[serde(default = "default_ignored_reference_types")]
    pub ignored_reference_types: Vec<String>,

    /// Resource type used for persistence-unit data sources.
    #[serde(default = "default_data_source_type")]
    pub data_source_type: String,

    #[serde(default = "default_queue_type")]
    pub queue_type: String,

    #[serde(default = "default_topic_type")]
    pub topic_type: String,
}

impl Default for LinkerSettings {
    fn default() -> Self {
        Self {
            policy: LinkPolicy::default(),
            strip_prefixes: default_strip_prefixes(),
            external_schemes: default_external_schemes(),
            ignored_reference_types: default_ignored_reference_types(),
            data_source_type: default_data_source_type(),
            queue_type: default_queue_type(),
            topic_type: default_topic_type(),
        }
    }
}

impl LinkerSettings {
    pub fn with_policy(mut self, policy: LinkPolicy) -> Self {
        self.policy = policy;
        self
    }
}

fn default_strip_prefixes() -> Vec<String> {
    [
        "java:",
        "comp/env/",
        "openejb/Resource/",
        "openejb/Connector/",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_external_schemes() -> Vec<String> {
    ["external:", "jndi:", "osgi:"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_ignored_reference_types() -> Vec<String> {
    [
        "jakarta.ejb.SessionContext",
        "jakarta.ejb.EntityContext",
        "jakarta.ejb.MessageDrivenContext",
        "jakarta.ejb.EJBContext",
        "jakarta.ejb.TimerService",
        "jakarta.xml.ws.WebServiceContext",
        "java.net.URL",
        "jakarta.transaction.UserTransaction",
        "jakarta.transaction.TransactionManager",
        "jakarta.transaction.TransactionSynchronizationRegistry",
        "jakarta.validation.Validator",
        "jakarta.validation.ValidatorFactory",
        "jakarta.enterprise.inject.spi.BeanManager",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_data_source_type() -> String {
    "DataSource".to_string()
}

fn default_queue_type() -> String {
    "jakarta.jms.Queue".to_string()
}

fn default_topic_type() -> String {
    "jakarta.jms.Topic".to_string()
}

/// A provider catalog file (`providers/*.yaml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfigFile {
    #[serde(default)]
    pub description: Option<String>,
    pub providers: Vec<ResourceTemplate>,
}

/// A system resource file (`resources/*.yaml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemResourcesFile {
    #[serde(default)]
    pub resources: Vec<ResourceInstance>,
    #[serde(default)]
    pub containers: Vec<ResourceInstance>,
}
