//! Deployment plan
//!
//! The immutable output of linking one application. Every collection is a
//! `Vec` in a deterministic order or a `BTreeMap`, so two plans built from
//! the same input serialize to the same bytes.

pub mod builder;
pub mod canonical;

use deploy_types::{ComponentKind, Properties, ReferenceKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{ResourceOrigin, ScopeLevel};

pub use builder::PlanBuilder;

// ============================================================================
// REFERENCES
// ============================================================================

/// Final state of one declared reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceState {
    /// Linked to a catalog entry, component, destination or unit.
    Resolved { target: String, scope: ScopeLevel },
    /// Opaque target the linker does not manage.
    External { target: String },
    /// Optional reference that could not be linked.
    Unresolved { diagnostic: String },
}

impl ReferenceState {
    pub fn target(&self) -> Option<&str> {
        match self {
            ReferenceState::Resolved { target, .. } | ReferenceState::External { target } => {
                Some(target)
            }
            ReferenceState::Unresolved { .. } => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, ReferenceState::Resolved { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanReference {
    pub name: String,
    pub kind: ReferenceKind,
    pub requested_type: Option<String>,
    pub state: ReferenceState,
}

// ============================================================================
// COMPONENTS AND CATALOGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanComponent {
    pub id: String,
    pub name: String,
    pub module_id: String,
    pub kind: ComponentKind,
    /// Assigned container, for kinds that run in one.
    pub container: Option<String>,
    /// Ids of components that must be available first.
    pub depends_on: Vec<String>,
    /// One entry per declared reference, in declaration order.
    pub references: Vec<PlanReference>,
    pub activation: Properties,
}

impl PlanComponent {
    pub fn reference(&self, name: &str) -> Option<&PlanReference> {
        self.references.iter().find(|r| r.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanResource {
    pub id: String,
    pub resource_type: String,
    pub scope: ScopeLevel,
    pub origin: ResourceOrigin,
    pub properties: Properties,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanPersistenceUnit {
    /// `<moduleId>#<unitName>`
    pub id: String,
    pub module_id: String,
    pub name: String,
    pub jta_data_source: Option<String>,
    pub non_jta_data_source: Option<String>,
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDestination {
    pub module_id: String,
    pub name: String,
    /// Id of the resource-env instance backing the destination.
    pub physical_id: String,
    pub destination_type: String,
}

// ============================================================================
// PLAN
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    /// Content-addressed id: SHA-256 of the canonical plan bytes, truncated.
    pub plan_id: Uuid,
    /// Full hex SHA-256 of the canonical plan bytes.
    pub digest: String,
    pub application_id: String,
    /// Components in module, then declaration order.
    pub components: Vec<PlanComponent>,
    pub resources: Vec<PlanResource>,
    pub containers: Vec<PlanResource>,
    pub persistence_units: Vec<PlanPersistenceUnit>,
    pub destinations: Vec<PlanDestination>,
    /// Components participating in ordering edges, prerequisites first.
    pub dependency_order: Vec<String>,
}

impl DeploymentPlan {
    pub fn component(&self, id: &str) -> Option<&PlanComponent> {
        self.components.iter().find(|c| c.id == id)
    }

    pub fn resource(&self, id: &str) -> Option<&PlanResource> {
        self.resources.iter().find(|r| r.id == id)
    }

    pub fn container(&self, id: &str) -> Option<&PlanResource> {
        self.containers.iter().find(|r| r.id == id)
    }

    /// Resources synthesized while linking this application.
    pub fn provisioned(&self) -> impl Iterator<Item = &PlanResource> {
        self.resources
            .iter()
            .filter(|r| matches!(r.origin, ResourceOrigin::Provisioned { .. }))
    }

    /// Every reference left unresolved (optional references only).
    pub fn diagnostics(&self) -> Vec<(&str, &PlanReference)> {
        self.components
            .iter()
            .flat_map(|c| c.references.iter().map(move |r| (c.id.as_str(), r)))
            .filter(|(_, r)| matches!(r.state, ReferenceState::Unresolved { .. }))
            .collect()
    }

    /// Pretty JSON for operators.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
