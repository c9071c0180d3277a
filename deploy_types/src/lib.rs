//! Deploy Types - Level 1 Foundation Types
//!
//! This crate contains the normalized module graph that upstream collaborators
//! (descriptor readers, annotation scanners, archive unpackers) hand to the
//! deployment linker. It follows the same rule as every Level 1 crate in this
//! workspace: **no dependency on other workspace crates**.
//!
//! ## Contents
//!
//! Pure data structures only:
//! - Applications, modules and their classified components
//! - References declared by components
//! - Resource instances and provider templates
//! - Message destinations and persistence units
//! - Linking policy flags
//!
//! ## Critical Rules
//!
//! 1. **NO LINKING LOGIC** - Resolution lives in `deploy-linker`
//! 2. **NO INTROSPECTION** - Components arrive already classified
//! 3. **NO WORKSPACE DEPENDENCIES**
//! 4. **SERIALIZABLE** - All types support serde
//! 5. **DETERMINISTIC** - Ordered collections only (`Vec`, `BTreeMap`)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Property bag carried by resources, templates and references.
pub type Properties = BTreeMap<String, String>;

// ============================================================================
// VALIDATION ERRORS
// ============================================================================

/// Structural problems in a declared reference.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// The reference has no name.
    #[error("reference declared by '{component}' has an empty name")]
    EmptyName { component: String },

    /// Both an explicit link and an explicit target were supplied.
    #[error("reference '{name}' declares both link '{link}' and target '{target}'")]
    ConflictingExplicit {
        name: String,
        link: String,
        target: String,
    },
}

// ============================================================================
// APPLICATION AND MODULES
// ============================================================================

/// The outermost artifact being deployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    /// Application identifier, also used as a name prefix (`<id>/...`).
    pub id: String,
    /// Modules in declaration order.
    #[serde(default)]
    pub modules: Vec<Module>,
    /// Application-scoped resources declared by configuration.
    #[serde(default)]
    pub resources: Vec<ResourceInstance>,
    /// Application-scoped containers declared by configuration.
    #[serde(default)]
    pub containers: Vec<ResourceInstance>,
}

impl Application {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            modules: Vec::new(),
            resources: Vec::new(),
            containers: Vec::new(),
        }
    }

    pub fn with_module(mut self, module: Module) -> Self {
        self.modules.push(module);
        self
    }

    pub fn with_resource(mut self, resource: ResourceInstance) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_container(mut self, container: ResourceInstance) -> Self {
        self.containers.push(container);
        self
    }

    /// Iterate every component of every module, in declaration order.
    pub fn components(&self) -> impl Iterator<Item = (&Module, &Component)> {
        self.modules
            .iter()
            .flat_map(|m| m.components.iter().map(move |c| (m, c)))
    }
}

/// Kind of deployable module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    #[default]
    Ejb,
    Web,
    Client,
    Connector,
}

/// An ordered collection of components sharing one namespace scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Unique module identifier (a resolution-scope boundary).
    pub id: String,
    #[serde(default)]
    pub kind: ModuleKind,
    /// Components in declaration order.
    #[serde(default)]
    pub components: Vec<Component>,
    /// Module-local resources, invisible to other modules.
    #[serde(default)]
    pub resources: Vec<ResourceInstance>,
    #[serde(default)]
    pub message_destinations: Vec<MessageDestination>,
    #[serde(default)]
    pub persistence_units: Vec<PersistenceUnit>,
}

impl Module {
    pub fn new(id: impl Into<String>, kind: ModuleKind) -> Self {
        Self {
            id: id.into(),
            kind,
            components: Vec::new(),
            resources: Vec::new(),
            message_destinations: Vec::new(),
            persistence_units: Vec::new(),
        }
    }

    pub fn with_component(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }

    pub fn with_resource(mut self, resource: ResourceInstance) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_destination(mut self, destination: MessageDestination) -> Self {
        self.message_destinations.push(destination);
        self
    }

    pub fn with_persistence_unit(mut self, unit: PersistenceUnit) -> Self {
        self.persistence_units.push(unit);
        self
    }
}

// ============================================================================
// COMPONENTS
// ============================================================================

/// Classification of a component, decided upstream.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Stateless,
    Stateful,
    Singleton,
    MessageDriven {
        /// Message listener interface the component implements.
        messaging_type: String,
    },
    Managed,
    Client,
    Web,
}

impl ComponentKind {
    /// Container type this kind of component runs in, if any.
    pub fn container_type(&self) -> Option<ContainerType> {
        match self {
            ComponentKind::Stateless => Some(ContainerType::Stateless),
            ComponentKind::Stateful => Some(ContainerType::Stateful),
            ComponentKind::Singleton => Some(ContainerType::Singleton),
            ComponentKind::MessageDriven { .. } => Some(ContainerType::Message),
            ComponentKind::Managed => Some(ContainerType::Managed),
            ComponentKind::Client | ComponentKind::Web => None,
        }
    }

    /// Messaging type of a message-driven component.
    pub fn messaging_type(&self) -> Option<&str> {
        match self {
            ComponentKind::MessageDriven { messaging_type } => Some(messaging_type),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Stateless => "stateless",
            ComponentKind::Stateful => "stateful",
            ComponentKind::Singleton => "singleton",
            ComponentKind::MessageDriven { .. } => "message_driven",
            ComponentKind::Managed => "managed",
            ComponentKind::Client => "client",
            ComponentKind::Web => "web",
        }
    }
}

/// Container types a component can be assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerType {
    Stateless,
    Stateful,
    Singleton,
    Message,
    Managed,
}

impl ContainerType {
    /// The type string container instances and templates are declared with.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerType::Stateless => "STATELESS",
            ContainerType::Stateful => "STATEFUL",
            ContainerType::Singleton => "SINGLETON",
            ContainerType::Message => "MESSAGE",
            ContainerType::Managed => "MANAGED",
        }
    }
}

impl std::fmt::Display for ContainerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deployable unit owned by exactly one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    /// Declared name; also the identifier unless `deployment_id` is set.
    pub name: String,
    pub kind: ComponentKind,
    /// Explicit identifier override.
    #[serde(default)]
    pub deployment_id: Option<String>,
    /// Business interfaces, used for type-based component links.
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub references: Vec<Reference>,
    /// Names of components that must be available before this one.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Explicit container assignment.
    #[serde(default)]
    pub container_id: Option<String>,
    /// Message destination link of a message-driven component.
    #[serde(default)]
    pub destination_link: Option<String>,
    /// Declared destination type of a message-driven component.
    #[serde(default)]
    pub destination_type: Option<String>,
    /// Activation properties of a message-driven component.
    #[serde(default)]
    pub activation: Properties,
}

impl Component {
    pub fn new(name: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            name: name.into(),
            kind,
            deployment_id: None,
            interfaces: Vec::new(),
            references: Vec::new(),
            depends_on: Vec::new(),
            container_id: None,
            destination_link: None,
            destination_type: None,
            activation: Properties::new(),
        }
    }

    /// Application-wide identifier of this component.
    pub fn id(&self) -> &str {
        self.deployment_id.as_deref().unwrap_or(&self.name)
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.references.push(reference);
        self
    }

    pub fn with_dependency(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(name.into());
        self
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn with_container(mut self, container_id: impl Into<String>) -> Self {
        self.container_id = Some(container_id.into());
        self
    }

    pub fn with_destination_link(mut self, link: impl Into<String>) -> Self {
        self.destination_link = Some(link.into());
        self
    }

    pub fn with_activation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.activation.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// REFERENCES
// ============================================================================

/// What a reference asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// A connection-style resource (data source, connection factory, ...).
    #[default]
    Resource,
    /// An administered object (queue, topic, ...).
    ResourceEnv,
    MessageDestination,
    PersistenceUnit,
    /// A sibling component.
    Component,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::Resource => "resource",
            ReferenceKind::ResourceEnv => "resource-env",
            ReferenceKind::MessageDestination => "message-destination",
            ReferenceKind::PersistenceUnit => "persistence-unit",
            ReferenceKind::Component => "component",
        }
    }
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named request for a capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub name: String,
    #[serde(default)]
    pub kind: ReferenceKind,
    #[serde(default)]
    pub requested_type: Option<String>,
    /// Symbolic link to a declared target (`name` or `module#name`).
    #[serde(default)]
    pub explicit_link: Option<String>,
    /// Scheme-qualified target; external schemes pass through untouched.
    #[serde(default)]
    pub explicit_target: Option<String>,
    /// Overrides applied if this reference triggers auto-provisioning.
    #[serde(default)]
    pub properties: Properties,
    /// Unresolvable optional references are reported, not fatal.
    #[serde(default)]
    pub optional: bool,
}

impl Reference {
    pub fn new(name: impl Into<String>, kind: ReferenceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            requested_type: None,
            explicit_link: None,
            explicit_target: None,
            properties: Properties::new(),
            optional: false,
        }
    }

    /// A resource reference of the given type.
    pub fn resource(name: impl Into<String>, requested_type: impl Into<String>) -> Self {
        Self::new(name, ReferenceKind::Resource).with_type(requested_type)
    }

    pub fn with_type(mut self, requested_type: impl Into<String>) -> Self {
        self.requested_type = Some(requested_type.into());
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.explicit_link = Some(link.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.explicit_target = Some(target.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Check the structural invariants of the reference.
    pub fn validate(&self, component: &str) -> Result<(), ModelError> {
        if self.name.trim().is_empty() {
            return Err(ModelError::EmptyName {
                component: component.to_string(),
            });
        }
        match (&self.explicit_link, &self.explicit_target) {
            (Some(link), Some(target)) if !link.is_empty() && !target.is_empty() => {
                Err(ModelError::ConflictingExplicit {
                    name: self.name.clone(),
                    link: link.clone(),
                    target: target.clone(),
                })
            }
            _ => Ok(()),
        }
    }
}

// ============================================================================
// RESOURCES AND TEMPLATES
// ============================================================================

/// A concrete resource (or container) instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceInstance {
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub properties: Properties,
}

impl ResourceInstance {
    pub fn new(id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// What a template produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    #[default]
    Resource,
    Container,
}

/// A reference from a template to another resource, stored in a property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedReference {
    /// Property that receives the resolved id.
    pub property: String,
    /// Default name to resolve when the property is not overridden.
    pub name: String,
    #[serde(default)]
    pub requested_type: Option<String>,
}

/// A named blueprint ("provider") for synthesizing instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTemplate {
    /// Template id; also the default id of synthesized instances.
    pub id: String,
    #[serde(default)]
    pub kind: TemplateKind,
    /// Types this template can produce; the first is the primary type.
    pub types: Vec<String>,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub references: Vec<NestedReference>,
}

impl ResourceTemplate {
    pub fn new(id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: TemplateKind::Resource,
            types: vec![resource_type.into()],
            properties: Properties::new(),
            references: Vec::new(),
        }
    }

    pub fn container(id: impl Into<String>, container_type: ContainerType) -> Self {
        Self {
            kind: TemplateKind::Container,
            ..Self::new(id, container_type.as_str())
        }
    }

    pub fn with_type(mut self, resource_type: impl Into<String>) -> Self {
        self.types.push(resource_type.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_nested(mut self, property: impl Into<String>, name: impl Into<String>) -> Self {
        self.references.push(NestedReference {
            property: property.into(),
            name: name.into(),
            requested_type: None,
        });
        self
    }

    pub fn primary_type(&self) -> Option<&str> {
        self.types.first().map(String::as_str)
    }

    pub fn produces(&self, resource_type: &str) -> bool {
        self.types.iter().any(|t| t == resource_type)
    }
}

// ============================================================================
// MESSAGE DESTINATIONS AND PERSISTENCE UNITS
// ============================================================================

/// A logical message destination declared by a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDestination {
    pub name: String,
    /// Physical destination id, when configured.
    #[serde(default)]
    pub mapped_name: Option<String>,
    #[serde(default)]
    pub destination_type: Option<String>,
}

impl MessageDestination {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mapped_name: None,
            destination_type: None,
        }
    }

    pub fn with_type(mut self, destination_type: impl Into<String>) -> Self {
        self.destination_type = Some(destination_type.into());
        self
    }

    pub fn with_mapped_name(mut self, mapped_name: impl Into<String>) -> Self {
        self.mapped_name = Some(mapped_name.into());
        self
    }
}

/// A persistence unit declared by a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceUnit {
    pub name: String,
    #[serde(default)]
    pub jta_data_source: Option<String>,
    #[serde(default)]
    pub non_jta_data_source: Option<String>,
    #[serde(default)]
    pub properties: Properties,
}

impl PersistenceUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            jta_data_source: None,
            non_jta_data_source: None,
            properties: Properties::new(),
        }
    }

    pub fn with_jta_data_source(mut self, name: impl Into<String>) -> Self {
        self.jta_data_source = Some(name.into());
        self
    }

    pub fn with_non_jta_data_source(mut self, name: impl Into<String>) -> Self {
        self.non_jta_data_source = Some(name.into());
        self
    }
}

// ============================================================================
// POLICY
// ============================================================================

/// Caller-supplied policy flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPolicy {
    #[serde(default = "default_true")]
    pub auto_create_resources: bool,
    #[serde(default = "default_true")]
    pub auto_create_containers: bool,
}

fn default_true() -> bool {
    true
}

impl Default for LinkPolicy {
    fn default() -> Self {
        Self {
            auto_create_resources: true,
            auto_create_containers: true,
        }
    }
}

impl LinkPolicy {
    /// Policy that never synthesizes anything.
    pub fn strict() -> Self {
        Self {
            auto_create_resources: false,
            auto_create_containers: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_id_defaults_to_name() {
        let c = Component::new("OrderBean", ComponentKind::Stateless);
        assert_eq!(c.id(), "OrderBean");

        let mut c = c;
        c.deployment_id = Some("orders/OrderBean".to_string());
        assert_eq!(c.id(), "orders/OrderBean");
    }

    #[test]
    fn test_reference_validation() {
        let ok = Reference::resource("jdbc/db", "DataSource");
        assert!(ok.validate("X").is_ok());

        let empty = Reference::resource("  ", "DataSource");
        assert!(matches!(
            empty.validate("X"),
            Err(ModelError::EmptyName { .. })
        ));

        let both = Reference::resource("db", "DataSource")
            .with_link("DefaultDS")
            .with_target("external:jdbc/db");
        assert!(matches!(
            both.validate("X"),
            Err(ModelError::ConflictingExplicit { .. })
        ));
    }

    #[test]
    fn test_container_type_mapping() {
        assert_eq!(
            ComponentKind::Stateless.container_type(),
            Some(ContainerType::Stateless)
        );
        let mdb = ComponentKind::MessageDriven {
            messaging_type: "jakarta.jms.MessageListener".to_string(),
        };
        assert_eq!(mdb.container_type(), Some(ContainerType::Message));
        assert_eq!(mdb.messaging_type(), Some("jakarta.jms.MessageListener"));
        assert_eq!(ComponentKind::Web.container_type(), None);
    }

    #[test]
    fn test_parse_module_graph_yaml() {
        let yaml = r#"
id: shop
resources:
  - id: OrdersDS
    type: DataSource
modules:
  - id: orders.jar
    components:
      - name: OrderBean
        kind: stateless
        references:
          - name: jdbc/orders
            requested_type: DataSource
        depends_on: [Inventory]
      - name: OrderListener
        kind:
          message_driven:
            messaging_type: jakarta.jms.MessageListener
        destination_link: OrderQueue
    message_destinations:
      - name: OrderQueue
"#;
        let app: Application = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(app.id, "shop");
        assert_eq!(app.resources[0].resource_type, "DataSource");
        let module = &app.modules[0];
        assert_eq!(module.kind, ModuleKind::Ejb);
        assert_eq!(module.components.len(), 2);
        assert_eq!(module.components[0].references[0].kind, ReferenceKind::Resource);
        assert_eq!(
            module.components[1].kind.messaging_type(),
            Some("jakarta.jms.MessageListener")
        );
        assert_eq!(app.components().count(), 2);
    }

    #[test]
    fn test_template_produces() {
        let t = ResourceTemplate::new("DefaultDS", "DataSource").with_type("javax.sql.DataSource");
        assert!(t.produces("DataSource"));
        assert!(t.produces("javax.sql.DataSource"));
        assert_eq!(t.primary_type(), Some("DataSource"));
        assert_eq!(
            ResourceTemplate::container("Default Stateless Container", ContainerType::Stateless)
                .kind,
            TemplateKind::Container
        );
    }
}
