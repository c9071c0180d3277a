//! Template Registry
//!
//! In-memory catalog of provider templates, in load order. Selection is
//! deterministic: the first template in registration order wins.

use deploy_types::{ContainerType, ResourceTemplate, TemplateKind};
use indexmap::IndexMap;

use crate::error::{LinkError, LinkResult};
use crate::names::{same_id, short_name};

#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    /// Templates indexed by id
    templates: IndexMap<String, ResourceTemplate>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_templates(templates: impl IntoIterator<Item = ResourceTemplate>) -> LinkResult<Self> {
        let mut registry = Self::new();
        for template in templates {
            registry.register(template)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, template: ResourceTemplate) -> LinkResult<()> {
        if self.templates.keys().any(|k| same_id(k, &template.id)) {
            return Err(LinkError::duplicate("template", &template.id, "template registry"));
        }
        self.templates.insert(template.id.clone(), template);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ResourceTemplate> {
        self.templates.get(id)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceTemplate> {
        self.templates.values()
    }

    /// Resource template for a request: exact id, then short name, then the
    /// first template producing the type.
    ///
    /// A name match is only accepted when the template can produce the
    /// requested type.
    pub fn select_resource(&self, name: &str, requested_type: Option<&str>) -> Option<&ResourceTemplate> {
        let usable = |t: &&ResourceTemplate| {
            t.kind == TemplateKind::Resource && requested_type.map_or(true, |rt| t.produces(rt))
        };

        let short = short_name(name);
        self.templates
            .values()
            .filter(usable)
            .find(|t| same_id(&t.id, name))
            .or_else(|| {
                self.templates
                    .values()
                    .filter(usable)
                    .find(|t| same_id(short_name(&t.id), short))
            })
            .or_else(|| requested_type.and_then(|rt| self.first_producing(rt, TemplateKind::Resource)))
    }

    /// First template of `kind` producing `resource_type`.
    pub fn first_producing(&self, resource_type: &str, kind: TemplateKind) -> Option<&ResourceTemplate> {
        self.templates
            .values()
            .find(|t| t.kind == kind && t.produces(resource_type))
    }

    /// Container template for a container type.
    ///
    /// Message containers prefer a template whose `MessageListenerInterface`
    /// matches the requested messaging type.
    pub fn select_container(
        &self,
        container_type: ContainerType,
        messaging_type: Option<&str>,
    ) -> Option<&ResourceTemplate> {
        let type_str = container_type.as_str();
        if let Some(messaging_type) = messaging_type {
            let preferred = self.templates.values().find(|t| {
                t.kind == TemplateKind::Container
                    && t.produces(type_str)
                    && t.properties.get(MESSAGE_LISTENER_INTERFACE).map(String::as_str)
                        == Some(messaging_type)
            });
            if preferred.is_some() {
                return preferred;
            }
        }
        self.first_producing(type_str, TemplateKind::Container)
    }
}

/// Container property naming the listener interface a message container serves.
pub const MESSAGE_LISTENER_INTERFACE: &str = "MessageListenerInterface";
