//! Container assignment.
//!
//! Every stateless, stateful, singleton, message-driven and managed
//! component runs in a container of the matching type. Message containers
//! must additionally serve the component's listener interface.

use deploy_types::{Component, ContainerType, ResourceInstance, ResourceTemplate};
use tracing::{debug, info};

use crate::catalog::{CatalogEntry, ResourceOrigin};
use crate::error::{LinkError, LinkResult};
use crate::names::{same_id, short_name};
use crate::provision::{self, MESSAGE_LISTENER_INTERFACE};
use crate::resolver::ResourceRequest;
use crate::session::LinkSession;

/// Listener interface assumed for message containers that declare none.
pub const DEFAULT_MESSAGE_LISTENER: &str = "jakarta.jms.MessageListener";

fn serves(entry: &CatalogEntry, container_type: ContainerType, messaging_type: Option<&str>) -> bool {
    if entry.resource_type() != container_type.as_str() {
        return false;
    }
    match messaging_type {
        Some(wanted) => {
            let declared = entry
                .instance
                .properties
                .get(MESSAGE_LISTENER_INTERFACE)
                .map(String::as_str)
                .unwrap_or(DEFAULT_MESSAGE_LISTENER);
            declared == wanted
        }
        None => true,
    }
}

impl<'g> LinkSession<'g> {
    /// Pick (or create) the container a component is deployed into.
    ///
    /// Returns `None` for component kinds that need no container.
    pub fn assign_container(
        &mut self,
        module_id: &str,
        component: &Component,
    ) -> LinkResult<Option<String>> {
        let Some(container_type) = component.kind.container_type() else {
            return Ok(None);
        };
        let messaging_type = component.kind.messaging_type();

        if let Some(requested) = component.container_id.as_deref() {
            return self
                .explicit_container(module_id, component, container_type, messaging_type, requested)
                .map(Some);
        }

        if let Some(id) = self.find_container(container_type, messaging_type) {
            debug!(component = component.id(), container = %id, "Using existing container");
            return Ok(Some(id));
        }

        let missing = |reason: &str| LinkError::MissingContainer {
            component: component.id().to_string(),
            container_type: container_type.as_str().to_string(),
            requested: None,
            reason: reason.to_string(),
        };

        if !self.policy().auto_create_containers {
            return Err(missing("auto-create disabled"));
        }
        let templates = self.templates;
        let Some(template) = templates.select_container(container_type, messaging_type) else {
            return Err(missing("no container template produces this type"));
        };
        let id = self.free_container_id(&template.id);
        self.create_container(module_id, component, template, id, messaging_type)
            .map(Some)
    }

    fn explicit_container(
        &mut self,
        module_id: &str,
        component: &Component,
        container_type: ContainerType,
        messaging_type: Option<&str>,
        requested: &str,
    ) -> LinkResult<String> {
        let missing = |reason: String| LinkError::MissingContainer {
            component: component.id().to_string(),
            container_type: container_type.as_str().to_string(),
            requested: Some(requested.to_string()),
            reason,
        };

        let found = self
            .scope
            .container_chain(self.global)
            .levels()
            .flat_map(|c| c.iter())
            .find(|e| same_id(e.id(), requested) || same_id(short_name(e.id()), requested))
            .cloned();

        if let Some(entry) = found {
            if !serves(&entry, container_type, messaging_type) {
                return Err(missing(format!(
                    "container '{}' is of type {}",
                    entry.id(),
                    entry.resource_type()
                )));
            }
            return Ok(entry.id().to_string());
        }

        if !self.policy().auto_create_containers {
            return Err(missing("no such container and auto-create disabled".to_string()));
        }
        let templates = self.templates;
        let Some(template) = templates.select_container(container_type, messaging_type) else {
            return Err(missing("no container template produces this type".to_string()));
        };
        self.create_container(module_id, component, template, requested.to_string(), messaging_type)
    }

    fn find_container(&self, container_type: ContainerType, messaging_type: Option<&str>) -> Option<String> {
        self.scope
            .container_chain(self.global)
            .levels()
            .flat_map(|c| c.iter())
            .find(|e| serves(e, container_type, messaging_type))
            .map(|e| e.id().to_string())
    }

    fn free_container_id(&self, base: &str) -> String {
        let chain = self.scope.container_chain(self.global);
        if !chain.is_taken(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{}-{}", base, n))
            .find(|candidate| !chain.is_taken(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    fn create_container(
        &mut self,
        module_id: &str,
        component: &Component,
        template: &ResourceTemplate,
        id: String,
        messaging_type: Option<&str>,
    ) -> LinkResult<String> {
        let container_type = template
            .primary_type()
            .map(str::to_string)
            .unwrap_or_default();
        let mut properties = template.properties.clone();
        if let Some(messaging_type) = messaging_type {
            properties.insert(MESSAGE_LISTENER_INTERFACE.to_string(), messaging_type.to_string());
        }

        let origin = component.id();
        let request = ResourceRequest::new(origin, &id, deploy_types::ReferenceKind::Resource)
            .with_type(Some(container_type.as_str()));
        provision::with_template(self, template, &request, |session| {
            provision::resolve_nested(session, Some(module_id), origin, template, &mut properties)
        })?;

        self.scope.containers.register(
            ResourceInstance {
                id: id.clone(),
                resource_type: container_type.clone(),
                properties,
            },
            ResourceOrigin::Provisioned {
                template: template.id.clone(),
                origin: origin.to_string(),
            },
        )?;

        info!(
            origin,
            id = %id,
            container_type = %container_type,
            template = %template.id,
            "Auto-created container"
        );
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkerSettings;
    use crate::names::NameRules;
    use crate::provision::TemplateRegistry;
    use crate::scope::{ApplicationScope, GlobalScope};
    use deploy_types::{Application, ComponentKind, LinkPolicy};

    fn run<T>(
        settings: LinkerSettings,
        global: &GlobalScope,
        f: impl FnOnce(&mut LinkSession<'_>) -> T,
    ) -> T {
        let rules = NameRules::from_settings(&settings);
        let templates = TemplateRegistry::from_templates(vec![
            ResourceTemplate::new("Default JMS Resource Adapter", "ActiveMQResourceAdapter"),
            ResourceTemplate::container("Default Stateless Container", ContainerType::Stateless),
            ResourceTemplate::container("Default MDB Container", ContainerType::Message)
                .with_nested("ResourceAdapter", "Default JMS Resource Adapter"),
        ])
        .unwrap();
        let scope = ApplicationScope::from_application(&Application::new("shop")).unwrap();
        let mut session = LinkSession::new(scope, global, &templates, &rules, &settings);
        f(&mut session)
    }

    fn mdb(name: &str, listener: &str) -> Component {
        Component::new(
            name,
            ComponentKind::MessageDriven {
                messaging_type: listener.to_string(),
            },
        )
    }

    #[test]
    fn test_no_container_for_web_components() {
        run(LinkerSettings::default(), &GlobalScope::default(), |s| {
            let web = Component::new("Servlet", ComponentKind::Web);
            assert_eq!(s.assign_container("m", &web).unwrap(), None);
        });
    }

    #[test]
    fn test_auto_creates_once_and_reuses() {
        run(LinkerSettings::default(), &GlobalScope::default(), |s| {
            let a = Component::new("A", ComponentKind::Stateless);
            let b = Component::new("B", ComponentKind::Stateless);
            assert_eq!(
                s.assign_container("m", &a).unwrap().as_deref(),
                Some("Default Stateless Container")
            );
            assert_eq!(
                s.assign_container("m", &b).unwrap().as_deref(),
                Some("Default Stateless Container")
            );
            assert_eq!(s.scope.containers.len(), 1);
        });
    }

    #[test]
    fn test_message_container_resolves_resource_adapter() {
        run(LinkerSettings::default(), &GlobalScope::default(), |s| {
            let id = s
                .assign_container("m", &mdb("Listener", DEFAULT_MESSAGE_LISTENER))
                .unwrap()
                .unwrap();
            let entry = s.scope.containers.get(&id).unwrap();
            assert_eq!(entry.instance.properties["ResourceAdapter"], "Default JMS Resource Adapter");
            assert_eq!(
                entry.instance.properties[MESSAGE_LISTENER_INTERFACE],
                DEFAULT_MESSAGE_LISTENER
            );
        });
    }

    #[test]
    fn test_listener_mismatch_skips_existing_container() {
        let global = GlobalScope::build(
            vec![],
            vec![ResourceInstance::new("Jms MDB", "MESSAGE")],
        )
        .unwrap();
        let settings = LinkerSettings::default().with_policy(LinkPolicy::strict());
        run(settings, &global, |s| {
            let ok = s.assign_container("m", &mdb("L1", DEFAULT_MESSAGE_LISTENER)).unwrap();
            assert_eq!(ok.as_deref(), Some("Jms MDB"));

            let err = s
                .assign_container("m", &mdb("L2", "com.example.InboundListener"))
                .unwrap_err();
            assert_eq!(err.code(), "MISSING_CONTAINER");
        });
    }

    #[test]
    fn test_explicit_container_by_short_name() {
        let global = GlobalScope::build(
            vec![],
            vec![ResourceInstance::new("system/FastStateless", "STATELESS")],
        )
        .unwrap();
        run(LinkerSettings::default(), &global, |s| {
            let c = Component::new("A", ComponentKind::Stateless).with_container("FastStateless");
            assert_eq!(
                s.assign_container("m", &c).unwrap().as_deref(),
                Some("system/FastStateless")
            );

            let wrong = Component::new("B", ComponentKind::Singleton).with_container("FastStateless");
            assert_eq!(s.assign_container("m", &wrong).unwrap_err().code(), "MISSING_CONTAINER");
        });
    }

    #[test]
    fn test_explicit_container_created_under_requested_id() {
        run(LinkerSettings::default(), &GlobalScope::default(), |s| {
            let c = Component::new("A", ComponentKind::Stateless).with_container("orders-pool");
            assert_eq!(s.assign_container("m", &c).unwrap().as_deref(), Some("orders-pool"));
            assert_eq!(s.scope.containers.get("orders-pool").unwrap().resource_type(), "STATELESS");
        });
    }

    #[test]
    fn test_strict_policy_without_container_fails() {
        let settings = LinkerSettings::default().with_policy(LinkPolicy::strict());
        run(settings, &GlobalScope::default(), |s| {
            let c = Component::new("A", ComponentKind::Stateful);
            let err = s.assign_container("m", &c).unwrap_err();
            assert!(matches!(err, LinkError::MissingContainer { .. }));
        });
    }
}
