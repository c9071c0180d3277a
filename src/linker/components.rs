//! Component-to-component links and ordering dependencies.

use deploy_types::{Component, Module, Reference, ReferenceKind};
use tracing::info;

use crate::catalog::ScopeLevel;
use crate::error::{LinkError, LinkResult};
use crate::names::{same_id, short_name};
use crate::plan::ReferenceState;
use crate::resolver::LinkOutcome;

use super::{explicit_link, ApplicationLinker};

#[derive(Debug, Clone)]
pub(crate) struct ComponentDecl {
    pub id: String,
    pub module_id: String,
    pub interfaces: Vec<String>,
}

impl ComponentDecl {
    pub fn new(module: &Module, component: &Component) -> Self {
        Self {
            id: component.id().to_string(),
            module_id: module.id.clone(),
            interfaces: component.interfaces.clone(),
        }
    }
}

impl<'a, 'g> ApplicationLinker<'a, 'g> {
    /// Link a component reference.
    ///
    /// An explicit link is followed as written. Otherwise the requested type
    /// is matched against declared business interfaces, and failing that the
    /// short reference name against component names.
    pub(super) fn link_component_ref(
        &self,
        module: &Module,
        origin: &str,
        reference: &Reference,
    ) -> LinkResult<ReferenceState> {
        let rules = self.session.rules;
        let outcome = match explicit_link(rules, reference) {
            Some(link) => self.components.resolve(&module.id, link),
            None => {
                let by_interface = match reference.requested_type.as_deref() {
                    Some(t) => self.components.find_where(|c| c.interfaces.iter().any(|i| i == t)),
                    None => LinkOutcome::Missing,
                };
                match by_interface {
                    LinkOutcome::Missing => {
                        let normalized = rules.normalize(&reference.name);
                        self.components.resolve(&module.id, short_name(&normalized))
                    }
                    other => other,
                }
            }
        };

        match outcome {
            LinkOutcome::Found(target) => {
                if explicit_link(rules, reference).is_none() {
                    info!(
                        component = origin,
                        reference = %reference.name,
                        target = %target.id,
                        "Auto-linked component reference"
                    );
                }
                Ok(ReferenceState::Resolved {
                    target: target.id.clone(),
                    scope: ScopeLevel::Module(target.module_id.clone()),
                })
            }
            LinkOutcome::Ambiguous(candidates) => Err(LinkError::AmbiguousReference {
                component: origin.to_string(),
                name: reference.name.clone(),
                kind: ReferenceKind::Component,
                scope: ScopeLevel::Application.to_string(),
                candidates: candidates.iter().map(|c| c.id.clone()).collect(),
            }),
            LinkOutcome::Missing => Err(self.missing_component(
                module,
                origin,
                &reference.name,
                reference.requested_type.clone(),
                "no component matches the link, interface or name",
            )),
        }
    }

    /// Component id a `depends_on` entry names: link rules on the component
    /// name first, then the component id itself.
    pub(super) fn resolve_dependency(
        &self,
        module: &Module,
        component: &Component,
        name: &str,
    ) -> LinkResult<String> {
        let outcome = match self.components.resolve(&module.id, name) {
            LinkOutcome::Missing => self.components.find_where(|c| same_id(&c.id, name)),
            other => other,
        };
        match outcome {
            LinkOutcome::Found(target) => Ok(target.id.clone()),
            LinkOutcome::Ambiguous(candidates) => Err(LinkError::AmbiguousReference {
                component: component.id().to_string(),
                name: name.to_string(),
                kind: ReferenceKind::Component,
                scope: ScopeLevel::Application.to_string(),
                candidates: candidates.iter().map(|c| c.id.clone()).collect(),
            }),
            LinkOutcome::Missing => Err(self.missing_component(
                module,
                component.id(),
                name,
                None,
                "depends-on names no component of this application",
            )),
        }
    }

    fn missing_component(
        &self,
        module: &Module,
        origin: &str,
        name: &str,
        requested_type: Option<String>,
        reason: &str,
    ) -> LinkError {
        LinkError::UnresolvedReference {
            component: origin.to_string(),
            name: name.to_string(),
            short_name: short_name(name).to_string(),
            kind: ReferenceKind::Component,
            requested_type,
            scopes: vec![
                ScopeLevel::Module(module.id.clone()).to_string(),
                ScopeLevel::Application.to_string(),
            ],
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::LinkerSettings;
    use crate::linker::ApplicationLinker;
    use crate::names::NameRules;
    use crate::plan::ReferenceState;
    use crate::provision::TemplateRegistry;
    use crate::scope::GlobalScope;
    use crate::catalog::ScopeLevel;
    use deploy_types::{Application, Component, ComponentKind, Module, ModuleKind, Reference, ReferenceKind};

    fn link(app: &Application) -> crate::error::LinkResult<crate::linker::LinkedApplication> {
        let settings = LinkerSettings::default();
        let rules = NameRules::from_settings(&settings);
        let global = GlobalScope::default();
        let templates = TemplateRegistry::new();
        ApplicationLinker::link(app, &global, &templates, &rules, &settings)
    }

    fn client(reference: Reference) -> Component {
        Component::new("Client", ComponentKind::Client).with_reference(reference)
    }

    fn app(client_component: Component) -> Application {
        Application::new("shop")
            .with_module(
                Module::new("orders.jar", ModuleKind::Ejb).with_component(
                    Component::new("OrderBean", ComponentKind::Web).with_interface("com.shop.Orders"),
                ),
            )
            .with_module(
                Module::new("billing.jar", ModuleKind::Ejb)
                    .with_component(
                        Component::new("InvoiceBean", ComponentKind::Web)
                            .with_interface("com.shop.Invoices"),
                    )
                    .with_component(
                        Component::new("AuditBean", ComponentKind::Web)
                            .with_interface("com.shop.Invoices"),
                    ),
            )
            .with_module(Module::new("client.jar", ModuleKind::Client).with_component(client_component))
    }

    fn state(linked: &crate::linker::LinkedApplication) -> &ReferenceState {
        &linked.components.last().unwrap().references[0].state
    }

    #[test]
    fn test_link_by_unique_interface() {
        let r = Reference::new("ejb/orders", ReferenceKind::Component).with_type("com.shop.Orders");
        let linked = link(&app(client(r))).unwrap();
        assert_eq!(
            state(&linked),
            &ReferenceState::Resolved {
                target: "OrderBean".into(),
                scope: ScopeLevel::Module("orders.jar".into())
            }
        );
    }

    #[test]
    fn test_shared_interface_is_ambiguous() {
        let r = Reference::new("ejb/invoices", ReferenceKind::Component).with_type("com.shop.Invoices");
        let err = link(&app(client(r))).unwrap_err();
        assert_eq!(err.code(), "AMBIGUOUS_REFERENCE");
    }

    #[test]
    fn test_qualified_link_disambiguates() {
        let r = Reference::new("ejb/invoices", ReferenceKind::Component)
            .with_type("com.shop.Invoices")
            .with_link("../billing.jar#AuditBean");
        let linked = link(&app(client(r))).unwrap();
        assert_eq!(state(&linked).target(), Some("AuditBean"));
    }

    #[test]
    fn test_fallback_to_short_name() {
        let r = Reference::new("ejb/InvoiceBean", ReferenceKind::Component);
        let linked = link(&app(client(r))).unwrap();
        assert_eq!(state(&linked).target(), Some("InvoiceBean"));
    }

    #[test]
    fn test_missing_component_is_unresolved() {
        let r = Reference::new("ejb/Nothing", ReferenceKind::Component).with_link("Nothing");
        let err = link(&app(client(r))).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_dependency_resolves_by_name_or_id() {
        let mut dependent = Component::new("Reports", ComponentKind::Web)
            .with_dependency("OrderBean")
            .with_dependency("billing/Invoice");
        dependent.depends_on.push("OrderBean".into());
        let mut invoice = Component::new("InvoiceBean", ComponentKind::Web);
        invoice.deployment_id = Some("billing/Invoice".into());

        let app = Application::new("shop")
            .with_module(
                Module::new("m", ModuleKind::Ejb)
                    .with_component(Component::new("OrderBean", ComponentKind::Web))
                    .with_component(invoice)
                    .with_component(dependent),
            );
        let linked = link(&app).unwrap();
        assert_eq!(linked.components[2].depends_on, vec!["OrderBean", "billing/Invoice"]);
    }
}
