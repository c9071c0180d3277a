//! Application linker
//!
//! Walks one application's module graph in declaration order and gives
//! every declared reference exactly one final state. Linking runs strictly
//! in sequence per application: persistence units first, then each
//! component's container, message destination and references.

mod components;
mod destinations;
mod persistence;

use std::collections::BTreeSet;

use deploy_types::{Application, Component, Module, Reference, ReferenceKind};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::config::LinkerSettings;
use crate::error::{LinkError, LinkResult};
use crate::names::NameRules;
use crate::plan::builder::ensure_unique_component_ids;
use crate::plan::{PlanComponent, PlanDestination, PlanPersistenceUnit, PlanReference, ReferenceState};
use crate::provision::TemplateRegistry;
use crate::resolver::{LinkIndex, ResourceRequest};
use crate::scope::{ApplicationScope, GlobalScope};
use crate::session::{LinkSession, LinkTarget};

use components::ComponentDecl;
use destinations::DestinationDecl;
use persistence::UnitDecl;

pub use persistence::unit_id;

impl From<LinkTarget> for ReferenceState {
    fn from(target: LinkTarget) -> Self {
        match target {
            LinkTarget::Catalog { id, scope } => ReferenceState::Resolved { target: id, scope },
            LinkTarget::External(target) => ReferenceState::External { target },
        }
    }
}

/// Everything linking produced for one application, ready for the plan
/// builder.
#[derive(Debug, Clone)]
pub struct LinkedApplication {
    pub app_id: String,
    pub components: Vec<PlanComponent>,
    /// Catalogs after linking, including provisioned entries.
    pub scope: ApplicationScope,
    pub persistence_units: Vec<PlanPersistenceUnit>,
    pub destinations: Vec<PlanDestination>,
}

pub struct ApplicationLinker<'a, 'g> {
    app: &'a Application,
    session: LinkSession<'g>,
    components: LinkIndex<ComponentDecl>,
    destinations: LinkIndex<DestinationDecl>,
    units: LinkIndex<UnitDecl>,
    /// Destinations linked so far, keyed `module#name`, first link wins.
    linked_destinations: IndexMap<String, PlanDestination>,
}

impl<'a, 'g> ApplicationLinker<'a, 'g> {
    /// Link one application against the shared global scope and templates.
    pub fn link(
        app: &'a Application,
        global: &'g GlobalScope,
        templates: &'g TemplateRegistry,
        rules: &'g NameRules,
        settings: &'g LinkerSettings,
    ) -> LinkResult<LinkedApplication> {
        ensure_unique_component_ids(&app.id, app.components().map(|(m, c)| (m.id.as_str(), c.id())))?;
        validate_references(app)?;

        let scope = ApplicationScope::from_application(app)?;
        let session = LinkSession::new(scope, global, templates, rules, settings);
        let mut linker = Self::new(app, session)?;

        info!(
            application = %app.id,
            modules = app.modules.len(),
            components = linker.components.len(),
            "Linking application"
        );

        let persistence_units = linker.link_persistence_units()?;

        let mut components = Vec::new();
        for module in &app.modules {
            for component in &module.components {
                components.push(linker.link_component(module, component)?);
            }
        }

        let ApplicationLinker {
            session,
            linked_destinations,
            ..
        } = linker;

        Ok(LinkedApplication {
            app_id: app.id.clone(),
            components,
            scope: session.into_scope(),
            persistence_units,
            destinations: linked_destinations.into_values().collect(),
        })
    }

    fn new(app: &'a Application, session: LinkSession<'g>) -> LinkResult<Self> {
        let mut components = LinkIndex::new();
        let mut destinations = LinkIndex::new();
        let mut units = LinkIndex::new();

        for module in &app.modules {
            for component in &module.components {
                components.insert(
                    module.id.clone(),
                    component.name.clone(),
                    ComponentDecl::new(module, component),
                );
            }

            let mut seen = BTreeSet::new();
            for destination in &module.message_destinations {
                if !seen.insert(destination.name.as_str()) {
                    return Err(LinkError::duplicate(
                        "message destination",
                        &destination.name,
                        format!("module '{}'", module.id),
                    ));
                }
                destinations.insert(
                    module.id.clone(),
                    destination.name.clone(),
                    DestinationDecl::new(module, destination),
                );
            }

            let mut seen = BTreeSet::new();
            for unit in &module.persistence_units {
                if !seen.insert(unit.name.as_str()) {
                    return Err(LinkError::duplicate(
                        "persistence unit",
                        &unit.name,
                        format!("module '{}'", module.id),
                    ));
                }
                units.insert(module.id.clone(), unit.name.clone(), UnitDecl::new(module, unit));
            }
        }

        Ok(Self {
            app,
            session,
            components,
            destinations,
            units,
            linked_destinations: IndexMap::new(),
        })
    }

    fn link_component(&mut self, module: &Module, component: &Component) -> LinkResult<PlanComponent> {
        debug!(module = %module.id, component = component.id(), "Linking component");

        let container = self.session.assign_container(&module.id, component)?;

        let mut activation = component.activation.clone();
        self.link_message_driven(module, component, &mut activation)?;

        let mut references = Vec::with_capacity(component.references.len());
        for reference in &component.references {
            references.push(self.link_reference(module, component, reference)?);
        }

        let mut depends_on = Vec::with_capacity(component.depends_on.len());
        for name in &component.depends_on {
            let id = self.resolve_dependency(module, component, name)?;
            if !depends_on.contains(&id) {
                depends_on.push(id);
            }
        }

        Ok(PlanComponent {
            id: component.id().to_string(),
            name: component.name.clone(),
            module_id: module.id.clone(),
            kind: component.kind.clone(),
            container,
            depends_on,
            references,
            activation,
        })
    }

    fn link_reference(
        &mut self,
        module: &Module,
        component: &Component,
        reference: &Reference,
    ) -> LinkResult<PlanReference> {
        let origin = component.id();
        let external = reference
            .explicit_target
            .as_deref()
            .filter(|t| self.session.rules.is_external(t));

        let result = match (external, reference.kind) {
            (Some(target), _) => Ok(ReferenceState::External {
                target: target.to_string(),
            }),
            (None, ReferenceKind::Resource | ReferenceKind::ResourceEnv) => self
                .session
                .link_resource(Some(&module.id), &ResourceRequest::from_reference(origin, reference))
                .map(ReferenceState::from),
            (None, ReferenceKind::Component) => self.link_component_ref(module, origin, reference),
            (None, ReferenceKind::MessageDestination) => {
                self.link_destination_ref(module, origin, reference)
            }
            (None, ReferenceKind::PersistenceUnit) => {
                self.link_persistence_ref(module, origin, reference)
            }
        };

        let state = match result {
            Ok(state) => state,
            Err(err) if reference.optional && err.is_not_found() => {
                warn!(
                    component = origin,
                    reference = %reference.name,
                    error = %err,
                    "Optional reference left unresolved"
                );
                ReferenceState::Unresolved {
                    diagnostic: err.to_string(),
                }
            }
            Err(err) => return Err(err),
        };

        Ok(PlanReference {
            name: reference.name.clone(),
            kind: reference.kind,
            requested_type: reference.requested_type.clone(),
            state,
        })
    }
}

/// Symbolic link of a non-resource reference: the explicit link, or a
/// target that is not external.
fn explicit_link<'r>(rules: &NameRules, reference: &'r Reference) -> Option<&'r str> {
    reference
        .explicit_link
        .as_deref()
        .filter(|l| !l.is_empty())
        .or_else(|| {
            reference
                .explicit_target
                .as_deref()
                .filter(|t| !t.is_empty() && !rules.is_external(t))
        })
}

fn validate_references(app: &Application) -> LinkResult<()> {
    for (_, component) in app.components() {
        for reference in &component.references {
            reference
                .validate(component.id())
                .map_err(|e| LinkError::InvalidReference {
                    component: component.id().to_string(),
                    name: reference.name.clone(),
                    reason: e.to_string(),
                })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ScopeLevel;
    use deploy_types::{ComponentKind, ModuleKind, ResourceInstance, ResourceTemplate};

    struct Env {
        global: std::sync::Arc<GlobalScope>,
        templates: TemplateRegistry,
        rules: NameRules,
        settings: LinkerSettings,
    }

    impl Env {
        fn new() -> Self {
            let settings = LinkerSettings::default();
            Self {
                global: GlobalScope::build(vec![], vec![]).unwrap(),
                templates: TemplateRegistry::from_templates(vec![
                    ResourceTemplate::new("DefaultDS", "DataSource"),
                    ResourceTemplate::container("Default Stateless Container", deploy_types::ContainerType::Stateless),
                ])
                .unwrap(),
                rules: NameRules::from_settings(&settings),
                settings,
            }
        }

        fn link(&self, app: &Application) -> LinkResult<LinkedApplication> {
            ApplicationLinker::link(app, &self.global, &self.templates, &self.rules, &self.settings)
        }
    }

    #[test]
    fn test_every_reference_gets_a_state() {
        let app = Application::new("shop")
            .with_resource(ResourceInstance::new("OrdersDS", "DataSource"))
            .with_module(
                Module::new("orders.jar", ModuleKind::Ejb).with_component(
                    Component::new("OrderBean", ComponentKind::Stateless)
                        .with_reference(Reference::resource("jdbc/OrdersDS", "DataSource"))
                        .with_reference(Reference::resource("ctx", "jakarta.ejb.SessionContext"))
                        .with_reference(
                            Reference::resource("ldap", "Directory").with_target("external:ldap/main"),
                        ),
                ),
            );
        let linked = Env::new().link(&app).unwrap();
        let bean = &linked.components[0];
        assert_eq!(bean.references.len(), 3);
        assert_eq!(
            bean.references[0].state,
            ReferenceState::Resolved {
                target: "OrdersDS".into(),
                scope: ScopeLevel::Application
            }
        );
        assert_eq!(
            bean.references[1].state,
            ReferenceState::External {
                target: "container:jakarta.ejb.SessionContext".into()
            }
        );
        assert_eq!(bean.references[2].state.target(), Some("external:ldap/main"));
        assert_eq!(bean.container.as_deref(), Some("Default Stateless Container"));
    }

    #[test]
    fn test_optional_reference_becomes_diagnostic() {
        let app = Application::new("shop").with_module(
            Module::new("m", ModuleKind::Ejb).with_component(
                Component::new("X", ComponentKind::Managed)
                    .with_reference(Reference::resource("mail", "jakarta.mail.Session").optional()),
            ),
        );
        let mut env = Env::new();
        env.settings.policy.auto_create_containers = false;
        env.templates = TemplateRegistry::from_templates(vec![ResourceTemplate::container(
            "Managed",
            deploy_types::ContainerType::Managed,
        )])
        .unwrap();
        let err = env.link(&app).unwrap_err();
        assert_eq!(err.code(), "MISSING_CONTAINER");

        env.settings.policy.auto_create_containers = true;
        let linked = env.link(&app).unwrap();
        match &linked.components[0].references[0].state {
            ReferenceState::Unresolved { diagnostic } => assert!(diagnostic.contains("mail")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_invalid_reference_rejected() {
        let app = Application::new("shop").with_module(
            Module::new("m", ModuleKind::Web).with_component(
                Component::new("Servlet", ComponentKind::Web).with_reference(
                    Reference::resource("db", "DataSource")
                        .with_link("OrdersDS")
                        .with_target("jdbc/orders"),
                ),
            ),
        );
        let err = Env::new().link(&app).unwrap_err();
        assert_eq!(err.code(), "INVALID_REFERENCE");
    }

    #[test]
    fn test_duplicate_component_ids_across_modules() {
        let app = Application::new("shop")
            .with_module(
                Module::new("a.jar", ModuleKind::Ejb)
                    .with_component(Component::new("Bean", ComponentKind::Stateless)),
            )
            .with_module(
                Module::new("b.jar", ModuleKind::Ejb)
                    .with_component(Component::new("Bean", ComponentKind::Stateless)),
            );
        assert_eq!(Env::new().link(&app).unwrap_err().code(), "DUPLICATE_IDENTIFIER");
    }

    #[test]
    fn test_duplicate_destination_in_module() {
        let app = Application::new("shop").with_module(
            Module::new("m", ModuleKind::Ejb)
                .with_destination(deploy_types::MessageDestination::new("Orders"))
                .with_destination(deploy_types::MessageDestination::new("Orders")),
        );
        assert_eq!(Env::new().link(&app).unwrap_err().code(), "DUPLICATE_IDENTIFIER");
    }
}
