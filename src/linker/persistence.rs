//! Persistence units and their data sources.

use deploy_types::{Module, PersistenceUnit, Reference, ReferenceKind};
use tracing::debug;

use crate::catalog::ScopeLevel;
use crate::error::{LinkError, LinkResult};
use crate::names::short_name;
use crate::plan::{PlanPersistenceUnit, ReferenceState};
use crate::resolver::{LinkOutcome, ResourceRequest};

use super::{explicit_link, ApplicationLinker};

/// Plan id of a persistence unit: `module#unit`.
pub fn unit_id(module_id: &str, unit_name: &str) -> String {
    format!("{}#{}", module_id, unit_name)
}

#[derive(Debug, Clone)]
pub(crate) struct UnitDecl {
    pub id: String,
    pub module_id: String,
    pub name: String,
}

impl UnitDecl {
    pub fn new(module: &Module, unit: &PersistenceUnit) -> Self {
        Self {
            id: unit_id(&module.id, &unit.name),
            module_id: module.id.clone(),
            name: unit.name.clone(),
        }
    }
}

impl<'a, 'g> ApplicationLinker<'a, 'g> {
    /// Link the data sources of every persistence unit, in declaration order.
    ///
    /// A unit without a JTA data source name looks one up under its own unit
    /// name. The non-JTA data source is linked only when declared.
    pub(super) fn link_persistence_units(&mut self) -> LinkResult<Vec<PlanPersistenceUnit>> {
        let app = self.app;
        let settings = self.session.settings;
        let data_source_type = settings.data_source_type.as_str();

        let mut linked = Vec::new();
        for module in &app.modules {
            for unit in &module.persistence_units {
                let id = unit_id(&module.id, &unit.name);

                let jta = match unit.jta_data_source.as_deref() {
                    Some(name) => self.link_data_source(&module.id, &id, name, Some(name), data_source_type)?,
                    None => self.link_data_source(&module.id, &id, &unit.name, None, data_source_type)?,
                };

                let non_jta = match unit.non_jta_data_source.as_deref() {
                    Some(name) => {
                        Some(self.link_data_source(&module.id, &id, name, Some(name), data_source_type)?)
                    }
                    None => None,
                };

                debug!(unit = %id, jta = %jta, non_jta = ?non_jta, "Linked persistence unit");

                linked.push(PlanPersistenceUnit {
                    id,
                    module_id: module.id.clone(),
                    name: unit.name.clone(),
                    jta_data_source: Some(jta),
                    non_jta_data_source: non_jta,
                    properties: unit.properties.clone(),
                });
            }
        }
        Ok(linked)
    }

    /// A declared data source name is followed as a link; without one the
    /// unit name goes through the usual fallbacks.
    fn link_data_source(
        &mut self,
        module_id: &str,
        unit: &str,
        name: &str,
        link: Option<&str>,
        data_source_type: &str,
    ) -> LinkResult<String> {
        let mut request = ResourceRequest::new(unit, name, ReferenceKind::Resource)
            .with_type(Some(data_source_type));
        request.link = link;
        let target = self.session.link_resource(Some(module_id), &request)?;
        Ok(target.id().to_string())
    }

    /// Link a persistence-unit reference.
    ///
    /// Follows an explicit link, then the normalized reference name, then
    /// its short name. With a single unit in the application that unit is
    /// used whatever the name.
    pub(super) fn link_persistence_ref(
        &self,
        module: &Module,
        origin: &str,
        reference: &Reference,
    ) -> LinkResult<ReferenceState> {
        let rules = self.session.rules;
        let outcome = match explicit_link(rules, reference) {
            Some(link) => self.units.resolve(&module.id, link),
            None if self.units.len() == 1 => self.units.find_where(|_| true),
            None => {
                let normalized = rules.normalize(&reference.name);
                match self.units.resolve(&module.id, &normalized) {
                    LinkOutcome::Missing if !normalized.is_empty() => {
                        self.units.resolve(&module.id, short_name(&normalized))
                    }
                    other => other,
                }
            }
        };

        match outcome {
            LinkOutcome::Found(unit) => Ok(ReferenceState::Resolved {
                target: unit.id.clone(),
                scope: ScopeLevel::Module(unit.module_id.clone()),
            }),
            LinkOutcome::Ambiguous(candidates) => Err(LinkError::AmbiguousReference {
                component: origin.to_string(),
                name: reference.name.clone(),
                kind: ReferenceKind::PersistenceUnit,
                scope: ScopeLevel::Application.to_string(),
                candidates: candidates.iter().map(|u| u.id.clone()).collect(),
            }),
            LinkOutcome::Missing => Err(LinkError::UnresolvedReference {
                component: origin.to_string(),
                name: reference.name.clone(),
                short_name: short_name(&reference.name).to_string(),
                kind: ReferenceKind::PersistenceUnit,
                requested_type: reference.requested_type.clone(),
                scopes: vec![
                    ScopeLevel::Module(module.id.clone()).to_string(),
                    ScopeLevel::Application.to_string(),
                ],
                reason: "no persistence unit matches the link or name".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ResourceOrigin;
    use crate::config::LinkerSettings;
    use crate::linker::LinkedApplication;
    use crate::names::NameRules;
    use crate::provision::TemplateRegistry;
    use crate::scope::GlobalScope;
    use deploy_types::{Application, Component, ComponentKind, ModuleKind, ResourceInstance, ResourceTemplate};

    fn link(app: &Application) -> LinkResult<LinkedApplication> {
        let settings = LinkerSettings::default();
        let rules = NameRules::from_settings(&settings);
        let global = GlobalScope::default();
        let templates =
            TemplateRegistry::from_templates(vec![ResourceTemplate::new("DefaultDS", "DataSource")]).unwrap();
        ApplicationLinker::link(app, &global, &templates, &rules, &settings)
    }

    fn web(reference: Reference) -> Component {
        Component::new("Servlet", ComponentKind::Web).with_reference(reference)
    }

    #[test]
    fn test_unit_uses_declared_data_source() {
        let app = Application::new("shop")
            .with_resource(ResourceInstance::new("OrdersDS", "DataSource"))
            .with_module(
                Module::new("orders.jar", ModuleKind::Ejb)
                    .with_persistence_unit(PersistenceUnit::new("orders").with_jta_data_source("OrdersDS")),
            );
        let linked = link(&app).unwrap();
        let unit = &linked.persistence_units[0];
        assert_eq!(unit.id, "orders.jar#orders");
        assert_eq!(unit.jta_data_source.as_deref(), Some("OrdersDS"));
        assert_eq!(unit.non_jta_data_source, None);
    }

    #[test]
    fn test_unit_without_data_source_is_provisioned() {
        let app = Application::new("shop").with_module(
            Module::new("orders.jar", ModuleKind::Ejb)
                .with_persistence_unit(PersistenceUnit::new("orders").with_non_jta_data_source("OrdersRO")),
        );
        let linked = link(&app).unwrap();
        let unit = &linked.persistence_units[0];
        let jta = unit.jta_data_source.as_deref().unwrap();
        let non_jta = unit.non_jta_data_source.as_deref().unwrap();
        assert_ne!(jta, non_jta);

        for id in [jta, non_jta] {
            let entry = linked.scope.resources.get(id).unwrap();
            assert!(matches!(entry.origin, ResourceOrigin::Provisioned { .. }));
        }
    }

    #[test]
    fn test_single_unit_linked_whatever_the_name() {
        let app = Application::new("shop")
            .with_resource(ResourceInstance::new("OrdersDS", "DataSource"))
            .with_module(
                Module::new("orders.jar", ModuleKind::Ejb)
                    .with_persistence_unit(PersistenceUnit::new("orders").with_jta_data_source("OrdersDS")),
            )
            .with_module(
                Module::new("web.war", ModuleKind::Web)
                    .with_component(web(Reference::new("persistence/em", ReferenceKind::PersistenceUnit))),
            );
        let linked = link(&app).unwrap();
        assert_eq!(
            linked.components[0].references[0].state,
            ReferenceState::Resolved {
                target: "orders.jar#orders".into(),
                scope: ScopeLevel::Module("orders.jar".into())
            }
        );
    }

    #[test]
    fn test_unit_chosen_by_name_among_several() {
        let app = Application::new("shop")
            .with_resource(ResourceInstance::new("OrdersDS", "DataSource"))
            .with_module(
                Module::new("orders.jar", ModuleKind::Ejb)
                    .with_persistence_unit(PersistenceUnit::new("orders").with_jta_data_source("OrdersDS"))
                    .with_persistence_unit(PersistenceUnit::new("audit").with_jta_data_source("OrdersDS")),
            )
            .with_module(
                Module::new("web.war", ModuleKind::Web)
                    .with_component(web(Reference::new("persistence/audit", ReferenceKind::PersistenceUnit))),
            );
        let linked = link(&app).unwrap();
        assert_eq!(
            linked.components[0].references[0].state.target(),
            Some("orders.jar#audit")
        );
    }

    #[test]
    fn test_unknown_unit_link_is_not_found() {
        let app = Application::new("shop").with_module(
            Module::new("web.war", ModuleKind::Web).with_component(web(
                Reference::new("persistence/em", ReferenceKind::PersistenceUnit).with_link("ghost"),
            )),
        );
        assert!(link(&app).unwrap_err().is_not_found());
    }
}
