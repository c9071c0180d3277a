//! Plan Builder
//!
//! Merges linked components, reference states and the application's
//! catalogs into one [`DeploymentPlan`]. The builder never drops a
//! reference: every declared reference appears in its component's entry in
//! exactly one final state.

use std::collections::BTreeMap;

use tracing::info;
use uuid::Uuid;

use crate::catalog::{Catalog, ResourceOrigin};
use crate::error::{LinkError, LinkResult};
use crate::linker::LinkedApplication;
use crate::names::same_id;
use crate::scope::GlobalScope;

use super::canonical::content_address;
use super::{DeploymentPlan, PlanComponent, PlanResource};

/// Fail on the first component id used twice in one application.
///
/// Ids are compared case-insensitively.
pub fn ensure_unique_component_ids<'a, I>(app_id: &str, components: I) -> LinkResult<()>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut seen: BTreeMap<String, &str> = BTreeMap::new();
    for (module_id, id) in components {
        let key = id.to_lowercase();
        if let Some(first_module) = seen.get(&key) {
            return Err(LinkError::DuplicateIdentifier {
                what: "component".to_string(),
                id: id.to_string(),
                scope: format!(
                    "application '{}' (modules '{}' and '{}')",
                    app_id, first_module, module_id
                ),
            });
        }
        seen.insert(key, module_id);
    }
    Ok(())
}

/// A provisioned entry must not share its id with any other entry of the
/// same plan list, whatever scope either one lives in.
fn ensure_provisioned_ids_unique(app_id: &str, what: &str, entries: &[PlanResource]) -> LinkResult<()> {
    for (i, entry) in entries.iter().enumerate() {
        if !matches!(entry.origin, ResourceOrigin::Provisioned { .. }) {
            continue;
        }
        let clash = entries
            .iter()
            .enumerate()
            .find(|(j, e)| *j != i && same_id(&e.id, &entry.id));
        if let Some((_, other)) = clash {
            return Err(LinkError::DuplicateIdentifier {
                what: format!("provisioned {}", what),
                id: entry.id.clone(),
                scope: format!("application '{}' ({} and {})", app_id, other.scope, entry.scope),
            });
        }
    }
    Ok(())
}

pub struct PlanBuilder<'a> {
    linked: LinkedApplication,
    global: &'a GlobalScope,
    dependency_order: Vec<String>,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(linked: LinkedApplication, global: &'a GlobalScope) -> Self {
        Self {
            linked,
            global,
            dependency_order: Vec::new(),
        }
    }

    pub fn with_dependency_order(mut self, order: Vec<String>) -> Self {
        self.dependency_order = order;
        self
    }

    pub fn build(self) -> LinkResult<DeploymentPlan> {
        let LinkedApplication {
            app_id,
            components,
            scope,
            persistence_units,
            destinations,
        } = self.linked;

        ensure_unique_component_ids(
            &app_id,
            components.iter().map(|c| (c.module_id.as_str(), c.id.as_str())),
        )?;
        check_dependencies(&components)?;

        let mut resources = Vec::new();
        for catalog in scope.modules.values() {
            resources.extend(plan_entries(catalog));
        }
        resources.extend(plan_entries(&scope.resources));
        resources.extend(plan_entries(&self.global.resources));

        let mut containers = plan_entries(&scope.containers);
        containers.extend(plan_entries(&self.global.containers));

        ensure_provisioned_ids_unique(&app_id, "resource", &resources)?;
        ensure_provisioned_ids_unique(&app_id, "container", &containers)?;

        let mut plan = DeploymentPlan {
            plan_id: Uuid::nil(),
            digest: String::new(),
            application_id: app_id,
            components,
            resources,
            containers,
            persistence_units,
            destinations,
            dependency_order: self.dependency_order,
        };

        let (plan_id, digest) = content_address(&plan);
        plan.plan_id = plan_id;
        plan.digest = digest;

        info!(
            application = %plan.application_id,
            plan_id = %plan.plan_id,
            components = plan.components.len(),
            resources = plan.resources.len(),
            provisioned = plan.provisioned().count(),
            "Deployment plan built"
        );
        Ok(plan)
    }
}

fn plan_entries(catalog: &Catalog) -> Vec<PlanResource> {
    catalog
        .iter()
        .map(|entry| PlanResource {
            id: entry.instance.id.clone(),
            resource_type: entry.instance.resource_type.clone(),
            scope: catalog.scope().clone(),
            origin: entry.origin.clone(),
            properties: entry.instance.properties.clone(),
            aliases: entry.aliases.clone(),
        })
        .collect()
}

/// Every dependency must name a component of the plan.
fn check_dependencies(components: &[PlanComponent]) -> LinkResult<()> {
    let known = |id: &str| components.iter().any(|c| same_id(&c.id, id));
    for component in components {
        for dependency in &component.depends_on {
            if !known(dependency.as_str()) {
                return Err(LinkError::UnresolvedReference {
                    component: component.id.clone(),
                    name: dependency.clone(),
                    short_name: dependency.clone(),
                    kind: deploy_types::ReferenceKind::Component,
                    requested_type: None,
                    scopes: vec!["application".to_string()],
                    reason: "depends-on names no component of this application".to_string(),
                });
            }
        }
    }
    Ok(())
}
