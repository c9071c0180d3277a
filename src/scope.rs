//! Scope chain: module → application → global.
//!
//! The global scope is built once from system configuration and shared
//! read-only between applications. Each application gets its own
//! [`ApplicationScope`], which is the only place new instances are
//! registered while linking.

use std::sync::Arc;

use deploy_types::{Application, ResourceInstance};
use indexmap::IndexMap;

use crate::catalog::{Catalog, ResourceOrigin, ScopeLevel};
use crate::error::{LinkError, LinkResult};

/// System-wide resources and containers.
#[derive(Debug, Clone)]
pub struct GlobalScope {
    pub resources: Catalog,
    pub containers: Catalog,
}

impl Default for GlobalScope {
    fn default() -> Self {
        Self {
            resources: Catalog::new(ScopeLevel::Global),
            containers: Catalog::new(ScopeLevel::Global),
        }
    }
}

impl GlobalScope {
    /// Build the shared global scope from declared instances.
    pub fn build(
        resources: Vec<ResourceInstance>,
        containers: Vec<ResourceInstance>,
    ) -> LinkResult<Arc<Self>> {
        let mut scope = Self::default();
        for resource in resources {
            scope.resources.register(resource, ResourceOrigin::Declared)?;
        }
        for container in containers {
            scope.containers.register(container, ResourceOrigin::Declared)?;
        }
        Ok(Arc::new(scope))
    }
}

/// Catalogs owned by one application while it is being linked.
#[derive(Debug, Clone)]
pub struct ApplicationScope {
    pub app_id: String,
    pub resources: Catalog,
    pub containers: Catalog,
    /// Module-local resource catalogs, in module declaration order.
    pub modules: IndexMap<String, Catalog>,
}

impl ApplicationScope {
    /// Seed the application scope from the declared module graph.
    ///
    /// Module ids must be unique; resource ids must be unique per catalog.
    /// A module resource may reuse an application resource id and shadows it
    /// for components of that module.
    pub fn from_application(app: &Application) -> LinkResult<Self> {
        let mut resources = Catalog::new(ScopeLevel::Application);
        for resource in &app.resources {
            resources.register(resource.clone(), ResourceOrigin::Declared)?;
        }

        let mut containers = Catalog::new(ScopeLevel::Application);
        for container in &app.containers {
            containers.register(container.clone(), ResourceOrigin::Declared)?;
        }

        let mut modules = IndexMap::new();
        for module in &app.modules {
            if modules.contains_key(&module.id) {
                return Err(LinkError::duplicate(
                    "module",
                    &module.id,
                    format!("application '{}'", app.id),
                ));
            }
            let mut catalog = Catalog::new(ScopeLevel::Module(module.id.clone()));
            for resource in &module.resources {
                catalog.register(resource.clone(), ResourceOrigin::Declared)?;
            }
            modules.insert(module.id.clone(), catalog);
        }

        Ok(Self {
            app_id: app.id.clone(),
            resources,
            containers,
            modules,
        })
    }

    /// Resource chain as seen from a module (or from the application level).
    pub fn chain<'a>(&'a self, module_id: Option<&str>, global: &'a GlobalScope) -> ScopeChain<'a> {
        ScopeChain {
            module: module_id.and_then(|id| self.modules.get(id)),
            application: &self.resources,
            global: &global.resources,
        }
    }

    /// Whether a resource id is used by any module, the application or
    /// the global scope.
    pub fn is_id_taken(&self, id: &str, global: &GlobalScope) -> bool {
        self.modules.values().any(|c| c.is_taken(id))
            || self.resources.is_taken(id)
            || global.resources.is_taken(id)
    }

    /// Container chain: application then global.
    pub fn container_chain<'a>(&'a self, global: &'a GlobalScope) -> ScopeChain<'a> {
        ScopeChain {
            module: None,
            application: &self.containers,
            global: &global.containers,
        }
    }
}

/// Read-only view of the catalogs visible from one point, narrowest first.
#[derive(Debug, Clone, Copy)]
pub struct ScopeChain<'a> {
    pub module: Option<&'a Catalog>,
    pub application: &'a Catalog,
    pub global: &'a Catalog,
}

impl<'a> ScopeChain<'a> {
    pub fn levels(&self) -> impl Iterator<Item = &'a Catalog> {
        self.module
            .into_iter()
            .chain([self.application, self.global])
    }

    /// Whether an id is used anywhere in the chain.
    pub fn is_taken(&self, id: &str) -> bool {
        self.levels().any(|c| c.is_taken(id))
    }

    /// Scope names for diagnostics, narrowest first.
    pub fn describe(&self) -> Vec<String> {
        self.levels().map(|c| c.scope().to_string()).collect()
    }
}
