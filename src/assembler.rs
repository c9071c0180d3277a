//! Assembler
//!
//! Runs the whole pipeline for an application: link every reference
//! (provisioning as needed), order the declared dependencies, then build the
//! plan. Global resources and templates are loaded once and shared by every
//! application assembled through the same [`Assembler`].

use std::sync::Arc;

use deploy_types::Application;
use tracing::{info, warn};

use crate::config::{LinkerSettings, LoadedConfig};
use crate::error::LinkResult;
use crate::graph::DependencyGraph;
use crate::linker::ApplicationLinker;
use crate::names::NameRules;
use crate::plan::{DeploymentPlan, PlanBuilder};
use crate::provision::TemplateRegistry;
use crate::scope::GlobalScope;

/// Result of assembling one application of a batch.
#[derive(Debug)]
pub struct AssemblyOutcome {
    pub application: String,
    pub result: LinkResult<DeploymentPlan>,
}

impl AssemblyOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Clone)]
pub struct Assembler {
    global: Arc<GlobalScope>,
    templates: TemplateRegistry,
    rules: NameRules,
    settings: LinkerSettings,
}

impl Assembler {
    pub fn new(settings: LinkerSettings, templates: TemplateRegistry, global: Arc<GlobalScope>) -> Self {
        Self {
            rules: NameRules::from_settings(&settings),
            global,
            templates,
            settings,
        }
    }

    pub fn from_config(config: LoadedConfig) -> Self {
        Self::new(config.settings, config.templates, config.global)
    }

    pub fn settings(&self) -> &LinkerSettings {
        &self.settings
    }

    pub fn global(&self) -> &GlobalScope {
        &self.global
    }

    /// Assemble one application into a deployment plan.
    ///
    /// Any error aborts the whole application; no partial plan is returned.
    pub fn assemble(&self, app: &Application) -> LinkResult<DeploymentPlan> {
        let linked = ApplicationLinker::link(
            app,
            &self.global,
            &self.templates,
            &self.rules,
            &self.settings,
        )?;

        let graph = DependencyGraph::from_dependencies(
            linked
                .components
                .iter()
                .map(|c| (c.id.as_str(), c.depends_on.as_slice())),
        );
        let order = graph.topological_order()?;

        PlanBuilder::new(linked, &self.global)
            .with_dependency_order(order)
            .build()
    }

    /// Assemble applications one after another. A failing application does
    /// not stop the rest.
    pub fn assemble_batch(&self, apps: &[Application]) -> Vec<AssemblyOutcome> {
        let outcomes: Vec<AssemblyOutcome> = apps
            .iter()
            .map(|app| {
                let result = self.assemble(app);
                if let Err(err) = &result {
                    warn!(
                        application = %app.id,
                        code = err.code(),
                        error = %err,
                        "Application assembly failed"
                    );
                }
                AssemblyOutcome {
                    application: app.id.clone(),
                    result,
                }
            })
            .collect();

        info!(
            applications = outcomes.len(),
            failed = outcomes.iter().filter(|o| !o.is_ok()).count(),
            "Batch assembly finished"
        );
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deploy_types::{Component, ComponentKind, Module, ModuleKind, Reference, ResourceTemplate};

    fn assembler() -> Assembler {
        Assembler::new(
            LinkerSettings::default(),
            TemplateRegistry::from_templates(vec![ResourceTemplate::new("DefaultDS", "DataSource")]).unwrap(),
            Arc::new(GlobalScope::default()),
        )
    }

    fn web(id: &str) -> Component {
        Component::new(id, ComponentKind::Web)
    }

    #[test]
    fn test_dependency_order_in_plan() {
        let app = Application::new("shop").with_module(
            Module::new("m", ModuleKind::Web)
                .with_component(web("C").with_dependency("B"))
                .with_component(web("B").with_dependency("A"))
                .with_component(web("A")),
        );
        let plan = assembler().assemble(&app).unwrap();
        assert_eq!(plan.dependency_order, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_batch_isolates_failures() {
        let broken = Application::new("broken").with_module(
            Module::new("m", ModuleKind::Web)
                .with_component(web("A").with_dependency("B"))
                .with_component(web("B").with_dependency("A")),
        );
        let fine = Application::new("fine").with_module(
            Module::new("m", ModuleKind::Web)
                .with_component(web("X").with_reference(Reference::resource("db", "DataSource"))),
        );

        let outcomes = assembler().assemble_batch(&[broken, fine]);
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].application, "broken");
        assert_eq!(
            outcomes[0].result.as_ref().unwrap_err().code(),
            "DEPENDENCY_CYCLE"
        );
        let plan = outcomes[1].result.as_ref().unwrap();
        assert_eq!(plan.resource("DefaultDS").unwrap().resource_type, "DataSource");
    }

    #[test]
    fn test_global_scope_untouched_by_provisioning() {
        let asm = assembler();
        let app = Application::new("shop").with_module(
            Module::new("m", ModuleKind::Web)
                .with_component(web("X").with_reference(Reference::resource("db", "DataSource"))),
        );
        asm.assemble(&app).unwrap();
        assert!(asm.global().resources.is_empty());
    }
}
