//! Deploy Linker - build-time reference resolution and plan assembly
//!
//! Takes the normalized module graph of an application and turns it into a
//! flattened, content-addressed deployment plan.
//!
//! ## Pipeline
//! Module graph -> Scope Chain Resolver (+ Auto-Provisioner) -> Dependency
//! Grapher -> Plan Builder
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use deploy_linker::{Assembler, GlobalScope, LinkerSettings, TemplateRegistry};
//! use deploy_types::{Application, Component, ComponentKind, Module, ModuleKind, Reference, ResourceTemplate};
//!
//! let templates = TemplateRegistry::from_templates(vec![ResourceTemplate::new("DefaultDS", "DataSource")])
//!     .unwrap();
//! let assembler = Assembler::new(LinkerSettings::default(), templates, Arc::new(GlobalScope::default()));
//!
//! let app = Application::new("shop").with_module(
//!     Module::new("web.war", ModuleKind::Web).with_component(
//!         Component::new("Checkout", ComponentKind::Web)
//!             .with_reference(Reference::resource("db", "DataSource")),
//!     ),
//! );
//! let plan = assembler.assemble(&app).unwrap();
//! assert_eq!(plan.component("Checkout").unwrap().references[0].state.target(), Some("DefaultDS"));
//! ```

// Errors
pub mod error;

// Names, catalogs and scopes
pub mod catalog;
pub mod names;
pub mod scope;

// Configuration (settings, provider templates, system resources)
pub mod config;

// Scope Chain Resolver
pub mod resolver;

// Per-application linking state, provisioning and containers
pub mod containers;
pub mod provision;
pub mod session;

// Component, destination and persistence-unit linking
pub mod linker;

// Dependency Grapher
pub mod graph;

// Plan Builder
pub mod plan;

// Pipeline entry point
pub mod assembler;

pub use assembler::{Assembler, AssemblyOutcome};
pub use catalog::{Catalog, CatalogEntry, ResourceOrigin, ScopeLevel};
pub use config::{ConfigLoader, LinkerSettings, LoadedConfig};
pub use error::{LinkError, LinkResult};
pub use graph::DependencyGraph;
pub use linker::{ApplicationLinker, LinkedApplication};
pub use names::NameRules;
pub use plan::{DeploymentPlan, PlanBuilder, PlanComponent, PlanReference, PlanResource, ReferenceState};
pub use provision::{AutoProvisioner, TemplateRegistry};
pub use resolver::{Resolution, ResourceRequest, ScopeChainResolver};
pub use scope::{ApplicationScope, GlobalScope, ScopeChain};
pub use session::{LinkSession, LinkTarget};
