//! Property tests over generated module graphs.

use std::sync::Arc;

use deploy_linker::{Assembler, GlobalScope, LinkerSettings, TemplateRegistry};
use deploy_types::{Application, Component, ComponentKind, Module, ModuleKind, Reference, ResourceTemplate};
use proptest::prelude::*;

const NAMES: &[&str] = &["jdbc/Orders", "java:comp/env/jdbc/Orders", "jms/Events", "db", "Cache"];
const TYPES: &[&str] = &["DataSource", "jakarta.jms.Queue"];

fn assembler() -> Assembler {
    let templates = TemplateRegistry::from_templates(vec![
        ResourceTemplate::new("DefaultDS", "DataSource"),
        ResourceTemplate::new("DefaultQueue", "jakarta.jms.Queue"),
    ])
    .unwrap();
    Assembler::new(LinkerSettings::default(), templates, Arc::new(GlobalScope::default()))
}

/// Per component: references as (name, type) indexes, and an optional
/// dependency on an earlier component.
type Shape = Vec<(Vec<(usize, usize)>, Option<usize>)>;

fn shape() -> impl Strategy<Value = Shape> {
    prop::collection::vec(
        (
            prop::collection::vec((0..NAMES.len(), 0..TYPES.len()), 0..3),
            prop::option::of(0usize..8),
        ),
        1..8,
    )
}

fn application(shape: &Shape) -> Application {
    let mut modules = vec![
        Module::new("a.war", ModuleKind::Web),
        Module::new("b.war", ModuleKind::Web),
    ];
    for (i, (references, dependency)) in shape.iter().enumerate() {
        let mut component = Component::new(format!("C{i}"), ComponentKind::Web);
        for (n, (name, ty)) in references.iter().enumerate() {
            // Distinct reference names per component.
            component = component.with_reference(Reference::resource(
                format!("{}{}", NAMES[*name], "/x".repeat(n)),
                TYPES[*ty],
            ));
        }
        if let Some(d) = dependency.filter(|d| *d < i) {
            component = component.with_dependency(format!("C{d}"));
        }
        modules[i % 2].components.push(component);
    }
    modules
        .into_iter()
        .fold(Application::new("generated"), |app, m| app.with_module(m))
}

proptest! {
    #[test]
    fn assembling_is_deterministic(shape in shape()) {
        let app = application(&shape);
        let first = assembler().assemble(&app);
        let second = assembler().assemble(&app);
        match (first, second) {
            (Ok(a), Ok(b)) => {
                prop_assert_eq!(a.plan_id, b.plan_id);
                prop_assert_eq!(a, b);
            }
            (Err(a), Err(b)) => prop_assert_eq!(a.to_string(), b.to_string()),
            (a, b) => prop_assert!(false, "outcomes differ: {:?} vs {:?}", a.is_ok(), b.is_ok()),
        }
    }

    #[test]
    fn dependency_order_respects_edges(shape in shape()) {
        let app = application(&shape);
        if let Ok(plan) = assembler().assemble(&app) {
            let position = |id: &str| plan.dependency_order.iter().position(|o| o == id);
            for component in &plan.components {
                for prerequisite in &component.depends_on {
                    let before = position(prerequisite);
                    let after = position(&component.id);
                    prop_assert!(before.is_some() && after.is_some());
                    prop_assert!(before < after);
                }
            }
        }
    }

    #[test]
    fn every_reference_reaches_a_final_state(shape in shape()) {
        let app = application(&shape);
        if let Ok(plan) = assembler().assemble(&app) {
            let declared: usize = shape.iter().map(|(refs, _)| refs.len()).sum();
            let planned: usize = plan.components.iter().map(|c| c.references.len()).sum();
            prop_assert_eq!(declared, planned);
        }
    }
}
