//! Canonical serialization for content-addressed plan ids.
//!
//! Plans are hashed from `bincode` bytes, never from JSON. Only ordered
//! collections appear in plan types, so the encoding is deterministic.
//!
//! ```text
//! SHA-256(bincode(plan content))
//!   → hex digest
//!   → truncate to 128 bits → Uuid
//! ```

use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::DeploymentPlan;

/// Deterministic bytes of everything in the plan except its own identity.
pub fn canonical_bytes(plan: &DeploymentPlan) -> Vec<u8> {
    let content = (
        &plan.application_id,
        &plan.components,
        &plan.resources,
        &plan.containers,
        &plan.persistence_units,
        &plan.destinations,
        &plan.dependency_order,
    );
    bincode::serialize(&content).expect("bincode serialization of plan content is infallible")
}

/// Compute `(plan_id, hex digest)` for a plan's content.
pub fn content_address(plan: &DeploymentPlan) -> (Uuid, String) {
    let hash = Sha256::digest(canonical_bytes(plan));
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);
    (Uuid::from_bytes(bytes), hex::encode(hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{PlanComponent, PlanReference, ReferenceState};
    use crate::catalog::ScopeLevel;
    use deploy_types::{ComponentKind, Properties, ReferenceKind};
    use proptest::prelude::*;

    fn plan(names: &[String]) -> DeploymentPlan {
        DeploymentPlan {
            plan_id: Uuid::nil(),
            digest: String::new(),
            application_id: "shop".into(),
            components: names
                .iter()
                .map(|n| PlanComponent {
                    id: n.clone(),
                    name: n.clone(),
                    module_id: "m".into(),
                    kind: ComponentKind::Stateless,
                    container: None,
                    depends_on: vec![],
                    references: vec![PlanReference {
                        name: "db".into(),
                        kind: ReferenceKind::Resource,
                        requested_type: Some("DataSource".into()),
                        state: ReferenceState::Resolved {
                            target: "DefaultDS".into(),
                            scope: ScopeLevel::Application,
                        },
                    }],
                    activation: Properties::new(),
                })
                .collect(),
            resources: vec![],
            containers: vec![],
            persistence_units: vec![],
            destinations: vec![],
            dependency_order: vec![],
        }
    }

    #[test]
    fn test_identity_fields_do_not_affect_address() {
        let a = plan(&["A".to_string()]);
        let mut b = a.clone();
        b.plan_id = Uuid::new_v4();
        b.digest = "x".into();
        assert_eq!(content_address(&a), content_address(&b));
    }

    #[test]
    fn test_digest_is_full_sha256_hex() {
        let (id, digest) = content_address(&plan(&[]));
        assert_eq!(digest.len(), 64);
        assert_eq!(id.as_bytes()[..], hex::decode(&digest[..32]).unwrap()[..]);
    }

    proptest! {
        #[test]
        fn prop_address_is_deterministic(names in proptest::collection::vec("[A-Za-z]{1,8}", 0..6)) {
            let p = plan(&names);
            prop_assert_eq!(content_address(&p), content_address(&p.clone()));
        }

        #[test]
        fn prop_component_order_changes_address(a in "[a-z]{1,6}", b in "[A-Z]{1,6}") {
            let forward = plan(&[a.clone(), b.clone()]);
            let reverse = plan(&[b, a]);
            prop_assert_ne!(content_address(&forward).0, content_address(&reverse).0);
        }
    }
}
