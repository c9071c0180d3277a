//! Linking error types.
//!
//! Every failure here aborts linking of the enclosing application. Nothing
//! is retried: resolution is deterministic, so the same input fails the same
//! way until the configuration changes.

use deploy_types::ReferenceKind;
use thiserror::Error;

/// Errors raised while linking one application.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// More than one candidate matched within the same scope.
    #[error(
        "Ambiguous {kind} reference '{name}' in '{component}': {} candidates in {scope} ({})",
        candidates.len(),
        candidates.join(", ")
    )]
    AmbiguousReference {
        component: String,
        name: String,
        kind: ReferenceKind,
        scope: String,
        candidates: Vec<String>,
    },

    /// Nothing matched and nothing could be provisioned.
    #[error(
        "No provider found for {kind} reference '{name}' of type '{}' in '{component}'. \
         Looked for id '{name}' and short name '{short_name}' in [{}]: {reason}",
        display_type(requested_type),
        scopes.join(", ")
    )]
    UnresolvedReference {
        component: String,
        name: String,
        short_name: String,
        kind: ReferenceKind,
        requested_type: Option<String>,
        scopes: Vec<String>,
        reason: String,
    },

    /// A template was selected (or searched for) but could not be instantiated.
    #[error(
        "Provisioning failed for '{name}' of type '{}' requested by '{origin}': {reason}",
        display_type(requested_type)
    )]
    ProvisioningFailure {
        origin: String,
        name: String,
        requested_type: Option<String>,
        reason: String,
    },

    /// A closed loop in the component ordering graph.
    #[error("Circular dependency between components: {}", format_cycle(members))]
    DependencyCycle { members: Vec<String> },

    /// Two items of the same kind share an identifier in one scope.
    #[error("Duplicate {what} identifier '{id}' in {scope}")]
    DuplicateIdentifier {
        what: String,
        id: String,
        scope: String,
    },

    /// A structurally malformed reference.
    #[error("Invalid reference '{name}' in '{component}': {reason}")]
    InvalidReference {
        component: String,
        name: String,
        reason: String,
    },

    /// No usable container exists and none may be created.
    #[error(
        "No {container_type} container available for '{component}'{}: {reason}",
        requested.as_deref().map(|r| format!(" (requested '{}')", r)).unwrap_or_default()
    )]
    MissingContainer {
        component: String,
        container_type: String,
        requested: Option<String>,
        reason: String,
    },
}

fn display_type(requested_type: &Option<String>) -> &str {
    requested_type.as_deref().unwrap_or("<any>")
}

fn format_cycle(members: &[String]) -> String {
    let mut path = members.to_vec();
    if let Some(first) = members.first() {
        path.push(first.clone());
    }
    path.join(" -> ")
}

impl LinkError {
    /// Stable error code for reporting.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AmbiguousReference { .. } => "AMBIGUOUS_REFERENCE",
            Self::UnresolvedReference { .. } => "UNRESOLVED_REFERENCE",
            Self::ProvisioningFailure { .. } => "PROVISIONING_FAILURE",
            Self::DependencyCycle { .. } => "DEPENDENCY_CYCLE",
            Self::DuplicateIdentifier { .. } => "DUPLICATE_IDENTIFIER",
            Self::InvalidReference { .. } => "INVALID_REFERENCE",
            Self::MissingContainer { .. } => "MISSING_CONTAINER",
        }
    }

    /// Whether an optional reference may absorb this error as a diagnostic.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::UnresolvedReference { .. })
    }

    pub(crate) fn duplicate(what: &str, id: &str, scope: impl ToString) -> Self {
        Self::DuplicateIdentifier {
            what: what.to_string(),
            id: id.to_string(),
            scope: scope.to_string(),
        }
    }
}

pub type LinkResult<T> = Result<T, LinkError>;
