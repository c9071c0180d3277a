//! Scope Chain Resolver
//!
//! Turns one resource request into exactly one of: a resolved catalog id,
//! an external pass-through target, or "no match" (the caller decides
//! whether to provision). Ambiguity is always a hard failure.
//!
//! Search order, first success wins:
//!
//! 1. explicit target with an external scheme → pass through
//! 2. container-provided type → `container:<type>`
//! 3. exact id (case-insensitive), module → application → global
//! 4. qualified names only: the suffix after the last `/` as an exact id or alias,
//!    same scope order
//! 5. steps 3-4 again without the type filter
//! 6. uniqueness fallback: the only visible instance of the requested type
//!
//! Within one scope more than one match is ambiguous; across scopes the
//! narrowest scope wins.

pub mod links;

use deploy_types::{Properties, Reference, ReferenceKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{CatalogEntry, ScopeLevel};
use crate::error::{LinkError, LinkResult};
use crate::names::{is_qualified, short_name, strip_app_prefix, NameRules};
use crate::scope::ScopeChain;

pub use links::{LinkIndex, LinkOutcome};

// ============================================================================
// REQUEST / RESULT TYPES
// ============================================================================

/// A borrowed view of what is being resolved.
#[derive(Debug, Clone, Copy)]
pub struct ResourceRequest<'r> {
    /// Requesting component id (or template label for nested references).
    pub origin: &'r str,
    pub name: &'r str,
    pub kind: ReferenceKind,
    pub requested_type: Option<&'r str>,
    pub link: Option<&'r str>,
    pub target: Option<&'r str>,
    /// Overrides applied if this request ends in provisioning.
    pub overrides: Option<&'r Properties>,
}

impl<'r> ResourceRequest<'r> {
    pub fn new(origin: &'r str, name: &'r str, kind: ReferenceKind) -> Self {
        Self {
            origin,
            name,
            kind,
            requested_type: None,
            link: None,
            target: None,
            overrides: None,
        }
    }

    pub fn from_reference(origin: &'r str, reference: &'r Reference) -> Self {
        Self {
            origin,
            name: &reference.name,
            kind: reference.kind,
            requested_type: reference.requested_type.as_deref(),
            link: reference.explicit_link.as_deref().filter(|s| !s.is_empty()),
            target: reference.explicit_target.as_deref().filter(|s| !s.is_empty()),
            overrides: Some(&reference.properties),
        }
    }

    pub fn with_type(mut self, requested_type: Option<&'r str>) -> Self {
        self.requested_type = requested_type;
        self
    }

    pub fn with_overrides(mut self, overrides: &'r Properties) -> Self {
        self.overrides = Some(overrides);
        self
    }

    /// Whether the request names its target explicitly.
    pub fn is_explicit(&self) -> bool {
        self.link.is_some() || self.target.is_some()
    }

    /// The name lookups start from.
    pub fn lookup_name(&self) -> &'r str {
        self.target.or(self.link).unwrap_or(self.name)
    }
}

/// Which search step produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStep {
    ExactId,
    ShortName,
    CrossTypeExactId,
    CrossTypeShortName,
    Uniqueness,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub id: String,
    pub scope: ScopeLevel,
    pub step: MatchStep,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ResolvedTarget),
    External(String),
    NoMatch,
}

// ============================================================================
// RESOLVER
// ============================================================================

pub struct ScopeChainResolver<'a> {
    rules: &'a NameRules,
    app_id: &'a str,
}

impl<'a> ScopeChainResolver<'a> {
    pub fn new(rules: &'a NameRules, app_id: &'a str) -> Self {
        Self { rules, app_id }
    }

    /// Resolve a resource or resource-env request against a chain.
    pub fn resolve(&self, chain: &ScopeChain<'_>, request: &ResourceRequest<'_>) -> LinkResult<Resolution> {
        if let Some(target) = request.target {
            if self.rules.is_external(target) {
                debug!(origin = request.origin, target, "External target passed through");
                return Ok(Resolution::External(target.to_string()));
            }
        }

        if let Some(t) = request.requested_type {
            if self.rules.is_ignored_type(t) {
                return Ok(Resolution::External(format!("container:{}", t)));
            }
        }

        let normalized = self.rules.normalize(request.lookup_name());
        let candidates = self.candidate_names(request, &normalized);
        let short = is_qualified(&normalized).then(|| short_name(&normalized));

        let mut filters = vec![request.requested_type];
        if request.requested_type.is_some() {
            filters.push(None);
        }

        for (pass, type_filter) in filters.into_iter().enumerate() {
            let cross = pass > 0;

            for catalog in chain.levels() {
                for name in &candidates {
                    let matches = catalog.find_by_id(name, type_filter);
                    if !matches.is_empty() {
                        let step = if cross { MatchStep::CrossTypeExactId } else { MatchStep::ExactId };
                        return self.pick(request, catalog.scope(), matches, step);
                    }
                }
            }

            // Resource-env references are matched by exact id only.
            let Some(short) = short.filter(|_| request.kind != ReferenceKind::ResourceEnv) else {
                continue;
            };

            for catalog in chain.levels() {
                let matches = catalog.find_by_id(short, type_filter);
                if !matches.is_empty() {
                    let step = if cross {
                        MatchStep::CrossTypeShortName
                    } else {
                        MatchStep::ShortName
                    };
                    return self.pick(request, catalog.scope(), matches, step);
                }
            }
        }

        if request.kind != ReferenceKind::ResourceEnv && !request.is_explicit() {
            if let Some(resolved) = self.unique_of_type(chain, request)? {
                return Ok(Resolution::Resolved(resolved));
            }
        }

        debug!(origin = request.origin, name = request.name, "No catalog match");
        Ok(Resolution::NoMatch)
    }

    /// The single visible instance of the requested type, if there is one.
    ///
    /// Counts across every catalog in the chain. More than one candidate is
    /// an [`LinkError::AmbiguousReference`].
    pub fn unique_of_type(
        &self,
        chain: &ScopeChain<'_>,
        request: &ResourceRequest<'_>,
    ) -> LinkResult<Option<ResolvedTarget>> {
        let Some(requested_type) = request.requested_type else {
            return Ok(None);
        };

        let found: Vec<(&ScopeLevel, &CatalogEntry)> = chain
            .levels()
            .flat_map(|c| c.of_type(requested_type).map(move |e| (c.scope(), e)))
            .collect();

        match found.as_slice() {
            [] => Ok(None),
            [(scope, entry)] => {
                debug!(
                    origin = request.origin,
                    name = request.name,
                    id = entry.id(),
                    "Matched only instance of requested type"
                );
                Ok(Some(ResolvedTarget {
                    id: entry.id().to_string(),
                    scope: (*scope).clone(),
                    step: MatchStep::Uniqueness,
                }))
            }
            _ => Err(LinkError::AmbiguousReference {
                component: request.origin.to_string(),
                name: request.name.to_string(),
                kind: request.kind,
                scope: chain.describe().join(", "),
                candidates: found.iter().map(|(_, e)| e.id().to_string()).collect(),
            }),
        }
    }

    /// Names tried for exact matching, in order.
    ///
    /// Implicit requests try the component-qualified form first so that
    /// `<component>/<name>` declarations win over the plain name.
    fn candidate_names(&self, request: &ResourceRequest<'_>, normalized: &str) -> Vec<String> {
        let mut names = Vec::with_capacity(3);
        if !request.is_explicit() {
            names.push(format!("{}/{}", request.origin, normalized));
        }
        names.push(normalized.to_string());
        if let Some(stripped) = strip_app_prefix(normalized, self.app_id) {
            names.push(stripped.to_string());
        }
        names
    }

    fn pick(
        &self,
        request: &ResourceRequest<'_>,
        scope: &ScopeLevel,
        matches: Vec<&CatalogEntry>,
        step: MatchStep,
    ) -> LinkResult<Resolution> {
        if matches.len() > 1 {
            return Err(LinkError::AmbiguousReference {
                component: request.origin.to_string(),
                name: request.name.to_string(),
                kind: request.kind,
                scope: scope.to_string(),
                candidates: matches.iter().map(|e| e.id().to_string()).collect(),
            });
        }
        let entry = matches[0];
        debug!(
            origin = request.origin,
            name = request.name,
            id = entry.id(),
            %scope,
            ?step,
            "Reference matched"
        );
        Ok(Resolution::Resolved(ResolvedTarget {
            id: entry.id().to_string(),
            scope: scope.clone(),
            step,
        }))
    }
}
