//! Per-application linking session.
//!
//! Owns the application's catalogs for the duration of one link and
//! sequences resolve → provision → re-resolve. Nothing here is shared
//! between applications except the read-only global scope and templates.

use deploy_types::{LinkPolicy, ReferenceKind, TemplateKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::ScopeLevel;
use crate::config::LinkerSettings;
use crate::error::{LinkError, LinkResult};
use crate::names::{short_name, NameRules};
use crate::provision::{AutoProvisioner, TemplateRegistry};
use crate::resolver::{Resolution, ResourceRequest, ScopeChainResolver};
use crate::scope::{ApplicationScope, GlobalScope, ScopeChain};

/// Final target of a linked resource reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkTarget {
    Catalog { id: String, scope: ScopeLevel },
    External(String),
}

impl LinkTarget {
    pub fn id(&self) -> &str {
        match self {
            LinkTarget::Catalog { id, .. } => id,
            LinkTarget::External(target) => target,
        }
    }
}

pub struct LinkSession<'g> {
    pub(crate) scope: ApplicationScope,
    pub(crate) global: &'g GlobalScope,
    pub(crate) templates: &'g TemplateRegistry,
    pub(crate) rules: &'g NameRules,
    pub(crate) settings: &'g LinkerSettings,
    /// Template ids currently being instantiated, outermost first.
    pub(crate) provisioning: Vec<String>,
}

impl<'g> LinkSession<'g> {
    pub fn new(
        scope: ApplicationScope,
        global: &'g GlobalScope,
        templates: &'g TemplateRegistry,
        rules: &'g NameRules,
        settings: &'g LinkerSettings,
    ) -> Self {
        Self {
            scope,
            global,
            templates,
            rules,
            settings,
            provisioning: Vec::new(),
        }
    }

    pub fn policy(&self) -> LinkPolicy {
        self.settings.policy
    }

    pub fn app_id(&self) -> &str {
        &self.scope.app_id
    }

    pub fn chain(&self, module_id: Option<&str>) -> ScopeChain<'_> {
        self.scope.chain(module_id, self.global)
    }

    /// Hand back the catalogs once linking is complete.
    pub fn into_scope(self) -> ApplicationScope {
        self.scope
    }

    /// Resolve a resource or resource-env request, provisioning on a miss
    /// when policy allows.
    pub fn link_resource(
        &mut self,
        module_id: Option<&str>,
        request: &ResourceRequest<'_>,
    ) -> LinkResult<LinkTarget> {
        let resolution = {
            let chain = self.chain(module_id);
            ScopeChainResolver::new(self.rules, &self.scope.app_id).resolve(&chain, request)?
        };

        match resolution {
            Resolution::Resolved(target) => Ok(LinkTarget::Catalog {
                id: target.id,
                scope: target.scope,
            }),
            Resolution::External(target) => Ok(LinkTarget::External(target)),
            Resolution::NoMatch if request.kind == ReferenceKind::ResourceEnv => {
                self.link_resource_env(module_id, request)
            }
            Resolution::NoMatch => {
                if !self.policy().auto_create_resources {
                    return Err(self.unresolved(module_id, request, "auto-provisioning disabled"));
                }
                AutoProvisioner::new(self).provision_resource(module_id, request)
            }
        }
    }

    /// Resource-env miss: provision from a template producing the type, else
    /// fall back to the only visible instance of the type.
    fn link_resource_env(
        &mut self,
        module_id: Option<&str>,
        request: &ResourceRequest<'_>,
    ) -> LinkResult<LinkTarget> {
        let templates = self.templates;
        if self.policy().auto_create_resources {
            if let Some(template) = request
                .requested_type
                .and_then(|t| templates.first_producing(t, TemplateKind::Resource))
            {
                return AutoProvisioner::new(self).provision_env(module_id, request, template);
            }
        }

        let unique = {
            let chain = self.chain(module_id);
            ScopeChainResolver::new(self.rules, &self.scope.app_id).unique_of_type(&chain, request)?
        };
        match unique {
            Some(target) => {
                debug!(
                    origin = request.origin,
                    name = request.name,
                    id = %target.id,
                    "Resource-env reference linked to only instance of its type"
                );
                Ok(LinkTarget::Catalog {
                    id: target.id,
                    scope: target.scope,
                })
            }
            None => {
                let reason = if self.policy().auto_create_resources {
                    "no template produces the requested type"
                } else {
                    "auto-provisioning disabled"
                };
                Err(self.unresolved(module_id, request, reason))
            }
        }
    }

    /// First free id derived from `base`: `base`, `base-2`, `base-3`, ...
    ///
    /// Every module catalog counts, not only the requesting module's chain:
    /// provisioned instances land in the flat plan next to all of them.
    pub(crate) fn free_id(&self, base: &str) -> String {
        let taken = |id: &str| self.scope.is_id_taken(id, self.global);
        if !taken(base) {
            return base.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}-{}", base, n);
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    pub(crate) fn unresolved(
        &self,
        module_id: Option<&str>,
        request: &ResourceRequest<'_>,
        reason: &str,
    ) -> LinkError {
        let normalized = self.rules.normalize(request.lookup_name());
        LinkError::UnresolvedReference {
            component: request.origin.to_string(),
            name: request.name.to_string(),
            short_name: short_name(&normalized).to_string(),
            kind: request.kind,
            requested_type: request.requested_type.map(str::to_string),
            scopes: self.chain(module_id).describe(),
            reason: reason.to_string(),
        }
    }
}
