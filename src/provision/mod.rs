//! Auto-Provisioner
//!
//! Synthesizes a resource instance from a template when resolution finds
//! nothing. New instances land in the application catalog only; the global
//! scope is never touched by a deployment.

pub mod templates;

use deploy_types::{Properties, ReferenceKind, ResourceInstance, ResourceTemplate};
use tracing::info;

use crate::catalog::{ResourceOrigin, ScopeLevel};
use crate::error::{LinkError, LinkResult};
use crate::names::{same_id, short_name};
use crate::resolver::ResourceRequest;
use crate::session::{LinkSession, LinkTarget};

pub use templates::{TemplateRegistry, MESSAGE_LISTENER_INTERFACE};

/// Property set on provisioned resource-env instances.
pub const DESTINATION_PROPERTY: &str = "destination";

pub struct AutoProvisioner<'s, 'g> {
    session: &'s mut LinkSession<'g>,
}

impl<'s, 'g> AutoProvisioner<'s, 'g> {
    pub fn new(session: &'s mut LinkSession<'g>) -> Self {
        Self { session }
    }

    /// Provision a resource for an unmatched request.
    pub fn provision_resource(
        &mut self,
        module_id: Option<&str>,
        request: &ResourceRequest<'_>,
    ) -> LinkResult<LinkTarget> {
        let normalized = self.session.rules.normalize(request.lookup_name());
        let templates = self.session.templates;
        let Some(template) = templates.select_resource(&normalized, request.requested_type) else {
            let reason = match request.requested_type {
                Some(_) => "no template produces the requested type",
                None => "no type requested and no template matches the name",
            };
            return Err(self.session.unresolved(module_id, request, reason));
        };

        self.instantiate(module_id, request, template, &template.id, Properties::new())
    }

    /// Provision a resource-env instance named after the reference.
    pub fn provision_env(
        &mut self,
        module_id: Option<&str>,
        request: &ResourceRequest<'_>,
        template: &ResourceTemplate,
    ) -> LinkResult<LinkTarget> {
        let normalized = self.session.rules.normalize(request.lookup_name());
        let mut extra = Properties::new();
        extra.insert(DESTINATION_PROPERTY.to_string(), normalized.clone());
        self.instantiate(module_id, request, template, &normalized, extra)
    }

    fn instantiate(
        &mut self,
        module_id: Option<&str>,
        request: &ResourceRequest<'_>,
        template: &ResourceTemplate,
        base_id: &str,
        extra: Properties,
    ) -> LinkResult<LinkTarget> {
        let resource_type = match request.requested_type {
            Some(t) if template.produces(t) => t.to_string(),
            _ => match template.primary_type() {
                Some(t) => t.to_string(),
                None => {
                    return Err(failure(request, format!("template '{}' declares no type", template.id)));
                }
            },
        };

        let mut properties = template.properties.clone();
        properties.extend(extra);
        if let Some(overrides) = request.overrides {
            properties.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let origin = request.origin;
        with_template(self.session, template, request, |session| {
            resolve_nested(session, module_id, origin, template, &mut properties)
        })?;

        let id = self.session.free_id(base_id);
        let instance = ResourceInstance {
            id: id.clone(),
            resource_type: resource_type.clone(),
            properties,
        };
        self.session.scope.resources.register(
            instance,
            ResourceOrigin::Provisioned {
                template: template.id.clone(),
                origin: origin.to_string(),
            },
        )?;

        let normalized = self.session.rules.normalize(request.lookup_name());
        let alias = short_name(&normalized);
        if !same_id(alias, &id) {
            self.session.scope.resources.add_alias(&id, alias);
        }

        info!(
            origin,
            id = %id,
            resource_type = %resource_type,
            template = %template.id,
            "Auto-provisioned resource"
        );

        Ok(LinkTarget::Catalog {
            id,
            scope: ScopeLevel::Application,
        })
    }
}

/// Run `f` with `template` pushed on the provisioning stack.
///
/// A template already on the stack is a nesting cycle.
pub(crate) fn with_template<T>(
    session: &mut LinkSession<'_>,
    template: &ResourceTemplate,
    request: &ResourceRequest<'_>,
    f: impl FnOnce(&mut LinkSession<'_>) -> LinkResult<T>,
) -> LinkResult<T> {
    if session.provisioning.iter().any(|t| same_id(t, &template.id)) {
        let mut chain = session.provisioning.clone();
        chain.push(template.id.clone());
        return Err(failure(
            request,
            format!("template nesting cycle: {}", chain.join(" -> ")),
        ));
    }

    session.provisioning.push(template.id.clone());
    let result = f(session);
    session.provisioning.pop();
    result
}

/// Resolve the nested references of a template into `properties`.
///
/// An overridden property value replaces the template's default name. Inner
/// provisioning failures propagate unchanged; anything else is wrapped with
/// the template and property it came from.
pub(crate) fn resolve_nested(
    session: &mut LinkSession<'_>,
    module_id: Option<&str>,
    origin: &str,
    template: &ResourceTemplate,
    properties: &mut Properties,
) -> LinkResult<()> {
    for nested in &template.references {
        let name = properties
            .get(&nested.property)
            .cloned()
            .unwrap_or_else(|| nested.name.clone());
        let request = ResourceRequest::new(origin, &name, ReferenceKind::Resource)
            .with_type(nested.requested_type.as_deref());

        match session.link_resource(module_id, &request) {
            Ok(target) => {
                properties.insert(nested.property.clone(), target.id().to_string());
            }
            Err(err @ LinkError::ProvisioningFailure { .. }) => return Err(err),
            Err(err) => {
                return Err(LinkError::ProvisioningFailure {
                    origin: origin.to_string(),
                    name: template.id.clone(),
                    requested_type: template.primary_type().map(str::to_string),
                    reason: format!(
                        "nested reference '{}' (property '{}'): {}",
                        name, nested.property, err
                    ),
                });
            }
        }
    }
    Ok(())
}

fn failure(request: &ResourceRequest<'_>, reason: String) -> LinkError {
    LinkError::ProvisioningFailure {
        origin: request.origin.to_string(),
        name: request.name.to_string(),
        requested_type: request.requested_type.map(str::to_string),
        reason,
    }
}
