//! Message destinations.
//!
//! A logical destination declared by a module is backed by a physical
//! resource-env instance (queue or topic). Message-driven components and
//! message-destination references both end up linked to that instance.

use deploy_types::{Component, ComponentKind, MessageDestination, Module, Properties, Reference, ReferenceKind};
use tracing::info;

use crate::error::{LinkError, LinkResult};
use crate::names::short_name;
use crate::plan::{PlanDestination, ReferenceState};
use crate::resolver::{LinkOutcome, ResourceRequest};
use crate::session::LinkTarget;

use super::{explicit_link, ApplicationLinker};

/// Activation property carrying the physical destination id.
pub const DESTINATION: &str = "destination";
pub const DESTINATION_TYPE: &str = "destinationType";
pub const CLIENT_ID: &str = "clientId";
pub const SUBSCRIPTION_NAME: &str = "subscriptionName";

#[derive(Debug, Clone)]
pub(crate) struct DestinationDecl {
    pub module_id: String,
    pub name: String,
    pub mapped_name: Option<String>,
    pub destination_type: Option<String>,
}

impl DestinationDecl {
    pub fn new(module: &Module, destination: &MessageDestination) -> Self {
        Self {
            module_id: module.id.clone(),
            name: destination.name.clone(),
            mapped_name: destination.mapped_name.clone(),
            destination_type: destination.destination_type.clone(),
        }
    }
}

impl<'a, 'g> ApplicationLinker<'a, 'g> {
    /// Link a message-destination reference to its physical destination.
    ///
    /// Without an explicit link the reference name is tried as a destination
    /// name; an undeclared name is used as the physical id directly.
    pub(super) fn link_destination_ref(
        &mut self,
        module: &Module,
        origin: &str,
        reference: &Reference,
    ) -> LinkResult<ReferenceState> {
        let rules = self.session.rules;
        let normalized = rules.normalize(&reference.name);

        let decl = match explicit_link(rules, reference) {
            Some(link) => Some(self.lookup_destination(&module.id, origin, &reference.name, link)?),
            None => match self.lookup_destination(&module.id, origin, &reference.name, &normalized) {
                Ok(decl) => Some(decl),
                Err(err) if err.is_not_found() => None,
                Err(err) => return Err(err),
            },
        };

        let physical = decl
            .as_ref()
            .map(|d| d.mapped_name.clone().unwrap_or_else(|| d.name.clone()))
            .unwrap_or_else(|| normalized.clone());
        let destination_type = reference
            .requested_type
            .clone()
            .or_else(|| decl.as_ref().and_then(|d| d.destination_type.clone()))
            .unwrap_or_else(|| self.guess_destination_type(decl.as_ref(), &physical));

        let target = self.link_physical(
            &module.id,
            origin,
            &physical,
            &destination_type,
            Some(&reference.properties),
        )?;
        if let Some(decl) = &decl {
            self.record_destination(decl, &target, &destination_type);
        }
        Ok(target.into())
    }

    /// Link a message-driven component's destination and fill in its
    /// activation properties.
    ///
    /// The physical id is the destination's mapped name, else the
    /// `destination` activation property, else the destination name.
    /// Components with neither a link nor a `destination` property are left
    /// alone.
    pub(super) fn link_message_driven(
        &mut self,
        module: &Module,
        component: &Component,
        activation: &mut Properties,
    ) -> LinkResult<()> {
        let ComponentKind::MessageDriven { .. } = &component.kind else {
            return Ok(());
        };
        let origin = component.id();

        let decl = match component.destination_link.as_deref() {
            Some(link) => Some(self.lookup_destination(&module.id, origin, link, link)?),
            None => None,
        };

        let physical = decl
            .as_ref()
            .and_then(|d| d.mapped_name.clone())
            .or_else(|| activation.get(DESTINATION).cloned())
            .or_else(|| decl.as_ref().map(|d| d.name.clone()));
        let Some(physical) = physical else {
            return Ok(());
        };

        let destination_type = component
            .destination_type
            .clone()
            .or_else(|| activation.get(DESTINATION_TYPE).cloned())
            .or_else(|| decl.as_ref().and_then(|d| d.destination_type.clone()))
            .unwrap_or_else(|| self.guess_destination_type(decl.as_ref(), &physical));

        let target = self.link_physical(&module.id, origin, &physical, &destination_type, None)?;

        activation.insert(DESTINATION.to_string(), target.id().to_string());
        activation.insert(DESTINATION_TYPE.to_string(), destination_type.clone());
        if destination_type == self.session.settings.topic_type {
            activation
                .entry(CLIENT_ID.to_string())
                .or_insert_with(|| origin.to_string());
            activation
                .entry(SUBSCRIPTION_NAME.to_string())
                .or_insert_with(|| origin.to_string());
        }

        info!(
            component = origin,
            destination = target.id(),
            destination_type = %destination_type,
            "Linked message-driven component to destination"
        );

        if let Some(decl) = &decl {
            self.record_destination(decl, &target, &destination_type);
        }
        Ok(())
    }

    fn lookup_destination(
        &self,
        module_id: &str,
        origin: &str,
        name: &str,
        link: &str,
    ) -> LinkResult<DestinationDecl> {
        match self.destinations.resolve(module_id, link) {
            LinkOutcome::Found(decl) => Ok(decl.clone()),
            LinkOutcome::Ambiguous(candidates) => Err(LinkError::AmbiguousReference {
                component: origin.to_string(),
                name: name.to_string(),
                kind: ReferenceKind::MessageDestination,
                scope: "application".to_string(),
                candidates: candidates
                    .iter()
                    .map(|d| format!("{}#{}", d.module_id, d.name))
                    .collect(),
            }),
            LinkOutcome::Missing => Err(LinkError::UnresolvedReference {
                component: origin.to_string(),
                name: name.to_string(),
                short_name: short_name(link).to_string(),
                kind: ReferenceKind::MessageDestination,
                requested_type: None,
                scopes: vec![format!("module '{}'", module_id), "application".to_string()],
                reason: format!("no message destination named '{}'", link),
            }),
        }
    }

    /// Names mentioning "topic" are topics; everything else is a queue.
    fn guess_destination_type(&self, decl: Option<&DestinationDecl>, physical: &str) -> String {
        let settings = self.session.settings;
        let looks_like_topic = decl
            .map(|d| d.name.as_str())
            .into_iter()
            .chain([physical])
            .any(|n| n.to_lowercase().contains("topic"));
        if looks_like_topic {
            settings.topic_type.clone()
        } else {
            settings.queue_type.clone()
        }
    }

    fn link_physical(
        &mut self,
        module_id: &str,
        origin: &str,
        physical: &str,
        destination_type: &str,
        overrides: Option<&Properties>,
    ) -> LinkResult<LinkTarget> {
        let mut request = ResourceRequest::new(origin, physical, ReferenceKind::ResourceEnv)
            .with_type(Some(destination_type));
        request.overrides = overrides;
        self.session.link_resource(Some(module_id), &request)
    }

    fn record_destination(&mut self, decl: &DestinationDecl, target: &LinkTarget, destination_type: &str) {
        let key = format!("{}#{}", decl.module_id, decl.name);
        self.linked_destinations
            .entry(key)
            .or_insert_with(|| PlanDestination {
                module_id: decl.module_id.clone(),
                name: decl.name.clone(),
                physical_id: target.id().to_string(),
                destination_type: destination_type.to_string(),
            });
    }
}
