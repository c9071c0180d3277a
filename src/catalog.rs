//! Arena-style resource catalogs.
//!
//! A [`Catalog`] holds the instances visible at one scope level, keyed by id
//! in registration order. Registration is append-only: ids never change and
//! entries are never removed, so diagnostics can always point at what was
//! registered and by whom.

use std::fmt;

use deploy_types::ResourceInstance;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{LinkError, LinkResult};
use crate::names::same_id;

// ============================================================================
// SCOPE LEVELS
// ============================================================================

/// Visibility boundary a catalog belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeLevel {
    Module(String),
    Application,
    Global,
}

impl fmt::Display for ScopeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeLevel::Module(id) => write!(f, "module '{}'", id),
            ScopeLevel::Application => f.write_str("application"),
            ScopeLevel::Global => f.write_str("global"),
        }
    }
}

/// How an entry came to exist.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceOrigin {
    /// Declared by configuration or by the module graph.
    Declared,
    /// Synthesized from a template on behalf of `origin`.
    Provisioned { template: String, origin: String },
}

// ============================================================================
// CATALOG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub instance: ResourceInstance,
    pub origin: ResourceOrigin,
    /// Extra names this entry answers to (short names of references that
    /// caused it to be provisioned).
    pub aliases: Vec<String>,
}

impl CatalogEntry {
    pub fn id(&self) -> &str {
        &self.instance.id
    }

    pub fn resource_type(&self) -> &str {
        &self.instance.resource_type
    }

    fn has_type(&self, type_filter: Option<&str>) -> bool {
        type_filter.map_or(true, |t| self.instance.resource_type == t)
    }

    fn answers_to(&self, name: &str) -> bool {
        same_id(&self.instance.id, name) || self.aliases.iter().any(|a| same_id(a, name))
    }
}

/// Instances of one kind (resources or containers) at one scope level.
#[derive(Debug, Clone)]
pub struct Catalog {
    scope: ScopeLevel,
    entries: IndexMap<String, CatalogEntry>,
}

impl Catalog {
    pub fn new(scope: ScopeLevel) -> Self {
        Self {
            scope,
            entries: IndexMap::new(),
        }
    }

    pub fn scope(&self) -> &ScopeLevel {
        &self.scope
    }

    /// Append an instance. Ids are unique per catalog, compared
    /// case-insensitively.
    pub fn register(&mut self, instance: ResourceInstance, origin: ResourceOrigin) -> LinkResult<()> {
        if self.is_taken(&instance.id) {
            return Err(LinkError::duplicate("resource", &instance.id, &self.scope));
        }
        self.entries.insert(
            instance.id.clone(),
            CatalogEntry {
                instance,
                origin,
                aliases: Vec::new(),
            },
        );
        Ok(())
    }

    /// Record an additional name for an existing entry. Returns false when
    /// the id is unknown.
    pub fn add_alias(&mut self, id: &str, alias: &str) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                if !entry.answers_to(alias) {
                    entry.aliases.push(alias.to_string());
                }
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries.get(id)
    }

    /// Whether an id is already in use (case-insensitive).
    pub fn is_taken(&self, id: &str) -> bool {
        self.entries.keys().any(|k| same_id(k, id))
    }

    /// Entries whose id or alias equals `name`.
    pub fn find_by_id(&self, name: &str, type_filter: Option<&str>) -> Vec<&CatalogEntry> {
        self.entries
            .values()
            .filter(|e| e.has_type(type_filter) && e.answers_to(name))
            .collect()
    }

    pub fn of_type<'a>(&'a self, resource_type: &'a str) -> impl Iterator<Item = &'a CatalogEntry> + 'a {
        self.entries
            .values()
            .filter(move |e| e.instance.resource_type == resource_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
