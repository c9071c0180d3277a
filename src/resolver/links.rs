//! Symbolic links between declarations of one application.
//!
//! A link is either a plain name, looked up in the requesting module first
//! and then application-wide, or `module#name`, where the module part is
//! matched against module ids by path suffix (`../orders.jar#OrderBean`).

/// Separator between module path and name in a qualified link.
pub const LINK_SEPARATOR: char = '#';

#[derive(Debug, Clone)]
struct LinkEntry<T> {
    module_id: String,
    name: String,
    value: T,
}

#[derive(Debug, PartialEq, Eq)]
pub enum LinkOutcome<'a, T> {
    Found(&'a T),
    Ambiguous(Vec<&'a T>),
    Missing,
}

impl<'a, T> LinkOutcome<'a, T> {
    fn from_matches(matches: Vec<&'a T>) -> Self {
        match matches.len() {
            0 => LinkOutcome::Missing,
            1 => LinkOutcome::Found(matches[0]),
            _ => LinkOutcome::Ambiguous(matches),
        }
    }
}

/// Named declarations of one kind across every module of an application.
#[derive(Debug, Clone)]
pub struct LinkIndex<T> {
    entries: Vec<LinkEntry<T>>,
}

impl<T> Default for LinkIndex<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> LinkIndex<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, module_id: impl Into<String>, name: impl Into<String>, value: T) {
        self.entries.push(LinkEntry {
            module_id: module_id.into(),
            name: name.into(),
            value,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|e| &e.value)
    }

    /// Resolve a link as seen from `from_module`.
    pub fn resolve(&self, from_module: &str, link: &str) -> LinkOutcome<'_, T> {
        if let Some((path, name)) = link.split_once(LINK_SEPARATOR) {
            let path = normalize_module_path(path);
            let matches = self
                .entries
                .iter()
                .filter(|e| e.name == name && module_matches(&e.module_id, path))
                .map(|e| &e.value)
                .collect();
            return LinkOutcome::from_matches(matches);
        }

        let local: Vec<&T> = self
            .entries
            .iter()
            .filter(|e| e.name == link && e.module_id == from_module)
            .map(|e| &e.value)
            .collect();
        if !local.is_empty() {
            return LinkOutcome::from_matches(local);
        }

        let matches = self
            .entries
            .iter()
            .filter(|e| e.name == link)
            .map(|e| &e.value)
            .collect();
        LinkOutcome::from_matches(matches)
    }

    /// Entries satisfying a predicate, application-wide.
    pub fn find_where<F>(&self, predicate: F) -> LinkOutcome<'_, T>
    where
        F: Fn(&T) -> bool,
    {
        LinkOutcome::from_matches(
            self.entries
                .iter()
                .filter(|e| predicate(&e.value))
                .map(|e| &e.value)
                .collect(),
        )
    }
}

fn normalize_module_path(path: &str) -> &str {
    let mut path = path;
    loop {
        if let Some(rest) = path.strip_prefix("../") {
            path = rest;
        } else if let Some(rest) = path.strip_prefix("./") {
            path = rest;
        } else {
            return path;
        }
    }
}

fn module_matches(module_id: &str, path: &str) -> bool {
    if path.is_empty() {
        return false;
    }
    module_id == path || module_id.ends_with(&format!("/{}", path)) || path.ends_with(&format!("/{}", module_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> LinkIndex<&'static str> {
        let mut idx = LinkIndex::new();
        idx.insert("orders.jar", "OrderBean", "orders/OrderBean");
        idx.insert("billing.jar", "OrderBean", "billing/OrderBean");
        idx.insert("billing.jar", "InvoiceBean", "InvoiceBean");
        idx
    }

    #[test]
    fn test_plain_link_prefers_local_module() {
        let idx = index();
        assert_eq!(
            idx.resolve("orders.jar", "OrderBean"),
            LinkOutcome::Found(&"orders/OrderBean")
        );
        assert_eq!(
            idx.resolve("orders.jar", "InvoiceBean"),
            LinkOutcome::Found(&"InvoiceBean")
        );
    }

    #[test]
    fn test_plain_link_ambiguous_application_wide() {
        let idx = index();
        assert!(matches!(
            idx.resolve("web.war", "OrderBean"),
            LinkOutcome::Ambiguous(v) if v.len() == 2
        ));
    }

    #[test]
    fn test_qualified_link() {
        let idx = index();
        assert_eq!(
            idx.resolve("web.war", "../billing.jar#OrderBean"),
            LinkOutcome::Found(&"billing/OrderBean")
        );
        assert_eq!(idx.resolve("web.war", "missing.jar#OrderBean"), LinkOutcome::Missing);
    }

    #[test]
    fn test_find_where() {
        let idx = index();
        assert_eq!(
            idx.find_where(|v| v.starts_with("billing/")),
            LinkOutcome::Found(&"billing/OrderBean")
        );
        assert!(matches!(
            idx.find_where(|v| v.ends_with("OrderBean")),
            LinkOutcome::Ambiguous(_)
        ));
        assert_eq!(idx.find_where(|v| v.is_empty()), LinkOutcome::Missing);
    }
}
