//! Reference name normalization.
//!
//! Names arrive in whatever namespace form the declaring collaborator used
//! (`java:comp/env/jdbc/orders`, `openejb/Resource/orders`, ...). Matching is
//! done on the normalized form and, failing that, on the short name: the part
//! after the final `/`.

use std::collections::BTreeSet;

use crate::config::LinkerSettings;

/// Separator between namespace segments of a reference name.
pub const SEPARATOR: char = '/';

/// Name rules derived from [`LinkerSettings`].
#[derive(Debug, Clone)]
pub struct NameRules {
    strip_prefixes: Vec<String>,
    external_schemes: Vec<String>,
    ignored_types: BTreeSet<String>,
}

impl Default for NameRules {
    fn default() -> Self {
        Self::from_settings(&LinkerSettings::default())
    }
}

impl NameRules {
    pub fn from_settings(settings: &LinkerSettings) -> Self {
        Self {
            strip_prefixes: settings.strip_prefixes.clone(),
            external_schemes: settings.external_schemes.clone(),
            ignored_types: settings.ignored_reference_types.iter().cloned().collect(),
        }
    }

    /// Strip conventional namespace prefixes.
    ///
    /// Prefixes are applied in configured order, each at most once. A leading
    /// `/` left behind by a scheme prefix is dropped as well.
    pub fn normalize(&self, name: &str) -> String {
        let mut rest = name.trim();
        for prefix in &self.strip_prefixes {
            if let Some(stripped) = rest.strip_prefix(prefix.as_str()) {
                rest = stripped.trim_start_matches(SEPARATOR);
            }
        }
        rest.to_string()
    }

    /// Whether a target uses an opaque external scheme.
    pub fn is_external(&self, target: &str) -> bool {
        self.external_schemes
            .iter()
            .any(|scheme| target.starts_with(scheme.as_str()))
    }

    /// Whether references of this type are injected by the runtime itself.
    pub fn is_ignored_type(&self, requested_type: &str) -> bool {
        self.ignored_types.contains(requested_type)
    }
}

/// Everything after the final separator.
pub fn short_name(name: &str) -> &str {
    match name.rfind(SEPARATOR) {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

/// Whether the name has more than one segment.
pub fn is_qualified(name: &str) -> bool {
    name.contains(SEPARATOR)
}

/// Strip a leading `<app_id>/` segment.
pub fn strip_app_prefix<'a>(name: &'a str, app_id: &str) -> Option<&'a str> {
    if app_id.is_empty() {
        return None;
    }
    name.strip_prefix(app_id)
        .and_then(|rest| rest.strip_prefix(SEPARATOR))
        .filter(|rest| !rest.is_empty())
}

/// Case-insensitive identifier comparison.
pub fn same_id(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_environment_prefixes() {
        let rules = NameRules::default();
        assert_eq!(rules.normalize("java:comp/env/jdbc/orders"), "jdbc/orders");
        assert_eq!(rules.normalize("java:/comp/env/jdbc/orders"), "jdbc/orders");
        assert_eq!(rules.normalize("openejb/Resource/OrdersDS"), "OrdersDS");
        assert_eq!(rules.normalize("java:openejb/Connector/RA"), "RA");
        assert_eq!(rules.normalize("jdbc/orders"), "jdbc/orders");
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("jdbc/orders"), "orders");
        assert_eq!(short_name("a/b/c"), "c");
        assert_eq!(short_name("orders"), "orders");
        assert!(is_qualified("jdbc/orders"));
        assert!(!is_qualified("orders"));
    }

    #[test]
    fn test_external_schemes() {
        let rules = NameRules::default();
        assert!(rules.is_external("external:ldap/users"));
        assert!(rules.is_external("jndi:java:global/x"));
        assert!(!rules.is_external("jdbc/users"));
    }

    #[test]
    fn test_strip_app_prefix() {
        assert_eq!(strip_app_prefix("shop/jdbc/db", "shop"), Some("jdbc/db"));
        assert_eq!(strip_app_prefix("shopping/db", "shop"), None);
        assert_eq!(strip_app_prefix("shop/", "shop"), None);
        assert_eq!(strip_app_prefix("db", ""), None);
    }

    #[test]
    fn test_ignored_types() {
        let rules = NameRules::default();
        assert!(rules.is_ignored_type("jakarta.ejb.SessionContext"));
        assert!(!rules.is_ignored_type("DataSource"));
    }
}
