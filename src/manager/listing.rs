//! Template listing filters.
//!
//! A namespace filter (`admin` or `@admin`) keeps names of that namespace only. A
//! pattern is matched against the name inside the namespace when a namespace is
//! given, otherwise against the full logical name:
//!
//! | Pattern | Match |
//! |---------|-------|
//! | contains `*` or `?` (not only a trailing `*`) | case-insensitive glob |
//! | ends with `*` | case-insensitive prefix |
//! | anything else | case-insensitive equality |

use crate::core::{LogicalName, normalize_namespace};
use glob::{MatchOptions, Pattern};
use serde::Serialize;

/// A listed template with its compile state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateStatus {
    pub name: String,
    pub compiled: bool,
}

/// Result of [`TemplateManager::list_templates`](super::TemplateManager::list_templates).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TemplateListing {
    Names(Vec<String>),
    WithStatus(Vec<TemplateStatus>),
}

impl TemplateListing {
    pub fn len(&self) -> usize {
        match self {
            Self::Names(names) => names.len(),
            Self::WithStatus(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names in listing order, with or without status.
    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::Names(names) => names.iter().map(String::as_str).collect(),
            Self::WithStatus(entries) => entries.iter().map(|e| e.name.as_str()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
enum NamePattern {
    Glob(Pattern),
    Prefix(String),
    Exact(String),
}

impl NamePattern {
    fn parse(pattern: &str) -> Self {
        let head = pattern.strip_suffix('*').unwrap_or(pattern);
        if head.contains(['*', '?']) {
            if let Ok(glob) = Pattern::new(pattern) {
                return Self::Glob(glob);
            }
            tracing::debug!("Invalid glob pattern '{}', matching literally", pattern);
            return Self::Exact(pattern.to_lowercase());
        }
        match pattern.strip_suffix('*') {
            Some(prefix) => Self::Prefix(prefix.to_lowercase()),
            None => Self::Exact(pattern.to_lowercase()),
        }
    }

    fn matches(&self, candidate: &str) -> bool {
        match self {
            Self::Glob(glob) => glob.matches_with(
                candidate,
                MatchOptions {
                    case_sensitive: false,
                    require_literal_separator: false,
                    require_literal_leading_dot: false,
                },
            ),
            Self::Prefix(prefix) => candidate.to_lowercase().starts_with(prefix),
            Self::Exact(exact) => candidate.to_lowercase() == *exact,
        }
    }
}

/// Namespace and pattern filter over logical names.
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    namespace: Option<String>,
    pattern: Option<NamePattern>,
}

impl NameFilter {
    /// Build a filter. Empty namespace or pattern means "no filter".
    pub fn new(namespace: Option<&str>, pattern: Option<&str>) -> Self {
        Self {
            namespace: namespace.and_then(normalize_namespace),
            pattern: pattern.filter(|p| !p.is_empty()).map(NamePattern::parse),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.namespace.is_none() && self.pattern.is_none()
    }

    pub fn matches(&self, logical: &str) -> bool {
        let parsed = LogicalName::parse(logical);
        if let Some(namespace) = &self.namespace
            && parsed.namespace != Some(namespace.as_str())
        {
            return false;
        }
        let Some(pattern) = &self.pattern else {
            return true;
        };
        let candidate = if self.namespace.is_some() { parsed.path } else { logical };
        pattern.matches(candidate)
    }

    /// Names passing the filter, in input order.
    pub fn apply(&self, names: &[String]) -> Vec<String> {
        if self.is_empty() {
            return names.to_vec();
        }
        names.iter().filter(|n| self.matches(n)).cloned().collect()
    }
}
