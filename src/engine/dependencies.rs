//! Static template references.
//!
//! Tera validates `extends` parents and macro imports when a template is added, so
//! referenced templates must be loaded first. Only literal names are found; a
//! reference built from a variable is resolved at render time or not at all.

use regex::Regex;
use std::sync::LazyLock;

static REFERENCE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"\{%-?\s*(extends|include|import)\s+(?:"([^"]+)"|'([^']+)')"#).ok()
});

/// How a template refers to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Extends,
    Include,
    Import,
}

impl ReferenceKind {
    /// Whether the parent must exist for the referencing template to load.
    pub fn is_required(self) -> bool {
        !matches!(self, Self::Include)
    }
}

/// A referenced template name with its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub kind: ReferenceKind,
    pub name: String,
}

/// Referenced template names in source order, first occurrence only.
pub fn referenced_templates(source: &str) -> Vec<Reference> {
    let Some(re) = REFERENCE.as_ref() else {
        return Vec::new();
    };

    let mut out: Vec<Reference> = Vec::new();
    for caps in re.captures_iter(source) {
        let kind = match &caps[1] {
            "extends" => ReferenceKind::Extends,
            "import" => ReferenceKind::Import,
            _ => ReferenceKind::Include,
        };
        let Some(name) = caps.get(2).or_else(|| caps.get(3)).map(|m| m.as_str().to_string()) else {
            continue;
        };
        if !out.iter().any(|r| r.name == name) {
            out.push(Reference {
                kind,
                name,
            });
        }
    }
    out
}
