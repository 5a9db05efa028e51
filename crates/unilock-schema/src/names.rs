//! Package name canonicalization and dependency key helpers.

use crate::types::CanonicalName;
use pep508_rs::PackageName;
use tracing::debug;

/// Key of the default (main) section aggregator.
pub const DEFAULT_SECTION: &str = "";

/// Key of the development section aggregator.
pub const DEV_SECTION: &str = "[dev]";

/// Normalize a distribution name the way PEP 503 does: lowercase, with
/// every run of `-`, `_` and `.` collapsed into a single `-`.
///
/// Text that is not a valid project name is only lowercased, so the schema
/// check can still report it.
pub fn canonicalize_name(name: &str) -> CanonicalName {
    let name = name.trim();
    match PackageName::new(name.to_owned()) {
        Ok(valid) => CanonicalName::new_unchecked(valid.to_string()),
        Err(e) => {
            debug!("not a project name '{name}': {e}");
            CanonicalName::new_unchecked(name.to_ascii_lowercase())
        }
    }
}

/// Whether `name` is a valid project name already in canonical form.
pub fn is_canonical(name: &str) -> bool {
    PackageName::new(name.to_owned()).is_ok_and(|valid| valid.as_ref() == name)
}

/// Build the alias key `<name>@<ordinal>`.
pub fn alias_key(name: &CanonicalName, ordinal: usize) -> String {
    format!("{name}@{ordinal}")
}

/// Section aggregator key for a group name: `main` is the default section,
/// anything else is wrapped in brackets.
pub fn section_key(group: &str) -> String {
    if group == "main" {
        DEFAULT_SECTION.to_owned()
    } else {
        format!("[{group}]")
    }
}

/// What a key in the `dependencies` map refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind<'a> {
    /// `""` or `"[name]"`.
    Section(&'a str),
    /// A canonical package name.
    Package(&'a str),
    /// A canonical package name with an `@<ordinal>` suffix.
    Alias(&'a str, usize),
}

/// Classify a dependency key, or return `None` if it has none of the
/// accepted shapes.
pub fn classify_key(key: &str) -> Option<KeyKind<'_>> {
    if key == DEFAULT_SECTION {
        return Some(KeyKind::Section(key));
    }
    if let Some(inner) = key.strip_prefix('[').and_then(|k| k.strip_suffix(']')) {
        return (!inner.is_empty()).then_some(KeyKind::Section(inner));
    }
    if let Some((base, ordinal)) = key.rsplit_once('@') {
        if ordinal.is_empty() || !ordinal.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let ordinal = ordinal.parse().ok()?;
        return is_canonical(base).then_some(KeyKind::Alias(base, ordinal));
    }
    is_canonical(key).then_some(KeyKind::Package(key))
}
