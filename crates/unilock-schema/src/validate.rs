//! Structural validation of canonical lock data.
//!
//! [`LockSchema`] is the fixed contract a canonical lock must satisfy. It is
//! built once by the caller and passed by reference wherever lock data is
//! loaded or produced; it carries no mutable state.

use crate::names::{classify_key, KeyKind};
use serde_json::{Map, Value};
use std::collections::HashSet;
use thiserror::Error;

/// The constraint a value broke.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Constraint {
    #[error("expected {expected}, found {found}")]
    WrongType {
        expected: &'static str,
        found: &'static str,
    },
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("unknown field `{0}`")]
    UnknownField(String),
    #[error("must not be empty")]
    Empty,
    #[error("`{0}` is not a section, package, or alias key")]
    InvalidKey(String),
    #[error("section entries cannot carry a `python` package")]
    SectionWithPackage,
    #[error("entry has neither `python` nor `dependencies`")]
    EmptyEntry,
    #[error("one of `version`, `url`, `path`, `vcs` is required")]
    NoSpec,
    #[error("`{0}` and `{1}` are mutually exclusive")]
    ConflictingSpecs(&'static str, &'static str),
    #[error("`{field}` is only allowed together with `{requires}`")]
    FieldRequires {
        field: &'static str,
        requires: &'static str,
    },
    #[error("duplicate item `{0}`")]
    DuplicateItem(String),
    #[error("`{0}` is not an `<algorithm>:<digest>` hash")]
    InvalidHash(String),
}

/// A structural violation, located by a path such as
/// `$.dependencies["flask"].python.version`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {constraint}")]
pub struct ValidationError {
    pub path: String,
    pub constraint: Constraint,
}

fn fail<T>(path: &str, constraint: Constraint) -> Result<T, ValidationError> {
    Err(ValidationError {
        path: path.to_owned(),
        constraint,
    })
}

fn member(path: &str, key: &str) -> String {
    format!("{path}[{key:?}]")
}

fn field(path: &str, name: &str) -> String {
    format!("{path}.{name}")
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    String,
    Bool,
}

impl Kind {
    fn name(self) -> &'static str {
        match self {
            Kind::String => "string",
            Kind::Bool => "boolean",
        }
    }

    fn check(self, path: &str, value: &Value) -> Result<(), ValidationError> {
        match (self, value) {
            (Kind::String, Value::String(s)) => {
                if s.is_empty() {
                    fail(path, Constraint::Empty)
                } else {
                    Ok(())
                }
            }
            (Kind::Bool, Value::Bool(_)) => Ok(()),
            _ => fail(
                path,
                Constraint::WrongType {
                    expected: self.name(),
                    found: type_name(value),
                },
            ),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FieldRule {
    name: &'static str,
    kind: Kind,
    required: bool,
}

/// One package spec form: the field that selects it and the fields that may
/// accompany it.
#[derive(Debug, Clone, Copy)]
struct SpecRule {
    discriminant: &'static str,
    companions: &'static [FieldRule],
}

const ROOT_FIELDS: &[&str] = &["sources", "dependencies", "hashes"];

const SOURCE_FIELDS: &[FieldRule] = &[
    FieldRule {
        name: "url",
        kind: Kind::String,
        required: true,
    },
    FieldRule {
        name: "no_verify_ssl",
        kind: Kind::Bool,
        required: false,
    },
];

const DEPENDENCY_FIELDS: &[&str] = &["python", "dependencies"];

const SPEC_RULES: &[SpecRule] = &[
    SpecRule {
        discriminant: "version",
        companions: &[FieldRule {
            name: "source",
            kind: Kind::String,
            required: false,
        }],
    },
    SpecRule {
        discriminant: "url",
        companions: &[FieldRule {
            name: "no_verify_ssl",
            kind: Kind::Bool,
            required: false,
        }],
    },
    SpecRule {
        discriminant: "path",
        companions: &[],
    },
    SpecRule {
        discriminant: "vcs",
        companions: &[FieldRule {
            name: "rev",
            kind: Kind::String,
            required: true,
        }],
    },
];

/// Immutable validator handle for the canonical lock format.
#[derive(Debug, Clone)]
pub struct LockSchema {
    root_fields: &'static [&'static str],
    source_fields: &'static [FieldRule],
    dependency_fields: &'static [&'static str],
    spec_rules: &'static [SpecRule],
}

impl Default for LockSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl LockSchema {
    pub fn new() -> Self {
        Self {
            root_fields: ROOT_FIELDS,
            source_fields: SOURCE_FIELDS,
            dependency_fields: DEPENDENCY_FIELDS,
            spec_rules: SPEC_RULES,
        }
    }

    /// Validate a whole lock document, stopping at the first violation.
    ///
    /// Checks run in nesting order: the root object, then every source,
    /// then every dependency entry, then the `python` object of every
    /// package entry, and finally every hash list.
    pub fn validate(&self, data: &Value) -> Result<(), ValidationError> {
        let root = as_object("$", data)?;
        for key in root.keys() {
            if !self.root_fields.contains(&key.as_str()) {
                return fail("$", Constraint::UnknownField(key.clone()));
            }
        }

        if let Some(sources) = root.get("sources") {
            let sources = as_object("$.sources", sources)?;
            for (name, source) in sources {
                self.validate_source(name, source)?;
            }
        }

        if let Some(deps) = root.get("dependencies") {
            let deps = as_object("$.dependencies", deps)?;
            for (key, entry) in deps {
                self.validate_dependency(key, entry)?;
            }
            for (key, entry) in deps {
                if let Some(python) = entry.get("python") {
                    let path = field(&member("$.dependencies", key), "python");
                    self.validate_python_at(&path, python)?;
                }
            }
        }

        if let Some(hashes) = root.get("hashes") {
            let hashes = as_object("$.hashes", hashes)?;
            for (key, list) in hashes {
                validate_hashes(&member("$.hashes", key), list)?;
            }
        }

        Ok(())
    }

    /// Validate a single source entry keyed by `name`.
    pub fn validate_source(&self, name: &str, data: &Value) -> Result<(), ValidationError> {
        let path = member("$.sources", name);
        if name.is_empty() {
            return fail(&path, Constraint::Empty);
        }
        let object = as_object(&path, data)?;
        check_fields(&path, object, self.source_fields)?;
        for key in object.keys() {
            if !self.source_fields.iter().any(|f| f.name == key) {
                return fail(&path, Constraint::UnknownField(key.clone()));
            }
        }
        Ok(())
    }

    /// Validate the shape of a dependency entry, not descending into `python`.
    pub fn validate_dependency(&self, key: &str, data: &Value) -> Result<(), ValidationError> {
        let path = member("$.dependencies", key);
        let Some(kind) = classify_key(key) else {
            return fail(&path, Constraint::InvalidKey(key.to_owned()));
        };
        let object = as_object(&path, data)?;
        for name in object.keys() {
            if !self.dependency_fields.contains(&name.as_str()) {
                return fail(&path, Constraint::UnknownField(name.clone()));
            }
        }
        if object.is_empty() {
            return fail(&path, Constraint::EmptyEntry);
        }
        if let Some(python) = object.get("python") {
            if matches!(kind, KeyKind::Section(_)) {
                return fail(&path, Constraint::SectionWithPackage);
            }
            as_object(&field(&path, "python"), python)?;
        }
        if let Some(edges) = object.get("dependencies") {
            validate_edges(&field(&path, "dependencies"), edges)?;
        }
        Ok(())
    }

    /// Validate a `python` package object.
    pub fn validate_python(&self, data: &Value) -> Result<(), ValidationError> {
        self.validate_python_at("$", data)
    }

    fn validate_python_at(&self, path: &str, data: &Value) -> Result<(), ValidationError> {
        let object = as_object(path, data)?;
        match object.get("name") {
            Some(name) => Kind::String.check(&field(path, "name"), name)?,
            None => return fail(path, Constraint::MissingField("name")),
        }

        let mut selected: Option<&SpecRule> = None;
        for rule in self.spec_rules {
            if !object.contains_key(rule.discriminant) {
                continue;
            }
            if let Some(first) = selected {
                return fail(
                    path,
                    Constraint::ConflictingSpecs(first.discriminant, rule.discriminant),
                );
            }
            selected = Some(rule);
        }
        let Some(rule) = selected else {
            return fail(path, Constraint::NoSpec);
        };
        Kind::String.check(&field(path, rule.discriminant), &object[rule.discriminant])?;
        check_fields(path, object, rule.companions)?;

        for key in object.keys() {
            if key == "name" || key == rule.discriminant {
                continue;
            }
            if rule.companions.iter().any(|f| f.name == key) {
                continue;
            }
            let owner = self.spec_rules.iter().find_map(|r| {
                r.companions
                    .iter()
                    .find(|f| f.name == key)
                    .map(|f| (f.name, r.discriminant))
            });
            return match owner {
                Some((field, requires)) => fail(path, Constraint::FieldRequires { field, requires }),
                None => fail(path, Constraint::UnknownField(key.clone())),
            };
        }
        Ok(())
    }
}

fn as_object<'a>(path: &str, value: &'a Value) -> Result<&'a Map<String, Value>, ValidationError> {
    match value {
        Value::Object(map) => Ok(map),
        other => fail(
            path,
            Constraint::WrongType {
                expected: "object",
                found: type_name(other),
            },
        ),
    }
}

fn as_array<'a>(path: &str, value: &'a Value) -> Result<&'a [Value], ValidationError> {
    match value {
        Value::Array(items) => Ok(items),
        other => fail(
            path,
            Constraint::WrongType {
                expected: "array",
                found: type_name(other),
            },
        ),
    }
}

fn check_fields(
    path: &str,
    object: &Map<String, Value>,
    rules: &[FieldRule],
) -> Result<(), ValidationError> {
    for rule in rules {
        match object.get(rule.name) {
            Some(value) => rule.kind.check(&field(path, rule.name), value)?,
            None if rule.required => return fail(path, Constraint::MissingField(rule.name)),
            None => {}
        }
    }
    Ok(())
}

fn unique_strings<'a>(path: &str, items: &'a [Value]) -> Result<Vec<&'a str>, ValidationError> {
    let mut seen = HashSet::with_capacity(items.len());
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let item_path = format!("{path}[{i}]");
        Kind::String.check(&item_path, item)?;
        let s = item.as_str().unwrap_or_default();
        if !seen.insert(s) {
            return fail(&item_path, Constraint::DuplicateItem(s.to_owned()));
        }
        out.push(s);
    }
    Ok(out)
}

fn validate_edges(path: &str, value: &Value) -> Result<(), ValidationError> {
    match value {
        Value::Array(items) => {
            unique_strings(path, items)?;
        }
        Value::Object(map) => {
            for (child, markers) in map {
                let child_path = member(path, child);
                if child.is_empty() {
                    return fail(&child_path, Constraint::Empty);
                }
                if markers.is_null() {
                    continue;
                }
                let items = as_array(&child_path, markers)?;
                if items.is_empty() {
                    return fail(&child_path, Constraint::Empty);
                }
                unique_strings(&child_path, items)?;
            }
        }
        other => {
            return fail(
                path,
                Constraint::WrongType {
                    expected: "object or array",
                    found: type_name(other),
                },
            )
        }
    }
    Ok(())
}

fn validate_hashes(path: &str, value: &Value) -> Result<(), ValidationError> {
    let items = as_array(path, value)?;
    for (i, hash) in unique_strings(path, items)?.into_iter().enumerate() {
        let well_formed = hash
            .split_once(':')
            .is_some_and(|(algo, digest)| !algo.is_empty() && !digest.is_empty());
        if !well_formed {
            return fail(
                &format!("{path}[{i}]"),
                Constraint::InvalidHash(hash.to_owned()),
            );
        }
    }
    Ok(())
}
