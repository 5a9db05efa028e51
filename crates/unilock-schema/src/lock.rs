use crate::serialize::to_canonical_string;
use crate::validate::{LockSchema, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("lock file JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("lock file is invalid: {0}")]
    Validation(#[from] ValidationError),
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

/// A package index. The source name is its key in [`LockFile::sources`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub url: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub no_verify_ssl: bool,
}

impl Source {
    pub fn new(url: impl Into<String>, verify_ssl: bool) -> Self {
        Self {
            url: url.into(),
            no_verify_ssl: !verify_ssl,
        }
    }

    pub fn verify_ssl(&self) -> bool {
        !self.no_verify_ssl
    }
}

/// How a package is pinned. Exactly one form applies to a package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Spec {
    Version {
        version: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    Url {
        url: String,
        #[serde(default, skip_serializing_if = "is_false")]
        no_verify_ssl: bool,
    },
    Path {
        path: String,
    },
    Vcs {
        vcs: String,
        rev: String,
    },
}

impl Spec {
    pub fn version(version: impl Into<String>) -> Self {
        Spec::Version {
            version: version.into(),
            source: None,
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Spec::Url {
            url: url.into(),
            no_verify_ssl: false,
        }
    }

    pub fn path(path: impl Into<String>) -> Self {
        Spec::Path { path: path.into() }
    }

    pub fn vcs(vcs: impl Into<String>, rev: impl Into<String>) -> Self {
        Spec::Vcs {
            vcs: vcs.into(),
            rev: rev.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Spec::Version { .. } => "version",
            Spec::Url { .. } => "url",
            Spec::Path { .. } => "path",
            Spec::Vcs { .. } => "vcs",
        }
    }
}

/// The `python` object of a package entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PythonPackage {
    /// Name as spelled by the foreign lock; the entry key is its canonical form.
    pub name: String,
    #[serde(flatten)]
    pub spec: Spec,
}

impl PythonPackage {
    pub fn new(name: impl Into<String>, spec: Spec) -> Self {
        Self {
            name: name.into(),
            spec,
        }
    }
}

/// Outgoing edges of a dependency entry.
///
/// `Names` is the list shorthand where every edge is unconditional.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum DependencyEdges {
    Markers(BTreeMap<String, Option<Vec<String>>>),
    Names(BTreeSet<String>),
}

impl Default for DependencyEdges {
    fn default() -> Self {
        DependencyEdges::Markers(BTreeMap::new())
    }
}

impl DependencyEdges {
    /// Iterate `(child_key, markers)` pairs in key order; `None` is unconditional.
    pub fn iter(&self) -> Box<dyn Iterator<Item = (&str, Option<&[String]>)> + '_> {
        match self {
            DependencyEdges::Markers(map) => Box::new(
                map.iter()
                    .map(|(k, v)| (k.as_str(), v.as_deref())),
            ),
            DependencyEdges::Names(names) => Box::new(names.iter().map(|k| (k.as_str(), None))),
        }
    }

    /// Markers of the edge to `child`: `None` if there is no such edge,
    /// `Some(None)` if it is unconditional.
    pub fn get(&self, child: &str) -> Option<Option<&[String]>> {
        match self {
            DependencyEdges::Markers(map) => map.get(child).map(Option::as_deref),
            DependencyEdges::Names(names) => names.contains(child).then_some(None),
        }
    }

    pub fn contains(&self, child: &str) -> bool {
        self.get(child).is_some()
    }

    pub fn len(&self) -> usize {
        match self {
            DependencyEdges::Markers(map) => map.len(),
            DependencyEdges::Names(names) => names.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An entry in the `dependencies` map: a package, a section aggregator, or both.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dependency {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python: Option<PythonPackage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<DependencyEdges>,
}

impl Dependency {
    pub fn is_section(&self) -> bool {
        self.python.is_none()
    }
}

/// The canonical lock file.
///
/// Built once by an adapter (through [`LockBuilder`](crate::LockBuilder)) or
/// loaded from disk, and never mutated afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockFile {
    #[serde(default)]
    sources: BTreeMap<String, Source>,
    #[serde(default)]
    dependencies: BTreeMap<String, Dependency>,
    #[serde(default)]
    hashes: BTreeMap<String, Vec<String>>,
}

impl LockFile {
    pub(crate) fn from_parts(
        sources: BTreeMap<String, Source>,
        dependencies: BTreeMap<String, Dependency>,
        hashes: BTreeMap<String, Vec<String>>,
    ) -> Self {
        Self {
            sources,
            dependencies,
            hashes,
        }
    }

    pub fn sources(&self) -> &BTreeMap<String, Source> {
        &self.sources
    }

    pub fn source(&self, name: &str) -> Option<&Source> {
        self.sources.get(name)
    }

    pub fn dependencies(&self) -> &BTreeMap<String, Dependency> {
        &self.dependencies
    }

    pub fn dependency(&self, key: &str) -> Option<&Dependency> {
        self.dependencies.get(key)
    }

    /// The package recorded under `key`, if that key is a package entry.
    pub fn package(&self, key: &str) -> Option<&PythonPackage> {
        self.dependencies.get(key).and_then(|d| d.python.as_ref())
    }

    /// Iterate package entries as `(key, package)`.
    pub fn packages(&self) -> impl Iterator<Item = (&str, &PythonPackage)> {
        self.dependencies
            .iter()
            .filter_map(|(k, d)| d.python.as_ref().map(|p| (k.as_str(), p)))
    }

    pub fn edges(&self, key: &str) -> Option<&DependencyEdges> {
        self.dependencies.get(key).and_then(|d| d.dependencies.as_ref())
    }

    /// Iterate section aggregators (entries without a package) as `(key, edges)`.
    pub fn sections(&self) -> impl Iterator<Item = (&str, &DependencyEdges)> {
        self.dependencies.iter().filter_map(|(k, d)| match (&d.python, &d.dependencies) {
            (None, Some(edges)) => Some((k.as_str(), edges)),
            _ => None,
        })
    }

    pub fn hashes(&self) -> &BTreeMap<String, Vec<String>> {
        &self.hashes
    }

    /// Hashes recorded for `key`; empty when there is no bucket.
    pub fn hashes_for(&self, key: &str) -> &[String] {
        self.hashes.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn to_value(&self) -> Result<Value, LockError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Check this lock against the structural contract.
    pub fn validate(&self, schema: &LockSchema) -> Result<(), LockError> {
        schema.validate(&self.to_value()?)?;
        Ok(())
    }

    /// Validate `value` and build the typed lock from it.
    pub fn from_value(value: Value, schema: &LockSchema) -> Result<Self, LockError> {
        schema.validate(&value)?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_json_str(content: &str, schema: &LockSchema) -> Result<Self, LockError> {
        let value: Value = serde_json::from_str(content)?;
        Self::from_value(value, schema)
    }

    pub fn to_canonical_string(&self) -> Result<String, LockError> {
        to_canonical_string(&self.to_value()?)
    }

    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), LockError> {
        let path = path.as_ref();
        let content = self.to_canonical_string()?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::io::Write::write_all(&mut tmp, content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| LockError::Io(e.error))?;
        // Fsync parent directory to ensure rename durability on power loss.
        if let Ok(f) = fs::File::open(dir) {
            let _ = f.sync_all();
        }
        tracing::debug!("wrote lock file {}", path.display());
        Ok(())
    }

    pub fn read_from_file(path: impl AsRef<Path>, schema: &LockSchema) -> Result<Self, LockError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content, schema)
    }
}
