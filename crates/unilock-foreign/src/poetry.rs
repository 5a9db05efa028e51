//! Poetry lock files (`poetry.lock`).
//!
//! Besides packages and their specs, the adapter rebuilds the dependency
//! graph: every package links to what it depends on, and whatever no package
//! of the same category depends on becomes a root of its category section.
//! Extras become sections of their own.

use crate::error::ForeignError;
use crate::outcome::{self, Conversion, ConversionWarning, Outcome};
use crate::ForeignLock;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;
use unilock_schema::{
    canonicalize_name, section_key, CanonicalName, LockBuilder, PythonPackage, Source,
    SourceInsert, Spec,
};

const VCS_TYPES: [&str; 4] = ["git", "hg", "bzr", "svn"];

fn main_category() -> String {
    "main".to_owned()
}

#[derive(Debug, Clone, Deserialize)]
struct PoetrySource {
    #[serde(rename = "type")]
    kind: String,
    url: String,
    #[serde(default)]
    reference: String,
}

#[derive(Debug, Clone, Deserialize)]
struct PoetryPackage {
    name: String,
    version: Option<String>,
    #[serde(default = "main_category")]
    category: String,
    #[serde(default)]
    optional: bool,
    marker: Option<String>,
    #[serde(default)]
    dependencies: BTreeMap<String, toml::Value>,
    source: Option<PoetrySource>,
}

#[derive(Debug, Clone, Deserialize)]
struct FileHash {
    #[serde(default)]
    file: String,
    hash: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Metadata {
    #[serde(default)]
    hashes: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    files: BTreeMap<String, Vec<FileHash>>,
}

/// A parsed `poetry.lock`.
#[derive(Debug, Clone, Deserialize)]
pub struct PoetryLock {
    #[serde(default)]
    package: Vec<PoetryPackage>,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    extras: BTreeMap<String, Vec<String>>,
}

struct Converted {
    python: PythonPackage,
    source: Option<(String, String)>,
}

fn package_spec(package: &PoetryPackage) -> Result<Spec, ForeignError> {
    if let Some(source) = &package.source {
        if source.kind == "file" {
            return Ok(Spec::path(source.url.as_str()));
        }
        if VCS_TYPES.contains(&source.kind.as_str()) {
            if source.reference.is_empty() {
                return Err(ForeignError::PackageSpecifierNotSupported(package.name.clone()));
            }
            return Ok(Spec::vcs(
                format!("{}+{}", source.kind, source.url),
                source.reference.as_str(),
            ));
        }
    }
    match &package.version {
        Some(version) => Ok(Spec::version(version.as_str())),
        None => Err(ForeignError::PackageSpecifierNotSupported(package.name.clone())),
    }
}

/// The named index of a package, for `legacy` sources only.
fn legacy_source(package: &PoetryPackage) -> Option<(String, String)> {
    let source = package.source.as_ref()?;
    if source.kind != "legacy" || source.reference.is_empty() {
        return None;
    }
    Some((source.reference.clone(), source.url.clone()))
}

fn convert_package(package: &PoetryPackage) -> Outcome<Converted> {
    if package.version.is_none() {
        if let Some(legacy) = package.source.as_ref().filter(|s| s.kind == "legacy") {
            let source = if legacy.reference.is_empty() {
                &legacy.url
            } else {
                &legacy.reference
            };
            return Outcome::Skipped(ConversionWarning::SourceDropped {
                package: package.name.clone(),
                source: source.clone(),
            });
        }
    }

    let spec = match package_spec(package) {
        Ok(Spec::Version { version, .. }) => Spec::Version {
            version,
            source: legacy_source(package).map(|(name, _)| name),
        },
        Ok(spec) => spec,
        Err(e) => return e.into(),
    };
    Outcome::Accepted(Converted {
        python: PythonPackage::new(package.name.as_str(), spec),
        source: legacy_source(package),
    })
}

/// Package name of an extras entry such as `requests[socks] (>=2.0)`.
fn extra_member_name(entry: &str) -> &str {
    let entry = entry.trim();
    entry.split([' ', '(', '[']).next().unwrap_or(entry)
}

impl PoetryLock {
    fn markers(&self) -> BTreeMap<CanonicalName, String> {
        self.package
            .iter()
            .filter_map(|p| {
                let marker = p.marker.as_ref()?;
                Some((canonicalize_name(&p.name), marker.replace('"', "'")))
            })
            .collect()
    }

    fn add_edges(&self, builder: &mut LockBuilder, keys: &[Option<String>]) {
        let markers = self.markers();
        let mut top_level: BTreeMap<CanonicalName, &PoetryPackage> = self
            .package
            .iter()
            .map(|p| (canonicalize_name(&p.name), p))
            .collect();

        for (package, key) in self.package.iter().zip(keys) {
            for dep in package.dependencies.keys() {
                let dep = canonicalize_name(dep);
                if top_level
                    .get(&dep)
                    .is_some_and(|d| d.category == package.category)
                {
                    top_level.remove(&dep);
                }
                if let Some(key) = key {
                    builder.add_edge(key, &dep, markers.get(&dep).cloned());
                }
            }
        }

        for (name, package) in &top_level {
            if package.optional {
                debug!("optional package {name} is not a root");
                continue;
            }
            let section = section_key(&package.category);
            builder.add_edge(&section, name, markers.get(name).cloned());
        }

        for (extra, members) in &self.extras {
            let section = format!("[{extra}]");
            for member in members {
                let name = canonicalize_name(extra_member_name(member));
                builder.add_edge(&section, &name, markers.get(&name).cloned());
            }
        }
    }

    fn add_hashes(&self, builder: &mut LockBuilder) {
        for (name, digests) in &self.metadata.hashes {
            let hashes = digests.iter().map(|d| format!("sha256:{d}"));
            builder.add_hashes_for_name(&canonicalize_name(name), hashes);
        }
        for (name, files) in &self.metadata.files {
            let hashes = files.iter().filter(|f| !f.hash.is_empty()).map(|f| {
                debug!("hash for {name} file {}", f.file);
                f.hash.clone()
            });
            builder.add_hashes_for_name(&canonicalize_name(name), hashes);
        }
    }
}

impl ForeignLock for PoetryLock {
    fn parse(content: &str) -> Result<Self, ForeignError> {
        Ok(toml::from_str(content)?)
    }

    fn to_lock_file(&self) -> Result<Conversion, ForeignError> {
        let mut builder = LockBuilder::new();
        let mut warnings = Vec::new();
        let mut keys = Vec::with_capacity(self.package.len());

        for package in &self.package {
            let Some(converted) = convert_package(package).collect(&mut warnings)? else {
                keys.push(None);
                continue;
            };
            if let Some((name, url)) = converted.source {
                let record = Source::new(url.as_str(), true);
                if let SourceInsert::Conflict { existing_url } = builder.add_source(&name, record) {
                    debug!("source {name} already points at {existing_url}");
                    let warning = ConversionWarning::DuplicateSourceDropped { name, url };
                    outcome::record(&mut warnings, warning);
                }
            }
            keys.push(Some(builder.add_package(converted.python)));
        }

        let keys: Vec<Option<String>> = keys
            .into_iter()
            .map(|key| key.map(|k| builder.current_key(&k)))
            .collect();
        self.add_edges(&mut builder, &keys);
        self.add_hashes(&mut builder);

        debug!("converted {} poetry.lock packages", self.package.len());
        Ok(Conversion {
            lock: builder.finish(),
            warnings,
        })
    }
}
