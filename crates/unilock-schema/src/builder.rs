//! Incremental construction of a [`LockFile`].
//!
//! Adapters feed packages, edges and hashes in whatever order their foreign
//! format yields them; the builder owns key assignment. A package is stored
//! under its canonical name until a second, different spec with the same
//! canonical name arrives. At that point the first entry becomes `name@0`,
//! the newcomer `name@1`, and every reference to `name` follows.

use crate::lock::{Dependency, DependencyEdges, LockFile, PythonPackage, Source};
use crate::names::{alias_key, canonicalize_name};
use crate::types::CanonicalName;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Result of [`LockBuilder::add_source`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceInsert {
    Inserted,
    /// A source with this name and URL is already recorded; the first one is kept.
    Unchanged,
    /// A source with this name but another URL is already recorded.
    Conflict { existing_url: String },
}

type Markers = Option<Vec<String>>;

#[derive(Debug, Default)]
pub struct LockBuilder {
    sources: BTreeMap<String, Source>,
    packages: BTreeMap<String, PythonPackage>,
    keys: BTreeMap<CanonicalName, Vec<String>>,
    edges: BTreeMap<String, BTreeMap<String, Markers>>,
    name_lists: BTreeSet<String>,
    hashes: BTreeMap<String, BTreeSet<String>>,
    name_hashes: BTreeMap<CanonicalName, BTreeSet<String>>,
}

impl LockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a source. An existing source of the same name is never replaced.
    pub fn add_source(&mut self, name: &str, source: Source) -> SourceInsert {
        match self.sources.get(name) {
            Some(existing) if existing.url == source.url => SourceInsert::Unchanged,
            Some(existing) => SourceInsert::Conflict {
                existing_url: existing.url.clone(),
            },
            None => {
                self.sources.insert(name.to_owned(), source);
                SourceInsert::Inserted
            }
        }
    }

    /// Record a package and return the key it lives under.
    ///
    /// A package whose spec equals one already recorded for the same
    /// canonical name reuses that entry, whatever its spelling.
    pub fn add_package(&mut self, package: PythonPackage) -> String {
        let name = canonicalize_name(&package.name);
        let mut existing = self.keys.get(&name).cloned().unwrap_or_default();

        if let Some(key) = existing
            .iter()
            .find(|k| self.packages.get(*k).is_some_and(|p| p.spec == package.spec))
        {
            return key.clone();
        }

        let key = if existing.is_empty() {
            name.as_str().to_owned()
        } else {
            if existing.len() == 1 && existing[0] == name.as_str() {
                existing[0] = self.promote_to_alias(&name);
            }
            let key = alias_key(&name, existing.len());
            if let Some(shared) = self.name_hashes.get(&name) {
                self.hashes.insert(key.clone(), shared.clone());
            }
            debug!("package {name} has {} distinct specs, adding {key}", existing.len() + 1);
            key
        };

        existing.push(key.clone());
        self.keys.insert(name, existing);
        self.packages.insert(key.clone(), package);
        key
    }

    /// Move everything recorded under the bare `name` to `name@0`.
    fn promote_to_alias(&mut self, name: &CanonicalName) -> String {
        let old = name.as_str();
        let new = alias_key(name, 0);

        if let Some(package) = self.packages.remove(old) {
            self.packages.insert(new.clone(), package);
        }
        if let Some(children) = self.edges.remove(old) {
            self.edges.insert(new.clone(), children);
        }
        for children in self.edges.values_mut() {
            if let Some(markers) = children.remove(old) {
                children.insert(new.clone(), markers);
            }
        }

        if let Some(bucket) = self.hashes.remove(old) {
            self.hashes.insert(new.clone(), bucket);
        }
        new
    }

    /// Where an entry returned earlier as `key` lives now. A bare name handed
    /// out before a second spec arrived has since moved to `name@0`.
    pub fn current_key(&self, key: &str) -> String {
        match self.keys.get(key).and_then(|keys| keys.first()) {
            Some(first) if first != key => first.clone(),
            _ => key.to_owned(),
        }
    }

    /// Keys recorded for a canonical name: empty, `[name]`, or its aliases.
    pub fn keys_for(&self, name: &CanonicalName) -> &[String] {
        self.keys.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Add hashes to the bucket of one key. Nothing is recorded for an empty list.
    pub fn add_hashes<I, S>(&mut self, key: &str, hashes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut hashes = hashes.into_iter().map(Into::into).peekable();
        if hashes.peek().is_none() {
            return;
        }
        self.hashes.entry(key.to_owned()).or_default().extend(hashes);
    }

    /// Add hashes to every key of a canonical name, or to the bare name when
    /// no package carries it yet. Aliases of `name` created later get them too.
    pub fn add_hashes_for_name<I, S>(&mut self, name: &CanonicalName, hashes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let hashes: Vec<String> = hashes.into_iter().map(Into::into).collect();
        if hashes.is_empty() {
            return;
        }
        self.name_hashes
            .entry(name.clone())
            .or_default()
            .extend(hashes.iter().cloned());
        let keys = match self.keys.get(name) {
            Some(keys) => keys.clone(),
            None => vec![name.as_str().to_owned()],
        };
        for key in keys {
            self.add_hashes(&key, hashes.iter().cloned());
        }
    }

    /// Add an edge from `parent` to every key of the canonical name `child`.
    pub fn add_edge(&mut self, parent: &str, child: &CanonicalName, marker: Option<String>) {
        let targets = match self.keys.get(child) {
            Some(keys) => keys.clone(),
            None => vec![child.as_str().to_owned()],
        };
        for target in targets {
            self.add_edge_to_key(parent, &target, marker.clone());
        }
    }

    /// Add an edge from `parent` to exactly `child_key`.
    ///
    /// Repeated edges merge their markers: once the edge is unconditional it
    /// stays unconditional, otherwise the latest marker replaces the previous one.
    pub fn add_edge_to_key(&mut self, parent: &str, child_key: &str, marker: Option<String>) {
        let marker = marker.filter(|m| !m.is_empty());
        let children = self.edges.entry(parent.to_owned()).or_default();
        match children.get_mut(child_key) {
            Some(None) => {}
            Some(slot) => *slot = marker.map(|m| vec![m]),
            None => {
                children.insert(child_key.to_owned(), marker.map(|m| vec![m]));
            }
        }
    }

    /// Make sure a section aggregator exists, even with no members.
    pub fn ensure_section(&mut self, key: &str) {
        self.edges.entry(key.to_owned()).or_default();
    }

    /// Serialize the edges of `section` as a sorted list of keys.
    ///
    /// Only honoured while every edge of the section is unconditional.
    pub fn use_name_list(&mut self, section: &str) {
        self.ensure_section(section);
        self.name_lists.insert(section.to_owned());
    }

    pub fn finish(self) -> LockFile {
        let Self {
            sources,
            packages,
            edges,
            name_lists,
            hashes,
            ..
        } = self;

        let mut dependencies: BTreeMap<String, Dependency> = packages
            .into_iter()
            .map(|(key, package)| {
                let entry = Dependency {
                    python: Some(package),
                    dependencies: None,
                };
                (key, entry)
            })
            .collect();

        for (parent, children) in edges {
            let edges = if name_lists.contains(&parent) && children.values().all(Option::is_none)
            {
                DependencyEdges::Names(children.into_keys().collect())
            } else {
                DependencyEdges::Markers(children)
            };
            dependencies.entry(parent).or_default().dependencies = Some(edges);
        }

        let hashes = hashes
            .into_iter()
            .map(|(key, set)| (key, set.into_iter().collect()))
            .collect();

        LockFile::from_parts(sources, dependencies, hashes)
    }
}
