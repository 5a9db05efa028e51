//! Pipenv lock files (`Pipfile.lock`).

use crate::error::ForeignError;
use crate::outcome::{Conversion, ConversionWarning, Outcome};
use crate::requirements::exact_version;
use crate::ForeignLock;
use pep440_rs::VersionSpecifiers;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use tracing::debug;
use unilock_schema::{
    LockBuilder, PythonPackage, Source, SourceInsert, Spec, DEFAULT_SECTION, DEV_SECTION,
};

/// The only `_meta.pipfile-spec` value this adapter understands.
pub const SUPPORTED_PIPFILE_SPEC: u64 = 6;

/// Deserialize a JSON object into its entries, in document order.
fn ordered_entries<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct EntriesVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
        type Value = Vec<(String, V)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of package names to package entries")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry()? {
                entries.push(entry);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(EntriesVisitor(PhantomData))
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Meta {
    #[serde(rename = "pipfile-spec")]
    pipfile_spec: Option<Value>,
    #[serde(default)]
    sources: Vec<PipfileSource>,
}

#[derive(Debug, Clone, Deserialize)]
struct PipfileSource {
    name: String,
    url: String,
    #[serde(default = "default_true")]
    verify_ssl: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PipfilePackage {
    version: Option<String>,
    url: Option<String>,
    file: Option<String>,
    path: Option<String>,
    git: Option<String>,
    hg: Option<String>,
    bzr: Option<String>,
    svn: Option<String>,
    #[serde(rename = "ref")]
    reference: Option<String>,
    #[serde(default)]
    editable: bool,
    index: Option<String>,
    markers: Option<String>,
    #[serde(default)]
    hashes: Vec<String>,
}

impl PipfilePackage {
    fn vcs(&self) -> Option<(&'static str, &str, &str)> {
        let rev = self.reference.as_deref()?;
        [
            ("git", &self.git),
            ("hg", &self.hg),
            ("bzr", &self.bzr),
            ("svn", &self.svn),
        ]
        .into_iter()
        .find_map(|(vcs, url)| url.as_deref().map(|url| (vcs, url, rev)))
    }
}

/// A parsed `Pipfile.lock`.
#[derive(Debug, Clone, Deserialize)]
pub struct PipfileLock {
    #[serde(rename = "_meta", default)]
    meta: Meta,
    #[serde(default, deserialize_with = "ordered_entries")]
    default: Vec<(String, PipfilePackage)>,
    #[serde(default, deserialize_with = "ordered_entries")]
    develop: Vec<(String, PipfilePackage)>,
}

impl PipfileLock {
    fn check_spec(&self) -> Result<(), ForeignError> {
        match &self.meta.pipfile_spec {
            Some(v) if v.as_u64() == Some(SUPPORTED_PIPFILE_SPEC) => Ok(()),
            Some(v) => Err(ForeignError::UnsupportedPipfileSpec(v.to_string())),
            None => Err(ForeignError::UnsupportedPipfileSpec("missing".to_owned())),
        }
    }
}

fn convert_package(name: &str, package: &PipfilePackage) -> Outcome<PythonPackage> {
    let python = if let Some((vcs, url, rev)) = package.vcs() {
        let python = PythonPackage::new(name, Spec::vcs(format!("{vcs}+{url}"), rev));
        if package.editable {
            if let Some(index) = &package.index {
                debug!("index '{index}' not recorded for editable package {name}");
            }
            let warning = ConversionWarning::VcsPackageNotEditable {
                name: name.to_owned(),
            };
            return Outcome::Degraded(python, warning);
        }
        python
    } else if package.editable {
        return Outcome::Skipped(ConversionWarning::EditablePackageDropped {
            name: name.to_owned(),
        });
    } else if let Some(url) = package.url.as_ref().or(package.file.as_ref()) {
        PythonPackage::new(name, Spec::url(url.as_str()))
    } else if let Some(path) = &package.path {
        PythonPackage::new(name, Spec::path(path.as_str()))
    } else if let Some(version) = &package.version {
        let pinned = version
            .parse::<VersionSpecifiers>()
            .ok()
            .as_ref()
            .and_then(exact_version);
        let Some(pinned) = pinned else {
            return ForeignError::InvalidVersion {
                name: name.to_owned(),
                version: version.clone(),
            }
            .into();
        };
        let spec = Spec::Version {
            version: pinned,
            source: package.index.clone(),
        };
        return Outcome::Accepted(PythonPackage::new(name, spec));
    } else {
        return ForeignError::PackageSpecifierNotSupported(name.to_owned()).into();
    };

    match &package.index {
        Some(index) => Outcome::Degraded(
            python,
            ConversionWarning::SourceDropped {
                package: name.to_owned(),
                source: index.clone(),
            },
        ),
        None => Outcome::Accepted(python),
    }
}

impl ForeignLock for PipfileLock {
    fn parse(content: &str) -> Result<Self, ForeignError> {
        Ok(serde_json::from_str(content)?)
    }

    fn to_lock_file(&self) -> Result<Conversion, ForeignError> {
        self.check_spec()?;

        let mut builder = LockBuilder::new();
        let mut warnings = Vec::new();

        for source in &self.meta.sources {
            let record = Source::new(source.url.as_str(), source.verify_ssl);
            if let SourceInsert::Conflict { existing_url } = builder.add_source(&source.name, record) {
                return Err(ForeignError::SourceNameDuplicated {
                    name: source.name.clone(),
                    first: existing_url,
                    second: source.url.clone(),
                });
            }
        }

        for (section, packages) in [(DEFAULT_SECTION, &self.default), (DEV_SECTION, &self.develop)] {
            builder.ensure_section(section);
            for (name, package) in packages {
                let Some(python) = convert_package(name, package).collect(&mut warnings)? else {
                    continue;
                };
                let key = builder.add_package(python);
                builder.add_edge_to_key(section, &key, package.markers.clone());
                builder.add_hashes(&key, package.hashes.iter().cloned());
            }
            debug!("converted Pipfile.lock section '{section}' ({} entries)", packages.len());
        }

        Ok(Conversion {
            lock: builder.finish(),
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use unilock_schema::LockSchema;

    fn convert(value: &Value) -> Conversion {
        PipfileLock::parse(&value.to_string())
            .unwrap()
            .to_lock_file()
            .unwrap()
    }

    fn convert_err(value: &Value) -> ForeignError {
        PipfileLock::parse(&value.to_string())
            .unwrap()
            .to_lock_file()
            .unwrap_err()
    }

    #[test]
    fn single_default_package() {
        let conv = convert(&json!({
            "_meta": {"pipfile-spec": 6},
            "default": {"requests": {"version": "==2.21.0"}},
            "develop": {}
        }));
        let value = conv.lock.to_value().unwrap();
        assert_eq!(
            value["dependencies"],
            json!({
                "requests": {"python": {"name": "requests", "version": "2.21.0"}},
                "": {"dependencies": {"requests": null}},
                "[dev]": {"dependencies": {}}
            })
        );
        assert!(conv.warnings.is_empty());
        conv.lock.validate(&LockSchema::new()).unwrap();
    }

    #[test]
    fn other_spec_versions_are_rejected() {
        for meta in [json!({"pipfile-spec": 5}), json!({"pipfile-spec": "6"}), json!({})] {
            let err = convert_err(&json!({"_meta": meta, "default": {}, "develop": {}}));
            assert!(matches!(err, ForeignError::UnsupportedPipfileSpec(_)), "{err}");
        }
    }

    #[test]
    fn spec_priority() {
        let conv = convert(&json!({
            "_meta": {"pipfile-spec": 6},
            "default": {
                "passa": {"git": "https://github.com/sarugaku/passa.git", "ref": "abc", "version": "==0.3.0"},
                "idna": {"url": "https://example.com/idna.whl", "version": "==2.8"},
                "certifi": {"file": "https://example.com/certifi.whl"},
                "pywin32": {"path": "./wheels/pywin32.whl", "version": "==224"}
            },
            "develop": {}
        }));
        let lock = &conv.lock;
        assert_eq!(
            lock.package("passa").unwrap().spec,
            Spec::vcs("git+https://github.com/sarugaku/passa.git", "abc")
        );
        assert_eq!(lock.package("idna").unwrap().spec, Spec::url("https://example.com/idna.whl"));
        assert_eq!(
            lock.package("certifi").unwrap().spec,
            Spec::url("https://example.com/certifi.whl")
        );
        assert_eq!(lock.package("pywin32").unwrap().spec, Spec::path("./wheels/pywin32.whl"));
    }

    #[test]
    fn editable_handling() {
        let conv = convert(&json!({
            "_meta": {"pipfile-spec": 6},
            "default": {
                "passa": {"git": "https://github.com/sarugaku/passa.git", "ref": "abc", "editable": true},
                "mypkg": {"path": ".", "editable": true}
            },
            "develop": {}
        }));
        assert!(conv.lock.package("passa").is_some());
        assert!(conv.lock.package("mypkg").is_none());
        assert!(!conv.lock.edges("").unwrap().contains("mypkg"));
        assert_eq!(
            conv.warnings,
            vec![
                ConversionWarning::VcsPackageNotEditable {
                    name: "passa".to_owned()
                },
                ConversionWarning::EditablePackageDropped {
                    name: "mypkg".to_owned()
                },
            ]
        );
    }

    #[test]
    fn vcs_without_ref_falls_back() {
        let conv = convert(&json!({
            "_meta": {"pipfile-spec": 6},
            "default": {"passa": {"git": "https://github.com/sarugaku/passa.git", "version": "==0.3.0"}},
            "develop": {}
        }));
        assert_eq!(conv.lock.package("passa").unwrap().spec, Spec::version("0.3.0"));

        let err = convert_err(&json!({
            "_meta": {"pipfile-spec": 6},
            "default": {"passa": {"git": "https://github.com/sarugaku/passa.git"}},
            "develop": {}
        }));
        assert!(matches!(err, ForeignError::PackageSpecifierNotSupported(name) if name == "passa"));
    }

    #[test]
    fn loose_version_is_fatal() {
        for loose in [">=4.0", "==1.*", "==4.0,!=4.1", "4.0"] {
            let err = convert_err(&json!({
                "_meta": {"pipfile-spec": 6},
                "default": {},
                "develop": {"pytest": {"version": loose}}
            }));
            assert!(
                matches!(&err, ForeignError::InvalidVersion { version, .. } if version == loose),
                "{loose}: {err}"
            );
        }
    }

    #[test]
    fn index_becomes_version_source() {
        let conv = convert(&json!({
            "_meta": {
                "pipfile-spec": 6,
                "sources": [
                    {"name": "pypi", "url": "https://pypi.org/simple", "verify_ssl": true},
                    {"name": "internal", "url": "http://pypi.internal/simple", "verify_ssl": false}
                ]
            },
            "default": {
                "requests": {"version": "==2.21.0", "index": "internal"},
                "idna": {"url": "https://example.com/idna.whl", "index": "internal"}
            },
            "develop": {}
        }));
        let lock = &conv.lock;
        assert_eq!(
            lock.package("requests").unwrap().spec,
            Spec::Version {
                version: "2.21.0".to_owned(),
                source: Some("internal".to_owned()),
            }
        );
        assert_eq!(lock.package("idna").unwrap().spec, Spec::url("https://example.com/idna.whl"));
        assert_eq!(
            conv.warnings,
            vec![ConversionWarning::SourceDropped {
                package: "idna".to_owned(),
                source: "internal".to_owned(),
            }]
        );
        assert!(lock.source("pypi").unwrap().verify_ssl());
        assert!(lock.source("internal").unwrap().no_verify_ssl);
        let value = lock.to_value().unwrap();
        assert_eq!(value["sources"]["pypi"], json!({"url": "https://pypi.org/simple"}));
    }

    #[test]
    fn index_on_non_version_specs_is_reported() {
        let conv = convert(&json!({
            "_meta": {"pipfile-spec": 6},
            "default": {
                "passa": {"git": "https://github.com/sarugaku/passa.git", "ref": "abc", "index": "internal"},
                "mypkg": {"path": "./mypkg", "index": "internal"},
                "tool": {"git": "https://example.com/tool.git", "ref": "def", "editable": true, "index": "internal"}
            },
            "develop": {}
        }));
        assert!(conv.lock.package("passa").is_some());
        assert!(conv.lock.package("mypkg").is_some());
        assert_eq!(
            conv.warnings,
            vec![
                ConversionWarning::SourceDropped {
                    package: "passa".to_owned(),
                    source: "internal".to_owned(),
                },
                ConversionWarning::SourceDropped {
                    package: "mypkg".to_owned(),
                    source: "internal".to_owned(),
                },
                ConversionWarning::VcsPackageNotEditable {
                    name: "tool".to_owned()
                },
            ]
        );
    }

    #[test]
    fn duplicate_source_names_are_fatal() {
        let err = convert_err(&json!({
            "_meta": {
                "pipfile-spec": 6,
                "sources": [
                    {"name": "pypi", "url": "https://pypi.org/simple"},
                    {"name": "pypi", "url": "https://mirror.example/simple"}
                ]
            },
            "default": {},
            "develop": {}
        }));
        assert!(matches!(err, ForeignError::SourceNameDuplicated { name, .. } if name == "pypi"));
    }

    #[test]
    fn markers_merge_within_a_section() {
        let conv = convert(&json!({
            "_meta": {"pipfile-spec": 6},
            "default": {
                "six": {"version": "==1.12.0", "markers": "python_version < '3'"},
                "Six": {"version": "==1.12.0"},
                "colorama": {"version": "==0.4.1", "markers": "os_name == 'nt'"},
                "Colorama": {"version": "==0.4.1", "markers": "sys_platform == 'win32'"}
            },
            "develop": {}
        }));
        let default = conv.lock.edges("").unwrap();
        assert_eq!(default.get("six"), Some(None));
        assert_eq!(
            default.get("colorama"),
            Some(Some(&["sys_platform == 'win32'".to_owned()][..]))
        );
        assert_eq!(conv.lock.package("six").unwrap().name, "six");
    }

    #[test]
    fn hashes_union_across_sections() {
        let conv = convert(&json!({
            "_meta": {"pipfile-spec": 6},
            "default": {"six": {"version": "==1.12.0", "hashes": ["sha256:bbb", "sha256:aaa"]}},
            "develop": {"six": {"version": "==1.12.0", "hashes": ["sha256:ccc", "sha256:aaa"]}}
        }));
        assert_eq!(
            conv.lock.hashes_for("six"),
            ["sha256:aaa", "sha256:bbb", "sha256:ccc"]
        );
        assert!(conv.lock.edges("[dev]").unwrap().contains("six"));
        assert!(conv.lock.edges("").unwrap().contains("six"));
    }

    #[test]
    fn differing_specs_across_sections_are_aliased() {
        let conv = convert(&json!({
            "_meta": {"pipfile-spec": 6},
            "default": {"six": {"version": "==1.12.0"}},
            "develop": {"six": {"version": "==1.11.0"}}
        }));
        let lock = &conv.lock;
        assert!(lock.dependency("six").is_none());
        assert_eq!(lock.package("six@0").unwrap().spec, Spec::version("1.12.0"));
        assert_eq!(lock.package("six@1").unwrap().spec, Spec::version("1.11.0"));
        assert!(lock.edges("").unwrap().contains("six@0"));
        assert!(lock.edges("[dev]").unwrap().contains("six@1"));
    }

    #[test]
    fn malformed_json_is_fatal() {
        let err = PipfileLock::parse("{\"default\": [").unwrap_err();
        assert!(matches!(err, ForeignError::Json(_)));
    }
}
