//! pip-style requirement lists (`requirements.txt`).
//!
//! Only fully pinned requirements convert: an exact `==`/`===` version, a
//! direct URL, a local path, or a VCS reference with a revision. Every
//! accepted requirement becomes an unconditional member of the default
//! section, which is written as a sorted list of keys.
//!
//! pip's own syntax (options, `-e`, bare locations with `#egg=` fragments)
//! is handled here; requirement text itself is parsed as PEP 508.

use crate::error::ForeignError;
use crate::outcome::{Conversion, ConversionWarning, Outcome};
use crate::ForeignLock;
use pep440_rs::{Operator, VersionSpecifiers};
use pep508_rs::{PackageName, VersionOrUrl};
use tracing::debug;
use unilock_schema::{LockBuilder, PythonPackage, Spec, DEFAULT_SECTION};

const VCS_SCHEMES: [&str; 4] = ["git+", "hg+", "bzr+", "svn+"];
const HASH_ALGORITHMS: [&str; 6] = ["md5", "sha1", "sha224", "sha256", "sha384", "sha512"];
const ARCHIVE_SUFFIXES: [&str; 6] = [".whl", ".zip", ".tar.gz", ".tar.bz2", ".tgz", ".tar"];

/// A requirements file split into logical lines: continuations joined,
/// comments and blank lines removed.
#[derive(Debug, Clone)]
pub struct RequirementsTxt {
    lines: Vec<String>,
}

impl RequirementsTxt {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl ForeignLock for RequirementsTxt {
    fn parse(content: &str) -> Result<Self, ForeignError> {
        Ok(Self {
            lines: logical_lines(content),
        })
    }

    fn to_lock_file(&self) -> Result<Conversion, ForeignError> {
        let mut builder = LockBuilder::new();
        builder.use_name_list(DEFAULT_SECTION);
        let mut warnings = Vec::new();

        for line in &self.lines {
            let Some(entry) = convert_line(line).collect(&mut warnings)? else {
                continue;
            };
            let key = builder.add_package(entry.package);
            builder.add_edge_to_key(DEFAULT_SECTION, &key, None);
            builder.add_hashes(&key, entry.hashes);
        }

        debug!(
            "converted {} requirement lines with {} warnings",
            self.lines.len(),
            warnings.len()
        );
        Ok(Conversion {
            lock: builder.finish(),
            warnings,
        })
    }
}

fn is_comment_start(line: &str, idx: usize) -> bool {
    idx == 0 || line[..idx].ends_with(char::is_whitespace)
}

fn strip_comment(line: &str) -> &str {
    let cut = line
        .char_indices()
        .find(|&(i, c)| c == '#' && is_comment_start(line, i))
        .map_or(line.len(), |(i, _)| i);
    line[..cut].trim()
}

fn logical_lines(content: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending = String::new();

    for raw in content.lines() {
        let raw = raw.trim_end_matches('\r');
        let comment_only = raw.trim_start().starts_with('#');
        if let Some(head) = raw.strip_suffix('\\').filter(|_| !comment_only) {
            pending.push_str(head);
            continue;
        }
        pending.push_str(raw);
        let line = strip_comment(&pending);
        if !line.is_empty() {
            lines.push(line.to_owned());
        }
        pending.clear();
    }

    let line = strip_comment(&pending);
    if !line.is_empty() {
        lines.push(line.to_owned());
    }
    lines
}

#[derive(Debug)]
struct Entry {
    package: PythonPackage,
    hashes: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum Target {
    Vcs { uri: String, rev: Option<String> },
    Url(String),
    Path(String),
    /// The exact version a PEP 508 requirement pins, if it pins one.
    Version(Option<String>),
}

#[derive(Debug)]
struct Requirement {
    name: Option<String>,
    target: Target,
    hashes: Vec<String>,
}

fn strip_editable(line: &str) -> Option<&str> {
    for flag in ["-e", "--editable"] {
        if let Some(rest) = line.strip_prefix(flag) {
            if rest.starts_with(char::is_whitespace) {
                return Some(rest.trim_start());
            }
            if let Some(rest) = rest.strip_prefix('=') {
                return Some(rest.trim());
            }
        }
    }
    None
}

/// Split a requirement from its trailing per-requirement options.
fn split_options(line: &str) -> (&str, &str) {
    line.char_indices()
        .find(|&(i, c)| c == '-' && line[i..].starts_with("--") && is_comment_start(line, i))
        .map_or((line, ""), |(i, _)| (line[..i].trim(), &line[i..]))
}

fn hash_options(options: &str) -> Vec<String> {
    let mut hashes = Vec::new();
    let mut tokens = options.split_whitespace();
    while let Some(token) = tokens.next() {
        let value = if let Some(value) = token.strip_prefix("--hash=") {
            Some(value)
        } else if token == "--hash" {
            tokens.next()
        } else {
            if token.starts_with("--") {
                debug!("ignoring requirement option {token}");
            }
            None
        };
        if let Some(value) = value.filter(|v| v.contains(':')) {
            hashes.push(value.to_owned());
        }
    }
    hashes
}

fn strip_marker(text: &str, location: bool) -> &str {
    for (i, _) in text.match_indices(';') {
        let spaced = text[..i].ends_with(char::is_whitespace)
            || text[i + 1..].starts_with(char::is_whitespace);
        if spaced || !location {
            return text[..i].trim();
        }
    }
    text.trim()
}

fn is_location(text: &str) -> bool {
    VCS_SCHEMES.iter().any(|s| text.starts_with(s))
        || text.contains("://")
        || text.starts_with("file:")
        || text.starts_with(['.', '/', '~'])
        || text.contains(['/', '\\'])
        || ARCHIVE_SUFFIXES.iter().any(|s| text.ends_with(s))
}

/// Split `scheme://host/path@rev` into the URI and its revision.
fn split_vcs_revision(base: &str) -> (String, Option<String>) {
    let host_start = base.find("://").map_or(0, |i| i + 3);
    let path_start = base[host_start..]
        .find('/')
        .map_or(base.len(), |i| host_start + i);
    match base[path_start..].rfind('@') {
        Some(i) => {
            let at = path_start + i;
            let rev = &base[at + 1..];
            (base[..at].to_owned(), (!rev.is_empty()).then(|| rev.to_owned()))
        }
        None => (base.to_owned(), None),
    }
}

fn parse_location(location: &str) -> Requirement {
    let (base, fragment) = location.split_once('#').unwrap_or((location, ""));
    let mut name = None;
    let mut hashes = Vec::new();
    for pair in fragment.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        if key == "egg" {
            let egg = value.split('[').next().unwrap_or_default();
            name = (!egg.is_empty()).then(|| egg.to_owned());
        } else if HASH_ALGORITHMS.contains(&key) && !value.is_empty() {
            hashes.push(format!("{key}:{value}"));
        }
    }

    let target = if VCS_SCHEMES.iter().any(|s| base.starts_with(s)) {
        let (uri, rev) = split_vcs_revision(base);
        Target::Vcs { uri, rev }
    } else if base.contains("://") || base.starts_with("file:") {
        Target::Url(base.to_owned())
    } else {
        Target::Path(base.to_owned())
    };

    Requirement {
        name,
        target,
        hashes,
    }
}

/// The version pinned by a single `==` or `===` clause. Prefix matches such
/// as `==1.*` pin nothing.
pub(crate) fn exact_version(specifiers: &VersionSpecifiers) -> Option<String> {
    match &**specifiers {
        [specifier] if matches!(specifier.operator(), Operator::Equal | Operator::ExactEqual) => {
            Some(specifier.version().to_string())
        }
        _ => None,
    }
}

/// The project name as spelled at the start of a requirement.
fn spelled_name(text: &str) -> &str {
    let text = text.trim_start();
    let end = text
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        .unwrap_or(text.len());
    &text[..end]
}

/// Split `name[extras] @ location` when the left side is a project name.
fn direct_reference(text: &str) -> Option<(&str, &str)> {
    let (head, location) = text.split_once('@')?;
    let name = head.split('[').next().unwrap_or_default().trim();
    let location = strip_marker(location, true);
    let named = PackageName::new(name.to_owned()).is_ok();
    (named && !location.is_empty()).then_some((name, location))
}

fn named_location(name: &str, location: &str) -> Requirement {
    let mut req = parse_location(location);
    req.name = Some(name.to_owned());
    req
}

fn from_pep508(text: &str, req: pep508_rs::Requirement) -> Requirement {
    let name = spelled_name(text);
    match req.version_or_url {
        Some(VersionOrUrl::Url(url)) => named_location(name, &url.to_string()),
        Some(VersionOrUrl::VersionSpecifier(specifiers)) => Requirement {
            name: Some(name.to_owned()),
            target: Target::Version(exact_version(&specifiers)),
            hashes: Vec::new(),
        },
        None => Requirement {
            name: Some(name.to_owned()),
            target: Target::Version(None),
            hashes: Vec::new(),
        },
    }
}

/// Parse the requirement part of a line. Bare locations and relative direct
/// references follow pip; everything else must be valid PEP 508.
fn parse_requirement(text: &str) -> Result<Requirement, String> {
    let direct = direct_reference(text);
    match direct {
        Some((name, location)) if !location.contains("://") => {
            return Ok(named_location(name, location));
        }
        None if is_location(strip_marker(text, false)) => {
            return Ok(parse_location(strip_marker(text, true)));
        }
        _ => {}
    }
    match text.parse::<pep508_rs::Requirement>() {
        Ok(req) => Ok(from_pep508(text, req)),
        Err(e) => match direct {
            Some((name, location)) => {
                debug!("direct reference '{text}' is not PEP 508 ({e}), reading it as pip does");
                Ok(named_location(name, location))
            }
            None => Err(e.to_string()),
        },
    }
}

fn convert_line(line: &str) -> Outcome<Entry> {
    let (editable, rest) = match strip_editable(line) {
        Some(rest) => (true, rest),
        None => (false, line),
    };
    if !editable && rest.starts_with('-') {
        return Outcome::Skipped(ConversionWarning::OptionIgnored {
            line: line.to_owned(),
        });
    }

    let (text, options) = split_options(rest);
    let mut req = match parse_requirement(text) {
        Ok(req) => req,
        Err(_) if !text.starts_with(|c: char| c.is_ascii_alphanumeric()) => {
            return ForeignError::RequirementNotNamed {
                line: line.to_owned(),
            }
            .into();
        }
        Err(reason) => {
            return ForeignError::RequirementInvalid {
                line: line.to_owned(),
                reason,
            }
            .into();
        }
    };
    req.hashes.extend(hash_options(options));

    let Some(name) = req.name else {
        return ForeignError::RequirementNotNamed {
            line: line.to_owned(),
        }
        .into();
    };
    let not_locked = || {
        Outcome::Fatal(ForeignError::RequirementNotLocked {
            line: line.to_owned(),
        })
    };

    let spec = match req.target {
        Target::Vcs { uri, rev } => {
            let Some(rev) = rev else {
                return not_locked();
            };
            let entry = Entry {
                package: PythonPackage::new(name.clone(), Spec::vcs(uri, rev)),
                hashes: req.hashes,
            };
            if editable {
                return Outcome::Degraded(entry, ConversionWarning::VcsPackageNotEditable { name });
            }
            return Outcome::Accepted(entry);
        }
        _ if editable => {
            return Outcome::Skipped(ConversionWarning::EditablePackageDropped { name });
        }
        Target::Url(url) => Spec::url(url),
        Target::Path(path) => Spec::path(path),
        Target::Version(Some(version)) => Spec::version(version),
        Target::Version(None) => return not_locked(),
    };

    Outcome::Accepted(Entry {
        package: PythonPackage::new(name, spec),
        hashes: req.hashes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use unilock_schema::{DependencyEdges, LockSchema};

    fn convert(text: &str) -> Conversion {
        RequirementsTxt::parse(text).unwrap().to_lock_file().unwrap()
    }

    fn convert_err(text: &str) -> ForeignError {
        RequirementsTxt::parse(text)
            .unwrap()
            .to_lock_file()
            .unwrap_err()
    }

    #[test]
    fn pinned_requirement_with_hash() {
        let conv = convert("flask==1.1.0 --hash=sha256:abcd\n");
        let value = conv.lock.to_value().unwrap();
        assert_eq!(
            value["dependencies"]["flask"]["python"],
            json!({"name": "flask", "version": "1.1.0"})
        );
        assert_eq!(value["hashes"]["flask"], json!(["sha256:abcd"]));
        assert_eq!(value["dependencies"][""]["dependencies"], json!(["flask"]));
        assert!(conv.warnings.is_empty());
        conv.lock.validate(&LockSchema::new()).unwrap();
    }

    #[test]
    fn url_fragment_hash_and_egg_name() {
        let conv = convert("https://example.com/Flask-1.1.0.whl#egg=Flask&sha256=abcd\n");
        let flask = conv.lock.package("flask").unwrap();
        assert_eq!(flask.name, "Flask");
        assert_eq!(flask.spec, Spec::url("https://example.com/Flask-1.1.0.whl"));
        assert_eq!(conv.lock.hashes_for("flask"), ["sha256:abcd"]);
    }

    #[test]
    fn direct_reference_names_the_package() {
        let conv = convert("pip @ https://github.com/pypa/pip/archive/1.3.1.zip ; python_version >= '3'\n");
        assert_eq!(
            conv.lock.package("pip").unwrap().spec,
            Spec::url("https://github.com/pypa/pip/archive/1.3.1.zip")
        );
    }

    #[test]
    fn pinned_vcs_reference() {
        let conv = convert("git+https://github.com/sarugaku/passa.git@a1b2c3#egg=passa\n");
        assert_eq!(
            conv.lock.package("passa").unwrap().spec,
            Spec::vcs("git+https://github.com/sarugaku/passa.git", "a1b2c3")
        );
    }

    #[test]
    fn vcs_user_at_host_is_not_a_revision() {
        assert_eq!(
            split_vcs_revision("git+ssh://git@github.com/org/repo.git@v1.0"),
            ("git+ssh://git@github.com/org/repo.git".to_owned(), Some("v1.0".to_owned()))
        );
        assert_eq!(
            split_vcs_revision("git+ssh://git@github.com/org/repo.git"),
            ("git+ssh://git@github.com/org/repo.git".to_owned(), None)
        );
    }

    #[test]
    fn unpinned_vcs_is_fatal() {
        let err = convert_err("git+https://github.com/sarugaku/passa.git#egg=passa\n");
        assert!(matches!(err, ForeignError::RequirementNotLocked { .. }));
    }

    #[test]
    fn editable_vcs_is_kept_with_warning() {
        let conv = convert("-e git+https://github.com/sarugaku/passa.git@abc#egg=passa\n");
        assert!(conv.lock.package("passa").is_some());
        assert_eq!(
            conv.warnings,
            vec![ConversionWarning::VcsPackageNotEditable {
                name: "passa".to_owned()
            }]
        );
    }

    #[test]
    fn editable_path_is_dropped() {
        let conv = convert("--editable ./src/mypkg#egg=mypkg\nsix==1.12.0\n");
        assert!(conv.lock.package("mypkg").is_none());
        assert!(conv.lock.package("six").is_some());
        assert_eq!(
            conv.warnings,
            vec![ConversionWarning::EditablePackageDropped {
                name: "mypkg".to_owned()
            }]
        );
        assert_eq!(
            conv.lock.edges(""),
            Some(&DependencyEdges::Names(["six".to_owned()].into()))
        );
    }

    #[test]
    fn local_path_requirement() {
        let conv = convert("./wheels/pywin32-224-cp37-win32.whl#egg=pywin32\n");
        assert_eq!(
            conv.lock.package("pywin32").unwrap().spec,
            Spec::path("./wheels/pywin32-224-cp37-win32.whl")
        );
    }

    #[test]
    fn loose_or_multiple_specifiers_are_fatal() {
        for text in [
            "requests>=2.0",
            "requests==2.0,<3",
            "requests",
            "requests~=2.0",
            "six==1.*",
        ] {
            let err = convert_err(text);
            assert!(
                matches!(err, ForeignError::RequirementNotLocked { .. }),
                "{text}: {err}"
            );
        }
    }

    #[test]
    fn unnamed_requirement_is_fatal() {
        for text in ["==1.0", "https://example.com/pkg.whl", "./local/dir"] {
            let err = convert_err(text);
            assert!(
                matches!(err, ForeignError::RequirementNotNamed { .. }),
                "{text}: {err}"
            );
        }
    }

    #[test]
    fn arbitrary_equality_extras_and_markers() {
        let conv = convert(
            "Requests[security]===2.21.0 ; python_version >= \"3\"\nzope.interface==4.6.0;os_name=='nt'\n",
        );
        let requests = conv.lock.package("requests").unwrap();
        assert_eq!(requests.name, "Requests");
        assert_eq!(requests.spec, Spec::version("2.21.0"));
        assert_eq!(
            conv.lock.package("zope-interface").unwrap().spec,
            Spec::version("4.6.0")
        );
        assert_eq!(
            conv.lock.edges("").unwrap().iter().collect::<Vec<_>>(),
            vec![("requests", None), ("zope-interface", None)]
        );
    }

    #[test]
    fn comments_continuations_and_hash_lists() {
        let text = "\
# top comment
six==1.12.0 \\
    --hash=sha256:bbb \\
    --hash sha256:aaa  # trailing comment

   \n";
        let conv = convert(text);
        assert_eq!(conv.lock.hashes_for("six"), ["sha256:aaa", "sha256:bbb"]);
        assert!(conv.warnings.is_empty());
    }

    #[test]
    fn option_lines_are_ignored_with_warning() {
        let conv = convert("--index-url https://pypi.org/simple\n-r base.txt\nsix==1.12.0\n");
        assert_eq!(conv.warnings.len(), 2);
        assert!(matches!(
            &conv.warnings[0],
            ConversionWarning::OptionIgnored { line } if line == "--index-url https://pypi.org/simple"
        ));
        assert!(conv.lock.package("six").is_some());
    }

    #[test]
    fn empty_input_has_empty_default_section() {
        let conv = convert("# nothing\n\n");
        let value = conv.lock.to_value().unwrap();
        assert_eq!(
            value,
            json!({"sources": {}, "dependencies": {"": {"dependencies": []}}, "hashes": {}})
        );
    }

    #[test]
    fn same_requirement_twice_is_merged() {
        let conv = convert("six==1.12.0 --hash=sha256:a\nSix==1.12.0 --hash=sha256:b\n");
        assert_eq!(conv.lock.packages().count(), 1);
        assert_eq!(conv.lock.hashes_for("six"), ["sha256:a", "sha256:b"]);
    }

    #[test]
    fn conflicting_requirements_are_aliased() {
        let conv = convert("six==1.12.0\nsix==1.11.0\n");
        assert!(conv.lock.package("six").is_none());
        assert_eq!(conv.lock.package("six@0").unwrap().spec, Spec::version("1.12.0"));
        assert_eq!(conv.lock.package("six@1").unwrap().spec, Spec::version("1.11.0"));
        assert_eq!(
            conv.lock.edges("").unwrap().iter().collect::<Vec<_>>(),
            vec![("six@0", None), ("six@1", None)]
        );
    }

    #[test]
    fn malformed_requirement_is_fatal() {
        for text in ["six==", "six (==1.0", "six[ssl==1.0"] {
            let err = convert_err(text);
            assert!(
                matches!(err, ForeignError::RequirementInvalid { .. }),
                "{text}: {err}"
            );
        }
    }

    #[test]
    fn direct_reference_to_relative_path() {
        let conv = convert("mypkg @ ./vendor/mypkg-1.0.tar.gz\n");
        assert_eq!(
            conv.lock.package("mypkg").unwrap().spec,
            Spec::path("./vendor/mypkg-1.0.tar.gz")
        );
    }

    #[test]
    fn exact_version_needs_a_single_pin() {
        let exact = |text: &str| exact_version(&text.parse::<VersionSpecifiers>().unwrap());
        assert_eq!(exact("==1.0").as_deref(), Some("1.0"));
        assert_eq!(exact("===2.21.0").as_deref(), Some("2.21.0"));
        assert_eq!(exact("==1.*"), None);
        assert_eq!(exact(">=1.0"), None);
        assert_eq!(exact("==1.0,!=1.1"), None);
    }

    #[test]
    fn repeated_name_keeps_hashes_per_pin() {
        let conv = convert("six==1.12.0 --hash=sha256:aaa\nsix==1.11.0 --hash=sha256:bbb\n");
        assert_eq!(conv.lock.hashes_for("six@0"), ["sha256:aaa"]);
        assert_eq!(conv.lock.hashes_for("six@1"), ["sha256:bbb"]);
    }
}
