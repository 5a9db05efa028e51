//! Locating foreign lock files and dispatching to their adapters.

use crate::accounted::conversion_accounted_for;
use crate::error::ForeignError;
use crate::outcome::Conversion;
use crate::{ForeignLock, PipfileLock, PoetryLock, RequirementsTxt};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;
use unilock_schema::LockFile;

/// A supported foreign lock syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForeignFormat {
    Requirements,
    Pipfile,
    Poetry,
}

impl ForeignFormat {
    /// Detection order: the first existing file wins.
    pub const ALL: [ForeignFormat; 3] = [
        ForeignFormat::Pipfile,
        ForeignFormat::Poetry,
        ForeignFormat::Requirements,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ForeignFormat::Requirements => "requirements",
            ForeignFormat::Pipfile => "pipfile",
            ForeignFormat::Poetry => "poetry",
        }
    }

    /// Conventional file name of this format.
    pub fn file_name(self) -> &'static str {
        match self {
            ForeignFormat::Requirements => "requirements.txt",
            ForeignFormat::Pipfile => "Pipfile.lock",
            ForeignFormat::Poetry => "poetry.lock",
        }
    }

    /// Guess the format from a file name.
    pub fn from_file_name(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        match name {
            "Pipfile.lock" => Some(ForeignFormat::Pipfile),
            "poetry.lock" => Some(ForeignFormat::Poetry),
            _ if Path::new(name).extension().is_some_and(|ext| ext == "txt") => {
                Some(ForeignFormat::Requirements)
            }
            _ => None,
        }
    }

    /// Parse and convert `content` with this format's adapter.
    pub fn convert(self, content: &str) -> Result<Conversion, ForeignError> {
        match self {
            ForeignFormat::Requirements => RequirementsTxt::parse(content)?.to_lock_file(),
            ForeignFormat::Pipfile => PipfileLock::parse(content)?.to_lock_file(),
            ForeignFormat::Poetry => PoetryLock::parse(content)?.to_lock_file(),
        }
    }

    /// Whether `lock` captures `content`. Unparseable content never is.
    pub fn is_accounted_for(self, content: &str, lock: &LockFile) -> bool {
        debug!("checking {self} lock against the canonical lock");
        conversion_accounted_for(self.convert(content), lock)
    }
}

impl fmt::Display for ForeignFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForeignFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requirements" => Ok(ForeignFormat::Requirements),
            "pipfile" => Ok(ForeignFormat::Pipfile),
            "poetry" => Ok(ForeignFormat::Poetry),
            other => Err(format!(
                "unknown lock format '{other}' (expected requirements, pipfile or poetry)"
            )),
        }
    }
}

/// A foreign lock file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Foreign {
    pub format: ForeignFormat,
    pub path: PathBuf,
}

impl Foreign {
    pub fn new(format: ForeignFormat, path: impl Into<PathBuf>) -> Self {
        Self {
            format,
            path: path.into(),
        }
    }

    /// Find the first supported lock file in `dir`.
    pub fn find_in(dir: &Path) -> Option<Self> {
        ForeignFormat::ALL.into_iter().find_map(|format| {
            let path = dir.join(format.file_name());
            path.is_file().then(|| {
                debug!("found {} at {}", format, path.display());
                Self { format, path }
            })
        })
    }

    /// Take `path` with an explicit format, or the format its file name implies.
    pub fn at(path: impl Into<PathBuf>, format: Option<ForeignFormat>) -> Option<Self> {
        let path = path.into();
        let format = format.or_else(|| ForeignFormat::from_file_name(&path))?;
        Some(Self { format, path })
    }

    pub fn read(&self) -> Result<String, ForeignError> {
        Ok(fs::read_to_string(&self.path)?)
    }

    pub fn convert(&self) -> Result<Conversion, ForeignError> {
        self.format.convert(&self.read()?)
    }

    /// Whether `lock` captures this file. An unreadable file never is.
    pub fn is_accounted_for(&self, lock: &LockFile) -> bool {
        match self.read() {
            Ok(content) => self.format.is_accounted_for(&content, lock),
            Err(e) => {
                debug!("cannot read {}: {e}", self.path.display());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names_roundtrip() {
        for format in ForeignFormat::ALL {
            assert_eq!(format.as_str().parse::<ForeignFormat>().unwrap(), format);
            assert_eq!(format.to_string(), format.as_str());
        }
        assert!("cargo".parse::<ForeignFormat>().is_err());
    }

    #[test]
    fn format_from_file_name() {
        assert_eq!(
            ForeignFormat::from_file_name(Path::new("/x/Pipfile.lock")),
            Some(ForeignFormat::Pipfile)
        );
        assert_eq!(
            ForeignFormat::from_file_name(Path::new("poetry.lock")),
            Some(ForeignFormat::Poetry)
        );
        assert_eq!(
            ForeignFormat::from_file_name(Path::new("requirements-dev.txt")),
            Some(ForeignFormat::Requirements)
        );
        assert_eq!(ForeignFormat::from_file_name(Path::new("Cargo.lock")), None);
    }

    #[test]
    fn find_in_prefers_pipfile_then_poetry() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Foreign::find_in(dir.path()).is_none());

        fs::write(dir.path().join("requirements.txt"), "six==1.12.0\n").unwrap();
        assert_eq!(
            Foreign::find_in(dir.path()).unwrap().format,
            ForeignFormat::Requirements
        );

        fs::write(dir.path().join("poetry.lock"), "").unwrap();
        assert_eq!(Foreign::find_in(dir.path()).unwrap().format, ForeignFormat::Poetry);

        fs::write(dir.path().join("Pipfile.lock"), "{}").unwrap();
        let found = Foreign::find_in(dir.path()).unwrap();
        assert_eq!(found.format, ForeignFormat::Pipfile);
        assert_eq!(found.path, dir.path().join("Pipfile.lock"));
    }

    #[test]
    fn explicit_format_overrides_file_name() {
        let foreign = Foreign::at("locks/pinned.lock", Some(ForeignFormat::Requirements)).unwrap();
        assert_eq!(foreign.format, ForeignFormat::Requirements);
        assert!(Foreign::at("locks/pinned.lock", None).is_none());
    }

    #[test]
    fn convert_and_account_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requirements.txt");
        fs::write(&path, "six==1.12.0 --hash=sha256:abc\n").unwrap();
        let foreign = Foreign::at(&path, None).unwrap();

        let conv = foreign.convert().unwrap();
        assert!(foreign.is_accounted_for(&conv.lock));
        assert!(!foreign.is_accounted_for(&LockFile::default()));

        fs::remove_file(&path).unwrap();
        assert!(!foreign.is_accounted_for(&conv.lock));
    }

    #[test]
    fn unparseable_content_is_not_accounted_for() {
        assert!(!ForeignFormat::Pipfile.is_accounted_for("not json", &LockFile::default()));
        assert!(!ForeignFormat::Poetry.is_accounted_for("[[package]]\n", &LockFile::default()));
    }
}
