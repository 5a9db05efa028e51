//! Per-entry conversion results and recoverable warnings.

use crate::error::ForeignError;
use std::fmt;
use tracing::warn;
use unilock_schema::LockFile;

/// Something a conversion dropped or changed while still succeeding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionWarning {
    /// A non-VCS editable package was left out.
    EditablePackageDropped { name: String },
    /// An editable VCS package was kept without its editable flag.
    VcsPackageNotEditable { name: String },
    /// A package's index association was dropped because its spec is not a version.
    SourceDropped { package: String, source: String },
    /// A later source with an already used name and another URL was dropped.
    DuplicateSourceDropped { name: String, url: String },
    /// A requirements option line was not translated.
    OptionIgnored { line: String },
}

impl ConversionWarning {
    /// Stable identifier for machine-readable output.
    pub fn kind(&self) -> &'static str {
        match self {
            ConversionWarning::EditablePackageDropped { .. } => "editable_package_dropped",
            ConversionWarning::VcsPackageNotEditable { .. } => "vcs_package_not_editable",
            ConversionWarning::SourceDropped { .. } => "source_dropped",
            ConversionWarning::DuplicateSourceDropped { .. } => "duplicate_source_dropped",
            ConversionWarning::OptionIgnored { .. } => "option_ignored",
        }
    }
}

impl fmt::Display for ConversionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionWarning::EditablePackageDropped { name } => {
                write!(f, "editable package '{name}' dropped")
            }
            ConversionWarning::VcsPackageNotEditable { name } => {
                write!(f, "VCS package '{name}' converted as non-editable")
            }
            ConversionWarning::SourceDropped { package, source } => {
                write!(f, "source '{source}' dropped for package '{package}' (not a version pin)")
            }
            ConversionWarning::DuplicateSourceDropped { name, url } => {
                write!(f, "duplicate source '{name}' ({url}) dropped")
            }
            ConversionWarning::OptionIgnored { line } => write!(f, "option '{line}' ignored"),
        }
    }
}

/// Log a warning and keep it for the caller.
pub(crate) fn record(warnings: &mut Vec<ConversionWarning>, warning: ConversionWarning) {
    warn!("{warning}");
    warnings.push(warning);
}

/// Result of converting one foreign entry.
#[derive(Debug)]
pub enum Outcome<T> {
    Accepted(T),
    Degraded(T, ConversionWarning),
    Skipped(ConversionWarning),
    Fatal(ForeignError),
}

impl<T> Outcome<T> {
    /// Keep the value, if any, and move the warning into `warnings`.
    pub fn collect(self, warnings: &mut Vec<ConversionWarning>) -> Result<Option<T>, ForeignError> {
        match self {
            Outcome::Accepted(value) => Ok(Some(value)),
            Outcome::Degraded(value, warning) => {
                record(warnings, warning);
                Ok(Some(value))
            }
            Outcome::Skipped(warning) => {
                record(warnings, warning);
                Ok(None)
            }
            Outcome::Fatal(err) => Err(err),
        }
    }
}

impl<T> From<ForeignError> for Outcome<T> {
    fn from(err: ForeignError) -> Self {
        Outcome::Fatal(err)
    }
}

/// A converted lock file and the warnings raised while building it.
#[derive(Debug)]
pub struct Conversion {
    pub lock: LockFile,
    pub warnings: Vec<ConversionWarning>,
}
