use thiserror::Error;

/// A failure that aborts a conversion.
#[derive(Debug, Error)]
pub enum ForeignError {
    #[error("foreign lock I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unsupported Pipfile.lock specification version: {0}")]
    UnsupportedPipfileSpec(String),
    #[error("package '{name}' is not pinned to an exact version: '{version}'")]
    InvalidVersion { name: String, version: String },
    #[error("requirement has no project name: '{line}'")]
    RequirementNotNamed { line: String },
    #[error("invalid requirement '{line}': {reason}")]
    RequirementInvalid { line: String, reason: String },
    #[error("requirement is not locked: '{line}'")]
    RequirementNotLocked { line: String },
    #[error("package '{0}' has no supported specifier")]
    PackageSpecifierNotSupported(String),
    #[error("source '{name}' is defined with different URLs: {first} and {second}")]
    SourceNameDuplicated {
        name: String,
        first: String,
        second: String,
    },
}
