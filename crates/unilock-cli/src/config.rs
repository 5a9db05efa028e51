use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use unilock_foreign::ForeignFormat;

pub const CONFIG_FILE: &str = "unilock.toml";
pub const DEFAULT_LOCK_FILE: &str = "unilock.lock.json";

/// Project settings read from `unilock.toml`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Canonical lock file, relative to the project directory.
    #[serde(default)]
    pub output: Option<PathBuf>,
    /// Treat recoverable conversion warnings as failures.
    #[serde(default)]
    pub deny_warnings: bool,
    /// Foreign format to use instead of detection.
    #[serde(default)]
    pub format: Option<ForeignFormat>,
}

impl ProjectConfig {
    /// Load `unilock.toml` from `dir`, or defaults when there is none.
    pub fn load(dir: &Path) -> Result<Self, String> {
        let path = dir.join(CONFIG_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        toml::from_str(&content).map_err(|e| format!("config error in {}: {e}", path.display()))
    }

    pub fn lock_file(&self) -> &Path {
        self.output
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_LOCK_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(config, ProjectConfig::default());
        assert_eq!(config.lock_file(), Path::new("unilock.lock.json"));
    }

    #[test]
    fn all_fields_parse() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "output = \"locks/py.json\"\ndeny_warnings = true\nformat = \"poetry\"\n",
        )
        .unwrap();
        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(config.lock_file(), Path::new("locks/py.json"));
        assert!(config.deny_warnings);
        assert_eq!(config.format, Some(ForeignFormat::Poetry));
    }

    #[test]
    fn unknown_field_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "outptu = \"x.json\"\n").unwrap();
        let err = ProjectConfig::load(dir.path()).unwrap_err();
        assert!(err.starts_with("config error"));
    }

    #[test]
    fn unknown_format_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "format = \"cargo\"\n").unwrap();
        assert!(ProjectConfig::load(dir.path()).is_err());
    }
}
