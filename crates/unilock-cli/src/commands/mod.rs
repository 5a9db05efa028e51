pub mod check;
pub mod completions;
pub mod convert;
pub mod show;
pub mod validate;

use crate::config::ProjectConfig;
use std::path::{Path, PathBuf};
use unilock_foreign::{ConversionWarning, Foreign, ForeignFormat};
use unilock_schema::{LockError, LockFile, LockSchema};

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONVERT_ERROR: u8 = 2;
pub const EXIT_NOT_ACCOUNTED: u8 = 3;
pub const EXIT_VALIDATION_ERROR: u8 = 4;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn colorize_spec(kind: &str) -> String {
    use console::Style;
    match kind {
        "version" => Style::new().green().apply_to(kind).to_string(),
        "url" => Style::new().cyan().apply_to(kind).to_string(),
        "path" => Style::new().yellow().apply_to(kind).to_string(),
        "vcs" => Style::new().magenta().apply_to(kind).to_string(),
        other => other.to_owned(),
    }
}

/// Display label of a section key; the unnamed default section has none.
pub fn section_label(key: &str) -> &str {
    if key.is_empty() {
        "(default)"
    } else {
        key
    }
}

pub fn warnings_json(warnings: &[ConversionWarning]) -> Vec<serde_json::Value> {
    warnings
        .iter()
        .map(|w| serde_json::json!({"kind": w.kind(), "message": w.to_string()}))
        .collect()
}

/// Read and validate a canonical lock, mapping failures to CLI messages.
pub fn load_lock(path: &Path) -> Result<LockFile, String> {
    LockFile::read_from_file(path, &LockSchema::new()).map_err(|e| match e {
        LockError::Io(e) => format!("failed to read {}: {e}", path.display()),
        other => format!("invalid lock file {}: {other}", path.display()),
    })
}

/// The project directory with its settings.
#[derive(Debug, Clone)]
pub struct Project {
    pub dir: PathBuf,
    pub config: ProjectConfig,
}

impl Project {
    pub fn load(dir: PathBuf) -> Result<Self, String> {
        let config = ProjectConfig::load(&dir)?;
        Ok(Self { dir, config })
    }

    /// The foreign lock to work on: explicit `input`, the configured or
    /// requested format's conventional file, or the first one detected.
    pub fn foreign(
        &self,
        input: Option<&Path>,
        format: Option<ForeignFormat>,
    ) -> Result<Foreign, String> {
        let format = format.or(self.config.format);
        if let Some(path) = input {
            return Foreign::at(path, format).ok_or_else(|| {
                format!(
                    "cannot tell the lock format of {}; pass --format",
                    path.display()
                )
            });
        }
        match format {
            Some(format) => {
                let path = self.dir.join(format.file_name());
                if path.is_file() {
                    Ok(Foreign::new(format, path))
                } else {
                    Err(format!("no {} in {}", format.file_name(), self.dir.display()))
                }
            }
            None => Foreign::find_in(&self.dir).ok_or_else(|| {
                format!(
                    "no Pipfile.lock, poetry.lock or requirements.txt in {}",
                    self.dir.display()
                )
            }),
        }
    }

    /// The canonical lock path: `explicit` as given, else the configured
    /// file inside the project directory.
    pub fn lock_path(&self, explicit: Option<&Path>) -> PathBuf {
        explicit.map_or_else(|| self.dir.join(self.config.lock_file()), Path::to_path_buf)
    }
}
