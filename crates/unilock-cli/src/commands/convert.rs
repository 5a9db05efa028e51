use super::{json_pretty, warnings_json, Project, EXIT_SUCCESS};
use std::path::Path;
use tracing::{debug, info, warn};
use unilock_foreign::{Foreign, ForeignFormat};
use unilock_schema::{LockFile, LockSchema};

pub fn run(
    project: &Project,
    input: Option<&Path>,
    format: Option<ForeignFormat>,
    output: Option<&Path>,
    force: bool,
    json: bool,
) -> Result<u8, String> {
    let foreign = project.foreign(input, format)?;
    let lock_path = project.lock_path(output);
    let schema = LockSchema::new();

    if !force && up_to_date(&foreign, &lock_path, &schema) {
        if json {
            let payload = serde_json::json!({
                "status": "up_to_date",
                "input": foreign.path.display().to_string(),
                "format": foreign.format.as_str(),
                "output": lock_path.display().to_string(),
            });
            println!("{}", json_pretty(&payload)?);
        } else {
            println!(
                "{} already accounts for {}",
                lock_path.display(),
                foreign.path.display()
            );
        }
        return Ok(EXIT_SUCCESS);
    }

    let conv = foreign
        .convert()
        .map_err(|e| format!("conversion failed: {}: {e}", foreign.path.display()))?;
    if project.config.deny_warnings && !conv.warnings.is_empty() {
        return Err(format!(
            "conversion failed: {} warning(s) and deny_warnings is set",
            conv.warnings.len()
        ));
    }
    conv.lock
        .validate(&schema)
        .map_err(|e| format!("invalid lock file produced from {}: {e}", foreign.path.display()))?;
    conv.lock
        .write_to_file(&lock_path)
        .map_err(|e| format!("failed to write {}: {e}", lock_path.display()))?;
    info!("converted {} to {}", foreign.path.display(), lock_path.display());

    let packages = conv.lock.packages().count();
    if json {
        let payload = serde_json::json!({
            "status": "written",
            "input": foreign.path.display().to_string(),
            "format": foreign.format.as_str(),
            "output": lock_path.display().to_string(),
            "packages": packages,
            "warnings": warnings_json(&conv.warnings),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "wrote {} ({packages} packages from {} {})",
            lock_path.display(),
            foreign.format,
            foreign.path.display()
        );
        if !conv.warnings.is_empty() {
            println!("{} warning(s) reported", conv.warnings.len());
        }
    }
    Ok(EXIT_SUCCESS)
}

fn up_to_date(foreign: &Foreign, lock_path: &Path, schema: &LockSchema) -> bool {
    if !lock_path.is_file() {
        return false;
    }
    match LockFile::read_from_file(lock_path, schema) {
        Ok(existing) => {
            let accounted = foreign.is_accounted_for(&existing);
            debug!("existing lock accounts for input: {accounted}");
            accounted
        }
        Err(e) => {
            warn!("ignoring existing {}: {e}", lock_path.display());
            false
        }
    }
}
