use super::{json_pretty, load_lock, Project, EXIT_SUCCESS};
use std::path::Path;

pub fn run(project: &Project, path: Option<&Path>, json: bool) -> Result<u8, String> {
    let lock_path = project.lock_path(path);
    let lock = load_lock(&lock_path)?;
    let packages = lock.packages().count();
    let sections = lock.sections().count();

    if json {
        let payload = serde_json::json!({
            "path": lock_path.display().to_string(),
            "valid": true,
            "sources": lock.sources().len(),
            "sections": sections,
            "packages": packages,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "{} is valid ({packages} packages, {sections} sections)",
            lock_path.display()
        );
    }
    Ok(EXIT_SUCCESS)
}
