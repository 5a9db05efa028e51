use super::{json_pretty, load_lock, Project, EXIT_NOT_ACCOUNTED, EXIT_SUCCESS};
use std::path::Path;
use unilock_foreign::ForeignFormat;

pub fn run(
    project: &Project,
    input: Option<&Path>,
    format: Option<ForeignFormat>,
    lock: Option<&Path>,
    json: bool,
) -> Result<u8, String> {
    let foreign = project.foreign(input, format)?;
    let lock_path = project.lock_path(lock);
    let existing = load_lock(&lock_path)?;
    let accounted = foreign.is_accounted_for(&existing);

    if json {
        let payload = serde_json::json!({
            "input": foreign.path.display().to_string(),
            "format": foreign.format.as_str(),
            "lock": lock_path.display().to_string(),
            "accounted_for": accounted,
        });
        println!("{}", json_pretty(&payload)?);
    } else if accounted {
        println!(
            "{} accounts for {}",
            lock_path.display(),
            foreign.path.display()
        );
    } else {
        println!(
            "{} does not account for {}; run `unilock convert`",
            lock_path.display(),
            foreign.path.display()
        );
    }

    Ok(if accounted {
        EXIT_SUCCESS
    } else {
        EXIT_NOT_ACCOUNTED
    })
}
