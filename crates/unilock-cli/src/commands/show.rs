use super::{colorize_spec, json_pretty, load_lock, section_label, Project, EXIT_SUCCESS};
use std::path::Path;
use unilock_schema::Spec;

fn describe(spec: &Spec) -> String {
    match spec {
        Spec::Version {
            version,
            source: Some(source),
        } => format!("=={version} ({source})"),
        Spec::Version {
            version,
            source: None,
        } => format!("=={version}"),
        Spec::Url { url, .. } => url.clone(),
        Spec::Path { path } => path.clone(),
        Spec::Vcs { vcs, rev } => format!("{vcs}@{rev}"),
    }
}

pub fn run(project: &Project, path: Option<&Path>, json: bool) -> Result<u8, String> {
    let lock_path = project.lock_path(path);
    let lock = load_lock(&lock_path)?;

    if json {
        let sections: serde_json::Map<String, serde_json::Value> = lock
            .sections()
            .map(|(key, edges)| {
                let members: Vec<_> = edges
                    .iter()
                    .map(|(child, markers)| {
                        let package = lock.package(child);
                        serde_json::json!({
                            "key": child,
                            "name": package.map(|p| p.name.as_str()),
                            "spec": package.map(|p| p.spec.kind()),
                            "pin": package.map(|p| describe(&p.spec)),
                            "markers": markers,
                        })
                    })
                    .collect();
                (key.to_owned(), serde_json::Value::Array(members))
            })
            .collect();
        let payload = serde_json::json!({
            "path": lock_path.display().to_string(),
            "sources": lock.sources(),
            "sections": sections,
        });
        println!("{}", json_pretty(&payload)?);
        return Ok(EXIT_SUCCESS);
    }

    for (name, source) in lock.sources() {
        let tls = if source.verify_ssl() { "" } else { " (no TLS verify)" };
        println!("source {name}: {}{tls}", source.url);
    }
    for (key, edges) in lock.sections() {
        println!("{}", console::style(section_label(key)).bold());
        for (child, markers) in edges.iter() {
            let Some(package) = lock.package(child) else {
                println!("  {child}  (no package entry)");
                continue;
            };
            let mut line = format!(
                "  {child}  {}  {}",
                colorize_spec(package.spec.kind()),
                describe(&package.spec)
            );
            if let Some(markers) = markers {
                line.push_str(&format!("  ; {}", markers.join(" or ")));
            }
            println!("{line}");
        }
    }
    Ok(EXIT_SUCCESS)
}
