//! Whether a persisted lock already captures a freshly converted one.

use crate::error::ForeignError;
use crate::outcome::Conversion;
use tracing::debug;
use unilock_schema::LockFile;

/// Whether `lock` captures the result of a conversion. A failed conversion
/// is never accounted for.
pub fn conversion_accounted_for(
    conversion: Result<Conversion, ForeignError>,
    lock: &LockFile,
) -> bool {
    match conversion {
        Ok(fresh) => is_accounted_for(&fresh.lock, lock),
        Err(e) => {
            debug!("conversion failed, lock not accounted for: {e}");
            false
        }
    }
}

/// Compare a fresh conversion against a persisted lock.
///
/// Everything in `fresh` must appear in `lock`: every source with the same
/// URL and TLS verification, every package with the same spec, every edge
/// with the same markers, and every hash. `lock` may carry more edges and
/// more hashes than `fresh`.
pub fn is_accounted_for(fresh: &LockFile, lock: &LockFile) -> bool {
    sources_match(fresh, lock)
        && packages_match(fresh, lock)
        && edges_match(fresh, lock)
        && hashes_match(fresh, lock)
}

fn sources_match(fresh: &LockFile, lock: &LockFile) -> bool {
    fresh.sources().iter().all(|(name, source)| {
        let ok = lock.source(name).is_some_and(|s| {
            s.url == source.url && s.verify_ssl() == source.verify_ssl()
        });
        if !ok {
            debug!("source {name} not accounted for");
        }
        ok
    })
}

fn packages_match(fresh: &LockFile, lock: &LockFile) -> bool {
    fresh.packages().all(|(key, package)| {
        let ok = lock.package(key).is_some_and(|p| p.spec == package.spec);
        if !ok {
            debug!("package {key} not accounted for");
        }
        ok
    })
}

fn edges_match(fresh: &LockFile, lock: &LockFile) -> bool {
    fresh.dependencies().iter().all(|(parent, entry)| {
        let Some(edges) = &entry.dependencies else {
            return true;
        };
        let persisted = lock.edges(parent);
        edges.iter().all(|(child, markers)| {
            let ok = persisted.and_then(|p| p.get(child)) == Some(markers);
            if !ok {
                debug!("edge {parent:?} -> {child} not accounted for");
            }
            ok
        })
    })
}

fn hashes_match(fresh: &LockFile, lock: &LockFile) -> bool {
    fresh.hashes().iter().all(|(key, hashes)| {
        let persisted = lock.hashes_for(key);
        let ok = hashes.iter().all(|h| persisted.contains(h));
        if !ok {
            debug!("hashes of {key} not accounted for");
        }
        ok
    })
}
