//! Canonical lock model, name canonicalization, validation, and serialization for unilock.
//!
//! This crate defines the target format every foreign lock is normalized into:
//! the typed model (`LockFile`), the structural contract it must satisfy
//! (`LockSchema`), package-name canonicalization and alias resolution
//! (`canonicalize_name`, `LockBuilder`), and the byte-stable serializer used
//! for persisting and comparing lock files.

pub mod builder;
pub mod lock;
pub mod names;
pub mod serialize;
pub mod types;
pub mod validate;

pub use builder::{LockBuilder, SourceInsert};
pub use lock::{Dependency, DependencyEdges, LockError, LockFile, PythonPackage, Source, Spec};
pub use names::{
    alias_key, canonicalize_name, classify_key, section_key, KeyKind, DEFAULT_SECTION, DEV_SECTION,
};
pub use serialize::{to_canonical_string, write_canonical, CanonicalFormatter};
pub use types::CanonicalName;
pub use validate::{Constraint, LockSchema, ValidationError};
