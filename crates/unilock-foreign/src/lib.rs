//! Foreign lock adapters for unilock.
//!
//! Each adapter parses one third-party lock syntax into typed intermediate
//! records and converts them into a canonical [`LockFile`]. The same
//! conversion backs the "already accounted for" check, which decides whether
//! an existing canonical lock still captures everything a foreign lock says.

pub mod accounted;
pub mod detect;
pub mod error;
pub mod outcome;
pub mod pipfile;
pub mod poetry;
pub mod requirements;

pub use accounted::{conversion_accounted_for, is_accounted_for};
pub use detect::{Foreign, ForeignFormat};
pub use error::ForeignError;
pub use outcome::{Conversion, ConversionWarning, Outcome};
pub use pipfile::PipfileLock;
pub use poetry::PoetryLock;
pub use requirements::RequirementsTxt;

use unilock_schema::LockFile;

/// A parsed foreign lock document.
pub trait ForeignLock: Sized {
    /// Parse the document text.
    fn parse(content: &str) -> Result<Self, ForeignError>;

    /// Convert into a canonical lock file.
    fn to_lock_file(&self) -> Result<Conversion, ForeignError>;

    /// Whether `lock` already captures everything in this document.
    ///
    /// A document that fails to convert is never accounted for.
    fn is_accounted_for(&self, lock: &LockFile) -> bool {
        conversion_accounted_for(self.to_lock_file(), lock)
    }
}
