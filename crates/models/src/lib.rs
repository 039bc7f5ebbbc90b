//! Catalog data model.
//!
//! These are the decoded, in-memory shapes of everything the catalog store
//! persists. The store owns the byte representation; callers own these copies.

mod checksum;
pub mod error;
mod file;
mod release;
mod settings;
pub mod timestamp;
mod version;

pub use crate::checksum::Checksum;
pub use crate::file::FileRef;
pub use crate::release::{
    Dependency, EngineExecutable, ExecutableCapabilities, ModType, Package, PackageArchive, PackageFile,
    PackageStatus, Release, ReleaseStability,
};
pub use crate::settings::{EngineFlags, HttpCacheEntry, Settings, UserModSettings};
pub use crate::version::{Identifier, Version};
