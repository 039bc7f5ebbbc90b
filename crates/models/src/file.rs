use crate::error::{ErrorKind, Result};
use exn::OptionExt;
use serde::{Deserialize, Serialize};
use std::path::{MAIN_SEPARATOR, Path};
use uuid::Uuid;

const LOCAL_PREFIX: &str = "local_";

/// A pointer to downloadable content.
///
/// Created once (at import time) and referenced by `id` afterwards. A changed
/// file gets a new `FileRef`; existing ones are never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub id: String,
    /// Candidate sources, in order of preference.
    pub urls: Vec<String>,
}
impl FileRef {
    /// A reference with a freshly generated id.
    pub fn new(urls: Vec<String>) -> Self {
        Self { id: format!("{LOCAL_PREFIX}{}", Uuid::new_v4().simple()), urls }
    }

    /// Reference an asset shipped on the local file system.
    pub fn local(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_str().ok_or_raise(|| ErrorKind::InvalidPath)?;
        let path = path.replace(MAIN_SEPARATOR, "/");
        Ok(Self::new(vec![format!("file://{path}")]))
    }

    /// Whether this reference was generated locally rather than handed out
    /// by a remote repository.
    pub fn is_local(&self) -> bool {
        self.id.starts_with(LOCAL_PREFIX)
    }
}
