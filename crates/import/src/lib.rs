//! Import of local mod manifests (`mod.json`) into the catalog.
//!
//! Each manifest is read, parsed and converted (asset paths resolved, dates
//! and checksums decoded) before the store is touched, then written in its
//! own transaction. The first manifest that fails stops the import; the ones
//! before it stay imported.

mod convert;
pub mod error;
mod manifest;

pub use crate::convert::{Prepared, convert};
pub use crate::manifest::{
    ArchiveManifest, ChecksumManifest, DependencyManifest, ExecutableManifest, ExecutableProperties, FileManifest,
    ModManifest, PackageManifest,
};
use crate::error::{ErrorKind, Result};
use async_stream::stream;
use exn::ResultExt;
use modcat_store::error::{Error as StoreError, ErrorKind as StoreErrorKind};
use modcat_store::{Context, Store};
use std::path::{Path, PathBuf};
use tracing::instrument;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
}

/// Read a manifest from disk and convert it, relative to its own directory.
pub async fn prepare(path: &Path) -> Result<Prepared> {
    let bytes = tokio::fs::read(path).await.or_raise(|| ErrorKind::Io(path.to_path_buf()))?;
    let manifest: ModManifest = serde_json::from_slice(&bytes).or_raise(|| ErrorKind::Parse(path.to_path_buf()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let dir = tokio::fs::canonicalize(dir).await.or_raise(|| ErrorKind::Io(dir.to_path_buf()))?;
    convert(manifest, &dir)
}

/// Import the manifests at `paths`, in order, one transaction each.
#[instrument(skip_all, fields(manifests = paths.len()))]
pub async fn import_manifests(store: &Store, ctx: &Context, paths: Vec<PathBuf>) -> Result<ImportReport> {
    let mut failure = None;
    let slot = &mut failure;
    let manifests = stream! {
        for path in paths {
            match prepare(&path).await {
                Ok(prepared) => {
                    tracing::debug!(path = %path.display(), modid = %prepared.release.modid, "Prepared manifest");
                    yield Ok(prepared);
                },
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %*err, "Rejected manifest");
                    *slot = Some(err);
                    yield Err(StoreError::from(StoreErrorKind::ManifestFailure));
                },
            }
        }
    };

    let result = store
        .submit_import(ctx, manifests, |prepared: Prepared, sink| async move {
            for file in &prepared.files {
                sink.file(file).await?;
            }
            sink.release(&prepared.release).await
        })
        .await;
    match (result, failure) {
        (Ok(imported), _) => Ok(ImportReport { imported }),
        (Err(_), Some(err)) => Err(err),
        (Err(err), None) => Err(err.raise(ErrorKind::Store)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modcat_store::Source;

    async fn write_manifest(dir: &Path, name: &str, body: &str) -> PathBuf {
        let mod_dir = dir.join(name);
        tokio::fs::create_dir_all(&mod_dir).await.unwrap();
        let path = mod_dir.join("mod.json");
        tokio::fs::write(&path, body).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_import_manifests() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Store::open(temp_dir.path().join("settings")).await.unwrap();
        let ctx = Context::new();
        let first = write_manifest(
            temp_dir.path(),
            "first",
            r#"{"id": "first", "title": "First", "version": "1.0.0", "tile": "tile.png"}"#,
        )
        .await;
        let second =
            write_manifest(temp_dir.path(), "second", r#"{"id": "second", "title": "Second", "version": "2.0"}"#).await;

        let report = import_manifests(&store, &ctx, vec![first, second]).await.unwrap();
        assert_eq!(report.imported, 2);

        let release = store.latest_release(&ctx, Source::Local, "first").await.unwrap().unwrap();
        let teaser = release.teaser.unwrap();
        assert!(teaser.urls[0].ends_with("/first/tile.png"));
        assert_eq!(store.get_file(&ctx, &teaser.id).await.unwrap(), Some(teaser));
        assert!(store.latest_release(&ctx, Source::Local, "second").await.unwrap().is_some());
        store.close().await;
    }

    #[tokio::test]
    async fn test_malformed_manifest_stops_import() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Store::open(temp_dir.path().join("settings")).await.unwrap();
        let ctx = Context::new();
        let first =
            write_manifest(temp_dir.path(), "first", r#"{"id": "first", "title": "First", "version": "1.0.0"}"#).await;
        let broken = write_manifest(temp_dir.path(), "broken", r#"{"id": "broken", "title": "#).await;
        let third =
            write_manifest(temp_dir.path(), "third", r#"{"id": "third", "title": "Third", "version": "1.0.0"}"#).await;

        let err = import_manifests(&store, &ctx, vec![first, broken.clone(), third]).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Parse(broken));

        let releases = store.list_releases(&ctx, Source::Local).await.unwrap();
        let ids: Vec<_> = releases.iter().map(|r| r.modid.as_str()).collect();
        assert_eq!(ids, ["first"]);
        store.close().await;
    }

    #[tokio::test]
    async fn test_missing_manifest_is_io_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Store::open(temp_dir.path().join("settings")).await.unwrap();
        let missing = temp_dir.path().join("nowhere").join("mod.json");
        let err = import_manifests(&store, &Context::new(), vec![missing.clone()]).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Io(missing));
        assert!(err.is_retryable());
        store.close().await;
    }
}
