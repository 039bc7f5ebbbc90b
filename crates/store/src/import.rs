//! Entry point for the manifest import pipeline.

use crate::context::Context;
use crate::error::Result;
use crate::records::{Source, put_file, put_release};
use crate::store::Store;
use futures::{Stream, StreamExt};
use modcat_models::{FileRef, Release};
use std::future::Future;
use tracing::instrument;

/// Record sink handed to the per-manifest import callback. Everything
/// written through it commits (or rolls back) with that manifest.
#[derive(Debug, Clone)]
pub struct ImportSink {
    ctx: Context,
}

impl ImportSink {
    /// Save a release into local-mods, with index maintenance.
    pub async fn release(&self, release: &Release) -> Result<()> {
        put_release(self.ctx.require_transaction()?, Source::Local, release).await
    }

    /// Save a file reference into the file cache.
    pub async fn file(&self, file: &FileRef) -> Result<()> {
        put_file(self.ctx.require_transaction()?, file).await
    }

    /// The context of the manifest's transaction, for calling other store
    /// helpers inside it.
    pub fn context(&self) -> &Context {
        &self.ctx
    }
}

impl Store {
    /// Import prepared manifests one write transaction at a time.
    ///
    /// For every item of `manifests`, `f` is called with the item and a sink
    /// bound to a fresh write transaction that commits when `f` succeeds. The
    /// first failing item (or stream error) stops the import: manifests
    /// before it stay committed, the failing one leaves no trace. Returns
    /// the number of imported manifests.
    ///
    /// Items should be fully prepared (files resolved, dates parsed) before
    /// they are yielded, so no transaction waits on anything but the store.
    #[instrument(skip_all)]
    pub async fn submit_import<T, S, F, Fut>(&self, ctx: &Context, manifests: S, mut f: F) -> Result<usize>
    where
        S: Stream<Item = Result<T>>,
        F: FnMut(T, ImportSink) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut manifests = std::pin::pin!(manifests);
        let mut imported = 0;
        while let Some(item) = manifests.next().await {
            let item = item?;
            self.write_scope(ctx, |ctx| f(item, ImportSink { ctx })).await?;
            imported += 1;
            tracing::debug!(imported, "Imported manifest");
        }
        tracing::info!(imported, "Import finished");
        Ok(imported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind};
    use futures::stream;

    #[tokio::test]
    async fn test_failing_manifest_leaves_no_trace() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Store::open(temp_dir.path()).await.unwrap();
        let ctx = Context::new();
        let items: Vec<Result<(Release, bool)>> = vec![
            Ok((Release::new("first", "1.0.0".parse().unwrap(), "First"), false)),
            // Written, then rejected: must roll back.
            Ok((Release::new("second", "1.0.0".parse().unwrap(), "Second"), true)),
            Ok((Release::new("third", "1.0.0".parse().unwrap(), "Third"), false)),
        ];
        let err = store
            .submit_import(&ctx, stream::iter(items), |(release, fail), sink| async move {
                let teaser = FileRef::new(vec![format!("https://example.com/{}.png", release.modid)]);
                sink.file(&teaser).await?;
                sink.release(&release).await?;
                if fail {
                    exn::bail!(ErrorKind::ManifestFailure);
                }
                Ok(())
            })
            .await
            .unwrap_err();
        assert_eq!(*err, ErrorKind::ManifestFailure);

        let releases = store.list_releases(&ctx, Source::Local).await.unwrap();
        let ids: Vec<_> = releases.iter().map(|r| r.modid.as_str()).collect();
        assert_eq!(ids, ["first"]);
        store.close().await;
    }

    #[tokio::test]
    async fn test_stream_error_stops_import() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Store::open(temp_dir.path()).await.unwrap();
        let ctx = Context::new();
        let items: Vec<Result<Release>> = vec![
            Ok(Release::new("first", "1.0.0".parse().unwrap(), "First")),
            Err(Error::from(ErrorKind::ManifestFailure)),
            Ok(Release::new("third", "1.0.0".parse().unwrap(), "Third")),
        ];
        let result = store
            .submit_import(&ctx, stream::iter(items), |release, sink| async move { sink.release(&release).await })
            .await;
        assert_eq!(*result.unwrap_err(), ErrorKind::ManifestFailure);
        assert_eq!(store.list_releases(&ctx, Source::Local).await.unwrap().len(), 1);
        store.close().await;
    }

    #[tokio::test]
    async fn test_one_transaction_per_manifest() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Store::open(temp_dir.path()).await.unwrap();
        let ctx = Context::new();
        let before = store.stats();
        let items: Vec<Result<Release>> =
            (0..3).map(|i| Ok(Release::new(format!("mod{i}"), "1.0.0".parse().unwrap(), "Mod"))).collect();
        let imported = store
            .submit_import(&ctx, stream::iter(items), |release, sink| async move { sink.release(&release).await })
            .await
            .unwrap();
        assert_eq!(imported, 3);
        assert_eq!(store.stats().write_transactions - before.write_transactions, 3);
        store.close().await;
    }
}
