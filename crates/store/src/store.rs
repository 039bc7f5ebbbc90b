//! The process-wide store handle.

use crate::batch::{Batcher, Job, Submission, on_worker};
use crate::bucket::Bucket;
use crate::context::Context;
use crate::engine::{Engine, Stats};
use crate::error::{ErrorKind, Result};
use crate::index;
use crate::records::engine_flags;
use exn::ResultExt;
use fs2::FileExt;
use futures::FutureExt;
use modcat_config::StorageConfig;
use std::fs::{File, OpenOptions};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Store file inside the settings directory.
pub const STORE_FILE: &str = "state.db";
/// Advisory lock keeping a second process away from the store file.
pub const LOCK_FILE: &str = "state.db.lock";
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// What a [`Store::clean`] pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Engine flag entries whose engine build is gone from local-mods.
    pub pruned_engine_flags: usize,
    /// Names of the indexes that had to be rebuilt.
    pub rebuilt_indexes: Vec<&'static str>,
}

#[derive(Debug)]
struct Resources {
    batcher: Batcher,
    lock: File,
}

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    engine: Arc<Engine>,
    resources: Mutex<Option<Resources>>,
}

/// Handle to the embedded catalog store.
///
/// Cloning is cheap; every clone refers to the same open store. The handle
/// is opened once and closed once, after which every operation fails with
/// [`ErrorKind::NotOpen`].
#[derive(Debug, Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

impl Store {
    /// Open (creating if needed) the store inside `settings_dir` with the
    /// default [`StorageConfig`].
    pub async fn open(settings_dir: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(settings_dir, StorageConfig::default()).await
    }

    #[instrument(skip(settings_dir, config), fields(dir = %settings_dir.as_ref().display()))]
    pub async fn open_with(settings_dir: impl AsRef<Path>, config: StorageConfig) -> Result<Self> {
        config.validate().or_raise(|| ErrorKind::InvalidConfig)?;
        let settings_dir = settings_dir.as_ref();
        tokio::fs::create_dir_all(settings_dir).await.or_raise(|| ErrorKind::EngineFailure)?;
        let lock = acquire_file_lock(&settings_dir.join(LOCK_FILE), config.lock_timeout()).await?;

        let path = settings_dir.join(STORE_FILE);
        let engine = Arc::new(Engine::connect(&path, &config).await?);
        let cancel = CancellationToken::new();

        let tx = engine.begin_write(&cancel).await?;
        for bucket in Bucket::ALL {
            tx.execute(&bucket.sql().create).await?;
        }
        tx.commit().await?;

        let tx = engine.begin_write(&cancel).await?;
        for index in index::all() {
            match index.open(&tx).await {
                Ok(status) => tracing::debug!(index = index.name(), %status, "Opened index"),
                Err(err) => {
                    if let Err(rollback) = tx.rollback().await {
                        tracing::warn!(error = %rollback, "Failed to roll back index construction");
                    }
                    return Err(err);
                },
            }
        }
        tx.commit().await?;

        let batcher = Batcher::spawn(engine.clone(), &config);
        tracing::info!(path = %path.display(), "Store opened");
        Ok(Self {
            inner: Arc::new(Inner { path, engine, resources: Mutex::new(Some(Resources { batcher, lock })) }),
        })
    }

    /// Location of the store file.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn is_open(&self) -> bool {
        self.inner.engine.is_open()
    }

    pub fn stats(&self) -> Stats {
        self.inner.engine.stats()
    }

    /// Stop the batch worker (letting it finish what was already queued),
    /// close every connection and release the file lock. Closing twice is a
    /// no-op.
    #[instrument(skip(self), fields(path = %self.inner.path.display()))]
    pub async fn close(&self) {
        let Some(resources) = self.inner.resources.lock().await.take() else {
            return;
        };
        resources.batcher.shutdown().await;
        self.inner.engine.shutdown().await;
        if let Err(err) = FileExt::unlock(&resources.lock) {
            tracing::warn!(error = %err, "Failed to release the store lock");
        }
        tracing::info!("Store closed");
    }

    /// Prune engine flags of engine builds that are no longer installed and
    /// rebuild every index that diverged from its source bucket, all in one
    /// write transaction.
    #[instrument(skip_all)]
    pub async fn clean(&self, ctx: &Context) -> Result<CleanReport> {
        let report = self
            .write_scope(ctx, |ctx| async move {
                let tx = ctx.require_transaction()?;
                let mut report = CleanReport { pruned_engine_flags: engine_flags::prune(tx).await?, ..Default::default() };
                for index in index::all() {
                    if !index.verify(tx).await? {
                        tracing::warn!(index = index.name(), "Index diverged from its source bucket, rebuilding");
                        index.rebuild(tx).await?;
                        report.rebuilt_indexes.push(index.name());
                    }
                }
                Ok(report)
            })
            .await?;
        tracing::info!(pruned_engine_flags = report.pruned_engine_flags, rebuilt_indexes = ?report.rebuilt_indexes, "Clean finished");
        Ok(report)
    }

    /// Run `f` inside the ambient transaction, or inside a fresh snapshot
    /// read transaction that is released once `f` finishes.
    pub async fn read_scope<T, F, Fut>(&self, ctx: &Context, f: F) -> Result<T>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if ctx.transaction().is_some() {
            return f(ctx.clone()).await;
        }
        let tx = self.inner.engine.begin_read().await?;
        let result = f(ctx.with_transaction(tx.clone())).await;
        if let Err(err) = tx.rollback().await {
            tracing::warn!(id = tx.id(), error = %err, "Failed to release read transaction");
        }
        result
    }

    /// Run `f` inside the ambient write transaction, or inside a fresh one
    /// that commits when `f` succeeds and rolls back in full when it fails.
    pub async fn write_scope<T, F, Fut>(&self, ctx: &Context, f: F) -> Result<T>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(tx) = ctx.transaction() {
            if !tx.is_writable() {
                exn::bail!(ErrorKind::ReadOnly);
            }
            return f(ctx.clone()).await;
        }
        let tx = self.inner.engine.begin_write(ctx.cancellation()).await?;
        match f(ctx.with_transaction(tx.clone())).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            },
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(id = tx.id(), error = %rollback, "Failed to roll back write transaction");
                }
                Err(err)
            },
        }
    }

    /// Run `f` with write access, possibly sharing one commit with other
    /// concurrent submissions.
    ///
    /// `f` still applies all or nothing: if it fails, only its own writes are
    /// rolled back. Inside an ambient write transaction `f` runs inline.
    /// Cancelling `ctx` withdraws the submission until it has started.
    pub async fn batch_update<T, F, Fut>(&self, ctx: &Context, f: F) -> Result<T>
    where
        F: FnOnce(Context) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        if ctx.transaction().is_some() {
            return self.write_scope(ctx, f).await;
        }
        if on_worker() {
            // The worker is busy running the caller, so the submission could
            // never start.
            exn::bail!(ErrorKind::LockTimeout);
        }
        self.inner.engine.ensure_open()?;
        if ctx.is_cancelled() {
            exn::bail!(ErrorKind::Cancelled);
        }
        let sender = match self.inner.resources.lock().await.as_ref() {
            Some(resources) => resources.batcher.sender(),
            None => exn::bail!(ErrorKind::NotOpen),
        };

        let (value_tx, value_rx) = oneshot::channel();
        let job: Job = Box::new(move |ctx| {
            async move {
                let value = f(ctx).await?;
                // The caller only reads this once the batch committed.
                let _ = value_tx.send(value);
                Ok(())
            }
            .boxed()
        });
        let claimed = Arc::new(AtomicBool::new(false));
        let (reply, mut outcome) = oneshot::channel();
        let submission = Submission { ctx: ctx.clone(), job, reply, claimed: claimed.clone() };
        tokio::select! {
            biased;
            _ = ctx.cancellation().cancelled() => exn::bail!(ErrorKind::Cancelled),
            sent = sender.send(submission) => if sent.is_err() {
                exn::bail!(ErrorKind::NotOpen);
            },
        }

        let early = tokio::select! {
            biased;
            result = &mut outcome => Some(result),
            _ = ctx.cancellation().cancelled() => None,
        };
        let result = match early {
            Some(result) => result,
            None if !claimed.swap(true, Ordering::AcqRel) => exn::bail!(ErrorKind::Cancelled),
            // Already running: a started submission is not interrupted.
            None => outcome.await,
        };
        result.or_raise(|| ErrorKind::EngineFailure)??;
        value_rx.await.or_raise(|| ErrorKind::EngineFailure)
    }

    /// Run `f` against a snapshot read transaction. Reads never contend on
    /// the writer lock, so there is nothing to coalesce.
    pub async fn batch_read<T, F, Fut>(&self, ctx: &Context, f: F) -> Result<T>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.read_scope(ctx, f).await
    }
}

/// Take the exclusive advisory lock, polling until `timeout` runs out.
async fn acquire_file_lock(path: &Path, timeout: Duration) -> Result<File> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)
        .or_raise(|| ErrorKind::EngineFailure)?;
    let deadline = Instant::now() + timeout;
    loop {
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => return Ok(file),
            Err(err) if err.kind() == fs2::lock_contended_error().kind() => {
                if Instant::now() >= deadline {
                    return Err(exn::Exn::from(err).raise(ErrorKind::LockTimeout));
                }
                tokio::time::sleep(LOCK_POLL_INTERVAL).await;
            },
            Err(err) => return Err(exn::Exn::from(err).raise(ErrorKind::EngineFailure)),
        }
    }
}
