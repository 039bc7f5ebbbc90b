//! Connection pool, writer gate and transaction accounting.

use crate::error::{ErrorKind, Result};
use crate::transaction::{Mode, Transaction, TxHandle};
use exn::ResultExt;
use modcat_config::StorageConfig;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteAutoVacuum, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Point-in-time counters of a store handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Read and write transactions opened since the store was opened.
    pub transactions: u64,
    pub write_transactions: u64,
    pub batches: u64,
    pub batched_submissions: u64,
}

#[derive(Debug, Default)]
struct Counters {
    transactions: AtomicU64,
    write_transactions: AtomicU64,
    batches: AtomicU64,
    batched_submissions: AtomicU64,
}

#[derive(Debug)]
pub(crate) struct Engine {
    pool: SqlitePool,
    // Tokio's mutex queues waiters in FIFO order, which fixes the commit order.
    writer: Arc<Mutex<()>>,
    lock_timeout: Duration,
    open: AtomicBool,
    next_id: AtomicU64,
    counters: Counters,
}

impl Engine {
    #[instrument(skip(config), fields(path = %path.display()))]
    pub(crate) async fn connect(path: &Path, config: &StorageConfig) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            // Readers work from WAL snapshots and never wait on the writer.
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(config.busy_timeout())
            .auto_vacuum(SqliteAutoVacuum::None);
        let pool = SqlitePoolOptions::new()
            // Query-based PRAGMAs have to be applied to every pooled
            // connection, not only the first one.
            .after_connect(|conn, meta| Box::pin(async move { Self::apply_pragmas(conn, meta).await }))
            .max_connections(config.max_connections)
            .acquire_timeout(config.lock_timeout())
            .connect_with(options)
            .await
            .map_err(ErrorKind::engine)?;
        Ok(Self {
            pool,
            writer: Arc::new(Mutex::new(())),
            lock_timeout: config.lock_timeout(),
            open: AtomicBool::new(true),
            next_id: AtomicU64::new(1),
            counters: Counters::default(),
        })
    }

    async fn apply_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA locking_mode = NORMAL;
                PRAGMA wal_autocheckpoint = 800;
                PRAGMA cache_size = -8192;
                PRAGMA temp_store = MEMORY;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if !self.open.load(Ordering::Acquire) {
            exn::bail!(ErrorKind::NotOpen);
        }
        Ok(())
    }

    /// Open a snapshot read transaction.
    pub(crate) async fn begin_read(&self) -> Result<TxHandle> {
        self.ensure_open()?;
        let mut inner = self.pool.begin().await.map_err(ErrorKind::engine)?;
        // SQLite starts the snapshot lazily on the first read; take it now so
        // the transaction sees the state as of this call.
        sqlx::query("SELECT COUNT(*) FROM sqlite_master").execute(&mut *inner).await.map_err(ErrorKind::engine)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.counters.transactions.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(id, "Opened read transaction");
        Ok(Transaction::new(id, Mode::Read, inner, None))
    }

    /// Wait for the writer gate, then open a write transaction that holds it
    /// until it commits or rolls back.
    pub(crate) async fn begin_write(&self, cancel: &CancellationToken) -> Result<TxHandle> {
        self.ensure_open()?;
        let acquire = tokio::time::timeout(self.lock_timeout, self.writer.clone().lock_owned());
        let guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => exn::bail!(ErrorKind::Cancelled),
            acquired = acquire => acquired.or_raise(|| ErrorKind::LockTimeout)?,
        };
        // Another task may have closed the store while this one was queued.
        self.ensure_open()?;
        let inner = self.pool.begin().await.map_err(ErrorKind::engine)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.counters.transactions.fetch_add(1, Ordering::Relaxed);
        self.counters.write_transactions.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(id, "Opened write transaction");
        Ok(Transaction::new(id, Mode::Write, inner, Some(guard)))
    }

    pub(crate) fn record_batch(&self, submissions: usize) {
        self.counters.batches.fetch_add(1, Ordering::Relaxed);
        self.counters.batched_submissions.fetch_add(submissions as u64, Ordering::Relaxed);
    }

    pub(crate) fn stats(&self) -> Stats {
        Stats {
            transactions: self.counters.transactions.load(Ordering::Relaxed),
            write_transactions: self.counters.write_transactions.load(Ordering::Relaxed),
            batches: self.counters.batches.load(Ordering::Relaxed),
            batched_submissions: self.counters.batched_submissions.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Refuse new transactions, then wait for pooled connections to return
    /// and close them. Returns `false` if the engine was already closed.
    pub(crate) async fn shutdown(&self) -> bool {
        if !self.open.swap(false, Ordering::AcqRel) {
            return false;
        }
        // Let SQLite update query planner statistics
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
        true
    }
}
