//! Transaction handles.
//!
//! A [`Transaction`] wraps one SQLite transaction on a pooled connection and
//! is shared (behind an [`Arc`]) by every [`Context`](crate::Context) derived
//! inside its scope. The connection is only locked for the duration of a
//! single statement, so nested helpers can freely issue their own statements
//! against the same transaction.

use crate::bucket::{Bucket, prefix_end};
use crate::error::{ErrorKind, Result};
use sqlx::{Sqlite, SqliteConnection};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Shared handle to an open transaction.
pub type TxHandle = Arc<Transaction>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    Write,
}

struct Active {
    inner: sqlx::Transaction<'static, Sqlite>,
    // Released together with the transaction, never before it finishes.
    _writer: Option<OwnedMutexGuard<()>>,
}

pub struct Transaction {
    id: u64,
    mode: Mode,
    state: Mutex<Option<Active>>,
    savepoints: AtomicU64,
}
impl Debug for Transaction {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Transaction").field("id", &self.id).field("mode", &self.mode).finish()
    }
}
impl Transaction {
    pub(crate) fn new(
        id: u64,
        mode: Mode,
        inner: sqlx::Transaction<'static, Sqlite>,
        writer: Option<OwnedMutexGuard<()>>,
    ) -> TxHandle {
        Arc::new(Self {
            id,
            mode,
            state: Mutex::new(Some(Active { inner, _writer: writer })),
            savepoints: AtomicU64::new(0),
        })
    }

    /// Identifier unique for the lifetime of the store handle.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_writable(&self) -> bool {
        self.mode == Mode::Write
    }

    fn connection(state: &mut Option<Active>) -> Result<&mut SqliteConnection> {
        match state {
            Some(active) => Ok(&mut *active.inner),
            None => exn::bail!(ErrorKind::NoTransaction),
        }
    }

    fn ensure_writable(&self) -> Result<()> {
        if !self.is_writable() {
            exn::bail!(ErrorKind::ReadOnly);
        }
        Ok(())
    }

    pub async fn get(&self, bucket: Bucket, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut state = self.state.lock().await;
        sqlx::query_scalar::<_, Vec<u8>>(&bucket.sql().get)
            .bind(key)
            .fetch_optional(Self::connection(&mut state)?)
            .await
            .map_err(ErrorKind::engine)
    }

    pub async fn put(&self, bucket: Bucket, key: &[u8], value: &[u8]) -> Result<()> {
        self.ensure_writable()?;
        let mut state = self.state.lock().await;
        sqlx::query(&bucket.sql().put)
            .bind(key)
            .bind(value)
            .execute(Self::connection(&mut state)?)
            .await
            .map_err(ErrorKind::engine)?;
        Ok(())
    }

    /// Returns `true` if the key existed.
    pub async fn delete(&self, bucket: Bucket, key: &[u8]) -> Result<bool> {
        self.ensure_writable()?;
        let mut state = self.state.lock().await;
        let result = sqlx::query(&bucket.sql().delete)
            .bind(key)
            .execute(Self::connection(&mut state)?)
            .await
            .map_err(ErrorKind::engine)?;
        Ok(result.rows_affected() > 0)
    }

    /// All entries with `start <= key < end` (unbounded above when `end` is
    /// `None`), in key order.
    pub async fn scan_range(&self, bucket: Bucket, start: &[u8], end: Option<&[u8]>) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut state = self.state.lock().await;
        let conn = Self::connection(&mut state)?;
        let rows = match end {
            Some(end) => {
                sqlx::query_as::<_, (Vec<u8>, Vec<u8>)>(&bucket.sql().range).bind(start).bind(end).fetch_all(conn).await
            },
            None => sqlx::query_as::<_, (Vec<u8>, Vec<u8>)>(&bucket.sql().range_from).bind(start).fetch_all(conn).await,
        };
        rows.map_err(ErrorKind::engine)
    }

    /// All entries whose key starts with `prefix`, in key order.
    pub async fn scan_prefix(&self, bucket: Bucket, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let end = prefix_end(prefix);
        self.scan_range(bucket, prefix, end.as_deref()).await
    }

    pub async fn count_prefix(&self, bucket: Bucket, prefix: &[u8]) -> Result<u64> {
        let end = prefix_end(prefix);
        let mut state = self.state.lock().await;
        let conn = Self::connection(&mut state)?;
        let count = match end {
            Some(end) => {
                sqlx::query_scalar::<_, i64>(&bucket.sql().count_range).bind(prefix).bind(end).fetch_one(conn).await
            },
            None => sqlx::query_scalar::<_, i64>(&bucket.sql().count_from).bind(prefix).fetch_one(conn).await,
        }
        .map_err(ErrorKind::engine)?;
        // COUNT(*) is never negative.
        Ok(count.unsigned_abs())
    }

    /// Remove every entry whose key starts with `prefix`; returns how many.
    pub async fn delete_prefix(&self, bucket: Bucket, prefix: &[u8]) -> Result<u64> {
        self.ensure_writable()?;
        let end = prefix_end(prefix);
        let mut state = self.state.lock().await;
        let conn = Self::connection(&mut state)?;
        let result = match end {
            Some(end) => sqlx::query(&bucket.sql().delete_range).bind(prefix).bind(end).execute(conn).await,
            None => sqlx::query(&bucket.sql().delete_from).bind(prefix).execute(conn).await,
        }
        .map_err(ErrorKind::engine)?;
        Ok(result.rows_affected())
    }

    /// Run a raw statement that takes no parameters (DDL, pragmas, savepoints).
    pub(crate) async fn execute(&self, statement: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        sqlx::query(statement).execute(Self::connection(&mut state)?).await.map_err(ErrorKind::engine)?;
        Ok(())
    }

    /// Start a nested savepoint and return its name.
    pub(crate) async fn savepoint(&self) -> Result<String> {
        self.ensure_writable()?;
        let name = format!("sp_{}", self.savepoints.fetch_add(1, Ordering::Relaxed));
        self.execute(&format!("SAVEPOINT {name}")).await?;
        Ok(name)
    }

    pub(crate) async fn release_savepoint(&self, name: &str) -> Result<()> {
        self.execute(&format!("RELEASE SAVEPOINT {name}")).await
    }

    /// Undo everything since the savepoint, then drop it.
    pub(crate) async fn rollback_to_savepoint(&self, name: &str) -> Result<()> {
        self.execute(&format!("ROLLBACK TO SAVEPOINT {name}")).await?;
        self.release_savepoint(name).await
    }

    async fn take(&self) -> Result<Active> {
        let mut state = self.state.lock().await;
        match state.take() {
            Some(active) => Ok(active),
            None => exn::bail!(ErrorKind::NoTransaction),
        }
    }

    /// Commit and finish the transaction; later use of any clone of this
    /// handle fails with [`ErrorKind::NoTransaction`].
    pub(crate) async fn commit(&self) -> Result<()> {
        let active = self.take().await?;
        active.inner.commit().await.map_err(ErrorKind::engine)
    }

    /// Roll back and finish the transaction. Read transactions are released
    /// this way too.
    pub(crate) async fn rollback(&self) -> Result<()> {
        let active = self.take().await?;
        active.inner.rollback().await.map_err(ErrorKind::engine)
    }
}
