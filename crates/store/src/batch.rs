//! Coalescing of independent write submissions into shared commits.
//!
//! A single worker task drains the submission queue. It collects up to
//! `max_batch_size` submissions (or whatever arrived within
//! `max_batch_delay` of the first one), runs them one after another inside
//! one write transaction and commits once. Each submission runs inside its
//! own savepoint, so a failing submission only rolls back its own writes.
//! If a savepoint itself cannot be handled the batch transaction is rolled
//! back as a whole and every submission in it fails.

use crate::context::Context;
use crate::engine::Engine;
use crate::error::{Error, ErrorKind, Result};
use crate::transaction::Transaction;
use futures::FutureExt;
use futures::future::BoxFuture;
use modcat_config::StorageConfig;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

tokio::task_local! {
    static BATCH_WORKER: ();
}

/// Whether the current task is the batch worker, i.e. the caller is a job
/// that is already part of a batch.
pub(crate) fn on_worker() -> bool {
    BATCH_WORKER.try_with(|_| ()).is_ok()
}

/// A type-erased unit of work run against the batch transaction.
pub(crate) type Job = Box<dyn FnOnce(Context) -> BoxFuture<'static, Result<()>> + Send>;

pub(crate) struct Submission {
    /// The submitter's context; only its cancellation token is used.
    pub(crate) ctx: Context,
    pub(crate) job: Job,
    pub(crate) reply: oneshot::Sender<Result<()>>,
    /// Set by whoever gets there first: the worker when it starts the job,
    /// or the submitter when it gives up waiting.
    pub(crate) claimed: Arc<AtomicBool>,
}
impl Debug for Submission {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Submission").field("cancelled", &self.ctx.is_cancelled()).finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub(crate) struct Batcher {
    sender: mpsc::Sender<Submission>,
    worker: JoinHandle<()>,
}

impl Batcher {
    pub(crate) fn spawn(engine: Arc<Engine>, config: &StorageConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.max_batch_size);
        let worker =
            tokio::spawn(BATCH_WORKER.scope((), run(engine, receiver, config.max_batch_size, config.max_batch_delay())));
        Self { sender, worker }
    }

    pub(crate) fn sender(&self) -> mpsc::Sender<Submission> {
        self.sender.clone()
    }

    /// Close the queue and wait for the worker to finish what it holds.
    pub(crate) async fn shutdown(self) {
        drop(self.sender);
        if let Err(err) = self.worker.await {
            tracing::warn!(error = %err, "Batch worker did not shut down cleanly");
        }
    }
}

async fn run(engine: Arc<Engine>, mut receiver: mpsc::Receiver<Submission>, max_size: usize, max_delay: Duration) {
    while let Some(first) = receiver.recv().await {
        let mut batch = vec![first];
        let deadline = tokio::time::sleep(max_delay);
        tokio::pin!(deadline);
        while batch.len() < max_size {
            tokio::select! {
                _ = &mut deadline => break,
                next = receiver.recv() => match next {
                    Some(submission) => batch.push(submission),
                    None => break,
                },
            }
        }
        commit_batch(&engine, batch).await;
    }
}

async fn commit_batch(engine: &Engine, batch: Vec<Submission>) {
    let size = batch.len();
    // Submitters carry their own tokens; the batch itself is never cancelled.
    let tx = match engine.begin_write(&CancellationToken::new()).await {
        Ok(tx) => tx,
        Err(err) => {
            tracing::warn!(size, error = %err, "Could not open a batch transaction");
            for submission in batch {
                let outcome = if submission.ctx.is_cancelled() {
                    Error::from(ErrorKind::Cancelled)
                } else {
                    Error::from((*err).clone())
                };
                let _ = submission.reply.send(Err(outcome));
            }
            return;
        },
    };

    let mut outcomes = Vec::with_capacity(size);
    let mut pending = batch.into_iter();
    while let Some(Submission { ctx, job, reply, claimed }) = pending.next() {
        // Abandoned by its submitter: nobody is waiting for the result.
        if reply.is_closed() || claimed.swap(true, Ordering::AcqRel) {
            continue;
        }
        if ctx.is_cancelled() {
            outcomes.push((reply, Err(Error::from(ErrorKind::Cancelled))));
            continue;
        }
        match run_isolated(&tx, ctx.with_transaction(tx.clone()), job).await {
            Ok(outcome) => outcomes.push((reply, outcome)),
            Err(err) => {
                tracing::warn!(id = tx.id(), size, error = %err, "Savepoint failed, abandoning batch");
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(id = tx.id(), error = %rollback, "Failed to roll back batch transaction");
                }
                let replies = outcomes
                    .into_iter()
                    .map(|(reply, _)| reply)
                    .chain(std::iter::once(reply))
                    .chain(pending.by_ref().map(|submission| submission.reply));
                for reply in replies {
                    let _ = reply.send(Err(Error::from(ErrorKind::EngineFailure)));
                }
                return;
            },
        }
    }

    let committed = tx.commit().await;
    engine.record_batch(outcomes.len());
    match committed {
        Ok(()) => {
            tracing::debug!(id = tx.id(), size, "Committed batch");
            for (reply, outcome) in outcomes {
                let _ = reply.send(outcome);
            }
        },
        Err(err) => {
            tracing::warn!(id = tx.id(), size, error = %err, "Batch commit failed");
            for (reply, outcome) in outcomes {
                let outcome = match outcome {
                    Ok(()) => Err(Error::from(ErrorKind::EngineFailure)),
                    Err(err) => Err(err),
                };
                let _ = reply.send(outcome);
            }
        },
    }
}

/// Run one submission inside its own savepoint.
///
/// The inner result is the submission's own outcome. An outer error means
/// the savepoint could not be created, released or rolled back, after which
/// the batch transaction can no longer be trusted.
async fn run_isolated(tx: &Transaction, ctx: Context, job: Job) -> Result<Result<()>> {
    let savepoint = tx.savepoint().await?;
    let outcome = match AssertUnwindSafe(async move { job(ctx).await }).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::error!(id = tx.id(), "Batched submission panicked");
            Err(Error::from(ErrorKind::EngineFailure))
        },
    };
    match &outcome {
        Ok(()) => tx.release_savepoint(&savepoint).await?,
        Err(_) => tx.rollback_to_savepoint(&savepoint).await?,
    }
    Ok(outcome)
}
