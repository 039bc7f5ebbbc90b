//! Embedded, transactional catalog store.
//!
//! The catalog lives in a single SQLite file (`<settings-dir>/state.db`) split
//! into fixed buckets of opaque key/value pairs, with secondary indexes over
//! the two release buckets kept in the same file.
//!
//! # Architecture
//! - **[`Store`]**: the process-wide handle. Opened once, closed once; owns
//!   the connection pool, the writer gate and the batch worker.
//! - **[`Context`]**: request-scoped value carrying a cancellation token and,
//!   inside a scope, the ambient [`Transaction`]. Store helpers join the
//!   ambient transaction instead of opening their own, so they compose
//!   freely.
//! - **[`index`]**: the four secondary indexes (local/remote, by version and
//!   by type), maintained in the same transaction as every release write.
//! - **Batching**: [`Store::batch_update`] coalesces concurrent submissions
//!   into shared commits while each submission stays all or nothing.
//!
//! Writers are serialized (first come, first served) with a bounded wait;
//! readers run on WAL snapshots and never wait for writers.

mod batch;
mod bucket;
mod codec;
mod context;
mod engine;
pub mod error;
mod import;
pub mod index;
mod records;
mod store;
mod transaction;

pub use crate::bucket::Bucket;
pub use crate::codec::ReleaseKey;
pub use crate::context::Context;
pub use crate::engine::Stats;
pub use crate::import::ImportSink;
pub use crate::records::Source;
pub use crate::store::{CleanReport, LOCK_FILE, STORE_FILE, Store};
pub use crate::transaction::{Mode, Transaction, TxHandle};
