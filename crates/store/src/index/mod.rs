//! Secondary indexes over the release buckets.
//!
//! Every index keeps its entries in the shared [`Bucket::Index`] bucket:
//!
//! - `<index-name> 0x00 <derived key>` maps to the primary key of the record
//!   the entry was derived from;
//! - `0x01 <index-name>` is the marker holding the layout version the entries
//!   were written with.
//!
//! Entries are maintained in the same write transaction as the source
//! mutation, so the index and its bucket commit (or roll back) together.

mod kind;
mod version;

pub use self::kind::TypeIndex;
pub use self::version::VersionIndex;
use crate::bucket::Bucket;
use crate::codec;
use crate::error::{ErrorKind, Result};
use crate::transaction::Transaction;
use async_trait::async_trait;
use modcat_models::Release;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

const ENTRY_SEPARATOR: u8 = 0x00;
const MARKER_TAG: u8 = 0x01;

pub static LOCAL_BY_VERSION: VersionIndex = VersionIndex::new("local-by-version", Bucket::LocalMods);
pub static REMOTE_BY_VERSION: VersionIndex = VersionIndex::new("remote-by-version", Bucket::RemoteMods);
pub static LOCAL_BY_TYPE: TypeIndex = TypeIndex::new("local-by-type", Bucket::LocalMods);
pub static REMOTE_BY_TYPE: TypeIndex = TypeIndex::new("remote-by-type", Bucket::RemoteMods);

/// Every index the store maintains, in the order they are opened.
pub fn all() -> [&'static dyn Index; 4] {
    [&LOCAL_BY_VERSION, &LOCAL_BY_TYPE, &REMOTE_BY_VERSION, &REMOTE_BY_TYPE]
}

/// Indexes derived from records of `bucket`.
pub(crate) fn for_bucket(bucket: Bucket) -> impl Iterator<Item = &'static dyn Index> {
    all().into_iter().filter(move |index| index.source() == bucket)
}

/// What [`Index::open`] had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    /// Stored entries matched the source bucket.
    Valid,
    /// No marker, or one from an older layout; entries were built from scratch.
    Built,
    /// Stored entries diverged from the source bucket and were rebuilt.
    Repaired,
}
impl Display for IndexStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            Self::Valid => "valid",
            Self::Built => "built",
            Self::Repaired => "repaired",
        })
    }
}

/// A named secondary mapping over one release bucket.
///
/// Implementors only describe how entries are derived from a record; storage,
/// maintenance, validation and rebuilding come from the provided methods.
///
/// # Examples
///
/// ```no_run
/// use modcat_store::index::{self, Index};
/// use modcat_store::{Context, Store, error::Result};
///
/// async fn all_valid(store: &Store) -> Result<bool> {
///     let ctx = Context::new();
///     store
///         .read_scope(&ctx, |ctx| async move {
///             let tx = ctx.require_transaction()?;
///             for index in index::all() {
///                 if !index.verify(tx).await? {
///                     return Ok(false);
///                 }
///             }
///             Ok(true)
///         })
///         .await
/// }
/// ```
#[async_trait]
pub trait Index: Send + Sync {
    fn name(&self) -> &'static str;

    /// The bucket whose records feed this index.
    fn source(&self) -> Bucket;

    /// Bump whenever [`derive`](Self::derive) changes its output, so stores
    /// written by an older build rebuild the index on open.
    fn layout(&self) -> u32 {
        1
    }

    /// Derived keys (without the index name prefix) for one source record.
    fn derive(&self, key: &[u8], release: &Release) -> Result<Vec<Vec<u8>>>;

    /// `<index-name> 0x00`, shared by every entry of this index.
    fn entry_prefix(&self) -> Vec<u8> {
        let mut prefix = self.name().as_bytes().to_vec();
        prefix.push(ENTRY_SEPARATOR);
        prefix
    }

    fn marker_key(&self) -> Vec<u8> {
        let mut key = vec![MARKER_TAG];
        key.extend_from_slice(self.name().as_bytes());
        key
    }

    /// Add the entries of a record that was just written.
    async fn insert(&self, tx: &Transaction, key: &[u8], release: &Release) -> Result<()> {
        let prefix = self.entry_prefix();
        for derived in self.derive(key, release)? {
            tx.put(Bucket::Index, &[prefix.as_slice(), derived.as_slice()].concat(), key).await?;
        }
        Ok(())
    }

    /// Drop the entries of a record that is about to be replaced or deleted.
    async fn remove(&self, tx: &Transaction, key: &[u8], release: &Release) -> Result<()> {
        let prefix = self.entry_prefix();
        for derived in self.derive(key, release)? {
            tx.delete(Bucket::Index, &[prefix.as_slice(), derived.as_slice()].concat()).await?;
        }
        Ok(())
    }

    /// Entries as they should be, derived from a scan of the source bucket.
    async fn expected(&self, tx: &Transaction) -> Result<BTreeMap<Vec<u8>, Vec<u8>>> {
        let prefix = self.entry_prefix();
        let mut entries = BTreeMap::new();
        for (key, value) in tx.scan_prefix(self.source(), &[]).await? {
            let release: Release = codec::decode(&value, "release")?;
            for derived in self.derive(&key, &release)? {
                entries.insert([prefix.as_slice(), derived.as_slice()].concat(), key.clone());
            }
        }
        Ok(entries)
    }

    /// Entries currently stored for this index.
    async fn stored(&self, tx: &Transaction) -> Result<BTreeMap<Vec<u8>, Vec<u8>>> {
        Ok(tx.scan_prefix(Bucket::Index, &self.entry_prefix()).await?.into_iter().collect())
    }

    /// Whether the stored marker is current and the stored entries equal a
    /// direct derivation from the source bucket.
    async fn verify(&self, tx: &Transaction) -> Result<bool> {
        if self.stored_layout(tx).await? != Some(self.layout()) {
            return Ok(false);
        }
        Ok(self.stored(tx).await? == self.expected(tx).await?)
    }

    async fn stored_layout(&self, tx: &Transaction) -> Result<Option<u32>> {
        let Some(bytes) = tx.get(Bucket::Index, &self.marker_key()).await? else {
            return Ok(None);
        };
        match <[u8; 4]>::try_from(bytes.as_slice()) {
            Ok(layout) => Ok(Some(u32::from_be_bytes(layout))),
            Err(_) => exn::bail!(ErrorKind::DecodeFailure("index marker")),
        }
    }

    /// Replace every stored entry with a fresh derivation from the source
    /// bucket and write the marker. Returns the number of entries.
    async fn rebuild(&self, tx: &Transaction) -> Result<usize> {
        let expected = self.expected(tx).await?;
        tx.delete_prefix(Bucket::Index, &self.entry_prefix()).await?;
        for (key, value) in &expected {
            tx.put(Bucket::Index, key, value).await?;
        }
        tx.put(Bucket::Index, &self.marker_key(), &self.layout().to_be_bytes()).await?;
        Ok(expected.len())
    }

    /// Build the index if it was never built (or was built with an older
    /// layout), otherwise validate it and rebuild it if it diverged.
    async fn open(&self, tx: &Transaction) -> Result<IndexStatus> {
        let status = match self.stored_layout(tx).await {
            Ok(Some(layout)) if layout == self.layout() => {
                if self.stored(tx).await? == self.expected(tx).await? {
                    return Ok(IndexStatus::Valid);
                }
                tracing::warn!(index = self.name(), "Index diverged from its source bucket, rebuilding");
                IndexStatus::Repaired
            },
            Ok(_) => IndexStatus::Built,
            Err(err) if matches!(*err, ErrorKind::DecodeFailure(_)) => {
                tracing::warn!(index = self.name(), "Unreadable index marker, rebuilding");
                IndexStatus::Repaired
            },
            Err(err) => return Err(err),
        };
        let entries = self.rebuild(tx).await?;
        tracing::info!(index = self.name(), entries, %status, "Index rebuilt");
        Ok(status)
    }
}

/// Remove the entries of `old` (if any) and add those of `new` in every
/// index fed by `bucket`.
pub(crate) async fn maintain(
    tx: &Transaction,
    bucket: Bucket,
    key: &[u8],
    old: Option<&Release>,
    new: Option<&Release>,
) -> Result<()> {
    for index in for_bucket(bucket) {
        if let Some(old) = old {
            index.remove(tx, key, old).await?;
        }
        if let Some(new) = new {
            index.insert(tx, key, new).await?;
        }
    }
    Ok(())
}
