//! Typed access to the catalog buckets.
//!
//! Every operation takes a [`Context`](crate::Context) and joins its ambient
//! transaction when there is one; otherwise it opens its own.

pub(crate) mod engine_flags;
mod files;
mod http_cache;
mod releases;
mod settings;

pub use self::releases::Source;
pub(crate) use self::files::put_file;
pub(crate) use self::releases::put_release;
use crate::bucket::Bucket;
use crate::codec;
use crate::error::{ErrorKind, Result};
use crate::transaction::Transaction;
use serde::Serialize;
use serde::de::DeserializeOwned;

async fn get_record<T: DeserializeOwned>(
    tx: &Transaction,
    bucket: Bucket,
    key: &[u8],
    what: &'static str,
) -> Result<Option<T>> {
    match tx.get(bucket, key).await? {
        Some(bytes) => Ok(Some(codec::decode(&bytes, what)?)),
        None => Ok(None),
    }
}

async fn put_record<T: Serialize>(tx: &Transaction, bucket: Bucket, key: &[u8], value: &T, what: &'static str) -> Result<()> {
    tx.put(bucket, key, &codec::encode(value, what)?).await
}

/// Keys of the plain (non-release) buckets are arbitrary text, but never empty.
fn text_key(key: &str) -> Result<&[u8]> {
    if key.is_empty() {
        exn::bail!(ErrorKind::InvalidKey(String::new()));
    }
    Ok(key.as_bytes())
}
