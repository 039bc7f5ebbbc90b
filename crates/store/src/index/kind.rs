use super::Index;
use crate::bucket::Bucket;
use crate::error::Result;
use crate::transaction::Transaction;
use async_trait::async_trait;
use modcat_models::{ModType, Release};

/// Releases grouped by [`ModType`].
///
/// Derived key: `<type name> 0x00 <record key>`.
#[derive(Debug)]
pub struct TypeIndex {
    name: &'static str,
    source: Bucket,
}

impl TypeIndex {
    pub(crate) const fn new(name: &'static str, source: Bucket) -> Self {
        Self { name, source }
    }

    /// Primary keys of every release of the given type, in key order.
    pub async fn keys(&self, tx: &Transaction, mod_type: ModType) -> Result<Vec<Vec<u8>>> {
        let mut prefix = self.entry_prefix();
        prefix.extend_from_slice(mod_type.as_str().as_bytes());
        prefix.push(0x00);
        Ok(tx.scan_prefix(Bucket::Index, &prefix).await?.into_iter().map(|(_, key)| key).collect())
    }
}

#[async_trait]
impl Index for TypeIndex {
    fn name(&self) -> &'static str {
        self.name
    }

    fn source(&self) -> Bucket {
        self.source
    }

    fn derive(&self, key: &[u8], release: &Release) -> Result<Vec<Vec<u8>>> {
        Ok(vec![[release.mod_type.as_str().as_bytes(), &[0x00u8][..], key].concat()])
    }
}
