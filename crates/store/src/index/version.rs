use super::Index;
use crate::bucket::{Bucket, prefix_end};
use crate::codec::ReleaseKey;
use crate::error::Result;
use crate::transaction::Transaction;
use async_trait::async_trait;
use modcat_models::{Release, Version};
use std::ops::Bound;

/// Versions of each mod in ascending [`Version`] order.
///
/// Derived key: `<modid> 0x00 <Version::sort_key()>`. Since sort keys order
/// bytewise exactly like versions, a prefix scan over one mod yields its
/// releases oldest first.
#[derive(Debug)]
pub struct VersionIndex {
    name: &'static str,
    source: Bucket,
}

impl VersionIndex {
    pub(crate) const fn new(name: &'static str, source: Bucket) -> Self {
        Self { name, source }
    }

    fn mod_prefix(&self, modid: &str) -> Result<Vec<u8>> {
        Ok([self.entry_prefix(), ReleaseKey::mod_prefix(modid)?].concat())
    }

    /// Primary keys of every release of `modid`, oldest version first.
    pub async fn versions(&self, tx: &Transaction, modid: &str) -> Result<Vec<Vec<u8>>> {
        let prefix = self.mod_prefix(modid)?;
        Ok(tx.scan_prefix(Bucket::Index, &prefix).await?.into_iter().map(|(_, key)| key).collect())
    }

    /// Primary key of the highest version of `modid`.
    pub async fn latest(&self, tx: &Transaction, modid: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.versions(tx, modid).await?.pop())
    }

    /// Primary keys of the releases of `modid` within the bounds, oldest
    /// first.
    ///
    /// Bounds compare by precedence only: build metadata and spelling are
    /// ignored, so `1.0` and `1.0.0+linux` both match `Included(1.0.0)`.
    pub async fn range(
        &self,
        tx: &Transaction,
        modid: &str,
        lower: Bound<&Version>,
        upper: Bound<&Version>,
    ) -> Result<Vec<Vec<u8>>> {
        let base = self.mod_prefix(modid)?;
        let with = |version: &Version| [base.as_slice(), version.precedence_key().as_slice()].concat();
        let start = match lower {
            Bound::Included(version) => with(version),
            // Precedence keys are prefix-free, so this skips exactly the
            // versions sharing the bound's precedence.
            Bound::Excluded(version) => match prefix_end(&with(version)) {
                Some(end) => end,
                None => return Ok(Vec::new()),
            },
            Bound::Unbounded => base.clone(),
        };
        let end = match upper {
            Bound::Included(version) => prefix_end(&with(version)),
            Bound::Excluded(version) => Some(with(version)),
            Bound::Unbounded => prefix_end(&base),
        };
        if end.as_ref().is_some_and(|end| *end <= start) {
            return Ok(Vec::new());
        }
        let entries = tx.scan_range(Bucket::Index, &start, end.as_deref()).await?;
        Ok(entries.into_iter().map(|(_, key)| key).collect())
    }
}

#[async_trait]
impl Index for VersionIndex {
    fn name(&self) -> &'static str {
        self.name
    }

    fn source(&self) -> Bucket {
        self.source
    }

    fn derive(&self, _key: &[u8], release: &Release) -> Result<Vec<Vec<u8>>> {
        let mut derived = ReleaseKey::mod_prefix(&release.modid)?;
        derived.extend_from_slice(&release.version.sort_key());
        Ok(vec![derived])
    }
}
