use super::{get_record, put_record};
use crate::bucket::Bucket;
use crate::codec::ReleaseKey;
use crate::context::Context;
use crate::error::Result;
use crate::store::Store;
use crate::transaction::Transaction;
use modcat_models::EngineFlags;

/// Drop flags captured for engine builds that are no longer in local-mods.
/// Returns how many entries were removed.
pub(crate) async fn prune(tx: &Transaction) -> Result<usize> {
    let mut pruned = 0;
    for (key, _) in tx.scan_prefix(Bucket::EngineFlags, &[]).await? {
        if tx.get(Bucket::LocalMods, &key).await?.is_none() {
            tx.delete(Bucket::EngineFlags, &key).await?;
            pruned += 1;
        }
    }
    Ok(pruned)
}

impl Store {
    /// Flags captured for the given (installed) engine build.
    pub async fn engine_flags(&self, ctx: &Context, engine: &ReleaseKey) -> Result<Option<EngineFlags>> {
        let key = engine.to_bytes()?;
        self.read_scope(ctx, |ctx| async move {
            get_record(ctx.require_transaction()?, Bucket::EngineFlags, &key, "engine flags").await
        })
        .await
    }

    pub async fn save_engine_flags(&self, ctx: &Context, engine: &ReleaseKey, flags: &EngineFlags) -> Result<()> {
        let key = engine.to_bytes()?;
        self.write_scope(ctx, |ctx| async move {
            put_record(ctx.require_transaction()?, Bucket::EngineFlags, &key, flags, "engine flags").await
        })
        .await
    }
}
