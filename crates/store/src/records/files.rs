use super::{get_record, put_record, text_key};
use crate::bucket::Bucket;
use crate::context::Context;
use crate::error::Result;
use crate::store::Store;
use crate::transaction::Transaction;
use modcat_models::FileRef;

pub(crate) async fn put_file(tx: &Transaction, file: &FileRef) -> Result<()> {
    put_record(tx, Bucket::FileCache, text_key(&file.id)?, file, "file").await
}

impl Store {
    /// Remember a file reference under its id. File references are never
    /// edited, so saving an existing id again simply overwrites it with the
    /// same content.
    pub async fn import_file(&self, ctx: &Context, file: &FileRef) -> Result<()> {
        self.write_scope(ctx, |ctx| async move { put_file(ctx.require_transaction()?, file).await }).await
    }

    pub async fn get_file(&self, ctx: &Context, id: &str) -> Result<Option<FileRef>> {
        let key = text_key(id)?;
        self.read_scope(ctx, |ctx| async move {
            get_record(ctx.require_transaction()?, Bucket::FileCache, key, "file").await
        })
        .await
    }

    pub async fn delete_file(&self, ctx: &Context, id: &str) -> Result<bool> {
        let key = text_key(id)?;
        self.write_scope(ctx, |ctx| async move { ctx.require_transaction()?.delete(Bucket::FileCache, key).await })
            .await
    }
}
