use super::{get_record, put_record, text_key};
use crate::bucket::Bucket;
use crate::context::Context;
use crate::error::Result;
use crate::store::Store;
use modcat_models::HttpCacheEntry;

impl Store {
    /// The cached response for `url`, if any.
    pub async fn http_cache_entry(&self, ctx: &Context, url: &str) -> Result<Option<HttpCacheEntry>> {
        let key = text_key(url)?;
        self.read_scope(ctx, |ctx| async move {
            get_record(ctx.require_transaction()?, Bucket::HttpCache, key, "http cache entry").await
        })
        .await
    }

    pub async fn save_http_cache_entry(&self, ctx: &Context, url: &str, entry: &HttpCacheEntry) -> Result<()> {
        let key = text_key(url)?;
        self.write_scope(ctx, |ctx| async move {
            put_record(ctx.require_transaction()?, Bucket::HttpCache, key, entry, "http cache entry").await
        })
        .await
    }

    pub async fn delete_http_cache_entry(&self, ctx: &Context, url: &str) -> Result<bool> {
        let key = text_key(url)?;
        self.write_scope(ctx, |ctx| async move { ctx.require_transaction()?.delete(Bucket::HttpCache, key).await })
            .await
    }
}
