use super::{get_record, put_record, text_key};
use crate::bucket::Bucket;
use crate::context::Context;
use crate::error::Result;
use crate::store::Store;
use modcat_models::{Settings, UserModSettings};

// The settings bucket holds a single record.
const SETTINGS_KEY: &[u8] = b"settings";

impl Store {
    /// Application settings; defaults when nothing was saved yet.
    pub async fn settings(&self, ctx: &Context) -> Result<Settings> {
        self.read_scope(ctx, |ctx| async move {
            let settings = get_record(ctx.require_transaction()?, Bucket::Settings, SETTINGS_KEY, "settings").await?;
            Ok(settings.unwrap_or_default())
        })
        .await
    }

    pub async fn save_settings(&self, ctx: &Context, settings: &Settings) -> Result<()> {
        self.write_scope(ctx, |ctx| async move {
            put_record(ctx.require_transaction()?, Bucket::Settings, SETTINGS_KEY, settings, "settings").await
        })
        .await
    }

    pub async fn user_mod_settings(&self, ctx: &Context, modid: &str) -> Result<Option<UserModSettings>> {
        let key = text_key(modid)?;
        self.read_scope(ctx, |ctx| async move {
            get_record(ctx.require_transaction()?, Bucket::UserModSettings, key, "user mod settings").await
        })
        .await
    }

    pub async fn save_user_mod_settings(&self, ctx: &Context, modid: &str, settings: &UserModSettings) -> Result<()> {
        let key = text_key(modid)?;
        self.write_scope(ctx, |ctx| async move {
            put_record(ctx.require_transaction()?, Bucket::UserModSettings, key, settings, "user mod settings").await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_settings_default_until_saved() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Store::open(temp_dir.path()).await.unwrap();
        let ctx = Context::new();
        assert_eq!(store.settings(&ctx).await.unwrap(), Settings::default());

        let settings = Settings { library_path: Some(PathBuf::from("/games/fs2")), max_downloads: 5, ..Default::default() };
        store.save_settings(&ctx, &settings).await.unwrap();
        assert_eq!(store.settings(&ctx).await.unwrap(), settings);
        store.close().await;
    }

    #[tokio::test]
    async fn test_user_mod_settings() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Store::open(temp_dir.path()).await.unwrap();
        let ctx = Context::new();
        assert_eq!(store.user_mod_settings(&ctx, "blueplanet").await.unwrap(), None);
        let settings = UserModSettings {
            version: Some("1.1.0".parse().unwrap()),
            cmdline: Some("-window".to_string()),
            enabled_packages: vec!["core".to_string()],
            ..Default::default()
        };
        store.save_user_mod_settings(&ctx, "blueplanet", &settings).await.unwrap();
        assert_eq!(store.user_mod_settings(&ctx, "blueplanet").await.unwrap(), Some(settings));
        store.close().await;
    }
}
