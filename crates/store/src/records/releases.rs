use super::{get_record, put_record};
use crate::bucket::Bucket;
use crate::codec::{self, ReleaseKey};
use crate::context::Context;
use crate::error::{ErrorKind, Result};
use crate::index::{self, LOCAL_BY_TYPE, LOCAL_BY_VERSION, REMOTE_BY_TYPE, REMOTE_BY_VERSION, TypeIndex, VersionIndex};
use crate::store::Store;
use crate::transaction::Transaction;
use exn::OptionExt;
use modcat_models::{ModType, Release, Version};
use std::ops::Bound;

/// Which release bucket (and its indexes) an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// Releases installed on this machine.
    Local,
    /// Releases advertised by remote repositories.
    Remote,
}
impl Source {
    pub fn bucket(self) -> Bucket {
        match self {
            Self::Local => Bucket::LocalMods,
            Self::Remote => Bucket::RemoteMods,
        }
    }

    pub fn by_version(self) -> &'static VersionIndex {
        match self {
            Self::Local => &LOCAL_BY_VERSION,
            Self::Remote => &REMOTE_BY_VERSION,
        }
    }

    pub fn by_type(self) -> &'static TypeIndex {
        match self {
            Self::Local => &LOCAL_BY_TYPE,
            Self::Remote => &REMOTE_BY_TYPE,
        }
    }
}

/// Write a release and keep both of its indexes in step.
pub(crate) async fn put_release(tx: &Transaction, source: Source, release: &Release) -> Result<()> {
    let bucket = source.bucket();
    let key = ReleaseKey::new(release.modid.clone(), release.version.clone()).to_bytes()?;
    let old: Option<Release> = get_record(tx, bucket, &key, "release").await?;
    put_record(tx, bucket, &key, release, "release").await?;
    index::maintain(tx, bucket, &key, old.as_ref(), Some(release)).await
}

async fn remove_release(tx: &Transaction, source: Source, key: &[u8]) -> Result<bool> {
    let bucket = source.bucket();
    let Some(old) = get_record::<Release>(tx, bucket, key, "release").await? else {
        return Ok(false);
    };
    tx.delete(bucket, key).await?;
    index::maintain(tx, bucket, key, Some(&old), None).await?;
    Ok(true)
}

/// Resolve index values (primary keys) to their records.
async fn load(tx: &Transaction, source: Source, keys: Vec<Vec<u8>>) -> Result<Vec<Release>> {
    let mut releases = Vec::with_capacity(keys.len());
    for key in keys {
        let release = get_record(tx, source.bucket(), &key, "release")
            .await?
            .ok_or_raise(|| ErrorKind::DecodeFailure("dangling index entry"))?;
        releases.push(release);
    }
    Ok(releases)
}

impl Store {
    /// Insert or replace a release.
    pub async fn save_release(&self, ctx: &Context, source: Source, release: &Release) -> Result<()> {
        self.write_scope(ctx, |ctx| async move { put_release(ctx.require_transaction()?, source, release).await })
            .await
    }

    pub async fn get_release(&self, ctx: &Context, source: Source, modid: &str, version: &Version) -> Result<Option<Release>> {
        let key = ReleaseKey::new(modid, version.clone()).to_bytes()?;
        self.read_scope(ctx, |ctx| async move {
            get_record(ctx.require_transaction()?, source.bucket(), &key, "release").await
        })
        .await
    }

    /// Returns `true` if the release existed.
    pub async fn delete_release(&self, ctx: &Context, source: Source, modid: &str, version: &Version) -> Result<bool> {
        let key = ReleaseKey::new(modid, version.clone()).to_bytes()?;
        self.write_scope(ctx, |ctx| async move { remove_release(ctx.require_transaction()?, source, &key).await })
            .await
    }

    /// Every release of `modid`, oldest version first.
    pub async fn releases_for_mod(&self, ctx: &Context, source: Source, modid: &str) -> Result<Vec<Release>> {
        self.read_scope(ctx, |ctx| async move {
            let tx = ctx.require_transaction()?;
            let keys = source.by_version().versions(tx, modid).await?;
            load(tx, source, keys).await
        })
        .await
    }

    /// The release of `modid` with the highest version.
    pub async fn latest_release(&self, ctx: &Context, source: Source, modid: &str) -> Result<Option<Release>> {
        self.read_scope(ctx, |ctx| async move {
            let tx = ctx.require_transaction()?;
            let keys = source.by_version().latest(tx, modid).await?.into_iter().collect();
            Ok(load(tx, source, keys).await?.pop())
        })
        .await
    }

    /// Releases of `modid` whose version lies within the bounds, oldest
    /// first. Bounds compare by version precedence, ignoring build metadata.
    pub async fn releases_in_range(
        &self,
        ctx: &Context,
        source: Source,
        modid: &str,
        lower: Bound<&Version>,
        upper: Bound<&Version>,
    ) -> Result<Vec<Release>> {
        self.read_scope(ctx, |ctx| async move {
            let tx = ctx.require_transaction()?;
            let keys = source.by_version().range(tx, modid, lower, upper).await?;
            load(tx, source, keys).await
        })
        .await
    }

    pub async fn releases_by_type(&self, ctx: &Context, source: Source, mod_type: ModType) -> Result<Vec<Release>> {
        self.read_scope(ctx, |ctx| async move {
            let tx = ctx.require_transaction()?;
            let keys = source.by_type().keys(tx, mod_type).await?;
            load(tx, source, keys).await
        })
        .await
    }

    /// Every release in the bucket, ordered by mod id then version text.
    pub async fn list_releases(&self, ctx: &Context, source: Source) -> Result<Vec<Release>> {
        self.read_scope(ctx, |ctx| async move {
            let entries = ctx.require_transaction()?.scan_prefix(source.bucket(), &[]).await?;
            entries.iter().map(|(_, value)| codec::decode(value, "release")).collect()
        })
        .await
    }

    /// Store a remote repository listing through the batch worker. Returns
    /// the number of releases written.
    pub async fn save_remote_releases(&self, ctx: &Context, releases: Vec<Release>) -> Result<usize> {
        self.batch_update(ctx, move |ctx| async move {
            let tx = ctx.require_transaction()?;
            for release in &releases {
                put_release(tx, Source::Remote, release).await?;
            }
            Ok(releases.len())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modcat_models::ReleaseStability;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::{BTreeMap, BTreeSet, HashMap};

    fn release(modid: &str, version: &str) -> Release {
        Release::new(modid, version.parse().unwrap(), format!("{modid} {version}"))
    }

    fn versions(releases: &[Release]) -> Vec<&str> {
        releases.iter().map(|r| r.version.as_str()).collect()
    }

    async fn range(store: &Store, lower: Bound<&Version>, upper: Bound<&Version>) -> Vec<String> {
        let found = store.releases_in_range(&Context::new(), Source::Remote, "blueplanet", lower, upper).await.unwrap();
        found.into_iter().map(|r| r.version.as_str().to_string()).collect()
    }

    #[tokio::test]
    async fn test_save_get_delete() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Store::open(temp_dir.path()).await.unwrap();
        let ctx = Context::new();
        let mut engine = release("fs2_open", "23.0.0").with_type(ModType::Engine);
        engine.stability = Some(ReleaseStability::Stable);

        store.save_release(&ctx, Source::Local, &engine).await.unwrap();
        let version = engine.version.clone();
        let found = store.get_release(&ctx, Source::Local, "fs2_open", &version).await.unwrap();
        assert_eq!(found, Some(engine));
        // The remote bucket is separate.
        assert_eq!(store.get_release(&ctx, Source::Remote, "fs2_open", &version).await.unwrap(), None);

        assert!(store.delete_release(&ctx, Source::Local, "fs2_open", &version).await.unwrap());
        assert!(!store.delete_release(&ctx, Source::Local, "fs2_open", &version).await.unwrap());
        assert!(store.releases_by_type(&ctx, Source::Local, ModType::Engine).await.unwrap().is_empty());
        store.close().await;
    }

    #[tokio::test]
    async fn test_versions_are_ordered() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Store::open(temp_dir.path()).await.unwrap();
        let ctx = Context::new();
        for version in ["1.10.0", "1.2.0", "1.2.0-rc.1", "1.2.0-beta", "0.9", "2.0.0-alpha.10", "2.0.0-alpha.2"] {
            store.save_release(&ctx, Source::Local, &release("mediavps", version)).await.unwrap();
        }
        // Another mod sharing the prefix must not leak in.
        store.save_release(&ctx, Source::Local, &release("mediavps_2014", "9.9.9")).await.unwrap();

        let all = store.releases_for_mod(&ctx, Source::Local, "mediavps").await.unwrap();
        assert_eq!(
            versions(&all),
            ["0.9", "1.2.0-beta", "1.2.0-rc.1", "1.2.0", "1.10.0", "2.0.0-alpha.2", "2.0.0-alpha.10"]
        );
        let latest = store.latest_release(&ctx, Source::Local, "mediavps").await.unwrap().unwrap();
        assert_eq!(latest.version.as_str(), "2.0.0-alpha.10");
        assert_eq!(store.latest_release(&ctx, Source::Local, "unknown").await.unwrap(), None);
        store.close().await;
    }

    #[tokio::test]
    async fn test_version_ranges() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Store::open(temp_dir.path()).await.unwrap();
        let ctx = Context::new();
        for version in ["0.9", "1.0", "1.0.0+linux", "1.5.0", "2.0.0-rc.1", "2.0.0"] {
            store.save_release(&ctx, Source::Remote, &release("blueplanet", version)).await.unwrap();
        }
        let one: Version = "1.0.0".parse().unwrap();
        let two: Version = "2.0.0".parse().unwrap();

        let found = range(&store, Bound::Included(&one), Bound::Excluded(&two)).await;
        assert_eq!(found, ["1.0", "1.0.0+linux", "1.5.0", "2.0.0-rc.1"]);
        let found = range(&store, Bound::Excluded(&one), Bound::Included(&two)).await;
        assert_eq!(found, ["1.5.0", "2.0.0-rc.1", "2.0.0"]);
        let found = range(&store, Bound::Unbounded, Bound::Included(&one)).await;
        assert_eq!(found, ["0.9", "1.0", "1.0.0+linux"]);
        let found = range(&store, Bound::Included(&two), Bound::Unbounded).await;
        assert_eq!(found, ["2.0.0"]);
        assert!(range(&store, Bound::Included(&two), Bound::Excluded(&one)).await.is_empty());
        store.close().await;
    }

    #[tokio::test]
    async fn test_replacing_a_release_moves_its_type_entry() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Store::open(temp_dir.path()).await.unwrap();
        let ctx = Context::new();
        let tool = release("knet", "1.0.0").with_type(ModType::Tool);
        store.save_release(&ctx, Source::Local, &tool).await.unwrap();
        store.save_release(&ctx, Source::Local, &tool.clone().with_type(ModType::Extension)).await.unwrap();

        assert!(store.releases_by_type(&ctx, Source::Local, ModType::Tool).await.unwrap().is_empty());
        let extensions = store.releases_by_type(&ctx, Source::Local, ModType::Extension).await.unwrap();
        assert_eq!(extensions.len(), 1);
        assert_eq!(store.list_releases(&ctx, Source::Local).await.unwrap().len(), 1);
        store.close().await;
    }

    #[tokio::test]
    async fn test_indexes_match_random_records() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Store::open(temp_dir.path()).await.unwrap();
        let ctx = Context::new();
        let mut rng = StdRng::seed_from_u64(0x6d6f_6463);
        let mut saved = Vec::new();
        for _ in 0..60 {
            let modid = format!("mod{}", rng.gen_range(0..6));
            let mut version = format!("{}.{}.{}", rng.gen_range(0..3), rng.gen_range(0..12), rng.gen_range(0..3));
            if rng.gen_bool(0.3) {
                version.push_str(&format!("-rc.{}", rng.gen_range(0..4)));
            }
            let mod_type = ModType::ALL[rng.gen_range(0..ModType::ALL.len())];
            let source = if rng.gen_bool(0.5) { Source::Local } else { Source::Remote };
            let record = release(&modid, &version).with_type(mod_type);
            store.save_release(&ctx, source, &record).await.unwrap();
            saved.push((source, record));
        }
        // Delete a few to check that no entry outlives its record.
        for (source, record) in saved.iter().step_by(7) {
            store.delete_release(&ctx, *source, &record.modid, &record.version).await.unwrap();
        }

        for source in [Source::Local, Source::Remote] {
            let records = store.list_releases(&ctx, source).await.unwrap();
            let mut by_type: HashMap<ModType, BTreeSet<(String, String)>> = HashMap::new();
            let mut by_mod: BTreeMap<String, Vec<Version>> = BTreeMap::new();
            for record in &records {
                let id = (record.modid.clone(), record.version.as_str().to_string());
                by_type.entry(record.mod_type).or_default().insert(id);
                by_mod.entry(record.modid.clone()).or_default().push(record.version.clone());
            }
            for mod_type in ModType::ALL {
                let indexed: BTreeSet<_> = store
                    .releases_by_type(&ctx, source, mod_type)
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|r| (r.modid, r.version.as_str().to_string()))
                    .collect();
                assert_eq!(indexed, by_type.remove(&mod_type).unwrap_or_default(), "{source:?} {mod_type}");
            }
            for (modid, mut expected) in by_mod {
                expected.sort();
                let indexed: Vec<_> = store
                    .releases_for_mod(&ctx, source, &modid)
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|r| r.version)
                    .collect();
                assert_eq!(indexed, expected, "{source:?} {modid}");
            }
        }

        let all_valid = store
            .read_scope(&ctx, |ctx| async move {
                let tx = ctx.require_transaction()?;
                for index in index::all() {
                    if !index.verify(tx).await? {
                        return Ok(false);
                    }
                }
                Ok(true)
            })
            .await
            .unwrap();
        assert!(all_valid);
        store.close().await;
    }

    #[tokio::test]
    async fn test_save_remote_releases_is_batched() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Store::open(temp_dir.path()).await.unwrap();
        let ctx = Context::new();
        let listing = vec![release("a", "1.0.0"), release("b", "1.0.0"), release("b", "1.1.0")];
        assert_eq!(store.save_remote_releases(&ctx, listing).await.unwrap(), 3);
        assert_eq!(store.list_releases(&ctx, Source::Remote).await.unwrap().len(), 3);
        assert!(store.list_releases(&ctx, Source::Local).await.unwrap().is_empty());
        assert_eq!(store.stats().batches, 1);
        store.close().await;
    }

    #[tokio::test]
    async fn test_invalid_modid_is_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Store::open(temp_dir.path()).await.unwrap();
        let err = store.save_release(&Context::new(), Source::Local, &release("", "1.0")).await.unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidKey(String::new()));
        store.close().await;
    }
}
