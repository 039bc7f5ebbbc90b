//! Fixed partitions of the key space.
//!
//! Every bucket is its own table of opaque `(key, value)` blobs. SQLite
//! compares blobs bytewise, so a key range is an ordered index scan.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    LocalMods,
    RemoteMods,
    Index,
    FileCache,
    Settings,
    UserModSettings,
    EngineFlags,
    HttpCache,
}
impl Bucket {
    pub const ALL: [Bucket; 8] = [
        Self::LocalMods,
        Self::RemoteMods,
        Self::Index,
        Self::FileCache,
        Self::Settings,
        Self::UserModSettings,
        Self::EngineFlags,
        Self::HttpCache,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::LocalMods => "local-mods",
            Self::RemoteMods => "remote-mods",
            Self::Index => "index",
            Self::FileCache => "file-cache",
            Self::Settings => "settings",
            Self::UserModSettings => "user-mod-settings",
            Self::EngineFlags => "engine-flags",
            Self::HttpCache => "http-cache",
        }
    }

    fn table(&self) -> &'static str {
        match self {
            Self::LocalMods => "bucket_local_mods",
            Self::RemoteMods => "bucket_remote_mods",
            Self::Index => "bucket_index",
            Self::FileCache => "bucket_file_cache",
            Self::Settings => "bucket_settings",
            Self::UserModSettings => "bucket_user_mod_settings",
            Self::EngineFlags => "bucket_engine_flags",
            Self::HttpCache => "bucket_http_cache",
        }
    }

    pub(crate) fn sql(&self) -> &'static Statements {
        &STATEMENTS[*self as usize]
    }
}
impl Display for Bucket {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

/// Pre-rendered statements for one bucket table.
pub(crate) struct Statements {
    pub(crate) create: String,
    pub(crate) get: String,
    pub(crate) put: String,
    pub(crate) delete: String,
    pub(crate) range: String,
    pub(crate) range_from: String,
    pub(crate) count_range: String,
    pub(crate) count_from: String,
    pub(crate) delete_range: String,
    pub(crate) delete_from: String,
}
impl Statements {
    fn new(table: &str) -> Self {
        Self {
            create: format!(
                "CREATE TABLE IF NOT EXISTS {table} (key BLOB PRIMARY KEY NOT NULL, value BLOB NOT NULL) WITHOUT ROWID"
            ),
            get: format!("SELECT value FROM {table} WHERE key = ?1"),
            put: format!(
                "INSERT INTO {table} (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value"
            ),
            delete: format!("DELETE FROM {table} WHERE key = ?1"),
            range: format!("SELECT key, value FROM {table} WHERE key >= ?1 AND key < ?2 ORDER BY key"),
            range_from: format!("SELECT key, value FROM {table} WHERE key >= ?1 ORDER BY key"),
            count_range: format!("SELECT COUNT(*) FROM {table} WHERE key >= ?1 AND key < ?2"),
            count_from: format!("SELECT COUNT(*) FROM {table} WHERE key >= ?1"),
            delete_range: format!("DELETE FROM {table} WHERE key >= ?1 AND key < ?2"),
            delete_from: format!("DELETE FROM {table} WHERE key >= ?1"),
        }
    }
}

// Indexed by `Bucket as usize`, so the order must follow the enum.
static STATEMENTS: LazyLock<Vec<Statements>> =
    LazyLock::new(|| Bucket::ALL.iter().map(|bucket| Statements::new(bucket.table())).collect());

/// The smallest key greater than every key starting with `prefix`.
///
/// Returns `None` when no such key exists (empty prefix, or all `0xff`),
/// meaning the range is unbounded above.
pub(crate) fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}
