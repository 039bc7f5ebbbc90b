//! On-disk manifest schema (`mod.json`).
//!
//! Only `id`, `title` and `version` are required; everything else defaults to
//! empty. Keys this schema does not know about are ignored so manifests
//! written by newer tools still import.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ModManifest {
    pub id: String,
    pub title: String,
    pub version: String,
    #[serde(default)]
    pub stability: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub logo: String,
    #[serde(default)]
    pub tile: String,
    #[serde(default)]
    pub banner: String,
    #[serde(default)]
    pub release_thread: String,
    #[serde(default, rename = "type")]
    pub mod_type: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub first_release: Option<String>,
    #[serde(default)]
    pub last_update: Option<String>,
    #[serde(default)]
    pub cmdline: String,
    #[serde(default)]
    pub mod_flag: Vec<String>,
    #[serde(default)]
    pub screenshots: Vec<String>,
    #[serde(default)]
    pub videos: Vec<String>,
    #[serde(default)]
    pub packages: Vec<PackageManifest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PackageManifest {
    pub name: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub dependencies: Vec<DependencyManifest>,
    #[serde(default)]
    pub executables: Vec<ExecutableManifest>,
    /// Archives, named `files` in the manifest.
    #[serde(default)]
    pub files: Vec<ArchiveManifest>,
    #[serde(default)]
    pub filelist: Vec<FileManifest>,
    #[serde(default)]
    pub is_vp: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DependencyManifest {
    pub id: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub packages: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutableManifest {
    pub file: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub properties: ExecutableProperties,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ExecutableProperties {
    #[serde(default)]
    pub x64: bool,
    #[serde(default)]
    pub sse2: bool,
    #[serde(default)]
    pub avx: bool,
    #[serde(default)]
    pub avx2: bool,
}

/// `[algorithm, hex digest]`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChecksumManifest(pub String, pub String);

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveManifest {
    pub checksum: ChecksumManifest,
    pub filename: String,
    #[serde(default)]
    pub dest: String,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub filesize: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileManifest {
    pub filename: String,
    pub archive: String,
    #[serde(default)]
    pub orig_name: String,
    pub checksum: ChecksumManifest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_manifest() {
        let manifest: ModManifest =
            serde_json::from_str(r#"{"id": "example", "title": "Example", "version": "1.0.0"}"#).unwrap();
        assert_eq!(manifest.id, "example");
        assert!(manifest.packages.is_empty());
        assert_eq!(manifest.first_release, None);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let manifest: ModManifest = serde_json::from_str(
            r#"{"id": "example", "title": "Example", "version": "1.0.0", "private": true, "owners": ["someone"]}"#,
        )
        .unwrap();
        assert_eq!(manifest.title, "Example");
    }

    #[test]
    fn test_missing_version_is_rejected() {
        assert!(serde_json::from_str::<ModManifest>(r#"{"id": "example", "title": "Example"}"#).is_err());
    }

    #[test]
    fn test_checksum_pair() {
        let archive: ArchiveManifest = serde_json::from_str(
            r#"{"checksum": ["sha256", "00ff"], "filename": "core.7z", "urls": ["https://example.com/core.7z"]}"#,
        )
        .unwrap();
        assert_eq!(archive.checksum.0, "sha256");
        assert_eq!(archive.checksum.1, "00ff");
        assert_eq!(archive.filesize, 0);
    }
}
