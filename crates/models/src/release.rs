use crate::timestamp;
use crate::{Checksum, FileRef, Version};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use time::UtcDateTime;

/// Kind of release.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModType {
    #[default]
    Mod,
    TotalConversion,
    Engine,
    Tool,
    Extension,
}
impl ModType {
    pub const ALL: [ModType; 5] = [Self::Mod, Self::TotalConversion, Self::Engine, Self::Tool, Self::Extension];

    /// Map the manifest spelling of a release type.
    ///
    /// Unrecognised (or missing) types are treated as a plain [`ModType::Mod`].
    pub fn from_manifest(value: &str) -> Self {
        match value {
            "mod" => Self::Mod,
            "tc" => Self::TotalConversion,
            "engine" => Self::Engine,
            "tool" => Self::Tool,
            "extension" => Self::Extension,
            _ => Self::Mod,
        }
    }

    /// Stable name, also used as the key of the by-type indexes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mod => "mod",
            Self::TotalConversion => "tc",
            Self::Engine => "engine",
            Self::Tool => "tool",
            Self::Extension => "extension",
        }
    }
}
impl Display for ModType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Release channel of an engine build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReleaseStability {
    Stable,
    Rc,
    Nightly,
}
impl ReleaseStability {
    /// Map the manifest spelling; anything unknown is left unset.
    pub fn from_manifest(value: &str) -> Option<Self> {
        match value {
            "stable" => Some(Self::Stable),
            "rc" => Some(Self::Rc),
            "nightly" => Some(Self::Nightly),
            _ => None,
        }
    }
}

/// Whether a package is installed along with its release.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageStatus {
    #[default]
    Required,
    Recommended,
    Optional,
}
impl PackageStatus {
    /// Map the manifest spelling; unknown statuses fall back to
    /// [`PackageStatus::Required`].
    pub fn from_manifest(value: &str) -> Self {
        match value {
            "recommended" => Self::Recommended,
            "optional" => Self::Optional,
            _ => Self::Required,
        }
    }
}

/// CPU features an engine executable was built for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutableCapabilities {
    pub x64: bool,
    pub sse2: bool,
    pub avx: bool,
    pub avx2: bool,
}
impl ExecutableCapabilities {
    pub const X64_WEIGHT: u32 = 50;
    pub const AVX2_WEIGHT: u32 = 3;
    pub const AVX_WEIGHT: u32 = 2;
    pub const SSE2_WEIGHT: u32 = 1;

    /// Weighted sum used to pick the best executable for a machine; higher
    /// is preferred.
    pub fn priority(&self) -> u32 {
        [
            (self.x64, Self::X64_WEIGHT),
            (self.avx2, Self::AVX2_WEIGHT),
            (self.avx, Self::AVX_WEIGHT),
            (self.sse2, Self::SSE2_WEIGHT),
        ]
        .into_iter()
        .filter_map(|(enabled, weight)| enabled.then_some(weight))
        .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineExecutable {
    pub path: String,
    pub label: String,
    pub priority: u32,
    pub debug: bool,
}
impl EngineExecutable {
    pub fn new(path: impl Into<String>, label: impl Into<String>, capabilities: ExecutableCapabilities) -> Self {
        let label = label.into();
        let debug = label.to_lowercase().contains("debug");
        Self { path: path.into(), label, priority: capabilities.priority(), debug }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub modid: String,
    /// Version constraint, as written by the release author.
    #[serde(default)]
    pub constraint: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageArchive {
    pub id: String,
    pub label: String,
    pub destination: String,
    pub checksum: Checksum,
    pub filesize: u64,
    pub download: FileRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageFile {
    pub path: String,
    pub archive: String,
    pub archive_path: String,
    pub checksum: Checksum,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub status: PackageStatus,
    #[serde(default)]
    pub knossos_vp: bool,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub archives: Vec<PackageArchive>,
    #[serde(default)]
    pub files: Vec<PackageFile>,
    #[serde(default)]
    pub executables: Vec<EngineExecutable>,
}

/// A single version of a mod, engine or tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub modid: String,
    pub version: Version,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teaser: Option<FileRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<FileRef>,
    #[serde(default)]
    pub release_thread: String,
    #[serde(default)]
    pub screenshots: Vec<FileRef>,
    #[serde(default)]
    pub videos: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub cmdline: String,
    #[serde(default, with = "timestamp::optional")]
    pub released: Option<UtcDateTime>,
    #[serde(default, with = "timestamp::optional")]
    pub updated: Option<UtcDateTime>,
    #[serde(default, rename = "type")]
    pub mod_type: ModType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stability: Option<ReleaseStability>,
    #[serde(default)]
    pub packages: Vec<Package>,
}
impl Release {
    /// A release with only its identifying fields set.
    pub fn new(modid: impl Into<String>, version: Version, title: impl Into<String>) -> Self {
        Self {
            modid: modid.into(),
            version,
            title: title.into(),
            description: String::new(),
            teaser: None,
            banner: None,
            release_thread: String::new(),
            screenshots: Vec::new(),
            videos: Vec::new(),
            notes: String::new(),
            cmdline: String::new(),
            released: None,
            updated: None,
            mod_type: ModType::Mod,
            stability: None,
            packages: Vec::new(),
        }
    }

    pub fn with_type(mut self, mod_type: ModType) -> Self {
        self.mod_type = mod_type;
        self
    }

    /// Every file reference the release points at.
    pub fn file_refs(&self) -> impl Iterator<Item = &FileRef> {
        self.teaser
            .iter()
            .chain(self.banner.iter())
            .chain(self.screenshots.iter())
            .chain(self.packages.iter().flat_map(|p| p.archives.iter().map(|a| &a.download)))
    }
}
