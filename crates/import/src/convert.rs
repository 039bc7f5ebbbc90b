//! Conversion of a parsed manifest into catalog records.
//!
//! Everything that touches the file system (path resolution, new file
//! references) happens here, before the store is involved.

use crate::error::{ErrorKind, Result};
use crate::manifest::{ArchiveManifest, ChecksumManifest, FileManifest, ModManifest, PackageManifest};
use exn::ResultExt;
use modcat_models::{
    Checksum, Dependency, EngineExecutable, ExecutableCapabilities, FileRef, ModType, Package, PackageArchive,
    PackageFile, PackageStatus, Release, ReleaseStability, Version,
};
use std::path::Path;
use time::macros::format_description;
use time::{Date, Time, UtcDateTime};

/// A release ready to be written, plus the local file references it
/// introduced.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub release: Release,
    pub files: Vec<FileRef>,
}

/// Convert `manifest`, resolving asset paths against `manifest_dir` (which
/// should be absolute).
pub fn convert(manifest: ModManifest, manifest_dir: &Path) -> Result<Prepared> {
    let mut files = Vec::new();
    let version = manifest.version.parse::<Version>().or_raise(|| ErrorKind::Manifest { field: "version" })?;
    let mod_type = ModType::from_manifest(&manifest.mod_type);

    let mut release = Release::new(manifest.id, version, manifest.title).with_type(mod_type);
    release.description = manifest.description;
    release.release_thread = manifest.release_thread;
    release.videos = manifest.videos;
    release.notes = manifest.notes;
    release.cmdline = manifest.cmdline;
    release.released = parse_date(manifest.first_release.as_deref(), "first_release")?;
    release.updated = parse_date(manifest.last_update.as_deref(), "last_update")?;
    if mod_type == ModType::Engine {
        release.stability = ReleaseStability::from_manifest(&manifest.stability);
    }

    release.teaser = local_file(manifest_dir, &manifest.tile, "tile", &mut files)?;
    release.banner = local_file(manifest_dir, &manifest.banner, "banner", &mut files)?;
    for screenshot in &manifest.screenshots {
        if let Some(file) = local_file(manifest_dir, screenshot, "screenshots", &mut files)? {
            release.screenshots.push(file);
        }
    }

    release.packages = manifest.packages.into_iter().map(convert_package).collect::<Result<_>>()?;
    Ok(Prepared { release, files })
}

fn convert_package(package: PackageManifest) -> Result<Package> {
    let dependencies = package
        .dependencies
        .into_iter()
        .map(|dep| Dependency { modid: dep.id, constraint: dep.version, packages: dep.packages })
        .collect();
    let executables = package
        .executables
        .into_iter()
        .map(|exe| {
            let capabilities = ExecutableCapabilities {
                x64: exe.properties.x64,
                sse2: exe.properties.sse2,
                avx: exe.properties.avx,
                avx2: exe.properties.avx2,
            };
            EngineExecutable::new(exe.file, exe.label, capabilities)
        })
        .collect();
    Ok(Package {
        name: package.name,
        folder: package.folder,
        notes: package.notes,
        status: PackageStatus::from_manifest(&package.status),
        knossos_vp: package.is_vp,
        dependencies,
        archives: package.files.into_iter().map(convert_archive).collect::<Result<_>>()?,
        files: package.filelist.into_iter().map(convert_file).collect::<Result<_>>()?,
        executables,
    })
}

fn convert_archive(archive: ArchiveManifest) -> Result<PackageArchive> {
    Ok(PackageArchive {
        id: archive.filename.clone(),
        label: archive.filename,
        destination: archive.dest,
        checksum: checksum(&archive.checksum, "files.checksum")?,
        filesize: archive.filesize,
        download: FileRef::new(archive.urls),
    })
}

fn convert_file(file: FileManifest) -> Result<PackageFile> {
    Ok(PackageFile {
        checksum: checksum(&file.checksum, "filelist.checksum")?,
        path: file.filename,
        archive: file.archive,
        archive_path: file.orig_name,
    })
}

fn checksum(value: &ChecksumManifest, field: &'static str) -> Result<Checksum> {
    Checksum::from_hex(value.0.as_str(), &value.1).or_raise(|| ErrorKind::Decode { field })
}

/// `YYYY-MM-DD` to midnight UTC. Absent and empty dates are both unset.
fn parse_date(value: Option<&str>, field: &'static str) -> Result<Option<UtcDateTime>> {
    let format = format_description!("[year]-[month]-[day]");
    match value {
        None | Some("") => Ok(None),
        Some(value) => {
            let date = Date::parse(value, format).or_raise(|| ErrorKind::Manifest { field })?;
            Ok(Some(UtcDateTime::new(date, Time::MIDNIGHT)))
        },
    }
}

fn local_file(dir: &Path, path: &str, field: &'static str, files: &mut Vec<FileRef>) -> Result<Option<FileRef>> {
    if path.is_empty() {
        return Ok(None);
    }
    let file = FileRef::local(dir.join(path)).or_raise(|| ErrorKind::Manifest { field })?;
    files.push(file.clone());
    Ok(Some(file))
}
