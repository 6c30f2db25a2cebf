//! The set of platforms we build for, and how each one wants its archive
//!
//! The platform set is closed: every run builds exactly these targets
//! (or a `--target` subset of them), so it's a static table rather than config.

use std::fmt;

use axoasset::LocalAsset;
use camino::Utf8Path;
use itertools::Itertools;
use serde::Serialize;

use crate::errors::{DistError, DistResult};

/// An operating system we produce executables for
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OsId {
    /// Linux
    Linux,
    /// Windows
    Windows,
    /// macOS
    Macos,
}

impl OsId {
    /// The lowercase name used in asset names and on the CLI
    pub fn as_str(self) -> &'static str {
        match self {
            OsId::Linux => "linux",
            OsId::Windows => "windows",
            OsId::Macos => "macos",
        }
    }

    /// The filename suffix native executables have on this OS
    pub fn exe_suffix(self) -> &'static str {
        match self {
            OsId::Windows => ".exe",
            OsId::Linux | OsId::Macos => "",
        }
    }
}

impl fmt::Display for OsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a bundle directory gets compressed into an archive
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// .zip
    Zip,
    /// .tar.gz
    TarGz,
}

impl ArchiveFormat {
    /// The archive format a given OS gets
    pub const fn for_os(os: OsId) -> Self {
        match os {
            OsId::Windows => ArchiveFormat::Zip,
            OsId::Linux | OsId::Macos => ArchiveFormat::TarGz,
        }
    }

    /// Get the extension used by this kind of archive
    pub const fn ext(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => ".zip",
            ArchiveFormat::TarGz => ".tar.gz",
        }
    }

    /// Compress the contents of `src_dir` into a new archive at `dest_path`
    ///
    /// The contents are placed at the root of the archive (no wrapping directory).
    pub fn compress(self, src_dir: &Utf8Path, dest_path: &Utf8Path) -> DistResult<()> {
        let with_root: Option<&Utf8Path> = None;
        match self {
            ArchiveFormat::Zip => LocalAsset::zip_dir(src_dir, dest_path, with_root)?,
            ArchiveFormat::TarGz => LocalAsset::tar_gz_dir(src_dir, dest_path, with_root)?,
        }
        Ok(())
    }

    /// Unpack an archive made by [`ArchiveFormat::compress`][] into `dest_dir`
    pub fn extract(self, archive: &Utf8Path, dest_dir: &Utf8Path) -> DistResult<()> {
        match self {
            ArchiveFormat::Zip => LocalAsset::unzip_all(archive, dest_dir)?,
            ArchiveFormat::TarGz => LocalAsset::untar_gz_all(archive, dest_dir)?,
        }
        Ok(())
    }
}

/// One supported platform's build descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildTarget {
    /// The OS this target builds for
    pub os_id: OsId,
    /// The unique name of this target's archive, without extension
    pub asset_name: &'static str,
    /// The archive extension (".zip" on Windows, ".tar.gz" otherwise)
    pub archive_extension: &'static str,
}

impl BuildTarget {
    const fn new(os_id: OsId, asset_name: &'static str) -> Self {
        Self {
            os_id,
            asset_name,
            archive_extension: ArchiveFormat::for_os(os_id).ext(),
        }
    }

    /// The archive format for this target
    pub fn archive_format(&self) -> ArchiveFormat {
        ArchiveFormat::for_os(self.os_id)
    }

    /// The file name of this target's archive (e.g. `repo-sync-linux.tar.gz`)
    pub fn archive_file_name(&self) -> String {
        format!("{}{}", self.asset_name, self.archive_extension)
    }

    /// The file name a tool's executable has on this target
    pub fn exe_file_name(&self, tool_name: &str) -> String {
        format!("{tool_name}{}", self.os_id.exe_suffix())
    }
}

/// Every platform we build for
pub const BUILD_TARGETS: &[BuildTarget] = &[
    BuildTarget::new(OsId::Linux, "repo-sync-linux"),
    BuildTarget::new(OsId::Windows, "repo-sync-windows"),
    BuildTarget::new(OsId::Macos, "repo-sync-macos"),
];

/// Look up a build target by OS name ("linux") or asset name ("repo-sync-linux")
pub fn target_by_name(name: &str) -> DistResult<&'static BuildTarget> {
    BUILD_TARGETS
        .iter()
        .find(|t| t.os_id.as_str() == name || t.asset_name == name)
        .ok_or_else(|| DistError::UnknownTarget {
            name: name.to_owned(),
            supported: BUILD_TARGETS
                .iter()
                .map(|t| t.os_id.as_str())
                .join(", "),
        })
}

/// Select the targets to build, given some (possibly empty) list of requested names
///
/// No requests means every target. Output order follows [`BUILD_TARGETS`][], duplicates collapse.
pub fn select_targets(requested: &[String]) -> DistResult<Vec<&'static BuildTarget>> {
    if requested.is_empty() {
        return Ok(BUILD_TARGETS.iter().collect());
    }
    let mut wanted = Vec::with_capacity(requested.len());
    for name in requested {
        wanted.push(target_by_name(name)?);
    }
    Ok(BUILD_TARGETS
        .iter()
        .filter(|&t| wanted.contains(&t))
        .collect())
}
