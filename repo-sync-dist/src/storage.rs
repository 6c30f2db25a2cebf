//! Artifact storage
//!
//! Each build leg hands its archive to storage under the leg's asset name, and the
//! publisher later gathers them all back out. Keys are leg-unique so legs never
//! contend. Stored archives expire after the retention window, independent of
//! whether they were ever published.

use axoasset::{LocalAsset, SourceFile};
use camino::{Utf8Path, Utf8PathBuf};
use jiff::{Timestamp, ToSpan};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{DistError, DistResult};

const RECORD_FILE: &str = "artifact.json";

/// An archive sitting in artifact storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StoredArtifact {
    /// The key it was stored under
    pub asset_name: String,
    /// The archive's file name
    pub file_name: String,
    /// Where the archive is
    pub path: Utf8PathBuf,
    /// Hex sha256 of the archive
    pub sha256: String,
    /// The commit the archive was built from, if the run knew it
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    /// When it was stored
    pub stored_at: Timestamp,
    /// When it stops being eligible for publishing
    pub expires_at: Timestamp,
}

impl StoredArtifact {
    /// Whether this archive is past its retention window
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

/// Somewhere archives can be put and gathered from
pub trait ArtifactStore: Send + Sync {
    /// Store the archive at `archive` (built from `commit`) under `asset_name`,
    /// replacing anything already there
    fn put(
        &self,
        asset_name: &str,
        archive: &Utf8Path,
        commit: Option<&str>,
        now: Timestamp,
    ) -> DistResult<StoredArtifact>;

    /// Get the archive stored under `asset_name`, if any
    fn get(&self, asset_name: &str) -> DistResult<Option<StoredArtifact>>;

    /// Every stored archive, sorted by asset name
    fn list(&self) -> DistResult<Vec<StoredArtifact>>;

    /// Delete whatever is stored under `asset_name`
    fn remove(&self, asset_name: &str) -> DistResult<()>;
}

/// Artifact storage in a local directory: `<root>/<asset_name>/<file_name>`
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: Utf8PathBuf,
    retention_days: u32,
}

impl LocalArtifactStore {
    /// Open (but don't create) a store rooted at `root`
    pub fn new(root: impl Into<Utf8PathBuf>, retention_days: u32) -> Self {
        Self {
            root: root.into(),
            retention_days,
        }
    }

    /// The root directory of the store
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn slot(&self, asset_name: &str) -> Utf8PathBuf {
        self.root.join(asset_name)
    }
}

impl ArtifactStore for LocalArtifactStore {
    fn put(
        &self,
        asset_name: &str,
        archive: &Utf8Path,
        commit: Option<&str>,
        now: Timestamp,
    ) -> DistResult<StoredArtifact> {
        let file_name = archive
            .file_name()
            .ok_or_else(|| DistError::MissingArchive {
                asset_name: asset_name.to_owned(),
            })?
            .to_owned();
        let slot = self.slot(asset_name);
        if slot.exists() {
            LocalAsset::remove_dir_all(&slot)?;
        }
        LocalAsset::create_dir_all(&slot)?;

        let path = slot.join(&file_name);
        LocalAsset::copy_file_to_file(archive, &path)?;
        let sha256 = sha256_file(&path)?;
        write_checksum(&sha256, &path)?;

        let retention_hours = i64::from(self.retention_days) * 24;
        let record = StoredArtifact {
            asset_name: asset_name.to_owned(),
            file_name,
            path,
            sha256,
            commit: commit.map(str::to_owned),
            stored_at: now,
            expires_at: now.checked_add(retention_hours.hours())?,
        };
        let json = serde_json::to_string_pretty(&record)?;
        LocalAsset::write_new_all(&json, slot.join(RECORD_FILE))?;
        info!("stored {} as {}", record.file_name, asset_name);
        Ok(record)
    }

    fn get(&self, asset_name: &str) -> DistResult<Option<StoredArtifact>> {
        let record_path = self.slot(asset_name).join(RECORD_FILE);
        if !record_path.exists() {
            return Ok(None);
        }
        let src = SourceFile::load_local(&record_path)?;
        let record: StoredArtifact = src.deserialize_json()?;
        if !record.path.exists() {
            debug!("{record_path} points at a missing archive");
            return Ok(None);
        }
        Ok(Some(record))
    }

    fn list(&self) -> DistResult<Vec<StoredArtifact>> {
        if !self.root.exists() {
            return Ok(vec![]);
        }
        let mut names = vec![];
        for entry in self.root.read_dir_utf8()? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_owned());
            }
        }
        names.sort();

        let mut found = vec![];
        for name in names {
            if let Some(record) = self.get(&name)? {
                found.push(record);
            }
        }
        Ok(found)
    }

    fn remove(&self, asset_name: &str) -> DistResult<()> {
        let slot = self.slot(asset_name);
        if slot.exists() {
            LocalAsset::remove_dir_all(&slot)?;
        }
        Ok(())
    }
}

/// Delete every stored archive past its retention window, returning what was deleted
pub fn prune_expired(store: &dyn ArtifactStore, now: Timestamp) -> DistResult<Vec<StoredArtifact>> {
    let mut pruned = vec![];
    for record in store.list()? {
        if record.is_expired(now) {
            info!(
                "pruning {} (expired {})",
                record.asset_name, record.expires_at
            );
            store.remove(&record.asset_name)?;
            pruned.push(record);
        }
    }
    Ok(pruned)
}

/// Hex sha256 of a file's contents
pub fn sha256_file(path: &Utf8Path) -> DistResult<String> {
    use sha2::Digest;

    let file_bytes = LocalAsset::load_bytes(path)?;
    let mut hasher = sha2::Sha256::new();
    hasher.update(&file_bytes);
    let hash = hasher.finalize();
    Ok(hash.iter().map(|byte| format!("{byte:02x}")).collect())
}

/// Write `<archive>.sha256` next to the archive, in the format `sha256sum --check` reads
fn write_checksum(checksum: &str, archive: &Utf8Path) -> DistResult<()> {
    let file_name = archive.file_name().unwrap_or(archive.as_str());
    let line = format!("{checksum} *{file_name}\n");
    LocalAsset::write_new(&line, format!("{archive}.sha256"))?;
    Ok(())
}
