//! Building and saving dist-manifest.json

use std::collections::BTreeMap;

use axoasset::{LocalAsset, SourceFile};
use camino::Utf8Path;
use repo_sync_dist_schema::{Artifact, DistManifest, Release};

use crate::archive::PackagedArchive;
use crate::config::Config;
use crate::errors::DistResult;
use crate::platform::target_by_name;
use crate::storage::StoredArtifact;
use crate::tasks::DistGraph;

/// The manifest for a plan, before anything is built
pub fn plan_manifest(config: &Config, dist: &DistGraph) -> DistManifest {
    let artifacts = dist
        .legs
        .iter()
        .map(|leg| {
            let target = leg.target;
            let artifact = Artifact {
                name: target.asset_name.to_owned(),
                file_name: target.archive_file_name(),
                target: target.os_id.to_string(),
                path: None,
                assets: vec![],
                checksum: None,
            };
            (target.asset_name.to_owned(), artifact)
        })
        .collect::<BTreeMap<_, _>>();

    let mut manifest = DistManifest::new(env!("CARGO_PKG_VERSION").to_owned(), artifacts);
    manifest.version = Some(dist.release.version.to_string());
    manifest.trigger = Some(config.trigger.to_schema());
    manifest
}

/// Record freshly built archives, with what's inside them
pub fn add_archives_to_manifest(manifest: &mut DistManifest, archives: &[PackagedArchive]) {
    for archive in archives {
        let mut artifact = artifact_for_stored(&archive.stored);
        artifact.assets = archive.assets.clone();
        manifest
            .artifacts
            .insert(archive.stored.asset_name.clone(), artifact);
    }
}

/// Record archives gathered from storage, keeping any contents an earlier run recorded
pub fn add_stored_to_manifest(manifest: &mut DistManifest, stored: &[StoredArtifact]) {
    for record in stored {
        let fresh = artifact_for_stored(record);
        manifest
            .artifacts
            .entry(record.asset_name.clone())
            .and_modify(|existing| {
                existing.path = fresh.path.clone();
                existing.checksum = fresh.checksum.clone();
            })
            .or_insert(fresh);
    }
}

/// Record the release the archives were attached to
pub fn add_release_to_manifest(manifest: &mut DistManifest, release: Release) {
    manifest.release = Some(release);
}

fn artifact_for_stored(stored: &StoredArtifact) -> Artifact {
    let target = target_by_name(&stored.asset_name)
        .map(|t| t.os_id.to_string())
        .unwrap_or_default();
    Artifact {
        name: stored.asset_name.clone(),
        file_name: stored.file_name.clone(),
        target,
        path: Some(stored.path.to_string()),
        assets: vec![],
        checksum: Some(stored.sha256.clone()),
    }
}

/// Load a previously saved manifest, if there is one
pub fn load_manifest(manifest_path: &Utf8Path) -> DistResult<Option<DistManifest>> {
    if !manifest_path.exists() {
        return Ok(None);
    }
    let src = SourceFile::load_local(manifest_path)?;
    Ok(Some(src.deserialize_json()?))
}

/// Save the manifest to disk
pub fn save_manifest(manifest_path: &Utf8Path, manifest: &DistManifest) -> DistResult<()> {
    let contents = serde_json::to_string_pretty(manifest)?;
    LocalAsset::write_new_all(&contents, manifest_path)?;
    Ok(())
}
