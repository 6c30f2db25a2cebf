#![deny(missing_docs)]
#![allow(clippy::result_large_err)]

//! # repo-sync-dist
//!
//! This is the library at the core of the `repo-sync-dist` CLI, which builds the
//! repo-sync tools into standalone executables for every platform, packages them,
//! and publishes them as a release.
//!
//! A run goes `triggered → building → resolving-version → (reaping →) publishing → published`.
//! Runs that shouldn't publish (pull requests, non-release branches) stop at `built`.
//! If any build leg fails the run aborts before the release host is touched.

use std::sync::Arc;

use itertools::Itertools;
use jiff::Timestamp;
use repo_sync_dist_schema::DistManifest;
use serde::Serialize;
use tracing::info;

pub use announce::{resolve_version, ReleaseVersion};
pub use config::Config;
pub use errors::{DistError, DistResult};
pub use tasks::{gather_work, DistGraph};

use archive::BundleInputs;
use build::ExecutablePackager;
use host::ReleaseHost;
use storage::{ArtifactStore, StoredArtifact};

pub mod announce;
pub mod archive;
pub mod build;
pub mod config;
pub mod errors;
pub mod host;
pub mod manifest;
pub mod matrix;
pub mod platform;
pub mod storage;
pub mod tasks;
#[cfg(test)]
mod tests;

/// A state the pipeline passed through
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineState {
    /// The run started
    Triggered,
    /// The build matrix ran
    Building,
    /// The release version was resolved
    ResolvingVersion,
    /// The previous rolling release was removed
    Reaping,
    /// The release was being created or replaced
    Publishing,
    /// The release exists with every archive attached (terminal)
    Published,
    /// Archives were built and stored, nothing was published (terminal)
    Built,
}

/// What a run did
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    /// Every state the run passed through, in order
    pub states: Vec<PipelineState>,
    /// The version the run resolved
    pub version: ReleaseVersion,
    /// The manifest the run wrote
    pub manifest: DistManifest,
}

impl PipelineState {
    /// The state's name in reports
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Triggered => "triggered",
            PipelineState::Building => "building",
            PipelineState::ResolvingVersion => "resolving-version",
            PipelineState::Reaping => "reaping",
            PipelineState::Publishing => "publishing",
            PipelineState::Published => "published",
            PipelineState::Built => "built",
        }
    }
}

impl PipelineReport {
    /// The state the run finished in
    pub fn terminal(&self) -> Option<PipelineState> {
        self.states.last().copied()
    }
}

/// The resolved version of a run, and the date its release would show
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedVersion {
    /// The version (and release tag)
    pub version: ReleaseVersion,
    /// `YYYY-MM-DD` in the configured timezone
    pub date: String,
    /// Whether this run would publish
    pub publish: bool,
    /// Whether this run would reap the previous rolling release
    pub reap: bool,
}

/// repo-sync-dist plan -- compute what a run would do, without doing it
pub fn do_plan(config: &Config) -> DistResult<(DistGraph, DistManifest)> {
    let dist = gather_work(config);
    let manifest = manifest::plan_manifest(config, &dist);
    Ok((dist, manifest))
}

/// repo-sync-dist resolve-version
pub fn do_resolve_version(config: &Config, now: Timestamp) -> DistResult<ResolvedVersion> {
    let dist = gather_work(config);
    Ok(ResolvedVersion {
        date: announce::release_date(now, &config.timezone)?,
        version: dist.release.version,
        publish: dist.release.publish,
        reap: dist.release.reap,
    })
}

/// repo-sync-dist build -- run the build matrix and store every archive
pub async fn do_build(
    config: &Config,
    packager: Arc<dyn ExecutablePackager>,
    store: Arc<dyn ArtifactStore>,
    now: Timestamp,
) -> DistResult<PipelineReport> {
    let dist = gather_work(config);
    let mut states = vec![PipelineState::Triggered];
    let manifest = build_matrix(config, &dist, packager, store, now, &mut states).await?;
    states.push(PipelineState::Built);
    Ok(PipelineReport {
        states,
        version: dist.release.version,
        manifest,
    })
}

/// repo-sync-dist publish -- the release job, from whatever is in artifact storage
pub fn do_publish(
    config: &Config,
    store: &dyn ArtifactStore,
    host: &dyn ReleaseHost,
    now: Timestamp,
) -> DistResult<PipelineReport> {
    let dist = gather_work(config);
    let manifest_path = config.manifest_path();
    let mut manifest = manifest::load_manifest(&manifest_path)?
        .unwrap_or_else(|| manifest::plan_manifest(config, &dist));
    manifest.version = Some(dist.release.version.to_string());
    manifest.trigger = Some(config.trigger.to_schema());

    let mut states = vec![PipelineState::Triggered];
    release_job(config, &dist, store, host, now, &mut manifest, &mut states)?;
    manifest::save_manifest(&manifest_path, &manifest)?;
    Ok(PipelineReport {
        states,
        version: dist.release.version,
        manifest,
    })
}

/// repo-sync-dist run -- build matrix, barrier, then the release job
///
/// `host` may only be None if this trigger doesn't publish.
pub async fn do_run(
    config: &Config,
    packager: Arc<dyn ExecutablePackager>,
    store: Arc<dyn ArtifactStore>,
    host: Option<&dyn ReleaseHost>,
    now: Timestamp,
) -> DistResult<PipelineReport> {
    let dist = gather_work(config);
    if dist.release.publish {
        // The release must be exactly this run's matrix, never a mix with older archives
        if dist.legs.len() != platform::BUILD_TARGETS.len() {
            return Err(DistError::PartialMatrix {
                selected: dist.legs.iter().map(|leg| leg.target.asset_name).join(", "),
            });
        }
        if host.is_none() {
            return Err(DistError::MissingToken);
        }
    }

    let mut states = vec![PipelineState::Triggered];
    let mut manifest =
        build_matrix(config, &dist, packager, Arc::clone(&store), now, &mut states).await?;

    match host {
        Some(host) if dist.release.publish => {
            release_job(
                config,
                &dist,
                store.as_ref(),
                host,
                now,
                &mut manifest,
                &mut states,
            )?;
            manifest::save_manifest(&config.manifest_path(), &manifest)?;
        }
        _ => {
            info!(
                "not publishing: {} of {:?}",
                config.trigger.event, config.trigger.git_ref
            );
            states.push(PipelineState::Built);
        }
    }

    Ok(PipelineReport {
        states,
        version: dist.release.version,
        manifest,
    })
}

/// repo-sync-dist prune -- delete stored archives past their retention window
pub fn do_prune(store: &dyn ArtifactStore, now: Timestamp) -> DistResult<Vec<StoredArtifact>> {
    storage::prune_expired(store, now)
}

async fn build_matrix(
    config: &Config,
    dist: &DistGraph,
    packager: Arc<dyn ExecutablePackager>,
    store: Arc<dyn ArtifactStore>,
    now: Timestamp,
    states: &mut Vec<PipelineState>,
) -> DistResult<DistManifest> {
    // Every leg would fail the same way, so say it once up front
    BundleInputs::from_config(config).check()?;

    states.push(PipelineState::Building);
    eprintln!("building {} legs:", dist.legs.len());
    for leg in &dist.legs {
        eprintln!("  {}", leg.target.archive_file_name());
    }
    let archives = matrix::run_matrix(
        Arc::new(config.clone()),
        dist.legs.clone(),
        packager,
        store,
        now,
    )
    .await?;

    let mut manifest = manifest::plan_manifest(config, dist);
    manifest::add_archives_to_manifest(&mut manifest, &archives);
    manifest::save_manifest(&config.manifest_path(), &manifest)?;
    Ok(manifest)
}

fn release_job(
    config: &Config,
    dist: &DistGraph,
    store: &dyn ArtifactStore,
    host: &dyn ReleaseHost,
    now: Timestamp,
    manifest: &mut DistManifest,
    states: &mut Vec<PipelineState>,
) -> DistResult<()> {
    states.push(PipelineState::ResolvingVersion);
    let plan = &dist.release;
    if !plan.publish {
        info!("{} of {:?} doesn't publish", plan.event, config.trigger.git_ref);
        states.push(PipelineState::Built);
        return Ok(());
    }
    let version = &plan.version;
    let date = announce::release_date(now, &config.timezone)?;
    info!("releasing {version} ({date})");

    // Nothing is touched on the host until we know every archive is there
    let archives = host::gather_archives(store, config.trigger.sha.as_deref(), now)?;
    let tool_names = config
        .tools
        .iter()
        .map(|t| t.name.clone())
        .collect::<Vec<_>>();
    let notes = announce::Templates::new()?.release_notes(
        &config.app_name,
        &tool_names,
        version,
        &date,
    )?;

    if plan.reap {
        states.push(PipelineState::Reaping);
        host::reap_release(host, config, version, plan.branch.as_deref());
    }

    states.push(PipelineState::Publishing);
    let release = host::publish_release(
        host,
        version,
        &notes,
        &archives,
        config.trigger.sha.as_deref(),
    )?;
    manifest::add_stored_to_manifest(manifest, &archives);
    manifest::add_release_to_manifest(manifest, release);
    states.push(PipelineState::Published);
    Ok(())
}
