//! The build matrix: every leg in parallel, then a barrier
//!
//! Legs are blocking work (they shell out to the packager and compress files), so
//! each one runs on tokio's blocking pool. The barrier waits for every leg to
//! finish, successful or not. Failed legs never cancel their siblings, but a
//! single failure makes the whole matrix fail.

use std::sync::Arc;

use axoasset::LocalAsset;
use itertools::Itertools;
use jiff::Timestamp;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::archive::{package, BundleInputs, PackagedArchive};
use crate::build::{build_executable, ExecutablePackager};
use crate::config::Config;
use crate::errors::{DistError, DistResult};
use crate::storage::ArtifactStore;
use crate::tasks::BuildLeg;

/// Run one leg start to finish: every tool, then the bundle and archive
pub fn run_leg(
    config: &Config,
    leg: &BuildLeg,
    packager: &dyn ExecutablePackager,
    store: &dyn ArtifactStore,
    now: Timestamp,
) -> DistResult<PackagedArchive> {
    info!("starting leg {}", leg.target.asset_name);
    // Leftovers from an earlier run must not pass for this run's output
    if leg.leg_dir.exists() {
        LocalAsset::remove_dir_all(&leg.leg_dir)?;
    }
    LocalAsset::create_dir_all(&leg.bin_dir)?;

    let mut executables = Vec::with_capacity(config.tools.len());
    for tool in &config.tools {
        let request = leg.executable_request(tool, &config.root);
        executables.push(build_executable(packager, &request)?);
    }

    let inputs = BundleInputs::from_config(config);
    let archive = package(
        leg.target,
        &executables,
        &inputs,
        &leg.leg_dir,
        config.trigger.sha.as_deref(),
        store,
        now,
    )?;
    info!("finished leg {}", leg.target.asset_name);
    Ok(archive)
}

/// Run every leg in parallel and wait for all of them
///
/// Returns the archives in leg order, or [`DistError::MatrixFailed`][] naming every
/// leg that failed. Archives from successful legs are still stored either way.
pub async fn run_matrix(
    config: Arc<Config>,
    legs: Vec<BuildLeg>,
    packager: Arc<dyn ExecutablePackager>,
    store: Arc<dyn ArtifactStore>,
    now: Timestamp,
) -> DistResult<Vec<PackagedArchive>> {
    let total = legs.len();
    let asset_names = legs
        .iter()
        .map(|leg| leg.target.asset_name)
        .collect::<Vec<_>>();

    let mut join_set = JoinSet::new();
    for (idx, leg) in legs.into_iter().enumerate() {
        let config = Arc::clone(&config);
        let packager = Arc::clone(&packager);
        let store = Arc::clone(&store);
        join_set.spawn_blocking(move || {
            let result = run_leg(&config, &leg, packager.as_ref(), store.as_ref(), now);
            (idx, result)
        });
    }

    // The barrier: nothing past here runs until every leg has reported
    let mut slots: Vec<Option<DistResult<PackagedArchive>>> = (0..total).map(|_| None).collect();
    let mut crashed = vec![];
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((idx, result)) => slots[idx] = Some(result),
            Err(e) => crashed.push(e),
        }
    }

    let mut archives = Vec::with_capacity(total);
    let mut causes = vec![];
    for (slot, asset_name) in slots.into_iter().zip(asset_names) {
        let result = slot.unwrap_or_else(|| {
            Err(match crashed.pop() {
                Some(e) => DistError::Join(e),
                None => DistError::MissingArchive {
                    asset_name: asset_name.to_owned(),
                },
            })
        });
        match result {
            Ok(archive) => archives.push(archive),
            Err(cause) => {
                error!("leg {asset_name} failed: {cause}");
                causes.push(DistError::LegFailed {
                    asset_name: asset_name.to_owned(),
                    cause: Box::new(cause),
                });
            }
        }
    }

    if causes.is_empty() {
        Ok(archives)
    } else {
        let failed = causes
            .iter()
            .filter_map(|cause| match cause {
                DistError::LegFailed { asset_name, .. } => Some(asset_name.as_str()),
                _ => None,
            })
            .join(", ");
        Err(DistError::MatrixFailed {
            count: causes.len(),
            total,
            failed,
            causes,
        })
    }
}
