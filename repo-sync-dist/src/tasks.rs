//! Code to compute the tasks a run should do
//!
//! [`gather_work`][] computes everything a run will do ahead of time, from the
//! config and the trigger context alone, without touching the filesystem:
//!
//! 1. one [`BuildLeg`][] per selected target, each a strictly sequential list of
//!    [`BuildStep`][]s (build every tool, assemble the bundle, compress, store)
//! 2. a [`ReleasePlan`][]: the resolved version, and whether the release job will
//!    reap and publish at all
//!
//! Legs share nothing: each one gets its own directory under `<dist-dir>/legs/`,
//! and stores its archive under its own asset name. The release job only ever
//! reads from artifact storage, after every leg has finished.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::announce::{resolve_version, ReleaseVersion};
use crate::build::ExecutableRequest;
use crate::config::{Config, ToolSpec, TriggerEvent};
use crate::host::should_reap;
use crate::platform::BuildTarget;

/// Everything a run will do
#[derive(Debug, Clone, Serialize)]
pub struct DistGraph {
    /// The application being released
    pub app_name: String,
    /// Where legs work
    pub dist_dir: Utf8PathBuf,
    /// Where archives are stored
    pub storage_dir: Utf8PathBuf,
    /// One leg per target
    pub legs: Vec<BuildLeg>,
    /// What the release job will do
    pub release: ReleasePlan,
}

/// The work for one target
#[derive(Debug, Clone, Serialize)]
pub struct BuildLeg {
    /// The target
    pub target: &'static BuildTarget,
    /// This leg's private directory
    pub leg_dir: Utf8PathBuf,
    /// Scratch space for the packager
    pub work_dir: Utf8PathBuf,
    /// Where executables are written
    pub bin_dir: Utf8PathBuf,
    /// Where the archive is written before it's stored
    pub archive_path: Utf8PathBuf,
    /// The steps, in order
    pub steps: Vec<BuildStep>,
}

impl BuildLeg {
    /// The request handed to the packager to build `tool` in this leg
    pub fn executable_request<'a>(
        &self,
        tool: &'a ToolSpec,
        root: &'a Utf8Path,
    ) -> ExecutableRequest<'a> {
        ExecutableRequest {
            tool,
            target: self.target,
            root,
            work_dir: self.work_dir.join(&tool.name),
            out_dir: self.bin_dir.clone(),
        }
    }
}

/// A single step of a leg
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BuildStep {
    /// Build one tool into an executable
    Executable {
        /// the tool
        tool: String,
        /// the executable's file name on this target
        file_name: String,
    },
    /// Assemble the bundle directory
    Bundle {
        /// the bundle's name
        asset_name: String,
    },
    /// Compress the bundle
    Compress {
        /// the archive's file name
        file_name: String,
    },
    /// Hand the archive to artifact storage
    Store {
        /// the storage key
        asset_name: String,
    },
}

/// What the release job does once every leg is done
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleasePlan {
    /// The version (and tag) being released
    pub version: ReleaseVersion,
    /// The event that triggered the run
    pub event: TriggerEvent,
    /// The branch the run was triggered on, if any
    pub branch: Option<String>,
    /// Whether the previous rolling release gets reaped first
    pub reap: bool,
    /// Whether anything gets published
    pub publish: bool,
}

/// Whether this trigger publishes a release at all
///
/// Pull requests never do. Otherwise a tag always does, and a branch does if it's
/// a release branch.
pub fn should_publish(config: &Config) -> bool {
    let trigger = &config.trigger;
    if trigger.event == TriggerEvent::PullRequest {
        return false;
    }
    trigger.tag().is_some_and(|t| !t.is_empty())
        || trigger
            .branch()
            .is_some_and(|b| config.is_release_branch(b))
}

/// Compute everything this run will do
pub fn gather_work(config: &Config) -> DistGraph {
    let legs = config
        .targets
        .iter()
        .map(|&target| plan_leg(config, target))
        .collect();

    let version = resolve_version(&config.trigger.git_ref);
    let branch = config.trigger.branch().map(str::to_owned);
    let publish = should_publish(config);
    let reap = publish && should_reap(config, &version, branch.as_deref());

    DistGraph {
        app_name: config.app_name.clone(),
        dist_dir: config.dist_dir.clone(),
        storage_dir: config.storage_dir.clone(),
        legs,
        release: ReleasePlan {
            version,
            event: config.trigger.event,
            branch,
            reap,
            publish,
        },
    }
}

fn plan_leg(config: &Config, target: &'static BuildTarget) -> BuildLeg {
    let leg_dir = config.leg_dir(target);
    let mut steps = config
        .tools
        .iter()
        .map(|tool| BuildStep::Executable {
            tool: tool.name.clone(),
            file_name: target.exe_file_name(&tool.name),
        })
        .collect::<Vec<_>>();
    steps.push(BuildStep::Bundle {
        asset_name: target.asset_name.to_owned(),
    });
    steps.push(BuildStep::Compress {
        file_name: target.archive_file_name(),
    });
    steps.push(BuildStep::Store {
        asset_name: target.asset_name.to_owned(),
    });

    BuildLeg {
        target,
        work_dir: leg_dir.join("work"),
        bin_dir: leg_dir.join("bin"),
        archive_path: leg_dir.join(target.archive_file_name()),
        leg_dir,
        steps,
    }
}
