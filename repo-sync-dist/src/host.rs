//! Details for hosting releases
//!
//! The release host is where the archives end up: one release per tag, with the
//! archives attached as assets. This module holds both release-job steps, the
//! reaper (clear out the previous rolling release) and the publisher.

use std::collections::BTreeSet;

use axoprocess::Cmd;
use camino::Utf8PathBuf;
use jiff::Timestamp;
use repo_sync_dist_schema::Release;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::announce::{ReleaseNotes, ReleaseVersion, LATEST};
use crate::config::{Config, Secret};
use crate::errors::{DistError, DistResult};
use crate::platform::BUILD_TARGETS;
use crate::storage::{ArtifactStore, StoredArtifact};

/// A release as the host currently has it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedRelease {
    /// The release's tag
    pub tag: String,
    /// The release's title
    pub title: String,
    /// The release's body
    pub body: String,
    /// Whether it's a draft
    pub draft: bool,
    /// Whether it's a prerelease
    pub prerelease: bool,
    /// Names of the attached assets
    pub assets: Vec<String>,
}

/// What the publisher wants a release to look like
#[derive(Debug, Clone)]
pub struct ReleaseRequest<'a> {
    /// The tag (and version)
    pub tag: &'a str,
    /// Title and body
    pub notes: &'a ReleaseNotes,
    /// The archives to attach, and nothing else
    pub archives: &'a [StoredArtifact],
    /// The commit a newly created tag should point at
    pub target_commitish: Option<&'a str>,
}

impl ReleaseRequest<'_> {
    fn archive_paths(&self) -> impl Iterator<Item = &Utf8PathBuf> {
        self.archives.iter().map(|a| &a.path)
    }
}

/// Somewhere releases live
///
/// Every release this crate creates or edits is non-draft and non-prerelease.
pub trait ReleaseHost: Send + Sync {
    /// Look up the release for `tag`
    fn find_release(&self, tag: &str) -> DistResult<Option<HostedRelease>>;

    /// Delete the release for `tag` and the tag itself
    fn delete_release_and_tag(&self, tag: &str) -> DistResult<()>;

    /// Create a release with exactly the requested archives attached
    fn create_release(&self, request: &ReleaseRequest<'_>) -> DistResult<()>;

    /// Update an existing release's title and body in place
    fn update_release(&self, request: &ReleaseRequest<'_>) -> DistResult<()>;

    /// Attach the requested archives, replacing same-named assets
    fn upload_assets(&self, request: &ReleaseRequest<'_>) -> DistResult<()>;

    /// Remove one asset from a release
    fn delete_asset(&self, tag: &str, asset_name: &str) -> DistResult<()>;
}

/// Whether the reaper runs for this version and branch
pub fn should_reap(config: &Config, version: &ReleaseVersion, branch: Option<&str>) -> bool {
    version.is_latest() && branch.is_some_and(|b| config.is_release_branch(b))
}

/// Best-effort deletion of the previous rolling release and its tag
///
/// Only acts for "latest" on a release branch. Never fails: a missing release and a
/// deleted one are the same outcome, and any other failure is logged and ignored.
/// Returns whether a deletion was attempted.
pub fn reap_release(
    host: &dyn ReleaseHost,
    config: &Config,
    version: &ReleaseVersion,
    branch: Option<&str>,
) -> bool {
    if !should_reap(config, version, branch) {
        debug!("not reaping: {version} on {branch:?}");
        return false;
    }
    info!("removing any previous {LATEST} release");
    if let Err(e) = host.delete_release_and_tag(LATEST) {
        warn!("couldn't remove the previous {LATEST} release (continuing anyway): {e}");
    }
    true
}

/// Gather every target's archive out of storage for publishing
///
/// Fails before anything is published if any archive is missing or expired, was
/// built from a different commit than `commit`, or if two archives would collide
/// on the release. With no `commit` to compare against, provenance isn't checked.
pub fn gather_archives(
    store: &dyn ArtifactStore,
    commit: Option<&str>,
    now: Timestamp,
) -> DistResult<Vec<StoredArtifact>> {
    let mut seen = BTreeSet::new();
    let mut archives = Vec::with_capacity(BUILD_TARGETS.len());
    for target in BUILD_TARGETS {
        let Some(stored) = store.get(target.asset_name)? else {
            return Err(DistError::MissingArchive {
                asset_name: target.asset_name.to_owned(),
            });
        };
        if stored.is_expired(now) {
            return Err(DistError::ExpiredArchive {
                asset_name: stored.asset_name,
                expires_at: stored.expires_at.to_string(),
            });
        }
        if let Some(expected) = commit {
            if stored.commit.as_deref() != Some(expected) {
                return Err(DistError::StaleArchive {
                    asset_name: stored.asset_name,
                    found: stored.commit.unwrap_or_else(|| "an unknown commit".to_owned()),
                    expected: expected.to_owned(),
                });
            }
        }
        if !seen.insert(stored.file_name.clone()) {
            return Err(DistError::ArchiveCollision {
                file_name: stored.file_name,
            });
        }
        archives.push(stored);
    }
    Ok(archives)
}

/// Create the release for `version`, or bring an existing one in line with this run
pub fn publish_release(
    host: &dyn ReleaseHost,
    version: &ReleaseVersion,
    notes: &ReleaseNotes,
    archives: &[StoredArtifact],
    target_commitish: Option<&str>,
) -> DistResult<Release> {
    let request = ReleaseRequest {
        tag: version.as_str(),
        notes,
        archives,
        target_commitish,
    };

    match host.find_release(request.tag)? {
        None => {
            info!("creating release {}", request.tag);
            host.create_release(&request)?;
        }
        Some(existing) => {
            info!("updating existing release {}", request.tag);
            host.update_release(&request)?;
            host.upload_assets(&request)?;
            let expected = archives
                .iter()
                .map(|a| a.file_name.as_str())
                .collect::<BTreeSet<_>>();
            for stale in existing
                .assets
                .iter()
                .filter(|name| !expected.contains(name.as_str()))
            {
                info!("removing stale asset {stale} from {}", request.tag);
                host.delete_asset(request.tag, stale)?;
            }
        }
    }

    Ok(Release {
        tag: request.tag.to_owned(),
        title: notes.title.clone(),
        body: notes.body.clone(),
        draft: false,
        prerelease: false,
        artifacts: archives.iter().map(|a| a.file_name.clone()).collect(),
    })
}

/// Talks to GitHub Releases through the `gh` cli
#[derive(Debug, Clone)]
pub struct GithubCliHost {
    repo: String,
    token: Secret,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhRelease {
    tag_name: String,
    name: String,
    #[serde(default)]
    body: String,
    is_draft: bool,
    is_prerelease: bool,
    #[serde(default)]
    assets: Vec<GhAsset>,
}

#[derive(Deserialize)]
struct GhAsset {
    name: String,
}

impl GithubCliHost {
    /// Make a host for `owner/name`, authenticated with `token`
    pub fn new(repo: impl Into<String>, token: Secret) -> Self {
        Self {
            repo: repo.into(),
            token,
        }
    }

    /// Make a host from the run config and whatever credential the environment has
    pub fn from_env(config: &Config) -> DistResult<Self> {
        let repo = config.repo.clone().ok_or(DistError::MissingRepo)?;
        let token = Secret::from_env().ok_or(DistError::MissingToken)?;
        Ok(Self::new(repo, token))
    }

    /// A `gh release <subcommand> <tag>` invocation carrying the credential
    ///
    /// Cmd's own logging prints the environment, so it's off and we log a summary instead.
    fn gh_release(&self, subcommand: &str, tag: &str) -> Cmd {
        let summary = format!("gh release {subcommand} {tag} --repo {}", self.repo);
        info!("exec {summary}");
        let mut cmd = Cmd::new("gh", summary);
        cmd.log(None);
        cmd.env("GH_TOKEN", self.token.expose());
        cmd.arg("release").arg(subcommand).arg(tag);
        cmd.arg("--repo").arg(&self.repo);
        cmd
    }
}

impl ReleaseHost for GithubCliHost {
    fn find_release(&self, tag: &str) -> DistResult<Option<HostedRelease>> {
        let mut cmd = self.gh_release("view", tag);
        cmd.arg("--json")
            .arg("tagName,name,body,isDraft,isPrerelease,assets");
        cmd.check(false);
        let output = cmd.output()?;
        if !output.status.success() {
            // gh has no dedicated exit code for a missing release, only this message
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_release_not_found(&stderr) {
                return Ok(None);
            }
            cmd.check_status(output.status)?;
        }
        let release: GhRelease =
            serde_json::from_slice(&output.stdout).map_err(|details| DistError::HostResponse {
                action: format!("look up release {tag}"),
                details,
            })?;
        Ok(Some(HostedRelease {
            tag: release.tag_name,
            title: release.name,
            body: release.body,
            draft: release.is_draft,
            prerelease: release.is_prerelease,
            assets: release.assets.into_iter().map(|a| a.name).collect(),
        }))
    }

    fn delete_release_and_tag(&self, tag: &str) -> DistResult<()> {
        let mut cmd = self.gh_release("delete", tag);
        cmd.arg("--yes").arg("--cleanup-tag");
        cmd.run()?;
        Ok(())
    }

    fn create_release(&self, request: &ReleaseRequest<'_>) -> DistResult<()> {
        let mut cmd = self.gh_release("create", request.tag);
        for path in request.archive_paths() {
            cmd.arg(path);
        }
        cmd.arg("--title").arg(&request.notes.title);
        cmd.arg("--notes").arg(&request.notes.body);
        cmd.arg("--draft=false").arg("--prerelease=false");
        if let Some(commitish) = request.target_commitish {
            cmd.arg("--target").arg(commitish);
        }
        cmd.run()?;
        Ok(())
    }

    fn update_release(&self, request: &ReleaseRequest<'_>) -> DistResult<()> {
        let mut cmd = self.gh_release("edit", request.tag);
        cmd.arg("--title").arg(&request.notes.title);
        cmd.arg("--notes").arg(&request.notes.body);
        cmd.arg("--draft=false").arg("--prerelease=false");
        cmd.run()?;
        Ok(())
    }

    fn upload_assets(&self, request: &ReleaseRequest<'_>) -> DistResult<()> {
        let mut cmd = self.gh_release("upload", request.tag);
        for path in request.archive_paths() {
            cmd.arg(path);
        }
        cmd.arg("--clobber");
        cmd.run()?;
        Ok(())
    }

    fn delete_asset(&self, tag: &str, asset_name: &str) -> DistResult<()> {
        let mut cmd = self.gh_release("delete-asset", tag);
        cmd.arg(asset_name).arg("--yes");
        cmd.run()?;
        Ok(())
    }
}

/// Whether `gh release view` failed because the release doesn't exist
fn is_release_not_found(stderr: &str) -> bool {
    stderr
        .lines()
        .any(|line| line.trim().eq_ignore_ascii_case("release not found"))
}
