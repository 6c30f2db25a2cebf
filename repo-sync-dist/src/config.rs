//! Config types: the optional dist.toml, the trigger context, and the resolved run config

use std::collections::BTreeSet;
use std::fmt;

use axoasset::{LocalAsset, SourceFile};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{DistError, DistResult};
use crate::platform::{BuildTarget, BUILD_TARGETS};

/// The name of the (optional) config file at the root of the repo
pub const DIST_CONFIG_FILE: &str = "dist.toml";
/// Prefix of git refs that name a tag
pub const TAG_REF_PREFIX: &str = "refs/tags/";
/// Prefix of git refs that name a branch
pub const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// Env var the packager's python installer reads to decide where interpreters come from
pub const PYTHON_PREFERENCE_ENV: &str = "UV_PYTHON_PREFERENCE";

const DEFAULT_APP_NAME: &str = "repo-sync";
const DEFAULT_CONFIG_DIR: &str = "config";
const DEFAULT_ENV_EXAMPLE: &str = "config/.env.example";
const DEFAULT_README: &str = "README.md";
const DEFAULT_LICENSE: &str = "LICENSE";
const DEFAULT_RELEASE_BRANCHES: &[&str] = &["main", "master"];
const DEFAULT_TIMEZONE: &str = "Asia/Taipei";
const DEFAULT_RETENTION_DAYS: u32 = 30;
const DEFAULT_DIST_DIR: &str = "target/dist";
const DEFAULT_STORAGE_DIR: &str = "target/dist/artifacts";
const DEFAULT_PACKAGER: &str = "pyinstaller";

/// Contents of dist.toml
///
/// Every key is optional, missing keys get the defaults in [`Config::from_dist_config`][].
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct DistConfig {
    /// The name of the application, used in release titles
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,

    /// The tools to build into executables
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolSpec>>,

    /// The configuration directory bundled into each archive
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_dir: Option<Utf8PathBuf>,

    /// The example environment file, always copied into the bundle's config dir
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_example: Option<Utf8PathBuf>,

    /// The README bundled into each archive
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readme: Option<Utf8PathBuf>,

    /// The LICENSE bundled into each archive
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<Utf8PathBuf>,

    /// Branches whose pushes publish the rolling "latest" release
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_branches: Option<Vec<String>>,

    /// The timezone release dates are shown in
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    /// How long stored archives stay eligible for publishing
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_days: Option<u32>,

    /// Where build legs do their work
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dist_dir: Option<Utf8PathBuf>,

    /// Where finished archives are stored
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<Utf8PathBuf>,

    /// The command that turns an entry point into a single-file executable
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packager: Option<Vec<String>>,

    /// Whether the packager should use an already-installed python
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefer_system_python: Option<bool>,

    /// The repository releases are published to (`owner/name`)
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
}

/// A tool that gets built into a standalone executable on every target
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ToolSpec {
    /// Name of the executable (without any platform suffix)
    pub name: String,
    /// The script the executable runs
    pub entry_point: Utf8PathBuf,
    /// Modules the packager can't discover on its own
    #[serde(default)]
    pub hidden_imports: BTreeSet<String>,
    /// Directory embedded into the executable
    #[serde(default = "default_data_dir")]
    pub data_dir: Utf8PathBuf,
}

fn default_data_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_CONFIG_DIR)
}

impl ToolSpec {
    fn new(name: &str, entry_point: &str, hidden_imports: &[&str]) -> Self {
        Self {
            name: name.to_owned(),
            entry_point: entry_point.into(),
            hidden_imports: hidden_imports.iter().map(|s| (*s).to_owned()).collect(),
            data_dir: default_data_dir(),
        }
    }
}

/// The sync tool and the cleanup tool
pub fn default_tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new(
            "repo-sync",
            "sync_repos.py",
            &["dotenv", "requests", "urllib3", "error_handler"],
        ),
        ToolSpec::new(
            "repo-cleanup",
            "cleanup_tool.py",
            &["dotenv", "requests", "urllib3"],
        ),
    ]
}

/// What kind of event started this run
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerEvent {
    /// A push of a branch or tag
    #[default]
    Push,
    /// A pull request; builds, never publishes
    PullRequest,
    /// Someone asked for a run by hand
    Manual,
}

impl TriggerEvent {
    /// Interpret a GitHub Actions event name
    pub fn from_github_event_name(name: &str) -> Self {
        match name {
            "pull_request" | "pull_request_target" => TriggerEvent::PullRequest,
            "workflow_dispatch" => TriggerEvent::Manual,
            _ => TriggerEvent::Push,
        }
    }

    /// The name used in reports and on the CLI
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerEvent::Push => "push",
            TriggerEvent::PullRequest => "pull-request",
            TriggerEvent::Manual => "manual",
        }
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The event, ref, and commit that invoked the pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerContext {
    /// What kind of event this was
    pub event: TriggerEvent,
    /// The full ref (`refs/tags/v1.0.0`, `refs/heads/main`), empty if unknown
    pub git_ref: String,
    /// The commit being built
    pub sha: Option<String>,
}

impl TriggerContext {
    /// Make a context, filling anything not given from the CI environment
    pub fn from_env(
        event: Option<TriggerEvent>,
        git_ref: Option<String>,
        sha: Option<String>,
    ) -> Self {
        let event = event.unwrap_or_else(|| {
            std::env::var("GITHUB_EVENT_NAME")
                .map(|name| TriggerEvent::from_github_event_name(&name))
                .unwrap_or_default()
        });
        let git_ref = git_ref
            .or_else(|| non_empty_var("GITHUB_REF"))
            .unwrap_or_default();
        let sha = sha.or_else(|| non_empty_var("GITHUB_SHA"));
        Self {
            event,
            git_ref,
            sha,
        }
    }

    /// The tag this run was triggered by, if any
    pub fn tag(&self) -> Option<&str> {
        self.git_ref.strip_prefix(TAG_REF_PREFIX)
    }

    /// The branch this run was triggered on, if any
    pub fn branch(&self) -> Option<&str> {
        self.git_ref.strip_prefix(BRANCH_REF_PREFIX)
    }

    /// The schema form of this context, for the manifest
    pub fn to_schema(&self) -> repo_sync_dist_schema::Trigger {
        repo_sync_dist_schema::Trigger {
            event: self.event.as_str().to_owned(),
            git_ref: self.git_ref.clone(),
            sha: self.sha.clone(),
        }
    }
}

/// A credential that must never end up in logs
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    /// Wrap a credential
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get at the credential, for handing to the one command that needs it
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Read the release credential from `GH_TOKEN` or `GITHUB_TOKEN`
    pub fn from_env() -> Option<Self> {
        non_empty_var("GH_TOKEN")
            .or_else(|| non_empty_var("GITHUB_TOKEN"))
            .map(Self)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Everything a run needs to know, with defaults applied and paths made absolute
#[derive(Debug, Clone)]
pub struct Config {
    /// The root of the repo being built
    pub root: Utf8PathBuf,
    /// The application name
    pub app_name: String,
    /// Tools to build, in build order
    pub tools: Vec<ToolSpec>,
    /// Config directory to bundle
    pub config_dir: Utf8PathBuf,
    /// Example environment file to bundle into the config dir
    pub env_example: Utf8PathBuf,
    /// README to bundle
    pub readme: Utf8PathBuf,
    /// LICENSE to bundle
    pub license: Utf8PathBuf,
    /// Branches that publish "latest"
    pub release_branches: Vec<String>,
    /// IANA name of the timezone release dates are shown in
    pub timezone: String,
    /// How many days a stored archive stays publishable
    pub retention_days: u32,
    /// Where legs do their work
    pub dist_dir: Utf8PathBuf,
    /// Where archives are stored
    pub storage_dir: Utf8PathBuf,
    /// The packager command and any leading arguments
    pub packager: Vec<String>,
    /// Whether to set the runtime signal preferring an installed python
    pub prefer_system_python: bool,
    /// `owner/name` of the release repository
    pub repo: Option<String>,
    /// The targets this run builds
    pub targets: Vec<&'static BuildTarget>,
    /// What invoked this run
    pub trigger: TriggerContext,
}

impl Config {
    /// Load `dist.toml` from `root` (if there is one) and resolve it
    ///
    /// A relative `root` is taken relative to the current directory.
    pub fn load(root: &Utf8Path) -> DistResult<Self> {
        let root = if root.is_relative() {
            LocalAsset::current_dir()?.join(root)
        } else {
            root.to_owned()
        };
        let root = root.as_path();
        let config_path = root.join(DIST_CONFIG_FILE);
        if config_path.exists() {
            debug!("loading config from {config_path}");
            let src = SourceFile::load_local(&config_path)?;
            let file = src.deserialize_toml::<DistConfig>()?;
            Self::from_dist_config(root, file, &config_path)
        } else {
            debug!("no {DIST_CONFIG_FILE}, using defaults");
            Self::from_dist_config(root, DistConfig::default(), &config_path)
        }
    }

    /// Apply defaults to a [`DistConfig`][] and check it makes sense
    ///
    /// `root` should already be absolute; every configured path is joined onto it.
    pub fn from_dist_config(
        root: &Utf8Path,
        file: DistConfig,
        config_path: &Utf8Path,
    ) -> DistResult<Self> {
        let invalid = |key: &str, value: String, help: &str| DistError::InvalidConfig {
            config_path: config_path.to_owned(),
            key: key.to_owned(),
            value,
            help: help.to_owned(),
        };
        let path_or = |p: Option<Utf8PathBuf>, default: &str| {
            root.join(p.unwrap_or_else(|| Utf8PathBuf::from(default)))
        };

        let tools = file.tools.unwrap_or_else(default_tools);
        if tools.is_empty() {
            return Err(invalid(
                "tools",
                "[]".to_owned(),
                "configure at least one tool",
            ));
        }
        let mut seen = BTreeSet::new();
        for tool in &tools {
            if !seen.insert(tool.name.as_str()) {
                return Err(DistError::DuplicateTool {
                    name: tool.name.clone(),
                });
            }
        }

        let retention_days = file.retention_days.unwrap_or(DEFAULT_RETENTION_DAYS);
        if retention_days == 0 {
            return Err(invalid(
                "retention-days",
                "0".to_owned(),
                "archives must be kept for at least one day",
            ));
        }

        let timezone = file
            .timezone
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_owned());
        if jiff::tz::TimeZone::get(&timezone).is_err() {
            return Err(invalid(
                "timezone",
                timezone,
                "use an IANA timezone name like \"Asia/Taipei\" or \"UTC\"",
            ));
        }

        let packager = file
            .packager
            .unwrap_or_else(|| vec![DEFAULT_PACKAGER.to_owned()]);
        if packager.is_empty() {
            return Err(invalid(
                "packager",
                "[]".to_owned(),
                "the packager needs at least a command name",
            ));
        }

        if let Some(repo) = &file.repo {
            if repo.split('/').filter(|part| !part.is_empty()).count() != 2 {
                return Err(invalid(
                    "repo",
                    repo.clone(),
                    "repositories are written as owner/name",
                ));
            }
        }

        Ok(Self {
            root: root.to_owned(),
            app_name: file
                .app_name
                .unwrap_or_else(|| DEFAULT_APP_NAME.to_owned()),
            tools,
            config_dir: path_or(file.config_dir, DEFAULT_CONFIG_DIR),
            env_example: path_or(file.env_example, DEFAULT_ENV_EXAMPLE),
            readme: path_or(file.readme, DEFAULT_README),
            license: path_or(file.license, DEFAULT_LICENSE),
            release_branches: file.release_branches.unwrap_or_else(|| {
                DEFAULT_RELEASE_BRANCHES
                    .iter()
                    .map(|b| (*b).to_owned())
                    .collect()
            }),
            timezone,
            retention_days,
            dist_dir: path_or(file.dist_dir, DEFAULT_DIST_DIR),
            storage_dir: path_or(file.storage_dir, DEFAULT_STORAGE_DIR),
            packager,
            prefer_system_python: file.prefer_system_python.unwrap_or(true),
            repo: file.repo.or_else(|| non_empty_var("GITHUB_REPOSITORY")),
            targets: BUILD_TARGETS.iter().collect(),
            trigger: TriggerContext::default(),
        })
    }

    /// Whether the given branch publishes the rolling release
    pub fn is_release_branch(&self, branch: &str) -> bool {
        self.release_branches.iter().any(|b| b == branch)
    }

    /// Per-leg work directory
    pub fn leg_dir(&self, target: &BuildTarget) -> Utf8PathBuf {
        self.dist_dir.join("legs").join(target.asset_name)
    }

    /// Where the run's manifest is written
    pub fn manifest_path(&self) -> Utf8PathBuf {
        self.dist_dir.join("dist-manifest.json")
    }
}
