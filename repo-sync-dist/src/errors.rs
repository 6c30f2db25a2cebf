//! Errors!
//!
//! The library reports [`DistError`][]; the CLI's top-level works in miette::Report.

use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

/// An alias for the common Result type for this crate
pub type DistResult<T> = std::result::Result<T, DistError>;

/// Errors repo-sync-dist can have
#[derive(Debug, Error, Diagnostic)]
pub enum DistError {
    /// random i/o error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// random axoasset error
    #[error(transparent)]
    #[diagnostic(transparent)]
    Asset(#[from] axoasset::AxoassetError),

    /// random axoprocess error
    #[error(transparent)]
    #[diagnostic(transparent)]
    Cmd(#[from] axoprocess::AxoprocessError),

    /// random json error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// random template error
    #[error(transparent)]
    Template(#[from] minijinja::Error),

    /// random datetime error
    #[error(transparent)]
    Time(#[from] jiff::Error),

    /// a leg's worker thread died
    #[error("a build leg stopped unexpectedly")]
    Join(#[from] tokio::task::JoinError),

    /// A path we needed to be utf8 wasn't
    #[error("{} is not a utf8 path", path.display())]
    NonUtf8Path {
        /// the offending path
        path: std::path::PathBuf,
    },

    /// The config file had a key we couldn't make sense of
    #[error("invalid value for {key} in {config_path}: {value}")]
    #[diagnostic(help("{help}"))]
    InvalidConfig {
        /// the config file
        config_path: Utf8PathBuf,
        /// the key
        key: String,
        /// the bad value
        value: String,
        /// how to fix it
        help: String,
    },

    /// The user asked for a target we don't build for
    #[error("unknown build target {name}")]
    #[diagnostic(help("the supported targets are: {supported}"))]
    UnknownTarget {
        /// what they asked for
        name: String,
        /// comma-separated list of what we support
        supported: String,
    },

    /// The same tool name was configured twice
    #[error("tool {name} is configured more than once")]
    DuplicateTool {
        /// the duplicated tool name
        name: String,
    },

    /// A file that needs to be bundled into every archive is missing
    #[error("couldn't find {kind} at {path}")]
    #[diagnostic(help("every archive bundles this file, so it must exist before building"))]
    MissingBundleInput {
        /// what kind of input ("README", "LICENSE", ...)
        kind: &'static str,
        /// where we looked
        path: Utf8PathBuf,
    },

    /// The packager ran but didn't produce the executable it promised
    #[error("packaging {tool} for {target} didn't produce {path}")]
    #[diagnostic(help("check the packager output above for errors"))]
    MissingExecutable {
        /// the tool
        tool: String,
        /// the platform
        target: String,
        /// where the executable should have been
        path: Utf8PathBuf,
    },

    /// A leg failed. Wraps the underlying error with the leg it came from.
    #[error("build leg {asset_name} failed")]
    LegFailed {
        /// the leg's asset name
        asset_name: String,
        /// what went wrong
        #[source]
        cause: Box<DistError>,
    },

    /// At least one leg of the build matrix failed, so nothing may be published
    #[error("{count} of {total} build legs failed: {failed}")]
    #[diagnostic(help("no release was created or modified"))]
    MatrixFailed {
        /// how many legs failed
        count: usize,
        /// how many legs ran
        total: usize,
        /// comma-separated asset names of the failed legs
        failed: String,
        /// each leg's error
        #[related]
        causes: Vec<DistError>,
    },

    /// Artifact storage didn't have an archive the release needs
    #[error("artifact storage has no archive for {asset_name}")]
    #[diagnostic(help(
        "every build leg must succeed (and store its archive) before a release can be published"
    ))]
    MissingArchive {
        /// the asset name we expected
        asset_name: String,
    },

    /// A stored archive is past its retention window
    #[error("the stored archive for {asset_name} expired at {expires_at}")]
    #[diagnostic(help("rebuild it; expired archives are never published"))]
    ExpiredArchive {
        /// the asset name
        asset_name: String,
        /// when it expired
        expires_at: String,
    },

    /// A stored archive came from a different run than the one publishing
    #[error("the stored archive for {asset_name} was built from {found}, not {expected}")]
    #[diagnostic(help("rebuild every target for this commit before publishing"))]
    StaleArchive {
        /// the asset name
        asset_name: String,
        /// the commit the stored archive was built from
        found: String,
        /// the commit being released
        expected: String,
    },

    /// A run that publishes was asked to build only some of the targets
    #[error("a run that publishes must build every target, but only {selected} were selected")]
    #[diagnostic(help(
        "drop --target so every platform is rebuilt, or use `build` for a partial build"
    ))]
    PartialMatrix {
        /// comma-separated asset names that were selected
        selected: String,
    },

    /// Two archives being gathered for a release share a file name
    #[error("more than one archive is named {file_name}")]
    ArchiveCollision {
        /// the colliding file name
        file_name: String,
    },

    /// We need a credential to talk to the release host and don't have one
    #[error("no release credential was provided")]
    #[diagnostic(help("set GH_TOKEN (or GITHUB_TOKEN) to a token with write access to releases"))]
    MissingToken,

    /// We need to know which repository to publish to
    #[error("no repository to publish releases to")]
    #[diagnostic(help("set repo = \"owner/name\" in dist.toml, or GITHUB_REPOSITORY"))]
    MissingRepo,

    /// The release host returned something we couldn't parse
    #[error("couldn't understand the release host's response while trying to {action}")]
    HostResponse {
        /// what we were doing
        action: String,
        /// underlying error
        #[source]
        details: serde_json::Error,
    },
}
