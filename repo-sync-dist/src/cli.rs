//! All the clap stuff for parsing/documenting the cli

use camino::Utf8PathBuf;
use clap::{
    builder::{PossibleValuesParser, TypedValueParser},
    Args, Parser, Subcommand, ValueEnum,
};
use repo_sync_dist::config::TriggerEvent;
use tracing::level_filters::LevelFilter;

#[derive(Parser, Clone, Debug)]
#[clap(version, about, long_about = None)]
#[clap(propagate_version = true)]
/// Build, package, and release the repo-sync tools.
///
/// A full run builds every tool for every platform in parallel, waits for all of
/// them, and then publishes the archives as a release: tagged with the pushed tag,
/// or "latest" for pushes to a release branch.
pub struct Cli {
    /// The thing to do
    #[clap(subcommand)]
    pub command: Commands,

    /// How verbose logging should be (log level)
    #[clap(long, short)]
    #[clap(default_value_t = LevelFilter::WARN)]
    #[clap(value_parser = PossibleValuesParser::new(["off", "error", "warn", "info", "debug", "trace"]).map(|s| s.parse::<LevelFilter>().expect("possible values are valid")))]
    #[clap(help_heading = "GLOBAL OPTIONS", global = true)]
    pub verbose: LevelFilter,

    /// The format of the output
    #[clap(long, short, value_enum)]
    #[clap(default_value_t = OutputFormat::Human)]
    #[clap(help_heading = "GLOBAL OPTIONS", global = true)]
    pub output_format: OutputFormat,

    /// The root of the repo being released (defaults to the current directory)
    #[clap(long)]
    #[clap(help_heading = "GLOBAL OPTIONS", global = true)]
    pub root: Option<Utf8PathBuf>,

    /// The git ref that triggered this run (defaults to $GITHUB_REF)
    ///
    /// `refs/tags/<name>` releases `<name>`; a release branch (`refs/heads/main`)
    /// releases "latest".
    #[clap(long = "ref", value_name = "REF")]
    #[clap(help_heading = "TRIGGER", global = true)]
    pub git_ref: Option<String>,

    /// The kind of event that triggered this run (defaults from $GITHUB_EVENT_NAME)
    #[clap(long, value_enum)]
    #[clap(help_heading = "TRIGGER", global = true)]
    pub event: Option<EventArg>,

    /// The commit this run is for (defaults to $GITHUB_SHA)
    #[clap(long)]
    #[clap(help_heading = "TRIGGER", global = true)]
    pub sha: Option<String>,

    /// Platforms to build (linux, windows, macos); defaults to all of them
    #[clap(long, short)]
    #[clap(help_heading = "GLOBAL OPTIONS", global = true)]
    pub target: Vec<String>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Build the selected platforms and put their archives in artifact storage
    #[clap(disable_version_flag = true)]
    Build(BuildArgs),
    /// Publish the archives in artifact storage as a release
    ///
    /// This is the release job: it resolves the version, removes the previous
    /// rolling release if needed, and creates or replaces the release.
    /// Requires GH_TOKEN (or GITHUB_TOKEN).
    #[clap(disable_version_flag = true)]
    Publish(PublishArgs),
    /// Build everything, then publish if the trigger calls for it
    #[clap(disable_version_flag = true)]
    Run(BuildArgs),
    /// Show what a run would do without doing it
    #[clap(disable_version_flag = true)]
    Plan,
    /// Print the version (and date) this trigger would release
    #[clap(disable_version_flag = true)]
    ResolveVersion,
    /// Delete stored archives that are past their retention window
    #[clap(disable_version_flag = true)]
    Prune,
    /// Print the JSON schema for dist-manifest.json
    #[clap(disable_version_flag = true)]
    ManifestSchema,
}

#[derive(Args, Clone, Debug, Default)]
pub struct BuildArgs {
    /// Write empty placeholder executables instead of running the packager
    #[clap(long)]
    pub fake: bool,
}

#[derive(Args, Clone, Debug, Default)]
pub struct PublishArgs {
    /// The repository to publish to (owner/name); defaults to dist.toml, then $GITHUB_REPOSITORY
    #[clap(long)]
    pub repo: Option<String>,
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventArg {
    /// A branch or tag push
    Push,
    /// A pull request (never publishes)
    PullRequest,
    /// A manual run
    Manual,
}

impl From<EventArg> for TriggerEvent {
    fn from(arg: EventArg) -> Self {
        match arg {
            EventArg::Push => TriggerEvent::Push,
            EventArg::PullRequest => TriggerEvent::PullRequest,
            EventArg::Manual => TriggerEvent::Manual,
        }
    }
}
