//! Computing the Announcement
//!
//! This is "what version are we releasing" (derived purely from the ref that
//! triggered the run), plus the release date and the templated title and body.

use std::fmt;

use jiff::Timestamp;
use minijinja::{context, Environment};
use serde::Serialize;

use crate::config::TAG_REF_PREFIX;
use crate::errors::DistResult;
use crate::platform::BUILD_TARGETS;

/// The tag of the rolling release
pub const LATEST: &str = "latest";

const TEMPLATE_TITLE: &str = "release/title.j2";
const TEMPLATE_BODY: &str = "release/body.md.j2";

/// The version a run releases, which is also the release's tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum ReleaseVersion {
    /// The rolling release, republished on every push to a release branch
    Latest,
    /// A release for a pushed tag
    Tag(String),
}

impl ReleaseVersion {
    /// The version string (and release tag)
    pub fn as_str(&self) -> &str {
        match self {
            ReleaseVersion::Latest => LATEST,
            ReleaseVersion::Tag(tag) => tag,
        }
    }

    /// Whether this is the rolling release
    pub fn is_latest(&self) -> bool {
        self.as_str() == LATEST
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ReleaseVersion> for String {
    fn from(version: ReleaseVersion) -> String {
        version.as_str().to_owned()
    }
}

/// Derive the release version from the ref that triggered the run
///
/// `refs/tags/<name>` releases `<name>` verbatim; anything else releases "latest".
pub fn resolve_version(git_ref: &str) -> ReleaseVersion {
    match git_ref.strip_prefix(TAG_REF_PREFIX) {
        Some(tag) if !tag.is_empty() => ReleaseVersion::Tag(tag.to_owned()),
        _ => ReleaseVersion::Latest,
    }
}

/// Format `now` as a `YYYY-MM-DD` date in the given IANA timezone
pub fn release_date(now: Timestamp, timezone: &str) -> DistResult<String> {
    let zoned = now.in_tz(timezone)?;
    Ok(zoned.strftime("%Y-%m-%d").to_string())
}

/// The title and body of a release
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseNotes {
    /// Release title
    pub title: String,
    /// Release body (markdown)
    pub body: String,
}

#[derive(Serialize)]
struct PlatformDownload {
    os: &'static str,
    file_name: String,
    executables: Vec<String>,
}

/// Templates for release titles and bodies
#[derive(Debug)]
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    /// Load the built-in templates
    pub fn new() -> DistResult<Self> {
        let mut env = Environment::new();
        env.add_template(
            TEMPLATE_TITLE,
            include_str!("../templates/release/title.j2"),
        )?;
        env.add_template(
            TEMPLATE_BODY,
            include_str!("../templates/release/body.md.j2"),
        )?;
        Ok(Self { env })
    }

    /// Render the notes for a release of `version`, listing the archive for every platform
    pub fn release_notes(
        &self,
        app_name: &str,
        tool_names: &[String],
        version: &ReleaseVersion,
        date: &str,
    ) -> DistResult<ReleaseNotes> {
        let platforms = BUILD_TARGETS
            .iter()
            .map(|target| PlatformDownload {
                os: target.os_id.as_str(),
                file_name: target.archive_file_name(),
                executables: tool_names
                    .iter()
                    .map(|tool| target.exe_file_name(tool))
                    .collect(),
            })
            .collect::<Vec<_>>();
        let ctx = context! {
            app_name => app_name,
            version => version.as_str(),
            is_latest => version.is_latest(),
            date => date,
            platforms => platforms,
            tools => tool_names,
        };

        let title = self.env.get_template(TEMPLATE_TITLE)?.render(&ctx)?;
        let body = self.env.get_template(TEMPLATE_BODY)?.render(&ctx)?;
        Ok(ReleaseNotes {
            title: title.trim().to_owned(),
            body,
        })
    }
}
