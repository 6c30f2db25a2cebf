#![deny(missing_docs)]

//! # repo-sync-dist-schema
//!
//! This crate exists to serialize and deserialize the dist-manifest.json produced
//! by repo-sync-dist. Every run writes one, describing the archives it built, what
//! was inside them, and the release they were attached to (if any).
//!
//! The root type of the schema is [`DistManifest`][].

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A local system path on the machine repo-sync-dist was run.
///
/// This is a String because when deserializing this may be a path format from a different OS!
pub type LocalPath = String;
/// A relative path inside an archive
///
/// This is a String because when deserializing this may be a path format from a different OS!
pub type RelPath = String;

/// A report of the archives repo-sync-dist built and the release it published
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DistManifest {
    /// The version of repo-sync-dist that generated this
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dist_version: Option<String>,
    /// The release version the run resolved ("latest" or a tag name)
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// The event that triggered this run
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<Trigger>,
    /// Archives, keyed by their asset name (e.g. `repo-sync-linux`)
    #[serde(default)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub artifacts: BTreeMap<String, Artifact>,
    /// The release the archives were attached to
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<Release>,
}

/// The trigger context of a run
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Trigger {
    /// The kind of event ("push", "pull-request", "manual")
    pub event: String,
    /// The full git ref that was pushed (e.g. `refs/tags/v1.0.0`)
    pub git_ref: String,
    /// The commit the run was triggered for
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

/// A distributable archive built for one platform
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Artifact {
    /// The asset name of the archive (e.g. `repo-sync-windows`)
    pub name: String,
    /// The archive's file name (e.g. `repo-sync-windows.zip`)
    pub file_name: String,
    /// The platform this archive was built for ("linux", "windows", "macos")
    pub target: String,
    /// The location of the archive on the local system
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub path: Option<LocalPath>,
    /// Assets included in the archive (executables, config, docs)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    pub assets: Vec<Asset>,
    /// Hex sha256 of the archive file
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub checksum: Option<String>,
}

/// An asset contained in an archive
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Asset {
    /// The high-level name of the asset
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The path of the asset relative to the root of the archive
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<RelPath>,
    /// The kind of asset this is
    #[serde(flatten)]
    pub kind: AssetKind,
}

/// The kind of an asset inside an archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind")]
#[non_exhaustive]
pub enum AssetKind {
    /// A standalone native executable
    #[serde(rename = "executable")]
    Executable,
    /// The bundled configuration directory
    #[serde(rename = "config")]
    Config,
    /// A README file
    #[serde(rename = "readme")]
    Readme,
    /// A LICENSE file
    #[serde(rename = "license")]
    License,
    /// Unknown to this version of repo-sync-dist-schema
    ///
    /// This is a fallback for forward/backward-compat
    #[serde(other)]
    #[serde(rename = "unknown")]
    Unknown,
}

/// A published release
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Release {
    /// The tag of the release
    pub tag: String,
    /// The title of the release
    pub title: String,
    /// The body (release notes) of the release
    pub body: String,
    /// Whether the release is a draft (always false when published by us)
    pub draft: bool,
    /// Whether the release is a prerelease (always false when published by us)
    pub prerelease: bool,
    /// File names of the archives attached to the release
    #[serde(default)]
    pub artifacts: Vec<String>,
}

impl DistManifest {
    /// Create a new DistManifest
    pub fn new(dist_version: String, artifacts: BTreeMap<String, Artifact>) -> Self {
        Self {
            dist_version: Some(dist_version),
            artifacts,
            ..Self::default()
        }
    }

    /// File names of every archive in the manifest, in asset-name order
    pub fn artifact_file_names(&self) -> impl Iterator<Item = &str> {
        self.artifacts.values().map(|a| a.file_name.as_str())
    }

    /// Get the JSON Schema for a DistManifest
    pub fn json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(DistManifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_names_the_root_properties() {
        let schema = DistManifest::json_schema();
        let json = serde_json::to_value(&schema).unwrap();
        let props = json["properties"].as_object().unwrap();
        for key in ["dist_version", "version", "trigger", "artifacts", "release"] {
            assert!(props.contains_key(key), "schema is missing {key}");
        }
    }

    #[test]
    fn unknown_asset_kinds_are_tolerated() {
        let asset: Asset =
            serde_json::from_str(r#"{"name": "CHANGELOG.md", "kind": "changelog"}"#).unwrap();
        assert_eq!(asset.kind, AssetKind::Unknown);
    }
}
