//! Assembling a target's bundle and compressing it into its archive

use axoasset::LocalAsset;
use camino::{Utf8Path, Utf8PathBuf};
use jiff::Timestamp;
use repo_sync_dist_schema::{Asset, AssetKind};
use temp_dir::TempDir;
use tracing::info;

use crate::build::BuiltExecutable;
use crate::config::Config;
use crate::errors::{DistError, DistResult};
use crate::platform::BuildTarget;
use crate::storage::{ArtifactStore, StoredArtifact};

/// Name of the config directory inside every bundle
pub const BUNDLE_CONFIG_DIR: &str = "config";

/// The non-executable files every bundle carries
#[derive(Debug, Clone)]
pub struct BundleInputs {
    /// Directory copied to `config/`
    pub config_dir: Utf8PathBuf,
    /// Copied into `config/` after the directory copy
    pub env_example: Utf8PathBuf,
    /// Copied to the bundle root
    pub readme: Utf8PathBuf,
    /// Copied to the bundle root
    pub license: Utf8PathBuf,
}

impl BundleInputs {
    /// The inputs named by the run config
    pub fn from_config(config: &Config) -> Self {
        Self {
            config_dir: config.config_dir.clone(),
            env_example: config.env_example.clone(),
            readme: config.readme.clone(),
            license: config.license.clone(),
        }
    }

    /// Check every input is where we expect it, before any leg starts building
    pub fn check(&self) -> DistResult<()> {
        let wanted: [(&'static str, &Utf8Path, bool); 4] = [
            ("config directory", self.config_dir.as_path(), true),
            ("example environment file", self.env_example.as_path(), false),
            ("README", self.readme.as_path(), false),
            ("LICENSE", self.license.as_path(), false),
        ];
        for (kind, path, is_dir) in wanted {
            let ok = if is_dir { path.is_dir() } else { path.is_file() };
            if !ok {
                return Err(DistError::MissingBundleInput {
                    kind,
                    path: path.to_owned(),
                });
            }
        }
        Ok(())
    }
}

/// An archive that was built and handed to storage
#[derive(Debug, Clone)]
pub struct PackagedArchive {
    /// The target it was built for
    pub target: &'static BuildTarget,
    /// What's inside it
    pub assets: Vec<Asset>,
    /// Where storage put it
    pub stored: StoredArtifact,
}

/// Package one target's executables into its archive and store it
pub fn package(
    target: &'static BuildTarget,
    executables: &[BuiltExecutable],
    inputs: &BundleInputs,
    leg_dir: &Utf8Path,
    commit: Option<&str>,
    store: &dyn ArtifactStore,
    now: Timestamp,
) -> DistResult<PackagedArchive> {
    inputs.check()?;

    let tmp = TempDir::new()?;
    let tmp_root = Utf8PathBuf::from_path_buf(tmp.path().to_owned())
        .map_err(|path| DistError::NonUtf8Path { path })?;
    let bundle_dir = tmp_root.join(target.asset_name);
    let assets = assemble_bundle(&bundle_dir, executables, inputs)?;

    let archive_path = leg_dir.join(target.archive_file_name());
    if archive_path.exists() {
        LocalAsset::remove_file(&archive_path)?;
    }
    LocalAsset::create_dir_all(leg_dir)?;
    info!("compressing {}", archive_path);
    target
        .archive_format()
        .compress(&bundle_dir, &archive_path)?;

    let stored = store.put(target.asset_name, &archive_path, commit, now)?;
    Ok(PackagedArchive {
        target,
        assets,
        stored,
    })
}

/// Fill `bundle_dir` with everything an archive contains, returning a description of it
pub fn assemble_bundle(
    bundle_dir: &Utf8Path,
    executables: &[BuiltExecutable],
    inputs: &BundleInputs,
) -> DistResult<Vec<Asset>> {
    if bundle_dir.exists() {
        LocalAsset::remove_dir_all(bundle_dir)?;
    }
    LocalAsset::create_dir_all(bundle_dir)?;
    let mut assets = vec![];

    for exe in executables {
        LocalAsset::copy_file_to_file(&exe.path, bundle_dir.join(&exe.file_name))?;
        assets.push(Asset {
            name: Some(exe.tool_name.clone()),
            path: Some(exe.file_name.clone()),
            kind: AssetKind::Executable,
        });
    }

    // The example env file goes in even if the config dir already had one
    let config_dest = bundle_dir.join(BUNDLE_CONFIG_DIR);
    LocalAsset::copy_dir_to_dir(&inputs.config_dir, &config_dest)?;
    let env_name = file_name_of(&inputs.env_example);
    LocalAsset::copy_file_to_file(&inputs.env_example, config_dest.join(env_name))?;
    assets.push(Asset {
        name: Some(BUNDLE_CONFIG_DIR.to_owned()),
        path: Some(format!("{BUNDLE_CONFIG_DIR}/")),
        kind: AssetKind::Config,
    });

    for (src, kind) in [
        (&inputs.readme, AssetKind::Readme),
        (&inputs.license, AssetKind::License),
    ] {
        let name = file_name_of(src);
        LocalAsset::copy_file_to_file(src, bundle_dir.join(name))?;
        assets.push(Asset {
            name: Some(name.to_owned()),
            path: Some(name.to_owned()),
            kind,
        });
    }

    Ok(assets)
}

fn file_name_of(path: &Utf8Path) -> &str {
    path.file_name().unwrap_or(path.as_str())
}
