use std::sync::Arc;

use axoasset::LocalAsset;
use jiff::ToSpan;
use repo_sync_dist_schema::AssetKind;

use super::mock::*;
use crate::archive::BundleInputs;
use crate::build::FakePackager;
use crate::errors::DistError;
use crate::matrix::{run_leg, run_matrix};
use crate::platform::{target_by_name, OsId};
use crate::storage::{prune_expired, sha256_file, ArtifactStore};
use crate::tasks::gather_work;

#[tokio::test]
async fn every_archive_has_the_whole_bundle() {
    let repo = MockRepo::new(push(TAG_REF));
    let dist = gather_work(&repo.config);
    let store = repo.store();
    let archives = run_matrix(
        Arc::new(repo.config.clone()),
        dist.legs,
        Arc::new(FakePackager),
        store.clone(),
        mock_now(),
    )
    .await
    .unwrap();
    assert_eq!(archives.len(), 3);

    let unpacked = repo.path("unpacked");
    for archive in &archives {
        let stored = &archive.stored;
        assert_eq!(stored.file_name, archive.target.archive_file_name());
        assert_eq!(stored.sha256, sha256_file(&stored.path).unwrap());
        assert_eq!(stored.commit, repo.config.trigger.sha);

        let dir = unpack(&stored.path, &unpacked);
        let suffix = archive.target.os_id.exe_suffix();
        for tool in ["repo-sync", "repo-cleanup"] {
            assert!(
                dir.join(format!("{tool}{suffix}")).is_file(),
                "{} is missing {tool}",
                stored.file_name
            );
        }
        assert!(dir.join("config/org-azure.json").is_file());
        assert!(dir.join("README.md").is_file());
        assert!(dir.join("LICENSE").is_file());
        let env = LocalAsset::load_string(dir.join("config/.env.example")).unwrap();
        assert_eq!(env, ENV_EXAMPLE);

        let kinds = archive.assets.iter().map(|a| a.kind.clone()).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            [
                AssetKind::Executable,
                AssetKind::Executable,
                AssetKind::Config,
                AssetKind::Readme,
                AssetKind::License
            ]
        );
    }

    // the checksum sidecar is what sha256sum expects
    let linux = store.get("repo-sync-linux").unwrap().unwrap();
    let sidecar = LocalAsset::load_string(format!("{}.sha256", linux.path)).unwrap();
    assert_eq!(sidecar, format!("{} *repo-sync-linux.tar.gz\n", linux.sha256));
}

#[test]
fn env_example_is_added_when_config_dir_lacks_it() {
    let mut repo = MockRepo::new(push(TAG_REF));
    LocalAsset::write_new_all("A=1\n", repo.path("templates/.env.example")).unwrap();
    LocalAsset::remove_file(repo.path("config/.env.example")).unwrap();
    repo.config.env_example = repo.path("templates/.env.example");

    let dist = gather_work(&repo.config);
    let leg = dist
        .legs
        .iter()
        .find(|leg| leg.target.os_id == OsId::Linux)
        .unwrap();
    let store = repo.store();
    let archive = run_leg(&repo.config, leg, &FakePackager, store.as_ref(), mock_now()).unwrap();

    let dir = unpack(&archive.stored.path, &repo.path("unpacked"));
    let env = LocalAsset::load_string(dir.join("config/.env.example")).unwrap();
    assert_eq!(env, "A=1\n");
}

#[test]
fn packager_that_writes_nothing() {
    let repo = MockRepo::new(push(TAG_REF));
    let dist = gather_work(&repo.config);
    let store = repo.store();
    let err = run_leg(
        &repo.config,
        &dist.legs[0],
        &LazyPackager,
        store.as_ref(),
        mock_now(),
    )
    .unwrap_err();
    assert!(matches!(err, DistError::MissingExecutable { tool, .. } if tool == "repo-sync"));
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn earlier_runs_dont_count() {
    let repo = MockRepo::new(push(TAG_REF));
    let dist = gather_work(&repo.config);
    let store = repo.store();
    let leg = &dist.legs[0];
    run_leg(&repo.config, leg, &FakePackager, store.as_ref(), mock_now()).unwrap();
    assert!(leg.bin_dir.join("repo-sync").is_file());

    let err = run_leg(&repo.config, leg, &LazyPackager, store.as_ref(), mock_now()).unwrap_err();
    assert!(matches!(err, DistError::MissingExecutable { .. }));
}

#[test]
fn missing_readme_is_caught_up_front() {
    let repo = MockRepo::new(push(TAG_REF));
    LocalAsset::remove_file(repo.path("README.md")).unwrap();
    let err = BundleInputs::from_config(&repo.config).check().unwrap_err();
    assert!(matches!(err, DistError::MissingBundleInput { kind: "README", .. }));
}

#[tokio::test]
async fn one_failed_leg_fails_the_matrix() {
    let repo = MockRepo::new(push(TAG_REF));
    let dist = gather_work(&repo.config);
    let store = repo.store();
    let err = run_matrix(
        Arc::new(repo.config.clone()),
        dist.legs,
        Arc::new(FailingPackager {
            fail_for: OsId::Windows,
        }),
        store.clone(),
        mock_now(),
    )
    .await
    .unwrap_err();

    match err {
        DistError::MatrixFailed {
            count,
            total,
            failed,
            causes,
        } => {
            assert_eq!((count, total), (1, 3));
            assert_eq!(failed, "repo-sync-windows");
            assert!(matches!(&causes[0], DistError::LegFailed { asset_name, .. } if asset_name == "repo-sync-windows"));
        }
        other => panic!("unexpected error: {other}"),
    }

    // siblings weren't cancelled
    let stored = store
        .list()
        .unwrap()
        .into_iter()
        .map(|s| s.asset_name)
        .collect::<Vec<_>>();
    assert_eq!(stored, ["repo-sync-linux", "repo-sync-macos"]);
}

#[test]
fn retention_window() {
    let repo = MockRepo::new(push(TAG_REF));
    let store = repo.store();
    let archive = repo.path("scratch/repo-sync-linux.tar.gz");
    LocalAsset::write_new_all("not really a tarball", &archive).unwrap();

    let stored = store.put("repo-sync-linux", &archive, Some("abc123"), mock_now()).unwrap();
    assert_eq!(stored.commit.as_deref(), Some("abc123"));
    assert_eq!(store.get("repo-sync-linux").unwrap().as_ref(), Some(&stored));
    let expires = mock_now().checked_add((30 * 24).hours()).unwrap();
    assert_eq!(stored.expires_at, expires);
    assert!(!stored.is_expired(mock_now()));
    assert!(stored.is_expired(expires));

    let early = prune_expired(store.as_ref(), mock_now()).unwrap();
    assert!(early.is_empty());
    assert!(store.get("repo-sync-linux").unwrap().is_some());

    let pruned = prune_expired(store.as_ref(), expires).unwrap();
    assert_eq!(pruned.len(), 1);
    assert!(store.get("repo-sync-linux").unwrap().is_none());
}

#[test]
fn storing_again_replaces() {
    let repo = MockRepo::new(push(TAG_REF));
    let store = repo.store();
    let archive = repo.path("scratch/repo-sync-macos.tar.gz");
    LocalAsset::write_new_all("first", &archive).unwrap();
    let first = store.put("repo-sync-macos", &archive, None, mock_now()).unwrap();
    LocalAsset::write_new_all("second", &archive).unwrap();
    let second = store.put("repo-sync-macos", &archive, None, mock_now()).unwrap();

    assert_ne!(first.sha256, second.sha256);
    let listed = store.list().unwrap();
    assert_eq!(listed, [second]);
    assert!(target_by_name(&listed[0].asset_name).is_ok());
}
