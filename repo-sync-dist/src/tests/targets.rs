use std::collections::BTreeSet;

use crate::platform::{select_targets, target_by_name, OsId, BUILD_TARGETS};
use crate::DistError;

#[test]
fn zip_iff_windows() {
    for target in BUILD_TARGETS {
        let is_zip = target.archive_extension == ".zip";
        assert_eq!(is_zip, target.os_id == OsId::Windows, "{target:?}");
        if !is_zip {
            assert_eq!(target.archive_extension, ".tar.gz");
        }
        assert_eq!(target.archive_extension, target.archive_format().ext());
    }
}

#[test]
fn asset_names_are_unique() {
    let names = BUILD_TARGETS
        .iter()
        .map(|t| t.asset_name)
        .collect::<BTreeSet<_>>();
    assert_eq!(names.len(), BUILD_TARGETS.len());
    assert_eq!(BUILD_TARGETS.len(), 3);
}

#[test]
fn archive_file_names() {
    let names = BUILD_TARGETS
        .iter()
        .map(|t| t.archive_file_name())
        .collect::<Vec<_>>();
    assert_eq!(
        names,
        [
            "repo-sync-linux.tar.gz",
            "repo-sync-windows.zip",
            "repo-sync-macos.tar.gz"
        ]
    );
}

#[test]
fn only_windows_exes_get_a_suffix() {
    let windows = target_by_name("windows").unwrap();
    let linux = target_by_name("repo-sync-linux").unwrap();
    let macos = target_by_name("macos").unwrap();
    assert_eq!(windows.exe_file_name("repo-cleanup"), "repo-cleanup.exe");
    assert_eq!(linux.exe_file_name("repo-cleanup"), "repo-cleanup");
    assert_eq!(macos.exe_file_name("repo-sync"), "repo-sync");
}

#[test]
fn select_nothing_means_everything() {
    let selected = select_targets(&[]).unwrap();
    assert_eq!(selected.len(), 3);
}

#[test]
fn select_keeps_table_order_and_dedupes() {
    let requested = ["macos", "linux", "repo-sync-macos"].map(String::from);
    let selected = select_targets(&requested).unwrap();
    let names = selected.iter().map(|t| t.asset_name).collect::<Vec<_>>();
    assert_eq!(names, ["repo-sync-linux", "repo-sync-macos"]);
}

#[test]
fn select_unknown_target() {
    let err = select_targets(&["solaris".to_owned()]).unwrap_err();
    match err {
        DistError::UnknownTarget { name, supported } => {
            assert_eq!(name, "solaris");
            assert_eq!(supported, "linux, windows, macos");
        }
        other => panic!("unexpected error: {other}"),
    }
}
