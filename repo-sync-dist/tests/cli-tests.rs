use std::process::{Command, Output, Stdio};

use axoasset::LocalAsset;
use camino::Utf8PathBuf;
use temp_dir::TempDir;

static BIN: &str = env!("CARGO_BIN_EXE_repo-sync-dist");

const CI_VARS: &[&str] = &[
    "GITHUB_EVENT_NAME",
    "GITHUB_REF",
    "GITHUB_SHA",
    "GITHUB_REPOSITORY",
    "GH_TOKEN",
    "GITHUB_TOKEN",
];

fn format_outputs(output: &Output) -> String {
    let stdout = std::str::from_utf8(&output.stdout).unwrap();
    let stderr = std::str::from_utf8(&output.stderr).unwrap();
    format!("stdout:\n{stdout}\nstderr:\n{stderr}")
}

fn run(root: &Utf8PathBuf, args: &[&str]) -> Output {
    let mut cmd = Command::new(BIN);
    for var in CI_VARS {
        cmd.env_remove(var);
    }
    cmd.args(args)
        .arg("--root")
        .arg(root.as_str())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .unwrap()
}

fn scratch_repo() -> (TempDir, Utf8PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_owned()).unwrap();
    LocalAsset::write_new_all("TOKEN=\n", root.join("config/.env.example")).unwrap();
    LocalAsset::write_new_all("# repo-sync\n", root.join("README.md")).unwrap();
    LocalAsset::write_new_all("MIT\n", root.join("LICENSE")).unwrap();
    (tmp, root)
}

#[test]
fn test_version() {
    let output = Command::new(BIN)
        .arg("-V")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .unwrap();

    let stdout = String::from_utf8(output.stdout).unwrap();
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(output.status.success(), "{}", stderr);

    let (name, ver) = stdout.split_once(' ').unwrap();
    assert_eq!(name, "repo-sync-dist");
    assert_eq!(ver.trim().split('.').count(), 3);
}

#[test]
fn test_resolve_tag() {
    let (_tmp, root) = scratch_repo();
    let output = run(
        &root,
        &["resolve-version", "--ref", "refs/tags/v2.3.0", "--event", "push"],
    );
    assert!(output.status.success(), "{}", format_outputs(&output));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("version: v2.3.0"), "{stdout}");
    assert!(stdout.contains("publish: true"), "{stdout}");
    assert!(stdout.contains("reap: false"), "{stdout}");
}

#[test]
fn test_resolve_main_as_json() {
    let (_tmp, root) = scratch_repo();
    let output = run(
        &root,
        &[
            "resolve-version",
            "--ref",
            "refs/heads/main",
            "--event",
            "push",
            "--output-format=json",
        ],
    );
    assert!(output.status.success(), "{}", format_outputs(&output));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["version"], "latest");
    assert_eq!(json["publish"], true);
    assert_eq!(json["reap"], true);
}

#[test]
fn test_unknown_target() {
    let (_tmp, root) = scratch_repo();
    let output = run(&root, &["plan", "--target", "solaris"]);
    assert!(!output.status.success(), "{}", format_outputs(&output));
}

#[test]
fn test_pull_request_run() {
    let (_tmp, root) = scratch_repo();
    let output = run(
        &root,
        &[
            "run",
            "--fake",
            "--ref",
            "refs/heads/main",
            "--event",
            "pull-request",
        ],
    );
    assert!(output.status.success(), "{}", format_outputs(&output));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.lines().next().unwrap().ends_with("built"), "{stdout}");
    for archive in [
        "repo-sync-linux/repo-sync-linux.tar.gz",
        "repo-sync-windows/repo-sync-windows.zip",
        "repo-sync-macos/repo-sync-macos.tar.gz",
    ] {
        assert!(
            root.join("target/dist/artifacts").join(archive).is_file(),
            "{archive} wasn't stored"
        );
    }
    assert!(root.join("target/dist/dist-manifest.json").is_file());
}

#[test]
fn test_publish_needs_a_token() {
    let (_tmp, root) = scratch_repo();
    let output = run(
        &root,
        &[
            "publish",
            "--repo",
            "acme/repo-sync",
            "--ref",
            "refs/tags/v1.0.0",
            "--event",
            "push",
        ],
    );
    assert!(!output.status.success(), "{}", format_outputs(&output));
}

#[test]
fn test_manifest_schema() {
    let (_tmp, root) = scratch_repo();
    let output = run(&root, &["manifest-schema"]);
    assert!(output.status.success(), "{}", format_outputs(&output));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["title"], "DistManifest");
}
