use axoasset::{LocalAsset, SourceFile};
use camino::{Utf8Path, Utf8PathBuf};
use temp_dir::TempDir;

use crate::config::{Config, DistConfig, Secret, TriggerContext, TriggerEvent};
use crate::host::GithubCliHost;
use crate::DistError;

const ROOT: &str = "/repo";

fn parse(contents: &str) -> DistConfig {
    SourceFile::new("dist.toml", contents.to_owned())
        .deserialize_toml()
        .unwrap()
}

fn config_from(contents: &str) -> Result<Config, DistError> {
    let root = Utf8Path::new(ROOT);
    Config::from_dist_config(root, parse(contents), &root.join("dist.toml"))
}

#[test]
fn defaults() {
    let config = config_from("").unwrap();
    assert_eq!(config.app_name, "repo-sync");
    let tools = config.tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>();
    assert_eq!(tools, ["repo-sync", "repo-cleanup"]);
    assert_eq!(config.config_dir, "/repo/config");
    assert_eq!(config.env_example, "/repo/config/.env.example");
    assert_eq!(config.readme, "/repo/README.md");
    assert_eq!(config.license, "/repo/LICENSE");
    assert_eq!(config.timezone, "Asia/Taipei");
    assert_eq!(config.retention_days, 30);
    assert_eq!(config.packager, ["pyinstaller"]);
    assert_eq!(config.targets.len(), 3);
    assert!(config.is_release_branch("main"));
    assert!(config.is_release_branch("master"));
    assert!(!config.is_release_branch("feature/x"));
}

#[test]
fn default_tools_bundle_their_imports() {
    let config = config_from("").unwrap();
    let sync = &config.tools[0];
    assert_eq!(sync.entry_point, "sync_repos.py");
    assert!(sync.hidden_imports.contains("error_handler"));
    assert!(sync.hidden_imports.contains("dotenv"));
    let cleanup = &config.tools[1];
    assert_eq!(cleanup.entry_point, "cleanup_tool.py");
    assert!(!cleanup.hidden_imports.contains("error_handler"));
}

#[test]
fn everything_configured() {
    let config = config_from(
        r#"
app-name = "mirror"
release-branches = ["trunk"]
timezone = "UTC"
retention-days = 7
packager = ["uv", "run", "pyinstaller"]
prefer-system-python = true
repo = "acme/mirror"
dist-dir = "out"

[[tools]]
name = "mirror"
entry-point = "mirror.py"
hidden-imports = ["requests"]
"#,
    )
    .unwrap();
    assert_eq!(config.app_name, "mirror");
    assert_eq!(config.tools.len(), 1);
    assert_eq!(config.tools[0].data_dir, "config");
    assert!(config.is_release_branch("trunk"));
    assert!(!config.is_release_branch("main"));
    assert_eq!(config.retention_days, 7);
    assert_eq!(config.packager, ["uv", "run", "pyinstaller"]);
    assert!(config.prefer_system_python);
    assert_eq!(config.repo.as_deref(), Some("acme/mirror"));
    assert_eq!(config.dist_dir, "/repo/out");
    assert_eq!(
        config.manifest_path(),
        Utf8PathBuf::from("/repo/out/dist-manifest.json")
    );
}

#[test]
fn invalid_timezone() {
    let err = config_from(r#"timezone = "Mars/Olympus_Mons""#).unwrap_err();
    match err {
        DistError::InvalidConfig { key, value, .. } => {
            assert_eq!(key, "timezone");
            assert_eq!(value, "Mars/Olympus_Mons");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn zero_retention() {
    let err = config_from("retention-days = 0").unwrap_err();
    assert!(matches!(err, DistError::InvalidConfig { key, .. } if key == "retention-days"));
}

#[test]
fn bad_repo() {
    let err = config_from(r#"repo = "just-a-name""#).unwrap_err();
    assert!(matches!(err, DistError::InvalidConfig { key, .. } if key == "repo"));
}

#[test]
fn no_tools() {
    let err = config_from("tools = []").unwrap_err();
    assert!(matches!(err, DistError::InvalidConfig { key, .. } if key == "tools"));
}

#[test]
fn duplicate_tool() {
    let err = config_from(
        r#"
[[tools]]
name = "repo-sync"
entry-point = "a.py"

[[tools]]
name = "repo-sync"
entry-point = "b.py"
"#,
    )
    .unwrap_err();
    assert!(matches!(err, DistError::DuplicateTool { name } if name == "repo-sync"));
}

#[test]
fn load_reads_dist_toml() {
    let tmp = TempDir::new().unwrap();
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_owned()).unwrap();
    LocalAsset::write_new_all("app-name = \"from-disk\"\n", root.join("dist.toml")).unwrap();
    let config = Config::load(&root).unwrap();
    assert_eq!(config.app_name, "from-disk");
    assert_eq!(config.readme, root.join("README.md"));
}

#[test]
fn load_without_dist_toml() {
    let tmp = TempDir::new().unwrap();
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_owned()).unwrap();
    let config = Config::load(&root).unwrap();
    assert_eq!(config.app_name, "repo-sync");
}

#[test]
fn load_makes_relative_roots_absolute() {
    let config = Config::load(Utf8Path::new("checkout/repo-sync")).unwrap();
    assert!(config.root.is_absolute(), "{}", config.root);
    assert!(config.root.ends_with("checkout/repo-sync"));
    for path in [
        &config.config_dir,
        &config.env_example,
        &config.readme,
        &config.license,
        &config.dist_dir,
        &config.storage_dir,
    ] {
        assert!(path.is_absolute(), "{path}");
        assert!(path.starts_with(&config.root), "{path}");
    }
}

#[test]
fn github_event_names() {
    assert_eq!(
        TriggerEvent::from_github_event_name("pull_request"),
        TriggerEvent::PullRequest
    );
    assert_eq!(
        TriggerEvent::from_github_event_name("pull_request_target"),
        TriggerEvent::PullRequest
    );
    assert_eq!(
        TriggerEvent::from_github_event_name("workflow_dispatch"),
        TriggerEvent::Manual
    );
    assert_eq!(TriggerEvent::from_github_event_name("push"), TriggerEvent::Push);
}

#[test]
fn explicit_trigger_wins() {
    let trigger = TriggerContext::from_env(
        Some(TriggerEvent::Manual),
        Some("refs/heads/main".to_owned()),
        Some("abc".to_owned()),
    );
    assert_eq!(trigger.event, TriggerEvent::Manual);
    assert_eq!(trigger.branch(), Some("main"));
    assert_eq!(trigger.tag(), None);
    assert_eq!(trigger.to_schema().event, "manual");
}

#[test]
fn secrets_stay_out_of_debug_output() {
    let token = "ghp_supersecretvalue";
    let secret = Secret::new(token);
    assert_eq!(format!("{secret:?}"), "Secret(<redacted>)");
    assert_eq!(secret.expose(), token);

    let host = GithubCliHost::new("acme/repo-sync", secret);
    let debugged = format!("{host:?}");
    assert!(!debugged.contains(token), "{debugged}");
    assert!(debugged.contains("acme/repo-sync"));
}
