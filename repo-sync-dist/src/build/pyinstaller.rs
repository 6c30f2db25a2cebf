//! Functionality required to invoke PyInstaller

use axoprocess::Cmd;

use super::{ExecutablePackager, ExecutableRequest};
use crate::config::{Config, PYTHON_PREFERENCE_ENV};
use crate::platform::OsId;
use crate::DistResult;

/// Builds single-file executables with PyInstaller (or a compatible command)
#[derive(Debug, Clone)]
pub struct PyInstaller {
    /// The command, plus any arguments that go before ours (e.g. `uv run pyinstaller`)
    pub command: Vec<String>,
    /// Tell the python installer to use an interpreter that's already there
    pub prefer_system_python: bool,
}

impl PyInstaller {
    /// Make a packager from the run config
    pub fn from_config(config: &Config) -> Self {
        Self {
            command: config.packager.clone(),
            prefer_system_python: config.prefer_system_python,
        }
    }

    fn command(&self, request: &ExecutableRequest<'_>) -> Cmd {
        let (program, leading_args) = match self.command.split_first() {
            Some((program, rest)) => (program.as_str(), rest),
            None => ("pyinstaller", &[][..]),
        };
        let tool = request.tool;
        let mut cmd = Cmd::new(
            program,
            format!("package {} for {}", tool.name, request.target.os_id),
        );
        cmd.stdout_to_stderr();
        cmd.current_dir(request.root);
        for arg in leading_args {
            cmd.arg(arg);
        }
        cmd.arg("--onefile")
            .arg("--clean")
            .arg("--noconfirm")
            .arg("--name")
            .arg(&tool.name);
        for module in &tool.hidden_imports {
            cmd.arg("--hidden-import").arg(module);
        }

        // The generated .spec lands in the work dir, which would make relative paths resolve there
        let data_src = request.root.join(&tool.data_dir);
        let data_dest = tool.data_dir.file_name().unwrap_or(tool.data_dir.as_str());
        cmd.arg("--add-data").arg(format!(
            "{data_src}{}{data_dest}",
            add_data_separator(request.target.os_id)
        ));
        cmd.arg("--distpath")
            .arg(&request.out_dir)
            .arg("--workpath")
            .arg(request.work_dir.join("build"))
            .arg("--specpath")
            .arg(&request.work_dir);
        cmd.arg(request.root.join(&tool.entry_point));

        if self.prefer_system_python {
            cmd.env(PYTHON_PREFERENCE_ENV, "only-system");
        }
        cmd
    }
}

/// PyInstaller separates source and destination of `--add-data` with the host's path list separator
fn add_data_separator(os: OsId) -> char {
    match os {
        OsId::Windows => ';',
        OsId::Linux | OsId::Macos => ':',
    }
}

impl ExecutablePackager for PyInstaller {
    fn name(&self) -> &str {
        self.command.last().map(String::as_str).unwrap_or("pyinstaller")
    }

    fn package(&self, request: &ExecutableRequest<'_>) -> DistResult<()> {
        self.command(request).run()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_tools;
    use crate::platform::target_by_name;
    use camino::Utf8Path;

    #[test]
    fn windows_uses_semicolon_for_add_data() {
        assert_eq!(add_data_separator(OsId::Windows), ';');
        assert_eq!(add_data_separator(OsId::Linux), ':');
        assert_eq!(add_data_separator(OsId::Macos), ':');
    }

    #[test]
    fn command_names_the_packager_in_logs() {
        let packager = PyInstaller {
            command: vec!["uv".to_owned(), "run".to_owned(), "pyinstaller".to_owned()],
            prefer_system_python: true,
        };
        assert_eq!(packager.name(), "pyinstaller");

        let tools = default_tools();
        let request = ExecutableRequest {
            tool: &tools[0],
            target: target_by_name("windows").unwrap(),
            root: Utf8Path::new("/repo"),
            work_dir: "/repo/target/dist/legs/repo-sync-windows/work".into(),
            out_dir: "/repo/target/dist/legs/repo-sync-windows/bin".into(),
        };
        assert_eq!(request.exe_file_name(), "repo-sync.exe");
        let cmd = packager.command(&request);
        assert_eq!(cmd.get_program(), "uv");
        let args = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        assert_eq!(args[..2], ["run", "pyinstaller"]);
        assert!(args
            .windows(2)
            .any(|w| w[0] == "--hidden-import" && w[1] == "error_handler"));
        assert!(args.contains(&"/repo/config;config".to_owned()));
        assert_eq!(args.last().map(String::as_str), Some("/repo/sync_repos.py"));
    }

    #[test]
    fn relative_root_gives_absolute_paths() {
        let config = Config::load(Utf8Path::new("checkout/repo-sync")).unwrap();
        let dist = crate::tasks::gather_work(&config);
        let leg = &dist.legs[0];
        let request = leg.executable_request(&config.tools[0], &config.root);
        assert!(request.exe_path().is_absolute(), "{}", request.exe_path());

        let cmd = PyInstaller::from_config(&config).command(&request);
        let cwd = cmd.get_current_dir().unwrap();
        assert!(cwd.is_absolute(), "{}", cwd.display());
        let args = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        for flag in ["--distpath", "--workpath", "--specpath", "--add-data"] {
            let value = args
                .iter()
                .skip_while(|a| *a != flag)
                .nth(1)
                .unwrap();
            assert!(Utf8Path::new(value).is_absolute(), "{flag} {value}");
        }
        let entry_point = args.last().unwrap();
        assert!(Utf8Path::new(entry_point).is_absolute(), "{entry_point}");
        assert!(entry_point.ends_with("checkout/repo-sync/sync_repos.py"));
    }
}
