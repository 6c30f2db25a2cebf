//! Compiling Things
//!
//! Each tool gets turned into one self-contained native executable per target.
//! How that happens is up to an [`ExecutablePackager`][]: normally PyInstaller,
//! or the fake packager when we just want to exercise the rest of the pipeline.

use camino::{Utf8Path, Utf8PathBuf};
use tracing::info;

use crate::config::ToolSpec;
use crate::errors::{DistError, DistResult};
use crate::platform::BuildTarget;

pub mod fake;
pub mod pyinstaller;

pub use fake::FakePackager;
pub use pyinstaller::PyInstaller;

/// Everything a packager needs to produce one executable
#[derive(Debug, Clone)]
pub struct ExecutableRequest<'a> {
    /// The tool being built
    pub tool: &'a ToolSpec,
    /// The platform it's being built for
    pub target: &'static BuildTarget,
    /// The root of the repo (entry points and data dirs are relative to this)
    pub root: &'a Utf8Path,
    /// Scratch space for the packager, private to this leg
    pub work_dir: Utf8PathBuf,
    /// The directory the executable must end up in
    pub out_dir: Utf8PathBuf,
}

impl ExecutableRequest<'_> {
    /// The file name the executable must have (`.exe` on Windows)
    pub fn exe_file_name(&self) -> String {
        self.target.exe_file_name(&self.tool.name)
    }

    /// Where the executable must be written
    pub fn exe_path(&self) -> Utf8PathBuf {
        self.out_dir.join(self.exe_file_name())
    }
}

/// Something that can turn an entry point into a native executable
pub trait ExecutablePackager: Send + Sync {
    /// A short name for logs
    fn name(&self) -> &str;

    /// Write exactly one executable to [`ExecutableRequest::exe_path`][]
    fn package(&self, request: &ExecutableRequest<'_>) -> DistResult<()>;
}

/// An executable a packager produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltExecutable {
    /// The tool it was built from
    pub tool_name: String,
    /// Its platform-appropriate file name
    pub file_name: String,
    /// Where it is on disk
    pub path: Utf8PathBuf,
}

/// Build one tool for one target, and check the packager held up its end
pub fn build_executable(
    packager: &dyn ExecutablePackager,
    request: &ExecutableRequest<'_>,
) -> DistResult<BuiltExecutable> {
    info!(
        "building {} for {} (via {})",
        request.tool.name,
        request.target.os_id,
        packager.name()
    );
    packager.package(request)?;

    let path = request.exe_path();
    if !path.exists() {
        return Err(DistError::MissingExecutable {
            tool: request.tool.name.clone(),
            target: request.target.os_id.to_string(),
            path,
        });
    }
    Ok(BuiltExecutable {
        tool_name: request.tool.name.clone(),
        file_name: request.exe_file_name(),
        path,
    })
}
