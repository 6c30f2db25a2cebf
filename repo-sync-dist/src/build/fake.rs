//! real fake binaries, no substance, all style
//!
//! used by `build --fake` to run as much of the pipeline as possible
//! without needing the python toolchain on every platform

use axoasset::LocalAsset;

use super::{ExecutablePackager, ExecutableRequest};
use crate::DistResult;

/// Produces empty executables
#[derive(Debug, Default, Clone, Copy)]
pub struct FakePackager;

impl ExecutablePackager for FakePackager {
    fn name(&self) -> &str {
        "fake"
    }

    fn package(&self, request: &ExecutableRequest<'_>) -> DistResult<()> {
        LocalAsset::write_new_all("", request.exe_path())?;
        Ok(())
    }
}
