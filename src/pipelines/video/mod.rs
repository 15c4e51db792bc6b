// SPDX-License-Identifier: MPL-2.0

//! Scratch files for in-progress recordings
//!
//! Each recording gets a fresh random file name under the scratch
//! directory. The asset store moves the file into the library once the
//! recording is committed; a failed commit leaves the file behind.

use crate::constants::recording::FILE_EXTENSION;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// A fresh, unused recording path inside `scratch_dir`
pub fn scratch_file_path(scratch_dir: &Path) -> PathBuf {
    let name = Uuid::new_v4().to_string();
    scratch_dir.join(name).with_extension(FILE_EXTENSION)
}

/// Create the scratch directory if needed and return a fresh path in it
pub fn prepare_scratch_file(scratch_dir: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(scratch_dir)?;
    let path = scratch_file_path(scratch_dir);
    debug!(path = %path.display(), "Prepared scratch recording path");
    Ok(path)
}
