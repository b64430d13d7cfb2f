// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for files that venvman needs to
//! interact with, but does not own, e.g., the interpreter inside of a
//! virtual environment, or the descriptor of an installable project.

use std::path::{Path, PathBuf};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "./cfg.yml";

/// Files that mark a directory as an installable Python project.
pub const PROJECT_DESCRIPTORS: [&str; 2] = ["pyproject.toml", "setup.py"];

/// Determine absolute path to the interpreter of a virtual environment.
///
/// Does not check if the path returned actually exists.
pub fn venv_python(venv: impl AsRef<Path>) -> PathBuf {
    #[cfg(target_os = "windows")]
    let python = venv.as_ref().join("Scripts").join("python.exe");
    #[cfg(not(target_os = "windows"))]
    let python = venv.as_ref().join("bin").join("python");

    python
}

/// Check if directory holds an installable Python project.
pub fn is_installable(dir: impl AsRef<Path>) -> bool {
    PROJECT_DESCRIPTORS
        .iter()
        .any(|descriptor| dir.as_ref().join(descriptor).is_file())
}

/// Last component of path as lossy string.
///
/// Falls back to the whole path if there is no final component, e.g., `..`.
pub fn base_name(path: impl AsRef<Path>) -> String {
    let path = path.as_ref();
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
