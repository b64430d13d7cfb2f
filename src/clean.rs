// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Reconciliation of disk state with configuration.
//!
//! Over time environments get dropped from the configuration, but their
//! virtual environments and project directories stay behind on disk. The
//! [`Cleaner`] finds every top-level directory of the environments root or
//! the projects root that the configuration no longer declares, and removes
//! them once the user confirms.

use crate::workspace::Workspace;

use inquire::Confirm;
use std::{
    collections::HashSet,
    fs,
    io::{self, Stdout, Write},
    path::{Path, PathBuf},
};
use tracing::{info, instrument};

/// Layer of indirection for confirming destructive actions.
pub trait Confirmation {
    /// Ask user to confirm `message`.
    fn confirm(&mut self, message: &str) -> Result<bool>;
}

/// Confirm through interactive prompt that defaults to no.
#[derive(Debug, Default, Clone, Copy)]
pub struct InquireConfirmation;

impl Confirmation for InquireConfirmation {
    fn confirm(&mut self, message: &str) -> Result<bool> {
        Ok(Confirm::new(message).with_default(false).prompt()?)
    }
}

/// Confirm everything without asking.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Confirmation for AssumeYes {
    fn confirm(&mut self, _message: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Remove undeclared environments and project directories of a workspace.
pub struct Cleaner<'ws, P = InquireConfirmation, W = Stdout>
where
    P: Confirmation,
    W: Write,
{
    workspace: &'ws Workspace,
    confirmation: P,
    out: W,
}

impl<'ws, P, W> Cleaner<'ws, P, W>
where
    P: Confirmation,
    W: Write,
{
    /// Construct new cleaner.
    pub fn new(workspace: &'ws Workspace, confirmation: P, out: W) -> Self {
        Self {
            workspace,
            confirmation,
            out,
        }
    }

    /// Output sink that removals were reported to.
    pub fn output(&self) -> &W {
        &self.out
    }

    /// Remove environments that are no longer declared.
    ///
    /// Returns paths that were removed.
    ///
    /// # Errors
    ///
    /// - Return [`CleanError::FileSystem`] if listing or removal fails.
    /// - Return [`CleanError::Prompt`] if confirmation cannot be obtained.
    pub fn clean_envs(&mut self) -> Result<Vec<PathBuf>> {
        let workspace = self.workspace;
        let root = workspace.config().environments_root();
        self.clean(root, "environments")
    }

    /// Remove project directories that are no longer declared.
    ///
    /// Returns paths that were removed.
    ///
    /// # Errors
    ///
    /// - Return [`CleanError::FileSystem`] if listing or removal fails.
    /// - Return [`CleanError::Prompt`] if confirmation cannot be obtained.
    pub fn clean_prjs(&mut self) -> Result<Vec<PathBuf>> {
        let workspace = self.workspace;
        let root = workspace.config().projects_root();
        self.clean(root, "project directories")
    }

    #[instrument(skip(self), level = "debug")]
    fn clean(&mut self, root: &Path, kind: &str) -> Result<Vec<PathBuf>> {
        let declared = self
            .workspace
            .registry()
            .names()
            .into_iter()
            .collect::<HashSet<_>>();
        let missing = find_missing(&declared, root)?;
        if missing.is_empty() {
            info!("no undeclared {kind} in {:?}", root.display());
            return Ok(missing);
        }

        let mut message = format!("Remove the following {kind}?");
        for path in &missing {
            message.push_str(format!("\n  {}", path.display()).as_str());
        }

        if !self.confirmation.confirm(&message)? {
            info!("leaving undeclared {kind} alone");
            return Ok(Vec::new());
        }

        for path in &missing {
            fs::remove_dir_all(path).map_err(|source| CleanError::FileSystem {
                source,
                path: path.clone(),
            })?;
            writeln!(self.out, "Removed {}", path.display()).map_err(CleanError::Output)?;
        }

        Ok(missing)
    }
}

/// Find directories in `root` whose names are not in `declared`.
///
/// Only the top-level of `root` is considered, and plain files are ignored.
/// Results are sorted by path. A missing `root` has nothing to find.
///
/// # Errors
///
/// - Return [`CleanError::FileSystem`] if `root` cannot be listed.
pub fn find_missing(declared: &HashSet<&str>, root: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    let fs_error = |source: io::Error| CleanError::FileSystem {
        source,
        path: root.to_path_buf(),
    };

    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(fs_error(err)),
    };

    let mut missing = Vec::new();
    for entry in entries {
        let entry = entry.map_err(fs_error)?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        if !declared.contains(&*entry.file_name().to_string_lossy()) {
            missing.push(path);
        }
    }
    missing.sort();

    Ok(missing)
}

/// Reconciliation error types.
#[derive(Debug, thiserror::Error)]
pub enum CleanError {
    /// Listing or removing directories fails.
    #[error("file system operation failed at {:?}", path.display())]
    FileSystem {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// User could not be prompted for confirmation.
    #[error(transparent)]
    Prompt(#[from] inquire::InquireError),

    /// Removals cannot be written to output.
    #[error("failed to write removals to output")]
    Output(#[source] io::Error),
}

/// Friendly result alias :3
pub type Result<T, E = CleanError> = std::result::Result<T, E>;
