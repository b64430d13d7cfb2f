// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Environment and project provisioning.
//!
//! The [`Provisioner`] brings declared environments and their project
//! directories into existence, and keeps their installed packages in line.
//! Every operation visits environments one at a time in the order they were
//! declared in the configuration, and reports its progress line by line to an
//! output sink. That output is part of the contract of each operation.
//!
//! # Failure Policy
//!
//! Each operation states what happens when work on one environment fails
//! through [`OnFailure`]. Nearly everything uses [`OnFailure::Abort`], so the
//! first failure stops the whole batch. Only [`Provisioner::install_source`]
//! uses [`OnFailure::Continue`], and reports the failure as a warning before
//! moving on to the next environment. Work that already finished for earlier
//! environments is never rolled back either way.

use crate::{
    config::ConfigError,
    path::{base_name, is_installable},
    registry::Environment,
    repo::{CloneError, Git2Cloner, RepoCloner},
    venv::{EnvironmentManager, PackageError, VirtualEnv},
    workspace::Workspace,
};

use std::{
    ffi::OsString,
    fmt::Display,
    fs,
    io::{self, Stdout, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Package that provides Jupyter kernel support in an environment.
pub const KERNEL_PACKAGE: &str = "ipykernel";

/// What to do when work on one environment fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFailure {
    /// Stop the whole batch and return the failure.
    Abort,

    /// Warn about the failure and move on to the next environment.
    Continue,
}

/// Package operation applied across every environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageAction {
    Install,
    Uninstall,
    Upgrade,
}

impl PackageAction {
    fn verb(self) -> &'static str {
        match self {
            Self::Install => "Installing",
            Self::Uninstall => "Uninstalling",
            Self::Upgrade => "Upgrading",
        }
    }

    fn apply(
        self,
        manager: &impl EnvironmentManager,
        env: &Environment,
        spec: &str,
    ) -> Result<(), PackageError> {
        match self {
            Self::Install => manager.install(env, spec),
            Self::Uninstall => manager.uninstall(env, spec),
            Self::Upgrade => manager.upgrade(env, spec),
        }
    }
}

/// Provision environments and project directories of a workspace.
pub struct Provisioner<'ws, M = VirtualEnv, C = Git2Cloner, W = Stdout>
where
    M: EnvironmentManager,
    C: RepoCloner,
    W: Write,
{
    workspace: &'ws Workspace,
    manager: M,
    cloner: C,
    out: W,
}

impl<'ws, M, C, W> Provisioner<'ws, M, C, W>
where
    M: EnvironmentManager,
    C: RepoCloner,
    W: Write,
{
    /// Construct new provisioner.
    pub fn new(workspace: &'ws Workspace, manager: M, cloner: C, out: W) -> Self {
        Self {
            workspace,
            manager,
            cloner,
            out,
        }
    }

    pub fn manager(&self) -> &M {
        &self.manager
    }

    pub fn cloner(&self) -> &C {
        &self.cloner
    }

    /// Output sink that progress lines were written to.
    pub fn output(&self) -> &W {
        &self.out
    }

    /// Create virtual environment for every declared environment.
    ///
    /// Default packages are installed first, followed by the environment's own
    /// packages. Finishes with one summary line naming every environment.
    ///
    /// Failure policy: [`OnFailure::Abort`].
    ///
    /// # Errors
    ///
    /// - Return [`ProvisionError::EnvironmentExists`] if an environment was
    ///   already created.
    /// - Return [`ProvisionError::Package`] if package management fails.
    /// - Return [`ProvisionError::FileSystem`] if directories cannot be made.
    #[instrument(skip(self), level = "debug")]
    pub fn create_envs(&mut self) -> Result<()> {
        let workspace = self.workspace;
        let config = workspace.config();
        create_root(config.environments_root())?;

        self.for_each_env(OnFailure::Abort, |this, env| {
            this.emit(format_args!("Creating env {}", env.name()))?;
            if env.exists() {
                return Err(ProvisionError::EnvironmentExists {
                    name: env.name().into(),
                    path: env.path().to_path_buf(),
                });
            }
            fs::create_dir(env.path()).map_err(|source| ProvisionError::FileSystem {
                source,
                path: env.path().to_path_buf(),
            })?;
            this.manager.create(env)?;

            for package in config.default_packages().iter().chain(env.packages()) {
                this.emit(format_args!("Installing package {package}"))?;
                this.manager.install(env, package)?;
            }

            Ok(())
        })?;

        let names = quoted_list(workspace.registry().names());
        self.emit(format_args!("Created envs {names}"))
    }

    /// Register a Jupyter kernel named after every declared environment.
    ///
    /// Installs kernel support into an environment first if needed. Set
    /// `sudo` to register kernels system-wide through elevated privileges.
    ///
    /// Failure policy: [`OnFailure::Abort`].
    ///
    /// # Errors
    ///
    /// - Return [`ProvisionError::Package`] if package management fails, or
    ///   registration command fails.
    #[instrument(skip(self), level = "debug")]
    pub fn create_kernels(&mut self, sudo: bool) -> Result<()> {
        self.for_each_env(OnFailure::Abort, |this, env| {
            this.emit(format_args!("Creating jupyter kernel for {}", env.name()))?;
            if !this.manager.is_installed(env, KERNEL_PACKAGE)? {
                debug!("install {KERNEL_PACKAGE} into {}", env.name());
                this.manager.install(env, KERNEL_PACKAGE)?;
            }

            let command = kernel_command(env, sudo);
            info!("register kernel: {command:?}");
            let output = this.manager.execute(env, &command)?;
            debug!("{output}");

            Ok(())
        })
    }

    /// Create project directory for every declared environment.
    ///
    /// Existing project directories are left alone. New project directories
    /// are seeded with a copy of `source` when given. A source directory has
    /// its contents copied over, while a source file is copied into the new
    /// directory.
    ///
    /// Failure policy: [`OnFailure::Abort`].
    ///
    /// # Errors
    ///
    /// - Return [`ProvisionError::FileSystem`] if `source` is missing, if
    ///   `source` is a directory that holds the projects root, or if
    ///   directories cannot be made or copied.
    #[instrument(skip(self), level = "debug")]
    pub fn create_dirs(&mut self, source: Option<&Path>) -> Result<()> {
        if let Some(source) = source {
            if !source.exists() {
                return Err(ProvisionError::FileSystem {
                    source: io::Error::new(io::ErrorKind::NotFound, "copy source does not exist"),
                    path: source.to_path_buf(),
                });
            }
        }
        let workspace = self.workspace;
        let projects_root = workspace.config().projects_root();
        create_root(projects_root)?;
        if let Some(source) = source {
            reject_nested_copy(source, projects_root)?;
        }

        self.for_each_env(OnFailure::Abort, |this, env| {
            this.emit(format_args!("Creating dir for {}", env.name()))?;
            let dest = env.project_dir();
            if dest.is_dir() {
                return this.emit(format_args!(
                    "Dir already exists for {}, skipping",
                    env.name()
                ));
            }

            fs::create_dir(dest).map_err(|source| ProvisionError::FileSystem {
                source,
                path: dest.to_path_buf(),
            })?;

            if let Some(source) = source {
                this.emit(format_args!(
                    "Copying {} to {}",
                    base_name(source),
                    base_name(dest)
                ))?;
                copy_into(source, dest)?;
            }

            Ok(())
        })
    }

    /// Clone repository into project directory of every declared environment.
    ///
    /// Each environment gets the repository at
    /// `{repository_remote}/{name}.git`. Environments whose project directory
    /// already exists are skipped with a warning.
    ///
    /// Failure policy: [`OnFailure::Abort`].
    ///
    /// # Errors
    ///
    /// - Return [`ProvisionError::Config`] if no repository remote is set.
    /// - Return [`ProvisionError::Clone`] if cloning fails.
    #[instrument(skip(self), level = "debug")]
    pub fn create_repos(&mut self) -> Result<()> {
        let workspace = self.workspace;
        let config = workspace.config();
        if config.repository_remote().is_none() {
            return Err(ConfigError::MissingRepositoryRemote.into());
        }

        self.for_each_env(OnFailure::Abort, |this, env| {
            let dest = env.project_dir();
            if dest.exists() {
                warn!(
                    "project directory {:?} already exists, skipping clone",
                    dest.display()
                );
                return Ok(());
            }

            this.emit(format_args!("Cloning repo for {}", dest.display()))?;
            let url = config.repository_url(env.name())?;
            this.cloner.clone_repo(&url, dest)?;

            Ok(())
        })
    }

    /// Install project source of every declared environment in editable mode.
    ///
    /// Project directories without a `setup.py` or `pyproject.toml` are
    /// skipped with a warning.
    ///
    /// Failure policy: [`OnFailure::Continue`]. A failed installation is
    /// reported as a warning that points at the error log of the environment.
    ///
    /// # Errors
    ///
    /// - Return [`ProvisionError::Output`] if progress cannot be reported.
    #[instrument(skip(self), level = "debug")]
    pub fn install_source(&mut self) -> Result<()> {
        self.for_each_env(OnFailure::Continue, |this, env| this.install_project(env))
    }

    fn install_project(&mut self, env: &Environment) -> Result<()> {
        let project_dir = env.project_dir();
        if !is_installable(project_dir) {
            warn!(
                "nothing to install in {:?} for {}, skipping",
                project_dir.display(),
                env.name()
            );
            return Ok(());
        }

        self.emit(format_args!("Installing project source for {}", env.name()))?;
        self.manager
            .install_editable(env, project_dir)
            .map_err(|source| ProvisionError::SourceInstall {
                source,
                name: env.name().into(),
                log: self.manager.error_log(env),
            })
    }

    /// Install packages into every declared environment.
    ///
    /// Failure policy: [`OnFailure::Abort`].
    pub fn install_pkgs(&mut self, pkgs: &[String]) -> Result<()> {
        self.apply_pkgs(PackageAction::Install, pkgs)
    }

    /// Uninstall packages from every declared environment.
    ///
    /// Failure policy: [`OnFailure::Abort`].
    pub fn uninstall_pkgs(&mut self, pkgs: &[String]) -> Result<()> {
        self.apply_pkgs(PackageAction::Uninstall, pkgs)
    }

    /// Upgrade packages in every declared environment.
    ///
    /// Failure policy: [`OnFailure::Abort`].
    pub fn upgrade_pkgs(&mut self, pkgs: &[String]) -> Result<()> {
        self.apply_pkgs(PackageAction::Upgrade, pkgs)
    }

    #[instrument(skip(self), level = "debug")]
    fn apply_pkgs(&mut self, action: PackageAction, pkgs: &[String]) -> Result<()> {
        self.for_each_env(OnFailure::Abort, |this, env| {
            this.emit(format_args!(
                "{} {} in {}",
                action.verb(),
                quoted_list(pkgs),
                env.name()
            ))?;

            for package in pkgs {
                action.apply(&this.manager, env, package)?;
            }

            Ok(())
        })
    }

    fn for_each_env<F>(&mut self, on_failure: OnFailure, mut step: F) -> Result<()>
    where
        F: FnMut(&mut Self, &'ws Environment) -> Result<()>,
    {
        let workspace = self.workspace;
        for env in workspace.registry() {
            match step(self, env) {
                Ok(()) => {}
                Err(error) if on_failure == OnFailure::Continue && error.is_recoverable() => {
                    warn!("{error}");
                }
                Err(error) => return Err(error),
            }
        }

        Ok(())
    }

    fn emit(&mut self, line: impl Display) -> Result<()> {
        writeln!(self.out, "{line}").map_err(ProvisionError::Output)
    }
}

/// Build command that registers Jupyter kernel for environment.
fn kernel_command(env: &Environment, sudo: bool) -> Vec<OsString> {
    let mut command: Vec<OsString> = Vec::new();
    if sudo {
        command.push("sudo".into());
    }
    command.push(env.python().into_os_string());
    command.extend(
        ["-m", KERNEL_PACKAGE, "install"]
            .into_iter()
            .map(OsString::from),
    );
    command.push(format!("--name={}", env.name()).into());

    command
}

/// Render listing as a bracketed list of quoted items, e.g., `['a', 'b']`.
///
/// Items are quoted the way Python quotes strings in a list.
pub fn quoted_list(items: impl IntoIterator<Item = impl AsRef<str>>) -> String {
    let items = items
        .into_iter()
        .map(|item| quote(item.as_ref()))
        .collect::<Vec<_>>();

    format!("[{}]", items.join(", "))
}

// INVARIANT: Single quotes unless the item has a single quote and no double quote.
fn quote(item: &str) -> String {
    let escaped = item.replace('\\', "\\\\");
    if escaped.contains('\'') && !escaped.contains('"') {
        return format!("\"{escaped}\"");
    }

    format!("'{}'", escaped.replace('\'', "\\'"))
}

fn create_root(root: &Path) -> Result<()> {
    if root.is_dir() {
        return Ok(());
    }

    debug!("create root directory {:?}", root.display());
    fs::create_dir_all(root).map_err(|source| ProvisionError::FileSystem {
        source,
        path: root.to_path_buf(),
    })
}

// INVARIANT: A source directory never holds its own copy, or copying would never end.
fn reject_nested_copy(source: &Path, projects_root: &Path) -> Result<()> {
    if !source.is_dir() {
        return Ok(());
    }

    let canonical = |path: &Path| {
        fs::canonicalize(path).map_err(|err| ProvisionError::FileSystem {
            source: err,
            path: path.to_path_buf(),
        })
    };

    if canonical(projects_root)?.starts_with(canonical(source)?) {
        return Err(ProvisionError::FileSystem {
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                "copy source contains the projects directory",
            ),
            path: source.to_path_buf(),
        });
    }

    Ok(())
}

// INVARIANT: Directory sources have their contents copied, not the directory itself.
fn copy_into(source: &Path, dest: &Path) -> Result<()> {
    if source.is_dir() {
        copy_recursive(source, dest)
    } else {
        let target = dest.join(base_name(source));
        fs::copy(source, &target)
            .map(|_| ())
            .map_err(|err| ProvisionError::FileSystem {
                source: err,
                path: target,
            })
    }
}

fn copy_recursive(source: &Path, dest: &Path) -> Result<()> {
    let fs_error = |path: &Path| {
        let path = path.to_path_buf();
        move |source: io::Error| ProvisionError::FileSystem { source, path }
    };

    for entry in fs::read_dir(source).map_err(fs_error(source))? {
        let entry = entry.map_err(fs_error(source))?;
        let src_path = entry.path();
        let dst_path = dest.join(entry.file_name());

        if src_path.is_dir() {
            fs::create_dir_all(&dst_path).map_err(fs_error(&dst_path))?;
            copy_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path).map_err(fs_error(&dst_path))?;
        }
    }

    Ok(())
}

/// Provisioning error types.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// Configuration lacks what the operation needs.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Environment was already created.
    #[error("environment {name:?} already exists at {:?}", path.display())]
    EnvironmentExists { name: String, path: PathBuf },

    /// Package management fails.
    #[error(transparent)]
    Package(#[from] PackageError),

    /// Project source of environment could not be installed.
    #[error("failed to install project source for {name}, see {:?} for details", log.display())]
    SourceInstall {
        #[source]
        source: PackageError,
        name: String,
        log: PathBuf,
    },

    /// Repository cloning fails.
    #[error(transparent)]
    Clone(#[from] CloneError),

    /// File system manipulation fails.
    #[error("file system operation failed at {:?}", path.display())]
    FileSystem {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Progress cannot be written to output.
    #[error("failed to write progress to output")]
    Output(#[source] io::Error),
}

impl ProvisionError {
    /// Check if error may be skipped by [`OnFailure::Continue`].
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SourceInstall { .. })
    }
}

/// Friendly result alias :3
pub type Result<T, E = ProvisionError> = std::result::Result<T, E>;
