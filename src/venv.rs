// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Virtual environment management.
//!
//! All package work is delegated to an [`EnvironmentManager`]. The default
//! manager, [`VirtualEnv`], shells out to the standard `venv` module of a
//! Python interpreter to create environments, and to the `pip` of each
//! environment's own interpreter for everything else.
//!
//! # Build Logs
//!
//! Output of every command run against an environment is appended to
//! `build.log` inside of that environment. Whenever a command fails, its
//! error output is also appended to `build.err`. These logs are the place to
//! look when an installation goes wrong, because venvman itself only reports
//! the tail of the failure.

use crate::registry::Environment;

use std::{
    ffi::{OsStr, OsString},
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{debug, instrument};

/// Name of log file that collects output of commands run in an environment.
pub const BUILD_LOG: &str = "build.log";

/// Name of log file that collects error output of failed commands.
pub const ERROR_LOG: &str = "build.err";

/// Layer of indirection for package management.
pub trait EnvironmentManager {
    /// Initialize new virtual environment at path of `env`.
    ///
    /// The directory itself already exists when this is called.
    fn create(&self, env: &Environment) -> Result<()>;

    /// Install package into environment.
    fn install(&self, env: &Environment, spec: &str) -> Result<()>;

    /// Uninstall package from environment.
    fn uninstall(&self, env: &Environment, spec: &str) -> Result<()>;

    /// Upgrade package in environment.
    fn upgrade(&self, env: &Environment, spec: &str) -> Result<()>;

    /// Install project at `project_dir` into environment in editable mode.
    fn install_editable(&self, env: &Environment, project_dir: &Path) -> Result<()>;

    /// Check if package is installed in environment.
    fn is_installed(&self, env: &Environment, spec: &str) -> Result<bool>;

    /// Execute arbitrary command on behalf of environment.
    ///
    /// First item of `command` is the program to run, the rest are its
    /// arguments. Returns combined output of the command.
    fn execute(&self, env: &Environment, command: &[OsString]) -> Result<String>;

    /// Location where failures of environment are recorded.
    fn error_log(&self, env: &Environment) -> PathBuf;
}

/// Package management through `venv` and `pip`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualEnv {
    interpreter: OsString,
}

impl VirtualEnv {
    /// Construct new manager that creates environments with `interpreter`.
    pub fn new(interpreter: impl Into<OsString>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }

    fn pip(&self, env: &Environment, args: &[&OsStr]) -> Result<String> {
        let mut pip_args = vec![OsStr::new("-m"), OsStr::new("pip")];
        pip_args.extend_from_slice(args);
        self.run(env, env.python(), pip_args)
    }

    fn run(
        &self,
        env: &Environment,
        cmd: impl AsRef<OsStr>,
        args: impl IntoIterator<Item = impl AsRef<OsStr>>,
    ) -> Result<String> {
        let capture = syscall(cmd, args)?;
        append_log(env.path().join(BUILD_LOG), &capture.stdout);

        if !capture.success {
            append_log(self.error_log(env), &capture.stderr);
            let message = capture.message();
            return Err(PackageError::Command {
                command: capture.command,
                message,
            });
        }

        Ok(capture.message())
    }
}

impl Default for VirtualEnv {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_INTERPRETER)
    }
}

impl EnvironmentManager for VirtualEnv {
    #[instrument(skip(self, env), fields(env = env.name()), level = "debug")]
    fn create(&self, env: &Environment) -> Result<()> {
        debug!("create virtual environment at {:?}", env.path().display());
        self.run(
            env,
            &self.interpreter,
            [OsStr::new("-m"), OsStr::new("venv"), env.path().as_os_str()],
        )?;

        Ok(())
    }

    #[instrument(skip(self, env), fields(env = env.name()), level = "debug")]
    fn install(&self, env: &Environment, spec: &str) -> Result<()> {
        self.pip(env, &[OsStr::new("install"), OsStr::new(spec)])?;
        Ok(())
    }

    #[instrument(skip(self, env), fields(env = env.name()), level = "debug")]
    fn uninstall(&self, env: &Environment, spec: &str) -> Result<()> {
        self.pip(env, &[OsStr::new("uninstall"), OsStr::new("-y"), OsStr::new(spec)])?;
        Ok(())
    }

    #[instrument(skip(self, env), fields(env = env.name()), level = "debug")]
    fn upgrade(&self, env: &Environment, spec: &str) -> Result<()> {
        self.pip(
            env,
            &[OsStr::new("install"), OsStr::new("--upgrade"), OsStr::new(spec)],
        )?;
        Ok(())
    }

    #[instrument(skip(self, env), fields(env = env.name()), level = "debug")]
    fn install_editable(&self, env: &Environment, project_dir: &Path) -> Result<()> {
        self.pip(
            env,
            &[OsStr::new("install"), OsStr::new("-e"), project_dir.as_os_str()],
        )?;
        Ok(())
    }

    #[instrument(skip(self, env), fields(env = env.name()), level = "debug")]
    fn is_installed(&self, env: &Environment, spec: &str) -> Result<bool> {
        // INVARIANT: pip-show exits non-zero for unknown distributions, that is not a failure.
        let capture = syscall(
            env.python(),
            ["-m", "pip", "show", "--quiet", distribution_name(spec)],
        )?;
        debug!("{spec} installed: {}", capture.success);

        Ok(capture.success)
    }

    #[instrument(skip(self, env), fields(env = env.name()), level = "debug")]
    fn execute(&self, env: &Environment, command: &[OsString]) -> Result<String> {
        let (cmd, args) = command.split_first().ok_or(PackageError::EmptyCommand)?;
        self.run(env, cmd, args)
    }

    fn error_log(&self, env: &Environment) -> PathBuf {
        env.path().join(ERROR_LOG)
    }
}

/// Extract distribution name from package specifier.
///
/// Everything from the first version constraint, extras marker, environment
/// marker, or direct reference onward is dropped, e.g., `numpy>=1.26` becomes
/// `numpy`.
pub fn distribution_name(spec: &str) -> &str {
    let end = spec
        .find(|c: char| matches!(c, '<' | '>' | '=' | '!' | '~' | '[' | ';' | '@' | '(' | ' '))
        .unwrap_or(spec.len());

    spec[..end].trim()
}

/// Captured result of a finished external command.
#[derive(Debug)]
struct Capture {
    command: String,
    success: bool,
    stdout: String,
    stderr: String,
}

impl Capture {
    fn message(&self) -> String {
        let mut message = String::new();

        if !self.stdout.is_empty() {
            message.push_str(format!("stdout: {}", self.stdout).as_str());
        }

        if !self.stderr.is_empty() {
            message.push_str(format!("stderr: {}", self.stderr).as_str());
        }

        // INVARIANT: Chomp trailing newlines.
        message
            .strip_suffix("\r\n")
            .or(message.strip_suffix('\n'))
            .map(ToString::to_string)
            .unwrap_or(message)
    }
}

fn syscall(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<Capture> {
    let args = args
        .into_iter()
        .map(|arg| arg.as_ref().to_os_string())
        .collect::<Vec<_>>();
    let command = render_command(cmd.as_ref(), &args);
    debug!("run {command}");

    let output = Command::new(cmd.as_ref())
        .args(&args)
        .output()
        .map_err(|source| PackageError::Spawn {
            source,
            command: command.clone(),
        })?;

    Ok(Capture {
        command,
        success: output.status.success(),
        stdout: String::from_utf8_lossy(output.stdout.as_slice()).into_owned(),
        stderr: String::from_utf8_lossy(output.stderr.as_slice()).into_owned(),
    })
}

fn render_command(cmd: &OsStr, args: &[OsString]) -> String {
    std::iter::once(cmd)
        .chain(args.iter().map(OsString::as_os_str))
        .map(|part| part.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

// INVARIANT: Failing to log never masks the result of the command itself.
fn append_log(path: impl AsRef<Path>, contents: &str) {
    if contents.is_empty() {
        return;
    }

    let result = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_ref())
        .and_then(|mut file| file.write_all(contents.as_bytes()));

    if let Err(error) = result {
        debug!("cannot write to {:?}: {error}", path.as_ref().display());
    }
}

/// Package operation error types.
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    /// Command could not be started at all.
    #[error("failed to run {command:?}")]
    Spawn {
        #[source]
        source: std::io::Error,
        command: String,
    },

    /// Command ran, but reported failure.
    #[error("command {command:?} failed:\n{message}")]
    Command { command: String, message: String },

    /// No program given to execute.
    #[error("cannot execute empty command")]
    EmptyCommand,
}

/// Friendly result alias :3
pub type Result<T, E = PackageError> = std::result::Result<T, E>;
