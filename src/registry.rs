// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Environment registry.
//!
//! Every environment declared in the configuration gets exactly one
//! [`Environment`] handle. A handle only describes where an environment and
//! its project directory live. It is constructed whether or not anything
//! exists on disk yet, and it is up to the provisioning workflow to bring the
//! described directories into existence.
//!
//! # Registry Layout
//!
//! Given an environment named "Kyle", its virtual environment lives at
//! `$environments_root/Kyle`, and its project directory lives at
//! `$projects_root/Kyle`. Only the top-level of either root is ever
//! considered, so environments cannot nest inside one another.

use crate::{config::Config, path::venv_python};

use std::path::{Path, PathBuf};

/// Handle to a declared environment.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Environment {
    name: String,
    path: PathBuf,
    project_dir: PathBuf,
    packages: Vec<String>,
}

impl Environment {
    /// Construct new environment handle.
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        project_dir: impl Into<PathBuf>,
        packages: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            project_dir: project_dir.into(),
            packages: packages.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Path to virtual environment.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Path to matching project directory.
    pub fn project_dir(&self) -> &Path {
        self.project_dir.as_path()
    }

    /// Packages declared specifically for this environment.
    pub fn packages(&self) -> &[String] {
        self.packages.as_slice()
    }

    /// Path to interpreter inside of virtual environment.
    pub fn python(&self) -> PathBuf {
        venv_python(&self.path)
    }

    /// Check if virtual environment has been created on disk.
    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }
}

/// Registry of environment handles in declaration order.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct Registry {
    environments: Vec<Environment>,
}

impl Registry {
    /// Build registry from configuration.
    ///
    /// Pure function of the configuration. Does not touch the file system.
    pub fn build(config: &Config) -> Self {
        let environments = config
            .environments()
            .iter()
            .map(|(name, packages)| {
                Environment::new(
                    name,
                    config.environments_root().join(name),
                    config.projects_root().join(name),
                    packages.iter().cloned(),
                )
            })
            .collect();

        Self { environments }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Environment> {
        self.environments.iter()
    }

    /// Lookup environment by name.
    pub fn get(&self, name: impl AsRef<str>) -> Option<&Environment> {
        self.environments
            .iter()
            .find(|env| env.name() == name.as_ref())
    }

    /// Environment names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.environments.iter().map(Environment::name).collect()
    }

    pub fn contains(&self, name: impl AsRef<str>) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }
}

impl<'a> IntoIterator for &'a Registry {
    type Item = &'a Environment;
    type IntoIter = std::slice::Iter<'a, Environment>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
