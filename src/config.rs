// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the configuration file that drives venvman, and
//! fold it into a fully defaulted [`Config`] so that nothing downstream ever
//! has to care whether a key was present in the document or not.
//!
//! # General Layout
//!
//! ```yaml
//! environments_directory: ~/envs
//! projects_directory: ~/projects
//! repository_remote: git@github.com:course
//! default_packages: [numpy]
//! environments:
//!   Kyle: [pandas]
//!   Sally: [requests]
//! ```
//!
//! Only `environments` is required. The order of its entries is the order in
//! which every workflow visits the environments, and the order in which they
//! are reported back to the user.
//!
//! YAML is the default format. A configuration file with a `.toml` extension
//! is read as TOML instead, with the same keys.

use serde::{
    de::{Error as DeError, MapAccess, Visitor},
    Deserialize, Deserializer,
};
use std::{
    fmt::{Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Component, Path, PathBuf},
    str::FromStr,
};

/// Interpreter used to create new environments when none is configured.
pub const DEFAULT_INTERPRETER: &str = "python3";

/// Fully defaulted configuration.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Config {
    environments_root: PathBuf,
    projects_root: PathBuf,
    default_packages: Vec<String>,
    environments: Environments,
    repository_remote: Option<String>,
    interpreter: String,
}

impl Config {
    /// Load configuration from file at `path`.
    ///
    /// Files ending in `.toml` are parsed as TOML, everything else as YAML.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if file cannot be read.
    /// - Return [`ConfigError::Yaml`] or [`ConfigError::Toml`] if parsing fails.
    /// - Return [`ConfigError::MissingEnvironments`] if no environments are
    ///   declared.
    /// - Return [`ConfigError::ShellExpansion`] if a directory cannot be
    ///   expanded.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = read_to_string(path).map_err(|source| ConfigError::Read {
            source,
            path: path.to_path_buf(),
        })?;

        Self::parse(&data, Format::from_path(path))
    }

    /// Parse configuration from string data of a given format.
    pub fn parse(data: &str, format: Format) -> Result<Self> {
        let document: ConfigDocument = match format {
            Format::Yaml => serde_yaml::from_str(data)?,
            Format::Toml => toml::de::from_str(data)?,
        };

        document.try_into()
    }

    /// Root directory that holds every environment.
    pub fn environments_root(&self) -> &Path {
        self.environments_root.as_path()
    }

    /// Root directory that holds every project directory.
    pub fn projects_root(&self) -> &Path {
        self.projects_root.as_path()
    }

    /// Packages installed into every environment before its own packages.
    pub fn default_packages(&self) -> &[String] {
        self.default_packages.as_slice()
    }

    /// Declared environments in declaration order.
    pub fn environments(&self) -> &Environments {
        &self.environments
    }

    /// Base URL that repositories are cloned from, if configured.
    pub fn repository_remote(&self) -> Option<&str> {
        self.repository_remote.as_deref()
    }

    /// Interpreter program used to create new environments.
    pub fn interpreter(&self) -> &str {
        self.interpreter.as_str()
    }

    /// Determine clone URL of repository for a given environment.
    ///
    /// The URL is always `{repository_remote}/{name}.git`.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::MissingRepositoryRemote`] if no remote is set.
    pub fn repository_url(&self, name: impl AsRef<str>) -> Result<String> {
        let remote = self
            .repository_remote()
            .ok_or(ConfigError::MissingRepositoryRemote)?;

        Ok(format!(
            "{}/{}.git",
            remote.trim_end_matches('/'),
            name.as_ref()
        ))
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        Self::parse(data, Format::Yaml)
    }
}

/// Supported configuration file formats.
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy)]
pub enum Format {
    #[default]
    Yaml,
    Toml,
}

impl Format {
    /// Pick format from file extension of `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::Toml,
            _ => Self::Yaml,
        }
    }
}

/// Ordered mapping of environment names to their own package listings.
///
/// # Invariant
///
/// - Names are unique.
/// - Entries keep the order they were declared in.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct Environments(Vec<(String, Vec<String>)>);

impl Environments {
    /// Iterate over environment names and packages in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(name, packages)| (name.as_str(), packages.as_slice()))
    }

    /// Environment names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    /// Packages declared for environment `name`.
    pub fn packages(&self, name: impl AsRef<str>) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(entry, _)| entry == name.as_ref())
            .map(|(_, packages)| packages.as_slice())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for Environments {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(EnvironmentsVisitor)
    }
}

struct EnvironmentsVisitor;

impl<'de> Visitor<'de> for EnvironmentsVisitor {
    type Value = Environments;

    fn expecting(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str("a mapping of environment names to package listings")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries: Vec<(String, Vec<String>)> =
            Vec::with_capacity(access.size_hint().unwrap_or_default());

        // INVARIANT: An environment without packages may be left empty, e.g., `Kyle:`.
        while let Some((name, packages)) = access.next_entry::<String, Option<Vec<String>>>()? {
            if !is_plain_name(&name) {
                return Err(A::Error::custom(format!(
                    "environment {name:?} must be a plain directory name"
                )));
            }

            if entries.iter().any(|(entry, _)| *entry == name) {
                return Err(A::Error::custom(format!(
                    "environment {name:?} declared more than once"
                )));
            }
            entries.push((name, packages.unwrap_or_default()));
        }

        Ok(Environments(entries))
    }
}

// INVARIANT: Names are exactly one normal path component, so they always land inside a root.
fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Raw configuration document, exactly as written by the user.
#[derive(Default, Debug, Deserialize)]
struct ConfigDocument {
    environments_directory: Option<String>,
    projects_directory: Option<String>,
    default_packages: Option<Vec<String>>,
    environments: Option<Environments>,
    repository_remote: Option<String>,
    interpreter: Option<String>,
}

impl TryFrom<ConfigDocument> for Config {
    type Error = ConfigError;

    fn try_from(document: ConfigDocument) -> Result<Self, Self::Error> {
        let environments = document
            .environments
            .ok_or(ConfigError::MissingEnvironments)?;

        Ok(Self {
            environments_root: expand_dir(document.environments_directory)?,
            projects_root: expand_dir(document.projects_directory)?,
            default_packages: document.default_packages.unwrap_or_default(),
            environments,
            repository_remote: document.repository_remote,
            interpreter: document
                .interpreter
                .unwrap_or_else(|| DEFAULT_INTERPRETER.into()),
        })
    }
}

// INVARIANT: Missing directories default to the current directory.
fn expand_dir(raw: Option<String>) -> Result<PathBuf> {
    match raw {
        Some(raw) => Ok(PathBuf::from(shellexpand::full(&raw)?.into_owned())),
        None => Ok(PathBuf::from(".")),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file cannot be read.
    #[error("failed to read configuration file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize YAML configuration.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// Failed to deserialize TOML configuration.
    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    /// Failed to perform shell expansion on configured directory.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// No `environments` mapping in configuration.
    #[error("configuration does not declare any environments")]
    MissingEnvironments,

    /// No `repository_remote` to clone repositories from.
    #[error("configuration does not set a repository_remote to clone from")]
    MissingRepositoryRemote,
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
