// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Per-invocation context.
//!
//! A [`Workspace`] pairs a loaded configuration with the registry built from
//! it. It is built once per invocation and handed to whatever workflow runs.

use crate::{
    config::{Config, ConfigError},
    registry::Registry,
};

use std::path::Path;
use tracing::{debug, instrument};

/// Configuration and the environment registry built from it.
#[derive(Debug, Clone)]
pub struct Workspace {
    config: Config,
    registry: Registry,
}

impl Workspace {
    /// Construct new workspace from configuration.
    pub fn new(config: Config) -> Self {
        let registry = Registry::build(&config);
        Self { config, registry }
    }

    /// Load workspace from configuration file.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError`] if configuration cannot be loaded.
    #[instrument(skip(path), level = "debug")]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("load configuration: {:?}", path.as_ref().display());
        Ok(Self::new(Config::load(path)?))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
