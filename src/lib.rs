// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Manage many Python virtual environments from one configuration file.
//!
//! Venvman is built for the situation where the same set of environments has
//! to be stood up over and over again, e.g., one environment per student of a
//! course. Every environment is declared by name in a configuration file along
//! with the packages it needs. From there, venvman can create the environments
//! themselves, register them as Jupyter kernels, give each one a project
//! directory, keep their packages in line, and remove whatever the
//! configuration stopped declaring.
//!
//! # Workflow
//!
//! 1. Load a [`Workspace`] from the configuration file.
//! 2. Hand it to a [`Provisioner`] to create or update environments and their
//!    project directories.
//! 3. Hand it to a [`Cleaner`] to remove environments and project directories
//!    that are no longer declared.

pub mod clean;
pub mod config;
pub mod path;
pub mod provision;
pub mod registry;
pub mod repo;
pub mod venv;
pub mod workspace;

#[doc(inline)]
pub use crate::{
    clean::{AssumeYes, Cleaner, Confirmation, InquireConfirmation},
    config::{Config, ConfigError, Format},
    provision::{OnFailure, ProvisionError, Provisioner},
    registry::{Environment, Registry},
    repo::{Git2Cloner, RepoCloner},
    venv::{EnvironmentManager, VirtualEnv},
    workspace::Workspace,
};
