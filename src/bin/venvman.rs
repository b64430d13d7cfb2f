// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use venvman::{
    path::DEFAULT_CONFIG_PATH, AssumeYes, Cleaner, Confirmation, Git2Cloner, InquireConfirmation,
    Provisioner, VirtualEnv, Workspace,
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::{
    io::{self, Write},
    path::PathBuf,
    process::exit,
};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// VenvMan. A simple approach to controlling multiple virtualenvs.
#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "venvman [options] <venvman-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to configuration file.
    #[arg(long, global = true, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    pub cfg: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let workspace = Workspace::load(&self.cfg)?;
        match self.command {
            Command::Create(opts) => run_create(&workspace, opts),
            Command::Install(opts) => run_install(&workspace, opts),
            Command::Uninstall(opts) => run_uninstall(&workspace, opts),
            Command::Upgrade(opts) => run_upgrade(&workspace, opts),
            Command::InstallSource => run_install_source(&workspace),
            Command::Clean(opts) => run_clean(&workspace, opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Create environments, kernels, project directories, or repositories.
    #[command(subcommand)]
    Create(CreateCommand),

    /// Install packages into every environment.
    #[command(override_usage = "venvman install [options] <pkg>...")]
    Install(PackageOptions),

    /// Uninstall packages from every environment.
    #[command(override_usage = "venvman uninstall [options] <pkg>...")]
    Uninstall(PackageOptions),

    /// Upgrade packages in every environment.
    #[command(override_usage = "venvman upgrade [options] <pkg>...")]
    Upgrade(PackageOptions),

    /// Install project source of every environment in editable mode.
    InstallSource,

    /// Remove environments or project directories no longer configured.
    #[command(subcommand)]
    Clean(CleanCommand),
}

#[derive(Debug, Clone, Subcommand)]
enum CreateCommand {
    /// Create virtual environment for every configured environment.
    Envs,

    /// Register Jupyter kernel for every configured environment.
    Kernels {
        /// Register kernels system-wide through sudo.
        #[arg(short, long)]
        sudo: bool,
    },

    /// Create project directory for every configured environment.
    Dirs {
        /// File or directory to copy into each new project directory.
        #[arg(long, value_name = "PATH")]
        src: Option<PathBuf>,
    },

    /// Clone repository into project directory of every configured environment.
    Repos,
}

#[derive(Debug, Clone, Subcommand)]
enum CleanCommand {
    /// Remove virtual environments no longer configured.
    Envs(CleanOptions),

    /// Remove project directories no longer configured.
    Prjs(CleanOptions),
}

#[derive(Parser, Clone, Debug)]
struct PackageOptions {
    /// Package specifiers to apply, e.g., "numpy>=1.26".
    #[arg(required = true, value_name = "pkg")]
    pub pkgs: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
struct CleanOptions {
    /// Remove without asking for confirmation.
    #[arg(short, long)]
    pub yes: bool,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time()
        .with_writer(io::stderr);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn provisioner(workspace: &Workspace) -> Provisioner<'_> {
    let manager = VirtualEnv::new(workspace.config().interpreter());
    Provisioner::new(workspace, manager, Git2Cloner, io::stdout())
}

fn run_create(workspace: &Workspace, cmd: CreateCommand) -> Result<()> {
    let mut provisioner = provisioner(workspace);
    match cmd {
        CreateCommand::Envs => provisioner.create_envs()?,
        CreateCommand::Kernels { sudo } => provisioner.create_kernels(sudo)?,
        CreateCommand::Dirs { src } => provisioner.create_dirs(src.as_deref())?,
        CreateCommand::Repos => provisioner.create_repos()?,
    }

    Ok(())
}

fn run_install(workspace: &Workspace, opts: PackageOptions) -> Result<()> {
    provisioner(workspace).install_pkgs(&opts.pkgs)?;
    Ok(())
}

fn run_uninstall(workspace: &Workspace, opts: PackageOptions) -> Result<()> {
    provisioner(workspace).uninstall_pkgs(&opts.pkgs)?;
    Ok(())
}

fn run_upgrade(workspace: &Workspace, opts: PackageOptions) -> Result<()> {
    provisioner(workspace).upgrade_pkgs(&opts.pkgs)?;
    Ok(())
}

fn run_install_source(workspace: &Workspace) -> Result<()> {
    provisioner(workspace).install_source()?;
    Ok(())
}

fn run_clean(workspace: &Workspace, cmd: CleanCommand) -> Result<()> {
    let (opts, envs) = match cmd {
        CleanCommand::Envs(opts) => (opts, true),
        CleanCommand::Prjs(opts) => (opts, false),
    };

    if opts.yes {
        clean(Cleaner::new(workspace, AssumeYes, io::stdout()), envs)
    } else {
        clean(Cleaner::new(workspace, InquireConfirmation, io::stdout()), envs)
    }
}

fn clean<P, W>(mut cleaner: Cleaner<'_, P, W>, envs: bool) -> Result<()>
where
    P: Confirmation,
    W: Write,
{
    if envs {
        cleaner.clean_envs()?;
    } else {
        cleaner.clean_prjs()?;
    }

    Ok(())
}
