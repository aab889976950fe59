// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use deja::{
    path::{default_config_file, default_store_dir, home_dir},
    Backend, Git2Vcs, GitCommand, Settings, SourceLocation, Store, Vcs,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::{fs, io, path::PathBuf, process::exit};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "deja [options] <command> [<name>|<source>]",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to repository store.
    #[arg(long, global = true, value_name = "path")]
    pub store: Option<PathBuf>,

    /// Path to home directory to link into.
    #[arg(long, global = true, value_name = "path")]
    pub home: Option<PathBuf>,

    /// Path to settings file.
    #[arg(long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let settings = load_settings(self.config.clone())?;
        let store = open_store(&self, &settings)?;

        match self.command {
            Command::Clone(opts) => run_clone(&store, &settings, opts),
            Command::Pull(opts) => run_pull(&store, opts),
            Command::Link(opts) => run_link(&store, opts),
            Command::Unlink(opts) => run_unlink(&store, opts),
            Command::Remove(opts) => run_remove(&store, opts),
            Command::Diff(opts) => run_diff(&store, opts),
            Command::Ls(opts) => run_ls(&store, opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Clone repository into store, and link it into home directory.
    #[command(override_usage = "deja clone [options] <source>")]
    Clone(CloneOptions),

    /// Update repository from its remote.
    #[command(override_usage = "deja pull [options] <name>")]
    Pull(NameOptions),

    /// Link repository into home directory.
    #[command(override_usage = "deja link [options] <name>")]
    Link(NameOptions),

    /// Remove links of repository from home directory.
    #[command(override_usage = "deja unlink [options] <name>")]
    Unlink(NameOptions),

    /// Unlink repository, and delete it from store.
    #[command(alias = "rm", override_usage = "deja remove [options] <name>")]
    Remove(NameOptions),

    /// Show differences between repository and home directory.
    #[command(override_usage = "deja diff [options] <name>")]
    Diff(NameOptions),

    /// List repositories in store, or files of one repository.
    #[command(override_usage = "deja ls [options] [<name>]")]
    Ls(LsOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CloneOptions {
    /// URL, local path, or user/repo shorthand to clone from.
    #[arg(required = true, value_name = "source")]
    pub source: String,

    /// Do not link repository after cloning.
    #[arg(long)]
    pub no_link: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct NameOptions {
    /// Name of repository in store.
    #[arg(required = true, value_name = "name")]
    pub name: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct LsOptions {
    /// Name of repository to list files of.
    #[arg(value_name = "name")]
    pub name: Option<String>,
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

    // INVARIANT: Any failure, invalid invocation included, exits with 1.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            exit(code);
        }
    };

    if let Err(error) = cli.run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn load_settings(path: Option<PathBuf>) -> Result<Settings> {
    let explicit = path.is_some();
    let path = match path {
        Some(path) => path,
        None => default_config_file()?,
    };

    match fs::read_to_string(&path) {
        Ok(data) => data
            .parse()
            .with_context(|| format!("invalid settings file {:?}", path.display())),
        Err(err) if err.kind() == io::ErrorKind::NotFound && !explicit => Ok(Settings::default()),
        Err(err) => {
            Err(err).with_context(|| format!("cannot read settings file {:?}", path.display()))
        }
    }
}

fn open_store(cli: &Cli, settings: &Settings) -> Result<Store<Box<dyn Vcs>>> {
    let root = match cli.store.clone().or_else(|| settings.store.path.clone()) {
        Some(root) => root,
        None => default_store_dir()?,
    };
    let home = match cli.home.clone().or_else(|| settings.store.home.clone()) {
        Some(home) => home,
        None => home_dir()?,
    };
    let vcs: Box<dyn Vcs> = match settings.remote.backend {
        Backend::Git2 => Box::new(Git2Vcs::new()),
        Backend::Git => Box::new(GitCommand::default()),
    };

    Ok(Store::open(root, home, vcs)?.with_metadata_dir(&settings.store.metadata_dir))
}

fn run_clone(store: &Store<Box<dyn Vcs>>, settings: &Settings, opts: CloneOptions) -> Result<()> {
    let source = SourceLocation::parse(&opts.source, &settings.remote.host)?;
    let name = store.clone_repository(&source)?;
    println!("{name}");

    if opts.no_link {
        return Ok(());
    }

    link_by_name(store, &name)
}

fn run_pull(store: &Store<Box<dyn Vcs>>, opts: NameOptions) -> Result<()> {
    store.pull(&opts.name)?;
    info!("pulled {:?}", opts.name);

    Ok(())
}

fn run_link(store: &Store<Box<dyn Vcs>>, opts: NameOptions) -> Result<()> {
    link_by_name(store, &opts.name)
}

fn run_unlink(store: &Store<Box<dyn Vcs>>, opts: NameOptions) -> Result<()> {
    let removed = store.unlink(&opts.name)?;
    info!("unlinked {:?}, {removed} links removed", opts.name);

    Ok(())
}

fn run_remove(store: &Store<Box<dyn Vcs>>, opts: NameOptions) -> Result<()> {
    store.remove(&opts.name)?;
    info!("removed {:?}", opts.name);

    Ok(())
}

fn run_diff(store: &Store<Box<dyn Vcs>>, opts: NameOptions) -> Result<()> {
    let report = store.diff(&opts.name)?;
    println!("{report}");

    Ok(())
}

fn run_ls(store: &Store<Box<dyn Vcs>>, opts: LsOptions) -> Result<()> {
    match opts.name {
        Some(name) => {
            for path in store.list_files(name)? {
                println!("{}", path.display());
            }
        }
        None => {
            for name in store.repositories().iter()? {
                println!("{name}");
            }
        }
    }

    Ok(())
}

fn link_by_name(store: &Store<Box<dyn Vcs>>, name: &str) -> Result<()> {
    let conflicts = store.link(name)?;
    if conflicts.is_empty() {
        info!("linked {name:?}");
        return Ok(());
    }

    for conflict in &conflicts {
        warn!("{conflict}");
    }
    bail!("{} conflicts while linking {name:?}", conflicts.len())
}
