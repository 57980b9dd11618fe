//! Command-line interface for exsync
//!
//! This module defines the CLI structure using clap derive macros.
//! Each subcommand is defined in its own submodule.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::clients::existio::ExistClient;
use crate::clients::todoist::TodoistClient;
use crate::config::Config;
use crate::error::Result;
use crate::output::OutputOptions;
use crate::store::TagStore;
use crate::sync::Syncer;

mod init;
mod serve;
mod tags;
mod update;

/// exsync - Todoist to Exist.io habit sync
///
/// Mirrors task completions into Exist.io custom tags and keeps a monthly
/// calendar of each habit in the task's comments.
#[derive(Parser, Debug)]
#[command(name = "exsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, env = "EXSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Debug logging; job failures become fatal
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the Todoist webhook server
    Serve {
        /// Address to listen on (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Refresh the stats comments of every linked task
    UpdateAll {
        /// Regenerate every month of the window
        #[arg(long)]
        force: bool,

        /// Months before the current one to refresh
        #[arg(long, value_name = "N")]
        update_months: Option<u32>,
    },

    /// Refresh the stats comments of one linked task
    UpdateTask {
        /// Todoist task id
        task_id: String,

        /// Regenerate every month of the window
        #[arg(long)]
        force: bool,

        /// Months before the current one to refresh
        #[arg(long, value_name = "N")]
        update_months: Option<u32>,
    },

    /// List linked tasks and their tags
    Tags,

    /// Write a config file with default settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let output = OutputOptions {
            json: self.json,
            quiet: self.quiet,
        };
        // `init` runs before a config file exists.
        let config = || load_config(self.config.as_deref(), self.debug);

        match self.command {
            Commands::Serve { bind } => serve::run(serve::ServeOptions {
                bind,
                config: config()?,
            }),
            Commands::UpdateAll {
                force,
                update_months,
            } => update::run_all(update::UpdateOptions {
                force,
                update_months,
                config: config()?,
                output,
            }),
            Commands::UpdateTask {
                task_id,
                force,
                update_months,
            } => update::run_task(
                task_id,
                update::UpdateOptions {
                    force,
                    update_months,
                    config: config()?,
                    output,
                },
            ),
            Commands::Tags => tags::run(tags::TagsOptions {
                config: config()?,
                output,
            }),
            Commands::Init { force } => init::run(init::InitOptions {
                path: self.config.clone(),
                force,
                output,
            }),
        }
    }
}

/// Load configuration, with `--debug` forcing debug mode on.
pub fn load_config(path: Option<&Path>, debug: bool) -> Result<Config> {
    let mut config = Config::resolve(path)?;
    config.debug |= debug;
    Ok(config)
}

/// Wire the tag store and both HTTP clients into a [`Syncer`].
pub fn build_syncer(config: &Config) -> Result<Syncer> {
    config.require_credentials()?;
    let timeout = Duration::from_secs(config.server.request_timeout_secs);
    let store = Arc::new(TagStore::load(config.data_filename.clone())?);
    let tracking = Arc::new(ExistClient::new(&config.existio, timeout)?);
    let tasks = Arc::new(TodoistClient::new(&config.todoist, timeout)?);
    Ok(Syncer::new(store, tracking, tasks, config.sync.clone()).with_debug(config.debug))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}
