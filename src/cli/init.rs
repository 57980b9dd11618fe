//! exsync init command implementation
//!
//! Writes a config file with every setting at its default so it can be
//! edited in place. Credentials are left empty.

use std::path::PathBuf;

use crate::config::{default_config_path, Config};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};

/// Options for the init command
pub struct InitOptions {
    /// Target file; the platform config path when unset
    pub path: Option<PathBuf>,
    pub force: bool,
    pub output: OutputOptions,
}

#[derive(serde::Serialize)]
struct InitReport {
    config: PathBuf,
    overwritten: bool,
}

pub fn run(options: InitOptions) -> Result<()> {
    let path = match options.path.or_else(default_config_path) {
        Some(path) => path,
        None => {
            return Err(Error::InvalidArgument(
                "no config directory found; pass --config <path>".to_string(),
            ))
        }
    };

    let existed = path.exists();
    if existed && !options.force {
        return Err(Error::InvalidArgument(format!(
            "{} already exists; use --force to overwrite",
            path.display()
        )));
    }

    Config::default().save(&path)?;
    tracing::info!(path = %path.display(), overwritten = existed, "wrote config");

    let mut human = HumanOutput::new(format!("exsync init: wrote {}", path.display()));
    if existed {
        human.push_warning("previous file was overwritten");
    }
    human.push_next_step("set todoist.api_key and existio.api_key (or TODOIST_API_KEY / EXISTIO_API_KEY)");
    human.push_next_step("exsync serve");

    let report = InitReport {
        config: path,
        overwritten: existed,
    };
    emit_success(options.output, "init", &report, Some(&human))
}
