//! exsync serve command implementation

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::server::{self, AppState};

/// Options for the serve command
pub struct ServeOptions {
    pub bind: Option<String>,
    pub config: Config,
}

pub fn run(options: ServeOptions) -> Result<()> {
    let syncer = Arc::new(super::build_syncer(&options.config)?);
    let state = AppState::new(syncer, &options.config.todoist.client_secret);
    if state.client_secret.is_none() {
        tracing::warn!("todoist.client_secret is empty, webhook signatures are not checked");
    }

    let bind = options
        .bind
        .unwrap_or_else(|| options.config.server.bind.clone());
    super::runtime()?.block_on(server::serve(state, &bind))
}
