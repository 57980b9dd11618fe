//! exsync tags command implementation

use crate::clients::existio::tag_url;
use crate::config::Config;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::store::TagStore;

/// Options for the tags command
pub struct TagsOptions {
    pub config: Config,
    pub output: OutputOptions,
}

#[derive(serde::Serialize)]
struct TagsReport {
    data_filename: String,
    bindings: Vec<Binding>,
}

#[derive(serde::Serialize)]
struct Binding {
    task_id: String,
    tag: String,
    url: String,
}

pub fn run(options: TagsOptions) -> Result<()> {
    let store = TagStore::load(options.config.data_filename.clone())?;
    let bindings: Vec<Binding> = store
        .all()
        .into_iter()
        .map(|(task_id, tag)| Binding {
            url: tag_url(&tag),
            task_id,
            tag,
        })
        .collect();

    let mut human = HumanOutput::new(format!("exsync tags: {} linked tasks", bindings.len()));
    human.push_summary("file", store.path().display().to_string());
    for binding in &bindings {
        human.push_detail(format!("{} -> {} ({})", binding.task_id, binding.tag, binding.url));
    }
    if bindings.is_empty() {
        human.push_next_step(format!(
            "comment `{} +<tag>` on a Todoist task",
            options.config.sync.command_prefix
        ));
    }

    let report = TagsReport {
        data_filename: store.path().display().to_string(),
        bindings,
    };
    emit_success(options.output, "tags", &report, Some(&human))
}
