use fajobs::core::command::Command;
use fajobs::engine::config::QueueConfig;
use fajobs::workflows::batch::BatchOptions;
use std::path::PathBuf;
use std::time::Duration;

/// Everything `run` and `render` need, after merging flags, overrides, file and defaults.
pub struct AppConfig {
    pub queue: QueueConfig,
    pub commands: Vec<Command>,
    pub poll_interval: Duration,
    pub capture_output: bool,
    pub smtp_server: String,
    pub netrc: Option<PathBuf>,
    pub batch: BatchOptions,
}
