use fajobs::core::command::schemas;
use fajobs::engine::backend::local::DEFAULT_POLL_INTERVAL;
use fajobs::engine::config::CpuRequest;
use fajobs::engine::mail::DEFAULT_SMTP_SERVER;
use fajobs::engine::notification::NotificationLevel;
use std::path::PathBuf;

pub struct DefaultsConfig {
    pub program: String,
    pub cpu: CpuRequest,
    pub cpu_per_job: usize,
    pub workdir: PathBuf,
    pub notify_level: NotificationLevel,
    pub smtp_server: String,
    pub poll_interval_ms: u64,
    pub capture_output: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            program: schemas::MACROMODEL.to_string(),
            cpu: CpuRequest::All,
            cpu_per_job: 1,
            workdir: PathBuf::from("."),
            notify_level: NotificationLevel::None,
            smtp_server: DEFAULT_SMTP_SERVER.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            capture_output: true,
        }
    }
}
