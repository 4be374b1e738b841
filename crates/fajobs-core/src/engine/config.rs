use super::notification::NotificationLevel;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// How many processors the queue may use in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CpuRequest {
    /// Every logical CPU of the host.
    #[default]
    All,
    Count(usize),
}

impl FromStr for CpuRequest {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(CpuRequest::All);
        }
        s.parse::<usize>()
            .map(CpuRequest::Count)
            .map_err(|_| ConfigError::InvalidParameter {
                name: "total_cpu",
                reason: format!("expected 'all' or a positive integer, got '{}'", s),
            })
    }
}

impl fmt::Display for CpuRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpuRequest::All => f.write_str("all"),
            CpuRequest::Count(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub name: String,
    /// Effective CPU budget, already clamped to the host's CPU count.
    pub total_cpu: usize,
    pub cpu_per_job: usize,
    pub workdir: PathBuf,
    pub notify_level: NotificationLevel,
    pub recipient: Option<String>,
}

impl QueueConfig {
    /// `floor(total_cpu / cpu_per_job)`, the admission limit given to the backend.
    pub fn max_simultaneous_jobs(&self) -> usize {
        self.total_cpu / self.cpu_per_job
    }
}

#[derive(Default)]
pub struct QueueConfigBuilder {
    name: Option<String>,
    total_cpu: CpuRequest,
    cpu_per_job: Option<usize>,
    workdir: Option<PathBuf>,
    notify_level: NotificationLevel,
    recipient: Option<String>,
    available_cpus: Option<usize>,
}

impl QueueConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn total_cpu(mut self, request: CpuRequest) -> Self {
        self.total_cpu = request;
        self
    }

    pub fn cpu_per_job(mut self, n: usize) -> Self {
        self.cpu_per_job = Some(n);
        self
    }

    pub fn workdir(mut self, path: impl Into<PathBuf>) -> Self {
        self.workdir = Some(path.into());
        self
    }

    pub fn notify_level(mut self, level: NotificationLevel) -> Self {
        self.notify_level = level;
        self
    }

    pub fn recipient(mut self, recipient: Option<String>) -> Self {
        self.recipient = recipient;
        self
    }

    /// Overrides the detected number of logical CPUs.
    pub fn available_cpus(mut self, n: usize) -> Self {
        self.available_cpus = Some(n);
        self
    }

    pub fn build(self) -> Result<QueueConfig, ConfigError> {
        let name = self.name.ok_or(ConfigError::MissingParameter("name"))?;
        let available = self.available_cpus.unwrap_or_else(host_cpu_count).max(1);

        let total_cpu = match self.total_cpu {
            CpuRequest::All => available,
            CpuRequest::Count(0) => {
                return Err(ConfigError::InvalidParameter {
                    name: "total_cpu",
                    reason: "must be at least 1".to_string(),
                });
            }
            CpuRequest::Count(n) if n > available => {
                debug!(
                    requested = n,
                    available, "Clamping total cpu to the host's cpu count"
                );
                available
            }
            CpuRequest::Count(n) => n,
        };

        let cpu_per_job = self.cpu_per_job.unwrap_or(1);
        if cpu_per_job == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "cpu_per_job",
                reason: "must be at least 1".to_string(),
            });
        }
        if cpu_per_job > total_cpu {
            return Err(ConfigError::InvalidParameter {
                name: "cpu_per_job",
                reason: format!(
                    "{} exceeds the {} available cpu(s), no job could ever run",
                    cpu_per_job, total_cpu
                ),
            });
        }

        Ok(QueueConfig {
            name,
            total_cpu,
            cpu_per_job,
            workdir: self.workdir.unwrap_or_else(|| PathBuf::from(".")),
            notify_level: self.notify_level,
            recipient: self.recipient,
        })
    }
}

/// Number of logical CPUs of this host.
pub fn host_cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
