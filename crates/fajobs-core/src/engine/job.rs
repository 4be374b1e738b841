use crate::core::command::Command;
use crate::core::utils::text;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Not yet handed to the backend.
    #[default]
    Pending,
    Started,
    Finished,
    Aborted,
    Died,
}

impl JobStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Started => "started",
            JobStatus::Finished => "finished",
            JobStatus::Aborted => "aborted",
            JobStatus::Died => "died",
        }
    }

    pub const fn title(self) -> &'static str {
        match self {
            JobStatus::Pending => "Pending",
            JobStatus::Started => "Started",
            JobStatus::Finished => "Finished",
            JobStatus::Aborted => "Aborted",
            JobStatus::Died => "Died",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Finished | JobStatus::Aborted | JobStatus::Died
        )
    }

    /// Aborted and died jobs both count as failed.
    pub const fn is_failure(self) -> bool {
        matches!(self, JobStatus::Aborted | JobStatus::Died)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
struct Timestamp {
    instant: Instant,
    wall: DateTime<Local>,
}

impl Timestamp {
    fn now() -> Self {
        Self {
            instant: Instant::now(),
            wall: Local::now(),
        }
    }
}

/// One invocation of a [`Command`] and its lifecycle.
#[derive(Debug, Clone)]
pub struct Job {
    command: Command,
    status: JobStatus,
    backend_id: Option<String>,
    started: Option<Timestamp>,
    ended: Option<Timestamp>,
    workdir: PathBuf,
}

impl Job {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            status: JobStatus::Pending,
            backend_id: None,
            started: None,
            ended: None,
            workdir: PathBuf::from("."),
        }
    }

    /// Directory holding the job's log and output files.
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = workdir.into();
        self
    }

    pub fn name(&self) -> &str {
        self.command.jobname()
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn backend_id(&self) -> Option<&str> {
        self.backend_id.as_deref()
    }

    pub fn set_backend_id(&mut self, id: impl Into<String>) {
        self.backend_id = Some(id.into());
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn did_fail(&self) -> bool {
        self.status == JobStatus::Died
    }

    /// Assigns a new status.
    ///
    /// Entering `started` records the start time; entering any other status records
    /// the end time.
    pub fn update(&mut self, status: JobStatus) {
        match status {
            JobStatus::Started => self.started = Some(Timestamp::now()),
            _ => self.ended = Some(Timestamp::now()),
        }
        self.status = status;
    }

    pub fn start_time(&self) -> Option<DateTime<Local>> {
        self.started.map(|t| t.wall)
    }

    pub fn end_time(&self) -> Option<DateTime<Local>> {
        self.ended.map(|t| t.wall)
    }

    /// Zero before the job starts, growing while it runs, frozen once it ends.
    pub fn elapsed(&self) -> Duration {
        let Some(start) = self.started else {
            return Duration::ZERO;
        };
        match (self.status, self.ended) {
            (JobStatus::Started, _) | (_, None) => start.instant.elapsed(),
            (_, Some(end)) => end.instant.saturating_duration_since(start.instant),
        }
    }

    pub fn log_path(&self) -> PathBuf {
        self.workdir.join(format!("{}.log", self.name()))
    }

    /// First `nlines` lines of `<name>.log`, or the last `|nlines|` if negative.
    pub fn log_excerpt(&self, nlines: isize) -> io::Result<String> {
        let content = fs::read_to_string(self.log_path())?;
        Ok(text::excerpt(&content, nlines))
    }

    /// Removes the `<name>.*.failed.*` files a dead job leaves behind and returns how
    /// many were deleted. Errors are logged and otherwise ignored.
    pub fn clean_failed_output(&self) -> usize {
        let pattern = format!(
            "{}/{}.*.failed.*",
            glob::Pattern::escape(&self.workdir.to_string_lossy()),
            glob::Pattern::escape(self.name())
        );
        let entries = match glob::glob(&pattern) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(job = self.name(), error = %e, "Invalid failed-output pattern");
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries {
            match entry.map_err(glob::GlobError::into_error) {
                Ok(path) => match fs::remove_file(&path) {
                    Ok(()) => {
                        debug!(job = self.name(), path = %path.display(), "Removed failed output");
                        removed += 1;
                    }
                    Err(e) => {
                        debug!(path = %path.display(), error = %e, "Could not remove failed output")
                    }
                },
                Err(e) => debug!(error = %e, "Could not read failed-output entry"),
            }
        }
        removed
    }
}
