use crate::core::command::Command;
use crate::core::utils::duration::ctime;
use crate::engine::backend::JobBackend;
use crate::engine::error::EngineError;
use crate::engine::job::{Job, JobStatus};
use crate::engine::queue::{JobCount, JobQueue, QueueStatus};
use chrono::Local;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Stage marker: the batch is skipped when it exists and created after a clean run.
    pub marker: Option<PathBuf>,
    /// CSV file receiving one row per job.
    pub report: Option<PathBuf>,
}

/// One report row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub name: String,
    pub status: JobStatus,
    pub backend_id: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub elapsed_seconds: f64,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        Self {
            name: job.name().to_string(),
            status: job.status(),
            backend_id: job.backend_id().map(str::to_string),
            start_time: job.start_time().map(|t| t.to_rfc3339()),
            end_time: job
                .end_time()
                .filter(|_| job.is_terminal())
                .map(|t| t.to_rfc3339()),
            elapsed_seconds: (job.elapsed().as_secs_f64() * 1000.0).round() / 1000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub queue_status: QueueStatus,
    /// Set when the stage marker already existed and nothing ran.
    pub skipped: bool,
    pub counts: JobCount,
    pub jobs: Vec<JobSummary>,
}

impl BatchResult {
    pub fn is_success(&self) -> bool {
        self.skipped || (self.queue_status == QueueStatus::Finished && self.counts.failed == 0)
    }
}

#[instrument(skip_all, name = "batch_workflow", fields(queue = %queue.name(), commands = commands.len()))]
pub fn run<B: JobBackend>(
    queue: &mut JobQueue<B>,
    commands: Vec<Command>,
    options: &BatchOptions,
) -> Result<BatchResult, EngineError> {
    if let Some(marker) = options.marker.as_deref().filter(|m| m.exists()) {
        info!(marker = %marker.display(), "Stage marker found, skipping batch");
        return Ok(BatchResult {
            queue_status: queue.status(),
            skipped: true,
            counts: JobCount::default(),
            jobs: Vec::new(),
        });
    }

    for command in commands {
        queue.add_job(command)?;
    }
    let queue_status = queue.run_and_wait()?;

    let result = BatchResult {
        queue_status,
        skipped: false,
        counts: queue.job_count(),
        jobs: queue.jobs().iter().map(JobSummary::from).collect(),
    };

    if let Some(report) = &options.report {
        write_report(report, &result.jobs)?;
        info!(report = %report.display(), "Wrote job report");
    }

    if let Some(marker) = &options.marker {
        if result.is_success() {
            write_marker(marker)?;
            info!(marker = %marker.display(), "Stage completed, marker created");
        } else {
            warn!(
                failed = result.counts.failed,
                status = %queue_status,
                "Stage did not complete cleanly, marker not created"
            );
        }
    }

    Ok(result)
}

pub fn write_report(path: &Path, jobs: &[JobSummary]) -> Result<(), EngineError> {
    let report_err = |source| EngineError::Report {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(report_err)?;
    for job in jobs {
        writer.serialize(job).map_err(report_err)?;
    }
    writer.flush().map_err(|source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_marker(path: &Path) -> Result<(), EngineError> {
    fs::write(path, format!("completed at {}\n", ctime(&Local::now()))).map_err(|source| {
        EngineError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::command::schemas;
    use crate::engine::config::QueueConfigBuilder;
    use crate::engine::testing::{ScriptedBackend, Step, died, finished, started};
    use std::io;
    use tempfile::tempdir;

    fn queue(dir: &Path, steps: Vec<Step>) -> JobQueue<ScriptedBackend> {
        let config = QueueConfigBuilder::new()
            .name("stage1")
            .available_cpus(2)
            .workdir(dir)
            .build()
            .unwrap();
        JobQueue::new(config, ScriptedBackend::new(steps)).with_output(Box::new(io::sink()))
    }

    fn commands(names: &[&str]) -> Vec<Command> {
        names
            .iter()
            .map(|n| {
                schemas::macromodel()
                    .builder()
                    .input_file(format!("{}.com", n))
                    .build()
                    .unwrap()
            })
            .collect()
    }

    fn clean_run() -> Vec<Step> {
        vec![
            Step::Batch(vec![started(0), started(1)]),
            Step::Batch(vec![finished(1), finished(0)]),
        ]
    }

    #[test]
    fn clean_run_creates_marker_and_report() {
        let dir = tempdir().unwrap();
        let options = BatchOptions {
            marker: Some(dir.path().join(".stage1.done")),
            report: Some(dir.path().join("report.csv")),
        };
        let mut q = queue(dir.path(), clean_run());
        let result = run(&mut q, commands(&["a", "b"]), &options).unwrap();

        assert!(result.is_success());
        assert!(!result.skipped);
        assert_eq!(result.counts.done, 2);
        assert!(dir.path().join(".stage1.done").exists());

        let report = fs::read_to_string(dir.path().join("report.csv")).unwrap();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(
            lines[0],
            "name,status,backend_id,start_time,end_time,elapsed_seconds"
        );
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("a,finished,pid-0,"));
        assert!(lines[2].starts_with("b,finished,pid-1,"));
    }

    #[test]
    fn existing_marker_skips_the_batch() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join(".stage1.done");
        fs::write(&marker, "").unwrap();
        let options = BatchOptions {
            marker: Some(marker),
            report: None,
        };
        let mut q = queue(dir.path(), clean_run());
        let result = run(&mut q, commands(&["a", "b"]), &options).unwrap();

        assert!(result.skipped);
        assert!(result.is_success());
        assert_eq!(q.njobs(), 0);
        assert_eq!(q.status(), QueueStatus::Unset);
    }

    #[test]
    fn failed_jobs_leave_no_marker() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join(".stage1.done");
        let options = BatchOptions {
            marker: Some(marker.clone()),
            report: None,
        };
        let mut q = queue(
            dir.path(),
            vec![
                Step::Batch(vec![started(0), started(1)]),
                Step::Batch(vec![died(0), finished(1)]),
            ],
        );
        let result = run(&mut q, commands(&["a", "b"]), &options).unwrap();

        assert_eq!(result.queue_status, QueueStatus::Finished);
        assert_eq!(result.counts.failed, 1);
        assert!(!result.is_success());
        assert!(!marker.exists());
        assert_eq!(result.jobs[0].status, JobStatus::Died);
    }

    #[test]
    fn pending_jobs_report_empty_times() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let cmd = commands(&["solo"]).remove(0);
        let job = Job::new(cmd);
        write_report(&path, &[JobSummary::from(&job)]).unwrap();
        let report = fs::read_to_string(&path).unwrap();
        assert_eq!(report.lines().nth(1), Some("solo,pending,,,,0.0"));
    }
}
