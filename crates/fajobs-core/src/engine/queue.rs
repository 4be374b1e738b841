use super::backend::{JobBackend, JobHandle, JobSubmission, StatusUpdate};
use super::config::QueueConfig;
use super::error::{BackendError, EngineError, format_error_chain};
use super::job::{Job, JobStatus};
use super::notification::{
    LOG_EXCERPT_LINES, NotificationDetail, NotificationInfo, Notifier, Placeholder, hostname,
};
use super::progress::{Progress, ProgressReporter};
use crate::core::command::Command;
use crate::core::table::{Alignment, Table, TableColumn, TableStyle};
use crate::core::utils::duration::{DurationStyle, ctime, format_duration, short_timestamp};
use crate::core::utils::text::indent;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::io::{self, Write};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    #[default]
    Unset,
    Started,
    Finished,
    Aborted,
}

impl QueueStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            QueueStatus::Unset => "unset",
            QueueStatus::Started => "started",
            QueueStatus::Finished => "finished",
            QueueStatus::Aborted => "aborted",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, QueueStatus::Finished | QueueStatus::Aborted)
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Jobs per state bucket; the four buckets always add up to the number of jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct JobCount {
    pub done: usize,
    pub active: usize,
    pub pending: usize,
    pub failed: usize,
}

impl JobCount {
    pub fn total(&self) -> usize {
        self.done + self.active + self.pending + self.failed
    }
}

#[derive(Debug, Clone, Copy)]
struct Clock {
    instant: Instant,
    wall: DateTime<Local>,
}

impl Clock {
    fn now() -> Self {
        Self {
            instant: Instant::now(),
            wall: Local::now(),
        }
    }
}

const LEGEND: &str = "\
 C: Number of completed subjobs.
 A: Number of active subjobs (e.g., submitted, running).
 P: Number of pending/waiting subjobs.
 F: Number of failed (aka, died) subjobs.";

/// A fixed set of jobs run to completion under a CPU budget.
///
/// Jobs are added before [`JobQueue::run_and_wait`]; the run drives the backend,
/// streams a status table to the output sink, and sends notifications as jobs
/// change state. A queue runs once: it moves from `unset` to `started` and then to
/// exactly one of `finished` or `aborted`.
pub struct JobQueue<B: JobBackend> {
    config: QueueConfig,
    backend: B,
    notifier: Notifier,
    jobs: Vec<Job>,
    status: QueueStatus,
    started: Option<Clock>,
    ended: Option<Clock>,
    table: Option<Table>,
    killed: usize,
    out: Box<dyn Write + Send>,
    reporter: ProgressReporter<'static>,
}

impl<B: JobBackend> JobQueue<B> {
    pub fn new(config: QueueConfig, backend: B) -> Self {
        Self {
            config,
            backend,
            notifier: Notifier::disabled(),
            jobs: Vec::new(),
            status: QueueStatus::Unset,
            started: None,
            ended: None,
            table: None,
            killed: 0,
            out: Box::new(io::stdout()),
            reporter: ProgressReporter::new(),
        }
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Sink for the header, the status table and the footer. Defaults to stdout.
    pub fn with_output(mut self, out: Box<dyn Write + Send>) -> Self {
        self.out = out;
        self
    }

    pub fn with_reporter(mut self, reporter: ProgressReporter<'static>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn status(&self) -> QueueStatus {
        self.status
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn njobs(&self) -> usize {
        self.jobs.len()
    }

    pub fn table(&self) -> Option<&Table> {
        self.table.as_ref()
    }

    pub fn total_cpu(&self) -> usize {
        self.config.total_cpu
    }

    pub fn cpu_per_job(&self) -> usize {
        self.config.cpu_per_job
    }

    pub fn max_simultaneous_jobs(&self) -> usize {
        self.config.max_simultaneous_jobs()
    }

    /// Appends a job. Fails once the queue has started.
    pub fn add_job(&mut self, command: Command) -> Result<JobHandle, EngineError> {
        if self.status != QueueStatus::Unset {
            return Err(EngineError::QueueStarted(self.config.name.clone()));
        }
        let handle = JobHandle(self.jobs.len());
        debug!(job = command.jobname(), %handle, "Adding job to queue");
        self.jobs
            .push(Job::new(command).with_workdir(&self.config.workdir));
        Ok(handle)
    }

    pub fn jobs_with_status(&self, statuses: &[JobStatus]) -> Vec<&Job> {
        self.jobs
            .iter()
            .filter(|job| statuses.contains(&job.status()))
            .collect()
    }

    pub fn active_jobs(&self) -> Vec<&Job> {
        self.jobs_with_status(&[JobStatus::Started])
    }

    pub fn done_jobs(&self) -> Vec<&Job> {
        self.jobs_with_status(&[JobStatus::Finished])
    }

    pub fn pending_jobs(&self) -> Vec<&Job> {
        self.jobs_with_status(&[JobStatus::Pending])
    }

    pub fn failed_jobs(&self) -> Vec<&Job> {
        self.jobs_with_status(&[JobStatus::Aborted, JobStatus::Died])
    }

    pub fn job_count(&self) -> JobCount {
        self.jobs
            .iter()
            .fold(JobCount::default(), |mut count, job| {
                match job.status() {
                    JobStatus::Finished => count.done += 1,
                    JobStatus::Started => count.active += 1,
                    JobStatus::Pending => count.pending += 1,
                    JobStatus::Aborted | JobStatus::Died => count.failed += 1,
                }
                count
            })
    }

    /// Zero before the run, growing while it runs, frozen once it ends.
    pub fn elapsed(&self) -> Duration {
        match (self.started, self.ended) {
            (None, _) => Duration::ZERO,
            (Some(start), None) => start.instant.elapsed(),
            (Some(start), Some(end)) => end.instant.saturating_duration_since(start.instant),
        }
    }

    /// Runs every job and blocks until the queue terminates.
    ///
    /// Returns the terminal status. Dead jobs do not stop the queue. An operator
    /// interrupt kills the active jobs and yields `Ok(Aborted)`; any other backend
    /// failure kills the active jobs too and is returned as an error once the footer
    /// and the queue notification are out.
    #[instrument(skip(self), fields(queue = %self.config.name, jobs = self.jobs.len()))]
    pub fn run_and_wait(&mut self) -> Result<QueueStatus, EngineError> {
        if self.status != QueueStatus::Unset {
            return Err(EngineError::QueueConsumed(self.config.name.clone()));
        }

        // Jobs aborted before the run stay out of the backend.
        let submissions = self
            .jobs
            .iter()
            .enumerate()
            .filter(|(_, job)| job.status() == JobStatus::Pending)
            .map(|(i, job)| JobSubmission {
                handle: JobHandle(i),
                name: job.name().to_string(),
                args: job.command().args(),
            })
            .collect();
        self.backend
            .setup(submissions, self.config.max_simultaneous_jobs())?;

        self.initialize_table();
        self.print_header();

        self.started = Some(Clock::now());
        self.status = QueueStatus::Started;
        info!(
            max_simultaneous_jobs = self.config.max_simultaneous_jobs(),
            "Job queue started"
        );
        self.reporter.report(Progress::QueueStart {
            name: self.config.name.clone(),
            total_jobs: self.jobs.len(),
        });

        let (result, traceback) = match self.launch_and_wait() {
            Ok(()) => {
                self.status = QueueStatus::Finished;
                (Ok(QueueStatus::Finished), String::new())
            }
            Err(err) => self.handle_error(err),
        };

        self.ended = Some(Clock::now());
        self.print_footer();
        info!(status = %self.status, elapsed = ?self.elapsed(), "Job queue ended");
        self.reporter.report(Progress::QueueFinish {
            status: self.status,
        });
        self.notify_queue(traceback);
        result
    }

    fn launch_and_wait(&mut self) -> Result<(), BackendError> {
        while let Some(updates) = self.backend.wait_for_updates()? {
            for update in updates {
                self.update_job_status(update);
            }
        }
        Ok(())
    }

    fn handle_error(&mut self, err: BackendError) -> (Result<QueueStatus, EngineError>, String) {
        let traceback = indent(&format_error_chain(&err), "    ");
        self.abort(None);
        self.status = QueueStatus::Aborted;
        if err.is_interrupt() {
            warn!("Job execution interrupted");
            self.emit("\nJob execution interrupted. All active jobs were killed.");
            (Ok(QueueStatus::Aborted), traceback)
        } else {
            error!(error = %err, "Job execution halted");
            self.emit("\nSomething went wrong. Halting job execution.");
            (Err(err.into()), traceback)
        }
    }

    fn update_job_status(&mut self, update: StatusUpdate) {
        let index = update.handle.0;
        let Some(job) = self.jobs.get_mut(index) else {
            warn!(handle = %update.handle, "Status update for an unknown job");
            return;
        };
        if job.is_terminal() {
            warn!(
                job = job.name(),
                status = %job.status(),
                new_status = %update.status,
                "Ignoring status change of a terminated job"
            );
            return;
        }
        if let Some(id) = update.backend_id {
            job.set_backend_id(id);
        }
        job.update(update.status);
        debug!(job = job.name(), status = %update.status, "Job status changed");
        if job.did_fail() {
            let removed = job.clean_failed_output();
            if removed > 0 {
                info!(job = job.name(), removed, "Removed failed output files");
            }
        }

        self.record_job(index);
        self.notify_job(index);
    }

    /// Kills one job, or every active job when `handle` is `None`, and marks them
    /// aborted. Safe to call repeatedly; returns how many jobs were killed.
    pub fn abort(&mut self, handle: Option<JobHandle>) -> usize {
        let targets: Vec<usize> = match handle {
            Some(h) => {
                if let Err(e) = self.backend.kill(h) {
                    warn!(error = %e, "Failed to kill job");
                }
                self.jobs
                    .get(h.0)
                    .filter(|job| !job.is_terminal())
                    .map(|_| h.0)
                    .into_iter()
                    .collect()
            }
            None => {
                if let Err(e) = self.backend.kill_all() {
                    warn!(error = %e, "Failed to kill every active job");
                }
                self.jobs
                    .iter()
                    .enumerate()
                    .filter(|(_, job)| job.status() == JobStatus::Started)
                    .map(|(i, _)| i)
                    .collect()
            }
        };

        for &index in &targets {
            self.jobs[index].update(JobStatus::Aborted);
            self.record_job(index);
        }
        if !targets.is_empty() {
            info!(count = targets.len(), "Aborted jobs");
        }
        self.killed += targets.len();
        targets.len()
    }

    fn record_job(&mut self, index: usize) {
        let counts = self.job_count();
        let job = &self.jobs[index];
        let time = if job.is_terminal() {
            format_duration(job.elapsed(), DurationStyle::Short, None)
        } else {
            job.start_time()
                .map(|t| short_timestamp(&t))
                .unwrap_or_default()
        };
        let row = vec![
            counts.done.to_string(),
            counts.active.to_string(),
            counts.pending.to_string(),
            counts.failed.to_string(),
            job.status().to_string(),
            job.name().to_string(),
            time,
            job.backend_id().unwrap_or_default().to_string(),
        ];
        let event = Progress::JobUpdate {
            name: job.name().to_string(),
            status: job.status(),
            counts,
        };
        if let Some(line) = self.table.as_mut().map(|table| table.add_row(row)) {
            self.emit(&line);
        }
        self.reporter.report(event);
    }

    fn initialize_table(&mut self) {
        let ndigits = self.jobs.len().to_string().len();
        let name_width = self
            .jobs
            .iter()
            .map(|job| job.name().chars().count())
            .max()
            .unwrap_or(0);
        let mut columns: Vec<TableColumn> = ["C", "A", "P", "F"]
            .into_iter()
            .map(|h| TableColumn::new(h, ndigits))
            .collect();
        columns.push(TableColumn::new("Status", 8));
        columns.push(TableColumn::new("Jobname", name_width));
        columns.push(TableColumn::new("Time", 12).align(Alignment::Right));
        columns.push(TableColumn::new("Info", 4));
        self.table = Some(Table::new(columns, TableStyle::CONDENSED));
    }

    fn print_header(&mut self) {
        let header = format!(
            "Job queue starting at {date}.\n\
             \n\
             Queue parameters\n\
             ----------------\n\
             Number of jobs           : {total}\n\
             Number of available cpus : {cpu}\n\
             Cpus per job             : {cpu_per_job}\n\
             Max. simultaneous jobs   : {max_jobs}\n\
             Notifications            : {notification}\n\
             \n\
             Starting jobs...\n\
             {legend}\n",
            date = ctime(&Local::now()),
            total = self.jobs.len(),
            cpu = self.config.total_cpu,
            cpu_per_job = self.config.cpu_per_job,
            max_jobs = self.config.max_simultaneous_jobs(),
            notification = self.notifier.describe(),
            legend = LEGEND,
        );
        self.emit(&header);
        let lines = self
            .table
            .as_ref()
            .map(Table::header_lines)
            .unwrap_or_default();
        for line in lines {
            self.emit(&line);
        }
    }

    fn print_footer(&mut self) {
        let aborted = self.status == QueueStatus::Aborted;
        let counts = self.job_count();
        let mut footer: Vec<String> = self
            .table
            .as_ref()
            .map(Table::footer_lines)
            .unwrap_or_default();
        footer.push(format!(
            "\nAll jobs {} terminated.\n\
             {} of {} job(s) succeeded; {} job(s) failed.\n\
             Total run time about {}.\n\
             \n\
             Job queue ended {} at {}.",
            if aborted { "were" } else { "have" },
            counts.done,
            self.jobs.len(),
            counts.failed,
            format_duration(self.elapsed(), DurationStyle::Long, Some(2)),
            if aborted { "abnormally" } else { "normally" },
            ctime(&self.ended.map_or_else(Local::now, |c| c.wall)),
        ));
        for line in footer {
            self.emit(&line);
        }
    }

    fn notify_job(&self, index: usize) {
        let job = &self.jobs[index];
        let Some(placeholder) = self.notifier.select(self.status, Some(job.status())) else {
            return;
        };

        let log_excerpt = if placeholder == Placeholder::JobFailed {
            match job.log_excerpt(-LOG_EXCERPT_LINES) {
                Ok(text) => Some(indent(&text, "    ")),
                Err(e) => {
                    debug!(job = job.name(), error = %e, "Job log unavailable for notification");
                    None
                }
            }
        } else {
            None
        };
        let elapsed = (job.is_terminal() && !job.did_fail()).then(|| {
            format!(
                "Job took about {} on {} processor(s).\n",
                format_duration(job.elapsed(), DurationStyle::Long, Some(2)),
                self.config.cpu_per_job
            )
        });
        let date = job
            .end_time()
            .filter(|_| job.is_terminal())
            .or(job.start_time())
            .unwrap_or_else(Local::now);

        let info = self.notification_info(
            ctime(&date),
            NotificationDetail::Job {
                name: job.name().to_string(),
                status: job.status(),
                elapsed,
                log_excerpt,
            },
        );
        self.notifier.send(placeholder, &info);
    }

    fn notify_queue(&self, traceback: String) {
        let Some(placeholder) = self.notifier.select(self.status, None) else {
            return;
        };
        let date = self.ended.map_or_else(Local::now, |c| c.wall);
        let info = self.notification_info(
            ctime(&date),
            NotificationDetail::Queue {
                elapsed: format_duration(self.elapsed(), DurationStyle::Long, Some(2)),
                cpu: self.config.total_cpu,
                failed_jobs: self
                    .failed_jobs()
                    .iter()
                    .map(|job| job.name().to_string())
                    .collect(),
                traceback,
            },
        );
        self.notifier.send(placeholder, &info);
    }

    fn notification_info(&self, date: String, detail: NotificationDetail) -> NotificationInfo {
        NotificationInfo {
            queue: self.config.name.clone(),
            host: hostname(),
            date,
            counts: self.job_count(),
            total: self.jobs.len(),
            killed: self.killed,
            detail,
        }
    }

    /// Writes one line to the output sink; write errors are logged and ignored.
    fn emit(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{}", line).and_then(|_| self.out.flush()) {
            debug!(error = %e, "Failed to write queue output");
        }
    }
}
