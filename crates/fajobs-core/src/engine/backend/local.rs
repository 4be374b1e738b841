use super::{JobBackend, JobHandle, JobSubmission, StatusUpdate};
use crate::engine::error::BackendError;
use crate::engine::job::JobStatus;
use std::collections::{BTreeMap, VecDeque};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

struct RunningJob {
    name: String,
    child: Child,
}

/// Runs jobs as child processes of the current process.
///
/// Output of each job goes to `<jobname>.log` in the working directory unless
/// capture is disabled, in which case the job inherits the terminal. Setting the
/// cancel flag makes the next [`JobBackend::wait_for_updates`] call fail with
/// [`BackendError::Interrupted`].
pub struct LocalBackend {
    workdir: PathBuf,
    capture_output: bool,
    poll_interval: Duration,
    cancel: Arc<AtomicBool>,
    max_running: usize,
    pending: VecDeque<JobSubmission>,
    running: BTreeMap<JobHandle, RunningJob>,
}

impl LocalBackend {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            capture_output: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cancel: Arc::new(AtomicBool::new(false)),
            max_running: 1,
            pending: VecDeque::new(),
            running: BTreeMap::new(),
        }
    }

    pub fn capture_output(mut self, capture: bool) -> Self {
        self.capture_output = capture;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Shares an externally owned cancel flag, e.g. one set by a signal handler.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    fn log_path(&self, name: &str) -> PathBuf {
        self.workdir.join(format!("{}.log", name))
    }

    fn spawn(&self, job: &JobSubmission) -> io::Result<Child> {
        let (program, args) = job
            .args
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command line"))?;

        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null());
        if self.capture_output {
            let log = File::create(self.log_path(&job.name))?;
            command.stdout(log.try_clone()?).stderr(log);
        }
        command.spawn()
    }

    fn record_spawn_failure(&self, job: &JobSubmission, err: &io::Error) {
        if !self.capture_output {
            return;
        }
        let written = File::create(self.log_path(&job.name)).and_then(|mut log| {
            writeln!(log, "Failed to launch '{}': {}", job.args.join(" "), err)
        });
        if let Err(e) = written {
            debug!(job = %job.name, error = %e, "Could not write launch failure to log");
        }
    }

    fn reap(&mut self, updates: &mut Vec<StatusUpdate>) -> Result<(), BackendError> {
        let mut exited = Vec::new();
        for (handle, job) in self.running.iter_mut() {
            let status = job.child.try_wait().map_err(|source| BackendError::Poll {
                job: job.name.clone(),
                source,
            })?;
            if let Some(status) = status {
                let outcome = if status.success() {
                    JobStatus::Finished
                } else {
                    JobStatus::Died
                };
                debug!(job = %job.name, %status, "Process exited");
                exited.push((*handle, outcome));
            }
        }
        for (handle, outcome) in exited {
            if let Some(job) = self.running.remove(&handle) {
                updates.push(
                    StatusUpdate::new(handle, outcome).with_backend_id(job.child.id().to_string()),
                );
            }
        }
        Ok(())
    }

    fn launch(&mut self, updates: &mut Vec<StatusUpdate>) {
        while self.running.len() < self.max_running {
            let Some(job) = self.pending.pop_front() else {
                break;
            };
            match self.spawn(&job) {
                Ok(child) => {
                    let pid = child.id();
                    info!(job = %job.name, pid, "Launched job");
                    updates.push(
                        StatusUpdate::new(job.handle, JobStatus::Started)
                            .with_backend_id(pid.to_string()),
                    );
                    self.running.insert(
                        job.handle,
                        RunningJob {
                            name: job.name,
                            child,
                        },
                    );
                }
                Err(e) => {
                    warn!(job = %job.name, error = %e, "Failed to launch job");
                    self.record_spawn_failure(&job, &e);
                    updates.push(StatusUpdate::new(job.handle, JobStatus::Died));
                }
            }
        }
    }

    fn kill_running(handle: JobHandle, mut job: RunningJob) -> Result<(), BackendError> {
        match job.child.kill() {
            Ok(()) => {}
            // Already exited.
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => {}
            Err(source) => {
                return Err(BackendError::Kill {
                    job: job.name,
                    source,
                });
            }
        }
        job.child.wait().map_err(|source| BackendError::Kill {
            job: job.name.clone(),
            source,
        })?;
        debug!(job = %job.name, %handle, "Killed job");
        Ok(())
    }
}

impl JobBackend for LocalBackend {
    #[instrument(skip_all, fields(jobs = jobs.len(), max_simultaneous_jobs = max_simultaneous_jobs))]
    fn setup(
        &mut self,
        jobs: Vec<JobSubmission>,
        max_simultaneous_jobs: usize,
    ) -> Result<(), BackendError> {
        if max_simultaneous_jobs == 0 {
            return Err(BackendError::Setup(
                "at least one job must be allowed to run".to_string(),
            ));
        }
        if !self.workdir.is_dir() {
            return Err(BackendError::Setup(format!(
                "working directory '{}' does not exist",
                self.workdir.display()
            )));
        }
        self.max_running = max_simultaneous_jobs;
        self.pending = jobs.into();
        self.running.clear();
        Ok(())
    }

    fn wait_for_updates(&mut self) -> Result<Option<Vec<StatusUpdate>>, BackendError> {
        loop {
            if self.cancel.load(Ordering::SeqCst) {
                return Err(BackendError::Interrupted);
            }

            let mut updates = Vec::new();
            self.reap(&mut updates)?;
            self.launch(&mut updates);

            if !updates.is_empty() {
                return Ok(Some(updates));
            }
            if self.running.is_empty() && self.pending.is_empty() {
                return Ok(None);
            }
            thread::sleep(self.poll_interval);
        }
    }

    fn kill(&mut self, handle: JobHandle) -> Result<(), BackendError> {
        self.pending.retain(|job| job.handle != handle);
        match self.running.remove(&handle) {
            Some(job) => Self::kill_running(handle, job),
            None => Ok(()),
        }
    }

    fn kill_all(&mut self) -> Result<(), BackendError> {
        self.pending.clear();
        let mut first_error = None;
        for (handle, job) in std::mem::take(&mut self.running) {
            if let Err(e) = Self::kill_running(handle, job) {
                warn!(error = %e, "Failed to kill job");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for LocalBackend {
    fn drop(&mut self) {
        if !self.running.is_empty() {
            warn!(
                count = self.running.len(),
                "Local backend dropped with running jobs, killing them"
            );
            let _ = self.kill_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn sh(handle: usize, name: &str, script: &str) -> JobSubmission {
        JobSubmission {
            handle: JobHandle(handle),
            name: name.to_string(),
            args: vec!["sh".into(), "-c".into(), script.into()],
        }
    }

    fn backend(dir: &Path) -> LocalBackend {
        LocalBackend::new(dir).poll_interval(Duration::from_millis(10))
    }

    fn drain(backend: &mut LocalBackend) -> Vec<Vec<StatusUpdate>> {
        let mut batches = Vec::new();
        while let Some(batch) = backend.wait_for_updates().unwrap() {
            batches.push(batch);
        }
        batches
    }

    #[test]
    fn exit_codes_map_to_finished_and_died() {
        let dir = tempdir().unwrap();
        let mut backend = backend(dir.path());
        backend
            .setup(vec![sh(0, "ok", "exit 0"), sh(1, "bad", "exit 3")], 2)
            .unwrap();

        let updates: Vec<StatusUpdate> = drain(&mut backend).into_iter().flatten().collect();
        let final_status = |h: usize| {
            updates
                .iter()
                .filter(|u| u.handle == JobHandle(h))
                .map(|u| u.status)
                .last()
        };
        assert_eq!(final_status(0), Some(JobStatus::Finished));
        assert_eq!(final_status(1), Some(JobStatus::Died));
        assert_eq!(updates.len(), 4);
        assert!(updates.iter().all(|u| u.backend_id.is_some()));
    }

    #[test]
    fn admission_limit_caps_running_processes() {
        let dir = tempdir().unwrap();
        let mut backend = backend(dir.path());
        let jobs = (0..3).map(|i| sh(i, &format!("j{}", i), "sleep 0.05")).collect();
        backend.setup(jobs, 1).unwrap();

        let mut active = 0usize;
        for batch in drain(&mut backend) {
            for update in batch {
                match update.status {
                    JobStatus::Started => active += 1,
                    _ => active -= 1,
                }
                assert!(active <= 1);
            }
            assert!(backend.running_count() <= 1);
        }
        assert_eq!(active, 0);
    }

    #[test]
    fn output_is_captured_in_the_job_log() {
        let dir = tempdir().unwrap();
        let mut backend = backend(dir.path());
        backend
            .setup(vec![sh(0, "talker", "echo out; echo err 1>&2")], 1)
            .unwrap();
        drain(&mut backend);
        let log = fs::read_to_string(dir.path().join("talker.log")).unwrap();
        assert!(log.contains("out"));
        assert!(log.contains("err"));
    }

    #[test]
    fn spawn_failure_reports_died_and_writes_the_error_to_the_log() {
        let dir = tempdir().unwrap();
        let mut backend = backend(dir.path());
        let job = JobSubmission {
            handle: JobHandle(0),
            name: "ghost".into(),
            args: vec!["./definitely-not-a-program".into()],
        };
        backend.setup(vec![job], 1).unwrap();
        let batches = drain(&mut backend);
        assert_eq!(batches, vec![vec![StatusUpdate::new(JobHandle(0), JobStatus::Died)]]);
        let log = fs::read_to_string(dir.path().join("ghost.log")).unwrap();
        assert!(log.starts_with("Failed to launch './definitely-not-a-program'"));
    }

    #[test]
    fn cancel_flag_interrupts_the_wait() {
        let dir = tempdir().unwrap();
        let mut backend = backend(dir.path());
        backend.setup(vec![sh(0, "long", "sleep 30")], 1).unwrap();
        let started = backend.wait_for_updates().unwrap().unwrap();
        assert_eq!(started[0].status, JobStatus::Started);

        backend.cancel_flag().store(true, Ordering::SeqCst);
        let err = backend.wait_for_updates().unwrap_err();
        assert!(err.is_interrupt());

        backend.kill_all().unwrap();
        assert_eq!(backend.running_count(), 0);
    }

    #[test]
    fn kill_is_idempotent_and_silences_the_job() {
        let dir = tempdir().unwrap();
        let mut backend = backend(dir.path());
        backend.setup(vec![sh(0, "long", "sleep 30")], 1).unwrap();
        backend.wait_for_updates().unwrap();

        backend.kill(JobHandle(0)).unwrap();
        backend.kill(JobHandle(0)).unwrap();
        backend.kill(JobHandle(42)).unwrap();
        assert_eq!(backend.wait_for_updates().unwrap(), None);
    }

    #[test]
    fn setup_rejects_a_missing_workdir() {
        let dir = tempdir().unwrap();
        let mut backend = LocalBackend::new(dir.path().join("nope"));
        let err = backend.setup(vec![sh(0, "a", "true")], 1).unwrap_err();
        assert!(matches!(err, BackendError::Setup(_)));
    }
}
