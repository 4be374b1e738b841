//! Job-control backends.
//!
//! A backend owns the native handles of the jobs it runs. The queue hands it every
//! job up front through [`JobBackend::setup`] together with the admission limit,
//! then repeatedly blocks in [`JobBackend::wait_for_updates`] until the backend has
//! observed at least one status change. That call is the only place the queue ever
//! waits.

pub mod local;

pub use local::LocalBackend;

use super::error::BackendError;
use super::job::JobStatus;
use std::fmt;

/// Position of a job in its queue; the key that binds a backend job to a queue job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobHandle(pub usize);

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a backend needs to know to run one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSubmission {
    pub handle: JobHandle,
    pub name: String,
    /// Program followed by its arguments.
    pub args: Vec<String>,
}

/// A status change observed by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub handle: JobHandle,
    pub status: JobStatus,
    /// Backend-native identifier, e.g. a process id.
    pub backend_id: Option<String>,
}

impl StatusUpdate {
    pub fn new(handle: JobHandle, status: JobStatus) -> Self {
        Self {
            handle,
            status,
            backend_id: None,
        }
    }

    pub fn with_backend_id(mut self, id: impl Into<String>) -> Self {
        self.backend_id = Some(id.into());
        self
    }
}

pub trait JobBackend {
    /// Registers every job of the queue. Nothing needs to run yet.
    fn setup(
        &mut self,
        jobs: Vec<JobSubmission>,
        max_simultaneous_jobs: usize,
    ) -> Result<(), BackendError>;

    /// Launches jobs within the admission limit and blocks until at least one
    /// status change occurs. Returns `Ok(None)` once every job has terminated.
    ///
    /// Updates must be returned in the order the backend observed them.
    fn wait_for_updates(&mut self) -> Result<Option<Vec<StatusUpdate>>, BackendError>;

    /// Kills one job. Killing a job that is not running is a no-op.
    fn kill(&mut self, handle: JobHandle) -> Result<(), BackendError>;

    /// Kills every running job and drops the ones not yet launched.
    fn kill_all(&mut self) -> Result<(), BackendError>;
}
