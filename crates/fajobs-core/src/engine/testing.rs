//! Test doubles for the engine: a scripted backend, a recording mail transport and
//! a shared output buffer.

use super::backend::{JobBackend, JobHandle, JobSubmission, StatusUpdate};
use super::error::BackendError;
use super::job::JobStatus;
use super::mail::{MailError, MailTransport};
use std::collections::{BTreeSet, VecDeque};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

pub(crate) fn started(handle: usize) -> StatusUpdate {
    StatusUpdate::new(JobHandle(handle), JobStatus::Started)
        .with_backend_id(format!("pid-{}", handle))
}

pub(crate) fn finished(handle: usize) -> StatusUpdate {
    StatusUpdate::new(JobHandle(handle), JobStatus::Finished)
}

pub(crate) fn died(handle: usize) -> StatusUpdate {
    StatusUpdate::new(JobHandle(handle), JobStatus::Died)
}

pub(crate) enum Step {
    Batch(Vec<StatusUpdate>),
    Interrupt,
    Fail(String),
}

/// Replays a fixed sequence of poll results.
pub(crate) struct ScriptedBackend {
    script: VecDeque<Step>,
    running: BTreeSet<JobHandle>,
    killed: Vec<JobHandle>,
    setup_calls: Vec<(usize, usize)>,
}

impl ScriptedBackend {
    pub(crate) fn new(steps: Vec<Step>) -> Self {
        Self {
            script: steps.into(),
            running: BTreeSet::new(),
            killed: Vec::new(),
            setup_calls: Vec::new(),
        }
    }

    pub(crate) fn killed(&self) -> &[JobHandle] {
        &self.killed
    }

    /// `(number of jobs, max simultaneous jobs)` per setup call.
    pub(crate) fn setup_calls(&self) -> &[(usize, usize)] {
        &self.setup_calls
    }
}

impl JobBackend for ScriptedBackend {
    fn setup(
        &mut self,
        jobs: Vec<JobSubmission>,
        max_simultaneous_jobs: usize,
    ) -> Result<(), BackendError> {
        self.setup_calls.push((jobs.len(), max_simultaneous_jobs));
        Ok(())
    }

    fn wait_for_updates(&mut self) -> Result<Option<Vec<StatusUpdate>>, BackendError> {
        match self.script.pop_front() {
            None => Ok(None),
            Some(Step::Interrupt) => Err(BackendError::Interrupted),
            Some(Step::Fail(msg)) => Err(BackendError::Other(msg)),
            Some(Step::Batch(batch)) => {
                for update in &batch {
                    if update.status == JobStatus::Started {
                        self.running.insert(update.handle);
                    } else {
                        self.running.remove(&update.handle);
                    }
                }
                Ok(Some(batch))
            }
        }
    }

    fn kill(&mut self, handle: JobHandle) -> Result<(), BackendError> {
        if self.running.remove(&handle) {
            self.killed.push(handle);
        }
        Ok(())
    }

    fn kill_all(&mut self) -> Result<(), BackendError> {
        self.killed.extend(std::mem::take(&mut self.running));
        self.script.clear();
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SentMail {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Default)]
struct MailerState {
    sent: Vec<SentMail>,
    attempts: usize,
}

/// Captures mail instead of sending it.
#[derive(Debug, Clone)]
pub(crate) struct RecordingMailer {
    state: Arc<Mutex<MailerState>>,
    online: bool,
    failing: bool,
}

impl RecordingMailer {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::default(),
            online: true,
            failing: false,
        }
    }

    /// Reports that it has no credentials.
    pub(crate) fn offline() -> Self {
        Self {
            online: false,
            ..Self::new()
        }
    }

    /// Accepts every message and then fails to deliver it.
    pub(crate) fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new()
        }
    }

    pub(crate) fn sent(&self) -> Vec<SentMail> {
        self.state.lock().unwrap().sent.clone()
    }

    pub(crate) fn attempts(&self) -> usize {
        self.state.lock().unwrap().attempts
    }
}

impl MailTransport for RecordingMailer {
    fn can_send(&self) -> bool {
        self.online
    }

    fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let mut state = self.state.lock().unwrap();
        state.attempts += 1;
        if self.failing {
            return Err(MailError::MissingCredentials {
                server: "smtp.test".into(),
            });
        }
        state.sent.push(SentMail {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// A cloneable in-memory sink.
#[derive(Debug, Clone, Default)]
pub(crate) struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
