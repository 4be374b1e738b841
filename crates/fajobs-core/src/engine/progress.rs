use super::job::JobStatus;
use super::queue::{JobCount, QueueStatus};

#[derive(Debug, Clone)]
pub enum Progress {
    QueueStart {
        name: String,
        total_jobs: usize,
    },
    /// A job changed status; `counts` already reflects the change.
    JobUpdate {
        name: String,
        status: JobStatus,
        counts: JobCount,
    },
    QueueFinish {
        status: QueueStatus,
    },
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}
