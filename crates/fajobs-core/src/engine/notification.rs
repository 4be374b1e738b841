//! Email notifications on queue and job state transitions.
//!
//! [`select_template`] is the whole policy: a pure decision over the queue state,
//! the job state (if a job changed) and the configured [`NotificationLevel`].
//! [`Notifier`] couples that policy with a recipient and a [`MailTransport`].
//! Delivery failures are logged and swallowed so that they can never change the
//! outcome of a queue run.

use super::config::{ConfigError, QueueConfig};
use super::error::EngineError;
use super::job::JobStatus;
use super::mail::MailTransport;
use super::queue::{JobCount, QueueStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Verbosity tier, ordered from quietest to noisiest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    #[default]
    None,
    /// Queue terminal transitions only.
    Queue,
    /// Plus every job that dies.
    Failed,
    /// Plus every job status change.
    All,
}

impl NotificationLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            NotificationLevel::None => "none",
            NotificationLevel::Queue => "queue",
            NotificationLevel::Failed => "failed",
            NotificationLevel::All => "all",
        }
    }
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(NotificationLevel::None),
            "queue" => Ok(NotificationLevel::Queue),
            "failed" => Ok(NotificationLevel::Failed),
            "all" => Ok(NotificationLevel::All),
            other => Err(ConfigError::InvalidParameter {
                name: "notify",
                reason: format!(
                    "unknown level '{}', expected one of none, queue, failed, all",
                    other
                ),
            }),
        }
    }
}

/// The fixed catalog of notification templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    JobChanged,
    JobFailed,
    QueueAborted,
    QueueFinished,
}

impl Placeholder {
    pub const fn key(self) -> &'static str {
        match self {
            Placeholder::JobChanged => "job_changed",
            Placeholder::JobFailed => "job_failed",
            Placeholder::QueueAborted => "queue_aborted",
            Placeholder::QueueFinished => "queue_finished",
        }
    }

    pub fn subject(self, info: &NotificationInfo) -> String {
        match (self, &info.detail) {
            (Placeholder::JobChanged, NotificationDetail::Job { name, status, .. }) => {
                format!("Job {} {}", name, status)
            }
            (Placeholder::JobFailed, NotificationDetail::Job { name, .. }) => {
                format!("Job {} died", name)
            }
            (Placeholder::QueueAborted, _) => {
                format!("Job queue {} ended abnormally", info.queue)
            }
            (Placeholder::QueueFinished, _) => {
                format!("Job queue {} ended normally", info.queue)
            }
            (_, NotificationDetail::Queue { .. }) => format!("Job queue {}", info.queue),
        }
    }

    pub fn body(self, info: &NotificationInfo) -> String {
        let counts = &info.counts;
        let body = match (self, &info.detail) {
            (
                Placeholder::JobChanged,
                NotificationDetail::Job {
                    name,
                    status,
                    elapsed,
                    ..
                },
            ) => format!(
                "Subjob '{job}' of queue '{queue}' changed status to {title} at {date} on machine {host}.\n\
                 {elapsed}\n\
                 Queue status\n\
                 ------------\n\
                 Completed = {done}\n\
                 Failed    = {failed}\n\
                 Active    = {active}\n\
                 Pending   = {pending}\n\
                 Total     = {total}\n\
                 \n\
                 {signature}\n\
                 \n\
                 Note: these notifications, that is, when a subjob changes status, can be \
                 omitted by setting the notification level to anything but 'all'.\n",
                job = name,
                queue = info.queue,
                title = status.title(),
                date = info.date,
                host = info.host,
                elapsed = elapsed.as_deref().unwrap_or(""),
                done = counts.done,
                failed = counts.failed,
                active = counts.active,
                pending = counts.pending,
                total = info.total,
                signature = SIGNATURE,
            ),
            (Placeholder::JobFailed, NotificationDetail::Job { name, log_excerpt, .. }) => format!(
                "Sadly, subjob '{job}' of queue '{queue}' ended abnormally at {date} due to an \
                 unexpected internal error on machine {host}.\n\
                 No job control errors were found.\n\
                 \n\
                 Here are the last {lines} lines of '{job}.log':\n\
                 \n\
                 {excerpt}\n\
                 \n\
                 Due to technical problems, job restart is not supported.\n\
                 However, the next job should have started already.\n\
                 \n\
                 {signature}\n",
                job = name,
                queue = info.queue,
                date = info.date,
                host = info.host,
                lines = LOG_EXCERPT_LINES,
                excerpt = log_excerpt.as_deref().unwrap_or("    (log file unavailable)"),
                signature = SIGNATURE,
            ),
            (
                Placeholder::QueueAborted,
                NotificationDetail::Queue {
                    elapsed,
                    cpu,
                    traceback,
                    ..
                },
            ) => format!(
                "Something went wrong! Job queue '{queue}' aborted unexpectedly at {date} on \
                 machine {host}.\n\
                 \n\
                 So far, {done} of {total} job(s) succeeded; {failed} job(s) failed.\n\
                 Total run time was about {elapsed} on {cpu} processor(s).\n\
                 \n\
                 Here is the error that halted execution:\n\
                 \n\
                 {traceback}\n\
                 \n\
                 Due to technical problems, job restart is not supported.\n\
                 All active jobs ({killed}) were killed.\n\
                 \n\
                 {signature}\n",
                queue = info.queue,
                date = info.date,
                host = info.host,
                done = counts.done,
                total = info.total,
                failed = counts.failed,
                elapsed = elapsed,
                cpu = cpu,
                traceback = traceback,
                killed = info.killed,
                signature = SIGNATURE,
            ),
            (
                Placeholder::QueueFinished,
                NotificationDetail::Queue {
                    elapsed,
                    cpu,
                    failed_jobs,
                    ..
                },
            ) => {
                let failed_section = if failed_jobs.is_empty() {
                    String::new()
                } else {
                    let items: Vec<String> =
                        failed_jobs.iter().map(|j| format!("* {}.", j)).collect();
                    format!("\nFailed jobs:\n{}\n", items.join("\n"))
                };
                format!(
                    "Job queue '{queue}' has finished successfully at {date} on machine {host}.\n\
                     \n\
                     Summary\n\
                     =======\n\
                     {done} of {total} job(s) succeeded; {failed} job(s) failed.\n\
                     Total run time about {elapsed} on {cpu} processor(s).\n\
                     {failed_section}\n\
                     {signature}\n",
                    queue = info.queue,
                    date = info.date,
                    host = info.host,
                    done = counts.done,
                    total = info.total,
                    failed = counts.failed,
                    elapsed = elapsed,
                    cpu = cpu,
                    failed_section = failed_section,
                    signature = SIGNATURE,
                )
            }
            (placeholder, _) => {
                debug!(
                    template = placeholder.key(),
                    "Notification data does not match the template"
                );
                String::new()
            }
        };
        format!("Hi there,\n\n{}", body)
    }
}

const SIGNATURE: &str = "Best regards,\nfajobs queue.";

/// Number of trailing log lines included in a job failure email.
pub const LOG_EXCERPT_LINES: isize = 50;

/// Decides which template, if any, a transition should produce.
///
/// Queue-level terminal transitions take precedence over job-level ones.
pub fn select_template(
    queue: QueueStatus,
    job: Option<JobStatus>,
    level: NotificationLevel,
) -> Option<Placeholder> {
    if level == NotificationLevel::None {
        return None;
    }
    if level >= NotificationLevel::Queue {
        match queue {
            QueueStatus::Finished => return Some(Placeholder::QueueFinished),
            QueueStatus::Aborted => return Some(Placeholder::QueueAborted),
            QueueStatus::Unset | QueueStatus::Started => {}
        }
    }
    match job? {
        JobStatus::Died if level >= NotificationLevel::Failed => Some(Placeholder::JobFailed),
        _ if level >= NotificationLevel::All => Some(Placeholder::JobChanged),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationDetail {
    Job {
        name: String,
        status: JobStatus,
        /// "Job took about ..." line, present once the job is terminal.
        elapsed: Option<String>,
        /// Indented tail of the job log, present for dead jobs whose log is readable.
        log_excerpt: Option<String>,
    },
    Queue {
        elapsed: String,
        cpu: usize,
        failed_jobs: Vec<String>,
        traceback: String,
    },
}

/// Everything a template may refer to.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationInfo {
    pub queue: String,
    pub host: String,
    pub date: String,
    pub counts: JobCount,
    pub total: usize,
    /// Jobs killed by an abort.
    pub killed: usize,
    pub detail: NotificationDetail,
}

/// The machine's host name, or `localhost` if it cannot be read.
pub fn hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// A notification level bound to a recipient and a transport.
pub struct Notifier {
    level: NotificationLevel,
    recipient: Option<String>,
    transport: Option<Box<dyn MailTransport + Send>>,
}

impl Notifier {
    pub fn disabled() -> Self {
        Self {
            level: NotificationLevel::None,
            recipient: None,
            transport: None,
        }
    }

    /// Builds a notifier, downgrading to disabled when there is no recipient or the
    /// transport has no credentials. A recipient without `@` is rejected.
    pub fn new(
        level: NotificationLevel,
        recipient: Option<String>,
        transport: Box<dyn MailTransport + Send>,
    ) -> Result<Self, EngineError> {
        let Some(recipient) = recipient.filter(|_| level != NotificationLevel::None) else {
            return Ok(Self::disabled());
        };
        if !transport.can_send() {
            warn!(
                %level,
                "Mail credentials unavailable, notifications are disabled"
            );
            return Ok(Self::disabled());
        }
        if !recipient.contains('@') {
            return Err(EngineError::InvalidRecipient(recipient));
        }
        Ok(Self {
            level,
            recipient: Some(recipient),
            transport: Some(transport),
        })
    }

    pub fn from_config(
        config: &QueueConfig,
        transport: Box<dyn MailTransport + Send>,
    ) -> Result<Self, EngineError> {
        Self::new(config.notify_level, config.recipient.clone(), transport)
    }

    pub fn level(&self) -> NotificationLevel {
        self.level
    }

    pub fn recipient(&self) -> Option<&str> {
        self.recipient.as_deref()
    }

    /// `recipient (level)`, or `disabled`.
    pub fn describe(&self) -> String {
        match (&self.recipient, self.level) {
            (Some(recipient), level) if level != NotificationLevel::None => {
                format!("{} ({})", recipient, level)
            }
            _ => "disabled".to_string(),
        }
    }

    pub fn select(&self, queue: QueueStatus, job: Option<JobStatus>) -> Option<Placeholder> {
        select_template(queue, job, self.level)
    }

    /// Renders and sends `placeholder`. Failures are logged, never returned.
    pub fn send(&self, placeholder: Placeholder, info: &NotificationInfo) {
        let (Some(recipient), Some(transport)) = (&self.recipient, &self.transport) else {
            return;
        };
        let subject = placeholder.subject(info);
        let body = placeholder.body(info);
        debug!(template = placeholder.key(), %subject, "Sending notification");
        if let Err(e) = transport.send(recipient, &subject, &body) {
            warn!(template = placeholder.key(), error = %e, "Failed to send notification");
        }
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("level", &self.level)
            .field("recipient", &self.recipient)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::RecordingMailer;

    const LEVELS: [NotificationLevel; 4] = [
        NotificationLevel::None,
        NotificationLevel::Queue,
        NotificationLevel::Failed,
        NotificationLevel::All,
    ];

    fn job_info(status: JobStatus) -> NotificationInfo {
        NotificationInfo {
            queue: "dock".into(),
            host: "node1".into(),
            date: "Mon Mar  2 09:05:07 2026".into(),
            counts: JobCount {
                done: 1,
                active: 1,
                pending: 0,
                failed: 1,
            },
            total: 3,
            killed: 0,
            detail: NotificationDetail::Job {
                name: "lig1".into(),
                status,
                elapsed: Some("Job took about 5 seconds on 2 processor(s).\n".into()),
                log_excerpt: Some("    line 1\n    line 2".into()),
            },
        }
    }

    fn queue_info(failed_jobs: Vec<String>) -> NotificationInfo {
        NotificationInfo {
            detail: NotificationDetail::Queue {
                elapsed: "1 minute and 3 seconds".into(),
                cpu: 8,
                failed_jobs,
                traceback: "    Backend error: boom".into(),
            },
            killed: 2,
            ..job_info(JobStatus::Finished)
        }
    }

    #[test]
    fn level_none_never_notifies() {
        for queue in [
            QueueStatus::Started,
            QueueStatus::Finished,
            QueueStatus::Aborted,
        ] {
            for job in [None, Some(JobStatus::Died), Some(JobStatus::Started)] {
                assert_eq!(select_template(queue, job, NotificationLevel::None), None);
            }
        }
    }

    #[test]
    fn queue_terminal_transitions_take_precedence() {
        for level in &LEVELS[1..] {
            assert_eq!(
                select_template(QueueStatus::Finished, Some(JobStatus::Died), *level),
                Some(Placeholder::QueueFinished)
            );
            assert_eq!(
                select_template(QueueStatus::Aborted, None, *level),
                Some(Placeholder::QueueAborted)
            );
        }
    }

    #[test]
    fn job_transitions_depend_on_level() {
        let started = QueueStatus::Started;
        assert_eq!(
            select_template(started, Some(JobStatus::Died), NotificationLevel::Queue),
            None
        );
        assert_eq!(
            select_template(started, Some(JobStatus::Died), NotificationLevel::Failed),
            Some(Placeholder::JobFailed)
        );
        assert_eq!(
            select_template(started, Some(JobStatus::Finished), NotificationLevel::Failed),
            None
        );
        assert_eq!(
            select_template(started, Some(JobStatus::Died), NotificationLevel::All),
            Some(Placeholder::JobFailed)
        );
        for status in [JobStatus::Started, JobStatus::Finished, JobStatus::Aborted] {
            assert_eq!(
                select_template(started, Some(status), NotificationLevel::All),
                Some(Placeholder::JobChanged)
            );
        }
    }

    #[test]
    fn levels_are_ordered_and_parse_case_insensitively() {
        assert!(NotificationLevel::None < NotificationLevel::Queue);
        assert!(NotificationLevel::Failed < NotificationLevel::All);
        assert_eq!(
            "FAILED".parse::<NotificationLevel>().unwrap(),
            NotificationLevel::Failed
        );
        assert!("loud".parse::<NotificationLevel>().is_err());
    }

    #[test]
    fn job_changed_body_lists_queue_counts() {
        let info = job_info(JobStatus::Finished);
        assert_eq!(Placeholder::JobChanged.subject(&info), "Job lig1 finished");
        let body = Placeholder::JobChanged.body(&info);
        assert!(body.starts_with("Hi there,\n\nSubjob 'lig1' of queue 'dock' changed status to Finished"));
        assert!(body.contains("Job took about 5 seconds on 2 processor(s)."));
        assert!(body.contains("Completed = 1\nFailed    = 1\nActive    = 1\nPending   = 0\nTotal     = 3"));
    }

    #[test]
    fn job_failed_body_embeds_the_log_excerpt() {
        let info = job_info(JobStatus::Died);
        assert_eq!(Placeholder::JobFailed.subject(&info), "Job lig1 died");
        let body = Placeholder::JobFailed.body(&info);
        assert!(body.contains("Here are the last 50 lines of 'lig1.log':\n\n    line 1\n    line 2\n"));
    }

    #[test]
    fn queue_bodies_report_failures_and_errors() {
        let finished = queue_info(vec!["lig2".into()]);
        assert_eq!(
            Placeholder::QueueFinished.subject(&finished),
            "Job queue dock ended normally"
        );
        let body = Placeholder::QueueFinished.body(&finished);
        assert!(body.contains("1 of 3 job(s) succeeded; 1 job(s) failed."));
        assert!(body.contains("Failed jobs:\n* lig2.\n"));

        let clean = Placeholder::QueueFinished.body(&queue_info(Vec::new()));
        assert!(!clean.contains("Failed jobs"));

        let aborted = queue_info(Vec::new());
        let body = Placeholder::QueueAborted.body(&aborted);
        assert_eq!(
            Placeholder::QueueAborted.subject(&aborted),
            "Job queue dock ended abnormally"
        );
        assert!(body.contains("    Backend error: boom"));
        assert!(body.contains("All active jobs (2) were killed."));
        assert!(body.contains("on 8 processor(s)"));
    }

    #[test]
    fn notifier_downgrades_without_recipient_or_credentials() {
        let mailer = RecordingMailer::new();
        let n = Notifier::new(NotificationLevel::All, None, Box::new(mailer.clone())).unwrap();
        assert_eq!(n.level(), NotificationLevel::None);
        assert_eq!(n.describe(), "disabled");

        let offline = RecordingMailer::offline();
        let n = Notifier::new(
            NotificationLevel::All,
            Some("a@b.c".into()),
            Box::new(offline),
        )
        .unwrap();
        assert_eq!(n.level(), NotificationLevel::None);
    }

    #[test]
    fn notifier_rejects_recipients_without_at_sign() {
        let err = Notifier::new(
            NotificationLevel::Queue,
            Some("nobody".into()),
            Box::new(RecordingMailer::new()),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidRecipient(r) if r == "nobody"));
    }

    #[test]
    fn notifier_swallows_transport_failures() {
        let mailer = RecordingMailer::failing();
        let n = Notifier::new(
            NotificationLevel::Queue,
            Some("ops@lab.org".into()),
            Box::new(mailer.clone()),
        )
        .unwrap();
        assert_eq!(n.describe(), "ops@lab.org (queue)");
        n.send(Placeholder::QueueFinished, &queue_info(Vec::new()));
        assert_eq!(mailer.attempts(), 1);
        assert!(mailer.sent().is_empty());
    }

    #[test]
    fn hostname_is_the_machine_name() {
        let expected = hostname::get().unwrap().to_string_lossy().into_owned();
        assert!(!expected.is_empty());
        assert_eq!(hostname(), expected);
    }
}
