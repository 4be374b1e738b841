use crate::cli::RunArgs;
use crate::config::build_config;
use crate::error::{CliError, Result};
use crate::ui::{CliProgressHandler, UiEvent, UiLineWriter};
use fajobs::engine::backend::LocalBackend;
use fajobs::engine::mail::SmtpMailer;
use fajobs::engine::notification::Notifier;
use fajobs::engine::progress::ProgressReporter;
use fajobs::engine::queue::{JobQueue, QueueStatus};
use fajobs::workflows;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub async fn run(args: RunArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    info!("Merging configuration from file and CLI arguments...");
    let config = build_config(&args)?;

    for command in &config.commands {
        for file in command.input_files() {
            let path = config.queue.workdir.join(file);
            if !path.exists() {
                return Err(CliError::Argument(format!(
                    "Input file does not exist: {}",
                    path.display()
                )));
            }
        }
    }

    let cancel = Arc::new(AtomicBool::new(false));
    let backend = LocalBackend::new(config.queue.workdir.clone())
        .capture_output(config.capture_output)
        .poll_interval(config.poll_interval)
        .with_cancel_flag(Arc::clone(&cancel));

    let mut mailer = SmtpMailer::new(config.smtp_server.clone());
    if let Some(netrc) = &config.netrc {
        mailer = mailer.netrc_path(netrc.clone());
    }
    let notifier = Notifier::from_config(&config.queue, Box::new(mailer))?;
    debug!(notifications = %notifier.describe(), "Notifier ready");

    let progress_handler = CliProgressHandler::new(ui_sender.clone());
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let mut queue = JobQueue::new(config.queue.clone(), backend)
        .with_notifier(notifier)
        .with_output(Box::new(UiLineWriter::blocking(ui_sender)))
        .with_reporter(reporter);

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping the job queue...");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    info!(
        jobs = config.commands.len(),
        max_simultaneous_jobs = config.queue.max_simultaneous_jobs(),
        "Invoking the batch workflow..."
    );
    let result = tokio::task::block_in_place(|| {
        workflows::batch::run(&mut queue, config.commands, &config.batch)
    });
    interrupt.abort();
    drop(queue);
    let result = result?;

    if result.skipped {
        println!("Stage already completed, nothing to run.");
        return Ok(());
    }

    info!(
        status = %result.queue_status,
        done = result.counts.done,
        failed = result.counts.failed,
        "Workflow finished."
    );

    if result.queue_status == QueueStatus::Aborted {
        return Err(CliError::Aborted);
    }
    if result.counts.failed > 0 {
        return Err(CliError::JobsFailed {
            failed: result.counts.failed,
            total: result.jobs.len(),
        });
    }
    Ok(())
}
