use fajobs::engine::progress::{Progress, ProgressCallback};
use fajobs::engine::queue::QueueStatus;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tracing::warn;

#[derive(Debug)]
pub enum UiEvent {
    Progress(Progress),
    Log(String),
}

pub struct UiManager {
    mp: Arc<MultiProgress>,
    state: BarState,
    event_receiver: mpsc::Receiver<UiEvent>,
    shutdown_receiver: watch::Receiver<bool>,
    _sentinel_bar: ProgressBar,
}

#[derive(Default)]
struct BarState {
    active_bar: Option<ProgressBar>,
    base_message: String,
}

impl UiManager {
    pub fn new() -> (Self, mpsc::Sender<UiEvent>, watch::Sender<bool>) {
        let (event_sender, event_receiver) = mpsc::channel(1024);
        let (shutdown_sender, shutdown_receiver) = watch::channel(false);
        let mp = Arc::new(MultiProgress::new());
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
        let _sentinel_bar = mp.add(ProgressBar::hidden());
        let manager = Self {
            mp,
            state: BarState::default(),
            event_receiver,
            shutdown_receiver,
            _sentinel_bar,
        };

        (manager, event_sender, shutdown_sender)
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                Some(event) = self.event_receiver.recv() => {
                    self.handle_event(event);
                }
                result = self.shutdown_receiver.changed() => {
                    if result.is_err() || *self.shutdown_receiver.borrow() {
                        break;
                    }
                }
            }
        }
        // Drain what was queued before shutdown so no table line is lost.
        while let Ok(event) = self.event_receiver.try_recv() {
            self.handle_event(event);
        }
        if let Some(bar) = self.state.active_bar.take() {
            bar.finish_and_clear();
        }
        self._sentinel_bar.finish_and_clear();
    }

    fn handle_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Log(msg) => self.print_line(msg),
            UiEvent::Progress(progress) => self.handle_progress(progress),
        }
    }

    fn print_line(&self, line: String) {
        if self.mp.is_hidden() {
            println!("{}", line);
        } else {
            self.mp.println(line).ok();
        }
    }

    fn handle_progress(&mut self, progress: Progress) {
        match progress {
            Progress::QueueStart { name, total_jobs } => {
                if let Some(bar) = self.state.active_bar.take() {
                    bar.finish_and_clear();
                }

                let pb = self.mp.add(ProgressBar::new(total_jobs as u64));
                pb.set_style(Self::bar_style());
                pb.set_message(name.clone());

                self.state.active_bar = Some(pb);
                self.state.base_message = name;
            }
            Progress::JobUpdate { counts, .. } => {
                if let Some(bar) = self.state.active_bar.as_ref() {
                    bar.set_position((counts.done + counts.failed) as u64);
                    bar.set_message(format!(
                        "{} ({} active, {} failed)",
                        self.state.base_message, counts.active, counts.failed
                    ));
                }
            }
            Progress::QueueFinish { status } => {
                if let Some(bar) = self.state.active_bar.take() {
                    bar.finish_and_clear();
                }

                let mark = if status == QueueStatus::Finished {
                    "✓"
                } else {
                    "✗"
                };
                self.print_line(format!("{} {} {}", mark, self.state.base_message, status));

                self.state.base_message.clear();
            }
        }
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg:<45} [{bar:40.cyan/blue}] {pos}/{len} ({elapsed})")
            .expect("Invalid template")
            .with_key(
                "elapsed",
                |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                    let _ = write!(w, "{:.1}s", state.elapsed().as_secs_f64());
                },
            )
            .progress_chars("━╸ ")
    }
}

#[derive(Clone)]
pub struct CliProgressHandler {
    sender: mpsc::Sender<UiEvent>,
}

impl CliProgressHandler {
    pub fn new(sender: mpsc::Sender<UiEvent>) -> Self {
        Self { sender }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let sender = self.sender.clone();
        Box::new(move |progress: Progress| {
            if let Err(e) = sender.try_send(UiEvent::Progress(progress)) {
                warn!("Failed to send progress update to UI channel: {}", e);
            }
        })
    }
}

/// An [`io::Write`] sink that forwards complete lines to the UI as log events.
///
/// Used for the queue's status table and for the console log layer, so that their
/// output is printed above the progress bar instead of through it.
pub struct UiLineWriter {
    sender: mpsc::Sender<UiEvent>,
    buffer: Vec<u8>,
    blocking: bool,
}

impl UiLineWriter {
    /// A writer that never waits; lines that do not fit in the channel go to stderr.
    pub fn new(sender: mpsc::Sender<UiEvent>) -> Self {
        Self {
            sender,
            buffer: Vec::new(),
            blocking: false,
        }
    }

    /// A writer that waits for room in the channel, keeping lines in order.
    ///
    /// Must only write from a thread that may block, such as inside
    /// `tokio::task::block_in_place`.
    pub fn blocking(sender: mpsc::Sender<UiEvent>) -> Self {
        Self {
            sender,
            buffer: Vec::new(),
            blocking: true,
        }
    }

    fn send_line(&self, bytes: &[u8], block: bool) {
        let event = UiEvent::Log(String::from_utf8_lossy(bytes).into_owned());
        let undelivered = if block {
            self.sender.blocking_send(event).err().map(|e| e.0)
        } else {
            match self.sender.try_send(event) {
                Ok(()) => None,
                Err(TrySendError::Full(event)) | Err(TrySendError::Closed(event)) => Some(event),
            }
        };
        if let Some(UiEvent::Log(line)) = undelivered {
            eprintln!("{}", line);
        }
    }
}

impl Write for UiLineWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.send_line(&line[..line.len() - 1], self.blocking);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for UiLineWriter {
    fn drop(&mut self) {
        if !self.buffer.is_empty() {
            // Drop may run on an async worker, where blocking is not allowed.
            let rest = std::mem::take(&mut self.buffer);
            self.send_line(&rest, false);
        }
    }
}
