//! Progress reporting: events from the scan, delivery that never blocks it, and a kdam bar.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use kdam::{Animation, Bar, BarExt};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// `completed` of `total` members done. `total` grows while enumeration is still running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgressEvent {
    pub completed: usize,
    pub total: usize,
}

/// Consumer of progress events. Runs on its own thread, so it may be slow.
pub trait ProgressSink: Send {
    fn on_progress(&mut self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: FnMut(ProgressEvent) + Send,
{
    fn on_progress(&mut self, event: ProgressEvent) {
        self(event)
    }
}

/// Buffered hand-off from the scan to a [`ProgressSink`].
///
/// [`emit`](Self::emit) never blocks: when the buffer is full the oldest pending event is
/// dropped to make room, so the sink always sees the latest state.
pub struct ProgressRelay {
    tx: Sender<ProgressEvent>,
    overflow_rx: Receiver<ProgressEvent>,
    handle: JoinHandle<()>,
}

impl ProgressRelay {
    pub fn spawn(mut sink: Box<dyn ProgressSink>, capacity: usize) -> Self {
        let (tx, rx) = bounded::<ProgressEvent>(capacity.max(1));
        let overflow_rx = rx.clone();
        let handle = thread::spawn(move || {
            for event in rx.iter() {
                sink.on_progress(event);
            }
        });
        Self {
            tx,
            overflow_rx,
            handle,
        }
    }

    pub fn emit(&self, event: ProgressEvent) {
        let mut event = event;
        loop {
            match self.tx.try_send(event) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => return,
                Err(TrySendError::Full(back)) => {
                    let _ = self.overflow_rx.try_recv();
                    event = back;
                }
            }
        }
    }

    /// Close the channel and wait for the sink to consume what is buffered.
    pub fn finish(self) {
        let ProgressRelay {
            tx,
            overflow_rx,
            handle,
        } = self;
        drop(tx);
        drop(overflow_rx);
        let _ = handle.join();
    }
}

// Progress bar type alias
pub type ProgressBar = Arc<Mutex<Bar>>;

/// Configuration for creating a progress bar
pub struct ProgressBarConfig {
    pub total: usize,
    pub desc: &'static str,
    pub animation: Animation,
}

impl ProgressBarConfig {
    pub fn new(total: usize, desc: &'static str, animation: Animation) -> Self {
        Self {
            total,
            desc,
            animation,
        }
    }
}

/// Create a progress bar with the given configuration
pub fn create_progress_bar(config: ProgressBarConfig) -> ProgressBar {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = config.total,
        desc = config.desc,
        animation = config.animation,
        unit = " members"
    )))
}

/// Move the bar to `event`. Uses try_lock so a contended bar is skipped rather than waited on;
/// the next event catches it up.
pub fn update_progress_bar(pb: &ProgressBar, event: ProgressEvent) {
    if let Ok(mut bar) = pb.try_lock() {
        bar.total = event.total;
        let _ = bar.update_to(event.completed);
    }
}

/// Finish the bar line so later output starts on a fresh line.
pub fn close_progress_bar(pb: &ProgressBar) {
    if let Ok(mut bar) = pb.lock() {
        let _ = bar.refresh();
        eprintln!();
    }
}

/// [`ProgressSink`] drawing onto a kdam bar.
pub struct BarSink {
    bar: ProgressBar,
}

impl BarSink {
    pub fn new(bar: &ProgressBar) -> Self {
        Self {
            bar: Arc::clone(bar),
        }
    }
}

impl ProgressSink for BarSink {
    fn on_progress(&mut self, event: ProgressEvent) {
        update_progress_bar(&self.bar, event);
    }
}
