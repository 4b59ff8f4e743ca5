//! Pipeline context: shared state passed into the enumeration thread and probe workers.

use chrono::{DateTime, TimeDelta, Utc};
use crossbeam_channel::{Receiver, Sender, bounded};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::client::ClientError;
use crate::types::{ActivityRecord, CancelToken, Direction, Member};

/// A value tagged with its enumeration position.
pub type Indexed<T> = (usize, T);

/// State shared between the enumeration thread, the probe workers and the collector.
///
/// Workers never touch the output buffer; they only hand records back over the record
/// channel. The atomics here are counters and flags, not data.
#[derive(Clone)]
pub struct ScanShared {
    pub cancel: CancelToken,
    /// Error of a page fetch that happened before any member was obtained.
    pub first_error: Arc<Mutex<Option<ClientError>>>,
    /// Set when a later page failed and the member list was cut short.
    pub truncated: Arc<AtomicBool>,
    /// Set when a thread stopped early because of the cancel token.
    pub cancel_observed: Arc<AtomicBool>,
    /// Members handed to workers so far.
    pub enumerated: Arc<AtomicUsize>,
}

impl ScanShared {
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            cancel,
            first_error: Arc::new(Mutex::new(None)),
            truncated: Arc::new(AtomicBool::new(false)),
            cancel_observed: Arc::new(AtomicBool::new(false)),
            enumerated: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns true (and remembers it) if the scan has been asked to stop.
    pub fn should_stop(&self) -> bool {
        if self.cancel.is_cancelled() {
            self.cancel_observed.store(true, Ordering::Relaxed);
            return true;
        }
        false
    }

    pub fn enumerated(&self) -> usize {
        self.enumerated.load(Ordering::Relaxed)
    }

    pub fn was_truncated(&self) -> bool {
        self.truncated.load(Ordering::Relaxed)
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancel_observed.load(Ordering::Relaxed)
    }

    /// Take the recorded first-page error. Recovers the value if a thread panicked while holding the lock.
    pub fn take_first_error(&self) -> Option<ClientError> {
        match self.first_error.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

/// Target of the enumeration thread.
#[derive(Clone, Debug)]
pub struct EnumerationTarget {
    pub account: String,
    pub direction: Direction,
    pub max_members: usize,
}

/// Inputs every probe worker needs to turn a probe outcome into a record.
#[derive(Clone, Copy, Debug)]
pub struct ClassifyParams {
    /// Reference instant, fixed once per scan so every member is measured against the same clock.
    pub now: DateTime<Utc>,
    pub threshold: TimeDelta,
}

/// Handles returned by [`run_pipeline`](crate::pipeline::run_pipeline): receive records and join when done.
pub struct PipelineHandles {
    pub record_rx: Receiver<Indexed<ActivityRecord>>,
    pub enumerate_handle: JoinHandle<usize>,
    pub worker_handles: Vec<JoinHandle<()>>,
    pub shared: ScanShared,
}

/// Channels for the pipeline. Enumeration gets `member_tx`; workers get `member_rx` and `record_tx`.
pub struct PipelineChannels {
    pub member_tx: Sender<Indexed<Member>>,
    pub member_rx: Receiver<Indexed<Member>>,
    pub record_tx: Sender<Indexed<ActivityRecord>>,
    pub record_rx: Receiver<Indexed<ActivityRecord>>,
}

pub fn create_pipeline_channels(channel_cap: usize) -> PipelineChannels {
    let (member_tx, member_rx) = bounded::<Indexed<Member>>(channel_cap);
    let (record_tx, record_rx) = bounded::<Indexed<ActivityRecord>>(channel_cap);
    PipelineChannels {
        member_tx,
        member_rx,
        record_tx,
        record_rx,
    }
}
