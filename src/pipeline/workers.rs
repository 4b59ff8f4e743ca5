use crossbeam_channel::{Receiver, Sender};
use log::{debug, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::types::{ActivityRecord, Member};

use super::classify::classify;
use super::context::{ClassifyParams, Indexed, ScanShared};
use super::probe::{ActivityProbe, ProbeError};

/// Single probe worker: read members from member_rx, probe and classify, send on record_tx.
/// Checks cancellation before each member so nothing new starts after a cancel.
fn probe_worker_loop(
    member_rx: Receiver<Indexed<Member>>,
    record_tx: Sender<Indexed<ActivityRecord>>,
    probe: Arc<ActivityProbe>,
    params: ClassifyParams,
    shared: ScanShared,
) {
    while let Ok((idx, member)) = member_rx.recv() {
        if shared.should_stop() {
            break;
        }
        let outcome = probe.probe(&member);
        if let Err(err) = &outcome {
            log_probe_failure(&member, err);
        }
        let record = classify(member, &outcome, params.now, params.threshold);
        if record_tx.send((idx, record)).is_err() {
            break;
        }
    }
    drop(record_tx);
}

fn log_probe_failure(member: &Member, err: &ProbeError) {
    match err {
        ProbeError::Transient { .. } => warn!("@{}: {} ({})", member.handle, err, err.kind()),
        ProbeError::Authorization(_) | ProbeError::Malformed(_) => {
            debug!("@{}: {} ({})", member.handle, err, err.kind())
        }
    }
}

/// Spawn probe workers. Caller must drop its own `record_tx` after this so the channel closes
/// once the last worker exits.
pub fn spawn_probe_workers(
    member_rx: Receiver<Indexed<Member>>,
    record_tx: &Sender<Indexed<ActivityRecord>>,
    probe: Arc<ActivityProbe>,
    params: ClassifyParams,
    shared: &ScanShared,
    num_workers: usize,
) -> Vec<JoinHandle<()>> {
    (0..num_workers.max(1))
        .map(|_| {
            let member_rx = member_rx.clone();
            let record_tx = record_tx.clone();
            let probe = Arc::clone(&probe);
            let shared = shared.clone();
            thread::spawn(move || probe_worker_loop(member_rx, record_tx, probe, params, shared))
        })
        .collect()
}
