use anyhow::Result;
use chrono::Utc;
use log::debug;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::client::{FeedClient, GraphClient};
use crate::engine::progress::{ProgressEvent, ProgressRelay};
use crate::pipeline;
use crate::types::{ActivityRecord, CancelToken, ScanOpts};
use crate::utils::config::MEMBER_CHANNEL_CAP;

/// Start the enumeration + probe pipeline. Returns the record receiver and handles; caller
/// drains `record_rx` and must join `enumerate_handle` and `worker_handles` when done.
pub fn run_pipeline(
    graph: Arc<dyn GraphClient>,
    feed: Arc<dyn FeedClient>,
    target: &pipeline::EnumerationTarget,
    opts: &ScanOpts,
    cancel: &CancelToken,
) -> pipeline::PipelineHandles {
    let shared = pipeline::ScanShared::new(cancel.clone());
    let channels = pipeline::create_pipeline_channels(MEMBER_CHANNEL_CAP);
    let params = pipeline::ClassifyParams {
        now: Utc::now(),
        threshold: opts.threshold,
    };
    debug!(
        "Scanning {} of {} (max {}, {} worker(s), threshold {} days)",
        target.direction,
        target.account,
        target.max_members,
        opts.concurrency.max(1),
        opts.threshold.num_days()
    );

    let enumerator = pipeline::GraphEnumerator::new(graph, target)
        .with_retry(opts.retry)
        .with_cancel(shared.clone());
    let enumerate_handle =
        pipeline::spawn_enumerate_thread(enumerator, channels.member_tx, shared.clone());

    let probe = Arc::new(
        pipeline::ActivityProbe::new(feed, opts.probe_timeout, opts.retry)
            .with_cancel(shared.clone()),
    );
    let worker_handles = pipeline::spawn_probe_workers(
        channels.member_rx,
        &channels.record_tx,
        probe,
        params,
        &shared,
        opts.concurrency,
    );

    // Dropping the last sender closes the channel so the collector loop ends.
    drop(channels.record_tx);

    pipeline::PipelineHandles {
        record_rx: channels.record_rx,
        enumerate_handle,
        worker_handles,
        shared,
    }
}

/// Drain `record_rx` into slots indexed by enumeration position, emitting a progress event per
/// completed member. Slots left empty belong to members skipped after a cancel.
pub fn collect_records(
    handles: &pipeline::PipelineHandles,
    progress: Option<&ProgressRelay>,
) -> Vec<Option<ActivityRecord>> {
    let mut slots: Vec<Option<ActivityRecord>> = Vec::new();
    let mut completed = 0_usize;
    while let Ok((idx, record)) = handles.record_rx.recv() {
        if slots.len() <= idx {
            slots.resize_with(idx + 1, || None);
        }
        debug_assert!(slots[idx].is_none(), "member {idx} reported twice");
        slots[idx] = Some(record);
        completed += 1;
        if let Some(relay) = progress {
            relay.emit(ProgressEvent {
                completed,
                total: handles.shared.enumerated().max(completed),
            });
        }
    }
    debug!("collector: channel closed, {} records", completed);
    slots
}

/// Shut down the pipeline by joining the enumeration and worker threads (after records are drained).
pub fn shutdown_pipeline_handles(
    enumerate_handle: JoinHandle<usize>,
    worker_handles: Vec<JoinHandle<()>>,
) -> Result<usize> {
    let enumerated = enumerate_handle.join();
    let panicked_workers = worker_handles
        .into_iter()
        .map(|h| h.join())
        .filter(|joined| joined.is_err())
        .count();
    let count = enumerated.map_err(|_| anyhow::anyhow!("enumeration thread panicked"))?;
    if panicked_workers > 0 {
        anyhow::bail!("{} probe worker(s) panicked", panicked_workers);
    }
    Ok(count)
}
