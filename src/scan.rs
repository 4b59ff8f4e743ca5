//! Scan coordination: run the pipeline, reassemble records in enumeration order, aggregate.

use log::{error, info, warn};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::client::{FeedClient, GraphClient};
use crate::engine::progress::{ProgressRelay, ProgressSink};
use crate::pipeline::{
    EnumerationError, EnumerationTarget, PipelineHandles, aggregate,
    check_for_initial_error_or_truncation, collect_records, run_pipeline,
    shutdown_pipeline_handles,
};
use crate::types::{CancelToken, ScanOpts, ScanResult};
use crate::utils::config::PROGRESS_BUFFER_CAP;

/// Scan the `opts.direction` members of `account` and classify each one.
///
/// Returns [`EnumerationError`] only when the member list could not be started. Every other
/// failure is absorbed per member. If `cancel` trips, members already in flight finish, no new
/// probes start, and the result covers completed members with `cancelled` set.
pub fn scan_account(
    graph: Arc<dyn GraphClient>,
    feed: Arc<dyn FeedClient>,
    account: &str,
    opts: &ScanOpts,
    cancel: &CancelToken,
    progress: Option<Box<dyn ProgressSink>>,
) -> Result<ScanResult, EnumerationError> {
    let target = EnumerationTarget {
        account: account.to_string(),
        direction: opts.direction,
        max_members: opts.max_members,
    };
    let handles = run_pipeline(graph, feed, &target, opts, cancel);
    let relay = progress.map(|sink| ProgressRelay::spawn(sink, PROGRESS_BUFFER_CAP));

    let slots = collect_records(&handles, relay.as_ref());

    let PipelineHandles {
        record_rx,
        enumerate_handle,
        worker_handles,
        shared,
    } = handles;
    drop(record_rx);
    if let Err(e) = shutdown_pipeline_handles(enumerate_handle, worker_handles) {
        error!("{:#}", e);
        shared.truncated.store(true, Ordering::Relaxed);
    }
    if let Some(relay) = relay {
        relay.finish();
    }

    let truncated = check_for_initial_error_or_truncation(&target, &shared)?;
    let enumerated = shared.enumerated();
    let records: Vec<_> = slots.into_iter().flatten().collect();
    let cancelled = shared.was_cancelled();
    if !cancelled && !truncated {
        debug_assert_eq!(records.len(), enumerated, "every enumerated member yields a record");
    }

    let mut result = aggregate(records, opts.count_never_posted);
    result.cancelled = cancelled;
    result.enumeration_truncated = truncated;

    if cancelled {
        warn!(
            "Scan cancelled: {} of {} enumerated members scanned",
            result.scanned_count, enumerated
        );
    }
    info!(
        "Scanned {} {}: {} ghosts ({:.1}%)",
        result.scanned_count, opts.direction, result.ghost_count, result.inactivity_rate
    );
    Ok(result)
}

/// Re-run the aggregator over an existing result's records (e.g. with another ghost policy).
pub fn reaggregate(result: &ScanResult, count_never_posted: bool) -> ScanResult {
    let mut again = aggregate(result.records.clone(), count_never_posted);
    again.cancelled = result.cancelled;
    again.enumeration_truncated = result.enumeration_truncated;
    again
}
