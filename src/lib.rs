//! Ghostscan: find inactive accounts in a social-graph membership list

pub mod client;
pub mod engine;
pub mod pipeline;
pub mod report;
pub mod scan;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use client::{ClientError, EdgePage, FeedClient, GraphClient, Post, Profile, ProfileClient};
pub use engine::progress::{ProgressEvent, ProgressSink};
pub use pipeline::{EnumerationError, ProbeError, ProbeOutcome};

use std::sync::Arc;

/// Result alias used by the CLI side of the crate
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Single entry point: scan the `opts.direction` members of `account` and return a [`ScanResult`].
///
/// - **`graph` / `feed`**: already-authenticated capabilities; one type may serve both
///   (e.g. the same `Arc<BskyClient>` twice).
/// - **`cancel`**: trip it to stop early; the result then covers completed members and has
///   `cancelled` set.
/// - **`progress: Some(sink)`**: `sink` gets `(completed, total)` after each member on its own
///   thread. A slow sink loses intermediate events, never the scan's time.
///
/// ```ignore
/// let client = std::sync::Arc::new(ghostscan::client::BskyClient::new("https://public.api.bsky.app", None)?);
/// let opts = ghostscan::ScanOpts { max_members: 50, ..Default::default() };
/// let result = ghostscan::scan(client.clone(), client, "alice.bsky.social", &opts, &ghostscan::CancelToken::new(), None)?;
/// println!("{} of {} are ghosts", result.ghost_count, result.scanned_count);
/// ```
pub fn scan(
    graph: Arc<dyn GraphClient>,
    feed: Arc<dyn FeedClient>,
    account: &str,
    opts: &ScanOpts,
    cancel: &CancelToken,
    progress: Option<Box<dyn ProgressSink>>,
) -> std::result::Result<ScanResult, EnumerationError> {
    scan::scan_account(graph, feed, account, opts, cancel, progress)
}
