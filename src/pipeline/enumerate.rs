//! Graph enumeration: follows pagination cursors and feeds members to the probe workers.

use crossbeam_channel::Sender;
use log::{debug, warn};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};

use crate::client::{ClientError, GraphClient};
use crate::types::{Direction, Member, RetryPolicy};

use super::context::{EnumerationTarget, Indexed, ScanShared};
use super::retry::call_with_retry;

/// Listing a member set failed before any member was obtained.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("could not list {direction} of {account}: {source}")]
pub struct EnumerationError {
    pub account: String,
    pub direction: Direction,
    #[source]
    pub source: ClientError,
}

/// One result from graph enumeration: a member, or the failure that ended it.
#[derive(Debug)]
pub enum EnumOutcome {
    Member(Member),
    PageFailed { page: usize, error: ClientError },
}

/// Lazy member sequence over a paginated graph.
///
/// Pages are fetched only when the buffered members run out, so a consumer can start on early
/// members while later pages are still unfetched. Members are deduplicated by identifier across
/// pages. Iteration ends after `max_members`, when the service returns no cursor, or after the
/// first [`EnumOutcome::PageFailed`].
pub struct GraphEnumerator {
    client: Arc<dyn GraphClient>,
    account: String,
    direction: Direction,
    max_members: usize,
    retry: RetryPolicy,
    shared: Option<ScanShared>,
    cursor: Option<String>,
    pending: VecDeque<Member>,
    seen: HashSet<String>,
    emitted: usize,
    pages_fetched: usize,
    exhausted: bool,
}

impl GraphEnumerator {
    pub fn new(client: Arc<dyn GraphClient>, target: &EnumerationTarget) -> Self {
        Self {
            client,
            account: target.account.clone(),
            direction: target.direction,
            max_members: target.max_members,
            retry: RetryPolicy {
                max_retries: 0,
                ..RetryPolicy::default()
            },
            shared: None,
            cursor: None,
            pending: VecDeque::new(),
            seen: HashSet::new(),
            emitted: 0,
            pages_fetched: 0,
            exhausted: false,
        }
    }

    /// Retry transient page failures under `retry`. Without this a page is tried once.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Stop retrying page fetches once the scan behind `shared` is cancelled.
    pub fn with_cancel(mut self, shared: ScanShared) -> Self {
        self.shared = Some(shared);
        self
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    fn fetch_page(&mut self) -> Result<(), ClientError> {
        let what = format!("{} page {} of {}", self.direction, self.pages_fetched + 1, self.account);
        let client = Arc::clone(&self.client);
        let (account, direction, cursor) = (&self.account, self.direction, self.cursor.clone());
        let (result, _attempts) = call_with_retry(&self.retry, self.shared.as_ref(), &what, || {
            client.list_edges(account, direction, cursor.as_deref())
        });
        let page = result?;
        self.pages_fetched += 1;

        let received = page.members.len();
        for member in page.members {
            if self.seen.insert(member.identifier.clone()) {
                self.pending.push_back(member);
            } else {
                debug!("Skipping duplicate member {} ({})", member.handle, member.identifier);
            }
        }
        debug!(
            "Fetched {} page {}: {} members, {} new",
            self.direction,
            self.pages_fetched,
            received,
            self.pending.len()
        );

        match page.next_cursor {
            // A repeated cursor would loop forever.
            Some(next) if self.cursor.as_deref() != Some(next.as_str()) => self.cursor = Some(next),
            _ => self.exhausted = true,
        }
        Ok(())
    }
}

impl Iterator for GraphEnumerator {
    type Item = EnumOutcome;

    fn next(&mut self) -> Option<EnumOutcome> {
        loop {
            if self.emitted >= self.max_members {
                return None;
            }
            if let Some(member) = self.pending.pop_front() {
                self.emitted += 1;
                return Some(EnumOutcome::Member(member));
            }
            if self.exhausted {
                return None;
            }
            if let Err(error) = self.fetch_page() {
                self.exhausted = true;
                return Some(EnumOutcome::PageFailed {
                    page: self.pages_fetched + 1,
                    error,
                });
            }
        }
    }
}

pub fn spawn_enumerate_thread(
    enumerator: GraphEnumerator,
    member_tx: Sender<Indexed<Member>>,
    shared: ScanShared,
) -> JoinHandle<usize> {
    thread::spawn(move || run_enumerate_loop(member_tx, &shared, enumerator))
}

/// Run the enumeration loop: consume `iter`, tag each member with its position and send it to
/// `member_tx`. A failure before any member was sent is recorded as the scan's first error;
/// a later failure marks the enumeration as truncated and keeps what was sent.
/// Drops `member_tx` when done so workers see the channel close. Returns the count sent.
pub fn run_enumerate_loop<I>(member_tx: Sender<Indexed<Member>>, shared: &ScanShared, mut iter: I) -> usize
where
    I: Iterator<Item = EnumOutcome>,
{
    let mut count = 0_usize;
    loop {
        // Checked before pulling, so no page is fetched after a cancel.
        if shared.should_stop() {
            debug!("Enumeration stopped by cancellation after {} members", count);
            break;
        }
        let Some(outcome) = iter.next() else {
            break;
        };
        match outcome {
            EnumOutcome::Member(member) => {
                shared.enumerated.fetch_add(1, Ordering::Relaxed);
                if member_tx.send((count, member)).is_err() {
                    break;
                }
                count += 1;
            }
            EnumOutcome::PageFailed { page, error } => {
                if count == 0 {
                    match shared.first_error.lock() {
                        Ok(mut slot) => {
                            slot.get_or_insert(error);
                        }
                        Err(poisoned) => {
                            poisoned.into_inner().get_or_insert(error);
                        }
                    }
                } else {
                    warn!(
                        "Page {} failed ({}); continuing with the {} members collected",
                        page, error, count
                    );
                    shared.truncated.store(true, Ordering::Relaxed);
                }
                break;
            }
        }
    }
    drop(member_tx);
    count
}
