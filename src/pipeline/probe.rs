//! Activity probe: fetch a member's latest post and turn it into an activity timestamp.

use chrono::{DateTime, Utc};
use crossbeam_channel::{RecvTimeoutError, bounded};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::client::{ClientError, FeedClient, Post};
use crate::types::{Member, RetryPolicy};
use crate::utils::timestamp::parse_timestamp;

use super::context::ScanShared;
use super::retry::call_with_retry;

/// What a successful probe found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Latest post at this instant.
    Found(DateTime<Utc>),
    /// The member has never posted.
    Empty,
}

/// Why a probe failed. All variants classify as unknown; the split is kept for logging.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    /// Timeout, connection failure or rate limit that outlasted the retry budget.
    #[error("transient failure after {attempts} attempt(s): {source}")]
    Transient {
        attempts: u32,
        #[source]
        source: ClientError,
    },

    /// Private, blocked or suspended account. Never retried.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// Unreadable feed data or timestamp. Never retried.
    #[error("malformed data: {0}")]
    Malformed(String),
}

impl ProbeError {
    fn from_client(err: ClientError, attempts: u32) -> Self {
        match err {
            ClientError::Authorization(msg) => ProbeError::Authorization(msg),
            ClientError::Malformed(msg) => ProbeError::Malformed(msg),
            source @ (ClientError::Connection(_)
            | ClientError::Timeout
            | ClientError::RateLimited { .. }) => ProbeError::Transient { attempts, source },
        }
    }

    /// Short name of the failure class, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::Transient { .. } => "transient",
            ProbeError::Authorization(_) => "authorization",
            ProbeError::Malformed(_) => "malformed",
        }
    }
}

pub type ProbeResult = Result<ProbeOutcome, ProbeError>;

/// Probes members through a [`FeedClient`] with a per-attempt timeout and bounded retry.
pub struct ActivityProbe {
    feed: Arc<dyn FeedClient>,
    timeout: Duration,
    retry: RetryPolicy,
    shared: Option<ScanShared>,
}

impl ActivityProbe {
    /// `timeout` bounds each attempt; `Duration::ZERO` disables it.
    pub fn new(feed: Arc<dyn FeedClient>, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            feed,
            timeout,
            retry,
            shared: None,
        }
    }

    /// Skip remaining retries once the scan behind `shared` is cancelled, and record that
    /// the cancel was seen.
    pub fn with_cancel(mut self, shared: ScanShared) -> Self {
        self.shared = Some(shared);
        self
    }

    pub fn probe(&self, member: &Member) -> ProbeResult {
        let what = format!("probe @{}", member.handle);
        let (result, attempts) =
            call_with_retry(&self.retry, self.shared.as_ref(), &what, || self.attempt(member));
        match result {
            Ok(None) => Ok(ProbeOutcome::Empty),
            Ok(Some(post)) => parse_timestamp(&post.created_at)
                .map(ProbeOutcome::Found)
                .ok_or_else(|| {
                    ProbeError::Malformed(format!("unreadable timestamp {:?}", post.created_at))
                }),
            Err(err) => Err(ProbeError::from_client(err, attempts)),
        }
    }

    /// One feed request under the timeout budget.
    ///
    /// The request runs on its own thread; on timeout that thread is left to finish in the
    /// background and its result is discarded.
    fn attempt(&self, member: &Member) -> Result<Option<Post>, ClientError> {
        if self.timeout.is_zero() {
            return self.feed.latest_post(&member.identifier);
        }
        let (tx, rx) = bounded(1);
        let feed = Arc::clone(&self.feed);
        let id = member.identifier.clone();
        thread::Builder::new()
            .name("feed-request".to_string())
            .spawn(move || {
                let _ = tx.send(feed.latest_post(&id));
            })
            .map_err(|e| ClientError::Connection(format!("spawn feed request: {e}")))?;
        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(ClientError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(ClientError::Connection(
                "feed request ended without a result".to_string(),
            )),
        }
    }
}
