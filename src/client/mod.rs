//! Capabilities the scan engine consumes: graph edges, latest posts, profile overview.
//!
//! The engine only sees these traits. [`bsky::BskyClient`] implements all three against the
//! AT Protocol AppView; tests plug in in-memory fakes.

pub mod bsky;

use std::time::Duration;

use crate::types::{Direction, Member};

pub use bsky::BskyClient;

/// Failure reported by a remote capability.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Transport failure or server-side error.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The request did not finish in time.
    #[error("request timed out")]
    Timeout,

    /// The service asked us to slow down.
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// Private, blocked, suspended or otherwise inaccessible account.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// The response could not be understood.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ClientError {
    /// Transient failures are worth retrying; authorization and malformed data never are.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::Connection(_) | ClientError::Timeout | ClientError::RateLimited { .. }
        )
    }

    /// Server-supplied delay, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ClientError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// One page of graph edges.
#[derive(Clone, Debug, Default)]
pub struct EdgePage {
    pub members: Vec<Member>,
    /// Opaque cursor for the next page; `None` when this was the last page.
    pub next_cursor: Option<String>,
}

/// Most recent post of a member, with its timestamp as emitted by the service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Post {
    pub created_at: String,
}

/// Counts shown before a scan starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Profile {
    pub handle: String,
    pub followers_count: u64,
    pub follows_count: u64,
}

/// Paginated access to followers / follows.
pub trait GraphClient: Send + Sync {
    fn list_edges(
        &self,
        account: &str,
        direction: Direction,
        cursor: Option<&str>,
    ) -> Result<EdgePage, ClientError>;
}

/// Latest-post lookup. Must request a single item, never the full history.
pub trait FeedClient: Send + Sync {
    /// `Ok(None)` when the member has never posted.
    fn latest_post(&self, member_id: &str) -> Result<Option<Post>, ClientError>;
}

/// Profile lookup; optional, only used for the overview line.
pub trait ProfileClient: Send + Sync {
    fn profile(&self, account: &str) -> Result<Profile, ClientError>;
}
