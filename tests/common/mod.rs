//! In-memory graph and feed clients for scan tests.

#![allow(dead_code)]

use chrono::{SecondsFormat, TimeDelta, Utc};
use ghostscan::{CancelToken, ClientError, Direction, EdgePage, FeedClient, GraphClient, Member, Post};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

pub fn member(n: usize) -> Member {
    Member::new(format!("user{n}.test"), format!("did:plc:user{n}"))
}

pub fn members(count: usize) -> Vec<Member> {
    (1..=count).map(member).collect()
}

/// Timestamp `days` ago in the service's `Z` form.
pub fn days_ago(days: i64) -> String {
    (Utc::now() - TimeDelta::days(days)).to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Graph that serves fixed pages; page `i` is returned for cursor `"i"` (no cursor = page 0).
pub struct FakeGraph {
    pages: Vec<Result<EdgePage, ClientError>>,
    /// The first `flaky` calls fail with a connection error before pages are served.
    flaky: usize,
    pub calls: AtomicUsize,
}

impl FakeGraph {
    pub fn new(pages: Vec<Result<EdgePage, ClientError>>) -> Self {
        Self {
            pages,
            flaky: 0,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn flaky(mut self, failures: usize) -> Self {
        self.flaky = failures;
        self
    }

    /// Split `members` into pages of `page_size`, chained with cursors.
    pub fn paged(members: &[Member], page_size: usize) -> Self {
        let chunks: Vec<_> = members.chunks(page_size.max(1)).collect();
        let last = chunks.len().saturating_sub(1);
        let pages = chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                Ok(EdgePage {
                    members: chunk.to_vec(),
                    next_cursor: (i < last).then(|| (i + 1).to_string()),
                })
            })
            .collect();
        Self::new(pages)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GraphClient for FakeGraph {
    fn list_edges(
        &self,
        _account: &str,
        _direction: Direction,
        cursor: Option<&str>,
    ) -> Result<EdgePage, ClientError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.flaky {
            return Err(ClientError::Connection("connection reset".into()));
        }
        let idx = cursor.and_then(|c| c.parse::<usize>().ok()).unwrap_or(0);
        self.pages.get(idx).cloned().unwrap_or_else(|| Ok(EdgePage::default()))
    }
}

/// One scripted reply of the fake feed.
#[derive(Clone)]
pub enum Reply {
    PostAt(String),
    Never,
    Fail(ClientError),
    /// Panic inside the client call.
    Panic,
}

/// Scripted behaviour for one member: replies are used in order, the last one repeats.
#[derive(Clone)]
pub struct Script {
    pub delay: Duration,
    pub replies: Vec<Reply>,
    /// Trip this token when the member is probed.
    pub cancel: Option<CancelToken>,
}

impl Script {
    pub fn reply(reply: Reply) -> Self {
        Self {
            delay: Duration::ZERO,
            replies: vec![reply],
            cancel: None,
        }
    }

    pub fn posted_days_ago(days: i64) -> Self {
        Self::reply(Reply::PostAt(days_ago(days)))
    }

    pub fn sequence(replies: Vec<Reply>) -> Self {
        Self {
            delay: Duration::ZERO,
            replies,
            cancel: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn cancelling(mut self, token: &CancelToken) -> Self {
        self.cancel = Some(token.clone());
        self
    }
}

#[derive(Default)]
pub struct FakeFeed {
    scripts: HashMap<String, Script>,
    calls: Mutex<HashMap<String, usize>>,
}

impl FakeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, member: &Member, script: Script) -> Self {
        self.scripts.insert(member.identifier.clone(), script);
        self
    }

    pub fn calls_for(&self, member: &Member) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&member.identifier)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

impl FeedClient for FakeFeed {
    fn latest_post(&self, member_id: &str) -> Result<Option<Post>, ClientError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.entry(member_id.to_string()).or_insert(0);
            *n += 1;
            *n
        };
        let Some(script) = self.scripts.get(member_id) else {
            return Ok(Some(Post {
                created_at: days_ago(1),
            }));
        };
        if let Some(token) = &script.cancel {
            token.cancel();
        }
        if !script.delay.is_zero() {
            thread::sleep(script.delay);
        }
        let idx = (call - 1).min(script.replies.len().saturating_sub(1));
        match script.replies.get(idx).cloned().unwrap_or(Reply::Never) {
            Reply::PostAt(created_at) => Ok(Some(Post { created_at })),
            Reply::Never => Ok(None),
            Reply::Fail(err) => Err(err),
            Reply::Panic => panic!("feed client panicked for {member_id}"),
        }
    }
}
