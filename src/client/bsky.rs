//! Blocking XRPC client for the Bluesky AppView.
//!
//! Endpoints used:
//! - `app.bsky.graph.getFollowers` / `app.bsky.graph.getFollows` for graph edges
//! - `app.bsky.feed.getAuthorFeed` with `limit=1` for the latest post
//! - `app.bsky.actor.getProfile` for the overview line
//!
//! Without a token the public AppView serves all of these. With a token the requests carry
//! `Authorization: Bearer <token>`; obtaining that token is up to the caller.

use anyhow::{Context, Result};
use log::debug;
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::HeaderMap;
use serde::Deserialize;
use std::time::Duration;

use super::{ClientError, EdgePage, FeedClient, GraphClient, Post, Profile, ProfileClient};
use crate::types::{Direction, Member};
use crate::utils::config::{GRAPH_PAGE_LIMIT, HTTP_TIMEOUT_SECS};

/// XRPC error names that mean "this actor's data is not available to us".
const INACCESSIBLE_ACTOR_ERRORS: &[&str] = &[
    "BlockedActor",
    "BlockedByActor",
    "AccountTakedown",
    "AccountDeactivated",
    "RepoTakendown",
    "RepoDeactivated",
    "RepoSuspended",
    "NotFound",
];

const REPOST_REASON: &str = "app.bsky.feed.defs#reasonRepost";

#[derive(Debug, Deserialize)]
struct ProfileView {
    did: String,
    handle: String,
}

impl From<ProfileView> for Member {
    fn from(p: ProfileView) -> Self {
        Member {
            handle: p.handle,
            identifier: p.did,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FollowersResponse {
    followers: Vec<ProfileView>,
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FollowsResponse {
    follows: Vec<ProfileView>,
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthorFeedResponse {
    feed: Vec<FeedViewPost>,
}

#[derive(Debug, Deserialize)]
struct FeedViewPost {
    post: PostView,
    reason: Option<FeedReason>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostView {
    record: PostRecord,
    indexed_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostRecord {
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedReason {
    #[serde(rename = "$type")]
    kind: String,
    indexed_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileDetailed {
    handle: String,
    followers_count: Option<u64>,
    follows_count: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct XrpcErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// AppView client implementing [`GraphClient`], [`FeedClient`] and [`ProfileClient`].
pub struct BskyClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl BskyClient {
    /// Build a client for `base_url` (e.g. `https://public.api.bsky.app`).
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// GET `/xrpc/<method>` and return the body of a successful response.
    fn xrpc(&self, method: &str, query: &[(&str, &str)]) -> Result<String, ClientError> {
        let url = format!("{}/xrpc/{}", self.base_url, method);
        let mut req = self.http.get(&url).query(query);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().map_err(transport_error)?;
        read_body(resp)
    }
}

fn transport_error(e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::Timeout
    } else {
        ClientError::Connection(e.to_string())
    }
}

fn read_body(resp: Response) -> Result<String, ClientError> {
    let status = resp.status();
    let retry_after = retry_after_from_headers(resp.headers());
    let body = resp.text().map_err(transport_error)?;
    if status.is_success() {
        Ok(body)
    } else {
        debug!("XRPC {} body: {}", status, body);
        Err(error_from_status(status, retry_after, &body))
    }
}

/// `retry-after` (seconds) or, failing that, `ratelimit-reset` (unix seconds).
fn retry_after_from_headers(headers: &HeaderMap) -> Option<Duration> {
    let header_u64 = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
    };
    if let Some(secs) = header_u64("retry-after") {
        return Some(Duration::from_secs(secs));
    }
    let reset = header_u64("ratelimit-reset")?;
    let now = chrono::Utc::now().timestamp();
    let wait = i64::try_from(reset).ok()?.checked_sub(now)?;
    (wait > 0).then(|| Duration::from_secs(wait.unsigned_abs()))
}

/// Map a non-success XRPC response to a [`ClientError`].
pub fn error_from_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> ClientError {
    let parsed: XrpcErrorBody = serde_json::from_str(body).unwrap_or_default();
    let name = parsed.error.unwrap_or_default();
    let detail = match parsed.message {
        Some(msg) if !name.is_empty() => format!("{name}: {msg}"),
        Some(msg) => msg,
        None if !name.is_empty() => name.clone(),
        None => status.to_string(),
    };

    if status == StatusCode::TOO_MANY_REQUESTS {
        return ClientError::RateLimited { retry_after };
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return ClientError::Authorization(detail);
    }
    if INACCESSIBLE_ACTOR_ERRORS.contains(&name.as_str()) || status == StatusCode::NOT_FOUND {
        return ClientError::Authorization(detail);
    }
    if status.is_server_error() {
        return ClientError::Connection(detail);
    }
    ClientError::Malformed(detail)
}

/// Parse a `getFollowers` / `getFollows` response body.
pub fn parse_edge_page(direction: Direction, body: &str) -> Result<EdgePage, ClientError> {
    let malformed = |e: serde_json::Error| ClientError::Malformed(e.to_string());
    let (views, cursor) = match direction {
        Direction::Followers => {
            let r: FollowersResponse = serde_json::from_str(body).map_err(malformed)?;
            (r.followers, r.cursor)
        }
        Direction::Following => {
            let r: FollowsResponse = serde_json::from_str(body).map_err(malformed)?;
            (r.follows, r.cursor)
        }
    };
    Ok(EdgePage {
        members: views.into_iter().map(Member::from).collect(),
        next_cursor: cursor.filter(|c| !c.is_empty()),
    })
}

/// Parse a `getAuthorFeed` response body into the latest activity timestamp.
///
/// A repost counts as activity at the time it was indexed, not at the reposted post's
/// creation time.
pub fn parse_author_feed(body: &str) -> Result<Option<Post>, ClientError> {
    let r: AuthorFeedResponse =
        serde_json::from_str(body).map_err(|e| ClientError::Malformed(e.to_string()))?;
    let Some(item) = r.feed.into_iter().next() else {
        return Ok(None);
    };
    let repost_time = item
        .reason
        .filter(|reason| reason.kind == REPOST_REASON)
        .and_then(|reason| reason.indexed_at);
    let created_at = repost_time
        .or(item.post.record.created_at)
        .or(item.post.indexed_at)
        .ok_or_else(|| ClientError::Malformed("feed item without a timestamp".to_string()))?;
    Ok(Some(Post { created_at }))
}

impl GraphClient for BskyClient {
    fn list_edges(
        &self,
        account: &str,
        direction: Direction,
        cursor: Option<&str>,
    ) -> Result<EdgePage, ClientError> {
        let method = match direction {
            Direction::Followers => "app.bsky.graph.getFollowers",
            Direction::Following => "app.bsky.graph.getFollows",
        };
        let limit = GRAPH_PAGE_LIMIT.to_string();
        let mut query = vec![("actor", account), ("limit", limit.as_str())];
        if let Some(c) = cursor {
            query.push(("cursor", c));
        }
        let body = self.xrpc(method, &query)?;
        parse_edge_page(direction, &body)
    }
}

impl FeedClient for BskyClient {
    fn latest_post(&self, member_id: &str) -> Result<Option<Post>, ClientError> {
        let body = self.xrpc(
            "app.bsky.feed.getAuthorFeed",
            &[("actor", member_id), ("limit", "1")],
        )?;
        parse_author_feed(&body)
    }
}

impl ProfileClient for BskyClient {
    fn profile(&self, account: &str) -> Result<Profile, ClientError> {
        let body = self.xrpc("app.bsky.actor.getProfile", &[("actor", account)])?;
        let p: ProfileDetailed =
            serde_json::from_str(&body).map_err(|e| ClientError::Malformed(e.to_string()))?;
        Ok(Profile {
            handle: p.handle,
            followers_count: p.followers_count.unwrap_or(0),
            follows_count: p.follows_count.unwrap_or(0),
        })
    }
}
