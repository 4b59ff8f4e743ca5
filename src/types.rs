//! Public and internal types for the ghostscan API and pipeline.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::utils::config::ScanDefaults;

/// Which side of the social graph to scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Accounts that follow the target.
    #[default]
    Followers,
    /// Accounts the target follows.
    Following,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Followers => f.write_str("followers"),
            Direction::Following => f.write_str("following"),
        }
    }
}

/// One account in the scanned list.
///
/// `identifier` is the stable id used for lookups (a DID on Bluesky); `handle` is the
/// human-readable name and may change over time.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    pub handle: String,
    pub identifier: String,
}

impl Member {
    pub fn new(handle: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            identifier: identifier.into(),
        }
    }
}

/// Classification of a single member.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Active,
    Inactive,
    NeverPosted,
    Unknown,
}

impl ActivityStatus {
    /// True when this status counts toward the ghost total under `count_never_posted`.
    pub fn is_ghost(self, count_never_posted: bool) -> bool {
        match self {
            ActivityStatus::Inactive => true,
            ActivityStatus::NeverPosted => count_never_posted,
            ActivityStatus::Active | ActivityStatus::Unknown => false,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ActivityStatus::Active => "active",
            ActivityStatus::Inactive => "inactive",
            ActivityStatus::NeverPosted => "never posted",
            ActivityStatus::Unknown => "unknown",
        }
    }
}

/// Whole days since the last post, or a sentinel when there is no usable post.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaysInactive {
    Days(u64),
    /// Feed query succeeded with zero posts.
    Never,
    /// Feed query failed.
    Unknown,
}

impl DaysInactive {
    pub fn days(self) -> Option<u64> {
        match self {
            DaysInactive::Days(d) => Some(d),
            DaysInactive::Never | DaysInactive::Unknown => None,
        }
    }
}

impl fmt::Display for DaysInactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaysInactive::Days(d) => write!(f, "{d}"),
            DaysInactive::Never | DaysInactive::Unknown => f.write_str("N/A"),
        }
    }
}

/// Per-member outcome of a scan. Built once by the classifier and never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub member: Member,
    pub last_post_at: Option<DateTime<Utc>>,
    pub days_inactive: DaysInactive,
    pub status: ActivityStatus,
}

/// Coarse verdict on an inactivity rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateHealth {
    Healthy,
    Critical,
}

/// Aggregate over a finished (or cut short) scan.
///
/// `records` follows enumeration order. When `cancelled` is set, only members whose probe
/// completed are present; when `enumeration_truncated` is set, the member list itself stopped
/// early because a later page failed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub scanned_count: usize,
    pub ghost_count: usize,
    /// Percentage in `[0, 100]`; `0` when nothing was scanned.
    pub inactivity_rate: f64,
    pub records: Vec<ActivityRecord>,
    pub cancelled: bool,
    pub enumeration_truncated: bool,
}

impl ScanResult {
    /// True when the scan did not cover every requested member.
    pub fn is_partial(&self) -> bool {
        self.cancelled || self.enumeration_truncated
    }

    pub fn health(&self) -> RateHealth {
        if self.inactivity_rate < ScanDefaults::HEALTHY_RATE_CEILING {
            RateHealth::Healthy
        } else {
            RateHealth::Critical
        }
    }
}

/// Bounded retry with exponential backoff for transient probe failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: ScanDefaults::MAX_RETRIES,
            backoff_base: Duration::from_millis(ScanDefaults::BACKOFF_BASE_MS),
            backoff_max: Duration::from_millis(ScanDefaults::BACKOFF_MAX_MS),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based), doubled each time and capped at `backoff_max`.
    /// A server-supplied delay wins when it is longer.
    pub fn delay_for(&self, retry: u32, server_hint: Option<Duration>) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        let backoff = self
            .backoff_base
            .checked_mul(factor)
            .unwrap_or(self.backoff_max)
            .min(self.backoff_max);
        match server_hint {
            Some(hint) if hint > backoff => hint,
            _ => backoff,
        }
    }
}

/// Lib options for [`scan`](crate::scan). Everything except the target account.
#[derive(Clone, Debug)]
pub struct ScanOpts {
    pub direction: Direction,
    /// Stop enumerating after this many members.
    pub max_members: usize,
    /// Elapsed time strictly above this is inactive.
    pub threshold: TimeDelta,
    /// Number of probes allowed in flight at once. Values below 1 are treated as 1.
    pub concurrency: usize,
    /// Budget for a single probe attempt.
    pub probe_timeout: Duration,
    pub retry: RetryPolicy,
    /// Whether never-posted members count as ghosts.
    pub count_never_posted: bool,
}

impl Default for ScanOpts {
    fn default() -> Self {
        Self {
            direction: Direction::default(),
            max_members: ScanDefaults::MAX_MEMBERS,
            threshold: TimeDelta::days(ScanDefaults::THRESHOLD_DAYS),
            concurrency: ScanDefaults::CONCURRENCY,
            probe_timeout: Duration::from_secs(ScanDefaults::TIMEOUT_SECS),
            retry: RetryPolicy::default(),
            count_never_posted: true,
        }
    }
}

impl From<&Opts> for ScanOpts {
    fn from(o: &Opts) -> Self {
        ScanOpts {
            direction: o.direction,
            max_members: o.max_members,
            threshold: TimeDelta::try_days(o.threshold_days).unwrap_or(TimeDelta::MAX),
            concurrency: o.concurrency,
            probe_timeout: Duration::from_secs(o.timeout_secs),
            retry: RetryPolicy {
                max_retries: o.retries,
                backoff_base: Duration::from_millis(o.backoff_base_ms),
                backoff_max: Duration::from_millis(o.backoff_max_ms),
            },
            count_never_posted: o.count_never_posted,
        }
    }
}

/// Full options (CLI). Use [`ScanOpts`] for lib.
#[derive(Clone, Debug)]
pub struct Opts {
    pub direction: Direction,
    pub max_members: usize,
    pub threshold_days: i64,
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// XRPC service base URL.
    pub service_url: String,
    pub count_never_posted: bool,
    /// Print the result as JSON instead of the text report.
    pub json: bool,
    /// Debug logging.
    pub verbose: bool,
    /// Prompt for an access token when none is found in the environment.
    pub prompt_token: bool,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            direction: Direction::default(),
            max_members: ScanDefaults::MAX_MEMBERS,
            threshold_days: ScanDefaults::THRESHOLD_DAYS,
            concurrency: ScanDefaults::CONCURRENCY,
            timeout_secs: ScanDefaults::TIMEOUT_SECS,
            retries: ScanDefaults::MAX_RETRIES,
            backoff_base_ms: ScanDefaults::BACKOFF_BASE_MS,
            backoff_max_ms: ScanDefaults::BACKOFF_MAX_MS,
            service_url: ScanDefaults::PUBLIC_SERVICE_URL.to_string(),
            count_never_posted: true,
            json: false,
            verbose: false,
            prompt_token: false,
        }
    }
}

/// Shared flag that asks a running scan to stop dispatching new probes.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
