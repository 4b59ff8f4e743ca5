//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::sync::OnceLock;
use std::time::Duration;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    config_filename: String,
    token_env_key: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                config_filename: format!(".{pkg}.toml"),
                token_env_key: format!("{}_ACCESS_TOKEN", pkg.to_uppercase()),
            }
        })
    }

    /// Per-directory settings file, e.g. `.ghostscan.toml`.
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Environment variable holding the optional bearer token, e.g. `GHOSTSCAN_ACCESS_TOKEN`.
    pub fn token_env_key(&self) -> &str {
        &self.token_env_key
    }
}

// ---- Scan ----

/// Defaults for a scan when neither the settings file nor the CLI say otherwise.
pub struct ScanDefaults;

impl ScanDefaults {
    pub const THRESHOLD_DAYS: i64 = 90;
    /// Sequential by default.
    pub const CONCURRENCY: usize = 1;
    pub const MAX_MEMBERS: usize = 100;
    pub const TIMEOUT_SECS: u64 = 10;
    pub const MAX_RETRIES: u32 = 2;
    pub const BACKOFF_BASE_MS: u64 = 500;
    pub const BACKOFF_MAX_MS: u64 = 30_000;
    /// Rates below this are healthy; at or above, critical.
    pub const HEALTHY_RATE_CEILING: f64 = 30.0;
    /// Unauthenticated AppView; graph and feed reads need no session there.
    pub const PUBLIC_SERVICE_URL: &'static str = "https://public.api.bsky.app";
}

// ---- Pipeline ----

/// Page size requested from the graph API (AppView maximum is 100).
pub const GRAPH_PAGE_LIMIT: usize = 100;

/// Member and record channel capacity. Enumeration runs ahead of probing by at most this many.
pub const MEMBER_CHANNEL_CAP: usize = 256;

/// Progress events buffered for a slow renderer before the oldest are dropped.
pub const PROGRESS_BUFFER_CAP: usize = 64;

/// How often a retry backoff wakes up to check for cancellation.
pub const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// HTTP client timeout; the per-probe timeout applies on top of this.
pub const HTTP_TIMEOUT_SECS: u64 = 30;
