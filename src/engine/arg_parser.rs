use clap::Parser;

/// Find inactive accounts among a Bluesky account's followers or follows.
#[derive(Clone, Debug, Parser)]
#[command(name = "ghostscan")]
#[command(about = "Scan followers (or follows) and report who has stopped posting.")]
pub struct Cli {
    /// Account to scan: handle (alice.bsky.social) or DID.
    #[arg(value_name = "ACCOUNT")]
    pub account: String,

    /// Scan the accounts ACCOUNT follows instead of its followers.
    #[arg(long, short = 'f', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub following: Option<bool>,

    /// Maximum number of members to scan.
    #[arg(long, short = 'n', value_parser = clap::value_parser!(usize))]
    pub max_members: Option<usize>,

    /// Days without a post after which a member counts as inactive.
    #[arg(long, short = 't', value_parser = clap::value_parser!(i64).range(0..))]
    pub threshold_days: Option<i64>,

    /// Number of members probed at the same time.
    #[arg(long, short = 'j', value_parser = clap::value_parser!(usize))]
    pub concurrency: Option<usize>,

    /// Seconds allowed for a single latest-post request.
    #[arg(long, value_parser = clap::value_parser!(u64))]
    pub timeout: Option<u64>,

    /// Retries for timeouts, connection errors and rate limits.
    #[arg(long, value_parser = clap::value_parser!(u32))]
    pub retries: Option<u32>,

    /// XRPC service URL. Default: the public AppView.
    #[arg(long, value_name = "URL")]
    pub service: Option<String>,

    /// Do not count never-posted members as ghosts.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub exclude_never_posted: Option<bool>,

    /// Print the result as JSON.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub json: Option<bool>,

    /// Prompt for an access token if GHOSTSCAN_ACCESS_TOKEN is not set.
    #[arg(long)]
    pub prompt_token: bool,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}
