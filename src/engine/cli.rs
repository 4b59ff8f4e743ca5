//! CLI command handler: load settings, build the client, run the scan, print the report.

use anyhow::{Context, Result};
use kdam::Animation;
use log::{debug, info, warn};
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;

use crate::client::{BskyClient, ProfileClient};
use crate::engine::arg_parser::Cli;
use crate::engine::progress::{
    BarSink, ProgressBarConfig, ProgressSink, close_progress_bar, create_progress_bar,
};
use crate::report::{render_json, render_text};
use crate::types::{CancelToken, Direction, Opts, ScanOpts};
use crate::utils::{apply_file_to_opts, get_access_token, load_settings_file, setup_logging};

/// Overwrite opts with every flag given on the command line.
pub fn apply_cli_to_opts(cli: &Cli, opts: &mut Opts) {
    if let Some(following) = cli.following {
        opts.direction = if following {
            Direction::Following
        } else {
            Direction::Followers
        };
    }
    if let Some(n) = cli.max_members {
        opts.max_members = n;
    }
    if let Some(days) = cli.threshold_days {
        opts.threshold_days = days;
    }
    if let Some(c) = cli.concurrency {
        opts.concurrency = c;
    }
    if let Some(secs) = cli.timeout {
        opts.timeout_secs = secs;
    }
    if let Some(r) = cli.retries {
        opts.retries = r;
    }
    if let Some(url) = &cli.service {
        opts.service_url = url.clone();
    }
    if let Some(exclude) = cli.exclude_never_posted {
        opts.count_never_posted = !exclude;
    }
    if let Some(json) = cli.json {
        opts.json = json;
    }
    if let Some(verbose) = cli.verbose {
        opts.verbose = verbose;
    }
    opts.prompt_token = cli.prompt_token;
}

/// Defaults, then the settings file in `dir`, then CLI flags.
pub fn setup_opts(cli: &Cli, dir: &Path) -> Opts {
    let mut opts = Opts::default();
    if let Some(file) = load_settings_file(dir) {
        apply_file_to_opts(&file, &mut opts);
    }
    apply_cli_to_opts(cli, &mut opts);
    opts
}

fn log_profile_overview(client: &dyn ProfileClient, account: &str) {
    match client.profile(account) {
        Ok(p) => info!(
            "@{}: {} followers, {} follows",
            p.handle, p.followers_count, p.follows_count
        ),
        Err(e) => debug!("Profile overview unavailable for {}: {}", account, e),
    }
}

/// Run a scan for `cli.account` and print the report.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let dir = std::env::current_dir().context("read current directory")?;
    let opts = setup_opts(cli, &dir);
    setup_logging(opts.verbose);
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        opts
    );
    if opts.max_members == 0 {
        warn!("--max-members is 0; nothing to scan");
    }

    let token = get_access_token(&dir, opts.prompt_token)?;
    let client = Arc::new(BskyClient::new(&opts.service_url, token)?);
    log_profile_overview(client.as_ref(), &cli.account);

    let cancel = CancelToken::new();
    let cancel_handler = cancel.clone();
    ctrlc::set_handler(move || {
        cancel_handler.cancel();
    })
    .context("set Ctrl+C handler")?;

    let bar = std::io::stderr().is_terminal().then(|| {
        create_progress_bar(ProgressBarConfig::new(0, "Scanning", Animation::Classic))
    });
    let progress = bar
        .as_ref()
        .map(|b| Box::new(BarSink::new(b)) as Box<dyn ProgressSink>);

    let scan_opts = ScanOpts::from(&opts);
    let result = crate::scan(
        client.clone(),
        client,
        &cli.account,
        &scan_opts,
        &cancel,
        progress,
    );
    if let Some(b) = &bar {
        close_progress_bar(b);
    }
    let result = result?;

    if opts.json {
        println!("{}", render_json(&result)?);
    } else {
        print!("{}", render_text(&result));
    }
    Ok(())
}
