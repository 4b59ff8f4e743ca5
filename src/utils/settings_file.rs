//! Load `.ghostscan.toml` from a directory (CLI only). Lib callers pass ScanOpts directly.

use serde::Deserialize;
use std::path::Path;

use crate::types::{Direction, Opts};
use crate::utils::config::PackagePaths;

#[derive(Debug, Default, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    settings: ScanSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScanSection {
    direction: Option<Direction>,
    max_members: Option<usize>,
    threshold_days: Option<i64>,
    concurrency: Option<usize>,
    timeout_secs: Option<u64>,
    retries: Option<u32>,
    backoff_base_ms: Option<u64>,
    backoff_max_ms: Option<u64>,
    service_url: Option<String>,
    count_never_posted: Option<bool>,
    json: Option<bool>,
    verbose: Option<bool>,
}

/// Parse settings from TOML text. Errors are logged and yield None.
pub fn parse_settings(text: &str, origin: &str) -> Option<SettingsFile> {
    toml::from_str(text)
        .map_err(|e| log::warn!("{}: {}", origin, e))
        .ok()
}

/// Load the settings file from `dir` if present. Returns None if missing, unreadable or invalid.
pub fn load_settings_file(dir: &Path) -> Option<SettingsFile> {
    let path = dir.join(PackagePaths::get().config_filename());
    let s = std::fs::read_to_string(&path).ok()?;
    parse_settings(&s, &path.display().to_string())
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($section:expr, $opts:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(v) = $section.$field.clone() {
                $opts.$field = v;
            }
        )+
    };
}

/// Apply file settings to opts (only fields present in the file). Call before applying CLI flags.
pub fn apply_file_to_opts(file: &SettingsFile, opts: &mut Opts) {
    let section = &file.settings;
    apply_file_opt!(
        section,
        opts,
        direction,
        max_members,
        threshold_days,
        concurrency,
        timeout_secs,
        retries,
        backoff_base_ms,
        backoff_max_ms,
        service_url,
        count_never_posted,
        json,
        verbose,
    );
}
