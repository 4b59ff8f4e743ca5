//! Access token loading: env var → .env in dir → secure prompt (only when asked).

use anyhow::{Context, Result};
use colored::Colorize;
use log::{debug, info};
use std::path::Path;

use crate::utils::config::PackagePaths;

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn try_env_then_dotenv(dir: &Path) -> Option<String> {
    let key = PackagePaths::get().token_env_key();
    if let Some(s) = non_empty_env(key) {
        return Some(s);
    }
    let env_path = dir.join(".env");
    if env_path.is_file() {
        let _ = dotenvy::from_path(&env_path);
        return non_empty_env(key);
    }
    None
}

/// Read an already-issued access token: env (`GHOSTSCAN_ACCESS_TOKEN`) → `.env` in `dir` →
/// hidden prompt when `prompt` is set. `Ok(None)` means scan anonymously.
pub fn get_access_token(dir: &Path, prompt: bool) -> Result<Option<String>> {
    if let Some(s) = try_env_then_dotenv(dir) {
        info!("Access token found in environment");
        return Ok(Some(s));
    }
    if !prompt {
        debug!("No access token; using anonymous requests");
        return Ok(None);
    }
    let label = format!("[{}]", env!("CARGO_PKG_NAME")).cyan().bold();
    let token = rpassword::prompt_password(format!("{} Access token: ", label))
        .context("read access token")?;
    let token = token.trim().to_string();
    Ok((!token.is_empty()).then_some(token))
}
