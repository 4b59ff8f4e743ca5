//! Plain-text and JSON output for a finished scan.

use anyhow::{Context, Result};
use colored::Colorize;
use std::fmt::Write as _;

use crate::types::{ActivityRecord, ActivityStatus, RateHealth, ScanResult};

/// Last-post column: `dd/mm/YYYY`, or why there is no date.
pub fn last_post_label(record: &ActivityRecord) -> String {
    match (record.status, record.last_post_at) {
        (_, Some(at)) => at.format("%d/%m/%Y").to_string(),
        (ActivityStatus::NeverPosted, None) => "no posts".to_string(),
        _ => "access error".to_string(),
    }
}

fn status_cell(status: ActivityStatus) -> String {
    let label = status.label();
    match status {
        ActivityStatus::Active => label.green().to_string(),
        ActivityStatus::Inactive | ActivityStatus::NeverPosted => label.red().to_string(),
        ActivityStatus::Unknown => label.yellow().to_string(),
    }
}

fn health_cell(health: RateHealth) -> String {
    match health {
        RateHealth::Healthy => "healthy".green().to_string(),
        RateHealth::Critical => "critical".red().bold().to_string(),
    }
}

/// Summary block followed by one line per member, in scan order.
pub fn render_text(result: &ScanResult) -> String {
    let mut out = String::new();
    let handle_width = result
        .records
        .iter()
        .map(|r| r.member.handle.len() + 1)
        .max()
        .unwrap_or(0)
        .max(7);

    let _ = writeln!(out, "Scanned:         {}", result.scanned_count);
    let _ = writeln!(out, "Ghosts:          {}", result.ghost_count);
    let _ = writeln!(
        out,
        "Inactivity rate: {:.1} % ({})",
        result.inactivity_rate,
        health_cell(result.health())
    );
    if result.cancelled {
        let _ = writeln!(out, "{}", "Scan was cancelled; results are partial.".yellow());
    }
    if result.enumeration_truncated {
        let _ = writeln!(
            out,
            "{}",
            "Member list was cut short by an API error; results are partial.".yellow()
        );
    }
    if result.records.is_empty() {
        return out;
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<handle_width$}  {:<12}  {:>5}  {}",
        "member", "last post", "days", "status"
    );
    for record in &result.records {
        let handle = format!("@{}", record.member.handle);
        let _ = writeln!(
            out,
            "{:<handle_width$}  {:<12}  {:>5}  {}",
            handle,
            last_post_label(record),
            record.days_inactive.to_string(),
            status_cell(record.status)
        );
    }
    out
}

pub fn render_json(result: &ScanResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("serialize scan result")
}
