//! Aggregator: reduce records into counts and an inactivity rate.

use crate::types::{ActivityRecord, ScanResult};

/// Counts over a record set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Summary {
    pub scanned_count: usize,
    pub ghost_count: usize,
    pub inactivity_rate: f64,
}

/// Single pass over `records`. Pure: the same input always gives the same output.
pub fn summarize(records: &[ActivityRecord], count_never_posted: bool) -> Summary {
    debug_assert!(
        {
            let mut ids = std::collections::HashSet::new();
            records.iter().all(|r| ids.insert(r.member.identifier.as_str()))
        },
        "duplicate member in record set"
    );
    let scanned_count = records.len();
    let ghost_count = records
        .iter()
        .filter(|r| r.status.is_ghost(count_never_posted))
        .count();
    let inactivity_rate = if scanned_count > 0 {
        ghost_count as f64 / scanned_count as f64 * 100.0
    } else {
        0.0
    };
    Summary {
        scanned_count,
        ghost_count,
        inactivity_rate,
    }
}

/// Wrap `records` into a [`ScanResult`] with both partial flags cleared.
pub fn aggregate(records: Vec<ActivityRecord>, count_never_posted: bool) -> ScanResult {
    let Summary {
        scanned_count,
        ghost_count,
        inactivity_rate,
    } = summarize(&records, count_never_posted);
    ScanResult {
        scanned_count,
        ghost_count,
        inactivity_rate,
        records,
        cancelled: false,
        enumeration_truncated: false,
    }
}
