//! Classifier: probe outcome + reference time + threshold -> activity record.

use chrono::{DateTime, TimeDelta, Utc};

use crate::types::{ActivityRecord, ActivityStatus, DaysInactive, Member};

use super::probe::{ProbeOutcome, ProbeResult};

/// Whole days in `elapsed`, truncated. Negative spans (post dated after `now`) count as 0.
pub fn whole_days(elapsed: TimeDelta) -> u64 {
    u64::try_from(elapsed.num_days()).unwrap_or(0)
}

/// Build the record for `member`.
///
/// Inactive only when the elapsed time strictly exceeds `threshold`; a post exactly at the
/// boundary is still active.
pub fn classify(
    member: Member,
    outcome: &ProbeResult,
    now: DateTime<Utc>,
    threshold: TimeDelta,
) -> ActivityRecord {
    match outcome {
        Ok(ProbeOutcome::Found(at)) => {
            let elapsed = now.signed_duration_since(*at);
            let status = if elapsed > threshold {
                ActivityStatus::Inactive
            } else {
                ActivityStatus::Active
            };
            ActivityRecord {
                member,
                last_post_at: Some(*at),
                days_inactive: DaysInactive::Days(whole_days(elapsed)),
                status,
            }
        }
        Ok(ProbeOutcome::Empty) => ActivityRecord {
            member,
            last_post_at: None,
            days_inactive: DaysInactive::Never,
            status: ActivityStatus::NeverPosted,
        },
        Err(_) => ActivityRecord {
            member,
            last_post_at: None,
            days_inactive: DaysInactive::Unknown,
            status: ActivityStatus::Unknown,
        },
    }
}
