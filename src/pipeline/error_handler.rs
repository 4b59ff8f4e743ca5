use log::warn;

use super::context::{EnumerationTarget, ScanShared};
use super::enumerate::EnumerationError;

/// Check enumeration state after the pipeline has been joined: a failure before any member
/// was obtained is fatal; a later one only truncates. Returns whether the list was truncated.
pub fn check_for_initial_error_or_truncation(
    target: &EnumerationTarget,
    shared: &ScanShared,
) -> Result<bool, EnumerationError> {
    if let Some(source) = shared.take_first_error() {
        return Err(EnumerationError {
            account: target.account.clone(),
            direction: target.direction,
            source,
        });
    }
    let truncated = shared.was_truncated();
    if truncated {
        warn!(
            "Member list for {} was cut short after {} members; result is partial",
            target.account,
            shared.enumerated()
        );
    }
    Ok(truncated)
}
