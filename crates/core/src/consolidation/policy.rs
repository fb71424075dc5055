//! Accounting policy - pure duration aggregation
//!
//! Two policies coexist and are selectable independently per record kind:
//! summing the explicit hours each record carries, or inferring duration
//! from how many fixed capture intervals were observed.

use worklog_domain::{round_hours, AccountingPolicy, RawRecord};

/// Compute the aggregate hours for a set of eligible records.
///
/// Returns `None` for an empty set so the engine reports "nothing to
/// consolidate" instead of creating a zero-hour time entry. Records
/// without explicit hours contribute zero under [`AccountingPolicy::Sum`].
pub fn aggregate_hours(records: &[RawRecord], policy: AccountingPolicy) -> Option<f64> {
    if records.is_empty() {
        return None;
    }

    let total = match policy {
        AccountingPolicy::Sum => records.iter().map(|record| record.hours.unwrap_or(0.0)).sum(),
        AccountingPolicy::CountInterval { interval_minutes } => {
            records.len() as f64 * f64::from(interval_minutes) / 60.0
        }
    };

    Some(round_hours(total))
}
