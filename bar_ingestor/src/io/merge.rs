//! Keep-last merge of bar sequences keyed by timestamp.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};

use crate::models::bar::Bar;

/// Row counts of one merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeStats {
    pub existing: usize,
    pub fresh: usize,
    /// Rows after the merge.
    pub combined: usize,
    /// Fresh timestamps that were not present before.
    pub added: usize,
    /// Existing timestamps overwritten by a fresh bar.
    pub replaced: usize,
}

/// Merges `fresh` into `existing`.
///
/// The result holds one bar per distinct timestamp, sorted ascending. When a
/// timestamp occurs more than once the bar seen last wins, so fresh bars
/// override existing ones.
pub fn merge_bars(existing: Vec<Bar>, fresh: Vec<Bar>) -> (Vec<Bar>, MergeStats) {
    let existing_len = existing.len();
    let fresh_len = fresh.len();

    let mut by_ts: BTreeMap<DateTime<Utc>, Bar> = BTreeMap::new();
    for bar in existing {
        by_ts.insert(bar.timestamp, bar);
    }
    let before = by_ts.len();

    let mut added = 0;
    let mut replaced = 0;
    let mut fresh_seen = HashSet::new();
    for bar in fresh {
        let ts = bar.timestamp;
        let was_present = by_ts.insert(ts, bar).is_some();
        // a timestamp repeated inside `fresh` counts once
        if fresh_seen.insert(ts) {
            if was_present {
                replaced += 1;
            } else {
                added += 1;
            }
        }
    }

    let merged: Vec<Bar> = by_ts.into_values().collect();
    debug_assert_eq!(merged.len(), before + added);
    let stats = MergeStats {
        existing: existing_len,
        fresh: fresh_len,
        combined: merged.len(),
        added,
        replaced,
    };
    (merged, stats)
}

/// Sorts `bars` by timestamp and keeps the last bar of each timestamp.
pub fn dedup_sorted(bars: Vec<Bar>) -> Vec<Bar> {
    merge_bars(Vec::new(), bars).0
}
