//! Post-match cleanup: distance filter and stop-order repair.

use std::collections::BTreeMap;

use tracing::{debug, info};

use rawnav_model::{StopMatch, TripKey};

use crate::{MatchError, Notice};

#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub matches: Vec<StopMatch>,
    pub dropped: Vec<StopMatch>,
}

impl FilterOutcome {
    pub fn removed(&self) -> usize {
        self.dropped.len()
    }

    pub fn notices(&self, max_distance_ft: f64) -> impl Iterator<Item = Notice> + '_ {
        self.dropped
            .iter()
            .map(move |stop_match| Notice::match_too_far(stop_match, max_distance_ft))
    }
}

/// Keeps matches strictly closer than `max_distance_ft`, preserving order.
pub fn drop_far_matches(matches: Vec<StopMatch>, max_distance_ft: f64) -> FilterOutcome {
    let (kept, dropped): (Vec<StopMatch>, Vec<StopMatch>) = matches
        .into_iter()
        .partition(|stop_match| stop_match.dist_nearest_point_from_stop < max_distance_ft);
    info!(
        "removed {} of {} stop matches at or beyond {} ft",
        dropped.len(),
        kept.len() + dropped.len(),
        max_distance_ft
    );
    FilterOutcome {
        matches: kept,
        dropped,
    }
}

/// A match removed because it pointed backwards along the trace.
#[derive(Debug, Clone)]
pub struct OrderViolation {
    pub removed: StopMatch,
    pub previous: StopMatch,
}

impl OrderViolation {
    pub fn to_notice(&self) -> Notice {
        Notice::stop_order_violation(&self.removed, &self.previous)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RepairOutcome {
    pub matches: Vec<StopMatch>,
    pub violations: Vec<OrderViolation>,
}

impl RepairOutcome {
    pub fn removed(&self) -> usize {
        self.violations.len()
    }
}

/// Removes matches until, within every trip, `index_loc` never decreases as
/// `stop_sort_order` increases.
///
/// Each pass drops every match whose `index_loc` is lower than that of the
/// match immediately before it; passes repeat until a pass removes nothing.
/// The result is sorted by trip, then sort order. Running it again on its own
/// output removes nothing.
pub fn repair_monotonic_order(matches: Vec<StopMatch>) -> Result<RepairOutcome, MatchError> {
    let total = matches.len();
    let mut by_trip: BTreeMap<TripKey, Vec<StopMatch>> = BTreeMap::new();
    for stop_match in matches {
        by_trip
            .entry(stop_match.trip_key())
            .or_default()
            .push(stop_match);
    }

    let mut outcome = RepairOutcome::default();
    for (trip, mut rows) in by_trip {
        rows.sort_by_key(|row| row.stop_sort_order);
        if let Some(pair) = rows
            .windows(2)
            .find(|pair| pair[0].stop_sort_order == pair[1].stop_sort_order)
        {
            return Err(MatchError::DuplicateSortOrder {
                trip,
                stop_sort_order: pair[0].stop_sort_order,
            });
        }

        let mut passes = 0;
        loop {
            passes += 1;
            let mut kept: Vec<StopMatch> = Vec::with_capacity(rows.len());
            let mut removed_this_pass = 0;
            for (position, row) in rows.iter().enumerate() {
                match position.checked_sub(1).map(|prev| &rows[prev]) {
                    Some(previous) if row.index_loc < previous.index_loc => {
                        removed_this_pass += 1;
                        outcome.violations.push(OrderViolation {
                            removed: row.clone(),
                            previous: previous.clone(),
                        });
                    }
                    _ => kept.push(row.clone()),
                }
            }
            rows = kept;
            if removed_this_pass == 0 {
                break;
            }
        }
        if passes > 1 {
            debug!(trip = %trip, passes, "repaired stop order");
        }
        outcome.matches.extend(rows);
    }

    info!(
        "removed {} of {} stop matches that were out of order",
        outcome.removed(),
        total
    );
    Ok(outcome)
}
