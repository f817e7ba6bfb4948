use time::{Date, Time};

use crate::model::*;

/// Free sub-windows of `[from, to)` on `date`: the spans where no block is
/// active and confirmed bookings sit below the capacity ceiling.
///
/// One boundary sweep over the clamped entry edges. All edges at a given
/// instant are folded together before the state is sampled, so a booking
/// ending exactly where another starts never reads as stacked.
pub fn free_windows(ledger: &Ledger, date: Date, from: Time, to: Time) -> Vec<TimeWindow> {
    let query = TimeWindow { date, start: from, end: to };
    let ceiling = if ledger.policy.capacity_bounded {
        ledger.policy.max_concurrent as i32
    } else {
        1
    };

    // (instant, occupancy delta, blocked delta), clamped to the query range.
    let mut edges: Vec<(Time, i32, i32)> = Vec::new();
    for b in ledger.overlapping_blocks(&query) {
        edges.push((b.window.start.max(from), 0, 1));
        edges.push((b.window.end.min(to), 0, -1));
    }
    for b in ledger.overlapping_confirmed(&query) {
        edges.push((b.window.start.max(from), 1, 0));
        edges.push((b.window.end.min(to), -1, 0));
    }
    if edges.is_empty() {
        return vec![query];
    }
    edges.sort_by_key(|e| e.0);

    let mut free = Vec::new();
    let mut occupancy = 0;
    let mut blocked = 0;
    // Start of the currently open free run, if any.
    let mut open = Some(from);
    let mut i = 0;
    while i < edges.len() {
        let at = edges[i].0;
        while i < edges.len() && edges[i].0 == at {
            occupancy += edges[i].1;
            blocked += edges[i].2;
            i += 1;
        }
        let is_free = blocked == 0 && occupancy < ceiling;
        match open {
            Some(start) if !is_free => {
                if start < at {
                    free.push(TimeWindow { date, start, end: at });
                }
                open = None;
            }
            None if is_free => open = Some(at),
            _ => {}
        }
    }
    if let Some(start) = open
        && start < to
    {
        free.push(TimeWindow { date, start, end: to });
    }
    free
}
