use chrono::{Duration, NaiveDate, NaiveTime, Timelike};

use crate::model::*;

// ── Slot generation ───────────────────────────────────────────────

/// Start times on a `granularity` grid anchored at `window.start`, keeping
/// only those whose whole `duration` fits before `window.end`.
pub fn candidate_starts(
    window: &Span,
    duration_minutes: u32,
    granularity_minutes: u32,
) -> Vec<WallClock> {
    if duration_minutes == 0 || granularity_minutes == 0 {
        return Vec::new();
    }
    let duration = Duration::minutes(i64::from(duration_minutes));
    let step = Duration::minutes(i64::from(granularity_minutes));

    let mut starts = Vec::new();
    let mut start = window.start;
    while start + duration <= window.end {
        starts.push(start);
        start += step;
    }
    starts
}

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end
        {
            last.end = last.end.max(span.end);
            continue;
        }
        merged.push(span);
    }
    merged
}

/// Drop every candidate whose `[start, start + duration)` overlaps a busy
/// span. `candidates` must be ascending; `busy` may be in any order.
pub fn free_starts(
    candidates: &[WallClock],
    duration_minutes: u32,
    busy: &[Span],
) -> Vec<WallClock> {
    let mut busy = busy.to_vec();
    busy.sort_by_key(|s| s.start);
    let busy = merge_overlapping(&busy);

    let mut bi = 0;
    candidates
        .iter()
        .copied()
        .filter(|&start| {
            let slot = Span::starting_at(start, duration_minutes);
            while bi < busy.len() && busy[bi].end <= slot.start {
                bi += 1;
            }
            !(bi < busy.len() && busy[bi].start < slot.end)
        })
        .collect()
}

/// Bookable start times for one day, in chronological order.
pub fn day_slots(
    hours: DayHours,
    date: NaiveDate,
    duration_minutes: u32,
    granularity_minutes: u32,
    busy: &[Span],
) -> Vec<NaiveTime> {
    let DayHours::Open(open) = hours else {
        return Vec::new();
    };
    let candidates = candidate_starts(&open.on(date), duration_minutes, granularity_minutes);
    free_starts(&candidates, duration_minutes, busy)
        .into_iter()
        .map(|t| t.time())
        .collect()
}

/// True if `span` is one of the day's offered slots ignoring existing
/// appointments: inside the open window and on the grid.
pub fn is_offered(hours: DayHours, date: NaiveDate, span: &Span, granularity_minutes: u32) -> bool {
    let DayHours::Open(open) = hours else {
        return false;
    };
    if granularity_minutes == 0 {
        return false;
    }
    let window = open.on(date);
    if !window.contains_span(span) {
        return false;
    }
    if span.start.second() != 0 || span.start.nanosecond() != 0 {
        return false;
    }
    (span.start - window.start).num_minutes() % i64::from(granularity_minutes) == 0
}
