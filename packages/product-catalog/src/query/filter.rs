//! Time-event filter algorithms
//!
//! Query results carrying start/end times and a priority are reduced to a
//! set of events that do not overlap (within `epsilon` milliseconds).

use chrono::{DateTime, NaiveDateTime};

use crate::domain::query::{FilterAlgorithm, FilterAlgorithmKind};
use crate::error::{CatalogError, Result};

/// An item occupying `[start, end]` (milliseconds) with a priority
#[derive(Debug, Clone, PartialEq)]
pub struct TimeEvent<T> {
    pub start: i64,
    pub end: i64,
    pub priority: f64,
    pub item: T,
}

impl<T> TimeEvent<T> {
    pub fn new(start: i64, end: i64, priority: f64, item: T) -> Self {
        Self {
            start,
            end,
            priority,
            item,
        }
    }

    pub fn duration(&self) -> i64 {
        self.end - self.start
    }
}

/// `a` starts first and ends before `b` starts, give or take `epsilon`
fn happens_before<T>(a: &TimeEvent<T>, b: &TimeEvent<T>, epsilon: i64) -> bool {
    a.start < b.start && b.start - a.end + epsilon > 0
}

/// Apply `algorithm`; the result is ordered by start time
pub fn filter_events<T>(events: Vec<TimeEvent<T>>, algorithm: &FilterAlgorithm) -> Vec<TimeEvent<T>> {
    match algorithm.kind {
        FilterAlgorithmKind::WeightedHash => greatest_weighted_path(events, algorithm.epsilon),
        FilterAlgorithmKind::TakeHighestPriority => take_highest_priority(events, algorithm.epsilon),
    }
}

/// Chain of events, each happening before the next, covering the most time.
/// Ties go to the chain with the larger priority sum.
fn greatest_weighted_path<T>(mut events: Vec<TimeEvent<T>>, epsilon: i64) -> Vec<TimeEvent<T>> {
    if events.is_empty() {
        return events;
    }
    events.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));

    let n = events.len();
    let mut weight = vec![0i64; n];
    let mut priority = vec![0f64; n];
    let mut parent: Vec<Option<usize>> = vec![None; n];

    for i in 0..n {
        weight[i] = events[i].duration();
        priority[i] = events[i].priority;
        for j in 0..i {
            if !happens_before(&events[j], &events[i], epsilon) {
                continue;
            }
            let w = weight[j] + events[i].duration();
            let p = priority[j] + events[i].priority;
            if w > weight[i] || (w == weight[i] && p > priority[i]) {
                weight[i] = w;
                priority[i] = p;
                parent[i] = Some(j);
            }
        }
    }

    let mut best = 0;
    for i in 1..n {
        if weight[i] > weight[best] || (weight[i] == weight[best] && priority[i] > priority[best]) {
            best = i;
        }
    }

    let mut chain = vec![best];
    let mut current = best;
    while let Some(p) = parent[current] {
        chain.push(p);
        current = p;
    }
    chain.reverse();

    let mut slots: Vec<Option<TimeEvent<T>>> = events.into_iter().map(Some).collect();
    chain.into_iter().filter_map(|i| slots[i].take()).collect()
}

/// Keep every event not overlapped by an event of strictly higher priority
fn take_highest_priority<T>(mut events: Vec<TimeEvent<T>>, epsilon: i64) -> Vec<TimeEvent<T>> {
    events.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));

    let keep: Vec<bool> = events
        .iter()
        .map(|e| {
            !events.iter().any(|other| {
                other.priority > e.priority
                    && !happens_before(e, other, epsilon)
                    && !happens_before(other, e, epsilon)
            })
        })
        .collect();

    events
        .into_iter()
        .zip(keep)
        .filter_map(|(e, k)| k.then_some(e))
        .collect()
}

/// Milliseconds since the epoch from an RFC 3339 timestamp, a naive UTC
/// timestamp, or a plain integer
pub fn parse_time_millis(value: &str) -> Result<i64> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.timestamp_millis());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt.and_utc().timestamp_millis());
        }
    }
    value.parse::<i64>().map_err(|_| {
        CatalogError::query_formulation(format!("'{}' is not a recognizable time", value))
    })
}
