// libs/availability-cell/src/services/slots.rs
use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use shared_config::SlotPolicy;

use crate::models::{OpenInterval, ReservedSpan, Slot, SlotUnavailableReason};

/// Pure slot generation. Identical inputs always yield identical output.
pub struct SlotGenerator;

impl SlotGenerator {
    /// Expand open intervals into candidate slots for `date`.
    ///
    /// Every candidate that fits inside its interval is returned, in chronological
    /// order. Unavailable ones carry their cause; `Past` wins over `Reserved`.
    /// `reservations` must only contain pending or confirmed appointments.
    pub fn generate(
        intervals: &[OpenInterval],
        date: NaiveDate,
        reservations: &[ReservedSpan],
        policy: SlotPolicy,
        now: NaiveDateTime,
    ) -> Vec<Slot> {
        let duration = i64::from(policy.duration_minutes) * 60;
        let step = i64::from(policy.granularity_minutes.max(1)) * 60;

        let mut starts = BTreeSet::new();
        for interval in intervals {
            let close = seconds_of(interval.end);
            let mut cursor = seconds_of(interval.start);
            while cursor + duration <= close {
                starts.insert(cursor);
                cursor += step;
            }
        }

        let reserved: Vec<(i64, i64)> = reservations
            .iter()
            .map(|span| {
                let start = seconds_of(span.start);
                (start, start + i64::from(span.duration_minutes) * 60)
            })
            .collect();

        starts
            .into_iter()
            .filter_map(|start| {
                let start_time = NaiveTime::from_num_seconds_from_midnight_opt(start as u32, 0)?;
                let end = start + duration;

                let reason = if Self::is_past(date, start_time, now) {
                    Some(SlotUnavailableReason::Past)
                } else if reserved.iter().any(|&(r_start, r_end)| start < r_end && r_start < end) {
                    Some(SlotUnavailableReason::Reserved)
                } else {
                    None
                };

                Some(Slot {
                    date,
                    start_time,
                    duration_minutes: policy.duration_minutes,
                    available: reason.is_none(),
                    reason_if_unavailable: reason,
                })
            })
            .collect()
    }

    pub fn is_past(date: NaiveDate, start_time: NaiveTime, now: NaiveDateTime) -> bool {
        date.and_time(start_time) < now
    }
}

fn seconds_of(time: NaiveTime) -> i64 {
    i64::from(time.num_seconds_from_midnight())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_interval_shorter_than_duration_yields_nothing() {
        let date = NaiveDate::from_ymd_opt(2031, 3, 3).unwrap();
        let now = NaiveDate::from_ymd_opt(2031, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();

        let slots = SlotGenerator::generate(
            &[OpenInterval::new(t(9, 0), t(9, 20))],
            date,
            &[],
            SlotPolicy::default(),
            now,
        );

        assert!(slots.is_empty());
    }

    #[test]
    fn test_adjacent_intervals_do_not_duplicate_starts() {
        let date = NaiveDate::from_ymd_opt(2031, 3, 3).unwrap();
        let now = NaiveDate::from_ymd_opt(2031, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let policy = SlotPolicy { duration_minutes: 30, granularity_minutes: 15 };

        let slots = SlotGenerator::generate(
            &[OpenInterval::new(t(9, 0), t(10, 0)), OpenInterval::new(t(9, 30), t(10, 30))],
            date,
            &[],
            policy,
            now,
        );

        let starts: Vec<NaiveTime> = slots.iter().map(|s| s.start_time).collect();
        assert_eq!(starts, vec![t(9, 0), t(9, 15), t(9, 30), t(9, 45), t(10, 0)]);
    }
}
