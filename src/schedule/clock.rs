// src/schedule/clock.rs

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info};

use crate::schedule::{Cadence, Interval};

/// Decides which logical intervals of a recurring schedule are due.
///
/// An interval is due once its end is at or before the current time. The
/// clock remembers the last interval handed out for execution and never
/// emits that one, or any earlier one, again.
///
/// - With catchup enabled, every due interval after the last materialized
///   one (or from `start_date`) is emitted in ascending order.
/// - With catchup disabled, only the most recent due interval is emitted and
///   the overdue ones before it are dropped.
#[derive(Debug, Clone)]
pub struct ScheduleClock {
    cadence: Cadence,
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    catchup: bool,
    /// Start of the last materialized interval.
    last_materialized: Option<DateTime<Utc>>,
}

impl ScheduleClock {
    pub fn new(cadence: Cadence, start_date: DateTime<Utc>, catchup: bool) -> Self {
        Self {
            cadence,
            start_date,
            end_date: None,
            catchup,
            last_materialized: None,
        }
    }

    /// No interval ending after `end_date` is ever due.
    pub fn with_end_date(mut self, end_date: Option<DateTime<Utc>>) -> Self {
        self.end_date = end_date;
        self
    }

    /// Restore bookkeeping, e.g. from an external run history.
    pub fn resume_after(mut self, last_start: DateTime<Utc>) -> Self {
        self.last_materialized = Some(last_start);
        self
    }

    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    pub fn catchup(&self) -> bool {
        self.catchup
    }

    pub fn last_materialized(&self) -> Option<Interval> {
        self.last_materialized
            .map(|start| Interval::starting_at(start, self.cadence))
    }

    /// Intervals due at `now` that were not materialized yet.
    ///
    /// The returned iterator is lazy and finite; it does not change the
    /// clock. Call [`ScheduleClock::mark_materialized`] for what was taken.
    pub fn due_intervals(&self, now: DateTime<Utc>) -> DueIntervals {
        let Some(latest) = self.latest_due_start(now) else {
            return DueIntervals::empty(self.cadence);
        };

        let next = self.next_candidate_start();
        if latest < next {
            return DueIntervals::empty(self.cadence);
        }

        if self.catchup {
            return DueIntervals {
                next: Some(next),
                last: latest,
                cadence: self.cadence,
            };
        }

        let skipped = (latest - next).num_milliseconds() / self.cadence.as_millis();
        if skipped > 0 {
            info!(
                skipped,
                latest = %latest,
                "catchup disabled; only the most recent due interval will run"
            );
        }

        DueIntervals {
            next: Some(latest),
            last: latest,
            cadence: self.cadence,
        }
    }

    /// Record that `interval` has been handed out for execution.
    pub fn mark_materialized(&mut self, interval: &Interval) {
        let start = interval.start();
        if self.last_materialized.is_none_or(|last| start > last) {
            self.last_materialized = Some(start);
        }
    }

    /// Collect the due intervals and mark them materialized in one go.
    pub fn materialize_due(&mut self, now: DateTime<Utc>) -> Vec<Interval> {
        let due: Vec<Interval> = self.due_intervals(now).collect();
        if let Some(last) = due.last() {
            self.mark_materialized(last);
        }
        debug!(count = due.len(), now = %now, "materialized due intervals");
        due
    }

    /// Wall-clock time at which the next interval becomes due.
    ///
    /// `None` once the schedule is past its `end_date`.
    pub fn next_due_at(&self) -> Option<DateTime<Utc>> {
        let due_at = self.next_candidate_start() + self.cadence.as_delta();
        match self.end_date {
            Some(end) if due_at > end => None,
            _ => Some(due_at),
        }
    }

    fn next_candidate_start(&self) -> DateTime<Utc> {
        match self.last_materialized {
            Some(last) => last + self.cadence.as_delta(),
            None => self.start_date,
        }
    }

    /// Start of the most recent interval whose end is at or before `now`.
    fn latest_due_start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if now < self.start_date {
            debug!(
                now = %now,
                start_date = %self.start_date,
                "current time is before start_date; nothing is due"
            );
            return None;
        }

        let step = self.cadence.as_millis();
        let mut complete = (now - self.start_date).num_milliseconds() / step;

        if let Some(end) = self.end_date {
            let bounded = (end - self.start_date).num_milliseconds().max(0) / step;
            complete = complete.min(bounded);
        }

        if complete < 1 {
            return None;
        }

        let offset = TimeDelta::try_milliseconds(step.saturating_mul(complete - 1))?;
        self.start_date.checked_add_signed(offset)
    }
}

/// Lazy, finite sequence of due intervals in ascending start order.
#[derive(Debug, Clone)]
pub struct DueIntervals {
    next: Option<DateTime<Utc>>,
    last: DateTime<Utc>,
    cadence: Cadence,
}

impl DueIntervals {
    fn empty(cadence: Cadence) -> Self {
        Self {
            next: None,
            last: DateTime::<Utc>::MIN_UTC,
            cadence,
        }
    }
}

impl Iterator for DueIntervals {
    type Item = Interval;

    fn next(&mut self) -> Option<Interval> {
        let start = self.next?;
        if start > self.last {
            self.next = None;
            return None;
        }

        let interval = Interval::starting_at(start, self.cadence);
        self.next = Some(interval.end());
        Some(interval)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.next {
            Some(start) if start <= self.last => {
                let n = (self.last - start).num_milliseconds() / self.cadence.as_millis() + 1;
                let n = usize::try_from(n).unwrap_or(usize::MAX);
                (n, Some(n))
            }
            _ => (0, Some(0)),
        }
    }
}
