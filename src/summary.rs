use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::domain::local_day;
use crate::ledger::TaskLedger;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskBooking {
    pub code: String,
    pub start: Option<DateTime<Utc>>,
    pub stop: Option<DateTime<Utc>>,
}

impl TaskBooking {
    pub fn duration(&self) -> Option<Duration> {
        match (self.start, self.stop) {
            (Some(start), Some(stop)) => Some(stop - start),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub bookings: Vec<TaskBooking>,
    pub totals: BTreeMap<String, Duration>,
    pub total: Duration,
}

impl Default for Summary {
    fn default() -> Self {
        Self {
            bookings: Vec::new(),
            totals: BTreeMap::new(),
            total: Duration::zero(),
        }
    }
}

/// Collects every booking started on `day` (local calendar date). Open
/// bookings are listed but only closed ones count towards the totals.
pub fn generate_daily_summary(ledger: &TaskLedger, day: NaiveDate) -> Summary {
    let mut summary = Summary::default();

    for task in ledger.tasks() {
        for booking in &task.bookings {
            let Some(start) = booking.start else {
                continue;
            };
            if local_day(start) != day {
                continue;
            }

            summary.bookings.push(TaskBooking {
                code: task.code.clone(),
                start: booking.start,
                stop: booking.stop,
            });

            if let Some(stop) = booking.stop {
                let duration = stop - start;
                *summary
                    .totals
                    .entry(task.code.clone())
                    .or_insert_with(Duration::zero) += duration;
                summary.total += duration;
            }
        }
    }

    summary.bookings.sort_by(compare_by_start);
    summary
}

/// Ascending by start; an unset start sorts before any set one.
pub fn compare_by_start(left: &TaskBooking, right: &TaskBooking) -> Ordering {
    match (left.start, right.start) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(left), Some(right)) => left.cmp(&right),
    }
}
