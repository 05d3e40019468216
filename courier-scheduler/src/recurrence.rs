//! Recurrence evaluation.
//!
//! A task recurs from its start date (falling back to its notification
//! date) in whole day/week/month steps. The evaluator fails open: a task
//! with no rule, an unusable interval, or an unrecognized unit is always
//! considered due, so misconfiguration surfaces as an extra notification
//! rather than a silently dead task.

use chrono::{Datelike, NaiveDate};
use courier_core::{RecurrenceUnit, Task};

/// Whether a task is due on `today` under its recurrence rule.
pub fn is_due(task: &Task, today: NaiveDate) -> bool {
    let (Some(unit), Some(interval)) = (task.recurrence_unit, task.recurrence_interval) else {
        return true;
    };
    if interval == 0 {
        return true;
    }

    let start = task.start_date.unwrap_or(task.notification_date);
    let days_since = (today - start).num_days();
    if days_since < 0 {
        return false;
    }

    match unit {
        RecurrenceUnit::Day => days_since % interval as i64 == 0,
        RecurrenceUnit::Week => days_since % (interval as i64 * 7) == 0,
        RecurrenceUnit::Month => {
            let months_since = (today.year() - start.year()) * 12
                + (today.month() as i32 - start.month() as i32);
            // Day-of-month must match; starts on day 29-31 never fire in
            // shorter months
            months_since % interval as i32 == 0 && today.day() == start.day()
        }
    }
}
