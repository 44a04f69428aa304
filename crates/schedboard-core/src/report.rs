//! Weekly report partition
//!
//! Splits the task table around the ISO week (Monday to Sunday) containing the
//! report date. Text rendering lives in `schedboard-render`.

use chrono::{Datelike, Duration, NaiveDate};

use crate::status::StatusCounts;
use crate::{Task, TaskStatus};

/// Number of delayed tasks listed in the rendered report
pub const DELAY_DISPLAY_CAP: usize = 10;

/// Monday of the ISO week containing `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

#[derive(Clone, Debug, PartialEq)]
pub struct WeeklyReport<'a> {
    pub report_date: NaiveDate,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub counts: StatusCounts,
    /// `actual_end` within `[week_start, week_end]`
    pub completed_this_week: Vec<&'a Task>,
    /// `plan_end` within `(week_end, week_end + 7]` and not yet done
    pub next_week: Vec<&'a Task>,
    /// Every delayed task; display is capped separately
    pub delayed: Vec<&'a Task>,
}

impl<'a> WeeklyReport<'a> {
    pub fn build(tasks: &'a [Task], report_date: NaiveDate) -> Self {
        let week_start = week_start(report_date);
        let week_end = week_start + Duration::days(6);
        let next_week_end = week_end + Duration::days(7);

        let completed_this_week = tasks
            .iter()
            .filter(|t| t.actual_end.is_some_and(|d| d >= week_start && d <= week_end))
            .collect();
        let next_week = tasks
            .iter()
            .filter(|t| t.status != TaskStatus::Done)
            .filter(|t| t.plan_end.is_some_and(|d| d > week_end && d <= next_week_end))
            .collect();
        let delayed = tasks.iter().filter(|t| t.status == TaskStatus::Delay).collect();

        Self {
            report_date,
            week_start,
            week_end,
            counts: StatusCounts::from_tasks(tasks),
            completed_this_week,
            next_week,
            delayed,
        }
    }

    /// Delayed tasks shown in the report
    pub fn delayed_display(&self) -> &[&'a Task] {
        let end = self.delayed.len().min(DELAY_DISPLAY_CAP);
        &self.delayed[..end]
    }

    /// Delayed tasks beyond the display cap
    pub fn delayed_hidden(&self) -> usize {
        self.delayed.len().saturating_sub(DELAY_DISPLAY_CAP)
    }
}
