//! Status inference and status-based queries
//!
//! [`infer_status`] fills in a blank status cell from progress and due date.
//! The remaining functions are read-only views over a task table that count,
//! filter, and search by status.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::{Task, TaskStatus};

/// Look-ahead window used by the status summary
pub const SUMMARY_UPCOMING_DAYS: i64 = 7;

/// Resolve a row's status.
///
/// A non-blank status is kept as written. A blank one becomes `Done` at 100%
/// completion, `Delay` when the plan end is strictly before `today`, and
/// `Going` otherwise.
pub fn infer_status(
    status: &TaskStatus,
    progress_pct: f64,
    plan_end: Option<NaiveDate>,
    today: NaiveDate,
) -> TaskStatus {
    if !status.is_unset() {
        return status.clone();
    }
    if progress_pct >= 100.0 {
        TaskStatus::Done
    } else if plan_end.is_some_and(|end| end < today) {
        TaskStatus::Delay
    } else {
        TaskStatus::Going
    }
}

// ============================================================================
// Status Counts
// ============================================================================

/// Task counts per canonical status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total: usize,
    pub done: usize,
    pub going: usize,
    pub delay: usize,
    /// Any other label, including blank
    pub other: usize,
}

impl StatusCounts {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let mut counts = StatusCounts::default();
        for task in tasks {
            counts.add(&task.status);
        }
        counts
    }

    pub fn add(&mut self, status: &TaskStatus) {
        self.total += 1;
        match status {
            TaskStatus::Done => self.done += 1,
            TaskStatus::Going => self.going += 1,
            TaskStatus::Delay => self.delay += 1,
            TaskStatus::Unset | TaskStatus::Other(_) => self.other += 1,
        }
    }

    /// Share of `count` in the total, 0-100. An empty table yields 0.
    pub fn pct(&self, count: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 / self.total as f64 * 100.0
        }
    }

    pub fn done_pct(&self) -> f64 {
        self.pct(self.done)
    }

    pub fn going_pct(&self) -> f64 {
        self.pct(self.going)
    }

    pub fn delay_pct(&self) -> f64 {
        self.pct(self.delay)
    }
}

// ============================================================================
// Status Summary
// ============================================================================

/// Compact row used inside summaries
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TaskBrief {
    pub id: u32,
    pub name: String,
    pub owner: String,
    pub plan_end: Option<NaiveDate>,
    pub variance_days: i64,
}

impl From<&Task> for TaskBrief {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            name: task.name.clone(),
            owner: task.owner.clone(),
            plan_end: task.plan_end,
            variance_days: task.variance_days,
        }
    }
}

/// Totals plus the delay and upcoming lists
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatusSummary {
    pub counts: StatusCounts,
    pub delay_tasks: Vec<TaskBrief>,
    /// `Going` tasks due within the next week, overdue ones included
    pub upcoming: Vec<TaskBrief>,
}

impl StatusSummary {
    pub fn build(tasks: &[Task], today: NaiveDate) -> Self {
        let horizon = days_after(today, SUMMARY_UPCOMING_DAYS);
        let delay_tasks = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Delay)
            .map(TaskBrief::from)
            .collect();
        let upcoming = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Going && t.plan_end.is_some_and(|end| end <= horizon))
            .map(TaskBrief::from)
            .collect();
        Self {
            counts: StatusCounts::from_tasks(tasks),
            delay_tasks,
            upcoming,
        }
    }
}

// ============================================================================
// Upcoming
// ============================================================================

/// How close an upcoming deadline is
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    /// Two days or fewer
    Red,
    /// Five days or fewer
    Yellow,
    Green,
}

impl Urgency {
    pub fn from_days_left(days_left: i64) -> Self {
        if days_left <= 2 {
            Urgency::Red
        } else if days_left <= 5 {
            Urgency::Yellow
        } else {
            Urgency::Green
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct UpcomingTask<'a> {
    pub task: &'a Task,
    pub due: NaiveDate,
    pub days_left: i64,
    pub urgency: Urgency,
}

/// `today + days`, saturating at the ends of the calendar
pub(crate) fn days_after(today: NaiveDate, days: i64) -> NaiveDate {
    Duration::try_days(days)
        .and_then(|window| today.checked_add_signed(window))
        .unwrap_or(if days < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
}

/// `Going` tasks whose plan end falls in `[today, today + days]`, soonest first.
/// A window past the calendar range is capped at the last representable date.
pub fn upcoming(tasks: &[Task], today: NaiveDate, days: i64) -> Vec<UpcomingTask<'_>> {
    let horizon = days_after(today, days);
    let mut found: Vec<_> = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Going)
        .filter_map(|task| {
            let due = task.plan_end?;
            if due < today || due > horizon {
                return None;
            }
            let days_left = (due - today).num_days();
            Some(UpcomingTask {
                task,
                due,
                days_left,
                urgency: Urgency::from_days_left(days_left),
            })
        })
        .collect();
    found.sort_by_key(|u| (u.due, u.task.id));
    found
}

pub fn with_status<'a>(tasks: &'a [Task], status: &TaskStatus) -> Vec<&'a Task> {
    tasks.iter().filter(|t| &t.status == status).collect()
}

/// Case-insensitive substring match on task names
pub fn search<'a>(tasks: &'a [Task], keyword: &str) -> Vec<&'a Task> {
    let needle = keyword.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    tasks
        .iter()
        .filter(|t| t.name.to_lowercase().contains(&needle))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renumber;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn explicit_status_is_kept() {
        let today = date(2026, 5, 1);
        let past = Some(date(2026, 4, 1));
        assert_eq!(infer_status(&TaskStatus::Going, 100.0, past, today), TaskStatus::Going);
        let custom = TaskStatus::Other("On Hold".into());
        assert_eq!(infer_status(&custom, 0.0, past, today), custom);
    }

    #[test]
    fn complete_task_is_done_even_when_overdue() {
        let today = date(2026, 5, 1);
        let status = infer_status(&TaskStatus::Unset, 100.0, Some(date(2026, 1, 1)), today);
        assert_eq!(status, TaskStatus::Done);
    }

    #[test]
    fn overdue_blank_is_delay() {
        let today = date(2026, 5, 1);
        let yesterday = Some(date(2026, 4, 30));
        assert_eq!(infer_status(&TaskStatus::Unset, 50.0, yesterday, today), TaskStatus::Delay);
    }

    #[test]
    fn due_today_or_undated_is_going() {
        let today = date(2026, 5, 1);
        assert_eq!(infer_status(&TaskStatus::Unset, 10.0, Some(today), today), TaskStatus::Going);
        assert_eq!(infer_status(&TaskStatus::Unset, 10.0, None, today), TaskStatus::Going);
    }

    fn sample() -> Vec<Task> {
        let mut tasks = vec![
            Task::new("Rail install").owner("Mech").with_status(TaskStatus::Done),
            Task::new("Cable tray")
                .owner("Elec")
                .with_status(TaskStatus::Going)
                .plan(None, Some(date(2026, 5, 3))),
            Task::new("Vehicle test")
                .owner("Ctrl")
                .with_status(TaskStatus::Going)
                .plan(None, Some(date(2026, 5, 20))),
            Task::new("Rail alignment")
                .owner("Mech")
                .with_status(TaskStatus::Delay)
                .variance(-4),
            Task::new("Docs").with_status(TaskStatus::Other("Hold".into())),
        ];
        renumber(&mut tasks);
        tasks
    }

    #[test]
    fn status_counts_and_pct() {
        let counts = StatusCounts::from_tasks(&sample());
        assert_eq!(
            counts,
            StatusCounts {
                total: 5,
                done: 1,
                going: 2,
                delay: 1,
                other: 1
            }
        );
        assert_eq!(counts.going_pct(), 40.0);
        assert_eq!(StatusCounts::default().done_pct(), 0.0);
    }

    #[test]
    fn summary_lists() {
        let summary = StatusSummary::build(&sample(), date(2026, 5, 1));
        assert_eq!(summary.delay_tasks.len(), 1);
        assert_eq!(summary.delay_tasks[0].name, "Rail alignment");
        let upcoming: Vec<_> = summary.upcoming.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(upcoming, vec!["Cable tray"]);
    }

    #[test]
    fn upcoming_window_and_urgency() {
        let tasks = sample();
        let today = date(2026, 5, 1);
        let week = upcoming(&tasks, today, 7);
        assert_eq!(week.len(), 1);
        assert_eq!(week[0].days_left, 2);
        assert_eq!(week[0].urgency, Urgency::Red);

        let month = upcoming(&tasks, today, 30);
        assert_eq!(month.len(), 2);
        assert_eq!(month[1].task.name, "Vehicle test");
        assert_eq!(month[1].urgency, Urgency::Green);

        // overdue tasks drop out of the window
        let later = upcoming(&tasks, date(2026, 5, 4), 16);
        assert_eq!(later.len(), 1);
        assert_eq!(later[0].days_left, 16);
        assert!(upcoming(&tasks, date(2026, 5, 21), 7).is_empty());
    }

    #[test]
    fn huge_windows_saturate() {
        let tasks = sample();
        let today = date(2026, 5, 1);
        assert_eq!(upcoming(&tasks, today, 1_000_000_000).len(), 2);
        assert_eq!(upcoming(&tasks, today, i64::MAX).len(), 2);
        assert!(upcoming(&tasks, today, i64::MIN).is_empty());
        assert_eq!(days_after(NaiveDate::MAX, 7), NaiveDate::MAX);
        assert_eq!(days_after(today, 7), date(2026, 5, 8));
    }

    #[test]
    fn urgency_thresholds() {
        assert_eq!(Urgency::from_days_left(0), Urgency::Red);
        assert_eq!(Urgency::from_days_left(3), Urgency::Yellow);
        assert_eq!(Urgency::from_days_left(5), Urgency::Yellow);
        assert_eq!(Urgency::from_days_left(6), Urgency::Green);
    }

    #[test]
    fn search_is_case_insensitive() {
        let tasks = sample();
        let names: Vec<_> = search(&tasks, "RAIL").iter().map(|t| t.id).collect();
        assert_eq!(names, vec![1, 4]);
        assert!(search(&tasks, "  ").is_empty());
        assert!(search(&tasks, "nothing").is_empty());
    }

    #[test]
    fn filter_by_status() {
        let tasks = sample();
        assert_eq!(with_status(&tasks, &TaskStatus::Going).len(), 2);
    }
}
