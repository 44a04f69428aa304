//! Edit validation
//!
//! Validation collects every issue before reporting. A commit with any issue
//! is rejected as a unit. Rows carried over unchanged from the previous
//! snapshot are not re-checked, so faulty source data does not block edits
//! elsewhere in the table.

use std::fmt;

use chrono::NaiveDate;
use thiserror::Error;

use crate::{Milestone, ScheduleData, Task};

/// Number of issues listed in the error message
pub const ISSUE_DISPLAY_CAP: usize = 5;

/// Which table an issue belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Table {
    Tasks,
    Milestones,
}

/// One row-scoped validation problem
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationIssue {
    pub table: Table,
    /// 1-based position in the table being edited
    pub row: usize,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = match self.table {
            Table::Tasks => "task",
            Table::Milestones => "milestone",
        };
        write!(f, "{} row {}: {}", table, self.row, self.message)
    }
}

/// All issues found in a rejected commit
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub struct ValidationErrors(pub Vec<ValidationIssue>);

impl ValidationErrors {
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation issue(s)", self.0.len())?;
        for issue in self.0.iter().take(ISSUE_DISPLAY_CAP) {
            write!(f, "\n  - {}", issue)?;
        }
        let hidden = self.0.len().saturating_sub(ISSUE_DISPLAY_CAP);
        if hidden > 0 {
            write!(f, "\n  ... and {} more", hidden)?;
        }
        Ok(())
    }
}

fn check_range(
    issues: &mut Vec<ValidationIssue>,
    table: Table,
    row: usize,
    label: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) {
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            issues.push(ValidationIssue {
                table,
                row,
                message: format!("{} start {} is after end {}", label, start, end),
            });
        }
    }
}

fn check_pct(issues: &mut Vec<ValidationIssue>, table: Table, row: usize, label: &str, value: f64) {
    if !(0.0..=100.0).contains(&value) {
        issues.push(ValidationIssue {
            table,
            row,
            message: format!("{} {} is outside 0-100", label, value),
        });
    }
}

fn task_issues(issues: &mut Vec<ValidationIssue>, row: usize, task: &Task) {
    if task.name.trim().is_empty() {
        issues.push(ValidationIssue {
            table: Table::Tasks,
            row,
            message: "task name is empty".to_string(),
        });
    }
    check_range(issues, Table::Tasks, row, "plan", task.plan_start, task.plan_end);
    check_range(issues, Table::Tasks, row, "actual", task.actual_start, task.actual_end);
    check_pct(issues, Table::Tasks, row, "progress", task.progress_pct);
    check_pct(issues, Table::Tasks, row, "target", task.target_pct);
}

fn milestone_issues(issues: &mut Vec<ValidationIssue>, row: usize, milestone: &Milestone) {
    if milestone.name.trim().is_empty() {
        issues.push(ValidationIssue {
            table: Table::Milestones,
            row,
            message: "item name is empty".to_string(),
        });
    }
    check_pct(issues, Table::Milestones, row, "completion", milestone.completion_pct);
}

pub fn validate_tasks(tasks: &[Task]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for (index, task) in tasks.iter().enumerate() {
        task_issues(&mut issues, index + 1, task);
    }
    issues
}

pub fn validate_milestones(milestones: &[Milestone]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for (index, milestone) in milestones.iter().enumerate() {
        milestone_issues(&mut issues, index + 1, milestone);
    }
    issues
}

/// Validate both tables, returning every issue at once
pub fn validate(data: &ScheduleData) -> Result<(), ValidationErrors> {
    let mut issues = validate_tasks(&data.tasks);
    issues.extend(validate_milestones(&data.milestones));
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(issues))
    }
}

/// Validate only the rows of `next` that differ from `previous`. A task is
/// unchanged when `previous` holds an equal task under the same id; a
/// milestone when an equal milestone is present.
pub fn validate_edit(previous: &ScheduleData, next: &ScheduleData) -> Result<(), ValidationErrors> {
    let mut issues = Vec::new();
    for (index, task) in next.tasks.iter().enumerate() {
        if previous.task(task.id) != Some(task) {
            task_issues(&mut issues, index + 1, task);
        }
    }
    for (index, milestone) in next.milestones.iter().enumerate() {
        if !previous.milestones.contains(milestone) {
            milestone_issues(&mut issues, index + 1, milestone);
        }
    }
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(issues))
    }
}
