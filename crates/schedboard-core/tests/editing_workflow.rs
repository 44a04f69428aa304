//! Edits flowing through a session into the status and report views

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use schedboard_core::analysis::{owner_workload, risk_histogram, RiskTier};
use schedboard_core::report::WeeklyReport;
use schedboard_core::session::{SessionConfig, SessionError, SessionStore};
use schedboard_core::status::StatusSummary;
use schedboard_core::{ScheduleData, Task, TaskStatus};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn baseline() -> ScheduleData {
    let mut data = ScheduleData::default();
    data.project.name = "Fab 3 AMHS".into();
    data.tasks = vec![
        Task::new("Rail install").owner("Mech").with_status(TaskStatus::Done).progress(100.0),
        Task::new("Vehicle teaching")
            .owner("SW")
            .with_status(TaskStatus::Going)
            .progress(40.0)
            .plan(Some(date(2026, 5, 1)), Some(date(2026, 5, 14))),
        Task::new("Stocker interlock")
            .owner("SW")
            .with_status(TaskStatus::Delay)
            .variance(-3),
    ];
    data.renumber();
    data
}

#[test]
fn edits_are_reflected_in_summaries() {
    let today = date(2026, 5, 11);
    let mut store = SessionStore::new(SessionConfig::default());
    let session = store.open("editor-1", baseline());

    let before = StatusSummary::build(&session.current().tasks, today);
    assert_eq!(before.counts.delay, 1);
    assert_eq!(before.upcoming.len(), 1);

    session
        .update_task(2, |task| {
            task.status = TaskStatus::Done;
            task.progress_pct = 100.0;
            task.actual_end = Some(date(2026, 5, 12));
        })
        .unwrap();
    session
        .update_task(3, |task| task.variance_days = -12)
        .unwrap();

    let tasks = &session.current().tasks;
    let after = StatusSummary::build(tasks, today);
    assert_eq!(after.counts.done, 2);
    assert!(after.upcoming.is_empty());
    assert_eq!(risk_histogram(tasks).get(&RiskTier::High), Some(&1));

    let report = WeeklyReport::build(tasks, today);
    let completed: Vec<_> = report.completed_this_week.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(completed, vec!["Vehicle teaching"]);

    let sw = owner_workload(tasks).into_iter().find(|w| w.owner == "SW").unwrap();
    assert_eq!(sw.counts.done, 1);
    assert_eq!(sw.pending(), 1);
}

#[test]
fn rejected_edit_leaves_history_untouched() {
    let mut store = SessionStore::new(SessionConfig::default());
    let session = store.open("editor-1", baseline());
    session.update_task(1, |task| task.notes = "signed off".into()).unwrap();
    let history_len = session.history().len();

    let err = session
        .edit(|data| {
            data.tasks[0].name = String::new();
            data.tasks[1].progress_pct = 140.0;
            data.tasks[2].plan_start = Some(date(2026, 6, 1));
            data.tasks[2].plan_end = Some(date(2026, 5, 1));
            Ok(())
        })
        .unwrap_err();
    let SessionError::Validation(errors) = err else {
        panic!("expected a validation error");
    };
    assert_eq!(errors.len(), 3);
    assert_eq!(session.history().len(), history_len);
    assert_eq!(session.current().tasks[0].notes, "signed off");
}

#[test]
fn reset_then_undo_restores_the_edits() {
    let mut store = SessionStore::new(SessionConfig::default());
    let session = store.open("editor-1", baseline());
    session
        .add_task(Task::new("Hot run").owner("SW").plan(Some(date(2026, 5, 12)), Some(date(2026, 5, 20))))
        .unwrap();
    session.delete_task(1).unwrap();
    let edited = session.current().clone();
    assert_eq!(edited.tasks.len(), 3);
    assert_eq!(edited.tasks[0].id, 1);
    assert_eq!(edited.tasks[0].name, "Vehicle teaching");

    session.reset();
    assert_eq!(session.current(), session.baseline());
    assert_eq!(session.undo(), Some(&edited));
    assert_eq!(session.redo().map(|d| d.tasks.len()), Some(3));
}

#[test]
fn sessions_are_independent() {
    let mut store = SessionStore::new(SessionConfig::default());
    store.open("a", baseline());
    store.open("b", baseline());
    store.get_mut("a").unwrap().delete_task(3).unwrap();

    assert_eq!(store.get("a").unwrap().current().tasks.len(), 2);
    assert_eq!(store.get("b").unwrap().current().tasks.len(), 3);
    assert!(matches!(store.get("c"), Err(SessionError::UnknownSession(_))));
}
