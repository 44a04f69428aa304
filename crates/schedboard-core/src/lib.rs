//! # schedboard-core
//!
//! Core domain model for the schedboard installation-schedule dashboard.
//!
//! This crate provides:
//! - Domain types: `Task`, `Milestone`, `ProjectInfo`, `ScheduleData`
//! - Field parsers for raw spreadsheet cells (`fields`)
//! - Hierarchy classification and status inference (`hierarchy`, `status`)
//! - Read-only progress/risk analysis and weekly report partitioning
//! - Edit validation and the session store with undo/redo history
//!
//! Nothing in this crate performs I/O. Workbook reading lives in
//! `schedboard-ingest`, workbook writing in `schedboard-render`.
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use schedboard_core::{Task, TaskStatus};
//! use schedboard_core::status::infer_status;
//!
//! let task = Task::new("Install rail segment A")
//!     .owner("Mech")
//!     .progress(40.0)
//!     .plan(
//!         NaiveDate::from_ymd_opt(2026, 3, 2),
//!         NaiveDate::from_ymd_opt(2026, 3, 9),
//!     );
//!
//! let today = NaiveDate::from_ymd_opt(2026, 3, 20).unwrap();
//! let status = infer_status(&TaskStatus::Unset, task.progress_pct, task.plan_end, today);
//! assert_eq!(status, TaskStatus::Delay);
//! ```

pub mod analysis;
pub mod fields;
pub mod hierarchy;
pub mod report;
pub mod session;
pub mod status;
pub mod validate;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// Type Aliases
// ============================================================================

/// Sequential task identifier (1-based, reassigned on every mutation)
pub type TaskId = u32;

// ============================================================================
// Task Status
// ============================================================================

/// Lifecycle status of a schedule row.
///
/// The three canonical values come from the status column vocabulary. Any
/// other non-blank label is kept verbatim in `Other`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Done,
    Going,
    Delay,
    /// Blank status cell
    #[default]
    Unset,
    /// Non-canonical label, kept as written
    Other(String),
}

impl TaskStatus {
    /// Parse a status cell label. Surrounding whitespace is ignored and the
    /// canonical labels match case-insensitively.
    pub fn parse(label: &str) -> Self {
        let trimmed = label.trim();
        if trimmed.is_empty() {
            return TaskStatus::Unset;
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "done" => TaskStatus::Done,
            "going" => TaskStatus::Going,
            "delay" => TaskStatus::Delay,
            _ => TaskStatus::Other(trimmed.to_string()),
        }
    }

    /// Label as written back into the status column
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Done => "Done",
            TaskStatus::Going => "Going",
            TaskStatus::Delay => "Delay",
            TaskStatus::Unset => "",
            TaskStatus::Other(label) => label,
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, TaskStatus::Unset)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Level
// ============================================================================

/// Hierarchy depth of a task: 0 = main item, 1 = sub item, 2 = sub-sub item.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Level(pub u8);

impl Level {
    pub const MAIN: Level = Level(0);
    pub const SUB: Level = Level(1);
    pub const SUB_SUB: Level = Level(2);

    pub fn depth(self) -> u8 {
        self.0
    }

    pub fn is_main(self) -> bool {
        self.0 == 0
    }
}

// ============================================================================
// Task
// ============================================================================

/// One row of the software schedule sheet
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Sequential identifier (1-based)
    pub id: TaskId,
    /// Original sheet row (0-based); `None` for tasks added during editing
    pub source_row: Option<u32>,
    /// Hierarchy depth
    pub level: Level,
    /// Task name, trimmed
    pub name: String,
    /// Responsible unit (free text, may be empty)
    pub owner: String,
    /// Actual completion, 0-100
    pub progress_pct: f64,
    /// Planned completion at the status date, 0-100
    pub target_pct: f64,
    pub remaining_days: i64,
    pub status: TaskStatus,
    pub plan_start: Option<NaiveDate>,
    pub plan_end: Option<NaiveDate>,
    pub plan_days: i64,
    pub actual_start: Option<NaiveDate>,
    pub actual_end: Option<NaiveDate>,
    pub actual_days: i64,
    /// Signed; negative = behind schedule
    pub variance_days: i64,
    pub coord_time: String,
    pub coord_manpower: String,
    pub coord_area: String,
    pub coord_equipment: String,
    pub notes: String,
}

impl Task {
    /// Create a new sub-level task with the given name and no schedule data
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            source_row: None,
            level: Level::SUB,
            name: name.into(),
            owner: String::new(),
            progress_pct: 0.0,
            target_pct: 0.0,
            remaining_days: 0,
            status: TaskStatus::Unset,
            plan_start: None,
            plan_end: None,
            plan_days: 0,
            actual_start: None,
            actual_end: None,
            actual_days: 0,
            variance_days: 0,
            coord_time: String::new(),
            coord_manpower: String::new(),
            coord_area: String::new(),
            coord_equipment: String::new(),
            notes: String::new(),
        }
    }

    /// Derived from `level`
    pub fn is_main(&self) -> bool {
        self.level.is_main()
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn progress(mut self, pct: f64) -> Self {
        self.progress_pct = pct;
        self
    }

    pub fn target(mut self, pct: f64) -> Self {
        self.target_pct = pct;
        self
    }

    pub fn plan(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.plan_start = start;
        self.plan_end = end;
        self
    }

    pub fn actual(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.actual_start = start;
        self.actual_end = end;
        self
    }

    pub fn variance(mut self, days: i64) -> Self {
        self.variance_days = days;
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn source_row(mut self, row: u32) -> Self {
        self.source_row = Some(row);
        self
    }
}

/// Reassign sequential 1-based ids in table order
pub fn renumber(tasks: &mut [Task]) {
    for (index, task) in tasks.iter_mut().enumerate() {
        task.id = index as TaskId + 1;
    }
}

// ============================================================================
// Milestone
// ============================================================================

/// Kind of row in the system schedule sheet
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Area,
    Main,
    Sub,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Area => "area",
            ItemType::Main => "main",
            ItemType::Sub => "sub",
        }
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the system schedule (area progress) sheet
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    /// Original sheet row (0-based)
    pub source_row: Option<u32>,
    /// Nearest enclosing area heading, inherited downward
    pub area: String,
    /// Nearest enclosing main-item heading within the area
    pub main_item: String,
    pub name: String,
    pub item_type: ItemType,
    /// Completion, 0-100
    pub completion_pct: f64,
    pub target_date: Option<NaiveDate>,
    pub notes: String,
}

impl Milestone {
    pub fn is_area(&self) -> bool {
        self.item_type == ItemType::Area
    }
}

// ============================================================================
// Project Info
// ============================================================================

/// Project metadata block at the top of the software schedule sheet
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub code: String,
    pub name: String,
    pub lead: String,
    pub start_date: Option<NaiveDate>,
    pub update_date: Option<NaiveDate>,
}

// ============================================================================
// Schedule Data
// ============================================================================

/// The normalized model of one workbook: project info, task table and
/// milestone table. Sessions snapshot this whole value for undo/redo.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleData {
    pub project: ProjectInfo,
    pub tasks: Vec<Task>,
    pub milestones: Vec<Milestone>,
}

impl ScheduleData {
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub fn renumber(&mut self) {
        renumber(&mut self.tasks);
    }
}

// ============================================================================
// Tests
// ============================================================================
