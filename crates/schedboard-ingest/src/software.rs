//! Software schedule sheet: project block and task table

use chrono::NaiveDate;
use schedboard_core::fields::{
    cell_text, normalize_percent_column, parse_date, parse_integer, parse_number, parse_text, CellValue,
    PercentScale,
};
use schedboard_core::hierarchy::{classify, RowSignals};
use schedboard_core::status::infer_status;
use schedboard_core::{renumber, ProjectInfo, Task, TaskStatus};
use tracing::{debug, info};

use crate::config::IngestConfig;
use crate::grid::Grid;
use crate::ooxml::FillMap;
use crate::schema::software::*;
use crate::schema::CellPos;

/// Parsed software schedule plus the facts needed to write it back
#[derive(Clone, Debug, PartialEq)]
pub struct SoftwareSheet {
    pub project: ProjectInfo,
    pub tasks: Vec<Task>,
    /// Scale the progress column was authored in
    pub progress_scale: PercentScale,
    /// Scale the target column was authored in
    pub target_scale: PercentScale,
    /// Rows dropped because their notes carry the unsupported marker
    pub unsupported_skipped: usize,
    /// Repeated header rows found below the task start row
    pub header_rows_skipped: usize,
}

fn at(grid: &Grid, pos: CellPos) -> &CellValue {
    grid.cell(pos.row, pos.col)
}

pub fn parse_project(grid: &Grid) -> ProjectInfo {
    ProjectInfo {
        code: parse_text(at(grid, PROJECT_CODE)),
        name: parse_text(at(grid, PROJECT_NAME)),
        lead: parse_text(at(grid, PROJECT_LEAD)),
        start_date: parse_date(at(grid, START_DATE)),
        update_date: parse_date(at(grid, UPDATE_DATE)),
    }
}

/// A progress cell holding header text rather than a value
pub fn is_header_row(grid: &Grid, row: u32) -> bool {
    match grid.cell(row, COL_PROGRESS) {
        CellValue::Text(text) => HEADER_PHRASES.iter().any(|p| text.contains(p)),
        _ => false,
    }
}

fn parse_row(grid: &Grid, row: u32, raw_name: &str, notes: String, fills: &FillMap) -> Task {
    let text = |col| parse_text(grid.cell(row, col));
    let number = |col| parse_number(grid.cell(row, col), 0.0);
    let integer = |col| parse_integer(grid.cell(row, col), 0);
    let date = |col| parse_date(grid.cell(row, col));

    let owner = text(COL_OWNER);
    let plan_start = date(COL_PLAN_START);
    let plan_end = date(COL_PLAN_END);
    let marker = grid.cell(row, COL_MARKER);
    let level = classify(&RowSignals {
        marker: (!marker.is_blank()).then_some(marker),
        raw_name,
        fill: fills.get(&(row, COL_NAME)).copied(),
        owner: &owner,
        has_plan_dates: plan_start.is_some() || plan_end.is_some(),
    });

    Task {
        id: 0,
        source_row: Some(row),
        level,
        name: raw_name.trim().to_string(),
        owner,
        progress_pct: number(COL_PROGRESS),
        target_pct: number(COL_TARGET),
        remaining_days: integer(COL_REMAINING_DAYS),
        status: TaskStatus::parse(&text(COL_STATUS)),
        plan_start,
        plan_end,
        plan_days: integer(COL_PLAN_DAYS),
        actual_start: date(COL_ACTUAL_START),
        actual_end: date(COL_ACTUAL_END),
        actual_days: integer(COL_ACTUAL_DAYS),
        variance_days: integer(COL_VARIANCE_DAYS),
        coord_time: text(COL_COORD_TIME),
        coord_manpower: text(COL_COORD_MANPOWER),
        coord_area: text(COL_COORD_AREA),
        coord_equipment: text(COL_COORD_EQUIPMENT),
        notes,
    }
}

/// Rescale one percentage column of the task table to 0-100
fn normalize_column(tasks: &mut [Task], field: fn(&mut Task) -> &mut f64) -> PercentScale {
    let mut values: Vec<f64> = tasks.iter_mut().map(|t| *field(t)).collect();
    let scale = normalize_percent_column(&mut values);
    for (task, value) in tasks.iter_mut().zip(values) {
        *field(task) = value;
    }
    scale
}

/// Walk the task rows of the software schedule sheet
pub fn parse_software(grid: &Grid, fills: &FillMap, config: &IngestConfig, today: NaiveDate) -> SoftwareSheet {
    let mut tasks = Vec::new();
    let mut unsupported_skipped = 0;
    let mut header_rows_skipped = 0;

    for row in FIRST_TASK_ROW..grid.height() {
        let raw_name = cell_text(grid.cell(row, COL_NAME));
        if raw_name.trim().is_empty() {
            continue;
        }
        if is_header_row(grid, row) {
            debug!(row, "skipping repeated header row");
            header_rows_skipped += 1;
            continue;
        }
        let notes = parse_text(grid.cell(row, COL_NOTES));
        if config.is_unsupported(&notes) {
            debug!(row, name = raw_name.trim(), "skipping unsupported row");
            unsupported_skipped += 1;
            continue;
        }
        tasks.push(parse_row(grid, row, &raw_name, notes, fills));
    }

    let progress_scale = normalize_column(&mut tasks, |t| &mut t.progress_pct);
    let target_scale = normalize_column(&mut tasks, |t| &mut t.target_pct);
    debug!(?progress_scale, ?target_scale, "percent columns normalized");

    for task in &mut tasks {
        task.status = infer_status(&task.status, task.progress_pct, task.plan_end, today);
    }
    renumber(&mut tasks);

    if unsupported_skipped > 0 {
        info!(count = unsupported_skipped, marker = %config.unsupported_marker, "unsupported rows filtered");
    }

    SoftwareSheet {
        project: parse_project(grid),
        tasks,
        progress_scale,
        target_scale,
        unsupported_skipped,
        header_rows_skipped,
    }
}
