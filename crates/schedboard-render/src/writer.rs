//! Round-trip workbook export
//!
//! The original workbook is patched in place rather than regenerated. The
//! writer re-ingests the original with the same options that produced the
//! session baseline, diffs every edited row against it field by field, and
//! rewrites only the cells whose value changed:
//!
//! - Rows are matched by `source_row`; tasks without one are appended below
//!   the last used row with the cell styles of an existing task row
//! - Baseline rows missing from the edited table are blanked, styles kept
//! - Formula cells are never overwritten, except formulas pointing at other
//!   workbooks, which are first replaced by their cached value
//! - Percentages go back in the scale the column was authored in
//! - Dates keep the representation of the cell they land in (text or serial)
//!
//! Every part that was not modified is copied into the new package raw, so
//! drawings, images, comments and unknown sheets come out byte-identical.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{Cursor, Write};
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use schedboard_core::fields::{date_to_excel_serial, PercentScale};
use schedboard_core::hierarchy::{classify, RowSignals};
use schedboard_core::{Milestone, ProjectInfo, ScheduleData, Task};
use schedboard_ingest::ooxml::{rels_path_for, FillMap, CONTENT_TYPES_PART, WORKBOOK_PART};
use schedboard_ingest::schema::{software, system, CellPos};
use schedboard_ingest::{ingest_bytes, IngestOptions, Ingested, Package};
use serde::Serialize;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::sheet_xml::{CellWrite, SheetXml};
use crate::RenderError;

/// Calculation chain part, dropped whenever formulas are removed
pub const CALC_CHAIN_PART: &str = "xl/calcChain.xml";

/// Text representation used for dates written into text cells
pub const TEXT_DATE_FORMAT: &str = "%Y/%m/%d";

fn calc_chain_override() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<Override\s[^>]*PartName="/xl/calcChain\.xml"[^>]*/>"#).expect("static regex")
    })
}

fn calc_chain_relationship() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<Relationship\s[^>]*Target="[^"]*calcChain\.xml"[^>]*/>"#).expect("static regex")
    })
}

// ============================================================================
// Output
// ============================================================================

/// What the writer changed
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub cells_written: usize,
    /// Writes skipped because the target cell holds a formula
    pub formula_cells_kept: usize,
    pub external_formulas_stripped: usize,
    pub rows_appended: usize,
    pub rows_blanked: usize,
    pub milestones_written: usize,
    pub calc_chain_dropped: bool,
}

#[derive(Clone, Debug)]
pub struct WrittenWorkbook {
    pub bytes: Vec<u8>,
    pub report: WriteReport,
}

// ============================================================================
// Field Values
// ============================================================================

/// A model field as it is compared and written
#[derive(Clone, Debug, PartialEq)]
enum FieldValue {
    Text(String),
    Number(f64),
    Date(Option<NaiveDate>),
}

#[derive(Clone, Copy, Debug)]
struct TaskScales {
    progress: PercentScale,
    target: PercentScale,
}

fn task_fields(task: &Task, scales: TaskScales) -> Vec<(u32, FieldValue)> {
    use software::*;
    let text = |s: &str| FieldValue::Text(s.to_string());
    let days = |n: i64| FieldValue::Number(n as f64);
    vec![
        (COL_OWNER, text(&task.owner)),
        (COL_PROGRESS, FieldValue::Number(scales.progress.from_percent(task.progress_pct))),
        (COL_TARGET, FieldValue::Number(scales.target.from_percent(task.target_pct))),
        (COL_REMAINING_DAYS, days(task.remaining_days)),
        (COL_STATUS, text(task.status.as_str())),
        (COL_PLAN_START, FieldValue::Date(task.plan_start)),
        (COL_PLAN_END, FieldValue::Date(task.plan_end)),
        (COL_PLAN_DAYS, days(task.plan_days)),
        (COL_ACTUAL_START, FieldValue::Date(task.actual_start)),
        (COL_ACTUAL_END, FieldValue::Date(task.actual_end)),
        (COL_ACTUAL_DAYS, days(task.actual_days)),
        (COL_VARIANCE_DAYS, days(task.variance_days)),
        (COL_COORD_TIME, text(&task.coord_time)),
        (COL_COORD_MANPOWER, text(&task.coord_manpower)),
        (COL_COORD_AREA, text(&task.coord_area)),
        (COL_COORD_EQUIPMENT, text(&task.coord_equipment)),
        (COL_NOTES, text(&task.notes)),
    ]
}

fn milestone_fields(milestone: &Milestone, scale: PercentScale) -> Vec<(u32, FieldValue)> {
    vec![
        (system::COL_TARGET_DATE, FieldValue::Date(milestone.target_date)),
        (system::COL_COMPLETION, FieldValue::Number(scale.from_percent(milestone.completion_pct))),
        (system::COL_NOTES, FieldValue::Text(milestone.notes.clone())),
    ]
}

/// Leading whitespace of a cell's text, kept when the name is rewritten
fn indent_of(text: &str) -> &str {
    let trimmed = text.trim_start();
    &text[..text.len() - trimmed.len()]
}

// ============================================================================
// Sheet Patcher
// ============================================================================

/// One worksheet being edited, with the counters for what was done to it
struct Patcher<'a> {
    sheet: SheetXml,
    shared: &'a [String],
    written: usize,
    formulas_kept: usize,
}

impl<'a> Patcher<'a> {
    fn new(sheet: SheetXml, shared: &'a [String]) -> Self {
        Self {
            sheet,
            shared,
            written: 0,
            formulas_kept: 0,
        }
    }

    /// Write a value unless the cell holds a formula. Dates are rendered as
    /// text when the cell at `sniff_row` in the same column holds text.
    fn write(&mut self, row: u32, col: u32, value: &FieldValue, sniff_row: u32) -> bool {
        if self.sheet.is_formula(row, col, self.shared) {
            debug!(part = self.sheet.part(), row, col, "keeping formula cell");
            self.formulas_kept += 1;
            return false;
        }
        let write = match value {
            FieldValue::Text(text) => CellWrite::Text(text.clone()),
            FieldValue::Number(n) => CellWrite::Number(*n),
            FieldValue::Date(None) => CellWrite::Blank,
            FieldValue::Date(Some(date)) if self.sheet.holds_text(sniff_row, col) => {
                CellWrite::Text(date.format(TEXT_DATE_FORMAT).to_string())
            }
            FieldValue::Date(Some(date)) => CellWrite::Number(date_to_excel_serial(*date)),
        };
        self.sheet.set(row, col, write);
        self.written += 1;
        true
    }

    fn write_at(&mut self, pos: CellPos, value: &FieldValue) -> bool {
        self.write(pos.row, pos.col, value, pos.row)
    }

    /// Write only the fields whose value differs from `old`
    fn write_changed(&mut self, row: u32, old: &[(u32, FieldValue)], new: &[(u32, FieldValue)], sniff_row: u32) {
        for ((col, before), (_, after)) in old.iter().zip(new) {
            if before != after {
                self.write(row, *col, after, sniff_row);
            }
        }
    }

    fn cell_text(&self, row: u32, col: u32) -> String {
        self.sheet
            .cell(row, col)
            .and_then(|c| c.text(self.shared))
            .unwrap_or_default()
            .to_string()
    }

    /// Blank every value in the row's modelled columns, formulas excepted
    fn blank_row(&mut self, row: u32, cols: u32) {
        for col in 0..cols {
            if self.sheet.is_formula(row, col, self.shared) {
                self.formulas_kept += 1;
            } else if self.sheet.blank(row, col) {
                self.written += 1;
            }
        }
    }

    fn finish(mut self, report: &mut WriteReport) -> SheetXml {
        report.cells_written += self.written;
        report.formula_cells_kept += self.formulas_kept;
        self.sheet.update_dimension();
        self.sheet
    }
}

// ============================================================================
// Workbook Writer
// ============================================================================

/// Patches edited schedule data back into the workbook it came from
#[derive(Clone, Debug)]
pub struct WorkbookWriter {
    options: IngestOptions,
    strip_external: bool,
}

impl WorkbookWriter {
    /// `options` must be the options the session baseline was ingested with
    pub fn new(options: IngestOptions) -> Self {
        Self {
            options,
            strip_external: true,
        }
    }

    /// Leave formulas that reference other workbooks in place
    pub fn keep_external_formulas(mut self) -> Self {
        self.strip_external = false;
        self
    }

    pub fn write(
        &self,
        original: &[u8],
        data: &ScheduleData,
        export_date: NaiveDate,
    ) -> Result<WrittenWorkbook, RenderError> {
        let baseline = ingest_bytes(original, &self.options)?;
        let mut package = Package::open(original)?;
        let sheets = package.sheets()?;
        let shared = package.shared_strings()?;
        let part_of = |name: &str| {
            sheets
                .iter()
                .find(|s| s.name == name)
                .map(|s| s.path.clone())
                .ok_or_else(|| RenderError::MissingSheet(name.to_string()))
        };
        let software_part = part_of(&baseline.diagnostics.software_sheet)?;
        let system_part = part_of(&baseline.diagnostics.system_sheet)?;

        let fills = package.fill_map(&software_part).unwrap_or_else(|err| {
            warn!(error = %err, "cannot read cell fills; hierarchy markers written for every edited row");
            FillMap::new()
        });

        let mut report = WriteReport::default();
        let mut modified: BTreeMap<String, SheetXml> = BTreeMap::new();

        // External links are resolved to their cached values before any edit
        // lands, so an edited cell that held one is written like a plain value
        let mut software_xml = SheetXml::parse(&package.read_part(&software_part)?, &software_part)?;
        let mut system_xml = SheetXml::parse(&package.read_part(&system_part)?, &system_part)?;
        if self.strip_external {
            for entry in &sheets {
                let stripped = if entry.path == software_part {
                    strip_sheet(&mut software_xml, &entry.name, &shared)
                } else if entry.path == system_part {
                    strip_sheet(&mut system_xml, &entry.name, &shared)
                } else {
                    let Some(xml) = package.read_optional(&entry.path)? else {
                        continue;
                    };
                    let mut sheet = SheetXml::parse(&xml, &entry.path)?;
                    let stripped = strip_sheet(&mut sheet, &entry.name, &shared);
                    if stripped > 0 {
                        modified.insert(entry.path.clone(), sheet);
                    }
                    stripped
                };
                report.external_formulas_stripped += stripped;
            }
        }

        let mut patcher = Patcher::new(software_xml, &shared);
        patch_tasks(&mut patcher, &baseline, &data.tasks, &fills, &mut report);
        patch_project(&mut patcher, &baseline.data.project, &data.project, export_date);
        modified.insert(software_part.clone(), patcher.finish(&mut report));

        let mut patcher = Patcher::new(system_xml, &shared);
        patch_milestones(&mut patcher, &baseline, &data.milestones, &mut report);
        modified.insert(system_part.clone(), patcher.finish(&mut report));

        let mut replaced: HashMap<String, Vec<u8>> = modified
            .into_iter()
            .map(|(part, sheet)| (part, sheet.to_bytes()))
            .collect();
        let mut dropped = BTreeSet::new();
        if report.external_formulas_stripped > 0 && package.has_part(CALC_CHAIN_PART) {
            drop_calc_chain(&mut package, &mut replaced)?;
            dropped.insert(CALC_CHAIN_PART.to_string());
            report.calc_chain_dropped = true;
        }

        let bytes = repack(original, &replaced, &dropped)?;
        info!(
            cells = report.cells_written,
            appended = report.rows_appended,
            blanked = report.rows_blanked,
            formulas_kept = report.formula_cells_kept,
            external_stripped = report.external_formulas_stripped,
            "workbook written"
        );
        Ok(WrittenWorkbook { bytes, report })
    }
}

// ============================================================================
// Patching
// ============================================================================

fn strip_sheet(sheet: &mut SheetXml, name: &str, shared: &[String]) -> usize {
    let stripped = sheet.strip_external_formulas(shared);
    if stripped > 0 {
        debug!(sheet = %name, stripped, "replaced external formulas with cached values");
    }
    stripped
}

fn patch_tasks(patcher: &mut Patcher<'_>, baseline: &Ingested, edited: &[Task], fills: &FillMap, report: &mut WriteReport) {
    use software::*;

    let scales = TaskScales {
        progress: baseline.diagnostics.progress_scale,
        target: baseline.diagnostics.target_scale,
    };
    let by_row: BTreeMap<u32, &Task> = baseline
        .data
        .tasks
        .iter()
        .filter_map(|t| t.source_row.map(|row| (row, t)))
        .collect();

    let style_row = baseline
        .data
        .tasks
        .iter()
        .rev()
        .find(|t| !t.is_main())
        .or_else(|| baseline.data.tasks.last())
        .and_then(|t| t.source_row);
    let mut next_row = patcher
        .sheet
        .last_value_row()
        .map_or(FIRST_TASK_ROW, |row| row + 1)
        .max(FIRST_TASK_ROW);

    let mut kept_rows = BTreeSet::new();
    let blank_task = Task::new("");
    for task in edited {
        let original = task.source_row.and_then(|row| by_row.get(&row).map(|t| (row, *t)));
        let new_fields = task_fields(task, scales);
        match original {
            Some((row, old)) => {
                kept_rows.insert(row);
                let written_before = patcher.written;
                let mut raw_name = patcher.cell_text(row, COL_NAME);
                if old.name != task.name {
                    raw_name = format!("{}{}", indent_of(&raw_name), task.name);
                    patcher.write(row, COL_NAME, &FieldValue::Text(raw_name.clone()), row);
                }
                patcher.write_changed(row, &task_fields(old, scales), &new_fields, row);

                // A marker is written when the row's remaining signals would
                // no longer classify it at its edited level
                if patcher.written > written_before || old.level != task.level {
                    let marker = baseline.raw_software.cell(row, COL_MARKER);
                    let derived = classify(&RowSignals {
                        marker: (!marker.is_blank()).then_some(marker),
                        raw_name: &raw_name,
                        fill: fills.get(&(row, COL_NAME)).copied(),
                        owner: &task.owner,
                        has_plan_dates: task.plan_start.is_some() || task.plan_end.is_some(),
                    });
                    if derived != task.level {
                        write_marker(patcher, row, task);
                    }
                }
            }
            None => {
                if task.source_row.is_some() {
                    debug!(name = %task.name, "source row not in the workbook; appending");
                }
                let row = next_row;
                next_row += 1;
                let sniff_row = style_row.unwrap_or(row);
                if let Some(template) = style_row {
                    patcher.sheet.copy_row_style(template, row, COLUMN_COUNT);
                }
                patcher.write(row, COL_NAME, &FieldValue::Text(task.name.clone()), sniff_row);
                write_marker(patcher, row, task);
                patcher.write_changed(row, &task_fields(&blank_task, scales), &new_fields, sniff_row);
                report.rows_appended += 1;
            }
        }
    }

    for (row, task) in &by_row {
        if !kept_rows.contains(row) {
            debug!(row, name = %task.name, "blanking deleted task row");
            patcher.blank_row(*row, COLUMN_COUNT);
            report.rows_blanked += 1;
        }
    }
}

fn write_marker(patcher: &mut Patcher<'_>, row: u32, task: &Task) {
    let marker = FieldValue::Number(f64::from(task.level.depth()) + 1.0);
    patcher.write(row, software::COL_MARKER, &marker, row);
}

fn patch_project(patcher: &mut Patcher<'_>, old: &ProjectInfo, new: &ProjectInfo, export_date: NaiveDate) {
    use software::*;

    let pairs = [
        (PROJECT_CODE, FieldValue::Text(old.code.clone()), FieldValue::Text(new.code.clone())),
        (PROJECT_NAME, FieldValue::Text(old.name.clone()), FieldValue::Text(new.name.clone())),
        (PROJECT_LEAD, FieldValue::Text(old.lead.clone()), FieldValue::Text(new.lead.clone())),
        (START_DATE, FieldValue::Date(old.start_date), FieldValue::Date(new.start_date)),
    ];
    for (pos, before, after) in &pairs {
        if before != after {
            patcher.write_at(*pos, after);
        }
    }
    patcher.write_at(UPDATE_DATE, &FieldValue::Date(Some(export_date)));
}

fn patch_milestones(patcher: &mut Patcher<'_>, baseline: &Ingested, edited: &[Milestone], report: &mut WriteReport) {
    let scale = baseline.diagnostics.completion_scale;
    let by_row: HashMap<u32, &Milestone> = baseline
        .data
        .milestones
        .iter()
        .filter_map(|m| m.source_row.map(|row| (row, m)))
        .collect();

    for milestone in edited {
        let Some((row, old)) = milestone.source_row.and_then(|row| by_row.get(&row).map(|m| (row, *m))) else {
            warn!(name = %milestone.name, "milestone has no row in the workbook; not written");
            continue;
        };
        let written_before = patcher.written;
        if old.name != milestone.name {
            let raw = patcher.cell_text(row, system::COL_NAME);
            let name = format!("{}{}", indent_of(&raw), milestone.name);
            patcher.write(row, system::COL_NAME, &FieldValue::Text(name), row);
        }
        patcher.write_changed(
            row,
            &milestone_fields(old, scale),
            &milestone_fields(milestone, scale),
            row,
        );
        if patcher.written > written_before {
            report.milestones_written += 1;
        }
    }
}

// ============================================================================
// Package
// ============================================================================

/// Remove the calculation chain and every reference to it
fn drop_calc_chain(package: &mut Package<'_>, replaced: &mut HashMap<String, Vec<u8>>) -> Result<(), RenderError> {
    let content_types = package.read_part(CONTENT_TYPES_PART)?;
    replaced.insert(
        CONTENT_TYPES_PART.to_string(),
        remove_matches(calc_chain_override(), &content_types),
    );
    let rels_part = rels_path_for(WORKBOOK_PART);
    if let Some(rels) = package.read_optional(&rels_part)? {
        replaced.insert(rels_part, remove_matches(calc_chain_relationship(), &rels));
    }
    debug!("dropped calculation chain");
    Ok(())
}

fn remove_matches(pattern: &Regex, xml: &[u8]) -> Vec<u8> {
    let text = String::from_utf8_lossy(xml);
    pattern.replace_all(&text, "").into_owned().into_bytes()
}

/// Rebuild the zip: replaced parts are recompressed, the rest copied raw
fn repack(
    original: &[u8],
    replaced: &HashMap<String, Vec<u8>>,
    dropped: &BTreeSet<String>,
) -> Result<Vec<u8>, RenderError> {
    let mut archive = ZipArchive::new(Cursor::new(original))?;
    let mut out = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for index in 0..archive.len() {
        let file = archive.by_index_raw(index)?;
        let name = file.name().to_string();
        if dropped.contains(&name) {
            continue;
        }
        match replaced.get(&name) {
            Some(bytes) => {
                drop(file);
                out.start_file(name, options)?;
                out.write_all(bytes)?;
            }
            None => out.raw_copy_file(file)?,
        }
    }
    Ok(out.finish()?.into_inner())
}

// ============================================================================
// Tests
// ============================================================================
