//! Flat exports and output naming
//!
//! Three one-way exports that do not touch the source workbook:
//! - CSV task list with translated headers (UTF-8 with BOM so Excel opens it)
//! - XLSX task list in the same column order
//! - JSON project summary: project info, status summary, risk histogram and
//!   an export timestamp

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook};
use schedboard_core::analysis::{overall_progress, risk_histogram, RiskTier};
use schedboard_core::fields::{date_to_excel_serial, format_number};
use schedboard_core::status::StatusSummary;
use schedboard_core::{ProjectInfo, ScheduleData, Task};
use serde::Serialize;

use crate::{RenderError, Renderer};

/// Headers of the flat task export, in column order
pub const TASK_HEADERS: [&str; 20] = [
    "ID",
    "任務",
    "層級",
    "負責單位",
    "實際完成百分比",
    "預計完成百分比",
    "剩餘天數",
    "狀態",
    "計劃開始",
    "計劃完成",
    "計劃天數",
    "實際開始",
    "實際完成",
    "實際天數",
    "誤差天數",
    "協調時間",
    "協調人力",
    "協調區域",
    "協調設備",
    "備註",
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

fn version_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"_v(\d+)").expect("static regex"))
}

// ============================================================================
// Output Filename
// ============================================================================

/// Name for a patched workbook: `{project}_schedule_{YYYYMMDD}_v{N+1}.xlsx`
///
/// `N` is read from the first `_v<N>` in the original file name and
/// defaults to 1.
pub fn output_filename(project_name: &str, date: NaiveDate, original: Option<&str>) -> String {
    let version = original
        .and_then(|name| version_suffix().captures(name))
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .unwrap_or(1);
    format!(
        "{}_schedule_{}_v{}.xlsx",
        file_stem(project_name),
        date.format("%Y%m%d"),
        version.saturating_add(1)
    )
}

/// Project name made safe for use in a file name
fn file_stem(project_name: &str) -> String {
    let stem: String = project_name
        .trim()
        .chars()
        .map(|c| {
            if c.is_whitespace() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                '_'
            } else {
                c
            }
        })
        .collect();
    if stem.is_empty() {
        "project".to_string()
    } else {
        stem
    }
}

// ============================================================================
// Task Records
// ============================================================================

fn date_text(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
}

/// One task as export cells, in `TASK_HEADERS` order
fn task_record(task: &Task) -> [String; 20] {
    [
        task.id.to_string(),
        task.name.clone(),
        (task.level.depth() + 1).to_string(),
        task.owner.clone(),
        format_number(task.progress_pct),
        format_number(task.target_pct),
        task.remaining_days.to_string(),
        task.status.to_string(),
        date_text(task.plan_start),
        date_text(task.plan_end),
        task.plan_days.to_string(),
        date_text(task.actual_start),
        date_text(task.actual_end),
        task.actual_days.to_string(),
        task.variance_days.to_string(),
        task.coord_time.clone(),
        task.coord_manpower.clone(),
        task.coord_area.clone(),
        task.coord_equipment.clone(),
        task.notes.clone(),
    ]
}

// ============================================================================
// CSV
// ============================================================================

#[derive(Clone, Debug)]
pub struct CsvExporter {
    /// Prefix the output with a UTF-8 byte order mark
    pub bom: bool,
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self { bom: true }
    }
}

impl CsvExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_bom(mut self) -> Self {
        self.bom = false;
        self
    }
}

impl Renderer for CsvExporter {
    type Output = Vec<u8>;

    fn render(&self, data: &ScheduleData) -> Result<Vec<u8>, RenderError> {
        let mut out = Vec::new();
        if self.bom {
            out.extend_from_slice(UTF8_BOM);
        }
        let mut writer = csv::Writer::from_writer(out);
        writer.write_record(TASK_HEADERS)?;
        for task in &data.tasks {
            writer.write_record(task_record(task))?;
        }
        writer.into_inner().map_err(|err| RenderError::Io(err.into_error()))
    }
}

// ============================================================================
// XLSX
// ============================================================================

/// Flat task table as a single-sheet workbook
#[derive(Clone, Debug)]
pub struct XlsxExporter {
    pub sheet_name: String,
}

impl Default for XlsxExporter {
    fn default() -> Self {
        Self {
            sheet_name: "任務清單".into(),
        }
    }
}

impl XlsxExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet_name(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = name.into();
        self
    }
}

impl Renderer for XlsxExporter {
    type Output = Vec<u8>;

    fn render(&self, data: &ScheduleData) -> Result<Vec<u8>, RenderError> {
        let header = Format::new()
            .set_bold()
            .set_align(FormatAlign::Center)
            .set_background_color(0x4472C4)
            .set_font_color(0xFFFFFF)
            .set_border(FormatBorder::Thin);
        let text = Format::new().set_border(FormatBorder::Thin);
        let number = Format::new().set_num_format("0").set_border(FormatBorder::Thin);
        let percent = Format::new().set_num_format("0.0").set_border(FormatBorder::Thin);
        let date = Format::new().set_num_format("yyyy-mm-dd").set_border(FormatBorder::Thin);

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(&self.sheet_name)?;

        for (col, title) in TASK_HEADERS.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *title, &header)?;
        }
        sheet.set_column_width(1, 35).ok();
        sheet.set_column_width(19, 25).ok();
        sheet.set_freeze_panes(1, 0).ok();

        for (offset, task) in data.tasks.iter().enumerate() {
            let row = 1 + offset as u32;
            let numbers = [
                (0, f64::from(task.id), &number),
                (2, f64::from(task.level.depth()) + 1.0, &number),
                (4, task.progress_pct, &percent),
                (5, task.target_pct, &percent),
                (6, task.remaining_days as f64, &number),
                (10, task.plan_days as f64, &number),
                (13, task.actual_days as f64, &number),
                (14, task.variance_days as f64, &number),
            ];
            for (col, value, format) in numbers {
                sheet.write_number_with_format(row, col, value, format)?;
            }
            let texts = [
                (1, task.name.as_str()),
                (3, task.owner.as_str()),
                (7, task.status.as_str()),
                (15, task.coord_time.as_str()),
                (16, task.coord_manpower.as_str()),
                (17, task.coord_area.as_str()),
                (18, task.coord_equipment.as_str()),
                (19, task.notes.as_str()),
            ];
            for (col, value) in texts {
                sheet.write_string_with_format(row, col, value, &text)?;
            }
            let dates = [
                (8, task.plan_start),
                (9, task.plan_end),
                (11, task.actual_start),
                (12, task.actual_end),
            ];
            for (col, value) in dates {
                match value {
                    Some(d) => sheet.write_number_with_format(row, col, date_to_excel_serial(d), &date)?,
                    None => sheet.write_blank(row, col, &date)?,
                };
            }
        }

        Ok(workbook.save_to_buffer()?)
    }
}

// ============================================================================
// JSON Summary
// ============================================================================

/// Structured project summary
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProjectSummary {
    pub project_info: ProjectInfo,
    pub summary: StatusSummary,
    pub overall_progress_pct: f64,
    pub risk: BTreeMap<RiskTier, usize>,
    pub milestones: usize,
    pub exported_at: NaiveDateTime,
}

#[derive(Clone, Debug)]
pub struct SummaryExporter {
    /// Reference date for the upcoming list
    pub today: NaiveDate,
    pub exported_at: NaiveDateTime,
}

impl SummaryExporter {
    pub fn new(exported_at: NaiveDateTime) -> Self {
        Self {
            today: exported_at.date(),
            exported_at,
        }
    }

    pub fn build(&self, data: &ScheduleData) -> ProjectSummary {
        ProjectSummary {
            project_info: data.project.clone(),
            summary: StatusSummary::build(&data.tasks, self.today),
            overall_progress_pct: overall_progress(&data.tasks),
            risk: risk_histogram(&data.tasks),
            milestones: data.milestones.len(),
            exported_at: self.exported_at,
        }
    }
}

impl Renderer for SummaryExporter {
    type Output = String;

    fn render(&self, data: &ScheduleData) -> Result<String, RenderError> {
        Ok(serde_json::to_string_pretty(&self.build(data))?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use schedboard_core::TaskStatus;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> ScheduleData {
        let mut data = ScheduleData {
            project: ProjectInfo {
                code: "P-042".into(),
                name: "Fab 3 AMHS".into(),
                ..Default::default()
            },
            tasks: vec![
                Task::new("Rail install").owner("Mech").progress(100.0).with_status(TaskStatus::Done),
                Task::new("Vehicle teaching, bay 2")
                    .owner("SW")
                    .with_status(TaskStatus::Delay)
                    .plan(Some(date(2026, 4, 1)), Some(date(2026, 5, 1)))
                    .variance(-9),
            ],
            milestones: Vec::new(),
        };
        data.renumber();
        data
    }

    #[test]
    fn filename_bumps_version() {
        let day = date(2026, 5, 10);
        assert_eq!(
            output_filename("Fab 3 AMHS", day, Some("Fab3_schedule_20260401_v3.xlsx")),
            "Fab_3_AMHS_schedule_20260510_v4.xlsx"
        );
        assert_eq!(output_filename("P1", day, Some("schedule.xlsx")), "P1_schedule_20260510_v2.xlsx");
        assert_eq!(output_filename("P1", day, None), "P1_schedule_20260510_v2.xlsx");
        assert_eq!(output_filename("  ", day, None), "project_schedule_20260510_v2.xlsx");
        assert_eq!(output_filename("A/B", day, Some("x_v9_v2.xlsx")), "A_B_schedule_20260510_v10.xlsx");
    }

    #[test]
    fn csv_has_bom_and_translated_headers() {
        let bytes = CsvExporter::new().render(&sample()).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ID,任務,層級,負責單位"));
        assert!(lines[1].starts_with("1,Rail install,2,Mech,100,0,0,Done,"));
        // the comma in the name forces quoting
        assert!(lines[2].starts_with("2,\"Vehicle teaching, bay 2\",2,SW,0,0,0,Delay,2026-04-01,2026-05-01,"));
    }

    #[test]
    fn csv_without_bom() {
        let bytes = CsvExporter::new().without_bom().render(&ScheduleData::default()).unwrap();
        assert!(bytes.starts_with(b"ID,"));
    }

    #[test]
    fn summary_counts_and_risk() {
        let exported_at = date(2026, 5, 10).and_hms_opt(9, 30, 0).unwrap();
        let summary = SummaryExporter::new(exported_at).build(&sample());
        assert_eq!(summary.summary.counts.total, 2);
        assert_eq!(summary.summary.counts.delay, 1);
        assert_eq!(summary.summary.delay_tasks[0].name, "Vehicle teaching, bay 2");
        assert_eq!(summary.risk.get(&RiskTier::High), Some(&1));
        assert_eq!(summary.overall_progress_pct, 50.0);
    }

    #[test]
    fn summary_json_shape() {
        let exported_at = date(2026, 5, 10).and_hms_opt(9, 30, 0).unwrap();
        let json = SummaryExporter::new(exported_at).render(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["project_info"]["code"], "P-042");
        assert_eq!(value["summary"]["counts"]["done"], 1);
        assert_eq!(value["risk"]["high"], 1);
        assert_eq!(value["exported_at"], "2026-05-10T09:30:00");
    }

    #[test]
    fn xlsx_export_is_a_workbook() {
        let bytes = XlsxExporter::new().render(&sample()).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }
}
