//! Blank schedule workbook generator
//!
//! Produces a workbook in the positional layout the ingester reads: the
//! software schedule with its project block and task table, the system
//! schedule with area milestones, and empty engineering, equipment and
//! layout sheets.
//!
//! Hierarchy is written redundantly (explicit marker, green fill on main
//! rows, indented sub-row names) so a hand-edited copy still classifies.
//! Plan-day cells are live formulas over the plan dates with the model
//! value as their cached result.

use chrono::{Duration, Local, NaiveDate};
use rust_xlsxwriter::{DataValidation, Format, FormatAlign, FormatBorder, Formula, Workbook, Worksheet};
use schedboard_core::fields::date_to_excel_serial;
use schedboard_core::{renumber, ItemType, Level, Milestone, ProjectInfo, ScheduleData, Task, TaskStatus};
use schedboard_ingest::ooxml::cell_ref;
use schedboard_ingest::schema::{software, system, CellPos};

use crate::{RenderError, Renderer};

pub const SOFTWARE_SHEET: &str = "軟體時程";
pub const SYSTEM_SHEET: &str = "系統時程_C";
pub const ENGINEERING_SHEET: &str = "工程_工作進度確認表";
pub const EQ_SHEET: &str = "EQ 工作清單";
pub const LAYOUT_SHEET: &str = "Layout";

const NO_DATA: &str = "尚未有資料";

/// Software sheet column widths, by column
const SOFTWARE_WIDTHS: [f64; software::COLUMN_COUNT as usize] = [
    35.0, 5.0, 15.0, 8.0, 10.0, 10.0, 8.0, 8.0, 12.0, 12.0, 8.0, 12.0, 12.0, 8.0, 8.0, 10.0, 10.0, 10.0, 10.0, 20.0,
];

const STATUS_CHOICES: [&str; 3] = ["Done", "Going", "Delay"];

/// Default task rows: (name, owner, planned days, level)
const DEFAULT_TASKS: &[(&str, &str, i64, Level)] = &[
    ("Server安裝及設定", "IT", 5, Level::MAIN),
    ("Server安裝", "IT", 3, Level::SUB),
    ("OS安裝", "IT", 1, Level::SUB),
    ("遠端連線環境建立", "IT", 1, Level::SUB),
    ("OHTC軟體安裝及設定", "OHTC", 7, Level::MAIN),
    ("HA設定及服務建立", "OHTC", 2, Level::SUB),
    ("OHTC1設定", "OHTC", 1, Level::SUB),
    ("OHTC2設定", "OHTC", 1, Level::SUB),
    ("現場主機狀態確認", "OHTC", 2, Level::MAIN),
    ("Golden驗證", "OHTL", 10, Level::MAIN),
];

const DEFAULT_AREAS: [&str; 8] = ["區域A", "區域B", "區域C", "區域D", "區域E", "區域F", "區域G", "區域H"];

const DEFAULT_AREA_ITEMS: &[(&str, ItemType)] = &[
    ("走行", ItemType::Main),
    ("踩點", ItemType::Sub),
    ("提速", ItemType::Sub),
    ("安全", ItemType::Main),
    ("AREA SENSOR驗證", ItemType::Sub),
    ("取放", ItemType::Main),
    ("OHB Teaching", ItemType::Sub),
    ("EQ Teaching", ItemType::Sub),
    ("系統", ItemType::Main),
    ("MCS測試", ItemType::Sub),
];

const ENGINEERING_HEADERS: [&str; 18] = [
    "", "區域", "項目", "C鋼", "軌道", "", "HID", "", "圖資", "", "OHB", "", "Cycle Test", "", "EQ Teaching",
    "Hot Run", "RTD Test", "Release",
];
const ENGINEERING_SUB_HEADERS: [&str; 18] = [
    "", "", "", "", "目標", "實際", "目標", "實際", "目標", "實際", "目標", "實際", "目標", "實際", "", "", "", "",
];
const DEFAULT_BAYS: [(&str, &str); 12] = [
    ("A", "Bay 1"),
    ("H", "Bay 2"),
    ("H", "Bay 3"),
    ("H", "Bay 4"),
    ("H", "Bay 5"),
    ("H", "Bay 6"),
    ("G", "Bay 7"),
    ("G", "Bay 8"),
    ("G", "Bay 9"),
    ("G", "Bay 10"),
    ("F", "Bay 11"),
    ("F", "Bay 12"),
];

const EQ_HEADERS: [&str; 9] = ["區域", "EQ", "Port ID", "安裝", "校點", "PIO測試", "OHTC取放", "MCS取放", "MES取放"];

/// Template workbook generator configuration
#[derive(Clone, Debug)]
pub struct TemplateGenerator {
    /// Plan start for the default tasks when the project has none
    pub start_date: NaiveDate,
    /// Fill empty task and milestone tables with the standard rows
    pub include_defaults: bool,
    /// Plan-day cells as formulas over the plan dates
    pub use_formulas: bool,
    /// Status rows covered by the drop-down list
    pub validation_rows: u32,
}

impl Default for TemplateGenerator {
    fn default() -> Self {
        Self {
            start_date: Local::now().date_naive(),
            include_defaults: true,
            use_formulas: true,
            validation_rows: 100,
        }
    }
}

struct TemplateFormats {
    title: Format,
    label: Format,
    hint: Format,
    header: Format,
    text: Format,
    main_name: Format,
    date: Format,
    percent: Format,
    integer: Format,
    done: Format,
    going: Format,
    delay: Format,
    area_name: Format,
}

impl TemplateGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = date;
        self
    }

    /// Leave empty tables empty
    pub fn without_defaults(mut self) -> Self {
        self.include_defaults = false;
        self
    }

    /// Write plan days as static values
    pub fn static_values(mut self) -> Self {
        self.use_formulas = false;
        self
    }

    pub fn validation_rows(mut self, rows: u32) -> Self {
        self.validation_rows = rows;
        self
    }

    /// The standard task list, scheduled back to back from `start`
    pub fn default_tasks(start: NaiveDate) -> Vec<Task> {
        let mut current = start;
        let mut tasks: Vec<Task> = DEFAULT_TASKS
            .iter()
            .map(|(name, owner, days, level)| {
                let end = current + Duration::days(*days);
                let mut task = Task::new(*name).owner(*owner).level(*level).plan(Some(current), Some(end));
                task.plan_days = *days;
                current = end;
                task
            })
            .collect();
        renumber(&mut tasks);
        tasks
    }

    /// Every default area with its main and sub items
    pub fn default_milestones() -> Vec<Milestone> {
        let mut milestones = Vec::new();
        for area in DEFAULT_AREAS {
            milestones.push(milestone(area, area, "", ItemType::Area));
            let mut main = "";
            for (name, item_type) in DEFAULT_AREA_ITEMS {
                if *item_type == ItemType::Main {
                    main = *name;
                }
                milestones.push(milestone(name, area, main, *item_type));
            }
        }
        milestones
    }

    fn create_formats(&self) -> TemplateFormats {
        let bordered = || Format::new().set_border(FormatBorder::Thin);
        TemplateFormats {
            title: Format::new().set_bold().set_font_size(16),
            label: Format::new().set_bold(),
            hint: Format::new().set_font_color(0x808080),
            header: Format::new()
                .set_bold()
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter)
                .set_text_wrap()
                .set_background_color(0x4472C4)
                .set_font_color(0xFFFFFF)
                .set_border(FormatBorder::Thin),
            text: bordered(),
            main_name: bordered().set_bold().set_background_color(0x92D050),
            date: bordered().set_num_format("yyyy-mm-dd"),
            percent: bordered().set_num_format("0%"),
            integer: bordered().set_num_format("0"),
            done: bordered().set_background_color(0x92D050),
            going: bordered().set_background_color(0xFFEB9C),
            delay: bordered().set_background_color(0xFF6B6B),
            area_name: Format::new().set_bold(),
        }
    }

    /// Generate the workbook bytes
    pub fn render_to_bytes(&self, data: &ScheduleData) -> Result<Vec<u8>, RenderError> {
        let formats = self.create_formats();
        let start = data.project.start_date.unwrap_or(self.start_date);
        let tasks = if data.tasks.is_empty() && self.include_defaults {
            Self::default_tasks(start)
        } else {
            data.tasks.clone()
        };
        let milestones = if data.milestones.is_empty() && self.include_defaults {
            Self::default_milestones()
        } else {
            data.milestones.clone()
        };

        let mut workbook = Workbook::new();

        let sheet = workbook.add_worksheet();
        sheet.set_name(SOFTWARE_SHEET)?;
        self.write_project_block(sheet, &data.project, start, &formats)?;
        self.write_task_table(sheet, &tasks, &formats)?;

        let sheet = workbook.add_worksheet();
        sheet.set_name(SYSTEM_SHEET)?;
        write_milestone_table(sheet, &milestones, &formats)?;

        let sheet = workbook.add_worksheet();
        sheet.set_name(ENGINEERING_SHEET)?;
        self.write_engineering_sheet(sheet, &formats)?;

        let sheet = workbook.add_worksheet();
        sheet.set_name(EQ_SHEET)?;
        sheet.write_string(0, 0, NO_DATA)?;
        for (col, header) in EQ_HEADERS.iter().enumerate() {
            sheet.write_string_with_format(1, col as u16, *header, &formats.header)?;
            sheet.set_column_width(col as u16, 12).ok();
        }

        let sheet = workbook.add_worksheet();
        sheet.set_name(LAYOUT_SHEET)?;
        sheet.write_string(0, 0, NO_DATA)?;

        Ok(workbook.save_to_buffer()?)
    }

    fn write_project_block(
        &self,
        sheet: &mut Worksheet,
        project: &ProjectInfo,
        start: NaiveDate,
        formats: &TemplateFormats,
    ) -> Result<(), RenderError> {
        let title_name = if project.name.is_empty() { "OHTC專案" } else { project.name.as_str() };
        sheet.merge_range(0, 0, 0, 5, &format!("{}_排程表", title_name), &formats.title)?;

        let fields = [
            (software::PROJECT_CODE, "專案工令", project.code.as_str()),
            (software::PROJECT_NAME, "專案名稱", project.name.as_str()),
            (software::PROJECT_LEAD, "專案負責", project.lead.as_str()),
        ];
        for (pos, label, value) in fields {
            sheet.write_string_with_format(pos.row, 0, label, &formats.label)?;
            sheet.write_string_with_format(pos.row, 1, &format!("請輸入{}", label), &formats.hint)?;
            if !value.is_empty() {
                sheet.write_string(pos.row, col(pos), value)?;
            }
        }

        let start_label = CellPos::new(software::START_DATE.row, software::START_DATE.col - 1);
        sheet.write_string_with_format(start_label.row, col(start_label), "計畫開始日", &formats.label)?;
        write_date(sheet, software::START_DATE.row, col(software::START_DATE), Some(start), &formats.date)?;

        let update_label = CellPos::new(software::UPDATE_DATE.row, software::UPDATE_DATE.col - 1);
        sheet.write_string_with_format(update_label.row, col(update_label), "更新日期", &formats.label)?;
        write_date(
            sheet,
            software::UPDATE_DATE.row,
            col(software::UPDATE_DATE),
            project.update_date,
            &formats.date,
        )?;
        Ok(())
    }

    fn write_task_table(&self, sheet: &mut Worksheet, tasks: &[Task], formats: &TemplateFormats) -> Result<(), RenderError> {
        use software::*;

        for (index, width) in SOFTWARE_WIDTHS.iter().enumerate() {
            sheet.set_column_width(index as u16, *width).ok();
        }
        for (index, header) in HEADERS.iter().enumerate() {
            sheet.write_string_with_format(HEADER_ROW, index as u16, *header, &formats.header)?;
        }
        sheet.set_row_height(HEADER_ROW, 30).ok();
        sheet.set_freeze_panes(FIRST_TASK_ROW, 0).ok();

        for (offset, task) in tasks.iter().enumerate() {
            let row = FIRST_TASK_ROW + offset as u32;
            let c = |column: u32| column as u16;

            if task.is_main() {
                sheet.write_string_with_format(row, c(COL_NAME), &task.name, &formats.main_name)?;
            } else {
                let indent = "  ".repeat(usize::from(task.level.depth()));
                sheet.write_string_with_format(row, c(COL_NAME), &format!("{}{}", indent, task.name), &formats.text)?;
            }
            let marker = f64::from(task.level.depth()) + 1.0;
            sheet.write_number_with_format(row, c(COL_MARKER), marker, &formats.integer)?;
            write_text(sheet, row, c(COL_OWNER), &task.owner, &formats.text)?;
            sheet.write_number_with_format(row, c(COL_PROGRESS), task.progress_pct / 100.0, &formats.percent)?;
            sheet.write_number_with_format(row, c(COL_TARGET), task.target_pct / 100.0, &formats.percent)?;
            write_days(sheet, row, c(COL_REMAINING_DAYS), task.remaining_days, &formats.integer)?;

            let status_format = match task.status {
                TaskStatus::Done => &formats.done,
                TaskStatus::Going => &formats.going,
                TaskStatus::Delay => &formats.delay,
                TaskStatus::Unset | TaskStatus::Other(_) => &formats.text,
            };
            write_text(sheet, row, c(COL_STATUS), task.status.as_str(), status_format)?;

            write_date(sheet, row, c(COL_PLAN_START), task.plan_start, &formats.date)?;
            write_date(sheet, row, c(COL_PLAN_END), task.plan_end, &formats.date)?;
            if self.use_formulas && task.plan_start.is_some() && task.plan_end.is_some() {
                let formula = Formula::new(format!(
                    "={}-{}",
                    cell_ref(row, COL_PLAN_END),
                    cell_ref(row, COL_PLAN_START)
                ))
                .set_result(task.plan_days.to_string());
                sheet.write_formula_with_format(row, c(COL_PLAN_DAYS), formula, &formats.integer)?;
            } else {
                write_days(sheet, row, c(COL_PLAN_DAYS), task.plan_days, &formats.integer)?;
            }
            write_date(sheet, row, c(COL_ACTUAL_START), task.actual_start, &formats.date)?;
            write_date(sheet, row, c(COL_ACTUAL_END), task.actual_end, &formats.date)?;
            write_days(sheet, row, c(COL_ACTUAL_DAYS), task.actual_days, &formats.integer)?;
            write_days(sheet, row, c(COL_VARIANCE_DAYS), task.variance_days, &formats.integer)?;
            write_text(sheet, row, c(COL_COORD_TIME), &task.coord_time, &formats.text)?;
            write_text(sheet, row, c(COL_COORD_MANPOWER), &task.coord_manpower, &formats.text)?;
            write_text(sheet, row, c(COL_COORD_AREA), &task.coord_area, &formats.text)?;
            write_text(sheet, row, c(COL_COORD_EQUIPMENT), &task.coord_equipment, &formats.text)?;
            write_text(sheet, row, c(COL_NOTES), &task.notes, &formats.text)?;
        }

        if self.validation_rows > 0 {
            let validation = DataValidation::new()
                .allow_list_strings(&STATUS_CHOICES[..])?
                .set_error_title("無效輸入")?
                .set_error_message("請選擇有效的狀態")?;
            let last_row = FIRST_TASK_ROW + self.validation_rows - 1;
            sheet.add_data_validation(FIRST_TASK_ROW, COL_STATUS as u16, last_row, COL_STATUS as u16, &validation)?;
        }
        Ok(())
    }

    fn write_engineering_sheet(&self, sheet: &mut Worksheet, formats: &TemplateFormats) -> Result<(), RenderError> {
        for (index, header) in ENGINEERING_HEADERS.iter().enumerate() {
            sheet.write_string_with_format(1, index as u16, *header, &formats.header)?;
        }
        for (index, header) in ENGINEERING_SUB_HEADERS.iter().enumerate() {
            if !header.is_empty() {
                sheet.write_string(2, index as u16, *header)?;
            }
        }
        if self.include_defaults {
            for (offset, (area, bay)) in DEFAULT_BAYS.iter().enumerate() {
                let row = 3 + offset as u32;
                sheet.write_string(row, 1, *area)?;
                sheet.write_string(row, 2, *bay)?;
            }
        }
        Ok(())
    }
}

impl Renderer for TemplateGenerator {
    type Output = Vec<u8>;

    fn render(&self, data: &ScheduleData) -> Result<Vec<u8>, RenderError> {
        self.render_to_bytes(data)
    }
}

fn milestone(name: &str, area: &str, main_item: &str, item_type: ItemType) -> Milestone {
    Milestone {
        source_row: None,
        area: area.to_string(),
        main_item: main_item.to_string(),
        name: name.to_string(),
        item_type,
        completion_pct: 0.0,
        target_date: None,
        notes: String::new(),
    }
}

fn write_milestone_table(sheet: &mut Worksheet, milestones: &[Milestone], formats: &TemplateFormats) -> Result<(), RenderError> {
    use system::*;

    sheet.write_string_with_format(0, 0, "系統時程", &formats.title)?;
    for (index, width) in [40.0, 15.0, 12.0, 20.0, 10.0].iter().enumerate() {
        sheet.set_column_width(index as u16, *width).ok();
    }
    for (index, header) in HEADERS.iter().enumerate() {
        sheet.write_string_with_format(HEADER_ROW, index as u16, *header, &formats.header)?;
    }
    sheet.set_freeze_panes(FIRST_ITEM_ROW, 0).ok();

    for (offset, item) in milestones.iter().enumerate() {
        let row = FIRST_ITEM_ROW + offset as u32;
        let (name, hierarchy) = match item.item_type {
            ItemType::Area => (item.name.clone(), "區域"),
            ItemType::Main => (item.name.clone(), "主項目"),
            ItemType::Sub => (format!("  {}", item.name), "子項目"),
        };
        if item.is_area() {
            sheet.write_string_with_format(row, COL_NAME as u16, &name, &formats.area_name)?;
        } else {
            sheet.write_string(row, COL_NAME as u16, &name)?;
        }
        write_date(sheet, row, COL_TARGET_DATE as u16, item.target_date, &formats.date)?;
        sheet.write_number_with_format(row, COL_COMPLETION as u16, item.completion_pct / 100.0, &formats.percent)?;
        if !item.notes.is_empty() {
            sheet.write_string(row, COL_NOTES as u16, &item.notes)?;
        }
        sheet.write_string(row, FALLBACK_HIERARCHY_COL as u16, hierarchy)?;
    }
    Ok(())
}

fn col(pos: CellPos) -> u16 {
    pos.col as u16
}

fn write_text(sheet: &mut Worksheet, row: u32, col: u16, text: &str, format: &Format) -> Result<(), RenderError> {
    if text.is_empty() {
        sheet.write_blank(row, col, format)?;
    } else {
        sheet.write_string_with_format(row, col, text, format)?;
    }
    Ok(())
}

fn write_days(sheet: &mut Worksheet, row: u32, col: u16, days: i64, format: &Format) -> Result<(), RenderError> {
    if days == 0 {
        sheet.write_blank(row, col, format)?;
    } else {
        sheet.write_number_with_format(row, col, days as f64, format)?;
    }
    Ok(())
}

/// Dates are stored as serial numbers under a date format
fn write_date(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    date: Option<NaiveDate>,
    format: &Format,
) -> Result<(), RenderError> {
    match date {
        Some(date) => sheet.write_number_with_format(row, col, date_to_excel_serial(date), format)?,
        None => sheet.write_blank(row, col, format)?,
    };
    Ok(())
}
