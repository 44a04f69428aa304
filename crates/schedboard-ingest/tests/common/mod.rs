//! Workbook fixtures built in-test with rust_xlsxwriter

#![allow(dead_code)]

use chrono::NaiveDate;
use rust_xlsxwriter::{Color, Format, Image, Workbook, XlsxError};
use schedboard_ingest::schema::{software, system};

/// 1x1 RGB PNG
pub const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, 0x00, 0x00,
    0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53, 0xDE, 0x00, 0x00, 0x00,
    0x0C, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x60, 0xF8, 0xCF, 0x00, 0x00, 0x02, 0x02, 0x01, 0x00, 0x7B,
    0x09, 0x81, 0x78, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[derive(Clone, Debug, Default)]
pub struct TaskRow {
    pub name: String,
    pub marker: String,
    pub owner: String,
    pub progress: f64,
    pub status: String,
    pub plan_start: Option<NaiveDate>,
    pub plan_end: Option<NaiveDate>,
    pub notes: String,
    pub green: bool,
}

impl TaskRow {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn owner(mut self, owner: &str) -> Self {
        self.owner = owner.to_string();
        self
    }

    pub fn marker(mut self, marker: &str) -> Self {
        self.marker = marker.to_string();
        self
    }

    pub fn progress(mut self, progress: f64) -> Self {
        self.progress = progress;
        self
    }

    pub fn status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    pub fn plan(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.plan_start = Some(start);
        self.plan_end = Some(end);
        self
    }

    pub fn notes(mut self, notes: &str) -> Self {
        self.notes = notes.to_string();
        self
    }

    pub fn green(mut self) -> Self {
        self.green = true;
        self
    }
}

#[derive(Clone, Debug)]
pub struct ItemRow {
    pub name: String,
    pub completion: f64,
    pub hierarchy: String,
}

pub fn item(name: &str, completion: f64, hierarchy: &str) -> ItemRow {
    ItemRow {
        name: name.to_string(),
        completion,
        hierarchy: hierarchy.to_string(),
    }
}

#[derive(Clone, Debug)]
pub struct Fixture {
    pub software_sheet: Option<String>,
    pub system_sheet: String,
    pub tasks: Vec<TaskRow>,
    pub items: Vec<ItemRow>,
    pub eq_sheet: bool,
    pub layout_image: bool,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            software_sheet: Some("軟體時程".to_string()),
            system_sheet: "系統時程_C".to_string(),
            tasks: Vec::new(),
            items: Vec::new(),
            eq_sheet: false,
            layout_image: false,
        }
    }
}

fn ymd(date: NaiveDate) -> String {
    date.format("%Y/%m/%d").to_string()
}

impl Fixture {
    pub fn build(&self) -> Vec<u8> {
        self.try_build().expect("fixture workbook")
    }

    fn try_build(&self) -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let green = Format::new().set_background_color(Color::RGB(0x92D050));

        if let Some(name) = &self.software_sheet {
            let sheet = workbook.add_worksheet();
            sheet.set_name(name)?;
            sheet.write_string(software::PROJECT_CODE.row, software::PROJECT_CODE.col as u16, "P-042")?;
            sheet.write_string(software::PROJECT_NAME.row, software::PROJECT_NAME.col as u16, "Fab 3 AMHS")?;
            sheet.write_string(software::PROJECT_LEAD.row, software::PROJECT_LEAD.col as u16, "Lin")?;
            sheet.write_string(software::START_DATE.row, software::START_DATE.col as u16, "2026/03/02 (一)")?;
            for (col, header) in software::HEADERS.iter().enumerate() {
                sheet.write_string(software::HEADER_ROW, col as u16, *header)?;
            }
            for (offset, task) in self.tasks.iter().enumerate() {
                let row = software::FIRST_TASK_ROW + offset as u32;
                if task.green {
                    sheet.write_string_with_format(row, software::COL_NAME as u16, &task.name, &green)?;
                } else {
                    sheet.write_string(row, software::COL_NAME as u16, &task.name)?;
                }
                let text_cells = [
                    (software::COL_MARKER, task.marker.clone()),
                    (software::COL_OWNER, task.owner.clone()),
                    (software::COL_STATUS, task.status.clone()),
                    (software::COL_PLAN_START, task.plan_start.map(ymd).unwrap_or_default()),
                    (software::COL_PLAN_END, task.plan_end.map(ymd).unwrap_or_default()),
                    (software::COL_NOTES, task.notes.clone()),
                ];
                for (col, value) in text_cells {
                    if !value.is_empty() {
                        sheet.write_string(row, col as u16, &value)?;
                    }
                }
                sheet.write_number(row, software::COL_PROGRESS as u16, task.progress)?;
            }
        }

        let sheet = workbook.add_worksheet();
        sheet.set_name(&self.system_sheet)?;
        for (col, header) in system::HEADERS.iter().enumerate() {
            sheet.write_string(system::HEADER_ROW, col as u16, *header)?;
        }
        for (offset, item) in self.items.iter().enumerate() {
            let row = system::FIRST_ITEM_ROW + offset as u32;
            sheet.write_string(row, system::COL_NAME as u16, &item.name)?;
            sheet.write_number(row, system::COL_COMPLETION as u16, item.completion)?;
            if !item.hierarchy.is_empty() {
                sheet.write_string(row, system::FALLBACK_HIERARCHY_COL as u16, &item.hierarchy)?;
            }
        }

        if self.eq_sheet {
            let sheet = workbook.add_worksheet();
            sheet.set_name("EQ 清單")?;
            sheet.write_string(0, 0, "設備")?;
            sheet.write_string(1, 0, "Stocker-01")?;
        }

        if self.layout_image {
            let sheet = workbook.add_worksheet();
            sheet.set_name("Layout")?;
            let image = Image::new_from_buffer(TINY_PNG)?;
            sheet.insert_image(1, 1, &image)?;
        }

        workbook.save_to_buffer()
    }
}
