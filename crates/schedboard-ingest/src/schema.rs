//! Positional workbook contract
//!
//! Sheets are read by fixed row/column offsets, not by header names. All
//! offsets are 0-based and live here so format drift is a one-place change.

/// A 0-based cell coordinate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellPos {
    pub row: u32,
    pub col: u32,
}

impl CellPos {
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

/// Software schedule sheet (task table)
pub mod software {
    use super::CellPos;

    pub const PROJECT_CODE: CellPos = CellPos::new(2, 2);
    pub const PROJECT_NAME: CellPos = CellPos::new(3, 2);
    pub const PROJECT_LEAD: CellPos = CellPos::new(4, 2);
    pub const START_DATE: CellPos = CellPos::new(3, 9);
    pub const UPDATE_DATE: CellPos = CellPos::new(4, 12);

    /// Column header row written by the template
    pub const HEADER_ROW: u32 = 5;
    pub const FIRST_TASK_ROW: u32 = 6;

    pub const COL_NAME: u32 = 0;
    pub const COL_MARKER: u32 = 1;
    pub const COL_OWNER: u32 = 2;
    pub const COL_PROGRESS: u32 = 4;
    pub const COL_TARGET: u32 = 5;
    pub const COL_REMAINING_DAYS: u32 = 6;
    pub const COL_STATUS: u32 = 7;
    pub const COL_PLAN_START: u32 = 8;
    pub const COL_PLAN_END: u32 = 9;
    pub const COL_PLAN_DAYS: u32 = 10;
    pub const COL_ACTUAL_START: u32 = 11;
    pub const COL_ACTUAL_END: u32 = 12;
    pub const COL_ACTUAL_DAYS: u32 = 13;
    pub const COL_VARIANCE_DAYS: u32 = 14;
    pub const COL_COORD_TIME: u32 = 15;
    pub const COL_COORD_MANPOWER: u32 = 16;
    pub const COL_COORD_AREA: u32 = 17;
    pub const COL_COORD_EQUIPMENT: u32 = 18;
    pub const COL_NOTES: u32 = 19;

    pub const COLUMN_COUNT: u32 = 20;

    /// Phrases in the progress column that mark a repeated header row
    pub const HEADER_PHRASES: &[&str] = &["百分比", "完成"];

    /// Header labels by column, as written by the template
    pub const HEADERS: [&str; COLUMN_COUNT as usize] = [
        "項目",
        "層級",
        "負責單位",
        "實際完成\n進度",
        "實際完成\n百分比",
        "預計完成\n百分比",
        "剩餘\n天數",
        "進度",
        "計劃開始日期",
        "計劃完成日期",
        "計劃\n天數",
        "實際開始日期",
        "實際完成日期",
        "實際\n天數",
        "誤差\n天數",
        "協調時間",
        "協調人力",
        "協調區域",
        "協調設備",
        "備註",
    ];
}

/// System schedule sheet (area milestones)
pub mod system {
    pub const HEADER_ROW: u32 = 4;
    pub const FIRST_ITEM_ROW: u32 = 5;

    pub const COL_NAME: u32 = 0;
    pub const COL_TARGET_DATE: u32 = 1;
    pub const COL_COMPLETION: u32 = 2;
    pub const COL_NOTES: u32 = 3;

    /// Used when no header cell carries the hierarchy label
    pub const FALLBACK_HIERARCHY_COL: u32 = 4;

    /// Phrases in the completion column that mark a repeated header row
    pub const HEADER_PHRASES: &[&str] = &["百分比"];

    pub const HEADERS: [&str; 5] = ["項目", "計劃完成日期", "完成\n百分比", "備註", "層級"];
}
